//! Set laws of the filter language, checked against a real engine.
//!
//! Run with `SAMBAMBA_TEST_BAM=/path/to/indexed.bam cargo test -- --ignored`.

use sambamba_stream::query::{compile, QueryError};
use sambamba_stream::{BamFile, Filter, Query};

fn test_file() -> BamFile {
    let path = std::env::var("SAMBAMBA_TEST_BAM").expect("SAMBAMBA_TEST_BAM must point at a BAM file");
    BamFile::open(path).expect("open test BAM")
}

fn count(bam: &BamFile, filter: &Filter) -> u64 {
    bam.alignments().with_filter(filter.clone()).count().expect("engine count")
}

fn high_quality(q: &mut Query) -> Result<(), QueryError> {
    q.mapping_quality().ge(30)
}

fn paired(q: &mut Query) -> Result<(), QueryError> {
    q.flag_is_set("paired")
}

#[test]
#[ignore = "requires sambamba and SAMBAMBA_TEST_BAM"]
fn union_is_inclusion_exclusion() {
    let bam = test_file();
    let a = compile(high_quality).unwrap();
    let b = compile(paired).unwrap();
    let union = compile(|q| {
        q.union(|q| {
            high_quality(q)?;
            paired(q)
        })
    })
    .unwrap();
    let intersection = compile(|q| {
        high_quality(q)?;
        paired(q)
    })
    .unwrap();

    assert_eq!(
        count(&bam, &union),
        count(&bam, &a) + count(&bam, &b) - count(&bam, &intersection)
    );
}

#[test]
#[ignore = "requires sambamba and SAMBAMBA_TEST_BAM"]
fn negation_is_the_complement() {
    let bam = test_file();
    let total = bam.alignments().count().unwrap();
    let a = compile(high_quality).unwrap();
    let not_a = compile(|q| q.negate(high_quality)).unwrap();

    assert_eq!(count(&bam, &a) + count(&bam, &not_a), total);
}

#[test]
#[ignore = "requires sambamba and SAMBAMBA_TEST_BAM"]
fn region_filter_matches_client_side_overlap() {
    let bam = test_file();
    let references = bam.references().unwrap();
    let chromosome = references.iter().next().expect("header lists a reference").to_string();

    for read in bam.fetch(chromosome.as_str(), 1..=100_000).iter().take(1000) {
        let read = read.unwrap();
        assert_eq!(read.reference(), Some(chromosome.as_str()));
        if !read.is_unmapped() {
            assert!(read.overlaps(1, 100_000));
        }
    }
}

#[test]
#[ignore = "requires sambamba and SAMBAMBA_TEST_BAM"]
fn position_filter_uses_one_based_literals() {
    let bam = test_file();
    for read in bam
        .alignments()
        .select(|q| q.position().ge(1000))
        .unwrap()
        .iter()
        .take(1000)
    {
        let read = read.unwrap();
        assert!(read.position().is_some_and(|pos| pos >= 1000));
    }
}
