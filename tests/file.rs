mod common;

use common::*;
use sambamba_stream::{BamFile, Error, SamFile};

#[test]
fn header_is_parsed_from_engine_json() {
    let fixture = Fixture::new("reads.bam");
    let records = fixture.write("records.json", "");
    let bam = BamFile::open_with(&fixture.path, engine_printing(&records)).unwrap();

    let header = bam.header().unwrap();
    assert_eq!(header.version.as_deref(), Some("1.6"));
    assert_eq!(header.sorting_order.as_deref(), Some("coordinate"));
    assert_eq!(header.sq_lines.len(), 2);
    assert_eq!(header.sq_lines[1].sequence_name, "chr1");
    assert_eq!(header.sq_lines[1].sequence_length, 249_250_621);

    let references = bam.references().unwrap();
    assert_eq!(references.iter().collect::<Vec<_>>(), ["chrM", "chr1"]);
}

#[test]
fn raw_header_matches_json_header() {
    let fixture = Fixture::new("reads.sam");
    let records = fixture.write("records.json", "");
    let sam = SamFile::open_with(&fixture.path, engine_printing(&records)).unwrap();

    let raw = sam.raw_header().unwrap();
    assert_eq!(raw, HEADER_TEXT);
    let parsed = sambamba_stream::SamHeader::parse(raw).unwrap();
    assert_eq!(&parsed, sam.header().unwrap());
}

#[test]
fn header_is_requested_once() {
    let fixture = Fixture::new("reads.bam");
    let log = fixture.file("calls.log");
    let script = format!(
        "echo call >> '{}'; printf '%s' '{HEADER_JSON}'",
        log.display()
    );
    let bam = BamFile::open_with(&fixture.path, shell(&script)).unwrap();

    bam.header().unwrap();
    bam.header().unwrap();
    bam.references().unwrap();
    let calls = std::fs::read_to_string(&log).unwrap();
    assert_eq!(calls.lines().count(), 1);
}

#[test]
fn missing_input_is_reported_at_open() {
    let fixture = Fixture::new("reads.bam");
    let missing = fixture.file("absent.bam");

    match BamFile::open_with(&missing, shell("true")) {
        Err(Error::FileNotFound(path)) => assert_eq!(path, missing),
        other => panic!("expected FileNotFound, got {other:?}"),
    }
    assert!(matches!(
        SamFile::open_with(fixture.file("absent.sam"), shell("true")),
        Err(Error::FileNotFound(_))
    ));
}

#[test]
fn index_is_found_next_to_the_file() {
    let fixture = Fixture::new("reads.bam");
    let bam = BamFile::open_with(&fixture.path, shell("true")).unwrap();
    assert!(!bam.has_index());

    fixture.write("reads.bai", "");
    assert!(bam.has_index());

    let other = Fixture::new("sorted.bam");
    other.write("sorted.bam.bai", "");
    let bam = BamFile::open_with(&other.path, shell("true")).unwrap();
    assert!(bam.has_index());
}

#[test]
fn header_engine_failure_is_surfaced() {
    let fixture = Fixture::new("reads.bam");
    let bam = BamFile::open_with(
        &fixture.path,
        shell("echo 'file is not a BAM' >&2; exit 1"),
    )
    .unwrap();

    assert!(matches!(
        bam.header(),
        Err(Error::ExternalProcess { stderr, .. }) if stderr.contains("not a BAM")
    ));
}
