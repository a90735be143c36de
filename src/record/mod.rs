//! Read-only view over a single decoded alignment record.
//!
//! Records are decoded from either engine output format into one
//! [`Alignment`] type. Coordinates are stored 0-based and exposed 1-based,
//! matching SAM text conventions.

mod cigar;
mod flags;
mod tags;
mod wire;

use std::sync::Arc;

pub use cigar::{Cigar, CigarError, CigarOp, CigarOpKind};
pub use flags::Flags;
pub use tags::{InvalidTag, Tag, TagValue, Tags};
pub use wire::{DecodeError, ReferenceNames};

pub(crate) use wire::{JsonRecord, MsgPackRecord};

/// Aligned read as reported by the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct Alignment {
    pub(crate) read_name: String,
    pub(crate) flags: Flags,
    pub(crate) reference: Option<Arc<str>>,
    pub(crate) start: Option<u32>,
    pub(crate) mapping_quality: u8,
    pub(crate) cigar: Cigar,
    pub(crate) template_length: i32,
    pub(crate) sequence: String,
    pub(crate) quality: Vec<u8>,
    pub(crate) mate_reference: Option<Arc<str>>,
    pub(crate) mate_start: Option<u32>,
    pub(crate) tags: Tags,
}

impl Alignment {
    /// Decode one line of `--format=json` output.
    pub fn from_json(line: &str) -> Result<Self, DecodeError> {
        serde_json::from_str::<JsonRecord>(line)?.into_alignment()
    }

    /// Decode one `--format=msgpack` frame.
    pub fn from_msgpack(frame: &[u8], references: &ReferenceNames) -> Result<Self, DecodeError> {
        rmp_serde::from_slice::<MsgPackRecord>(frame)?.into_alignment(references)
    }

    /// Query template name.
    pub fn read_name(&self) -> &str {
        &self.read_name
    }

    /// Bitwise flag.
    pub fn flags(&self) -> Flags {
        self.flags
    }

    /// Name of the reference sequence, `None` for `*`.
    pub fn reference(&self) -> Option<&str> {
        self.reference.as_deref()
    }

    /// 1-based leftmost mapping position.
    pub fn position(&self) -> Option<u32> {
        self.start.and_then(|start| start.checked_add(1))
    }

    /// 0-based leftmost mapping position.
    pub fn start(&self) -> Option<u32> {
        self.start
    }

    /// Mapping quality; 255 when unavailable.
    pub fn mapping_quality(&self) -> u8 {
        self.mapping_quality
    }

    /// Parsed CIGAR.
    pub fn cigar(&self) -> &Cigar {
        &self.cigar
    }

    /// CIGAR in SAM text form.
    pub fn cigar_string(&self) -> String {
        self.cigar.to_string()
    }

    /// Observed template length.
    pub fn template_length(&self) -> i32 {
        self.template_length
    }

    /// Segment sequence; empty when absent.
    pub fn sequence(&self) -> &str {
        &self.sequence
    }

    /// Phred-scaled base qualities, same length as the sequence when present.
    pub fn quality(&self) -> &[u8] {
        &self.quality
    }

    /// Reference name of the mate/next segment.
    pub fn mate_reference(&self) -> Option<&str> {
        self.mate_reference.as_deref()
    }

    /// 1-based leftmost position of the mate/next segment.
    pub fn mate_position(&self) -> Option<u32> {
        self.mate_start.and_then(|start| start.checked_add(1))
    }

    /// All auxiliary tags.
    pub fn tags(&self) -> &Tags {
        &self.tags
    }

    /// Value of a single tag.
    pub fn tag(&self, tag: Tag) -> Option<&TagValue> {
        self.tags.get(&tag)
    }

    /// Number of reference bases covered by the alignment.
    pub fn bases_covered(&self) -> u32 {
        self.cigar.reference_len()
    }

    /// 1-based inclusive end position on the reference.
    pub fn end(&self) -> Option<u32> {
        let start = self.start?;
        start.checked_add(self.bases_covered().max(1))
    }

    /// Whether the alignment overlaps the 1-based closed interval `[begin, end]`.
    pub fn overlaps(&self, begin: u32, end: u32) -> bool {
        match (self.position(), self.end()) {
            (Some(first), Some(last)) => first <= end && last >= begin,
            _ => false,
        }
    }

    /// Template having multiple segments in sequencing.
    pub fn is_paired(&self) -> bool {
        self.flags.contains(Flags::PAIRED)
    }

    /// Each segment properly aligned according to the aligner.
    pub fn is_proper_pair(&self) -> bool {
        self.flags.contains(Flags::PROPER_PAIR)
    }

    /// Segment unmapped.
    pub fn is_unmapped(&self) -> bool {
        self.flags.contains(Flags::UNMAPPED)
    }

    /// Next segment in the template unmapped.
    pub fn mate_is_unmapped(&self) -> bool {
        self.flags.contains(Flags::MATE_UNMAPPED)
    }

    /// Sequence being reverse complemented.
    pub fn is_reverse_strand(&self) -> bool {
        self.flags.contains(Flags::REVERSE_STRAND)
    }

    /// Sequence of the next segment in the template being reversed.
    pub fn mate_is_reverse_strand(&self) -> bool {
        self.flags.contains(Flags::MATE_REVERSE_STRAND)
    }

    /// The first segment in the template.
    pub fn is_first_of_pair(&self) -> bool {
        self.flags.contains(Flags::FIRST_OF_PAIR)
    }

    /// The last segment in the template.
    pub fn is_second_of_pair(&self) -> bool {
        self.flags.contains(Flags::SECOND_OF_PAIR)
    }

    /// Secondary alignment.
    pub fn is_secondary_alignment(&self) -> bool {
        self.flags.contains(Flags::SECONDARY)
    }

    /// Not passing quality controls.
    pub fn failed_quality_control(&self) -> bool {
        self.flags.contains(Flags::QC_FAIL)
    }

    /// PCR or optical duplicate.
    pub fn is_duplicate(&self) -> bool {
        self.flags.contains(Flags::DUPLICATE)
    }

    /// Supplementary alignment.
    pub fn is_supplementary(&self) -> bool {
        self.flags.contains(Flags::SUPPLEMENTARY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alignment(json: &str) -> Alignment {
        Alignment::from_json(json).expect("fixture decodes")
    }

    #[test]
    fn test_flag_predicates() {
        let read = alignment(
            r#"{"qname":"r","flag":1107,"rname":"chr1","pos":100,"mapq":60,"cigar":"10M","rnext":"=","pnext":200,"tlen":110,"seq":"ACGTACGTAC","qual":"IIIIIIIIII","tags":{}}"#,
        );
        // 1107 = 0x400 | 0x40 | 0x10 | 0x2 | 0x1
        assert!(read.is_paired());
        assert!(read.is_proper_pair());
        assert!(read.is_reverse_strand());
        assert!(read.is_first_of_pair());
        assert!(read.is_duplicate());
        assert!(!read.is_unmapped());
        assert!(!read.is_second_of_pair());
        assert!(!read.is_supplementary());
    }

    #[test]
    fn test_coverage_and_overlap() {
        let read = alignment(
            r#"{"qname":"r","flag":0,"rname":"chr1","pos":100,"mapq":60,"cigar":"5M10D5M","rnext":"*","pnext":0,"tlen":0,"seq":"ACGTACGTAC","qual":"*","tags":{}}"#,
        );
        assert_eq!(read.bases_covered(), 20);
        assert_eq!(read.position(), Some(100));
        assert_eq!(read.end(), Some(119));
        assert!(read.overlaps(119, 150));
        assert!(read.overlaps(1, 100));
        assert!(!read.overlaps(120, 150));
        assert!(!read.overlaps(1, 99));
    }

    #[test]
    fn test_msgpack_frame_uses_reference_table() {
        let references: ReferenceNames = ["chrM", "chr1"].into_iter().collect();
        let frame = rmp_serde::to_vec(&(
            "frame",
            163u16,
            1i32,
            99i32,
            42u8,
            vec![4u32, 1],
            "MS",
            1i32,
            9i32,
            -95i32,
            "ACGTA",
            vec![30u8, 31, 32, 33, 34],
            std::collections::BTreeMap::from([("NM", 0i64)]),
        ))
        .unwrap();

        let read = Alignment::from_msgpack(&frame, &references).unwrap();
        assert_eq!(read.reference(), Some("chr1"));
        assert_eq!(read.position(), Some(100));
        assert_eq!(read.mate_position(), Some(10));
        assert_eq!(read.cigar_string(), "4M1S");
        assert_eq!(read.quality(), &[30, 31, 32, 33, 34]);
        assert_eq!(read.template_length(), -95);
        assert!(read.is_second_of_pair());
    }

    #[test]
    fn test_msgpack_rejects_unknown_reference() {
        let references: ReferenceNames = ["chr1"].into_iter().collect();
        let frame = rmp_serde::to_vec(&(
            "bad",
            0u16,
            3i32,
            0i32,
            0u8,
            Vec::<u32>::new(),
            "",
            -1i32,
            -1i32,
            0i32,
            "",
            Vec::<u8>::new(),
            std::collections::BTreeMap::<String, i64>::new(),
        ))
        .unwrap();
        assert!(matches!(
            Alignment::from_msgpack(&frame, &references),
            Err(DecodeError::UnknownReference(3))
        ));
    }

    #[test]
    fn test_end_does_not_overflow() {
        let references: ReferenceNames = ["chr1"].into_iter().collect();
        let frame = rmp_serde::to_vec(&(
            "long",
            0u16,
            0i32,
            i32::MAX,
            60u8,
            vec![u32::MAX],
            "N",
            -1i32,
            -1i32,
            0i32,
            "",
            Vec::<u8>::new(),
            std::collections::BTreeMap::<String, i64>::new(),
        ))
        .unwrap();

        let read = Alignment::from_msgpack(&frame, &references).unwrap();
        assert_eq!(read.position(), Some(i32::MAX as u32 + 1));
        assert_eq!(read.bases_covered(), u32::MAX);
        assert_eq!(read.end(), None);
        assert!(!read.overlaps(1, 10));
    }
}
