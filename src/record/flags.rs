use bitflags::bitflags;

bitflags! {
    /// SAM bitwise flag.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Flags: u16 {
        /// Template having multiple segments in sequencing.
        const PAIRED = 0x1;
        /// Each segment properly aligned according to the aligner.
        const PROPER_PAIR = 0x2;
        /// Segment unmapped.
        const UNMAPPED = 0x4;
        /// Next segment in the template unmapped.
        const MATE_UNMAPPED = 0x8;
        /// Sequence being reverse complemented.
        const REVERSE_STRAND = 0x10;
        /// Sequence of the next segment in the template being reversed.
        const MATE_REVERSE_STRAND = 0x20;
        /// The first segment in the template.
        const FIRST_OF_PAIR = 0x40;
        /// The last segment in the template.
        const SECOND_OF_PAIR = 0x80;
        /// Secondary alignment.
        const SECONDARY = 0x100;
        /// Not passing quality controls.
        const QC_FAIL = 0x200;
        /// PCR or optical duplicate.
        const DUPLICATE = 0x400;
        /// Supplementary alignment.
        const SUPPLEMENTARY = 0x800;
    }
}

impl Flags {
    /// Filter-language name of each flag bit, in bit order.
    pub const NAMES: [(&'static str, Flags); 12] = [
        ("paired", Flags::PAIRED),
        ("proper_pair", Flags::PROPER_PAIR),
        ("unmapped", Flags::UNMAPPED),
        ("mate_is_unmapped", Flags::MATE_UNMAPPED),
        ("reverse_strand", Flags::REVERSE_STRAND),
        ("mate_is_reverse_strand", Flags::MATE_REVERSE_STRAND),
        ("first_of_pair", Flags::FIRST_OF_PAIR),
        ("second_of_pair", Flags::SECOND_OF_PAIR),
        ("secondary_alignment", Flags::SECONDARY),
        ("failed_quality_control", Flags::QC_FAIL),
        ("duplicate", Flags::DUPLICATE),
        ("supplementary", Flags::SUPPLEMENTARY),
    ];

    /// Look up a flag bit by its filter-language name.
    pub fn by_name(name: &str) -> Option<Flags> {
        Self::NAMES
            .iter()
            .find(|(candidate, _)| *candidate == name)
            .map(|(_, flag)| *flag)
    }
}
