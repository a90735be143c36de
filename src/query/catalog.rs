//! Static registry of the alignment fields the filter language can address.
//!
//! Names match the identifiers understood by the engine's `-F` filter flag.
//! Numeric defaults are the values the engine reports for missing data and are
//! emitted verbatim, never coordinate-shifted, by `is_unknown` tests.

/// Kind of value a field holds in filter expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    /// Signed integer field (`mapping_quality`, `position`, ...).
    Integer,
    /// String field (`read_name`, `sequence`, `cigar`).
    String,
    /// Single bit of the SAM flag (`paired`, `duplicate`, ...).
    FlagBit,
}

impl FieldKind {
    /// Human readable name used in error messages.
    pub fn describe(self) -> &'static str {
        match self {
            FieldKind::Integer => "integer",
            FieldKind::String => "string",
            FieldKind::FlagBit => "flag",
        }
    }
}

/// Metadata describing a single addressable field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDescriptor {
    /// Identifier as written in filter expressions.
    pub name: &'static str,
    /// Value kind accepted by comparisons against this field.
    pub kind: FieldKind,
    /// Value the engine stores when the field is unknown.
    pub default: Option<i64>,
    /// Whether caller literals are 1-based and must be decremented.
    pub coordinate_shift: bool,
}

impl FieldDescriptor {
    const fn integer(name: &'static str, default: Option<i64>, coordinate_shift: bool) -> Self {
        Self {
            name,
            kind: FieldKind::Integer,
            default,
            coordinate_shift,
        }
    }

    const fn string(name: &'static str) -> Self {
        Self {
            name,
            kind: FieldKind::String,
            default: None,
            coordinate_shift: false,
        }
    }

    const fn flag(name: &'static str) -> Self {
        Self {
            name,
            kind: FieldKind::FlagBit,
            default: None,
            coordinate_shift: false,
        }
    }
}

/// `ref_id`
pub const REF_ID: FieldDescriptor = FieldDescriptor::integer("ref_id", Some(-1), false);
/// `mate_ref_id`
pub const MATE_REF_ID: FieldDescriptor = FieldDescriptor::integer("mate_ref_id", Some(-1), false);
/// `position`, 1-based from the caller's point of view.
pub const POSITION: FieldDescriptor = FieldDescriptor::integer("position", Some(0), true);
/// `mate_position`, 1-based from the caller's point of view.
pub const MATE_POSITION: FieldDescriptor =
    FieldDescriptor::integer("mate_position", Some(0), true);
/// `mapping_quality`; 255 marks an unavailable value.
pub const MAPPING_QUALITY: FieldDescriptor =
    FieldDescriptor::integer("mapping_quality", Some(255), false);
/// `sequence_length`
pub const SEQUENCE_LENGTH: FieldDescriptor =
    FieldDescriptor::integer("sequence_length", None, false);
/// `template_length`
pub const TEMPLATE_LENGTH: FieldDescriptor =
    FieldDescriptor::integer("template_length", Some(0), false);
/// `read_name`
pub const READ_NAME: FieldDescriptor = FieldDescriptor::string("read_name");
/// `sequence`
pub const SEQUENCE: FieldDescriptor = FieldDescriptor::string("sequence");
/// `cigar`
pub const CIGAR: FieldDescriptor = FieldDescriptor::string("cigar");

static FIELDS: [FieldDescriptor; 22] = [
    REF_ID,
    MATE_REF_ID,
    POSITION,
    MATE_POSITION,
    MAPPING_QUALITY,
    SEQUENCE_LENGTH,
    TEMPLATE_LENGTH,
    READ_NAME,
    SEQUENCE,
    CIGAR,
    FieldDescriptor::flag("paired"),
    FieldDescriptor::flag("proper_pair"),
    FieldDescriptor::flag("unmapped"),
    FieldDescriptor::flag("mate_is_unmapped"),
    FieldDescriptor::flag("reverse_strand"),
    FieldDescriptor::flag("mate_is_reverse_strand"),
    FieldDescriptor::flag("first_of_pair"),
    FieldDescriptor::flag("second_of_pair"),
    FieldDescriptor::flag("secondary_alignment"),
    FieldDescriptor::flag("failed_quality_control"),
    FieldDescriptor::flag("duplicate"),
    FieldDescriptor::flag("supplementary"),
];

/// Look up a field by its filter-language name.
pub fn lookup(name: &str) -> Option<&'static FieldDescriptor> {
    FIELDS.iter().find(|field| field.name == name)
}

/// Iterate over every registered field.
pub fn fields() -> impl Iterator<Item = &'static FieldDescriptor> {
    FIELDS.iter()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_names_are_unique() {
        let names: HashSet<_> = fields().map(|field| field.name).collect();
        assert_eq!(names.len(), FIELDS.len());
    }

    #[test]
    fn test_lookup_known_and_unknown() {
        let mapq = lookup("mapping_quality").expect("mapping_quality is registered");
        assert_eq!(mapq.kind, FieldKind::Integer);
        assert_eq!(mapq.default, Some(255));
        assert!(lookup("mapq").is_none());
    }

    #[test]
    fn test_only_positions_shift() {
        let shifted: Vec<_> = fields()
            .filter(|field| field.coordinate_shift)
            .map(|field| field.name)
            .collect();
        assert_eq!(shifted, vec!["position", "mate_position"]);
    }

    #[test]
    fn test_defaults_only_on_integers() {
        assert!(fields()
            .filter(|field| field.default.is_some())
            .all(|field| field.kind == FieldKind::Integer));
    }
}
