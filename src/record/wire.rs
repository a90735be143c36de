//! Record shapes emitted by the engine's two output formats.
//!
//! `--format=json` writes one object per line with SAM-style (1-based)
//! coordinates and inline reference names. `--format=msgpack` writes one
//! 13-element array per record with 0-based coordinates and reference ids
//! that resolve through the header's sequence dictionary.

use std::fmt;
use std::sync::Arc;

use serde::de::{self, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer};
use thiserror::Error;

use super::cigar::{Cigar, CigarError};
use super::tags::{deserialize_tags, Tags};
use super::{Alignment, Flags};

/// Failure to turn one unit of engine output into an [`Alignment`].
#[derive(Debug, Error)]
pub enum DecodeError {
    /// JSON line did not match the record shape.
    #[error("malformed JSON record: {0}")]
    Json(#[from] serde_json::Error),
    /// MessagePack frame did not match the record shape.
    #[error("malformed MessagePack frame: {0}")]
    MsgPack(#[from] rmp_serde::decode::Error),
    /// CIGAR could not be parsed.
    #[error(transparent)]
    Cigar(#[from] CigarError),
    /// Reference id outside the reference-name table.
    #[error("reference id {0} is not present in the header")]
    UnknownReference(i32),
    /// Coordinate outside the range a BAM record can hold.
    #[error("position {0} is outside the BAM coordinate range")]
    PositionOutOfRange(i64),
}

/// Per-file table mapping reference ids to names.
///
/// Cloning shares the underlying storage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferenceNames(Arc<[Arc<str>]>);

impl ReferenceNames {
    /// Number of references.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True if the table holds no references.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Name for a reference id; `-1` means "no reference".
    pub fn resolve(&self, id: i32) -> Result<Option<Arc<str>>, DecodeError> {
        if id < 0 {
            return Ok(None);
        }
        self.0
            .get(id as usize)
            .map(|name| Some(Arc::clone(name)))
            .ok_or(DecodeError::UnknownReference(id))
    }

    /// Iterate over names in id order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|name| name.as_ref())
    }
}

impl<S: Into<Arc<str>>> FromIterator<S> for ReferenceNames {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct JsonRecord {
    qname: String,
    flag: u16,
    rname: String,
    pos: i64,
    mapq: u8,
    cigar: String,
    rnext: String,
    pnext: i64,
    tlen: i32,
    seq: String,
    #[serde(default, deserialize_with = "deserialize_quality")]
    qual: Vec<u8>,
    #[serde(default, deserialize_with = "deserialize_tags")]
    tags: Tags,
}

impl JsonRecord {
    pub(crate) fn into_alignment(self) -> Result<Alignment, DecodeError> {
        let reference = reference_name(&self.rname);
        let mate_reference = match self.rnext.as_str() {
            "=" => reference.clone(),
            other => reference_name(other),
        };

        Ok(Alignment {
            read_name: self.qname,
            flags: Flags::from_bits_retain(self.flag),
            reference,
            start: one_based_to_start(self.pos)?,
            mapping_quality: self.mapq,
            cigar: self.cigar.parse()?,
            template_length: self.tlen,
            sequence: sequence(self.seq),
            quality: self.qual,
            mate_reference,
            mate_start: one_based_to_start(self.pnext)?,
            tags: self.tags,
        })
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct MsgPackRecord(
    String,
    u16,
    i32,
    i32,
    u8,
    Vec<u32>,
    String,
    i32,
    i32,
    i32,
    String,
    #[serde(deserialize_with = "deserialize_quality")] Vec<u8>,
    #[serde(deserialize_with = "deserialize_tags")] Tags,
);

impl MsgPackRecord {
    pub(crate) fn into_alignment(self, references: &ReferenceNames) -> Result<Alignment, DecodeError> {
        let MsgPackRecord(
            read_name,
            flag,
            ref_id,
            pos,
            mapping_quality,
            cigar_lengths,
            cigar_ops,
            mate_ref_id,
            mate_pos,
            template_length,
            seq,
            quality,
            tags,
        ) = self;

        Ok(Alignment {
            read_name,
            flags: Flags::from_bits_retain(flag),
            reference: references.resolve(ref_id)?,
            start: u32::try_from(pos).ok(),
            mapping_quality,
            cigar: Cigar::from_parts(&cigar_lengths, &cigar_ops)?,
            template_length,
            sequence: sequence(seq),
            quality,
            mate_reference: references.resolve(mate_ref_id)?,
            mate_start: u32::try_from(mate_pos).ok(),
            tags,
        })
    }
}

fn reference_name(name: &str) -> Option<Arc<str>> {
    match name {
        "" | "*" => None,
        name => Some(Arc::from(name)),
    }
}

// BAM stores positions as i32, so anything past i32::MAX cannot be a real record.
fn one_based_to_start(pos: i64) -> Result<Option<u32>, DecodeError> {
    if pos <= 0 {
        return Ok(None);
    }
    i32::try_from(pos - 1)
        .ok()
        .and_then(|start| u32::try_from(start).ok())
        .map(Some)
        .ok_or(DecodeError::PositionOutOfRange(pos))
}

fn sequence(seq: String) -> String {
    if seq == "*" {
        String::new()
    } else {
        seq
    }
}

/// Accepts Phred scores as an integer array, a byte string, or SAM text
/// (`*` or Phred+33).
fn deserialize_quality<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    struct QualityVisitor;

    impl<'de> Visitor<'de> for QualityVisitor {
        type Value = Vec<u8>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("base qualities as integers, bytes or Phred+33 text")
        }

        fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
            let mut scores = Vec::with_capacity(seq.size_hint().unwrap_or(0));
            while let Some(score) = seq.next_element::<u8>()? {
                scores.push(score);
            }
            Ok(scores)
        }

        fn visit_bytes<E: de::Error>(self, v: &[u8]) -> Result<Self::Value, E> {
            Ok(v.to_vec())
        }

        fn visit_byte_buf<E: de::Error>(self, v: Vec<u8>) -> Result<Self::Value, E> {
            Ok(v)
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
            if v == "*" {
                return Ok(Vec::new());
            }
            v.bytes()
                .map(|b| {
                    b.checked_sub(33)
                        .ok_or_else(|| E::custom(format!("invalid quality character {:?}", b as char)))
                })
                .collect()
        }

        fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(Vec::new())
        }

        fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(Vec::new())
        }
    }

    deserializer.deserialize_any(QualityVisitor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Tag;

    const LINE: &str = r#"{"qname":"r001","flag":99,"rname":"chr1","pos":7,"mapq":30,"cigar":"8M2I4M1D3M","rnext":"=","pnext":37,"tlen":39,"seq":"TTAGATAAAGGATACTG","qual":[30,30,30,30,30,30,30,30,30,30,30,30,30,30,30,30,30],"tags":{"NM":1}}"#;

    #[test]
    fn test_json_record_converts_to_zero_based_storage() {
        let record: JsonRecord = serde_json::from_str(LINE).unwrap();
        let alignment = record.into_alignment().unwrap();
        assert_eq!(alignment.position(), Some(7));
        assert_eq!(alignment.mate_position(), Some(37));
        assert_eq!(alignment.mate_reference(), Some("chr1"));
        assert_eq!(alignment.quality().len(), 17);
        assert_eq!(alignment.tag(Tag::EDIT_DISTANCE).and_then(|v| v.as_integer()), Some(1));
    }

    #[test]
    fn test_json_unmapped_fields() {
        let line = r#"{"qname":"u","flag":4,"rname":"*","pos":0,"mapq":0,"cigar":"*","rnext":"*","pnext":0,"tlen":0,"seq":"ACGT","qual":"*","tags":{}}"#;
        let alignment = serde_json::from_str::<JsonRecord>(line)
            .unwrap()
            .into_alignment()
            .unwrap();
        assert_eq!(alignment.reference(), None);
        assert_eq!(alignment.position(), None);
        assert!(alignment.cigar().is_empty());
        assert!(alignment.quality().is_empty());
    }

    #[test]
    fn test_quality_text_is_phred33() {
        let line = r#"{"qname":"q","flag":0,"rname":"chr2","pos":1,"mapq":60,"cigar":"2M","rnext":"*","pnext":0,"tlen":0,"seq":"AC","qual":"5I"}"#;
        let alignment = serde_json::from_str::<JsonRecord>(line)
            .unwrap()
            .into_alignment()
            .unwrap();
        assert_eq!(alignment.quality(), &[20, 40]);
        assert!(alignment.tags().is_empty());
    }

    #[test]
    fn test_reference_names_resolve() {
        let names: ReferenceNames = ["chr1", "chr2"].into_iter().collect();
        assert_eq!(names.resolve(-1).unwrap(), None);
        assert_eq!(names.resolve(1).unwrap().as_deref(), Some("chr2"));
        assert!(matches!(names.resolve(2), Err(DecodeError::UnknownReference(2))));
    }

    #[test]
    fn test_positions_beyond_bam_range_are_rejected() {
        for (pos, pnext) in [(4_294_967_296i64, 0i64), (2_147_483_649, 0), (1, 4_294_967_296)] {
            let line = format!(
                r#"{{"qname":"far","flag":0,"rname":"chr1","pos":{pos},"mapq":60,"cigar":"4M","rnext":"=","pnext":{pnext},"tlen":0,"seq":"ACGT","qual":"*","tags":{{}}}}"#
            );
            let result = serde_json::from_str::<JsonRecord>(&line)
                .unwrap()
                .into_alignment();
            assert!(
                matches!(result, Err(DecodeError::PositionOutOfRange(p)) if p == pos.max(pnext)),
                "pos={pos} pnext={pnext}"
            );
        }
    }

    #[test]
    fn test_last_bam_position_round_trips() {
        let line = r#"{"qname":"edge","flag":0,"rname":"chr1","pos":2147483648,"mapq":60,"cigar":"4M","rnext":"*","pnext":0,"tlen":0,"seq":"ACGT","qual":"*","tags":{}}"#;
        let alignment = serde_json::from_str::<JsonRecord>(line)
            .unwrap()
            .into_alignment()
            .unwrap();
        assert_eq!(alignment.start(), Some(i32::MAX as u32));
        assert_eq!(alignment.position(), Some(2_147_483_648));
        assert_eq!(alignment.end(), Some(i32::MAX as u32 + 4));
    }
}
