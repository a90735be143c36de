//! SAM header as reported by `sambamba view -H`.
//!
//! The engine can print the header as raw SAM text or as a JSON document;
//! both are mapped onto [`SamHeader`].

use serde::{Deserialize, Deserializer};
use thiserror::Error;

use crate::record::ReferenceNames;

/// Malformed header output.
#[derive(Debug, Error)]
pub enum HeaderError {
    /// JSON header did not match the expected shape.
    #[error("malformed JSON header: {0}")]
    Json(#[from] serde_json::Error),
    /// Raw text header line could not be parsed.
    #[error("malformed header line {line}: {reason}")]
    Line {
        /// 1-based line number.
        line: usize,
        /// What was wrong with it.
        reason: String,
    },
}

/// Parsed SAM header.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SamHeader {
    /// Format version (`@HD VN`).
    #[serde(default, rename = "format_version", deserialize_with = "non_empty")]
    pub version: Option<String>,
    /// Sorting order (`@HD SO`).
    #[serde(default, deserialize_with = "non_empty")]
    pub sorting_order: Option<String>,
    /// Sequence dictionary (`@SQ`).
    #[serde(default)]
    pub sq_lines: Vec<SqLine>,
    /// Read groups (`@RG`).
    #[serde(default)]
    pub rg_lines: Vec<RgLine>,
    /// Program records (`@PG`).
    #[serde(default)]
    pub pg_lines: Vec<PgLine>,
}

/// `@SQ` line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SqLine {
    /// Reference sequence name (`SN`).
    pub sequence_name: String,
    /// Reference sequence length (`LN`).
    #[serde(default)]
    pub sequence_length: u64,
    /// Genome assembly identifier (`AS`).
    #[serde(default, deserialize_with = "non_empty")]
    pub assembly: Option<String>,
    /// MD5 checksum of the sequence (`M5`).
    #[serde(default, deserialize_with = "non_empty")]
    pub md5: Option<String>,
    /// Species (`SP`).
    #[serde(default, deserialize_with = "non_empty")]
    pub species: Option<String>,
    /// URI of the sequence (`UR`).
    #[serde(default, deserialize_with = "non_empty")]
    pub uri: Option<String>,
}

/// `@RG` line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RgLine {
    /// Unique read group identifier (`ID`).
    pub identifier: String,
    /// Name of sequencing center (`CN`).
    #[serde(default, deserialize_with = "non_empty")]
    pub sequencing_center: Option<String>,
    /// Description (`DS`).
    #[serde(default, deserialize_with = "non_empty")]
    pub description: Option<String>,
    /// Date the run was produced (`DT`).
    #[serde(default, deserialize_with = "non_empty")]
    pub date: Option<String>,
    /// Flow order (`FO`).
    #[serde(default, deserialize_with = "non_empty")]
    pub flow_order: Option<String>,
    /// Key sequence (`KS`).
    #[serde(default, deserialize_with = "non_empty")]
    pub key_sequence: Option<String>,
    /// Library (`LB`).
    #[serde(default, deserialize_with = "non_empty")]
    pub library: Option<String>,
    /// Programs used for processing the read group (`PG`).
    #[serde(default, deserialize_with = "non_empty")]
    pub programs: Option<String>,
    /// Predicted median insert size (`PI`).
    #[serde(default, deserialize_with = "non_empty")]
    pub predicted_insert_size: Option<String>,
    /// Platform/technology (`PL`).
    #[serde(default, deserialize_with = "non_empty")]
    pub platform: Option<String>,
    /// Platform unit (`PU`).
    #[serde(default, deserialize_with = "non_empty")]
    pub platform_unit: Option<String>,
    /// Sample (`SM`).
    #[serde(default, deserialize_with = "non_empty")]
    pub sample: Option<String>,
}

/// `@PG` line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PgLine {
    /// Unique program record identifier (`ID`).
    pub identifier: String,
    /// Program name (`PN`).
    #[serde(default, deserialize_with = "non_empty")]
    pub program_name: Option<String>,
    /// Command line (`CL`).
    #[serde(default, deserialize_with = "non_empty")]
    pub command_line: Option<String>,
    /// Previous program in the chain (`PP`).
    #[serde(default, deserialize_with = "non_empty")]
    pub previous_program: Option<String>,
    /// Program version (`VN`).
    #[serde(default, deserialize_with = "non_empty")]
    pub program_version: Option<String>,
}

impl SamHeader {
    /// Parse the JSON header document.
    pub fn from_json(json: &str) -> Result<Self, HeaderError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Parse raw SAM header text.
    ///
    /// Unknown record types (`@CO`, user types) and unknown field codes are
    /// ignored.
    pub fn parse(text: &str) -> Result<Self, HeaderError> {
        let mut header = SamHeader::default();

        for (idx, line) in text.lines().enumerate() {
            let line_no = idx + 1;
            if line.trim().is_empty() {
                continue;
            }
            let mut columns = line.split('\t');
            let kind = columns.next().unwrap_or_default();
            if !kind.starts_with('@') {
                return Err(HeaderError::Line {
                    line: line_no,
                    reason: format!("expected a record type, found {kind:?}"),
                });
            }
            if kind == "@CO" {
                continue;
            }

            let fields = columns
                .map(|column| {
                    column.split_once(':').ok_or_else(|| HeaderError::Line {
                        line: line_no,
                        reason: format!("field {column:?} is not CODE:VALUE"),
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;

            match kind {
                "@HD" => {
                    for (code, value) in fields {
                        match code {
                            "VN" => header.version = Some(value.to_string()),
                            "SO" => header.sorting_order = Some(value.to_string()),
                            _ => {}
                        }
                    }
                }
                "@SQ" => header.sq_lines.push(SqLine::from_fields(line_no, &fields)?),
                "@RG" => header.rg_lines.push(RgLine::from_fields(line_no, &fields)?),
                "@PG" => header.pg_lines.push(PgLine::from_fields(line_no, &fields)?),
                _ => {}
            }
        }

        Ok(header)
    }

    /// Reference-name table in sequence-dictionary order.
    pub fn references(&self) -> ReferenceNames {
        self.sq_lines
            .iter()
            .map(|sq| sq.sequence_name.as_str())
            .collect()
    }
}

fn missing(line: usize, code: &str) -> HeaderError {
    HeaderError::Line {
        line,
        reason: format!("missing required field {code}"),
    }
}

impl SqLine {
    fn from_fields(line: usize, fields: &[(&str, &str)]) -> Result<Self, HeaderError> {
        let mut sq = SqLine::default();
        let mut has_name = false;
        for &(code, value) in fields {
            match code {
                "SN" => {
                    sq.sequence_name = value.to_string();
                    has_name = true;
                }
                "LN" => {
                    sq.sequence_length = value.parse().map_err(|_| HeaderError::Line {
                        line,
                        reason: format!("invalid LN value {value:?}"),
                    })?;
                }
                "AS" => sq.assembly = Some(value.to_string()),
                "M5" => sq.md5 = Some(value.to_string()),
                "SP" => sq.species = Some(value.to_string()),
                "UR" => sq.uri = Some(value.to_string()),
                _ => {}
            }
        }
        if !has_name {
            return Err(missing(line, "SN"));
        }
        Ok(sq)
    }
}

impl RgLine {
    fn from_fields(line: usize, fields: &[(&str, &str)]) -> Result<Self, HeaderError> {
        let mut rg = RgLine::default();
        let mut has_id = false;
        for &(code, value) in fields {
            let value = Some(value.to_string());
            match code {
                "ID" => {
                    rg.identifier = value.unwrap_or_default();
                    has_id = true;
                }
                "CN" => rg.sequencing_center = value,
                "DS" => rg.description = value,
                "DT" => rg.date = value,
                "FO" => rg.flow_order = value,
                "KS" => rg.key_sequence = value,
                "LB" => rg.library = value,
                "PG" => rg.programs = value,
                "PI" => rg.predicted_insert_size = value,
                "PL" => rg.platform = value,
                "PU" => rg.platform_unit = value,
                "SM" => rg.sample = value,
                _ => {}
            }
        }
        if !has_id {
            return Err(missing(line, "ID"));
        }
        Ok(rg)
    }
}

impl PgLine {
    fn from_fields(line: usize, fields: &[(&str, &str)]) -> Result<Self, HeaderError> {
        let mut pg = PgLine::default();
        let mut has_id = false;
        for &(code, value) in fields {
            let value = Some(value.to_string());
            match code {
                "ID" => {
                    pg.identifier = value.unwrap_or_default();
                    has_id = true;
                }
                "PN" => pg.program_name = value,
                "CL" => pg.command_line = value,
                "PP" => pg.previous_program = value,
                "VN" => pg.program_version = value,
                _ => {}
            }
        }
        if !has_id {
            return Err(missing(line, "ID"));
        }
        Ok(pg)
    }
}

/// Treat `""` and `null` as absent; numbers are kept as their text.
fn non_empty<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(i64),
    }

    Ok(match Option::<Raw>::deserialize(deserializer)? {
        Some(Raw::Text(text)) if !text.is_empty() => Some(text),
        Some(Raw::Number(number)) => Some(number.to_string()),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const RAW: &str = "@HD\tVN:1.6\tSO:coordinate\n\
@SQ\tSN:chr1\tLN:248956422\tAS:GRCh38\tM5:6aef897c3d6ff0c78aff06ac189178dd\n\
@SQ\tSN:chr2\tLN:242193529\n\
@RG\tID:grp1\tSM:NA12878\tPL:ILLUMINA\tPI:350\n\
@PG\tID:bwa\tPN:bwa\tVN:0.7.17\tCL:bwa mem ref.fa r1.fq r2.fq\n\
@CO\tfree text\n";

    #[test]
    fn test_parse_raw_text() {
        let header = SamHeader::parse(RAW).unwrap();
        assert_eq!(header.version.as_deref(), Some("1.6"));
        assert_eq!(header.sorting_order.as_deref(), Some("coordinate"));
        assert_eq!(header.sq_lines.len(), 2);
        assert_eq!(header.sq_lines[0].assembly.as_deref(), Some("GRCh38"));
        assert_eq!(header.sq_lines[1].sequence_length, 242193529);
        assert_eq!(header.rg_lines[0].sample.as_deref(), Some("NA12878"));
        assert_eq!(header.rg_lines[0].predicted_insert_size.as_deref(), Some("350"));
        assert_eq!(
            header.pg_lines[0].command_line.as_deref(),
            Some("bwa mem ref.fa r1.fq r2.fq")
        );
        let names: Vec<_> = header.references().iter().map(str::to_string).collect();
        assert_eq!(names, ["chr1", "chr2"]);
    }

    #[test]
    fn test_parse_json_matches_raw() {
        let json = r#"{
            "format_version": "1.6",
            "sorting_order": "coordinate",
            "sq_lines": [
                {"sequence_name": "chr1", "sequence_length": 248956422, "assembly": "GRCh38",
                 "md5": "6aef897c3d6ff0c78aff06ac189178dd", "species": "", "uri": ""},
                {"sequence_name": "chr2", "sequence_length": 242193529}
            ],
            "rg_lines": [
                {"identifier": "grp1", "sample": "NA12878", "platform": "ILLUMINA",
                 "predicted_insert_size": 350, "library": ""}
            ],
            "pg_lines": [
                {"identifier": "bwa", "program_name": "bwa", "program_version": "0.7.17",
                 "command_line": "bwa mem ref.fa r1.fq r2.fq", "previous_program": null}
            ]
        }"#;
        assert_eq!(SamHeader::from_json(json).unwrap(), SamHeader::parse(RAW).unwrap());
    }

    #[test]
    fn test_missing_required_field() {
        let err = SamHeader::parse("@SQ\tLN:10\n").unwrap_err();
        assert!(matches!(err, HeaderError::Line { line: 1, .. }));
    }

    #[test]
    fn test_rejects_non_header_line() {
        assert!(SamHeader::parse("r001\t0\tchr1\n").is_err());
    }
}
