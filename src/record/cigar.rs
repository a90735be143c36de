use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// CIGAR operation kinds describing how a read aligns to the reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CigarOpKind {
    /// Alignment match (`M`), either match or mismatch.
    Match,
    /// Insertion relative to the reference (`I`).
    Insertion,
    /// Deletion relative to the reference (`D`).
    Deletion,
    /// Skipped reference region (`N`).
    Skip,
    /// Soft clipping (`S`), sequence present in read only.
    SoftClip,
    /// Hard clipping (`H`), trimmed sequence not present in read.
    HardClip,
    /// Silent deletion from padded reference (`P`).
    Pad,
    /// Sequence match (`=`).
    SequenceMatch,
    /// Sequence mismatch (`X`).
    SequenceMismatch,
}

impl CigarOpKind {
    /// Decode a SAM operation character.
    pub fn from_char(c: char) -> Option<Self> {
        let kind = match c {
            'M' => Self::Match,
            'I' => Self::Insertion,
            'D' => Self::Deletion,
            'N' => Self::Skip,
            'S' => Self::SoftClip,
            'H' => Self::HardClip,
            'P' => Self::Pad,
            '=' => Self::SequenceMatch,
            'X' => Self::SequenceMismatch,
            _ => return None,
        };
        Some(kind)
    }

    /// SAM operation character.
    pub fn as_char(self) -> char {
        match self {
            Self::Match => 'M',
            Self::Insertion => 'I',
            Self::Deletion => 'D',
            Self::Skip => 'N',
            Self::SoftClip => 'S',
            Self::HardClip => 'H',
            Self::Pad => 'P',
            Self::SequenceMatch => '=',
            Self::SequenceMismatch => 'X',
        }
    }

    /// Whether the operation advances along the reference.
    pub fn consumes_reference(self) -> bool {
        matches!(
            self,
            Self::Match | Self::Deletion | Self::Skip | Self::SequenceMatch | Self::SequenceMismatch
        )
    }
}

/// CIGAR operation with length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CigarOp {
    /// Operation kind.
    pub kind: CigarOpKind,
    /// Number of bases affected by the operation.
    pub len: u32,
}

impl CigarOp {
    /// Construct a new CIGAR operation.
    pub fn new(kind: CigarOpKind, len: u32) -> Self {
        Self { kind, len }
    }
}

/// Malformed CIGAR input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CigarError {
    /// Unrecognised operation character.
    #[error("invalid CIGAR operation '{0}'")]
    InvalidOperation(char),
    /// Operation character without a preceding length, or an overflowing length.
    #[error("invalid CIGAR length in '{0}'")]
    InvalidLength(String),
    /// Length and operation arrays disagree in size.
    #[error("CIGAR has {lengths} lengths but {operations} operations")]
    LengthMismatch {
        /// Number of lengths supplied.
        lengths: usize,
        /// Number of operation characters supplied.
        operations: usize,
    },
}

/// Ordered list of CIGAR operations. Empty for `*`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Cigar(Vec<CigarOp>);

impl Cigar {
    /// Wrap a list of operations.
    pub fn new(ops: Vec<CigarOp>) -> Self {
        Self(ops)
    }

    /// Build from the split representation used by binary frames.
    pub fn from_parts(lengths: &[u32], operations: &str) -> Result<Self, CigarError> {
        let op_count = operations.chars().count();
        if lengths.len() != op_count {
            return Err(CigarError::LengthMismatch {
                lengths: lengths.len(),
                operations: op_count,
            });
        }

        lengths
            .iter()
            .zip(operations.chars())
            .map(|(&len, c)| {
                CigarOpKind::from_char(c)
                    .map(|kind| CigarOp::new(kind, len))
                    .ok_or(CigarError::InvalidOperation(c))
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
    }

    /// Operations in read order.
    pub fn ops(&self) -> &[CigarOp] {
        &self.0
    }

    /// True when no operations are present.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of reference bases spanned by the alignment, saturating at `u32::MAX`.
    pub fn reference_len(&self) -> u32 {
        self.0
            .iter()
            .filter(|op| op.kind.consumes_reference())
            .fold(0u32, |total, op| total.saturating_add(op.len))
    }
}

impl FromStr for Cigar {
    type Err = CigarError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() || s == "*" {
            return Ok(Self::default());
        }

        let mut ops = Vec::new();
        let mut len: Option<u32> = None;
        for c in s.chars() {
            if let Some(digit) = c.to_digit(10) {
                let next = len
                    .unwrap_or(0)
                    .checked_mul(10)
                    .and_then(|n| n.checked_add(digit))
                    .ok_or_else(|| CigarError::InvalidLength(s.to_string()))?;
                len = Some(next);
            } else {
                let kind = CigarOpKind::from_char(c).ok_or(CigarError::InvalidOperation(c))?;
                let op_len = len.take().ok_or_else(|| CigarError::InvalidLength(s.to_string()))?;
                ops.push(CigarOp::new(kind, op_len));
            }
        }

        if len.is_some() {
            return Err(CigarError::InvalidLength(s.to_string()));
        }

        Ok(Self(ops))
    }
}

impl fmt::Display for Cigar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("*");
        }
        for op in &self.0 {
            write!(f, "{}{}", op.len, op.kind.as_char())?;
        }
        Ok(())
    }
}
