//! # Lazy, filterable alignment streams backed by sambamba
//!
//! This library exposes the alignment records of BAM and SAM files as an
//! ordinary Rust iterator. Reading, decompression and filtering are delegated
//! to the external `sambamba` engine; the crate's own work is in two places:
//!
//! 1. **Filter compilation**: predicates written with typed accessors
//!    ([`query::Query`]) are validated and rendered into the engine's filter
//!    language in a single pass.
//! 2. **Stream composition**: chromosome/region restrictions, filters and the
//!    validity-only mode are folded into one engine invocation that starts
//!    only when iteration begins ([`AlignmentStream`]).
//!
//! ## Usage Example
//!
//! ```no_run
//! use sambamba_stream::BamFile;
//!
//! let bam = BamFile::open("sample.bam")?;
//! let reads = bam
//!     .fetch("chr1", 10_000..=20_000)
//!     .select(|q| {
//!         q.mapping_quality().ge(30)?;
//!         q.flag_is_unset("duplicate")
//!     })?;
//!
//! for read in reads {
//!     let read = read?;
//!     println!("{}\t{:?}", read.read_name(), read.position());
//! }
//! # Ok::<(), sambamba_stream::Error>(())
//! ```

#![warn(missing_docs, missing_debug_implementations)]

pub mod engine;   // External process collaborator
pub mod file;     // BAM/SAM file handles
pub mod header;   // SAM header model
pub mod query;    // Filter-expression compiler
pub mod record;   // Decoded alignment records
pub mod stream;   // Lazy alignment streams

// Re-exports for convenience
pub use engine::Engine;
pub use file::{BamFile, SamFile};
pub use header::SamHeader;
pub use query::{compile, Filter, Query, QueryError};
pub use record::{Alignment, Flags, Tag, TagValue};
pub use stream::{AlignmentStream, Alignments, Format, Region};

use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced by file handles and streams.
#[derive(Error, Debug)]
pub enum Error {
    /// Predicate could not be compiled.
    #[error(transparent)]
    Query(#[from] QueryError),

    /// Stream configuration cannot be turned into an invocation.
    #[error("invalid stream configuration: {0}")]
    Configuration(String),

    /// Engine output did not have the expected record shape.
    #[error("unexpected engine output: {raw:?}")]
    ProtocolViolation {
        /// Offending output unit.
        raw: String,
    },

    /// A record-shaped output unit could not be decoded.
    #[error("failed to decode record {record} ({raw:?}): {source}")]
    Decode {
        /// 1-based index of the record in the stream.
        record: u64,
        /// Engine output for the record, lossily converted to text.
        raw: String,
        /// Underlying decode failure.
        #[source]
        source: record::DecodeError,
    },

    /// Header output could not be parsed.
    #[error(transparent)]
    Header(#[from] header::HeaderError),

    /// Engine wrote to stderr or exited abnormally.
    #[error("`{command}` failed ({status}): {stderr}")]
    ExternalProcess {
        /// Full command line.
        command: String,
        /// Exit status description.
        status: String,
        /// Captured stderr, verbatim.
        stderr: String,
    },

    /// Engine executable could not be started.
    #[error("failed to start {program}: {source}")]
    Spawn {
        /// Executable that was attempted.
        program: PathBuf,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },

    /// Input file does not exist.
    #[error("file {0} does not exist")]
    FileNotFound(PathBuf),

    /// I/O failure while talking to the engine.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;
