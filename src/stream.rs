//! Lazy alignment streams.
//!
//! An [`AlignmentStream`] is an immutable description of one engine
//! invocation. Chaining methods return new values; nothing runs until the
//! stream is iterated (or counted). Iteration yields an [`Alignments`]
//! iterator that owns the child process, decodes one record at a time in the
//! order the engine emits them, and kills the child if dropped early.

use std::fmt;
use std::io::{BufRead, Read};
use std::iter::FusedIterator;
use std::mem;
use std::ops::{Range, RangeInclusive};
use std::sync::Arc;

use tracing::{debug, trace};

use crate::engine::EngineProcess;
use crate::file::Source;
use crate::query::{compile, Filter, Query, QueryError};
use crate::record::{Alignment, DecodeError, MsgPackRecord, ReferenceNames};
use crate::{Error, Result};

/// Records decoded between two buffer reclamation passes.
pub const RECLAIM_INTERVAL: u64 = 4096;

const LINE_CAPACITY: usize = 1024;

/// Output format requested from the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Format {
    /// One JSON object per line (`--format=json`).
    #[default]
    Json,
    /// One MessagePack array per record (`--format=msgpack`).
    MsgPack,
}

impl Format {
    fn flag(self) -> &'static str {
        match self {
            Format::Json => "--format=json",
            Format::MsgPack => "--format=msgpack",
        }
    }
}

/// Closed, 1-based genomic interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Region {
    start: u32,
    end: u32,
}

impl Region {
    /// Interval `[start, end]`, both ends 1-based and inclusive.
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    /// First position.
    pub fn start(&self) -> u32 {
        self.start
    }

    /// Last position.
    pub fn end(&self) -> u32 {
        self.end
    }

    fn validate(&self) -> Result<()> {
        if self.start == 0 || self.start > self.end {
            return Err(Error::Configuration(format!(
                "region {self} is empty or not 1-based"
            )));
        }
        Ok(())
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

impl From<RangeInclusive<u32>> for Region {
    fn from(range: RangeInclusive<u32>) -> Self {
        Self::new(*range.start(), *range.end())
    }
}

impl From<Range<u32>> for Region {
    /// Half-open ranges are converted to the closed interval they cover.
    fn from(range: Range<u32>) -> Self {
        Self::new(range.start, range.end.saturating_sub(1))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Records,
    Count,
}

/// Immutable, chainable description of an alignment query.
#[derive(Debug, Clone)]
pub struct AlignmentStream {
    source: Arc<Source>,
    format: Format,
    chromosome: Option<String>,
    region: Option<Region>,
    filter: Option<Filter>,
    valid_only: bool,
}

impl AlignmentStream {
    pub(crate) fn new(source: Arc<Source>) -> Self {
        Self {
            source,
            format: Format::default(),
            chromosome: None,
            region: None,
            filter: None,
            valid_only: false,
        }
    }

    /// Attach a filter; an existing filter is combined with `and`.
    pub fn with_filter(self, filter: Filter) -> Self {
        let filter = match self.filter {
            Some(existing) => existing.and(filter),
            None => filter,
        };
        Self {
            filter: Some(filter),
            ..self
        }
    }

    /// Compile `predicate` and attach it as a filter.
    pub fn select<F>(self, predicate: F) -> Result<Self>
    where
        F: FnOnce(&mut Query) -> Result<(), QueryError>,
    {
        Ok(self.with_filter(compile(predicate)?))
    }

    /// Only report alignments on `chromosome`.
    pub fn restrict_to(self, chromosome: impl Into<String>) -> Self {
        Self {
            chromosome: Some(chromosome.into()),
            ..self
        }
    }

    /// Only report alignments overlapping `region` (1-based) on the chosen chromosome.
    pub fn overlapping(self, region: impl Into<Region>) -> Self {
        Self {
            region: Some(region.into()),
            ..self
        }
    }

    /// Have the engine drop structurally invalid records.
    pub fn validated_only(self) -> Self {
        Self {
            valid_only: true,
            ..self
        }
    }

    /// Choose the engine output format.
    pub fn with_format(self, format: Format) -> Self {
        Self { format, ..self }
    }

    /// Attached filter, if any.
    pub fn filter(&self) -> Option<&Filter> {
        self.filter.as_ref()
    }

    /// Chromosome restriction, if any.
    pub fn chromosome(&self) -> Option<&str> {
        self.chromosome.as_deref()
    }

    /// Region restriction, if any.
    pub fn region(&self) -> Option<Region> {
        self.region
    }

    /// Whether validity-only mode is on.
    pub fn is_validated_only(&self) -> bool {
        self.valid_only
    }

    /// Output format.
    pub fn format(&self) -> Format {
        self.format
    }

    /// Engine arguments for iterating this stream.
    pub fn invocation(&self) -> Result<Vec<String>> {
        self.arguments(Mode::Records)
    }

    /// Ask the engine for the number of matching records.
    pub fn count(&self) -> Result<u64> {
        let args = self.arguments(Mode::Count)?;
        let output = self.source.engine().run(&args)?;
        let output = output.trim();
        output.parse().map_err(|_| Error::ProtocolViolation {
            raw: output.to_string(),
        })
    }

    /// Start a fresh pass over the stream.
    pub fn iter(&self) -> Alignments {
        self.clone().into_iter()
    }

    fn arguments(&self, mode: Mode) -> Result<Vec<String>> {
        let region = self.region_token()?;

        let mut args = vec!["view".to_string()];
        match mode {
            Mode::Records => args.push(self.format.flag().to_string()),
            Mode::Count => args.push("-c".to_string()),
        }
        args.extend(self.source.input_flags().iter().map(|flag| flag.to_string()));
        if let Some(filter) = &self.filter {
            args.push("-F".to_string());
            args.push(filter.to_string());
        }
        if self.valid_only {
            args.push("--valid".to_string());
        }
        args.push(self.source.path().to_string_lossy().into_owned());
        args.extend(region);
        Ok(args)
    }

    // Positional region argument; bounds are passed through 1-based.
    fn region_token(&self) -> Result<Option<String>> {
        match (self.chromosome.as_deref(), self.region) {
            (None, None) => Ok(None),
            (None, Some(region)) => Err(Error::Configuration(format!(
                "region {region} was given without a chromosome"
            ))),
            (Some(""), _) => Err(Error::Configuration("chromosome name is empty".to_string())),
            (Some(chromosome), None) => Ok(Some(chromosome.to_string())),
            (Some(chromosome), Some(region)) => {
                region.validate()?;
                Ok(Some(format!("{chromosome}:{region}")))
            }
        }
    }

    fn start(self) -> Result<Running> {
        let args = self.invocation()?;
        let decoder = match self.format {
            Format::Json => Decoder::Json {
                line: Vec::with_capacity(LINE_CAPACITY),
            },
            Format::MsgPack => Decoder::MsgPack {
                references: self.source.references()?,
                frame: Vec::with_capacity(LINE_CAPACITY),
            },
        };
        let process = self.source.engine().spawn(&args)?;
        Ok(Running {
            process,
            decoder,
            records: 0,
        })
    }
}

impl IntoIterator for AlignmentStream {
    type Item = Result<Alignment>;
    type IntoIter = Alignments;

    fn into_iter(self) -> Self::IntoIter {
        Alignments {
            state: State::Pending(self),
        }
    }
}

impl IntoIterator for &AlignmentStream {
    type Item = Result<Alignment>;
    type IntoIter = Alignments;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Single-pass iterator over the records of one engine invocation.
///
/// The engine starts on the first call to `next`. After the last record the
/// child is reaped and its stderr checked; after any error the iterator is
/// fused.
#[derive(Debug)]
pub struct Alignments {
    state: State,
}

#[derive(Debug)]
enum State {
    Pending(AlignmentStream),
    Running(Box<Running>),
    Done,
}

impl Alignments {
    /// OS process id of the engine while it is running.
    pub fn process_id(&self) -> Option<u32> {
        match &self.state {
            State::Running(running) => Some(running.process.id()),
            _ => None,
        }
    }
}

impl Iterator for Alignments {
    type Item = Result<Alignment>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match mem::replace(&mut self.state, State::Done) {
                State::Pending(stream) => match stream.start() {
                    Ok(running) => self.state = State::Running(Box::new(running)),
                    Err(err) => return Some(Err(err)),
                },
                State::Running(mut running) => {
                    return match running.next_record() {
                        Ok(Some(alignment)) => {
                            self.state = State::Running(running);
                            Some(Ok(alignment))
                        }
                        Ok(None) => running.finish().err().map(Err),
                        // Dropping `running` terminates the engine.
                        Err(err) => Some(Err(err)),
                    };
                }
                State::Done => return None,
            }
        }
    }
}

impl FusedIterator for Alignments {}

#[derive(Debug)]
struct Running {
    process: EngineProcess,
    decoder: Decoder,
    records: u64,
}

#[derive(Debug)]
enum Decoder {
    Json {
        line: Vec<u8>,
    },
    MsgPack {
        references: ReferenceNames,
        frame: Vec<u8>,
    },
}

fn is_array_marker(byte: u8) -> bool {
    matches!(byte, 0x90..=0x9f | 0xdc | 0xdd)
}

fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

// Keeps a copy of every byte the decoder consumes from `inner`.
struct Recording<'a, R> {
    inner: R,
    bytes: &'a mut Vec<u8>,
}

impl<R: Read> Read for Recording<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.bytes.extend_from_slice(&buf[..n]);
        Ok(n)
    }
}

impl Running {
    fn next_record(&mut self) -> Result<Option<Alignment>> {
        let record = self.records + 1;
        let stdout = self.process.stdout();

        let alignment = match &mut self.decoder {
            Decoder::Json { line } => {
                line.clear();
                if stdout.read_until(b'\n', line)? == 0 {
                    return Ok(None);
                }
                while matches!(line.last(), Some(b'\n' | b'\r')) {
                    line.pop();
                }
                let unit = std::str::from_utf8(line)
                    .map_err(|_| Error::ProtocolViolation { raw: lossy(line) })?;
                if !unit.starts_with('{') {
                    return Err(Error::ProtocolViolation {
                        raw: unit.to_string(),
                    });
                }
                Alignment::from_json(unit).map_err(|source| Error::Decode {
                    record,
                    raw: unit.to_string(),
                    source,
                })?
            }
            Decoder::MsgPack { references, frame } => {
                let Some(first) = stdout.fill_buf()?.first().copied() else {
                    return Ok(None);
                };
                if !is_array_marker(first) {
                    let mut raw = Vec::new();
                    stdout.read_until(b'\n', &mut raw)?;
                    return Err(Error::ProtocolViolation {
                        raw: String::from_utf8_lossy(&raw).trim_end().to_string(),
                    });
                }
                frame.clear();
                let reader = Recording {
                    inner: stdout.by_ref(),
                    bytes: frame,
                };
                let decoded = rmp_serde::from_read::<_, MsgPackRecord>(reader)
                    .map_err(DecodeError::from)
                    .and_then(|parsed| parsed.into_alignment(references));
                decoded.map_err(|source| Error::Decode {
                    record,
                    raw: lossy(frame),
                    source,
                })?
            }
        };

        self.records = record;
        if self.records % RECLAIM_INTERVAL == 0 {
            self.reclaim();
        }
        Ok(Some(alignment))
    }

    // Large records grow the decode buffer; shrink it back periodically.
    fn reclaim(&mut self) {
        let buffer = match &mut self.decoder {
            Decoder::Json { line } => line,
            Decoder::MsgPack { frame, .. } => frame,
        };
        if buffer.capacity() > LINE_CAPACITY * 4 {
            buffer.clear();
            buffer.shrink_to(LINE_CAPACITY);
        }
        trace!(records = self.records, "reclaimed decode buffers");
    }

    fn finish(self) -> Result<()> {
        debug!(records = self.records, "engine output exhausted");
        self.process.finish()
    }
}
