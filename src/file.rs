//! BAM and SAM file handles.
//!
//! A handle owns the path, the engine used to read it and lazily fetched
//! header data. Streams created from a handle share that state, so the
//! header is requested from the engine at most once per handle.

use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use tracing::debug;

use crate::engine::Engine;
use crate::header::SamHeader;
use crate::record::ReferenceNames;
use crate::stream::{AlignmentStream, Region};
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InputKind {
    Bam,
    Sam,
}

/// Shared state behind a file handle and every stream built from it.
#[derive(Debug)]
pub(crate) struct Source {
    engine: Engine,
    path: PathBuf,
    kind: InputKind,
    raw_header: OnceLock<String>,
    header: OnceLock<SamHeader>,
    references: OnceLock<ReferenceNames>,
}

impl Source {
    fn open(path: PathBuf, kind: InputKind, engine: Engine) -> Result<Self> {
        if !path.exists() {
            return Err(Error::FileNotFound(path));
        }
        debug!(path = %path.display(), ?kind, "opened alignment file");
        Ok(Self {
            engine,
            path,
            kind,
            raw_header: OnceLock::new(),
            header: OnceLock::new(),
            references: OnceLock::new(),
        })
    }

    pub(crate) fn engine(&self) -> &Engine {
        &self.engine
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    /// Extra flags telling the engine how to read the input.
    pub(crate) fn input_flags(&self) -> &'static [&'static str] {
        match self.kind {
            InputKind::Bam => &[],
            InputKind::Sam => &["-S"],
        }
    }

    fn header_args(&self, json: bool) -> Vec<String> {
        let mut args = vec!["view".to_string(), "-H".to_string()];
        if json {
            args.push("--format=json".to_string());
        }
        args.extend(self.input_flags().iter().map(|flag| flag.to_string()));
        args.push(self.path.to_string_lossy().into_owned());
        args
    }

    pub(crate) fn raw_header(&self) -> Result<&str> {
        if let Some(text) = self.raw_header.get() {
            return Ok(text);
        }
        let text = self.engine.run(&self.header_args(false))?;
        Ok(self.raw_header.get_or_init(|| text))
    }

    pub(crate) fn header(&self) -> Result<&SamHeader> {
        if let Some(header) = self.header.get() {
            return Ok(header);
        }
        let json = self.engine.run(&self.header_args(true))?;
        let header = SamHeader::from_json(&json)?;
        Ok(self.header.get_or_init(|| header))
    }

    pub(crate) fn references(&self) -> Result<ReferenceNames> {
        if let Some(names) = self.references.get() {
            return Ok(names.clone());
        }
        let names = self.header()?.references();
        Ok(self.references.get_or_init(|| names).clone())
    }

    fn has_index(&self) -> bool {
        index_candidates(&self.path).iter().any(|index| index.exists())
    }
}

// `x.bam.bai` and `x.bai`.
fn index_candidates(path: &Path) -> [PathBuf; 2] {
    let mut appended = path.as_os_str().to_owned();
    appended.push(".bai");
    [PathBuf::from(appended), path.with_extension("bai")]
}

macro_rules! alignment_file {
    ($(#[$meta:meta])* $name:ident, $kind:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone)]
        pub struct $name {
            source: Arc<Source>,
        }

        impl $name {
            /// Open `path` with the engine resolved from the environment.
            pub fn open(path: impl AsRef<Path>) -> Result<Self> {
                Self::open_with(path, Engine::from_env())
            }

            /// Open `path` using a specific engine.
            pub fn open_with(path: impl AsRef<Path>, engine: Engine) -> Result<Self> {
                let source = Source::open(path.as_ref().to_path_buf(), $kind, engine)?;
                Ok(Self {
                    source: Arc::new(source),
                })
            }

            /// Path the handle was opened with.
            pub fn path(&self) -> &Path {
                self.source.path()
            }

            /// Parsed header, fetched from the engine on first use.
            pub fn header(&self) -> Result<&SamHeader> {
                self.source.header()
            }

            /// Header text exactly as the engine prints it.
            pub fn raw_header(&self) -> Result<&str> {
                self.source.raw_header()
            }

            /// Reference sequence names in header order.
            pub fn references(&self) -> Result<ReferenceNames> {
                self.source.references()
            }

            /// Every alignment in the file.
            pub fn alignments(&self) -> AlignmentStream {
                AlignmentStream::new(Arc::clone(&self.source))
            }

            /// Alignments on `chromosome` overlapping `region`.
            pub fn fetch(&self, chromosome: impl Into<String>, region: impl Into<Region>) -> AlignmentStream {
                self.alignments().restrict_to(chromosome).overlapping(region)
            }
        }
    };
}

alignment_file!(
    /// Handle on a BAM file.
    BamFile,
    InputKind::Bam
);

alignment_file!(
    /// Handle on a SAM file; every invocation passes `-S`.
    SamFile,
    InputKind::Sam
);

impl BamFile {
    /// Whether a `.bai` index sits next to the file.
    pub fn has_index(&self) -> bool {
        self.source.has_index()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_candidates() {
        let [appended, replaced] = index_candidates(Path::new("/data/reads.bam"));
        assert_eq!(appended, PathBuf::from("/data/reads.bam.bai"));
        assert_eq!(replaced, PathBuf::from("/data/reads.bai"));
    }

    #[test]
    fn test_missing_file() {
        let err = BamFile::open_with("/nonexistent/reads.bam", Engine::new("true")).unwrap_err();
        assert!(matches!(err, Error::FileNotFound(path) if path.ends_with("reads.bam")));
    }

    #[test]
    fn test_sam_header_args_carry_input_flag() {
        let source = Source {
            engine: Engine::new("sambamba"),
            path: PathBuf::from("reads.sam"),
            kind: InputKind::Sam,
            raw_header: OnceLock::new(),
            header: OnceLock::new(),
            references: OnceLock::new(),
        };
        assert_eq!(
            source.header_args(true),
            ["view", "-H", "--format=json", "-S", "reads.sam"]
        );
        assert_eq!(source.header_args(false), ["view", "-H", "-S", "reads.sam"]);
    }
}
