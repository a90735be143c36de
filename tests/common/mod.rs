#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use sambamba_stream::Engine;
use tempfile::TempDir;

/// Header document printed by the fake engine for `view -H --format=json`.
pub const HEADER_JSON: &str = r#"{"format_version":"1.6","sorting_order":"coordinate","sq_lines":[{"sequence_name":"chrM","sequence_length":16571},{"sequence_name":"chr1","sequence_length":249250621}],"rg_lines":[],"pg_lines":[]}"#;

/// Header text printed by the fake engine for `view -H`.
pub const HEADER_TEXT: &str = "@HD\tVN:1.6\tSO:coordinate\n@SQ\tSN:chrM\tLN:16571\n@SQ\tSN:chr1\tLN:249250621\n";

/// Engine that runs `script` through `sh -c`; invocation arguments arrive as `$@`.
pub fn shell(script: &str) -> Engine {
    Engine::new("sh").with_leading_args(["-c", script, "sambamba"])
}

/// Temporary directory holding an (empty) input file.
pub struct Fixture {
    pub dir: TempDir,
    pub path: PathBuf,
}

impl Fixture {
    pub fn new(name: &str) -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join(name);
        fs::write(&path, b"").expect("create input file");
        Self { dir, path }
    }

    pub fn file(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Write `contents` next to the input and return its path.
    pub fn write(&self, name: &str, contents: impl AsRef<[u8]>) -> PathBuf {
        let path = self.file(name);
        fs::write(&path, contents).expect("write fixture file");
        path
    }
}

/// One JSON record line as the engine prints it.
pub fn json_record(name: &str, flag: u16, pos: u32, mapq: u8) -> String {
    format!(
        r#"{{"qname":"{name}","flag":{flag},"rname":"chr1","pos":{pos},"mapq":{mapq},"cigar":"4M","rnext":"*","pnext":0,"tlen":0,"seq":"ACGT","qual":[30,30,30,30],"tags":{{"NM":0}}}}"#
    )
}

/// Script that answers header requests and otherwise prints `records` verbatim.
///
/// `count -c` prints the number of lines in `records`.
pub fn engine_printing(records_file: &Path) -> Engine {
    let script = format!(
        r#"
for arg in "$@"; do
  case "$arg" in
    -H) header=1 ;;
    --format=json) json=1 ;;
    -c) count=1 ;;
  esac
done
if [ -n "$header" ]; then
  if [ -n "$json" ]; then printf '%s' '{HEADER_JSON}'; else printf '{header_text}'; fi
  exit 0
fi
if [ -n "$count" ]; then wc -l < '{records}' | tr -d ' '; exit 0; fi
cat '{records}'
"#,
        header_text = HEADER_TEXT.replace('\t', "\\t").replace('\n', "\\n"),
        records = records_file.display(),
    );
    shell(&script)
}

/// Script that records its arguments, one per line, into `log` and prints nothing.
pub fn engine_logging_args(log: &Path) -> Engine {
    shell(&format!(
        r#"for arg in "$@"; do printf '%s\n' "$arg"; done > '{}'"#,
        log.display()
    ))
}

/// Lines written by [`engine_logging_args`].
pub fn logged_args(log: &Path) -> Vec<String> {
    fs::read_to_string(log)
        .expect("read argument log")
        .lines()
        .map(str::to_string)
        .collect()
}
