//! Golden command transcripts.
//!
//! A transcript is one JSON object per line recording what a source typed and
//! what it got back. Tests either stream records to disk with
//! [`TranscriptSink`] or compare an in-memory [`Transcript`] with a golden file.
//! Rerun with `MDC_UPDATE_SNAPSHOTS=1` to rewrite goldens.

use anyhow::{bail, Context, Result};
use mdcommand_core::SimTick;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

/// Environment variable that enables golden updates.
pub const UPDATE_SNAPSHOTS_ENV: &str = "MDC_UPDATE_SNAPSHOTS";

/// One command and its feedback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptRecord {
    /// Tick the command ran on.
    pub tick: SimTick,
    /// Text name of the invoking source.
    pub source: String,
    /// Input as typed.
    pub command: String,
    /// Whether the command parsed and was queued.
    pub accepted: bool,
    /// Lines the source's output received.
    pub output: Vec<String>,
}

/// Appends records to a JSONL file.
pub struct TranscriptSink {
    file: File,
}

impl TranscriptSink {
    /// Create (truncate) the file at `path`, creating parent directories.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = File::create(path)
            .with_context(|| format!("Failed to create transcript {}", path.display()))?;
        Ok(Self { file })
    }

    /// Append one record.
    pub fn write(&mut self, record: &TranscriptRecord) -> Result<()> {
        let line = serde_json::to_string(record)?;
        self.file.write_all(line.as_bytes())?;
        self.file.write_all(b"\n")?;
        Ok(())
    }
}

/// Records collected in memory.
#[derive(Debug, Default, Clone)]
pub struct Transcript {
    records: Vec<TranscriptRecord>,
}

impl Transcript {
    /// Empty transcript.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one record.
    pub fn push(&mut self, record: TranscriptRecord) {
        self.records.push(record);
    }

    /// Records in order.
    pub fn records(&self) -> &[TranscriptRecord] {
        &self.records
    }

    /// JSONL rendering, newline terminated.
    pub fn to_jsonl(&self) -> Result<String> {
        let mut out = String::new();
        for record in &self.records {
            out.push_str(&serde_json::to_string(record)?);
            out.push('\n');
        }
        Ok(out)
    }

    /// Parse a JSONL rendering.
    pub fn from_jsonl(text: &str) -> Result<Self> {
        let records = text
            .lines()
            .filter(|line| !line.trim().is_empty())
            .enumerate()
            .map(|(i, line)| {
                serde_json::from_str(line).with_context(|| format!("Bad transcript line {}", i + 1))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { records })
    }

    /// Compare with the golden file at `path`, or rewrite it in update mode.
    pub fn assert_golden<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if should_update() {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(path, self.to_jsonl()?)
                .with_context(|| format!("Failed to write golden {}", path.display()))?;
            tracing::info!(records = self.records.len(), "updated golden {}", path.display());
            return Ok(());
        }

        let text = fs::read_to_string(path).with_context(|| {
            format!(
                "Golden missing at {} (run with {}=1 to create)",
                path.display(),
                UPDATE_SNAPSHOTS_ENV
            )
        })?;
        let expected = Self::from_jsonl(&text)?;
        for (i, (want, got)) in expected.records.iter().zip(&self.records).enumerate() {
            if want != got {
                bail!(
                    "Transcript mismatch at {} line {}: expected {:?}, got {:?}",
                    path.display(),
                    i + 1,
                    want,
                    got
                );
            }
        }
        if expected.records.len() != self.records.len() {
            bail!(
                "Transcript length mismatch at {}: expected {}, got {}",
                path.display(),
                expected.records.len(),
                self.records.len()
            );
        }
        Ok(())
    }
}

fn should_update() -> bool {
    matches!(
        std::env::var(UPDATE_SNAPSHOTS_ENV).as_deref(),
        Ok("1") | Ok("true") | Ok("yes")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn record(command: &str) -> TranscriptRecord {
        TranscriptRecord {
            tick: SimTick(3),
            source: "Console".into(),
            command: command.into(),
            accepted: true,
            output: vec!["ok".into()],
        }
    }

    #[test]
    fn sink_writes_one_line_per_record() {
        let path = std::env::temp_dir().join(format!(
            "transcript-{}.jsonl",
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ));
        let mut sink = TranscriptSink::create(&path).expect("sink create");
        sink.write(&record("say a")).unwrap();
        sink.write(&record("say b")).unwrap();
        drop(sink);

        let contents = fs::read_to_string(&path).expect("file readable");
        let parsed = Transcript::from_jsonl(&contents).unwrap();
        assert_eq!(parsed.records(), &[record("say a"), record("say b")]);
        assert!(contents.starts_with(r#"{"tick":3,"source":"Console","command":"say a""#));
    }
}
