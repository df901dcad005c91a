//! Index build progress reporting.
//!
//! Reports observable progress during `civic index` (and the implicit index
//! check before `ask`/`chat`) so users see whether the cached index was
//! reused or how far a rebuild has got. Progress is emitted on **stderr**
//! so stdout remains parseable for scripts.

use std::io::Write;

/// A single progress event while ensuring the index.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IndexProgressEvent {
    /// Hashing the source documents.
    Fingerprinting { documents: usize },
    /// Extracting text from one document.
    Loading { document: String },
    /// Splitting one document's pages into chunks.
    Chunking { document: String, pages: usize },
    /// `n` of `total` chunks embedded.
    Embedding { n: u64, total: u64 },
    /// Writing the index to disk.
    Persisting,
    /// Index usable. `built` is false when the cached copy was reused.
    Ready { chunks: u64, built: bool },
}

/// Reports index progress. Implementations write to stderr (human or JSON).
pub trait IndexProgressReporter: Send + Sync {
    fn report(&self, event: IndexProgressEvent);
}

/// Human-friendly progress on stderr: "index  embedding  1,234 / 5,000 chunks".
pub struct StderrProgress;

impl IndexProgressReporter for StderrProgress {
    fn report(&self, event: IndexProgressEvent) {
        let line = match &event {
            IndexProgressEvent::Fingerprinting { documents } => {
                format!("index  fingerprinting {} document(s)...\n", documents)
            }
            IndexProgressEvent::Loading { document } => {
                format!("index  loading {}...\n", document)
            }
            IndexProgressEvent::Chunking { document, pages } => {
                format!(
                    "index  chunking {} ({} pages)\n",
                    document,
                    format_number(*pages as u64)
                )
            }
            IndexProgressEvent::Embedding { n, total } => format!(
                "index  embedding  {} / {} chunks\n",
                format_number(*n),
                format_number(*total)
            ),
            IndexProgressEvent::Persisting => "index  writing to disk...\n".to_string(),
            IndexProgressEvent::Ready { chunks, built } => format!(
                "index  ready ({} chunks, {})\n",
                format_number(*chunks),
                if *built { "rebuilt" } else { "cached" }
            ),
        };
        let _ = std::io::stderr().lock().write_all(line.as_bytes());
        let _ = std::io::stderr().lock().flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl IndexProgressReporter for JsonProgress {
    fn report(&self, event: IndexProgressEvent) {
        let obj = event_json(&event);
        if let Ok(line) = serde_json::to_string(&obj) {
            let _ = writeln!(std::io::stderr().lock(), "{}", line);
            let _ = std::io::stderr().lock().flush();
        }
    }
}

fn event_json(event: &IndexProgressEvent) -> serde_json::Value {
    match event {
        IndexProgressEvent::Fingerprinting { documents } => serde_json::json!({
            "event": "progress",
            "phase": "fingerprinting",
            "documents": documents
        }),
        IndexProgressEvent::Loading { document } => serde_json::json!({
            "event": "progress",
            "phase": "loading",
            "document": document
        }),
        IndexProgressEvent::Chunking { document, pages } => serde_json::json!({
            "event": "progress",
            "phase": "chunking",
            "document": document,
            "pages": pages
        }),
        IndexProgressEvent::Embedding { n, total } => serde_json::json!({
            "event": "progress",
            "phase": "embedding",
            "n": n,
            "total": total
        }),
        IndexProgressEvent::Persisting => serde_json::json!({
            "event": "progress",
            "phase": "persisting"
        }),
        IndexProgressEvent::Ready { chunks, built } => serde_json::json!({
            "event": "ready",
            "chunks": chunks,
            "built": built
        }),
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl IndexProgressReporter for NoProgress {
    fn report(&self, _event: IndexProgressEvent) {}
}

pub fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    let chars: Vec<char> = s.chars().rev().collect();
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(*c);
    }
    result.chars().rev().collect()
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    /// Parse the `--progress` flag value. `auto` defers to the TTY check.
    pub fn from_flag(flag: &str) -> Option<Self> {
        match flag {
            "auto" => Some(Self::default_for_tty()),
            "off" => Some(ProgressMode::Off),
            "human" => Some(ProgressMode::Human),
            "json" => Some(ProgressMode::Json),
            _ => None,
        }
    }

    pub fn reporter(&self) -> Box<dyn IndexProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}
