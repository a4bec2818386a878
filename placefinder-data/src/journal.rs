//! Request journal: a best-effort audit trail of gateway activity.
//!
//! Sinks must never fail or noticeably delay a search; write errors are
//! logged and dropped.

use std::fmt;
use std::io;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};
use std::time::{SystemTime, UNIX_EPOCH};

use camino::{Utf8Path, Utf8PathBuf};
use log::{info, warn};
use placefinder_core::{CacheKey, ErrorKind, MirrorEndpoint};

use crate::gateway::ReplyOrigin;

/// Maximum number of query characters written to the journal.
pub const QUERY_PREVIEW_CHARS: usize = 200;

/// A notable step in handling one search.
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayEvent {
    /// A search arrived.
    RequestReceived {
        /// Raw search term.
        search: Option<String>,
        /// Raw bounding box.
        bbox: Option<String>,
        /// Raw limit.
        limit: Option<String>,
    },
    /// Validation rejected the search.
    Rejected {
        /// Reported error.
        kind: ErrorKind,
    },
    /// The upstream query was built.
    QueryBuilt {
        /// Cache key derived from the query.
        key: CacheKey,
        /// Full query text; truncated when rendered.
        query: String,
    },
    /// A cache tier answered the search.
    CacheHit {
        /// Tier that held the payload.
        origin: ReplyOrigin,
        /// Cache key.
        key: CacheKey,
    },
    /// One attempt against a mirror completed.
    Attempt {
        /// Mirror contacted.
        mirror: MirrorEndpoint,
        /// Attempt number for this mirror, starting at one.
        attempt: u32,
        /// Outcome summary.
        outcome: String,
        /// HTTP status, when a response was received.
        status: Option<u16>,
        /// Round-trip time in milliseconds.
        latency_ms: u64,
    },
    /// A reply was produced.
    Completed {
        /// HTTP status for the reply.
        status: u16,
        /// Where the reply came from.
        origin: ReplyOrigin,
        /// Number of results returned.
        results: usize,
        /// Reported error, if any.
        error: Option<ErrorKind>,
    },
}

fn preview(text: &str) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(QUERY_PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{head}…")
    } else {
        head
    }
}

impl fmt::Display for GatewayEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RequestReceived {
                search,
                bbox,
                limit,
            } => write!(
                f,
                "request search={:?} bbox={:?} limit={:?}",
                search.as_deref().unwrap_or_default(),
                bbox.as_deref().unwrap_or_default(),
                limit.as_deref().unwrap_or_default()
            ),
            Self::Rejected { kind } => write!(f, "rejected error={kind}"),
            Self::QueryBuilt { key, query } => {
                write!(f, "query key={key} text={:?}", preview(query))
            }
            Self::CacheHit { origin, key } => write!(f, "cache-hit tier={origin} key={key}"),
            Self::Attempt {
                mirror,
                attempt,
                outcome,
                status,
                latency_ms,
            } => {
                write!(f, "attempt mirror={mirror} n={attempt} outcome={outcome}")?;
                if let Some(code) = status {
                    write!(f, " status={code}")?;
                }
                write!(f, " latency_ms={latency_ms}")
            }
            Self::Completed {
                status,
                origin,
                results,
                error,
            } => {
                write!(f, "response status={status} origin={origin} results={results}")?;
                if let Some(kind) = error {
                    write!(f, " error={kind}")?;
                }
                Ok(())
            }
        }
    }
}

/// Destination for [`GatewayEvent`]s.
pub trait RequestLog: Send + Sync {
    /// Record `event`. Implementations swallow their own failures.
    fn record(&self, event: &GatewayEvent);
}

/// Forwards events to the `log` facade at `info` level.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogRequestLog;

impl RequestLog for LogRequestLog {
    fn record(&self, event: &GatewayEvent) {
        info!(target: "placefinder::journal", "{event}");
    }
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullRequestLog;

impl RequestLog for NullRequestLog {
    fn record(&self, _event: &GatewayEvent) {}
}

/// Appends `<unix-millis> <event>` lines to a file.
///
/// Lines are handed to a dedicated writer thread, so [`RequestLog::record`]
/// never performs file I/O on the caller's thread. Dropping the journal
/// waits for queued lines to be written.
#[derive(Debug)]
pub struct FileRequestLog {
    path: Utf8PathBuf,
    lines: Option<Sender<String>>,
    writer: Option<JoinHandle<()>>,
}

impl FileRequestLog {
    /// Journal writing to `path`; the file and its parents are created on
    /// first write.
    ///
    /// # Errors
    ///
    /// Returns an error when the writer thread cannot be started.
    pub fn new(path: impl Into<Utf8PathBuf>) -> io::Result<Self> {
        let path = path.into();
        let (lines, queued) = mpsc::channel();
        let target = path.clone();
        let writer = thread::Builder::new()
            .name("placefinder-journal".to_owned())
            .spawn(move || write_lines(&target, &queued))?;
        Ok(Self {
            path,
            lines: Some(lines),
            writer: Some(writer),
        })
    }

    /// Location of the journal file.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }
}

fn write_lines(path: &Utf8Path, queued: &Receiver<String>) {
    for line in queued {
        if let Err(err) = placefinder_fs::append_line(path, &line) {
            warn!("failed to append to request journal {path}: {err}");
        }
    }
}

impl RequestLog for FileRequestLog {
    fn record(&self, event: &GatewayEvent) {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |elapsed| elapsed.as_millis());
        let Some(lines) = &self.lines else {
            return;
        };
        if lines.send(format!("{millis} {event}")).is_err() {
            warn!("request journal writer for {} has stopped", self.path);
        }
    }
}

impl Drop for FileRequestLog {
    fn drop(&mut self) {
        drop(self.lines.take());
        if let Some(writer) = self.writer.take() {
            if writer.join().is_err() {
                warn!("request journal writer for {} panicked", self.path);
            }
        }
    }
}
