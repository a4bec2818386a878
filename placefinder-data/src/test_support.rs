//! Test doubles for the gateway's outbound seams.
//!
//! [`StubTransport`] replays scripted replies per mirror and counts calls, so
//! tests can assert on failover without a network. [`MemoryRequestLog`]
//! captures journal lines.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use placefinder_core::MirrorEndpoint;

use crate::journal::{GatewayEvent, RequestLog};
use crate::transport::{MirrorReply, MirrorTransport, TransportError, duration_millis};

/// One scripted reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StubReply {
    /// Return an HTTP response.
    Respond {
        /// HTTP status.
        status: u16,
        /// Response body.
        body: Vec<u8>,
    },
    /// Fail without a response.
    Fail(TransportError),
    /// Wait, then produce the inner reply. Delays longer than the attempt
    /// timeout end in [`TransportError::Timeout`] once the timeout elapses.
    Delay(Duration, Box<StubReply>),
}

impl StubReply {
    /// `200 OK` with `json` as the body.
    #[must_use]
    pub fn elements(json: &str) -> Self {
        Self::body(json)
    }

    /// `200 OK` with an empty `elements` array.
    #[must_use]
    pub fn empty() -> Self {
        Self::body(r#"{"version":0.6,"elements":[]}"#)
    }

    /// `200 OK` with an arbitrary body.
    #[must_use]
    pub fn body(text: &str) -> Self {
        Self::Respond {
            status: 200,
            body: text.as_bytes().to_vec(),
        }
    }

    /// Response with `status` and an empty body.
    #[must_use]
    pub fn status(status: u16) -> Self {
        Self::Respond {
            status,
            body: Vec::new(),
        }
    }

    /// Connection failure.
    #[must_use]
    pub fn network_error() -> Self {
        Self::Fail(TransportError::Network {
            url: "stub".to_owned(),
            message: "connection refused".to_owned(),
        })
    }
}

/// Scripted [`MirrorTransport`].
///
/// Each mirror replays its script in order; a mirror without a script, or
/// whose script is used up, fails with a network error.
///
/// # Example
///
/// ```
/// use placefinder_core::MirrorEndpoint;
/// use placefinder_data::test_support::{StubReply, StubTransport};
///
/// let mirror = MirrorEndpoint::from("https://a.test/api/interpreter");
/// let transport = StubTransport::new().with_script(&mirror, vec![StubReply::empty()]);
/// assert_eq!(transport.calls_to(&mirror), 0);
/// ```
#[derive(Debug, Default)]
pub struct StubTransport {
    scripts: Mutex<HashMap<MirrorEndpoint, VecDeque<StubReply>>>,
    calls: Mutex<HashMap<MirrorEndpoint, usize>>,
    queries: Mutex<Vec<String>>,
}

impl StubTransport {
    /// Transport with no scripts.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `replies` to the script for `mirror`.
    #[must_use]
    pub fn with_script(self, mirror: &MirrorEndpoint, replies: Vec<StubReply>) -> Self {
        self.scripts
            .lock()
            .entry(mirror.clone())
            .or_default()
            .extend(replies);
        self
    }

    /// Number of requests sent to `mirror`.
    #[must_use]
    pub fn calls_to(&self, mirror: &MirrorEndpoint) -> usize {
        self.calls.lock().get(mirror).copied().unwrap_or_default()
    }

    /// Number of requests sent to any mirror.
    #[must_use]
    pub fn total_calls(&self) -> usize {
        self.calls.lock().values().sum()
    }

    /// Query bodies received, in order.
    #[must_use]
    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().clone()
    }

    fn next_reply(&self, mirror: &MirrorEndpoint) -> StubReply {
        *self.calls.lock().entry(mirror.clone()).or_default() += 1;
        self.scripts
            .lock()
            .get_mut(mirror)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(StubReply::network_error)
    }
}

#[async_trait]
impl MirrorTransport for StubTransport {
    async fn post_query(
        &self,
        mirror: &MirrorEndpoint,
        query: &str,
        timeout: Duration,
    ) -> Result<MirrorReply, TransportError> {
        self.queries.lock().push(query.to_owned());
        let mut reply = self.next_reply(mirror);
        let mut waited = Duration::ZERO;
        loop {
            match reply {
                StubReply::Respond { status, body } => return Ok(MirrorReply { status, body }),
                StubReply::Fail(err) => return Err(err),
                StubReply::Delay(delay, inner) => {
                    let total = waited.saturating_add(delay);
                    if total > timeout {
                        tokio::time::sleep(timeout.saturating_sub(waited)).await;
                        return Err(TransportError::Timeout {
                            url: mirror.to_string(),
                            timeout_ms: duration_millis(timeout),
                        });
                    }
                    tokio::time::sleep(delay).await;
                    waited = total;
                    reply = *inner;
                }
            }
        }
    }
}

/// Journal that keeps rendered events in memory.
#[derive(Debug, Default)]
pub struct MemoryRequestLog {
    lines: Mutex<Vec<String>>,
}

impl MemoryRequestLog {
    /// Rendered events, oldest first.
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }
}

impl RequestLog for MemoryRequestLog {
    fn record(&self, event: &GatewayEvent) {
        self.lines.lock().push(event.to_string());
    }
}
