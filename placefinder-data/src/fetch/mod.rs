//! Sequential failover across ranked Overpass mirrors.
//!
//! [`FetchExecutor`] walks the ranked mirror list one mirror at a time and
//! stops at the first response carrying elements. Within a mirror it
//! retries transport errors, non-2xx statuses and empty bodies with a linear
//! backoff. Well-formed but empty answers and unparseable bodies move on to
//! the next mirror immediately. A mirror that answers with no elements is
//! not used, so a list where every mirror answered empty is exhausted like
//! any other. Every attempt is recorded in the [`StatsStore`] and the
//! request journal.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};
use placefinder_core::{MirrorEndpoint, Observation, OverpassQuery, RawElement, StatsStore};
use thiserror::Error;
use tokio::time::{Instant, sleep};

use crate::journal::{GatewayEvent, RequestLog};
use crate::overpass::parse_elements;
use crate::transport::{MirrorReply, MirrorTransport, TransportError, duration_millis};

/// Default number of attempts made against each mirror.
pub const DEFAULT_ATTEMPTS_PER_MIRROR: u32 = 2;
/// Default backoff unit; the pause after attempt `n` is `n` units.
pub const DEFAULT_BACKOFF_STEP: Duration = Duration::from_millis(150);
/// Default per-attempt request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(25);
/// Default end-to-end budget for one fetch.
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(60);

/// Retry and timeout settings for [`FetchExecutor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts per mirror before moving on.
    pub attempts_per_mirror: u32,
    /// Backoff unit between attempts on the same mirror.
    pub backoff_step: Duration,
    /// Upper bound on a single attempt.
    pub request_timeout: Duration,
    /// End-to-end budget; `None` disables it.
    pub deadline: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts_per_mirror: DEFAULT_ATTEMPTS_PER_MIRROR,
            backoff_step: DEFAULT_BACKOFF_STEP,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            deadline: Some(DEFAULT_DEADLINE),
        }
    }
}

impl RetryPolicy {
    /// Set the attempts per mirror.
    #[must_use]
    pub fn with_attempts_per_mirror(mut self, attempts: u32) -> Self {
        self.attempts_per_mirror = attempts;
        self
    }

    /// Set the backoff unit.
    #[must_use]
    pub fn with_backoff_step(mut self, step: Duration) -> Self {
        self.backoff_step = step;
        self
    }

    /// Set the per-attempt timeout.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set or clear the end-to-end deadline.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }
}

/// Elements served by a mirror.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchSuccess {
    /// Mirror that answered.
    pub mirror: MirrorEndpoint,
    /// Elements in upstream order.
    pub elements: Vec<RawElement>,
    /// Round-trip time of the successful attempt.
    pub latency: Duration,
    /// Attempts made across all mirrors, including the successful one.
    pub attempts: u32,
}

/// The mirror list was exhausted without a usable answer.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum FetchFailure {
    /// No mirror produced a usable response.
    #[error(
        "all Overpass mirrors failed after {attempts} attempts: {}",
        .last_error.as_deref().unwrap_or("no mirrors tried")
    )]
    Unreachable {
        /// Last mirror contacted.
        last_mirror: Option<MirrorEndpoint>,
        /// Description of the last failure.
        last_error: Option<String>,
        /// HTTP status of the last failure, if a response was received.
        http_status: Option<u16>,
        /// Attempts made.
        attempts: u32,
        /// Time spent before giving up.
        elapsed: Duration,
    },
    /// The last mirror tried returned a body that is not Overpass JSON.
    #[error("{mirror} returned an unreadable response (HTTP {http_status}): {detail}")]
    InvalidResponse {
        /// Mirror that sent the body.
        mirror: MirrorEndpoint,
        /// HTTP status of that response.
        http_status: u16,
        /// Parser error.
        detail: String,
        /// Attempts made.
        attempts: u32,
    },
}

/// Classification of one attempt.
#[derive(Debug)]
enum Verdict {
    Usable(Vec<RawElement>),
    Empty,
    Invalid { status: u16, detail: String },
    Failed { status: Option<u16>, error: String },
}

impl Verdict {
    fn from_result(result: Result<MirrorReply, TransportError>) -> Self {
        let reply = match result {
            Ok(reply) => reply,
            Err(err) => {
                return Self::Failed {
                    status: None,
                    error: err.to_string(),
                };
            }
        };
        if !reply.is_success() {
            return Self::Failed {
                status: Some(reply.status),
                error: format!("HTTP {}", reply.status),
            };
        }
        if reply.body.iter().all(u8::is_ascii_whitespace) {
            return Self::Failed {
                status: Some(reply.status),
                error: "empty response body".to_owned(),
            };
        }
        match parse_elements(&reply.body) {
            Ok(parsed) if parsed.elements.is_empty() => {
                if let Some(remark) = parsed.remark {
                    debug!("mirror returned no elements: {remark}");
                }
                Self::Empty
            }
            Ok(parsed) => Self::Usable(parsed.elements),
            Err(err) => Self::Invalid {
                status: reply.status,
                detail: err.to_string(),
            },
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Self::Usable(_) => "ok",
            Self::Empty => "no-elements",
            Self::Invalid { .. } => "invalid-body",
            Self::Failed { status: None, .. } => "transport-error",
            Self::Failed {
                status: Some(code), ..
            } if (200..300).contains(code) => "empty-body",
            Self::Failed { .. } => "http-error",
        }
    }

    fn status(&self) -> Option<u16> {
        match self {
            Self::Invalid { status, .. } => Some(*status),
            Self::Failed { status, .. } => *status,
            Self::Usable(_) | Self::Empty => None,
        }
    }

    fn observation(&self, latency: Duration) -> Observation {
        let millis = latency.as_secs_f64() * 1000.0;
        match self {
            Self::Usable(_) | Self::Empty => Observation::success(millis),
            Self::Invalid { .. } | Self::Failed { status: Some(_), .. } => {
                Observation::failure(Some(millis))
            }
            Self::Failed { status: None, .. } => Observation::failure(None),
        }
    }
}

/// Reason reported when the last mirror tried answered with no elements.
pub const NO_ELEMENTS_ERROR: &str = "no mirror returned elements";

/// Last failure seen, reported when the loop is exhausted.
#[derive(Debug)]
enum LastFailure {
    Invalid {
        mirror: MirrorEndpoint,
        status: u16,
        detail: String,
    },
    Failed {
        mirror: MirrorEndpoint,
        status: Option<u16>,
        error: String,
    },
}

/// Executes an Overpass query against ranked mirrors.
pub struct FetchExecutor {
    transport: Arc<dyn MirrorTransport>,
    stats: Arc<dyn StatsStore>,
    journal: Arc<dyn RequestLog>,
    policy: RetryPolicy,
}

impl std::fmt::Debug for FetchExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchExecutor")
            .field("stats", &self.stats.backend())
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl FetchExecutor {
    /// Create an executor.
    #[must_use]
    pub fn new(
        transport: Arc<dyn MirrorTransport>,
        stats: Arc<dyn StatsStore>,
        journal: Arc<dyn RequestLog>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            transport,
            stats,
            journal,
            policy,
        }
    }

    /// Retry settings in force.
    #[must_use]
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run `query` against `mirrors` in order.
    ///
    /// # Errors
    ///
    /// Returns [`FetchFailure`] when no mirror produced elements or when the
    /// deadline expires.
    pub async fn fetch(
        &self,
        mirrors: &[MirrorEndpoint],
        query: &OverpassQuery,
    ) -> Result<FetchSuccess, FetchFailure> {
        let started = Instant::now();
        let deadline = self.policy.deadline.map(|budget| started + budget);
        let mut attempts = 0_u32;
        let mut last_failure = None;
        let mut deadline_hit = false;

        'mirrors: for mirror in mirrors {
            for attempt in 1..=self.policy.attempts_per_mirror {
                if attempt > 1 {
                    let pause = self.policy.backoff_step.saturating_mul(attempt - 1);
                    if remaining(deadline).is_some_and(|left| left <= pause) {
                        deadline_hit = true;
                        break 'mirrors;
                    }
                    sleep(pause).await;
                }
                let budget = match remaining(deadline) {
                    Some(left) if left.is_zero() => {
                        deadline_hit = true;
                        break 'mirrors;
                    }
                    Some(left) => left.min(self.policy.request_timeout),
                    None => self.policy.request_timeout,
                };

                attempts = attempts.saturating_add(1);
                let sent = Instant::now();
                let result = self
                    .transport
                    .post_query(mirror, query.as_str(), budget)
                    .await;
                let latency = sent.elapsed();
                let verdict = Verdict::from_result(result);
                self.observe(mirror, attempt, &verdict, latency).await;

                match verdict {
                    Verdict::Usable(elements) => {
                        return Ok(FetchSuccess {
                            mirror: mirror.clone(),
                            elements,
                            latency,
                            attempts,
                        });
                    }
                    Verdict::Empty => {
                        last_failure = Some(LastFailure::Failed {
                            mirror: mirror.clone(),
                            status: None,
                            error: NO_ELEMENTS_ERROR.to_owned(),
                        });
                        continue 'mirrors;
                    }
                    Verdict::Invalid { status, detail } => {
                        last_failure = Some(LastFailure::Invalid {
                            mirror: mirror.clone(),
                            status,
                            detail,
                        });
                        continue 'mirrors;
                    }
                    Verdict::Failed { status, error } => {
                        last_failure = Some(LastFailure::Failed {
                            mirror: mirror.clone(),
                            status,
                            error,
                        });
                    }
                }
            }
        }

        let elapsed = started.elapsed();
        if deadline_hit {
            let budget_ms = self.policy.deadline.map_or(0, duration_millis);
            let (last_mirror, http_status) = match &last_failure {
                Some(LastFailure::Invalid { mirror, status, .. }) => {
                    (Some(mirror.clone()), Some(*status))
                }
                Some(LastFailure::Failed { mirror, status, .. }) => (Some(mirror.clone()), *status),
                None => (None, None),
            };
            warn!("fetch deadline of {budget_ms} ms exceeded after {attempts} attempts");
            return Err(FetchFailure::Unreachable {
                last_mirror,
                last_error: Some(format!("deadline of {budget_ms} ms exceeded")),
                http_status,
                attempts,
                elapsed,
            });
        }
        Err(match last_failure {
            Some(LastFailure::Invalid {
                mirror,
                status,
                detail,
            }) => FetchFailure::InvalidResponse {
                mirror,
                http_status: status,
                detail,
                attempts,
            },
            Some(LastFailure::Failed {
                mirror,
                status,
                error,
            }) => FetchFailure::Unreachable {
                last_mirror: Some(mirror),
                last_error: Some(error),
                http_status: status,
                attempts,
                elapsed,
            },
            None => FetchFailure::Unreachable {
                last_mirror: None,
                last_error: Some("no mirrors configured".to_owned()),
                http_status: None,
                attempts,
                elapsed,
            },
        })
    }

    async fn observe(
        &self,
        mirror: &MirrorEndpoint,
        attempt: u32,
        verdict: &Verdict,
        latency: Duration,
    ) {
        self.journal.record(&GatewayEvent::Attempt {
            mirror: mirror.clone(),
            attempt,
            outcome: verdict.label().to_owned(),
            status: verdict.status(),
            latency_ms: duration_millis(latency),
        });
        let observation = verdict.observation(latency);
        let stats = Arc::clone(&self.stats);
        let endpoint = mirror.clone();
        match tokio::task::spawn_blocking(move || stats.record(&endpoint, observation)).await {
            Ok(Ok(_)) => {}
            Ok(Err(err)) => warn!("failed to record attempt against {mirror}: {err}"),
            Err(err) => warn!("stats update for {mirror} did not complete: {err}"),
        }
    }
}

fn remaining(deadline: Option<Instant>) -> Option<Duration> {
    deadline.map(|at| at.saturating_duration_since(Instant::now()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::MemoryStatsStore;
    use crate::test_support::{MemoryRequestLog, StubReply, StubTransport};
    use rstest::{fixture, rstest};

    const NODE: &str = r#"{"elements":[{"type":"node","id":1,"lat":48.8584,"lon":2.2945,"tags":{"name":"Eiffel Tower","tourism":"attraction"}}]}"#;

    struct Harness {
        transport: Arc<StubTransport>,
        stats: Arc<MemoryStatsStore>,
        journal: Arc<MemoryRequestLog>,
    }

    impl Harness {
        fn executor(&self, policy: RetryPolicy) -> FetchExecutor {
            FetchExecutor::new(
                self.transport.clone(),
                self.stats.clone(),
                self.journal.clone(),
                policy,
            )
        }

        fn stats_for(&self, mirror: &MirrorEndpoint) -> (u64, u64) {
            let stats = self
                .stats
                .load_all()
                .expect("load stats")
                .get(mirror)
                .copied()
                .unwrap_or_default();
            (stats.attempts, stats.successes)
        }
    }

    #[fixture]
    fn mirrors() -> Vec<MirrorEndpoint> {
        vec![
            MirrorEndpoint::from("https://one.test/api/interpreter"),
            MirrorEndpoint::from("https://two.test/api/interpreter"),
        ]
    }

    fn harness(transport: StubTransport) -> Harness {
        Harness {
            transport: Arc::new(transport),
            stats: Arc::new(MemoryStatsStore::new()),
            journal: Arc::new(MemoryRequestLog::default()),
        }
    }

    fn query() -> OverpassQuery {
        OverpassQuery::from("[out:json];node(1);out;")
    }

    #[rstest]
    #[tokio::test(start_paused = true)]
    async fn first_success_short_circuits(mirrors: Vec<MirrorEndpoint>) {
        let h = harness(
            StubTransport::new()
                .with_script(&mirrors[0], vec![StubReply::elements(NODE)])
                .with_script(&mirrors[1], vec![StubReply::elements(NODE)]),
        );

        let success = h
            .executor(RetryPolicy::default())
            .fetch(&mirrors, &query())
            .await
            .expect("fetch succeeds");

        assert_eq!(success.mirror, mirrors[0]);
        assert_eq!(success.attempts, 1);
        assert_eq!(success.elements.len(), 1);
        assert_eq!(h.transport.calls_to(&mirrors[1]), 0);
    }

    #[rstest]
    #[tokio::test(start_paused = true)]
    async fn failed_attempts_retry_then_fail_over(mirrors: Vec<MirrorEndpoint>) {
        let h = harness(
            StubTransport::new()
                .with_script(
                    &mirrors[0],
                    vec![StubReply::status(504), StubReply::network_error()],
                )
                .with_script(&mirrors[1], vec![StubReply::elements(NODE)]),
        );
        let started = Instant::now();

        let success = h
            .executor(RetryPolicy::default())
            .fetch(&mirrors, &query())
            .await
            .expect("second mirror serves");

        assert_eq!(success.attempts, 3);
        assert_eq!(h.transport.calls_to(&mirrors[0]), 2);
        assert_eq!(started.elapsed(), DEFAULT_BACKOFF_STEP);
        assert_eq!(h.stats_for(&mirrors[0]), (2, 0));
        assert_eq!(h.stats_for(&mirrors[1]), (1, 1));
        let lines = h.journal.lines();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains("outcome=http-error status=504"));
        assert!(lines[1].contains("outcome=transport-error"));
    }

    #[rstest]
    #[tokio::test(start_paused = true)]
    async fn empty_answers_advance_without_retry(mirrors: Vec<MirrorEndpoint>) {
        let h = harness(
            StubTransport::new()
                .with_script(&mirrors[0], vec![StubReply::empty(), StubReply::elements(NODE)])
                .with_script(&mirrors[1], vec![StubReply::elements(NODE)]),
        );

        let success = h
            .executor(RetryPolicy::default())
            .fetch(&mirrors, &query())
            .await
            .expect("second mirror serves");

        assert_eq!(success.mirror, mirrors[1]);
        assert_eq!(h.transport.calls_to(&mirrors[0]), 1);
        assert_eq!(h.stats_for(&mirrors[0]), (1, 1));
    }

    #[rstest]
    #[tokio::test(start_paused = true)]
    async fn all_empty_answers_exhaust_the_list(mirrors: Vec<MirrorEndpoint>) {
        let h = harness(
            StubTransport::new()
                .with_script(&mirrors[0], vec![StubReply::empty()])
                .with_script(&mirrors[1], vec![StubReply::empty()]),
        );

        let failure = h
            .executor(RetryPolicy::default())
            .fetch(&mirrors, &query())
            .await
            .expect_err("no mirror returned elements");

        let FetchFailure::Unreachable {
            last_mirror,
            last_error,
            http_status,
            attempts,
            ..
        } = failure
        else {
            panic!("expected unreachable failure");
        };
        assert_eq!(last_mirror, Some(mirrors[1].clone()));
        assert_eq!(last_error.as_deref(), Some(NO_ELEMENTS_ERROR));
        assert_eq!(http_status, None);
        assert_eq!(attempts, 2);
        assert_eq!(h.stats_for(&mirrors[1]), (1, 1));
    }

    #[rstest]
    #[tokio::test(start_paused = true)]
    async fn empty_answer_then_server_errors_reports_last_status(mirrors: Vec<MirrorEndpoint>) {
        let h = harness(
            StubTransport::new()
                .with_script(&mirrors[0], vec![StubReply::empty()])
                .with_script(&mirrors[1], vec![StubReply::status(500), StubReply::status(500)]),
        );

        let failure = h
            .executor(RetryPolicy::default())
            .fetch(&mirrors, &query())
            .await
            .expect_err("no mirror returned elements");

        assert!(matches!(
            failure,
            FetchFailure::Unreachable { http_status: Some(500), attempts: 3, .. }
        ));
    }

    #[rstest]
    #[case::blank(StubReply::body("   "), "empty-body")]
    #[case::server_error(StubReply::status(503), "http-error")]
    #[tokio::test(start_paused = true)]
    async fn exhaustion_reports_last_failure(
        mirrors: Vec<MirrorEndpoint>,
        #[case] reply: StubReply,
        #[case] label: &str,
    ) {
        let h = harness(
            StubTransport::new()
                .with_script(&mirrors[0], vec![StubReply::network_error(); 2])
                .with_script(&mirrors[1], vec![reply.clone(), reply]),
        );

        let failure = h
            .executor(RetryPolicy::default())
            .fetch(&mirrors, &query())
            .await
            .expect_err("every attempt fails");

        let FetchFailure::Unreachable {
            last_mirror,
            attempts,
            ..
        } = failure
        else {
            panic!("expected unreachable failure");
        };
        assert_eq!(last_mirror, Some(mirrors[1].clone()));
        assert_eq!(attempts, 4);
        assert!(h.journal.lines()[3].contains(&format!("outcome={label}")));
    }

    #[rstest]
    #[tokio::test(start_paused = true)]
    async fn unreadable_body_advances_and_surfaces_when_last(mirrors: Vec<MirrorEndpoint>) {
        let h = harness(
            StubTransport::new()
                .with_script(&mirrors[0], vec![StubReply::network_error(); 2])
                .with_script(&mirrors[1], vec![StubReply::body("<html>busy</html>")]),
        );

        let failure = h
            .executor(RetryPolicy::default())
            .fetch(&mirrors, &query())
            .await
            .expect_err("no usable response");

        assert!(matches!(
            failure,
            FetchFailure::InvalidResponse { ref mirror, http_status: 200, attempts: 3, .. }
                if *mirror == mirrors[1]
        ));
        assert_eq!(h.transport.calls_to(&mirrors[1]), 1);
        assert_eq!(h.stats_for(&mirrors[1]), (1, 0));
    }

    #[rstest]
    #[tokio::test(start_paused = true)]
    async fn deadline_stops_the_loop_early(mirrors: Vec<MirrorEndpoint>) {
        let slow = StubReply::Delay(Duration::from_secs(30), Box::new(StubReply::elements(NODE)));
        let h = harness(
            StubTransport::new()
                .with_script(&mirrors[0], vec![slow.clone(), slow])
                .with_script(&mirrors[1], vec![StubReply::elements(NODE)]),
        );
        let policy = RetryPolicy::default().with_deadline(Some(Duration::from_secs(1)));

        let failure = h
            .executor(policy)
            .fetch(&mirrors, &query())
            .await
            .expect_err("deadline expires");

        let FetchFailure::Unreachable {
            last_error,
            attempts,
            elapsed,
            ..
        } = failure
        else {
            panic!("expected unreachable failure");
        };
        assert!(last_error.expect("error text").contains("deadline"));
        assert_eq!(attempts, 1);
        assert!(elapsed <= Duration::from_secs(1));
        assert_eq!(h.transport.calls_to(&mirrors[1]), 0);
    }

    #[rstest]
    #[tokio::test]
    async fn no_mirrors_is_unreachable() {
        let h = harness(StubTransport::new());

        let failure = h
            .executor(RetryPolicy::default())
            .fetch(&[], &query())
            .await
            .expect_err("nothing to try");

        assert!(matches!(failure, FetchFailure::Unreachable { attempts: 0, .. }));
    }
}
