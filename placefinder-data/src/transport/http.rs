//! `reqwest`-backed [`MirrorTransport`].

use std::time::Duration;

use async_trait::async_trait;
use placefinder_core::MirrorEndpoint;
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;

use super::{MirrorReply, MirrorTransport, TransportError, duration_millis};

/// Default user agent for mirror requests.
pub const DEFAULT_USER_AGENT: &str = "placefinder-gateway/0.1";

/// Default time allowed to establish a connection.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

/// HTTP transport posting queries as `text/plain`.
///
/// The connect timeout is fixed per client; the overall timeout is applied
/// per request so the fetch loop can clip it to the remaining deadline.
#[derive(Debug, Clone)]
pub struct HttpMirrorTransport {
    client: Client,
}

impl HttpMirrorTransport {
    /// Build a transport with the given user agent and connect timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to build.
    pub fn new(user_agent: &str, connect_timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(user_agent)
            .connect_timeout(connect_timeout)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl MirrorTransport for HttpMirrorTransport {
    async fn post_query(
        &self,
        mirror: &MirrorEndpoint,
        query: &str,
        timeout: Duration,
    ) -> Result<MirrorReply, TransportError> {
        let response = self
            .client
            .post(mirror.as_str())
            .timeout(timeout)
            .header(CONTENT_TYPE, "text/plain; charset=utf-8")
            .body(query.to_owned())
            .send()
            .await
            .map_err(|err| convert_reqwest_error(&err, mirror, timeout))?;
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|err| convert_reqwest_error(&err, mirror, timeout))?;
        Ok(MirrorReply {
            status,
            body: body.to_vec(),
        })
    }
}

fn convert_reqwest_error(
    error: &reqwest::Error,
    mirror: &MirrorEndpoint,
    timeout: Duration,
) -> TransportError {
    if error.is_timeout() {
        return TransportError::Timeout {
            url: mirror.as_str().to_owned(),
            timeout_ms: duration_millis(timeout),
        };
    }
    TransportError::Network {
        url: mirror.as_str().to_owned(),
        message: error.to_string(),
    }
}
