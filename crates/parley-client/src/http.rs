//! `reqwest`-backed transport against a real gateway.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use tracing::debug;
use url::Url;

use janus_proto::{decode_envelope, Envelope, OutboundRequest, ServerInfo, SessionId};

use crate::calls::CallHandle;
use crate::error::{Result, SignalError};
use crate::transport::{Scope, Transport};

/// Connect timeout for every gateway call.
const HTTP_CONNECT_TIMEOUT: Duration = Duration::from_secs(15);
/// Overall bound on a plain REST call.
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);
/// Overall bound on one long-poll. The gateway holds the request for ~30 s
/// before releasing a keepalive, so this must comfortably exceed that.
const LONG_POLL_TIMEOUT: Duration = Duration::from_secs(90);

/// HTTP transport speaking JSON to the gateway's REST mount.
pub struct HttpTransport {
    rest: reqwest::Client,
    poll: reqwest::Client,
    base: String,
}

impl HttpTransport {
    /// `base` is the gateway's root endpoint, e.g. `http://host:8088/janus`.
    pub fn new(base: Url) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let rest = reqwest::Client::builder()
            .default_headers(headers.clone())
            .connect_timeout(HTTP_CONNECT_TIMEOUT)
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(SignalError::transport)?;
        let poll = reqwest::Client::builder()
            .default_headers(headers)
            .connect_timeout(HTTP_CONNECT_TIMEOUT)
            .timeout(LONG_POLL_TIMEOUT)
            .build()
            .map_err(SignalError::transport)?;

        Ok(Self {
            rest,
            poll,
            base: base.as_str().trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, scope: Scope) -> String {
        match scope {
            Scope::Server => self.base.clone(),
            Scope::Session(session) => format!("{}/{session}", self.base),
            Scope::Handle(session, handle) => format!("{}/{session}/{handle}", self.base),
        }
    }

    async fn execute(&self, builder: reqwest::RequestBuilder, call: &CallHandle) -> Result<Envelope> {
        let exchange = async {
            let response = builder.send().await.map_err(SignalError::transport)?;
            let status = response.status();
            if !status.is_success() {
                return Err(SignalError::Transport(format!(
                    "gateway answered HTTP {status}"
                )));
            }
            let body = response.text().await.map_err(SignalError::transport)?;
            debug!(%body, "gateway frame");
            Ok(decode_envelope(&body)?)
        };
        tokio::select! {
            result = exchange => result,
            _ = call.cancelled() => Err(SignalError::Cancelled),
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn server_info(&self, call: &CallHandle) -> Result<ServerInfo> {
        let url = format!("{}/info", self.base);
        let envelope = self.execute(self.rest.get(url), call).await?;
        match envelope {
            Envelope::ServerInfo(info) => Ok(info),
            other => Err(janus_proto::ProtocolError::Unexpected {
                expected: "server_info",
                got: other.kind(),
            }
            .into()),
        }
    }

    async fn request(
        &self,
        scope: Scope,
        request: &OutboundRequest,
        call: &CallHandle,
    ) -> Result<Envelope> {
        let builder = self.rest.post(self.endpoint(scope)).json(request);
        self.execute(builder, call).await
    }

    async fn poll_event(&self, session: SessionId, call: &CallHandle) -> Result<Envelope> {
        let url = format!("{}/{session}", self.base);
        let builder = self.poll.get(url).query(&[("maxev", "1")]);
        self.execute(builder, call).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transport() -> HttpTransport {
        HttpTransport::new(Url::parse("http://gw.example:8088/janus/").unwrap()).unwrap()
    }

    #[test]
    fn endpoints_are_scoped_by_session_and_handle() {
        let transport = transport();
        assert_eq!(
            transport.endpoint(Scope::Server),
            "http://gw.example:8088/janus"
        );
        assert_eq!(
            transport.endpoint(Scope::Session(7)),
            "http://gw.example:8088/janus/7"
        );
        assert_eq!(
            transport.endpoint(Scope::Handle(7, 9)),
            "http://gw.example:8088/janus/7/9"
        );
    }

    #[tokio::test]
    async fn cancelled_handle_resolves_without_network() {
        // Nothing listens on this address; cancellation must win the race
        // long before any connect timeout.
        let transport =
            HttpTransport::new(Url::parse("http://127.0.0.1:9/janus").unwrap()).unwrap();
        let call = CallHandle::new();
        call.cancel();
        let result = transport.poll_event(1, &call).await;
        assert!(matches!(result, Err(SignalError::Cancelled)));
    }
}
