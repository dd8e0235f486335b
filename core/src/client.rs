//! Request executor for the PAY.JP API.
//!
//! # Design
//! `PayjpClient` holds an immutable configuration and a shared `Transport`;
//! it carries no per-call state, so one instance can serve any number of
//! concurrent calls. A call is split the same way at every entry point:
//! `build_request` turns a `Request` into an `HttpRequest`, the transport
//! performs the round-trip, and `parse_response` interprets the result:
//!
//! 1. non-2xx statuses are classified into a `ClientError`
//!    (`classify_response`);
//! 2. a token-creation POST answered with a 3-D Secure token becomes
//!    `RequiredThreeDSecure`;
//! 3. everything else is decoded into the request's response type.
//!
//! `execute_blocking`, `execute` (async) and `request_with` (callback) all
//! complete exactly once per call and never retry.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, warn};
use url::form_urlencoded;

use crate::config::ClientConfig;
use crate::error::{parse_api_error, ClientError, DecodeError, TransportError};
use crate::http::{HttpRequest, HttpResponse};
use crate::object::decode;
use crate::request::Request;
use crate::three_d_secure;
use crate::transport::{Transport, UreqTransport};

const USER_AGENT: &str = concat!("payjp-rust/", env!("CARGO_PKG_VERSION"));

/// Stateless, cloneable client for the PAY.JP API.
#[derive(Clone)]
pub struct PayjpClient {
    config: Arc<ClientConfig>,
    transport: Arc<dyn Transport>,
}

impl fmt::Debug for PayjpClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PayjpClient")
            .field("base_url", &self.config.base_url())
            .finish_non_exhaustive()
    }
}

impl PayjpClient {
    /// Client using the ureq transport.
    pub fn new(config: ClientConfig) -> Self {
        let transport = UreqTransport::new(config.timeout());
        Self::with_transport(config, Arc::new(transport))
    }

    pub fn with_transport(config: ClientConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            config: Arc::new(config),
            transport,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn build_request<R: Request + ?Sized>(&self, request: &R) -> HttpRequest {
        let method = request.method();
        let mut headers = vec![
            ("Authorization".to_string(), self.config.authorization()),
            ("User-Agent".to_string(), USER_AGENT.to_string()),
            ("Accept".to_string(), "application/json".to_string()),
        ];
        if let Some(locale) = self.config.locale() {
            headers.push(("Accept-Language".to_string(), locale.to_string()));
        }

        let form = request.form();
        let body = if form.is_empty() {
            None
        } else {
            headers.push((
                "Content-Type".to_string(),
                "application/x-www-form-urlencoded".to_string(),
            ));
            Some(
                form_urlencoded::Serializer::new(String::new())
                    .extend_pairs(form)
                    .finish(),
            )
        };

        HttpRequest {
            method,
            url: format!("{}{}", self.config.base_url(), request.path()),
            headers,
            body,
        }
    }

    pub fn parse_response<R: Request + ?Sized>(
        &self,
        request: &R,
        response: HttpResponse,
    ) -> Result<R::Response, ClientError> {
        classify_response(&response)?;

        let path = request.path();
        let method = request.method();
        if let Some(tds) = three_d_secure::intercept(&path, method, &response) {
            info!(three_d_secure_token = %tds.id, "token creation requires 3-D Secure");
            return Err(ClientError::RequiredThreeDSecure(tds));
        }

        decode::<R::Response>(&response.body).map_err(|source| {
            warn!(%method, %path, status = response.status, error = %source, "undecodable response body");
            ClientError::InvalidJson {
                status: response.status,
                body: response.body,
                source,
            }
        })
    }

    /// Perform the call on the current thread.
    pub fn execute_blocking<R: Request + ?Sized>(
        &self,
        request: &R,
    ) -> Result<R::Response, ClientError> {
        let http = self.build_request(request);
        debug!(method = %http.method, url = %http.url, "issuing request");
        let response = self.transport.send(&http).map_err(|err| {
            debug!(method = %http.method, url = %http.url, error = %err, "no response");
            ClientError::SystemError(err)
        })?;
        debug!(status = response.status, url = %http.url, "received response");
        self.parse_response(request, response)
    }

    /// Perform the call on the tokio blocking pool.
    pub async fn execute<R>(&self, request: R) -> Result<R::Response, ClientError>
    where
        R: Request + Send + 'static,
        R::Response: Send + 'static,
    {
        let client = self.clone();
        tokio::task::spawn_blocking(move || client.execute_blocking(&request))
            .await
            .map_err(|err| ClientError::SystemError(TransportError::Interrupted(err.to_string())))?
    }

    /// Perform the call on a worker thread and hand the result to
    /// `completion`, which runs exactly once on that thread.
    pub fn request_with<R, F>(&self, request: R, completion: F)
    where
        R: Request + Send + 'static,
        F: FnOnce(Result<R::Response, ClientError>) + Send + 'static,
    {
        let client = self.clone();
        std::thread::spawn(move || completion(client.execute_blocking(&request)));
    }
}

/// Map a response status (and body) to an error, or `Ok` for 2xx.
///
/// 429 is decided on the status alone, before the body is looked at. Only
/// 4xx/5xx responses can carry an API error; any other status is
/// `InvalidJson` whatever its body.
pub fn classify_response(response: &HttpResponse) -> Result<(), ClientError> {
    match response.status {
        200..=299 => Ok(()),
        429 => Err(ClientError::RateLimitExceeded),
        status @ 400..=599 => match parse_api_error(&response.body) {
            Ok(error) => Err(ClientError::ServiceError(error)),
            Err(source) => {
                warn!(status, error = %source, "error response without API error body");
                Err(ClientError::InvalidJson {
                    status,
                    body: response.body.clone(),
                    source,
                })
            }
        },
        status => {
            warn!(status, "response status is neither success nor error");
            Err(ClientError::InvalidJson {
                status,
                body: response.body.clone(),
                source: DecodeError::UnexpectedStatus(status),
            })
        }
    }
}
