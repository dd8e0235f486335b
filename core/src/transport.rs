//! Moves an `HttpRequest` over the network and returns the `HttpResponse`.
//!
//! # Design
//! The client only depends on the `Transport` trait, so tests can answer
//! requests from canned data. `UreqTransport` disables ureq's
//! status-code-as-error behavior: 4xx/5xx responses come back as data and the
//! classifier interprets them. Only a missing response is a `TransportError`.

use std::time::Duration;

use tracing::warn;

use crate::error::TransportError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};

/// Largest response body read into memory.
pub const MAX_BODY_BYTES: u64 = 10 * 1024 * 1024;

/// Executes one HTTP round-trip.
pub trait Transport: Send + Sync {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// Blocking transport backed by a shared `ureq::Agent`.
#[derive(Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    pub fn new(timeout: Option<Duration>) -> Self {
        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(timeout)
            .build()
            .new_agent();
        Self { agent }
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new(None)
    }
}

impl Transport for UreqTransport {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let result = match request.method {
            HttpMethod::Get => {
                let mut builder = self.agent.get(request.url.as_str());
                for (name, value) in &request.headers {
                    builder = builder.header(name.as_str(), value.as_str());
                }
                builder.call()
            }
            HttpMethod::Post => {
                let mut builder = self.agent.post(request.url.as_str());
                for (name, value) in &request.headers {
                    builder = builder.header(name.as_str(), value.as_str());
                }
                match &request.body {
                    Some(body) => builder.send(body.as_bytes()),
                    None => builder.send_empty(),
                }
            }
        };
        let mut response = result.map_err(transport_error)?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    value.to_str().unwrap_or_default().to_string(),
                )
            })
            .collect();
        // A received body is always data for the classifier and decoder: bytes
        // that are not UTF-8 become replacement characters, which fail JSON
        // decoding, and an oversized body is handed on empty.
        let body = match response
            .body_mut()
            .with_config()
            .limit(MAX_BODY_BYTES)
            .read_to_vec()
        {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(ureq::Error::BodyExceedsLimit(limit)) => {
                warn!(status, limit, url = %request.url, "response body exceeds limit");
                String::new()
            }
            Err(err) => return Err(transport_error(err)),
        };

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

fn transport_error(err: ureq::Error) -> TransportError {
    match err {
        ureq::Error::Timeout(_) => TransportError::Timeout,
        other => TransportError::Connection(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Write};
    use std::net::TcpListener;

    use super::*;

    /// Answer a single connection with `response` verbatim; returns the URL.
    fn serve_once(response: Vec<u8>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = stream.read(&mut buf).unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            stream.write_all(&response).unwrap();
        });
        format!("http://{addr}/v1/tokens/tok_1")
    }

    fn raw_response(status_line: &str, body: &[u8]) -> Vec<u8> {
        let mut raw = format!(
            "{status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            body.len()
        )
        .into_bytes();
        raw.extend_from_slice(body);
        raw
    }

    fn get(url: String) -> HttpRequest {
        HttpRequest {
            method: HttpMethod::Get,
            url,
            headers: Vec::new(),
            body: None,
        }
    }

    #[test]
    fn non_utf8_body_is_returned_as_data() {
        let url = serve_once(raw_response("HTTP/1.1 200 OK", &[0xff, 0xfe, 0x7b]));
        let response = UreqTransport::default().send(&get(url)).unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.body, "\u{fffd}\u{fffd}{");
    }

    #[test]
    fn error_status_is_returned_as_data() {
        let body = br#"{"error":{"message":"No such token","status":404,"type":"client_error"}}"#;
        let url = serve_once(raw_response("HTTP/1.1 404 Not Found", body));
        let response = UreqTransport::default().send(&get(url)).unwrap();
        assert_eq!(response.status, 404);
        assert_eq!(response.body.as_bytes(), body);
        assert!(response
            .headers
            .iter()
            .any(|(name, value)| name.eq_ignore_ascii_case("content-type") && value == "application/json"));
    }

    #[test]
    fn refused_connection_is_transport_error() {
        let addr = TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap();
        let err = UreqTransport::default()
            .send(&get(format!("http://{addr}/v1/tokens")))
            .unwrap_err();
        assert!(matches!(err, TransportError::Connection(_)));
    }
}
