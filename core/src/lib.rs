//! Client core for tokenizing payment cards with the PAY.JP API.
//!
//! # Overview
//! Typed requests go in, typed domain objects (`Token`, `Card`,
//! `AcceptedBrands`) or a `ClientError` come out. Between the two the client
//! classifies HTTP statuses, recognizes the 3-D Secure answer to token
//! creation, and decodes bodies by their `object` discriminator.
//!
//! # Design
//! - `PayjpClient` is stateless apart from its immutable config, so a single
//!   instance can be shared by concurrent callers.
//! - Every call is split into `build_request` / `parse_response` around a
//!   `Transport`, so the protocol logic runs without a network in tests.
//! - Domain types are defined independently from the mock-server crate;
//!   integration tests catch schema drift.

pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod object;
pub mod request;
pub mod three_d_secure;
pub mod transport;
pub mod types;

pub use client::{classify_response, PayjpClient};
pub use config::ClientConfig;
pub use error::{ApiErrorResponse, ClientError, ConfigError, DecodeError, TransportError};
pub use http::{HttpMethod, HttpRequest, HttpResponse, API_BASE_URL};
pub use object::{decode, ApiObject, Decodable, ObjectType};
pub use request::{
    CardParams, CreateTokenRequest, FinishTokenThreeDSecureRequest, GetAcceptedBrandsRequest,
    GetTokenRequest, Request, TOKENS_PATH,
};
pub use transport::{Transport, UreqTransport};
pub use types::{AcceptedBrands, Card, CardBrand, ThreeDSecureStatus, ThreeDSecureToken, Token};
