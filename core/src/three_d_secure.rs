//! Recognizes the "3-D Secure required" answer to token creation.
//!
//! When the issuer demands 3-D Secure, `POST tokens` succeeds with a
//! `three_d_secure_token` object instead of a token. `intercept` turns that
//! response into the secondary token so the client can report it as
//! `ClientError::RequiredThreeDSecure`. Every other response passes through.

use serde::Deserialize;

use crate::http::{HttpMethod, HttpResponse};
use crate::request::TOKENS_PATH;
use crate::types::ThreeDSecureToken;

/// Discriminator of the secondary token.
pub const THREE_D_SECURE_TOKEN_OBJECT: &str = "three_d_secure_token";

#[derive(Deserialize)]
struct TaggedId {
    object: String,
    #[serde(default)]
    id: Option<String>,
}

/// Return the 3-D Secure token carried by `response`, if this exchange is a
/// token-creation POST answered with one. `None` means "decode normally".
pub fn intercept(
    path: &str,
    method: HttpMethod,
    response: &HttpResponse,
) -> Option<ThreeDSecureToken> {
    if path != TOKENS_PATH || method != HttpMethod::Post || !response.is_success() {
        return None;
    }
    let tagged: TaggedId = serde_json::from_str(&response.body).ok()?;
    if tagged.object != THREE_D_SECURE_TOKEN_OBJECT {
        return None;
    }
    tagged
        .id
        .filter(|id| !id.is_empty())
        .map(ThreeDSecureToken::new)
}
