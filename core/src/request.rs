//! The request protocol and the concrete PAY.JP calls.
//!
//! # Design
//! A `Request` describes one API call as data: a path relative to the API
//! base, a method, form fields, and the type the response decodes into. The
//! client never retains a request beyond the call that uses it.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use url::form_urlencoded;

use crate::http::HttpMethod;
use crate::object::Decodable;
use crate::types::{AcceptedBrands, Token};

/// Path of the token-creation endpoint.
pub const TOKENS_PATH: &str = "tokens";

// Everything but RFC 3986 unreserved characters.
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Percent-encode an id so it stays a single path segment.
fn path_segment(id: &str) -> String {
    utf8_percent_encode(id, PATH_SEGMENT).to_string()
}

/// Contract every API call satisfies.
pub trait Request {
    /// Expected response type.
    type Response: Decodable;

    /// Path relative to the API base URL, e.g. `tokens`.
    fn path(&self) -> String;

    fn method(&self) -> HttpMethod;

    /// Form fields sent as `application/x-www-form-urlencoded`. An empty list
    /// means no body.
    fn form(&self) -> Vec<(String, String)> {
        Vec::new()
    }
}

/// Raw card data entered by the card holder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardParams {
    pub number: String,
    pub cvc: String,
    pub exp_month: u8,
    pub exp_year: u16,
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum TokenSource {
    Card(CardParams),
    ThreeDSecure(String),
}

/// `POST tokens`: tokenize a card, or exchange a verified 3-D Secure token
/// for a card token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateTokenRequest {
    source: TokenSource,
    tenant: Option<String>,
}

impl CreateTokenRequest {
    pub fn card(card: CardParams) -> Self {
        Self {
            source: TokenSource::Card(card),
            tenant: None,
        }
    }

    pub fn three_d_secure(three_d_secure_token_id: &str) -> Self {
        Self {
            source: TokenSource::ThreeDSecure(three_d_secure_token_id.to_string()),
            tenant: None,
        }
    }

    /// Issue the token on behalf of a platform tenant.
    pub fn with_tenant(mut self, tenant: &str) -> Self {
        self.tenant = Some(tenant.to_string());
        self
    }
}

impl Request for CreateTokenRequest {
    type Response = Token;

    fn path(&self) -> String {
        TOKENS_PATH.to_string()
    }

    fn method(&self) -> HttpMethod {
        HttpMethod::Post
    }

    fn form(&self) -> Vec<(String, String)> {
        let mut form = match &self.source {
            TokenSource::Card(card) => {
                let mut fields = vec![
                    ("card[number]".to_string(), card.number.clone()),
                    ("card[cvc]".to_string(), card.cvc.clone()),
                    ("card[exp_month]".to_string(), card.exp_month.to_string()),
                    ("card[exp_year]".to_string(), card.exp_year.to_string()),
                ];
                if let Some(name) = &card.name {
                    fields.push(("card[name]".to_string(), name.clone()));
                }
                fields
            }
            TokenSource::ThreeDSecure(id) => {
                vec![("three_d_secure_token".to_string(), id.clone())]
            }
        };
        if let Some(tenant) = &self.tenant {
            form.push(("tenant".to_string(), tenant.clone()));
        }
        form
    }
}

/// `GET tokens/{id}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetTokenRequest {
    pub token_id: String,
}

impl GetTokenRequest {
    pub fn new(token_id: &str) -> Self {
        Self {
            token_id: token_id.to_string(),
        }
    }
}

impl Request for GetTokenRequest {
    type Response = Token;

    fn path(&self) -> String {
        format!("{TOKENS_PATH}/{}", path_segment(&self.token_id))
    }

    fn method(&self) -> HttpMethod {
        HttpMethod::Get
    }
}

/// `POST tokens/{id}/tds_finish`: complete 3-D Secure on an existing token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinishTokenThreeDSecureRequest {
    pub token_id: String,
}

impl FinishTokenThreeDSecureRequest {
    pub fn new(token_id: &str) -> Self {
        Self {
            token_id: token_id.to_string(),
        }
    }
}

impl Request for FinishTokenThreeDSecureRequest {
    type Response = Token;

    fn path(&self) -> String {
        format!("{TOKENS_PATH}/{}/tds_finish", path_segment(&self.token_id))
    }

    fn method(&self) -> HttpMethod {
        HttpMethod::Post
    }
}

/// `GET accounts/brands`: card brands the merchant or tenant accepts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GetAcceptedBrandsRequest {
    pub tenant: Option<String>,
}

impl GetAcceptedBrandsRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_tenant(tenant: &str) -> Self {
        Self {
            tenant: Some(tenant.to_string()),
        }
    }
}

impl Request for GetAcceptedBrandsRequest {
    type Response = AcceptedBrands;

    fn path(&self) -> String {
        match &self.tenant {
            Some(tenant) => {
                let query = form_urlencoded::Serializer::new(String::new())
                    .append_pair("tenant", tenant)
                    .finish();
                format!("accounts/brands?{query}")
            }
            None => "accounts/brands".to_string(),
        }
    }

    fn method(&self) -> HttpMethod {
        HttpMethod::Get
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card() -> CardParams {
        CardParams {
            number: "4242424242424242".to_string(),
            cvc: "123".to_string(),
            exp_month: 2,
            exp_year: 2099,
            name: None,
        }
    }

    #[test]
    fn create_token_form_carries_card_fields() {
        let req = CreateTokenRequest::card(card());
        assert_eq!(req.path(), "tokens");
        assert_eq!(req.method(), HttpMethod::Post);
        assert_eq!(
            req.form(),
            vec![
                ("card[number]".to_string(), "4242424242424242".to_string()),
                ("card[cvc]".to_string(), "123".to_string()),
                ("card[exp_month]".to_string(), "2".to_string()),
                ("card[exp_year]".to_string(), "2099".to_string()),
            ]
        );
    }

    #[test]
    fn create_token_includes_name_and_tenant_when_set() {
        let mut params = card();
        params.name = Some("PAY TARO".to_string());
        let form = CreateTokenRequest::card(params).with_tenant("ten_1").form();
        assert!(form.contains(&("card[name]".to_string(), "PAY TARO".to_string())));
        assert_eq!(form.last(), Some(&("tenant".to_string(), "ten_1".to_string())));
    }

    #[test]
    fn create_token_from_three_d_secure() {
        let req = CreateTokenRequest::three_d_secure("tds_xxx");
        assert_eq!(req.path(), TOKENS_PATH);
        assert_eq!(
            req.form(),
            vec![("three_d_secure_token".to_string(), "tds_xxx".to_string())]
        );
    }

    #[test]
    fn token_lookup_paths() {
        assert_eq!(GetTokenRequest::new("tok_1").path(), "tokens/tok_1");
        assert_eq!(GetTokenRequest::new("tok_1").method(), HttpMethod::Get);
        assert!(GetTokenRequest::new("tok_1").form().is_empty());
        assert_eq!(
            FinishTokenThreeDSecureRequest::new("tok_1").path(),
            "tokens/tok_1/tds_finish"
        );
        assert_eq!(
            FinishTokenThreeDSecureRequest::new("tok_1").method(),
            HttpMethod::Post
        );
    }

    #[test]
    fn token_id_stays_one_path_segment() {
        assert_eq!(
            GetTokenRequest::new("tok_1/../accounts?x=1").path(),
            "tokens/tok_1%2F..%2Faccounts%3Fx%3D1"
        );
        assert_eq!(
            FinishTokenThreeDSecureRequest::new("tok 1#a").path(),
            "tokens/tok%201%23a/tds_finish"
        );
    }

    #[test]
    fn accepted_brands_path_encodes_tenant() {
        assert_eq!(GetAcceptedBrandsRequest::new().path(), "accounts/brands");
        assert_eq!(
            GetAcceptedBrandsRequest::for_tenant("ten 1&x").path(),
            "accounts/brands?tenant=ten+1%26x"
        );
    }
}
