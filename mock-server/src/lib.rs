//! In-memory stand-in for the PAY.JP token endpoints.
//!
//! Card numbers and tenants with special meaning:
//! - [`DECLINED_CARD_NUMBER`] is refused with a 402 `card_error`;
//! - [`THREE_D_SECURE_CARD_NUMBER`] answers token creation with a
//!   `three_d_secure_token`, exchangeable through `three_d_secure_token=`;
//! - [`RATE_LIMITED_TENANT`] is always answered with 429.

use std::{
    collections::HashMap,
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Form, Json, Router,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

pub const DECLINED_CARD_NUMBER: &str = "4000000000000002";
pub const THREE_D_SECURE_CARD_NUMBER: &str = "4000000000000077";
pub const RATE_LIMITED_TENANT: &str = "ten_rate_limited";

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Card {
    pub object: String,
    pub id: String,
    pub name: Option<String>,
    pub last4: String,
    pub brand: String,
    pub exp_month: u8,
    pub exp_year: u16,
    pub fingerprint: String,
    pub livemode: bool,
    pub created: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub three_d_secure_status: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Token {
    pub object: String,
    pub id: String,
    pub card: Card,
    pub created: i64,
    pub livemode: bool,
    pub used: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ThreeDSecureToken {
    pub object: String,
    pub id: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub message: String,
    pub status: u16,
    #[serde(rename = "type")]
    pub error_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub param: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub error: ErrorBody,
}

#[derive(Debug, Deserialize)]
pub struct CreateTokenForm {
    #[serde(rename = "card[number]")]
    pub number: Option<String>,
    #[serde(rename = "card[cvc]")]
    pub cvc: Option<String>,
    #[serde(rename = "card[exp_month]")]
    pub exp_month: Option<u8>,
    #[serde(rename = "card[exp_year]")]
    pub exp_year: Option<u16>,
    #[serde(rename = "card[name]")]
    pub name: Option<String>,
    pub three_d_secure_token: Option<String>,
    pub tenant: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TenantQuery {
    pub tenant: Option<String>,
}

#[derive(Default)]
pub struct Store {
    tokens: HashMap<String, Token>,
    /// Cards waiting for 3-D Secure, keyed by `tds_` id.
    pending: HashMap<String, Card>,
}

pub type Db = Arc<RwLock<Store>>;

pub fn app() -> Router {
    let db: Db = Arc::new(RwLock::new(Store::default()));
    Router::new()
        .route("/v1/tokens", post(create_token))
        .route("/v1/tokens/{id}", get(get_token))
        .route("/v1/tokens/{id}/tds_finish", post(finish_three_d_secure))
        .route("/v1/accounts/brands", get(accepted_brands))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

fn error(status: StatusCode, error_type: &str, message: &str, code: Option<&str>, param: Option<&str>) -> Response {
    let body = ErrorEnvelope {
        error: ErrorBody {
            message: message.to_string(),
            status: status.as_u16(),
            error_type: error_type.to_string(),
            code: code.map(str::to_string),
            param: param.map(str::to_string),
        },
    };
    (status, Json(body)).into_response()
}

fn rate_limited() -> Response {
    error(
        StatusCode::TOO_MANY_REQUESTS,
        "client_error",
        "Too many requests",
        Some("over_capacity"),
        None,
    )
}

fn not_found(id: &str) -> Response {
    error(
        StatusCode::NOT_FOUND,
        "client_error",
        &format!("No such token: {id}"),
        Some("invalid_id"),
        Some("id"),
    )
}

/// Accept `Basic base64("pk_...:")`.
fn authorize(headers: &HeaderMap) -> Result<(), Response> {
    let unauthorized = || {
        error(
            StatusCode::UNAUTHORIZED,
            "auth_error",
            "Invalid API Key",
            Some("invalid_api_key"),
            None,
        )
    };
    let value = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(unauthorized)?;
    let encoded = value.strip_prefix("Basic ").ok_or_else(unauthorized)?;
    let decoded = STANDARD.decode(encoded).map_err(|_| unauthorized())?;
    let credentials = String::from_utf8(decoded).map_err(|_| unauthorized())?;
    match credentials.strip_suffix(':') {
        Some(key) if key.starts_with("pk_") => Ok(()),
        _ => Err(unauthorized()),
    }
}

fn now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}

fn new_id(prefix: &str) -> String {
    format!("{prefix}_{}", Uuid::new_v4().simple())
}

/// Brand by issuer prefix, using PAY.JP's wire names.
pub fn brand_for(number: &str) -> Option<&'static str> {
    let prefix2: u32 = number.get(..2)?.parse().ok()?;
    match prefix2 {
        _ if number.starts_with('4') => Some("Visa"),
        51..=55 => Some("MasterCard"),
        35 => Some("JCB"),
        34 | 37 => Some("American Express"),
        30 | 36 | 38 => Some("Diners Club"),
        60 | 64 | 65 => Some("Discover"),
        _ => None,
    }
}

fn card_from_form(form: CreateTokenForm) -> Result<Card, Response> {
    let number = form.number.unwrap_or_default();
    let invalid = |message: &str, code: &str, param: &str| {
        error(StatusCode::BAD_REQUEST, "card_error", message, Some(code), Some(param))
    };
    if number.len() < 12 || !number.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid("Invalid card number", "invalid_number", "card[number]"));
    }
    let brand = brand_for(&number)
        .ok_or_else(|| invalid("Unsupported card brand", "invalid_number", "card[number]"))?;
    if form.cvc.as_deref().map_or(true, str::is_empty) {
        return Err(invalid("Invalid CVC", "invalid_cvc", "card[cvc]"));
    }
    let exp_month = form
        .exp_month
        .filter(|m| (1..=12).contains(m))
        .ok_or_else(|| invalid("Invalid expiry month", "invalid_expiry_month", "card[exp_month]"))?;
    let exp_year = form
        .exp_year
        .ok_or_else(|| invalid("Invalid expiry year", "invalid_expiry_year", "card[exp_year]"))?;
    if number == DECLINED_CARD_NUMBER {
        return Err(error(
            StatusCode::PAYMENT_REQUIRED,
            "card_error",
            "Card declined",
            Some("card_declined"),
            None,
        ));
    }

    Ok(Card {
        object: "card".to_string(),
        id: new_id("car"),
        name: form.name,
        last4: number[number.len() - 4..].to_string(),
        brand: brand.to_string(),
        exp_month,
        exp_year,
        fingerprint: Uuid::new_v4().simple().to_string(),
        livemode: false,
        created: now(),
        three_d_secure_status: None,
    })
}

fn issue(card: Card) -> Token {
    Token {
        object: "token".to_string(),
        id: new_id("tok"),
        card,
        created: now(),
        livemode: false,
        used: false,
    }
}

async fn create_token(
    State(db): State<Db>,
    headers: HeaderMap,
    Form(form): Form<CreateTokenForm>,
) -> Response {
    if let Err(resp) = authorize(&headers) {
        return resp;
    }
    if form.tenant.as_deref() == Some(RATE_LIMITED_TENANT) {
        return rate_limited();
    }

    if let Some(tds_id) = form.three_d_secure_token.clone() {
        let mut store = db.write().await;
        let Some(mut card) = store.pending.remove(&tds_id) else {
            return error(
                StatusCode::BAD_REQUEST,
                "client_error",
                &format!("No such three_d_secure_token: {tds_id}"),
                Some("invalid_id"),
                Some("three_d_secure_token"),
            );
        };
        card.three_d_secure_status = Some("verified".to_string());
        let token = issue(card);
        store.tokens.insert(token.id.clone(), token.clone());
        return Json(token).into_response();
    }

    let requires_tds = form.number.as_deref() == Some(THREE_D_SECURE_CARD_NUMBER);
    let card = match card_from_form(form) {
        Ok(card) => card,
        Err(resp) => return resp,
    };

    let mut store = db.write().await;
    if requires_tds {
        let tds = ThreeDSecureToken {
            object: "three_d_secure_token".to_string(),
            id: new_id("tds"),
        };
        store.pending.insert(tds.id.clone(), card);
        return Json(tds).into_response();
    }
    let token = issue(card);
    store.tokens.insert(token.id.clone(), token.clone());
    Json(token).into_response()
}

async fn get_token(State(db): State<Db>, headers: HeaderMap, Path(id): Path<String>) -> Response {
    if let Err(resp) = authorize(&headers) {
        return resp;
    }
    let store = db.read().await;
    match store.tokens.get(&id) {
        Some(token) => Json(token.clone()).into_response(),
        None => not_found(&id),
    }
}

async fn finish_three_d_secure(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    if let Err(resp) = authorize(&headers) {
        return resp;
    }
    let mut store = db.write().await;
    match store.tokens.get_mut(&id) {
        Some(token) => {
            token.card.three_d_secure_status = Some("verified".to_string());
            Json(token.clone()).into_response()
        }
        None => not_found(&id),
    }
}

async fn accepted_brands(headers: HeaderMap, Query(query): Query<TenantQuery>) -> Response {
    if let Err(resp) = authorize(&headers) {
        return resp;
    }
    if query.tenant.as_deref() == Some(RATE_LIMITED_TENANT) {
        return rate_limited();
    }
    Json(serde_json::json!({
        "card_types_supported": ["Visa", "MasterCard", "JCB", "American Express", "Diners Club", "Discover"],
        "livemode": false,
    }))
    .into_response()
}
