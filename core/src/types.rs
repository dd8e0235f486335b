//! Domain objects returned by the PAY.JP API.
//!
//! # Design
//! Each type is a read-only view of an API resource, extracted with serde:
//! required fields must be present with the right JSON type, optional ones
//! become `Option`, and `created` timestamps (seconds since the epoch) become
//! `DateTime<Utc>`. A failure anywhere fails the whole object; there are no
//! partially populated values. The types are defined independently of the
//! mock server's models so integration tests catch schema drift.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use url::form_urlencoded;

/// A card token. Owns the card it was issued for.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Token {
    pub id: String,
    pub card: Card,
    #[serde(rename = "created", with = "chrono::serde::ts_seconds")]
    pub created_at: DateTime<Utc>,
    pub livemode: bool,
    pub used: bool,
}

/// A tokenized card. `number` is only present in unmasked contexts.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Card {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub number: Option<String>,
    pub last4: String,
    pub brand: CardBrand,
    #[serde(deserialize_with = "expiration_month")]
    pub exp_month: u8,
    pub exp_year: u16,
    pub fingerprint: String,
    pub livemode: bool,
    #[serde(rename = "created", with = "chrono::serde::ts_seconds")]
    pub created_at: DateTime<Utc>,
    #[serde(default, deserialize_with = "lenient_three_d_secure_status")]
    pub three_d_secure_status: Option<ThreeDSecureStatus>,
}

fn expiration_month<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u8, D::Error> {
    let month = u8::deserialize(deserializer)?;
    if (1..=12).contains(&month) {
        Ok(month)
    } else {
        Err(serde::de::Error::custom(format!(
            "exp_month must be between 1 and 12, got {month}"
        )))
    }
}

// Statuses added server-side must not make otherwise valid cards undecodable.
fn lenient_three_d_secure_status<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<ThreeDSecureStatus>, D::Error> {
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(ThreeDSecureStatus::find))
}

/// Card brands accepted by PAY.JP. The wire value is the display string the
/// API sends, not the variant name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CardBrand {
    #[serde(rename = "Visa")]
    Visa,
    #[serde(rename = "MasterCard")]
    MasterCard,
    #[serde(rename = "JCB")]
    Jcb,
    #[serde(rename = "American Express")]
    AmericanExpress,
    #[serde(rename = "Diners Club")]
    DinersClub,
    #[serde(rename = "Discover")]
    Discover,
}

impl CardBrand {
    pub const ALL: [CardBrand; 6] = [
        CardBrand::Visa,
        CardBrand::MasterCard,
        CardBrand::Jcb,
        CardBrand::AmericanExpress,
        CardBrand::DinersClub,
        CardBrand::Discover,
    ];

    /// Wire value, e.g. `"American Express"`.
    pub fn as_str(self) -> &'static str {
        match self {
            CardBrand::Visa => "Visa",
            CardBrand::MasterCard => "MasterCard",
            CardBrand::Jcb => "JCB",
            CardBrand::AmericanExpress => "American Express",
            CardBrand::DinersClub => "Diners Club",
            CardBrand::Discover => "Discover",
        }
    }

    /// Upper-case label used by the card form, e.g. `"AMEX"`.
    pub fn label(self) -> &'static str {
        match self {
            CardBrand::Visa => "VISA",
            CardBrand::MasterCard => "MASTERCARD",
            CardBrand::Jcb => "JCB",
            CardBrand::AmericanExpress => "AMEX",
            CardBrand::DinersClub => "DINERSCLUB",
            CardBrand::Discover => "DISCOVER",
        }
    }
}

impl fmt::Display for CardBrand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown card brand `{0}`")]
pub struct UnknownCardBrand(pub String);

impl FromStr for CardBrand {
    type Err = UnknownCardBrand;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CardBrand::ALL
            .into_iter()
            .find(|brand| brand.as_str() == s)
            .ok_or_else(|| UnknownCardBrand(s.to_string()))
    }
}

/// Result of the 3-D Secure check recorded on a card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ThreeDSecureStatus {
    Verified,
    Attempted,
    Unverified,
    Failed,
    Aborted,
    Error,
}

impl ThreeDSecureStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ThreeDSecureStatus::Verified => "verified",
            ThreeDSecureStatus::Attempted => "attempted",
            ThreeDSecureStatus::Unverified => "unverified",
            ThreeDSecureStatus::Failed => "failed",
            ThreeDSecureStatus::Aborted => "aborted",
            ThreeDSecureStatus::Error => "error",
        }
    }

    /// Look up a status by wire value; `None` for anything unknown.
    pub fn find(raw: &str) -> Option<Self> {
        [
            ThreeDSecureStatus::Verified,
            ThreeDSecureStatus::Attempted,
            ThreeDSecureStatus::Unverified,
            ThreeDSecureStatus::Failed,
            ThreeDSecureStatus::Aborted,
            ThreeDSecureStatus::Error,
        ]
        .into_iter()
        .find(|status| status.as_str() == raw)
    }
}

/// Secondary token returned when the issuer requires 3-D Secure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreeDSecureToken {
    pub id: String,
}

impl ThreeDSecureToken {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    /// URL of the hosted verification page for this token.
    ///
    /// `redirect` is the `(redirect_url, redirect_url_key)` pair the page
    /// returns to once verification finishes.
    pub fn verification_url(
        &self,
        base_url: &str,
        public_key: &str,
        redirect: Option<(&str, &str)>,
    ) -> String {
        let mut query = form_urlencoded::Serializer::new(String::new());
        query.append_pair("publickey", public_key);
        if let Some((url, key)) = redirect {
            query.append_pair("redirect_url", url);
            query.append_pair("redirect_url_key", key);
        }
        format!("{base_url}tds/{}/start?{}", self.id, query.finish())
    }
}

/// Card brands a merchant (or tenant) accepts.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AcceptedBrands {
    #[serde(rename = "card_types_supported")]
    pub brands: Vec<CardBrand>,
    pub livemode: bool,
}
