//! Discriminator-driven decoding of API payloads.
//!
//! Every PAY.JP resource carries an `object` field naming its type. The
//! decoder reads that field first and dispatches to the matching variant of
//! [`ApiObject`]; the caller's expected type is then extracted from the
//! variant, failing with [`DecodeError::TypeMismatch`] when they disagree.
//!
//! Payloads without a recognized discriminator fall back to a direct decode,
//! but only for types that are not published under a discriminator
//! themselves (see [`Decodable::OBJECT_TYPE`]). A token can therefore never
//! be produced from a payload that claims to be something else.

use std::fmt;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::DecodeError;
use crate::types::{AcceptedBrands, Card, Token};

/// Known values of the `object` discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectType {
    Token,
    Card,
}

impl ObjectType {
    pub fn as_str(self) -> &'static str {
        match self {
            ObjectType::Token => "token",
            ObjectType::Card => "card",
        }
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ObjectType {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "token" => Ok(ObjectType::Token),
            "card" => Ok(ObjectType::Card),
            other => Err(DecodeError::UnknownObject(other.to_string())),
        }
    }
}

/// A decoded resource, tagged by its discriminator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiObject {
    Token(Token),
    Card(Card),
}

impl ApiObject {
    /// Decode `value` as the variant named by `object_type`.
    pub fn from_value(object_type: ObjectType, value: Value) -> Result<Self, DecodeError> {
        Ok(match object_type {
            ObjectType::Token => ApiObject::Token(serde_json::from_value(value)?),
            ObjectType::Card => ApiObject::Card(serde_json::from_value(value)?),
        })
    }

    pub fn object_type(&self) -> ObjectType {
        match self {
            ApiObject::Token(_) => ObjectType::Token,
            ApiObject::Card(_) => ObjectType::Card,
        }
    }
}

/// A type that can be the expected response of a request.
pub trait Decodable: DeserializeOwned {
    /// Discriminator this type is published under, if any.
    const OBJECT_TYPE: Option<ObjectType> = None;

    /// Extract `Self` from a decoded object, or hand it back on mismatch.
    fn from_object(object: ApiObject) -> Result<Self, ApiObject> {
        Err(object)
    }
}

impl Decodable for Token {
    const OBJECT_TYPE: Option<ObjectType> = Some(ObjectType::Token);

    fn from_object(object: ApiObject) -> Result<Self, ApiObject> {
        match object {
            ApiObject::Token(token) => Ok(token),
            other => Err(other),
        }
    }
}

impl Decodable for Card {
    const OBJECT_TYPE: Option<ObjectType> = Some(ObjectType::Card);

    fn from_object(object: ApiObject) -> Result<Self, ApiObject> {
        match object {
            ApiObject::Card(card) => Ok(card),
            other => Err(other),
        }
    }
}

impl Decodable for AcceptedBrands {}

/// Decode a raw response body into `T`.
pub fn decode<T: Decodable>(body: &str) -> Result<T, DecodeError> {
    let value: Value = serde_json::from_str(body)?;
    decode_value(value)
}

/// Decode an already-parsed payload into `T`.
pub fn decode_value<T: Decodable>(value: Value) -> Result<T, DecodeError> {
    let tag = value
        .get("object")
        .and_then(Value::as_str)
        .map(str::to_string);

    match tag.as_deref().map(ObjectType::from_str) {
        Some(Ok(object_type)) => {
            let object = ApiObject::from_value(object_type, value)?;
            T::from_object(object).map_err(|object| DecodeError::TypeMismatch {
                expected: std::any::type_name::<T>(),
                found: object.object_type(),
            })
        }
        Some(Err(unknown)) => untagged(value, Some(unknown)),
        None => untagged(value, None),
    }
}

fn untagged<T: Decodable>(value: Value, unknown: Option<DecodeError>) -> Result<T, DecodeError> {
    match (T::OBJECT_TYPE, unknown) {
        (Some(_), Some(unknown)) => Err(unknown),
        (Some(expected), None) => Err(DecodeError::MissingObject { expected }),
        (None, _) => Ok(serde_json::from_value(value)?),
    }
}
