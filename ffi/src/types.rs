//! `#[repr(C)]` types for the FFI boundary.
//!
//! # Design
//! Each type mirrors a core type but uses C-compatible representations:
//! `*mut c_char` instead of `String`, raw pointers instead of `Vec`, Unix
//! seconds instead of `DateTime`, and enums with explicit discriminants.
//! Conversion functions live here to keep `lib.rs` focused on the
//! `extern "C"` surface.

use std::ffi::{c_void, CString};
use std::os::raw::c_char;

use payjp_core::{
    AcceptedBrands, Card, CardBrand, ClientError, PayjpClient, ThreeDSecureStatus, Token,
};

/// Opaque handle to a `PayjpClient`. C callers receive a pointer to this
/// and pass it back into every FFI function.
pub struct FfiPayjpClient {
    pub(crate) inner: PayjpClient,
}

/// Completion callback. Receives ownership of the result, which must be
/// released with `payjp_free_result`, and the caller's `user_data`.
pub type PayjpCallback = Option<extern "C" fn(result: *mut FfiPayjpResult, user_data: *mut c_void)>;

/// Opaque caller context carried to the worker thread that runs the callback.
pub(crate) struct UserData(*mut c_void);

// The pointer is never dereferenced on our side, only handed back to C.
unsafe impl Send for UserData {}

impl UserData {
    pub(crate) fn new(ptr: *mut c_void) -> Self {
        Self(ptr)
    }

    pub(crate) fn into_raw(self) -> *mut c_void {
        self.0
    }
}

/// Copy a Rust string into a C string owned by the caller. Interior NULs,
/// which C cannot represent, are dropped.
pub(crate) fn c_string(s: impl Into<String>) -> *mut c_char {
    let mut s: String = s.into();
    s.retain(|c| c != '\0');
    CString::new(s).unwrap_or_default().into_raw()
}

fn c_string_opt(s: Option<String>) -> *mut c_char {
    s.map_or(std::ptr::null_mut(), c_string)
}

/// Release a string produced by `c_string`. Null is ignored.
pub(crate) fn free_c_string(s: *mut c_char) {
    if !s.is_null() {
        drop(unsafe { CString::from_raw(s) });
    }
}

// ---------------------------------------------------------------------------
// Request input (caller-provided, read but never freed by us)
// ---------------------------------------------------------------------------

/// Card data entered by the card holder. `name` may be null.
#[repr(C)]
pub struct FfiCardParams {
    pub number: *const c_char,
    pub cvc: *const c_char,
    pub exp_month: u8,
    pub exp_year: u16,
    pub name: *const c_char,
}

// ---------------------------------------------------------------------------
// Domain objects
// ---------------------------------------------------------------------------

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiCardBrand {
    Visa = 0,
    MasterCard = 1,
    Jcb = 2,
    AmericanExpress = 3,
    DinersClub = 4,
    Discover = 5,
}

impl From<CardBrand> for FfiCardBrand {
    fn from(brand: CardBrand) -> Self {
        match brand {
            CardBrand::Visa => FfiCardBrand::Visa,
            CardBrand::MasterCard => FfiCardBrand::MasterCard,
            CardBrand::Jcb => FfiCardBrand::Jcb,
            CardBrand::AmericanExpress => FfiCardBrand::AmericanExpress,
            CardBrand::DinersClub => FfiCardBrand::DinersClub,
            CardBrand::Discover => FfiCardBrand::Discover,
        }
    }
}

/// 3-D Secure status of a card. `None` covers both an absent and an
/// unrecognized status.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiThreeDSecureStatus {
    None = 0,
    Verified = 1,
    Attempted = 2,
    Unverified = 3,
    Failed = 4,
    Aborted = 5,
    Error = 6,
}

impl From<Option<ThreeDSecureStatus>> for FfiThreeDSecureStatus {
    fn from(status: Option<ThreeDSecureStatus>) -> Self {
        match status {
            None => FfiThreeDSecureStatus::None,
            Some(ThreeDSecureStatus::Verified) => FfiThreeDSecureStatus::Verified,
            Some(ThreeDSecureStatus::Attempted) => FfiThreeDSecureStatus::Attempted,
            Some(ThreeDSecureStatus::Unverified) => FfiThreeDSecureStatus::Unverified,
            Some(ThreeDSecureStatus::Failed) => FfiThreeDSecureStatus::Failed,
            Some(ThreeDSecureStatus::Aborted) => FfiThreeDSecureStatus::Aborted,
            Some(ThreeDSecureStatus::Error) => FfiThreeDSecureStatus::Error,
        }
    }
}

/// A tokenized card. `name` is null when the card holder gave none.
#[repr(C)]
pub struct FfiCard {
    pub id: *mut c_char,
    pub name: *mut c_char,
    pub last4: *mut c_char,
    pub brand: FfiCardBrand,
    pub exp_month: u8,
    pub exp_year: u16,
    pub fingerprint: *mut c_char,
    pub livemode: bool,
    /// Seconds since the Unix epoch.
    pub created_at: i64,
    pub three_d_secure_status: FfiThreeDSecureStatus,
}

impl FfiCard {
    fn from_core(card: Card) -> Self {
        FfiCard {
            id: c_string(card.id),
            name: c_string_opt(card.name),
            last4: c_string(card.last4),
            brand: card.brand.into(),
            exp_month: card.exp_month,
            exp_year: card.exp_year,
            fingerprint: c_string(card.fingerprint),
            livemode: card.livemode,
            created_at: card.created_at.timestamp(),
            three_d_secure_status: card.three_d_secure_status.into(),
        }
    }

    /// Free the C-string fields (but not the struct itself).
    pub(crate) fn free_fields(&self) {
        free_c_string(self.id);
        free_c_string(self.name);
        free_c_string(self.last4);
        free_c_string(self.fingerprint);
    }
}

#[repr(C)]
pub struct FfiToken {
    pub id: *mut c_char,
    pub card: FfiCard,
    pub created_at: i64,
    pub livemode: bool,
    pub used: bool,
}

#[repr(C)]
pub struct FfiAcceptedBrands {
    pub brands: *mut FfiCardBrand,
    pub len: u32,
    pub livemode: bool,
}

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

/// Error codes returned in `FfiPayjpResult`. `SystemError` through
/// `RequiredThreeDSecure` mirror `ClientError`; the rest are raised by the
/// boundary itself.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiErrorCode {
    Ok = 0,
    SystemError = 1,
    InvalidJson = 2,
    ServiceError = 3,
    RateLimitExceeded = 4,
    RequiredThreeDSecure = 5,
    NullArg = 6,
    InvalidArg = 7,
    Panic = 8,
}

/// Tag that tells `payjp_free_result` what `FfiPayjpResult::data` points to.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiDataTag {
    None = 0,
    Token = 1,
    AcceptedBrands = 2,
}

/// Result envelope delivered to every completion callback.
///
/// On success `error_code` is `Ok` and `data` points to the payload tagged by
/// `data_tag`. On failure `data` is null and `error_message` describes the
/// problem. `http_status` is set for errors whose status is known
/// (`InvalidJson`, `ServiceError`, `RateLimitExceeded`) and 0 otherwise.
/// `api_error_code` carries the API's `code` for `ServiceError` (null if the
/// API sent none) and `three_d_secure_id` the token to verify for
/// `RequiredThreeDSecure`.
#[repr(C)]
pub struct FfiPayjpResult {
    pub error_code: FfiErrorCode,
    pub error_message: *mut c_char,
    pub http_status: u16,
    pub api_error_code: *mut c_char,
    pub three_d_secure_id: *mut c_char,
    pub data_tag: FfiDataTag,
    pub data: *mut c_void,
}

impl FfiPayjpResult {
    fn empty(error_code: FfiErrorCode, error_message: *mut c_char) -> Self {
        FfiPayjpResult {
            error_code,
            error_message,
            http_status: 0,
            api_error_code: std::ptr::null_mut(),
            three_d_secure_id: std::ptr::null_mut(),
            data_tag: FfiDataTag::None,
            data: std::ptr::null_mut(),
        }
    }

    fn ok(data_tag: FfiDataTag, data: *mut c_void) -> *mut Self {
        let mut result = Self::empty(FfiErrorCode::Ok, std::ptr::null_mut());
        result.data_tag = data_tag;
        result.data = data;
        Box::into_raw(Box::new(result))
    }

    /// Build a success result carrying an `FfiToken`.
    pub(crate) fn ok_token(token: Token) -> *mut Self {
        let ffi_token = Box::new(FfiToken {
            id: c_string(token.id),
            card: FfiCard::from_core(token.card),
            created_at: token.created_at.timestamp(),
            livemode: token.livemode,
            used: token.used,
        });
        Self::ok(FfiDataTag::Token, Box::into_raw(ffi_token) as *mut c_void)
    }

    /// Build a success result carrying an `FfiAcceptedBrands`.
    pub(crate) fn ok_accepted_brands(accepted: AcceptedBrands) -> *mut Self {
        let len = accepted.brands.len() as u32;
        let brands: Box<[FfiCardBrand]> = accepted.brands.into_iter().map(Into::into).collect();
        let brands = if brands.is_empty() {
            std::ptr::null_mut()
        } else {
            Box::into_raw(brands) as *mut FfiCardBrand
        };
        let ffi_brands = Box::new(FfiAcceptedBrands {
            brands,
            len,
            livemode: accepted.livemode,
        });
        Self::ok(FfiDataTag::AcceptedBrands, Box::into_raw(ffi_brands) as *mut c_void)
    }

    /// Build an error result from a `ClientError`.
    pub(crate) fn from_error(err: ClientError) -> *mut Self {
        let mut result = Self::empty(FfiErrorCode::Ok, c_string(err.to_string()));
        match err {
            ClientError::SystemError(_) => result.error_code = FfiErrorCode::SystemError,
            ClientError::InvalidJson { status, .. } => {
                result.error_code = FfiErrorCode::InvalidJson;
                result.http_status = status;
            }
            ClientError::ServiceError(api) => {
                result.error_code = FfiErrorCode::ServiceError;
                result.http_status = api.status_code;
                result.api_error_code = c_string_opt(api.code);
            }
            ClientError::RateLimitExceeded => {
                result.error_code = FfiErrorCode::RateLimitExceeded;
                result.http_status = 429;
            }
            ClientError::RequiredThreeDSecure(tds) => {
                result.error_code = FfiErrorCode::RequiredThreeDSecure;
                result.three_d_secure_id = c_string(tds.id);
            }
        }
        Box::into_raw(Box::new(result))
    }

    /// Build an error result for a null argument.
    pub(crate) fn null_arg(name: &str) -> *mut Self {
        let msg = c_string(format!("null argument: {name}"));
        Box::into_raw(Box::new(Self::empty(FfiErrorCode::NullArg, msg)))
    }

    /// Build an error result for an argument that is not valid UTF-8.
    pub(crate) fn invalid_arg(name: &str) -> *mut Self {
        let msg = c_string(format!("invalid UTF-8 in argument: {name}"));
        Box::into_raw(Box::new(Self::empty(FfiErrorCode::InvalidArg, msg)))
    }

    /// Build an error result for a caught panic.
    pub(crate) fn panic(msg: &str) -> *mut Self {
        Box::into_raw(Box::new(Self::empty(FfiErrorCode::Panic, c_string(msg))))
    }
}
