//! C-ABI wrapper around `payjp-core`.
//!
//! # Overview
//! Exposes card tokenization, 3-D Secure completion and accepted-brand lookup
//! through `extern "C"` functions so a native UI layer can drive the client
//! without linking to Rust's async runtime or serde directly.
//!
//! # Design
//! - Every `extern "C"` function wraps its body in `catch_unwind` so panics
//!   never cross the FFI boundary.
//! - Calls are asynchronous: each request runs on a worker thread and its
//!   outcome is delivered to a C callback exactly once, together with the
//!   caller's opaque `user_data`. Argument errors are delivered through the
//!   same callback, synchronously, before any thread is started.
//! - A single `FfiPayjpResult` envelope with `FfiDataTag` + `void* data`
//!   conveys success payloads and errors uniformly.
//! - The C caller owns all returned pointers and must call the matching
//!   `payjp_free_*` function to release them.

pub mod types;

use std::ffi::{c_void, CStr};
use std::os::raw::c_char;
use std::panic::{catch_unwind, AssertUnwindSafe};

use payjp_core::{
    CardParams, ClientConfig, ClientError, CreateTokenRequest, FinishTokenThreeDSecureRequest,
    GetAcceptedBrandsRequest, GetTokenRequest, PayjpClient, Request, ThreeDSecureToken,
};
use tracing::{debug, error};

use types::*;

// ---------------------------------------------------------------------------
// Argument helpers
// ---------------------------------------------------------------------------

/// Why a C argument could not be used.
enum ArgError {
    Null(&'static str),
    InvalidUtf8(&'static str),
}

impl ArgError {
    fn into_result(self) -> *mut FfiPayjpResult {
        match self {
            ArgError::Null(name) => FfiPayjpResult::null_arg(name),
            ArgError::InvalidUtf8(name) => FfiPayjpResult::invalid_arg(name),
        }
    }
}

/// Read a required C string argument.
fn required_str(ptr: *const c_char, name: &'static str) -> Result<String, ArgError> {
    if ptr.is_null() {
        return Err(ArgError::Null(name));
    }
    unsafe { CStr::from_ptr(ptr) }
        .to_str()
        .map(str::to_string)
        .map_err(|_| ArgError::InvalidUtf8(name))
}

/// Read a nullable C string argument.
fn optional_str(ptr: *const c_char, name: &'static str) -> Result<Option<String>, ArgError> {
    if ptr.is_null() {
        Ok(None)
    } else {
        required_str(ptr, name).map(Some)
    }
}

fn client_ref<'a>(client: *const FfiPayjpClient) -> Result<&'a FfiPayjpClient, ArgError> {
    if client.is_null() {
        Err(ArgError::Null("client"))
    } else {
        Ok(unsafe { &*client })
    }
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

/// Run `request` on a worker thread and deliver the converted outcome to
/// `callback`. Conversion panics are reported as `Panic` results so the
/// callback still fires exactly once.
fn dispatch<R, F>(
    client: &PayjpClient,
    request: R,
    callback: extern "C" fn(*mut FfiPayjpResult, *mut c_void),
    user_data: UserData,
    on_success: F,
) where
    R: Request + Send + 'static,
    R::Response: Send + 'static,
    F: FnOnce(R::Response) -> *mut FfiPayjpResult + Send + 'static,
{
    debug!(path = %request.path(), method = %request.method(), "dispatching request");
    client.request_with(request, move |outcome: Result<R::Response, ClientError>| {
        let result = catch_unwind(AssertUnwindSafe(|| match outcome {
            Ok(value) => on_success(value),
            Err(err) => FfiPayjpResult::from_error(err),
        }))
        .unwrap_or_else(|_| {
            error!("panic while converting response");
            FfiPayjpResult::panic("panic while converting response")
        });
        callback(result, user_data.into_raw());
    });
}

/// Shared body of the request entry points: validate arguments, then either
/// dispatch or report the argument error through the callback right away.
fn submit(
    callback: PayjpCallback,
    user_data: *mut c_void,
    name: &str,
    start: impl FnOnce(extern "C" fn(*mut FfiPayjpResult, *mut c_void), UserData) -> Result<(), ArgError>,
) {
    // Without a callback there is nowhere to deliver anything.
    let Some(callback) = callback else {
        error!(function = name, "called without a callback");
        return;
    };
    let outcome = catch_unwind(AssertUnwindSafe(|| start(callback, UserData::new(user_data))));
    match outcome {
        Ok(Ok(())) => {}
        Ok(Err(arg)) => callback(arg.into_result(), user_data),
        Err(_) => {
            error!(function = name, "panic before dispatch");
            callback(FfiPayjpResult::panic(&format!("panic in {name}")), user_data);
        }
    }
}

// ---------------------------------------------------------------------------
// Client lifecycle
// ---------------------------------------------------------------------------

/// Create a new client for `public_key`. `base_url` may be null to use the
/// production API.
///
/// Returns null if `public_key` is null or empty, if either string is not
/// valid UTF-8, if `base_url` is not a valid URL, or if an internal panic
/// occurs. The caller must free the returned pointer with `payjp_client_free`.
#[unsafe(no_mangle)]
pub extern "C" fn payjp_client_new(
    public_key: *const c_char,
    base_url: *const c_char,
) -> *mut FfiPayjpClient {
    catch_unwind(|| {
        let Ok(public_key) = required_str(public_key, "public_key") else {
            return std::ptr::null_mut();
        };
        let Ok(base_url) = optional_str(base_url, "base_url") else {
            return std::ptr::null_mut();
        };
        let config = ClientConfig::new(&public_key).and_then(|config| match base_url {
            Some(url) => config.with_base_url(&url),
            None => Ok(config),
        });
        match config {
            Ok(config) => Box::into_raw(Box::new(FfiPayjpClient {
                inner: PayjpClient::new(config),
            })),
            Err(err) => {
                error!(error = %err, "invalid client configuration");
                std::ptr::null_mut()
            }
        }
    })
    .unwrap_or(std::ptr::null_mut())
}

/// Free a client created by `payjp_client_new`. Safe to call with null.
///
/// Requests already in flight keep their own reference to the client and
/// still complete.
#[unsafe(no_mangle)]
pub extern "C" fn payjp_client_free(client: *mut FfiPayjpClient) {
    if !client.is_null() {
        // The client holds a `dyn Transport`, which is not `RefUnwindSafe`.
        let _ = catch_unwind(AssertUnwindSafe(|| {
            drop(unsafe { Box::from_raw(client) });
        }));
    }
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// Tokenize a card. `tenant` may be null.
///
/// Completes with `data_tag = Token`, or with `RequiredThreeDSecure` and
/// `three_d_secure_id` set when the issuer requires verification.
#[unsafe(no_mangle)]
pub extern "C" fn payjp_create_token(
    client: *const FfiPayjpClient,
    card: *const FfiCardParams,
    tenant: *const c_char,
    callback: PayjpCallback,
    user_data: *mut c_void,
) {
    submit(callback, user_data, "payjp_create_token", |callback, user_data| {
        let client = client_ref(client)?;
        if card.is_null() {
            return Err(ArgError::Null("card"));
        }
        let card = unsafe { &*card };
        let params = CardParams {
            number: required_str(card.number, "card.number")?,
            cvc: required_str(card.cvc, "card.cvc")?,
            exp_month: card.exp_month,
            exp_year: card.exp_year,
            name: optional_str(card.name, "card.name")?,
        };
        let mut request = CreateTokenRequest::card(params);
        if let Some(tenant) = optional_str(tenant, "tenant")? {
            request = request.with_tenant(&tenant);
        }
        dispatch(&client.inner, request, callback, user_data, FfiPayjpResult::ok_token);
        Ok(())
    });
}

/// Exchange a verified 3-D Secure token for a card token.
///
/// Completes with `data_tag = Token`.
#[unsafe(no_mangle)]
pub extern "C" fn payjp_create_token_with_three_d_secure(
    client: *const FfiPayjpClient,
    three_d_secure_token_id: *const c_char,
    callback: PayjpCallback,
    user_data: *mut c_void,
) {
    submit(
        callback,
        user_data,
        "payjp_create_token_with_three_d_secure",
        |callback, user_data| {
            let client = client_ref(client)?;
            let id = required_str(three_d_secure_token_id, "three_d_secure_token_id")?;
            let request = CreateTokenRequest::three_d_secure(&id);
            dispatch(&client.inner, request, callback, user_data, FfiPayjpResult::ok_token);
            Ok(())
        },
    );
}

/// Fetch a token by id. Completes with `data_tag = Token`.
#[unsafe(no_mangle)]
pub extern "C" fn payjp_get_token(
    client: *const FfiPayjpClient,
    token_id: *const c_char,
    callback: PayjpCallback,
    user_data: *mut c_void,
) {
    submit(callback, user_data, "payjp_get_token", |callback, user_data| {
        let client = client_ref(client)?;
        let id = required_str(token_id, "token_id")?;
        dispatch(&client.inner, GetTokenRequest::new(&id), callback, user_data, FfiPayjpResult::ok_token);
        Ok(())
    });
}

/// Finish 3-D Secure on a token the card holder has verified.
/// Completes with `data_tag = Token`.
#[unsafe(no_mangle)]
pub extern "C" fn payjp_finish_token_three_d_secure(
    client: *const FfiPayjpClient,
    token_id: *const c_char,
    callback: PayjpCallback,
    user_data: *mut c_void,
) {
    submit(
        callback,
        user_data,
        "payjp_finish_token_three_d_secure",
        |callback, user_data| {
            let client = client_ref(client)?;
            let id = required_str(token_id, "token_id")?;
            let request = FinishTokenThreeDSecureRequest::new(&id);
            dispatch(&client.inner, request, callback, user_data, FfiPayjpResult::ok_token);
            Ok(())
        },
    );
}

/// List the card brands accepted by the merchant, or by `tenant` when it is
/// not null. Completes with `data_tag = AcceptedBrands`.
#[unsafe(no_mangle)]
pub extern "C" fn payjp_get_accepted_brands(
    client: *const FfiPayjpClient,
    tenant: *const c_char,
    callback: PayjpCallback,
    user_data: *mut c_void,
) {
    submit(callback, user_data, "payjp_get_accepted_brands", |callback, user_data| {
        let client = client_ref(client)?;
        let request = match optional_str(tenant, "tenant")? {
            Some(tenant) => GetAcceptedBrandsRequest::for_tenant(&tenant),
            None => GetAcceptedBrandsRequest::new(),
        };
        dispatch(
            &client.inner,
            request,
            callback,
            user_data,
            FfiPayjpResult::ok_accepted_brands,
        );
        Ok(())
    });
}

/// Build the hosted verification page URL for a 3-D Secure token.
/// `redirect_url` and `redirect_url_key` are only used when both are set.
///
/// Returns null if `client` or `three_d_secure_token_id` is null or not valid
/// UTF-8. The caller must free the returned string with `payjp_free_string`.
#[unsafe(no_mangle)]
pub extern "C" fn payjp_three_d_secure_url(
    client: *const FfiPayjpClient,
    three_d_secure_token_id: *const c_char,
    redirect_url: *const c_char,
    redirect_url_key: *const c_char,
) -> *mut c_char {
    catch_unwind(AssertUnwindSafe(|| {
        let build = || -> Result<String, ArgError> {
            let client = client_ref(client)?;
            let id = required_str(three_d_secure_token_id, "three_d_secure_token_id")?;
            let redirect_url = optional_str(redirect_url, "redirect_url")?;
            let redirect_url_key = optional_str(redirect_url_key, "redirect_url_key")?;
            let config = client.inner.config();
            let redirect = redirect_url.as_deref().zip(redirect_url_key.as_deref());
            Ok(ThreeDSecureToken::new(id).verification_url(
                config.base_url(),
                config.public_key(),
                redirect,
            ))
        };
        build().map_or(std::ptr::null_mut(), c_string)
    }))
    .unwrap_or(std::ptr::null_mut())
}

// ---------------------------------------------------------------------------
// Free functions
// ---------------------------------------------------------------------------

/// Free an `FfiPayjpResult` delivered to a callback. Safe to call with null.
/// Uses `data_tag` to determine what `data` points to.
#[unsafe(no_mangle)]
pub extern "C" fn payjp_free_result(result: *mut FfiPayjpResult) {
    if result.is_null() {
        return;
    }
    let _ = catch_unwind(|| {
        let result = unsafe { Box::from_raw(result) };
        free_c_string(result.error_message);
        free_c_string(result.api_error_code);
        free_c_string(result.three_d_secure_id);
        if !result.data.is_null() {
            match result.data_tag {
                FfiDataTag::Token => {
                    let token = unsafe { Box::from_raw(result.data as *mut FfiToken) };
                    free_c_string(token.id);
                    token.card.free_fields();
                }
                FfiDataTag::AcceptedBrands => {
                    let accepted = unsafe { Box::from_raw(result.data as *mut FfiAcceptedBrands) };
                    if !accepted.brands.is_null() && accepted.len > 0 {
                        let slice =
                            std::ptr::slice_from_raw_parts_mut(accepted.brands, accepted.len as usize);
                        drop(unsafe { Box::from_raw(slice) });
                    }
                }
                FfiDataTag::None => {}
            }
        }
    });
}

/// Free a C string allocated by this library. Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn payjp_free_string(s: *mut c_char) {
    if !s.is_null() {
        let _ = catch_unwind(|| free_c_string(s));
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
