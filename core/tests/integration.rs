//! Token flows against the live mock server.
//!
//! # Design
//! Starts the mock server on a random port, then exercises every request type
//! over real HTTP through the ureq transport. Validates that request building,
//! status classification, 3-D Secure interception and decoding agree with the
//! server's actual wire format.

use std::net::SocketAddr;

use payjp_core::{
    CardBrand, CardParams, ClientConfig, ClientError, CreateTokenRequest,
    FinishTokenThreeDSecureRequest, GetAcceptedBrandsRequest, GetTokenRequest, PayjpClient,
    ThreeDSecureStatus, TransportError,
};

const PUBLIC_KEY: &str = "pk_test_0383a1b8f91e8a6e3ea0e2a9";

fn start_server() -> SocketAddr {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            payjp_mock::run(listener).await
        })
        .unwrap();
    });
    addr
}

fn client_for(addr: SocketAddr, public_key: &str) -> PayjpClient {
    let config = ClientConfig::new(public_key)
        .unwrap()
        .with_base_url(&format!("http://{addr}/v1/"))
        .unwrap();
    PayjpClient::new(config)
}

fn card(number: &str) -> CardParams {
    CardParams {
        number: number.to_string(),
        cvc: "123".to_string(),
        exp_month: 12,
        exp_year: 2030,
        name: Some("PAY TARO".to_string()),
    }
}

#[test]
fn token_lifecycle() {
    let addr = start_server();
    let client = client_for(addr, PUBLIC_KEY);

    // Step 1: tokenize a card.
    let created = client
        .execute_blocking(&CreateTokenRequest::card(card("378282246310005")))
        .unwrap();
    assert!(created.id.starts_with("tok_"));
    assert_eq!(created.card.brand, CardBrand::AmericanExpress);
    assert_eq!(created.card.last4, "0005");
    assert_eq!(created.card.exp_month, 12);
    assert_eq!(created.card.name.as_deref(), Some("PAY TARO"));
    assert!(created.card.three_d_secure_status.is_none());

    // Step 2: fetch it back.
    let fetched = client
        .execute_blocking(&GetTokenRequest::new(&created.id))
        .unwrap();
    assert_eq!(fetched, created);

    // Step 3: finish 3-D Secure on the token.
    let finished = client
        .execute_blocking(&FinishTokenThreeDSecureRequest::new(&created.id))
        .unwrap();
    assert_eq!(
        finished.card.three_d_secure_status,
        Some(ThreeDSecureStatus::Verified)
    );

    // Step 4: unknown token is a service error carrying the API fields.
    let err = client
        .execute_blocking(&GetTokenRequest::new("tok_missing"))
        .unwrap_err();
    let api = err.api_error().expect("service error");
    assert_eq!(api.status_code, 404);
    assert_eq!(api.param.as_deref(), Some("id"));
}

#[test]
fn three_d_secure_card_requires_verification() {
    let addr = start_server();
    let client = client_for(addr, PUBLIC_KEY);

    let err = client
        .execute_blocking(&CreateTokenRequest::card(card(
            payjp_mock::THREE_D_SECURE_CARD_NUMBER,
        )))
        .unwrap_err();
    let tds = match err {
        ClientError::RequiredThreeDSecure(tds) => tds,
        other => panic!("expected RequiredThreeDSecure, got {other:?}"),
    };
    assert!(tds.id.starts_with("tds_"));

    let url = tds.verification_url(client.config().base_url(), PUBLIC_KEY, None);
    assert_eq!(
        url,
        format!("http://{addr}/v1/tds/{}/start?publickey={PUBLIC_KEY}", tds.id)
    );

    let token = client
        .execute_blocking(&CreateTokenRequest::three_d_secure(&tds.id))
        .unwrap();
    assert_eq!(
        token.card.three_d_secure_status,
        Some(ThreeDSecureStatus::Verified)
    );
}

#[test]
fn declined_card_is_service_error() {
    let addr = start_server();
    let client = client_for(addr, PUBLIC_KEY);

    let err = client
        .execute_blocking(&CreateTokenRequest::card(card(payjp_mock::DECLINED_CARD_NUMBER)))
        .unwrap_err();
    let api = err.api_error().expect("service error");
    assert_eq!(api.status_code, 402);
    assert_eq!(api.error_type, "card_error");
    assert_eq!(api.code.as_deref(), Some("card_declined"));
}

#[test]
fn rate_limited_tenant_is_rate_limit_exceeded() {
    let addr = start_server();
    let client = client_for(addr, PUBLIC_KEY);

    let err = client
        .execute_blocking(
            &CreateTokenRequest::card(card("4242424242424242"))
                .with_tenant(payjp_mock::RATE_LIMITED_TENANT),
        )
        .unwrap_err();
    assert!(matches!(err, ClientError::RateLimitExceeded));

    let err = client
        .execute_blocking(&GetAcceptedBrandsRequest::for_tenant(
            payjp_mock::RATE_LIMITED_TENANT,
        ))
        .unwrap_err();
    assert!(matches!(err, ClientError::RateLimitExceeded));
}

#[test]
fn secret_key_is_rejected() {
    let addr = start_server();
    let client = client_for(addr, "sk_test_not_public");

    let err = client
        .execute_blocking(&GetTokenRequest::new("tok_1"))
        .unwrap_err();
    assert_eq!(err.api_error().map(|e| e.status_code), Some(401));
}

#[test]
fn accepted_brands_decode_without_discriminator() {
    let addr = start_server();
    let client = client_for(addr, PUBLIC_KEY);

    let brands = client
        .execute_blocking(&GetAcceptedBrandsRequest::new())
        .unwrap();
    assert_eq!(brands.brands, CardBrand::ALL.to_vec());
    assert!(!brands.livemode);
}

#[test]
fn unreachable_host_is_system_error() {
    // Bind then drop to get a port nothing listens on.
    let addr = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap();
    let client = client_for(addr, PUBLIC_KEY);

    let err = client
        .execute_blocking(&GetTokenRequest::new("tok_1"))
        .unwrap_err();
    assert!(matches!(err, ClientError::SystemError(TransportError::Connection(_))));
}

#[test]
fn undecodable_200_body_is_invalid_json() {
    use std::io::{Read, Write};

    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
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
        let mut raw = b"HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 3\r\nConnection: close\r\n\r\n".to_vec();
        raw.extend_from_slice(&[0xff, 0xfe, 0x7b]);
        stream.write_all(&raw).unwrap();
    });
    let client = client_for(addr, PUBLIC_KEY);

    let err = client
        .execute_blocking(&GetTokenRequest::new("tok_1"))
        .unwrap_err();
    assert!(matches!(err, ClientError::InvalidJson { status: 200, .. }), "{err:?}");
}

#[tokio::test(flavor = "multi_thread")]
async fn concurrent_async_calls_are_independent() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(payjp_mock::run(listener));
    let client = client_for(addr, PUBLIC_KEY);

    let ok = client.execute(CreateTokenRequest::card(card("4242424242424242")));
    let declined = client.execute(CreateTokenRequest::card(card(
        payjp_mock::DECLINED_CARD_NUMBER,
    )));
    let (ok, declined) = tokio::join!(ok, declined);

    assert_eq!(ok.unwrap().card.brand, CardBrand::Visa);
    assert!(matches!(declined, Err(ClientError::ServiceError(_))));
}
