//! Key material and payload builders.

use std::collections::HashMap;
use std::sync::Arc;

use reqwest::header::{HeaderMap, HeaderValue};

use crate::auth::credential::Credential;
use crate::auth::validator::{WECHATPAY_NONCE, WECHATPAY_SERIAL, WECHATPAY_SIGNATURE, WECHATPAY_TIMESTAMP};
use crate::config::MerchantConfig;
use crate::crypto::aead::AeadCipher;
use crate::crypto::nonce::generate_nonce;
use crate::crypto::pem::{load_private_key, PlatformCertificate};
use crate::crypto::sign::sign_sha256_with_rsa;
use crate::transport::TransportResponse;

/// Merchant RSA-2048 private key (PKCS#8).
pub const MERCHANT_KEY_PEM: &str = include_str!("../../tests/fixtures/merchant_key.pem");
/// Private key behind platform certificate A (and the expired certificate).
pub const PLATFORM_A_KEY_PEM: &str = include_str!("../../tests/fixtures/platform_a_key.pem");
/// Platform certificate A, valid 2020-2120.
pub const PLATFORM_A_CERT_PEM: &str = include_str!("../../tests/fixtures/platform_a_cert.pem");
/// Private key behind platform certificate B.
pub const PLATFORM_B_KEY_PEM: &str = include_str!("../../tests/fixtures/platform_b_key.pem");
/// Platform certificate B, valid 2020-2120.
pub const PLATFORM_B_CERT_PEM: &str = include_str!("../../tests/fixtures/platform_b_cert.pem");
/// Platform certificate that expired in 2011.
pub const PLATFORM_EXPIRED_CERT_PEM: &str =
    include_str!("../../tests/fixtures/platform_expired_cert.pem");
/// Signature of the reference GET request, computed outside this crate.
pub const SCENARIO_SIGNATURE: &str = include_str!("../../tests/fixtures/scenario_signature.txt");

/// Serial of platform certificate A.
pub const PLATFORM_A_SERIAL: &str = "3775B6A45ACD588826D15E583A95F5DD1B1F1C6E";
/// Serial of platform certificate B.
pub const PLATFORM_B_SERIAL: &str = "5157F09EFDC096DE15EBE81A47057A7232F1B8E1";
/// Serial of the expired platform certificate.
pub const PLATFORM_EXPIRED_SERIAL: &str = "1A2B3C4D5E6F";

/// Test merchant id.
pub const MCH_ID: &str = "1900000109";
/// Test merchant certificate serial.
pub const MERCHANT_SERIAL: &str = "609B5C1DB6E1F0F52A0E0A2F0A4D3C2B1A0F9E8D";
/// Test API v3 key.
pub const API_V3_KEY: &str = "0123456789abcdefghijklmnopqrstuv";

/// Merchant configuration using the fixture key.
pub fn merchant_config() -> MerchantConfig {
    MerchantConfig::new(MCH_ID, MERCHANT_SERIAL, MERCHANT_KEY_PEM, API_V3_KEY)
}

/// Credential using the fixture merchant key.
pub fn merchant_credential() -> Credential {
    Credential::from_merchant(&merchant_config()).expect("fixture merchant key")
}

fn certificate_pem(serial_no: &str) -> &'static str {
    match serial_no {
        PLATFORM_A_SERIAL => PLATFORM_A_CERT_PEM,
        PLATFORM_B_SERIAL => PLATFORM_B_CERT_PEM,
        PLATFORM_EXPIRED_SERIAL => PLATFORM_EXPIRED_CERT_PEM,
        other => panic!("no fixture certificate for serial {other}"),
    }
}

/// In-memory certificate source holding the named fixture certificates.
pub fn certificate_map(serials: &[&str]) -> HashMap<String, Arc<PlatformCertificate>> {
    serials
        .iter()
        .map(|serial| {
            let cert = PlatformCertificate::from_pem(certificate_pem(serial))
                .expect("fixture certificate");
            (cert.serial_no().to_string(), Arc::new(cert))
        })
        .collect()
}

/// Split an `Authorization` header into its `key="value"` fields.
pub fn parse_authorization(header: &str) -> HashMap<String, String> {
    let (_, params) = header.split_once(' ').expect("scheme and parameters");
    params
        .split(',')
        .filter_map(|pair| pair.split_once('='))
        .map(|(k, v)| (k.to_string(), v.trim_matches('"').to_string()))
        .collect()
}

/// Response headers signed by `key_pem` over `timestamp`, a fresh nonce and `body`.
pub fn signed_headers(key_pem: &str, serial_no: &str, timestamp: i64, body: &str) -> HeaderMap {
    let key = load_private_key(key_pem).expect("fixture key");
    let nonce = generate_nonce();
    let message = format!("{timestamp}\n{nonce}\n{body}\n");
    let signature = sign_sha256_with_rsa(&message, &key).expect("sign");

    let mut headers = HeaderMap::new();
    let mut set = |name: &'static str, value: &str| {
        headers.insert(name, HeaderValue::from_str(value).expect("header value"));
    };
    set(WECHATPAY_TIMESTAMP, &timestamp.to_string());
    set(WECHATPAY_NONCE, &nonce);
    set(WECHATPAY_SIGNATURE, &signature);
    set(WECHATPAY_SERIAL, serial_no);
    headers
}

/// A signed transport response stamped with the current time.
pub fn signed_response(key_pem: &str, serial_no: &str, status: u16, body: &str) -> TransportResponse {
    let timestamp = chrono::Utc::now().timestamp();
    TransportResponse {
        status,
        headers: signed_headers(key_pem, serial_no, timestamp, body),
        body: body.to_string(),
    }
}

/// A transport response without any signature headers.
pub fn unsigned_response(status: u16, body: &str) -> TransportResponse {
    TransportResponse {
        status,
        headers: HeaderMap::new(),
        body: body.to_string(),
    }
}

/// `GET /v3/certificates` body listing `(serial, pem)` entries encrypted with `api_v3_key`.
pub fn certificate_list_body(api_v3_key: &str, entries: &[(&str, &str)]) -> String {
    let cipher = AeadCipher::new(api_v3_key).expect("fixture api v3 key");
    let data: Vec<serde_json::Value> = entries
        .iter()
        .enumerate()
        .map(|(i, (serial_no, pem))| {
            let nonce = format!("{:012}", i);
            let resource = cipher
                .encrypt(&nonce, pem, "certificate")
                .expect("encrypt certificate");
            serde_json::json!({
                "serial_no": serial_no,
                "effective_time": "2020-01-01T00:00:00+08:00",
                "expire_time": "2120-01-01T00:00:00+08:00",
                "encrypt_certificate": resource,
            })
        })
        .collect();
    serde_json::json!({ "data": data }).to_string()
}

/// Notification envelope whose resource is `plaintext` encrypted with `api_v3_key`.
pub fn notification_body(api_v3_key: &str, plaintext: &str) -> String {
    let cipher = AeadCipher::new(api_v3_key).expect("fixture api v3 key");
    let mut resource = cipher
        .encrypt("fdasflkja484", plaintext, "transaction")
        .expect("encrypt resource");
    resource.original_type = Some("transaction".to_string());
    serde_json::json!({
        "id": "EV-2018022511223320873",
        "create_time": "2015-05-20T13:29:35+08:00",
        "event_type": "TRANSACTION.SUCCESS",
        "resource_type": "encrypt-resource",
        "summary": "支付成功",
        "resource": resource,
    })
    .to_string()
}
