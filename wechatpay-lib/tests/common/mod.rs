//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use wechatpay_lib::crypto::{generate_nonce, load_private_key, sign_sha256_with_rsa, AeadCipher};
use wechatpay_lib::{
    MerchantConfig, Result, Transport, TransportRequest, TransportResponse, WechatPayError,
};

pub const MERCHANT_KEY_PEM: &str = include_str!("../fixtures/merchant_key.pem");
pub const PLATFORM_A_KEY_PEM: &str = include_str!("../fixtures/platform_a_key.pem");
pub const PLATFORM_A_CERT_PEM: &str = include_str!("../fixtures/platform_a_cert.pem");
pub const PLATFORM_B_KEY_PEM: &str = include_str!("../fixtures/platform_b_key.pem");
pub const PLATFORM_B_CERT_PEM: &str = include_str!("../fixtures/platform_b_cert.pem");

pub const PLATFORM_A_SERIAL: &str = "3775B6A45ACD588826D15E583A95F5DD1B1F1C6E";
pub const PLATFORM_B_SERIAL: &str = "5157F09EFDC096DE15EBE81A47057A7232F1B8E1";

pub const MCH_ID: &str = "1900000109";
pub const MERCHANT_SERIAL: &str = "609B5C1DB6E1F0F52A0E0A2F0A4D3C2B1A0F9E8D";
pub const API_V3_KEY: &str = "0123456789abcdefghijklmnopqrstuv";

pub fn merchant(mch_id: &str, api_v3_key: &str) -> MerchantConfig {
    MerchantConfig::new(mch_id, MERCHANT_SERIAL, MERCHANT_KEY_PEM, api_v3_key)
}

pub fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// `(name, value)` pairs of signed response headers.
pub fn signature_headers(key_pem: &str, serial_no: &str, timestamp: i64, body: &str) -> Vec<(&'static str, String)> {
    let key = load_private_key(key_pem).unwrap();
    let nonce = generate_nonce();
    let signature = sign_sha256_with_rsa(&format!("{timestamp}\n{nonce}\n{body}\n"), &key).unwrap();
    vec![
        ("Wechatpay-Timestamp", timestamp.to_string()),
        ("Wechatpay-Nonce", nonce),
        ("Wechatpay-Signature", signature),
        ("Wechatpay-Serial", serial_no.to_string()),
    ]
}

pub fn signed_headers(key_pem: &str, serial_no: &str, timestamp: i64, body: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for (name, value) in signature_headers(key_pem, serial_no, timestamp, body) {
        headers.insert(name, HeaderValue::from_str(&value).unwrap());
    }
    headers
}

pub fn signed_response(key_pem: &str, serial_no: &str, body: &str) -> TransportResponse {
    TransportResponse {
        status: 200,
        headers: signed_headers(key_pem, serial_no, now(), body),
        body: body.to_string(),
    }
}

pub fn unsigned_response(body: &str) -> TransportResponse {
    TransportResponse {
        status: 200,
        headers: HeaderMap::new(),
        body: body.to_string(),
    }
}

pub fn certificate_list_body(api_v3_key: &str, entries: &[(&str, &str)]) -> String {
    let cipher = AeadCipher::new(api_v3_key).unwrap();
    let data: Vec<serde_json::Value> = entries
        .iter()
        .enumerate()
        .map(|(i, (serial_no, pem))| {
            let resource = cipher
                .encrypt(&format!("{:012}", i), pem, "certificate")
                .unwrap();
            serde_json::json!({ "serial_no": serial_no, "encrypt_certificate": resource })
        })
        .collect();
    serde_json::json!({ "data": data }).to_string()
}

pub fn parse_authorization(header: &str) -> HashMap<String, String> {
    let (_, params) = header.split_once(' ').unwrap();
    params
        .split(',')
        .filter_map(|pair| pair.split_once('='))
        .map(|(k, v)| (k.to_string(), v.trim_matches('"').to_string()))
        .collect()
}

/// Transport answering from a queue and recording every request.
#[derive(Default)]
pub struct ScriptedTransport {
    responses: Mutex<VecDeque<Result<TransportResponse>>>,
    requests: Mutex<Vec<TransportRequest>>,
}

impl ScriptedTransport {
    pub fn push(&self, response: TransportResponse) {
        self.responses.lock().unwrap().push_back(Ok(response));
    }

    pub fn push_error(&self, error: WechatPayError) {
        self.responses.lock().unwrap().push_back(Err(error));
    }

    pub fn requests(&self) -> Vec<TransportRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn execute(&self, request: TransportRequest) -> Result<TransportResponse> {
        self.requests.lock().unwrap().push(request);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(WechatPayError::Transport("no scripted response".into())))
    }
}

/// Transport that routes by merchant id found in the `Authorization` header.
#[derive(Default)]
pub struct MerchantRoutedTransport {
    routes: Mutex<HashMap<String, VecDeque<Result<TransportResponse>>>>,
}

impl MerchantRoutedTransport {
    pub fn push(&self, mch_id: &str, response: Result<TransportResponse>) {
        self.routes
            .lock()
            .unwrap()
            .entry(mch_id.to_string())
            .or_default()
            .push_back(response);
    }
}

#[async_trait]
impl Transport for MerchantRoutedTransport {
    async fn execute(&self, request: TransportRequest) -> Result<TransportResponse> {
        let authorization = request.headers["authorization"].to_str().unwrap().to_string();
        let mch_id = parse_authorization(&authorization)["mchid"].clone();
        self.routes
            .lock()
            .unwrap()
            .get_mut(&mch_id)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| Err(WechatPayError::Transport(format!("no route for {mch_id}"))))
    }
}
