//! In-memory transport that records requests and replays canned responses.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::transport::{Transport, TransportRequest, TransportResponse};
use crate::{Result, WechatPayError};

/// Scripted [`Transport`].
///
/// Responses are served in push order. Once the queue is drained every
/// request fails with a transport error.
#[derive(Debug, Default)]
pub struct MockTransport {
    responses: Mutex<VecDeque<Result<TransportResponse>>>,
    requests: Mutex<Vec<TransportRequest>>,
}

impl MockTransport {
    /// Create a transport with no scripted responses.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response.
    pub fn push(&self, response: TransportResponse) {
        self.push_result(Ok(response));
    }

    /// Queue an error.
    pub fn push_error(&self, error: WechatPayError) {
        self.push_result(Err(error));
    }

    fn push_result(&self, result: Result<TransportResponse>) {
        let mut responses = self.responses.lock().unwrap_or_else(|e| e.into_inner());
        responses.push_back(result);
    }

    /// Requests received so far.
    pub fn requests(&self) -> Vec<TransportRequest> {
        let requests = self.requests.lock().unwrap_or_else(|e| e.into_inner());
        requests.clone()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn execute(&self, request: TransportRequest) -> Result<TransportResponse> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request);
        let mut responses = self.responses.lock().unwrap_or_else(|e| e.into_inner());
        responses
            .pop_front()
            .unwrap_or_else(|| Err(WechatPayError::Transport("no scripted response".to_string())))
    }
}
