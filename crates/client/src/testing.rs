//! Scripted transport for unit tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use http::Method;
use waypost_core::{EdgeRequest, Error, ResponseSnapshot};

use crate::fetch::Transport;

/// Answers every request with a scripted response, or `200 "<METHOD> <url>"`
/// when nothing is scripted. Every attempt is recorded, including those made
/// while offline.
pub(crate) struct MockTransport {
    online: AtomicBool,
    delay: Option<Duration>,
    responses: Mutex<HashMap<String, ResponseSnapshot>>,
    calls: Mutex<Vec<EdgeRequest>>,
}

impl MockTransport {
    pub fn online() -> Self {
        Self { online: AtomicBool::new(true), delay: None, responses: Mutex::default(), calls: Mutex::default() }
    }

    pub fn offline() -> Self {
        let transport = Self::online();
        transport.set_online(false);
        transport
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    pub fn respond(&self, method: Method, url: &str, snapshot: ResponseSnapshot) {
        self.responses.lock().unwrap().insert(format!("{method} {url}"), snapshot);
    }

    pub fn calls(&self) -> Vec<EdgeRequest> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn fetch(&self, request: &EdgeRequest) -> Result<ResponseSnapshot, Error> {
        self.calls.lock().unwrap().push(request.clone());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if !self.online.load(Ordering::SeqCst) {
            return Err(Error::Network(format!("offline: {}", request.url)));
        }

        let key = format!("{} {}", request.method, request.url);
        let scripted = self.responses.lock().unwrap().get(&key).cloned();
        Ok(scripted.unwrap_or_else(|| ResponseSnapshot::new(200, key)))
    }
}
