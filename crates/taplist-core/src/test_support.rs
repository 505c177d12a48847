//! Scripted `Transport` for unit tests.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::api::{Transport, TransportResponse};
use crate::config::CoreConfig;
use crate::error::TransportError;

#[derive(Debug, Clone)]
enum Route {
    Respond(TransportResponse),
    Unreachable(String),
}

/// A recorded PATCH request
#[derive(Debug, Clone)]
pub struct PatchCall {
    pub url: String,
    pub bearer: String,
    pub body: serde_json::Value,
}

/// Answers requests from a table of routes and records every call.
///
/// Each call yields to the scheduler once before answering, so overlapping
/// requests behave like real network I/O. Unknown URLs get a 404; the default
/// beers-info endpoint answers `{}` unless overridden.
#[derive(Debug, Default)]
pub struct FakeTransport {
    routes: Mutex<HashMap<String, Route>>,
    calls: Mutex<Vec<String>>,
    patches: Mutex<Vec<PatchCall>>,
}

impl FakeTransport {
    pub fn new() -> Arc<Self> {
        let transport = Self::default();
        transport.respond(
            &CoreConfig::default().beers_info_url(),
            TransportResponse::new(200, "{}"),
        );
        Arc::new(transport)
    }

    pub fn respond(&self, url: &str, response: TransportResponse) {
        self.routes
            .lock()
            .insert(url.to_string(), Route::Respond(response));
    }

    pub fn unreachable(&self, url: &str, message: &str) {
        self.routes
            .lock()
            .insert(url.to_string(), Route::Unreachable(message.to_string()));
    }

    pub fn calls_to(&self, url: &str) -> usize {
        self.calls.lock().iter().filter(|c| c.as_str() == url).count()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn patches(&self) -> Vec<PatchCall> {
        self.patches.lock().clone()
    }

    fn answer(&self, url: &str) -> Result<TransportResponse, TransportError> {
        self.calls.lock().push(url.to_string());
        match self.routes.lock().get(url).cloned() {
            Some(Route::Respond(response)) => Ok(response),
            Some(Route::Unreachable(message)) => Err(TransportError::Unreachable(message)),
            None => Ok(TransportResponse::new(404, "not found")),
        }
    }
}

#[async_trait::async_trait]
impl Transport for FakeTransport {
    async fn get(&self, url: &str) -> Result<TransportResponse, TransportError> {
        tokio::task::yield_now().await;
        self.answer(url)
    }

    async fn patch_json(
        &self,
        url: &str,
        bearer: &str,
        body: &serde_json::Value,
    ) -> Result<TransportResponse, TransportError> {
        tokio::task::yield_now().await;
        self.patches.lock().push(PatchCall {
            url: url.to_string(),
            bearer: bearer.to_string(),
            body: body.clone(),
        });
        self.answer(url)
    }
}

/// JSON array body for `(id, name)` pairs
pub fn beers_json(beers: &[(u64, &str)]) -> String {
    let list: Vec<serde_json::Value> = beers
        .iter()
        .map(|(id, name)| serde_json::json!({ "id": id, "name": name, "abv": 5.0 }))
        .collect();
    serde_json::Value::Array(list).to_string()
}

/// Poll `condition` until it holds, yielding to other tasks in between.
pub async fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if condition() {
            return true;
        }
        tokio::task::yield_now().await;
    }
    condition()
}
