//! In-process [`PlanfixApi`] used by tests.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use super::client::{HttpMethod, PlanfixApi, PlanfixRequest};
use super::error::{PlanfixError, PlanfixResult};

#[derive(Debug, Clone)]
enum Canned {
    Json(Value),
    Fail(u16, String),
}

/// Serves canned responses keyed by `"METHOD path"` and records every call.
///
/// When several responses are queued for one key they are served in order;
/// the last one keeps being served afterwards.
#[derive(Debug, Default)]
pub struct MockApi {
    responses: Mutex<HashMap<String, VecDeque<Canned>>>,
    requests: Mutex<Vec<PlanfixRequest>>,
}

fn key(method: HttpMethod, path: &str) -> String {
    format!("{} {}", method, path)
}

impl MockApi {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, method: HttpMethod, path: &str, canned: Canned) {
        self.responses
            .lock()
            .unwrap()
            .entry(key(method, path))
            .or_default()
            .push_back(canned);
    }

    pub fn on(&self, method: HttpMethod, path: &str, response: Value) -> &Self {
        self.push(method, path, Canned::Json(response));
        self
    }

    pub fn fail(&self, method: HttpMethod, path: &str, status: u16, message: &str) -> &Self {
        self.push(method, path, Canned::Fail(status, message.to_string()));
        self
    }

    /// All recorded requests in call order.
    pub fn requests(&self) -> Vec<PlanfixRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Recorded requests to `path` (any method).
    pub fn requests_to(&self, path: &str) -> Vec<PlanfixRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.path == path)
            .collect()
    }

    pub fn calls(&self, path: &str) -> usize {
        self.requests_to(path).len()
    }

    /// Body of the last request to `path`.
    pub fn last_body(&self, path: &str) -> Option<Value> {
        self.requests_to(path).pop().and_then(|r| r.body)
    }
}

#[async_trait]
impl PlanfixApi for MockApi {
    async fn request(&self, request: PlanfixRequest) -> PlanfixResult<Value> {
        let canned = {
            let mut responses = self.responses.lock().unwrap();
            responses
                .get_mut(&key(request.method, &request.path))
                .and_then(|queue| {
                    if queue.len() > 1 {
                        queue.pop_front()
                    } else {
                        queue.front().cloned()
                    }
                })
        };
        let path = request.path.clone();
        let method = request.method;
        self.requests.lock().unwrap().push(request);

        match canned {
            Some(Canned::Json(value)) => Ok(value),
            Some(Canned::Fail(status, message)) => Err(PlanfixError::api(status, message)),
            None => Err(PlanfixError::api(
                404,
                format!("no mock for {}", key(method, &path)),
            )),
        }
    }
}
