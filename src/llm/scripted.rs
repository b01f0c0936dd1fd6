//! Scripted generation service for tests.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Mutex;

use super::{GenerationRequest, GenerationService};
use crate::error::Result;

/// Replays queued responses in order and records every request.
///
/// Once the script runs out every call returns `Ok(None)`.
pub struct ScriptedService {
    responses: Mutex<VecDeque<Result<Option<Value>>>>,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedService {
    pub fn new(responses: Vec<Result<Option<Value>>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn remaining(&self) -> usize {
        self.responses.lock().unwrap().len()
    }
}

#[async_trait]
impl GenerationService for ScriptedService {
    async fn generate(&self, request: GenerationRequest) -> Result<Option<Value>> {
        self.requests.lock().unwrap().push(request);
        self.responses.lock().unwrap().pop_front().unwrap_or(Ok(None))
    }
}
