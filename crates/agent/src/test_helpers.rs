//! Shared test helpers for session tests.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;
use stockflow_core::{ChatReply, ChatRequest, InferenceBackend, InferenceError};

/// One scripted backend behaviour.
pub enum Step {
    Reply(ChatReply),
    Fail(InferenceError),
    /// Sleep (on the tokio clock) before replying.
    Slow(Duration, ChatReply),
    /// Never complete.
    Hang,
}

impl Step {
    pub fn reply(text: &str) -> Self {
        Step::Reply(ChatReply::text(text))
    }

    pub fn unavailable() -> Self {
        Step::Fail(InferenceError::Api {
            status_code: 503,
            message: "Service Unavailable".into(),
        })
    }
}

/// A backend that plays back a sequence of steps.
///
/// Panics if called more times than there are steps.
pub struct ScriptedBackend {
    name: String,
    steps: Mutex<VecDeque<Step>>,
    call_count: Mutex<usize>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedBackend {
    pub fn new(name: &str, steps: Vec<Step>) -> Self {
        Self {
            name: name.into(),
            steps: Mutex::new(steps.into()),
            call_count: Mutex::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        *self.call_count.lock().unwrap()
    }

    /// Requests received so far, oldest first.
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl InferenceBackend for ScriptedBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, request: ChatRequest) -> Result<ChatReply, InferenceError> {
        *self.call_count.lock().unwrap() += 1;
        self.requests.lock().unwrap().push(request);

        let step = self
            .steps
            .lock()
            .unwrap()
            .pop_front()
            .expect("ScriptedBackend: no more scripted steps");

        match step {
            Step::Reply(reply) => Ok(reply),
            Step::Fail(err) => Err(err),
            Step::Slow(delay, reply) => {
                tokio::time::sleep(delay).await;
                Ok(reply)
            }
            Step::Hang => std::future::pending().await,
        }
    }
}
