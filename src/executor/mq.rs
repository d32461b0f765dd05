//! Message-queue executor: an external interface boundary (spec §6). The
//! in-memory adapter here is a test approximation, not a production driver.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;

use crate::context::ExecutionContext;
use crate::error::RuntimeError;
use crate::expression::VariableResolver;
use crate::types::{MqResult, Step, StepOutput, StepResult};

use super::base::ExecutorBase;
use super::Executor;

/// The operation an mq step performs, per spec §6: "Connect, Publish,
/// Consume, Close, IsConnected."
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MqAction {
    Connect,
    Publish,
    Consume,
    Close,
    IsConnected,
}

impl MqAction {
    fn parse(raw: Option<&str>) -> Result<Self, String> {
        match raw {
            None | Some("publish") => Ok(Self::Publish),
            Some("consume") => Ok(Self::Consume),
            Some("connect") => Ok(Self::Connect),
            Some("close") => Ok(Self::Close),
            Some("is_connected") => Ok(Self::IsConnected),
            Some(other) => Err(other.to_string()),
        }
    }
}

/// A fully resolved message-queue request, ready to hand to an adapter.
/// Carries the full unified `MQOperation` field set from spec §6: `key` and
/// `headers` travel with a publish, `count` bounds a consume.
#[derive(Debug, Clone)]
pub struct MqRequest {
    pub action: MqAction,
    pub topic: String,
    pub messages: Vec<Value>,
    pub key: Option<String>,
    pub headers: HashMap<String, String>,
    pub count: Option<u64>,
}

#[async_trait]
pub trait MqAdapter: Send + Sync {
    async fn connect(&self) -> Result<(), RuntimeError> {
        Ok(())
    }

    #[must_use]
    async fn is_connected(&self) -> bool {
        true
    }

    async fn run(&self, request: MqRequest) -> Result<MqResult, RuntimeError>;

    async fn close(&self) -> Result<(), RuntimeError> {
        Ok(())
    }
}

/// In-process queue for tests: `publish` appends, `consume` drains up to
/// `count` messages (or all of them, if unset), and `connect`/`close`/
/// `is_connected` toggle a plain connectivity flag rather than modeling a
/// real broker handshake.
pub struct InMemoryMqAdapter {
    topics: Mutex<HashMap<String, Vec<Value>>>,
    connected: AtomicBool,
}

impl Default for InMemoryMqAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryMqAdapter {
    #[must_use]
    pub fn new() -> Self {
        Self {
            topics: Mutex::new(HashMap::new()),
            connected: AtomicBool::new(true),
        }
    }
}

#[async_trait]
impl MqAdapter for InMemoryMqAdapter {
    async fn connect(&self) -> Result<(), RuntimeError> {
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn run(&self, request: MqRequest) -> Result<MqResult, RuntimeError> {
        Ok(match request.action {
            MqAction::Connect => {
                self.connected.store(true, Ordering::SeqCst);
                MqResult { success: true, connected: Some(true), ..MqResult::default() }
            }
            MqAction::Close => {
                self.connected.store(false, Ordering::SeqCst);
                MqResult { success: true, connected: Some(false), ..MqResult::default() }
            }
            MqAction::IsConnected => {
                let connected = self.connected.load(Ordering::SeqCst);
                MqResult { success: true, connected: Some(connected), ..MqResult::default() }
            }
            MqAction::Publish => {
                let mut topics = self.topics.lock().expect("topics lock poisoned");
                let queue = topics.entry(request.topic).or_default();
                let count = request.messages.len() as u64;
                queue.extend(request.messages);
                MqResult { success: true, count, ..MqResult::default() }
            }
            MqAction::Consume => {
                let mut topics = self.topics.lock().expect("topics lock poisoned");
                let queue = topics.entry(request.topic).or_default();
                let take = request.count.map_or(queue.len(), |c| c as usize).min(queue.len());
                let drained: Vec<Value> = queue.drain(..take).collect();
                MqResult {
                    success: true,
                    count: drained.len() as u64,
                    messages: drained,
                    ..MqResult::default()
                }
            }
        })
    }

    async fn close(&self) -> Result<(), RuntimeError> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }
}

pub struct MqExecutor {
    base: ExecutorBase,
    adapter: Box<dyn MqAdapter>,
}

impl MqExecutor {
    #[must_use]
    pub fn new(adapter: Box<dyn MqAdapter>) -> Self {
        Self {
            base: ExecutorBase::new("mq"),
            adapter,
        }
    }
}

#[async_trait]
impl Executor for MqExecutor {
    fn type_name(&self) -> &str {
        self.base.type_name()
    }

    async fn init(&self, config: &HashMap<String, Value>) -> Result<(), RuntimeError> {
        self.base.store_config(config.clone());
        self.adapter.connect().await
    }

    async fn execute(&self, step: &Step, ctx: &ExecutionContext) -> Result<StepResult, RuntimeError> {
        let start = Utc::now();

        if step.disabled {
            return Ok(StepResult::skipped(&step.id, start));
        }

        let eval_ctx = ctx.to_evaluation_context();

        let operation_raw = self.base.resolve(&step.config, "operation").and_then(|v| v.as_str().map(str::to_string));
        let action = match MqAction::parse(operation_raw.as_deref()) {
            Ok(action) => action,
            Err(unknown) => {
                let err = RuntimeError::config(format!("unsupported mq operation: {unknown}"))
                    .with_step_id(step.id.clone());
                return Ok(StepResult::failed(&step.id, start, StepOutput::None, err.to_string()));
            }
        };

        let request = match action {
            MqAction::Connect | MqAction::Close | MqAction::IsConnected => MqRequest {
                action,
                topic: String::new(),
                messages: Vec::new(),
                key: None,
                headers: HashMap::new(),
                count: None,
            },
            MqAction::Publish | MqAction::Consume => {
                let topic_raw = match self
                    .base
                    .resolve(&step.config, "topic")
                    .and_then(|v| v.as_str().map(str::to_string))
                {
                    Some(topic) => topic,
                    None => {
                        let err = RuntimeError::config("mq step is missing topic").with_step_id(step.id.clone());
                        return Ok(StepResult::failed(&step.id, start, StepOutput::None, err.to_string()));
                    }
                };
                let topic = VariableResolver::resolve_string(&topic_raw, &eval_ctx);

                let messages = match self.base.resolve(&step.config, "messages") {
                    Some(Value::Array(items)) => {
                        items.iter().map(|v| VariableResolver::resolve_json(v, &eval_ctx)).collect()
                    }
                    _ => Vec::new(),
                };

                let key = self
                    .base
                    .resolve(&step.config, "key")
                    .and_then(|v| v.as_str().map(str::to_string))
                    .map(|raw| VariableResolver::resolve_string(&raw, &eval_ctx));

                let headers = match self.base.resolve(&step.config, "headers") {
                    Some(Value::Object(map)) => {
                        map.into_iter().filter_map(|(k, v)| v.as_str().map(|s| (k, s.to_string()))).collect()
                    }
                    _ => HashMap::new(),
                };

                let count = self.base.resolve(&step.config, "count").and_then(|v| v.as_u64());

                MqRequest { action, topic, messages, key, headers, count }
            }
        };

        Ok(match self.adapter.run(request).await {
            Ok(mq_result) if mq_result.success => {
                StepResult::success(&step.id, start, StepOutput::Mq(mq_result))
            }
            Ok(mq_result) => {
                let message = mq_result.error.clone().unwrap_or_else(|| "mq operation failed".to_string());
                StepResult::failed(&step.id, start, StepOutput::Mq(mq_result), message)
            }
            Err(err) => StepResult::failed(&step.id, start, StepOutput::None, err.to_string()),
        })
    }

    async fn cleanup(&self) -> Result<(), RuntimeError> {
        self.adapter.close().await
    }
}
