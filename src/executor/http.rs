//! HTTP executor: an external interface boundary (spec §6). The adapter
//! trait is the concrete production collaborator a deployment wires in; this
//! crate ships no real HTTP client, only the interface and the contract
//! tests run against.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
#[cfg(test)]
use mockall::automock;
use serde_json::Value;

use crate::context::ExecutionContext;
use crate::error::RuntimeError;
use crate::expression::VariableResolver;
use crate::types::{HttpResponse, Step, StepOutput, StepResult};

use super::base::ExecutorBase;
use super::Executor;

/// A fully resolved HTTP request, ready to hand to an adapter.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: String,
    pub url: String,
    pub headers: HashMap<String, String>,
    pub body: Option<Value>,
}

/// Performs the actual network call. Production deployments wire in a real
/// client; tests wire in a fixture.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait HttpAdapter: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, RuntimeError>;
}

pub struct HttpExecutor {
    base: ExecutorBase,
    adapter: Box<dyn HttpAdapter>,
}

impl HttpExecutor {
    #[must_use]
    pub fn new(adapter: Box<dyn HttpAdapter>) -> Self {
        Self {
            base: ExecutorBase::new("http"),
            adapter,
        }
    }
}

#[async_trait]
impl Executor for HttpExecutor {
    fn type_name(&self) -> &str {
        self.base.type_name()
    }

    async fn init(&self, config: &HashMap<String, Value>) -> Result<(), RuntimeError> {
        self.base.store_config(config.clone());
        Ok(())
    }

    async fn execute(&self, step: &Step, ctx: &ExecutionContext) -> Result<StepResult, RuntimeError> {
        let start = Utc::now();

        if step.disabled {
            return Ok(StepResult::skipped(&step.id, start));
        }

        let eval_ctx = ctx.to_evaluation_context();

        let url_raw = match self
            .base
            .resolve(&step.config, "url")
            .and_then(|v| v.as_str().map(str::to_string))
        {
            Some(url) => url,
            None => {
                let err = RuntimeError::config("http step is missing url").with_step_id(step.id.clone());
                return Ok(StepResult::failed(&step.id, start, StepOutput::None, err.to_string()));
            }
        };
        let url = VariableResolver::resolve_string(&url_raw, &eval_ctx);

        let method = self
            .base
            .resolve(&step.config, "method")
            .and_then(|v| v.as_str().map(str::to_uppercase))
            .unwrap_or_else(|| "GET".to_string());

        let mut headers = HashMap::new();
        if let Some(Value::Object(raw_headers)) = self.base.resolve(&step.config, "headers") {
            for (key, value) in raw_headers {
                if let Some(s) = value.as_str() {
                    headers.insert(key, VariableResolver::resolve_string(s, &eval_ctx));
                }
            }
        }

        let body = self
            .base
            .resolve(&step.config, "body")
            .map(|raw| VariableResolver::resolve_json(&raw, &eval_ctx));

        let request = HttpRequest { method, url, headers, body };

        Ok(match self.adapter.send(request).await {
            Ok(response) => StepResult::success(&step.id, start, StepOutput::Http(response)),
            Err(err) => StepResult::failed(&step.id, start, StepOutput::None, err.to_string()),
        })
    }
}
