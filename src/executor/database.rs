//! Database executor: an external interface boundary (spec §6). The
//! in-memory adapter here is a test approximation, not a production driver —
//! its transaction bookkeeping is a set of open IDs, not a real WAL.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;

use crate::context::ExecutionContext;
use crate::error::RuntimeError;
use crate::expression::VariableResolver;
use crate::types::{DbResult, Step, StepOutput, StepResult};

use super::base::ExecutorBase;
use super::Executor;

/// The operation a database step performs, per spec §4.6/§6.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbAction {
    Query,
    Execute,
    Count,
    Exists,
    Begin,
    Commit,
    Rollback,
}

impl DbAction {
    fn parse(raw: Option<&str>) -> Result<Self, String> {
        match raw {
            None | Some("query") => Ok(Self::Query),
            Some("execute") => Ok(Self::Execute),
            Some("count") => Ok(Self::Count),
            Some("exists") => Ok(Self::Exists),
            Some("begin") => Ok(Self::Begin),
            Some("commit") => Ok(Self::Commit),
            Some("rollback") => Ok(Self::Rollback),
            Some(other) => Err(other.to_string()),
        }
    }
}

/// A fully resolved database request, ready to hand to an adapter.
#[derive(Debug, Clone)]
pub struct DbRequest {
    pub action: DbAction,
    pub query: String,
    pub params: Vec<Value>,
    pub tx_id: Option<String>,
}

#[async_trait]
pub trait DatabaseAdapter: Send + Sync {
    async fn connect(&self) -> Result<(), RuntimeError> {
        Ok(())
    }

    #[must_use]
    async fn is_connected(&self) -> bool {
        true
    }

    async fn run(&self, request: DbRequest) -> Result<DbResult, RuntimeError>;

    async fn close(&self) -> Result<(), RuntimeError> {
        Ok(())
    }
}

/// Canned-response adapter for tests: `query` strings are looked up
/// verbatim against a seeded table rather than parsed or executed.
/// Transactions are tracked only as a set of open IDs — commit/rollback on
/// an unknown ID is reported as an error result, per the WHERE-parser
/// limitation this is explicitly not meant to hide (spec §9).
#[derive(Default)]
pub struct InMemoryDatabaseAdapter {
    seeded: RwLock<HashMap<String, Vec<Value>>>,
    open_transactions: RwLock<std::collections::HashSet<String>>,
    next_tx_id: AtomicU64,
}

impl InMemoryDatabaseAdapter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, query: impl Into<String>, rows: Vec<Value>) {
        self.seeded.write().expect("seed lock poisoned").insert(query.into(), rows);
    }
}

#[async_trait]
impl DatabaseAdapter for InMemoryDatabaseAdapter {
    async fn run(&self, request: DbRequest) -> Result<DbResult, RuntimeError> {
        match request.action {
            DbAction::Begin => {
                let tx_id = format!("tx-{}", self.next_tx_id.fetch_add(1, Ordering::SeqCst));
                self.open_transactions.write().expect("tx lock poisoned").insert(tx_id.clone());
                Ok(DbResult { success: true, tx_id: Some(tx_id), ..DbResult::default() })
            }
            DbAction::Commit | DbAction::Rollback => {
                let tx_id = request.tx_id.unwrap_or_default();
                let removed = self.open_transactions.write().expect("tx lock poisoned").remove(&tx_id);
                if removed {
                    Ok(DbResult { success: true, tx_id: Some(tx_id), ..DbResult::default() })
                } else {
                    Ok(DbResult {
                        success: false,
                        error: Some(format!("no open transaction: {tx_id}")),
                        ..DbResult::default()
                    })
                }
            }
            DbAction::Exists => {
                let rows = self.seeded.read().expect("seed lock poisoned").get(&request.query).cloned();
                Ok(DbResult { success: true, exists: Some(rows.is_some_and(|r| !r.is_empty())), ..DbResult::default() })
            }
            DbAction::Execute => {
                let rows = self
                    .seeded
                    .read()
                    .expect("seed lock poisoned")
                    .get(&request.query)
                    .cloned()
                    .unwrap_or_default();
                Ok(DbResult { success: true, rows_affected: Some(rows.len() as u64), ..DbResult::default() })
            }
            DbAction::Query | DbAction::Count => {
                let rows = self
                    .seeded
                    .read()
                    .expect("seed lock poisoned")
                    .get(&request.query)
                    .cloned()
                    .unwrap_or_default();
                Ok(DbResult {
                    success: true,
                    count: Some(rows.len() as u64),
                    data: if request.action == DbAction::Query { rows } else { Vec::new() },
                    ..DbResult::default()
                })
            }
        }
    }
}

pub struct DatabaseExecutor {
    base: ExecutorBase,
    adapter: Box<dyn DatabaseAdapter>,
}

impl DatabaseExecutor {
    #[must_use]
    pub fn new(adapter: Box<dyn DatabaseAdapter>) -> Self {
        Self {
            base: ExecutorBase::new("database"),
            adapter,
        }
    }
}

#[async_trait]
impl Executor for DatabaseExecutor {
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
        let action = match DbAction::parse(operation_raw.as_deref()) {
            Ok(action) => action,
            Err(unknown) => {
                let err = RuntimeError::config(format!("unsupported database operation: {unknown}"))
                    .with_step_id(step.id.clone());
                return Ok(StepResult::failed(&step.id, start, StepOutput::None, err.to_string()));
            }
        };

        let request = match action {
            DbAction::Begin => DbRequest { action, query: String::new(), params: Vec::new(), tx_id: None },
            DbAction::Commit | DbAction::Rollback => {
                let tx_id_raw = match self.base.resolve(&step.config, "tx_id").and_then(|v| v.as_str().map(str::to_string)) {
                    Some(tx_id) => tx_id,
                    None => {
                        let err = RuntimeError::config("database step is missing tx_id").with_step_id(step.id.clone());
                        return Ok(StepResult::failed(&step.id, start, StepOutput::None, err.to_string()));
                    }
                };
                let tx_id = VariableResolver::resolve_string(&tx_id_raw, &eval_ctx);
                DbRequest { action, query: String::new(), params: Vec::new(), tx_id: Some(tx_id) }
            }
            DbAction::Query | DbAction::Execute | DbAction::Count | DbAction::Exists => {
                let query_raw = match self.base.resolve(&step.config, "query").and_then(|v| v.as_str().map(str::to_string)) {
                    Some(query) => query,
                    None => {
                        let err = RuntimeError::config("database step is missing query").with_step_id(step.id.clone());
                        return Ok(StepResult::failed(&step.id, start, StepOutput::None, err.to_string()));
                    }
                };
                let query = VariableResolver::resolve_string(&query_raw, &eval_ctx);
                let params = match self.base.resolve(&step.config, "params") {
                    Some(Value::Array(items)) => {
                        items.iter().map(|v| VariableResolver::resolve_json(v, &eval_ctx)).collect()
                    }
                    _ => Vec::new(),
                };
                DbRequest { action, query, params, tx_id: None }
            }
        };

        Ok(match self.adapter.run(request).await {
            Ok(db_result) if db_result.success => {
                StepResult::success(&step.id, start, StepOutput::Db(db_result))
            }
            Ok(db_result) => {
                let message = db_result.error.clone().unwrap_or_else(|| "database operation failed".to_string());
                StepResult::failed(&step.id, start, StepOutput::Db(db_result), message)
            }
            Err(err) => StepResult::failed(&step.id, start, StepOutput::None, err.to_string()),
        })
    }

    async fn cleanup(&self) -> Result<(), RuntimeError> {
        self.adapter.close().await
    }
}
