//! Remote tool-call (MCP) value objects.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A tool advertised by a remote MCP server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}
