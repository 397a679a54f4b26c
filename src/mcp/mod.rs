//! MCP server and the reference validation tools it exposes.

pub mod server;
mod tools;

pub use server::McpServer;
pub use tools::{FormatReferenceHandler, Tool, ToolHandler, ToolRegistry, ValidateReferencesHandler};
