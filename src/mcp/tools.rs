//! Tool registry for MCP tools.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{json, Value};

use crate::error::RequestError;
use crate::models::{CitationStyle, FormatType, MatchResult, Verdict};
use crate::validator::{verdict, ReferenceValidator};

/// An MCP tool that can be called by the client
#[derive(Clone)]
pub struct Tool {
    /// Tool name (e.g., "validate_references")
    pub name: String,

    /// Human-readable description
    pub description: String,

    /// JSON Schema for input parameters
    pub input_schema: serde_json::Value,

    /// Handler function to execute the tool
    pub handler: Arc<dyn ToolHandler>,
}

impl std::fmt::Debug for Tool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tool")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("input_schema", &self.input_schema)
            .finish()
    }
}

/// Handler for executing a tool
#[async_trait::async_trait]
pub trait ToolHandler: Send + Sync + std::fmt::Debug {
    /// Execute the tool with the given arguments
    async fn execute(&self, args: Value) -> Result<Value, String>;
}

/// Registry for all MCP tools
#[derive(Debug, Clone)]
pub struct ToolRegistry {
    tools: HashMap<String, Tool>,
}

impl ToolRegistry {
    /// Create a registry with both reference tools bound to `validator`
    pub fn new(validator: Arc<ReferenceValidator>) -> Self {
        let mut registry = Self {
            tools: HashMap::new(),
        };

        registry.register(Tool {
            name: "validate_references".to_string(),
            description: "Validates a batch of references using the CrossRef API".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "references": {
                        "type": "array",
                        "items": {"type": "string"},
                        "description": "List of reference strings to validate"
                    },
                    "style": style_schema(),
                    "format_type": format_schema()
                },
                "required": ["references"]
            }),
            handler: Arc::new(ValidateReferencesHandler {
                validator: validator.clone(),
            }),
        });

        registry.register(Tool {
            name: "format_reference".to_string(),
            description: "Formats a single reference using CrossRef data".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "reference": {
                        "type": "string",
                        "description": "Reference string or title to format"
                    },
                    "doi": {
                        "type": "string",
                        "description": "Optional DOI to use directly"
                    },
                    "style": style_schema(),
                    "format_type": format_schema()
                },
                "required": []
            }),
            handler: Arc::new(FormatReferenceHandler { validator }),
        });

        registry
    }

    /// Register a tool
    pub fn register(&mut self, tool: Tool) {
        self.tools.insert(tool.name.clone(), tool);
    }

    /// Get all tools, sorted by name
    pub fn all(&self) -> Vec<&Tool> {
        let mut tools: Vec<&Tool> = self.tools.values().collect();
        tools.sort_by(|a, b| a.name.cmp(&b.name));
        tools
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<&Tool> {
        self.tools.get(name)
    }

    /// Execute a tool by name
    pub async fn execute(&self, name: &str, args: Value) -> Result<Value, String> {
        let tool = self
            .get(name)
            .ok_or_else(|| format!("Tool '{}' not found", name))?;

        tool.handler.execute(args).await
    }
}

fn style_schema() -> Value {
    json!({
        "type": "string",
        "enum": ["apa", "harvard"],
        "default": CitationStyle::default().id(),
        "description": "Citation style"
    })
}

fn format_schema() -> Value {
    json!({
        "type": "string",
        "enum": ["markdown", "text"],
        "default": FormatType::default().id(),
        "description": "Output format"
    })
}

/// Optional string argument; present but non-string values are rejected
fn optional_str<'a>(args: &'a Value, key: &str) -> Result<Option<&'a str>, String> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.as_str())),
        Some(_) => Err(format!("'{}' must be a string", key)),
    }
}

/// Handler for `validate_references`
#[derive(Debug)]
pub struct ValidateReferencesHandler {
    pub validator: Arc<ReferenceValidator>,
}

#[async_trait::async_trait]
impl ToolHandler for ValidateReferencesHandler {
    async fn execute(&self, args: Value) -> Result<Value, String> {
        let references = args
            .get("references")
            .and_then(|v| v.as_array())
            .ok_or("Missing 'references' parameter")?
            .iter()
            .map(|v| v.as_str().map(str::to_string))
            .collect::<Option<Vec<String>>>()
            .ok_or("'references' must be an array of strings")?;

        let style = optional_str(&args, "style")?.unwrap_or(CitationStyle::default().id());
        let format_type = optional_str(&args, "format_type")?.unwrap_or(FormatType::default().id());

        let report = self
            .validator
            .validate_references(&references, style, format_type)
            .await
            .map_err(|e| e.to_string())?;

        serde_json::to_value(&report).map_err(|e| format!("Failed to serialize results: {}", e))
    }
}

/// Handler for `format_reference`
#[derive(Debug)]
pub struct FormatReferenceHandler {
    pub validator: Arc<ReferenceValidator>,
}

#[async_trait::async_trait]
impl ToolHandler for FormatReferenceHandler {
    async fn execute(&self, args: Value) -> Result<Value, String> {
        let reference = optional_str(&args, "reference")?;
        let doi = optional_str(&args, "doi")?;
        let style = optional_str(&args, "style")?.unwrap_or(CitationStyle::default().id());
        let format_type = optional_str(&args, "format_type")?.unwrap_or(FormatType::default().id());

        match self
            .validator
            .format_reference(reference, doi, style, format_type)
            .await
        {
            Ok(matched) => {
                let mut value = serde_json::to_value(&matched).map_err(|e| e.to_string())?;
                value["status"] = json!("matched");
                Ok(value)
            }
            // Ambiguity and no-match are verdicts for the caller, not failures
            Err(RequestError::Ambiguous(candidates)) => {
                let style: CitationStyle = style.parse().map_err(|e: RequestError| e.to_string())?;
                let format: FormatType = format_type.parse().map_err(|e: RequestError| e.to_string())?;
                let candidates = match verdict(MatchResult::Ambiguous { candidates }, style, format) {
                    Verdict::Ambiguous(candidates) => candidates,
                    _ => Vec::new(),
                };
                Ok(json!({ "status": "ambiguous", "candidates": candidates }))
            }
            Err(RequestError::NoMatch(input)) => Ok(json!({
                "status": "not_found",
                "original": input,
                "message": "Failed to find a match."
            })),
            Err(err) => Err(err.to_string()),
        }
    }
}
