//! Tool extension system.
//!
//! Every operation an agent can call is a [`Tool`]: a name, a description,
//! an OpenAI function-calling parameter schema, and an async `execute`.
//! Tools are collected in a [`ToolRegistry`] and dispatched by the CLI
//! (`nh tools call`) and the HTTP server (`POST /tools/{name}`).
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                ToolRegistry                  │
//! │  create_note      update_daily_note          │
//! │  find_related_notes  search_notes            │
//! │  read_note        list_notes   (+ custom)    │
//! └──────────────────────┬───────────────────────┘
//!                        ▼
//!            CLI  /  POST /tools/{name}
//! ```
//!
//! # Example
//!
//! ```rust
//! use async_trait::async_trait;
//! use anyhow::Result;
//! use serde_json::{json, Value};
//! use note_harness::traits::{Tool, ToolContext, ToolRegistry};
//!
//! pub struct CountNotes;
//!
//! #[async_trait]
//! impl Tool for CountNotes {
//!     fn name(&self) -> &str { "count_notes" }
//!     fn description(&self) -> &str { "Count notes in the vault" }
//!     fn parameters_schema(&self) -> Value {
//!         json!({ "type": "object", "properties": {} })
//!     }
//!     async fn execute(&self, _params: Value, ctx: &ToolContext) -> Result<Value> {
//!         Ok(json!({ "count": ctx.vault().list_notes().await?.len() }))
//!     }
//! }
//!
//! let mut tools = ToolRegistry::with_builtins();
//! tools.register(Box::new(CountNotes));
//! assert!(tools.find("count_notes").is_some());
//! ```

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::num::NonZeroUsize;
use std::sync::Arc;

use crate::config::Config;
use crate::notes;
use crate::related::RelatedNoteFinder;
use crate::search::{self, DEFAULT_LIMIT};
use crate::structure::{create_structurer, Structurer};
use crate::vault::Vault;

// ═══════════════════════════════════════════════════════════════════════
// Tool Trait
// ═══════════════════════════════════════════════════════════════════════

/// A named operation that agents can discover and call.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Lowercase identifier with underscores (e.g. `"create_note"`).
    fn name(&self) -> &str;

    /// One-line description for agent discovery.
    fn description(&self) -> &str;

    /// Whether this tool ships with Note Harness. Defaults to `false`.
    fn is_builtin(&self) -> bool {
        false
    }

    /// JSON Schema for the parameters: `type: "object"`, `properties`,
    /// and optionally `required`.
    fn parameters_schema(&self) -> Value;

    /// Execute the tool with parameters already checked by [`validate_params`].
    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value>;
}

/// Serializable tool descriptor for listings.
#[derive(Debug, Clone, Serialize)]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
    pub builtin: bool,
    pub parameters: Value,
}

impl ToolInfo {
    pub fn from_tool(tool: &dyn Tool) -> Self {
        Self {
            name: tool.name().to_string(),
            description: tool.description().to_string(),
            builtin: tool.is_builtin(),
            parameters: tool.parameters_schema(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// ToolContext
// ═══════════════════════════════════════════════════════════════════════

/// Access to the vault and configured collaborators during tool execution.
pub struct ToolContext {
    config: Arc<Config>,
}

impl ToolContext {
    pub fn new(config: Arc<Config>) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn vault(&self) -> Vault {
        Vault::from_config(&self.config)
    }

    pub fn structurer(&self) -> Result<Box<dyn Structurer>> {
        create_structurer(&self.config.structuring)
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Built-in Tools
// ═══════════════════════════════════════════════════════════════════════

/// Deserialize validated tool parameters into a typed struct.
fn parse_params<T: DeserializeOwned>(params: Value) -> Result<T> {
    serde_json::from_value(params).map_err(|e| anyhow::anyhow!("invalid parameters: {}", e))
}

fn non_blank<'a>(value: &'a str, key: &str) -> Result<&'a str> {
    if value.trim().is_empty() {
        bail!("{} must not be empty", key);
    }
    Ok(value)
}

fn non_blank_opt(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.trim().is_empty())
}

#[derive(Deserialize)]
struct CreateNoteParams {
    content: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    overwrite: bool,
}

#[derive(Deserialize)]
struct UpdateDailyNoteParams {
    content: String,
    #[serde(default)]
    date: Option<String>,
}

#[derive(Deserialize)]
struct FindRelatedParams {
    content: String,
    #[serde(default)]
    exclude_title: String,
    #[serde(default)]
    limit: Option<NonZeroUsize>,
}

#[derive(Deserialize)]
struct SearchParams {
    query: String,
    #[serde(default = "default_search_mode")]
    mode: String,
    #[serde(default)]
    limit: Option<NonZeroUsize>,
}

fn default_search_mode() -> String {
    "keyword".to_string()
}

#[derive(Deserialize)]
struct ReadNoteParams {
    title: String,
}

/// Structure content and write it as a new note linked to related notes.
pub struct CreateNoteTool;

#[async_trait]
impl Tool for CreateNoteTool {
    fn name(&self) -> &str {
        "create_note"
    }

    fn description(&self) -> &str {
        "Create a note in the vault, linking it to related notes"
    }

    fn is_builtin(&self) -> bool {
        true
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "content": { "type": "string", "description": "Raw note content" },
                "title": { "type": "string", "description": "Note title; derived from the content when omitted" },
                "overwrite": { "type": "boolean", "description": "Replace an existing note with the same title", "default": false }
            },
            "required": ["content"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value> {
        let p: CreateNoteParams = parse_params(params)?;
        let content = non_blank(&p.content, "content")?;

        let structurer = ctx.structurer()?;
        let created = notes::create_note(
            ctx.config(),
            structurer.as_ref(),
            content,
            non_blank_opt(&p.title),
            p.overwrite,
        )
        .await?;
        Ok(serde_json::to_value(created)?)
    }
}

/// Append content to today's (or a given day's) daily note.
pub struct UpdateDailyNoteTool;

#[async_trait]
impl Tool for UpdateDailyNoteTool {
    fn name(&self) -> &str {
        "update_daily_note"
    }

    fn description(&self) -> &str {
        "Append content to the daily note, creating it if needed"
    }

    fn is_builtin(&self) -> bool {
        true
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "content": { "type": "string", "description": "Content to append" },
                "date": { "type": "string", "description": "Day to update (YYYY-MM-DD); defaults to today" }
            },
            "required": ["content"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value> {
        let p: UpdateDailyNoteParams = parse_params(params)?;
        let content = non_blank(&p.content, "content")?;
        let date = match non_blank_opt(&p.date) {
            Some(d) => Some(
                NaiveDate::parse_from_str(d, "%Y-%m-%d")
                    .map_err(|_| anyhow::anyhow!("invalid date: {} (expected YYYY-MM-DD)", d))?,
            ),
            None => None,
        };

        let structurer = ctx.structurer()?;
        let updated =
            notes::update_daily_note(ctx.config(), structurer.as_ref(), content, date).await?;
        Ok(serde_json::to_value(updated)?)
    }
}

/// Titles of notes whose text contains the given content.
pub struct FindRelatedNotesTool;

#[async_trait]
impl Tool for FindRelatedNotesTool {
    fn name(&self) -> &str {
        "find_related_notes"
    }

    fn description(&self) -> &str {
        "Find existing notes related to a piece of content"
    }

    fn is_builtin(&self) -> bool {
        true
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "content": { "type": "string", "description": "Content to find relations for" },
                "exclude_title": { "type": "string", "description": "Title never reported as related" },
                "limit": { "type": "integer", "description": "Maximum titles; defaults to related.match_cap" }
            },
            "required": ["content"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value> {
        let p: FindRelatedParams = parse_params(params)?;
        let content = non_blank(&p.content, "content")?;

        let mut finder = RelatedNoteFinder::from_config(ctx.config())?;
        if let Some(limit) = p.limit {
            finder = finder.with_cap(limit.get());
        }
        let related = finder.find_related(content, &p.exclude_title).await?;
        Ok(serde_json::json!({ "related": related }))
    }
}

pub struct SearchNotesTool;

#[async_trait]
impl Tool for SearchNotesTool {
    fn name(&self) -> &str {
        "search_notes"
    }

    fn description(&self) -> &str {
        "Search notes by keyword overlap or embedding similarity"
    }

    fn is_builtin(&self) -> bool {
        true
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "Search query" },
                "mode": { "type": "string", "enum": ["keyword", "semantic"], "default": "keyword" },
                "limit": { "type": "integer", "description": "Max results", "default": DEFAULT_LIMIT }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value> {
        let p: SearchParams = parse_params(params)?;
        let query = non_blank(&p.query, "query")?;
        let limit = p.limit.map(NonZeroUsize::get);

        let results = search::search_notes(ctx.config(), query, &p.mode, limit).await?;
        Ok(serde_json::json!({ "results": results }))
    }
}

pub struct ReadNoteTool;

#[async_trait]
impl Tool for ReadNoteTool {
    fn name(&self) -> &str {
        "read_note"
    }

    fn description(&self) -> &str {
        "Read a note by title"
    }

    fn is_builtin(&self) -> bool {
        true
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "title": { "type": "string", "description": "Note title (file name without extension)" }
            },
            "required": ["title"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value> {
        let p: ReadNoteParams = parse_params(params)?;
        let title = non_blank(&p.title, "title")?;
        let note = ctx.vault().read_note(title).await?;
        Ok(serde_json::to_value(note)?)
    }
}

pub struct ListNotesTool;

#[async_trait]
impl Tool for ListNotesTool {
    fn name(&self) -> &str {
        "list_notes"
    }

    fn description(&self) -> &str {
        "List all notes in the vault"
    }

    fn is_builtin(&self) -> bool {
        true
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {}
        })
    }

    async fn execute(&self, _params: Value, ctx: &ToolContext) -> Result<Value> {
        let notes = ctx.vault().list_notes().await?;
        Ok(serde_json::json!({ "notes": notes }))
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Registry
// ═══════════════════════════════════════════════════════════════════════

pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    /// A registry pre-loaded with every built-in tool.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(CreateNoteTool));
        registry.register(Box::new(UpdateDailyNoteTool));
        registry.register(Box::new(FindRelatedNotesTool));
        registry.register(Box::new(SearchNotesTool));
        registry.register(Box::new(ReadNoteTool));
        registry.register(Box::new(ListNotesTool));
        registry
    }

    /// Register a tool. Lookups return the first tool registered under a name.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        self.tools.push(tool);
    }

    pub fn tools(&self) -> &[Box<dyn Tool>] {
        &self.tools
    }

    pub fn find(&self, name: &str) -> Option<&dyn Tool> {
        self.tools
            .iter()
            .find(|t| t.name() == name)
            .map(|t| t.as_ref())
    }

    pub fn infos(&self) -> Vec<ToolInfo> {
        self.tools
            .iter()
            .map(|t| ToolInfo::from_tool(t.as_ref()))
            .collect()
    }

    /// Validate `params` against the tool's schema and execute it.
    pub async fn call(&self, name: &str, params: Value, ctx: &ToolContext) -> Result<Value> {
        let tool = self
            .find(name)
            .ok_or_else(|| anyhow::anyhow!("no tool registered with name: {}", name))?;
        let params = validate_params(&tool.parameters_schema(), params)?;
        tool.execute(params, ctx).await
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Parameter validation
// ═══════════════════════════════════════════════════════════════════════

/// Check `params` against a tool's JSON Schema: required keys present,
/// declared types and enums respected. Missing optional keys with a
/// `default` are filled in. Unknown keys pass through untouched.
pub fn validate_params(schema: &Value, params: Value) -> Result<Value> {
    let mut params = match params {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        other => bail!(
            "invalid parameters: expected an object, got {}",
            json_type_name(&other)
        ),
    };

    let required = schema["required"].as_array().map(Vec::as_slice).unwrap_or(&[]);
    if let Some(missing) = required
        .iter()
        .filter_map(Value::as_str)
        .find(|key| !params.contains_key(*key))
    {
        bail!("missing required parameter: {}", missing);
    }

    let Some(properties) = schema["properties"].as_object() else {
        return Ok(Value::Object(params));
    };
    for (name, prop) in properties {
        match params.get(name) {
            Some(value) => check_property(name, prop, value)?,
            None => {
                if let Some(default) = prop.get("default") {
                    params.insert(name.clone(), default.clone());
                }
            }
        }
    }

    Ok(Value::Object(params))
}

fn check_property(name: &str, prop: &Value, value: &Value) -> Result<()> {
    if let Some(expected) = prop["type"].as_str() {
        let matches = match expected {
            "string" => value.is_string(),
            "integer" => value.is_i64() || value.is_u64(),
            "number" => value.is_number(),
            "boolean" => value.is_boolean(),
            "array" => value.is_array(),
            "object" => value.is_object(),
            _ => true,
        };
        if !matches {
            bail!(
                "invalid parameter '{}': must be of type '{}', got {}",
                name,
                expected,
                json_type_name(value)
            );
        }
    }

    if let Some(allowed) = prop["enum"].as_array() {
        if !allowed.contains(value) {
            let allowed: Vec<String> = allowed.iter().map(Value::to_string).collect();
            bail!(
                "invalid parameter '{}': must be one of [{}], got {}",
                name,
                allowed.join(", "),
                value
            );
        }
    }
    Ok(())
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_builtins_registered() {
        let registry = ToolRegistry::with_builtins();
        let names: Vec<&str> = registry.tools().iter().map(|t| t.name()).collect();
        assert_eq!(
            names,
            vec![
                "create_note",
                "update_daily_note",
                "find_related_notes",
                "search_notes",
                "read_note",
                "list_notes"
            ]
        );
        assert!(registry.infos().iter().all(|i| i.builtin));
    }

    #[test]
    fn test_validate_missing_required() {
        let schema = SearchNotesTool.parameters_schema();
        let err = validate_params(&schema, json!({})).unwrap_err();
        assert_eq!(err.to_string(), "missing required parameter: query");
    }

    #[test]
    fn test_validate_fills_defaults() {
        let schema = SearchNotesTool.parameters_schema();
        let params = validate_params(&schema, json!({ "query": "rust" })).unwrap();
        assert_eq!(params["mode"], "keyword");
        assert_eq!(params["limit"], DEFAULT_LIMIT);
    }

    #[test]
    fn test_validate_type_and_enum() {
        let schema = SearchNotesTool.parameters_schema();
        let err = validate_params(&schema, json!({ "query": 3 })).unwrap_err();
        assert!(err.to_string().contains("must be of type 'string'"));

        let err =
            validate_params(&schema, json!({ "query": "x", "mode": "fuzzy" })).unwrap_err();
        assert!(err.to_string().contains("must be one of"));
    }

    #[test]
    fn test_validate_non_object() {
        let schema = ListNotesTool.parameters_schema();
        assert!(validate_params(&schema, json!([1, 2])).is_err());
        assert!(validate_params(&schema, Value::Null).is_ok());
    }

    #[test]
    fn test_limit_must_be_positive() {
        let p: FindRelatedParams = parse_params(json!({ "content": "x" })).unwrap();
        assert!(p.limit.is_none());
        assert!(p.exclude_title.is_empty());

        let p: FindRelatedParams = parse_params(json!({ "content": "x", "limit": 3 })).unwrap();
        assert_eq!(p.limit.map(NonZeroUsize::get), Some(3));

        for bad in [json!(0), json!(-2)] {
            let err = parse_params::<FindRelatedParams>(json!({ "content": "x", "limit": bad }))
                .err()
                .unwrap();
            assert!(err.to_string().starts_with("invalid parameters"));
        }
    }

    #[test]
    fn test_blank_title_is_treated_as_absent() {
        let p: CreateNoteParams = parse_params(json!({ "content": "x", "title": "  " })).unwrap();
        assert_eq!(non_blank_opt(&p.title), None);
        assert!(!p.overwrite);
        assert!(non_blank("   ", "content").is_err());
    }
}
