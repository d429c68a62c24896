mod init;

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use mermaider_core::export::{self, ExportFormat};
use mermaider_core::templates::reference_syntax;
use mermaider_core::{syntax, AiSettings, DiagramCategory, DiagramRequest, SessionHistory};
use mermaider_suggest::{prompt, SharedPipeline};
use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{CallToolResult, Content, ServerCapabilities, ServerInfo},
    schemars, tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler, ServiceExt,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "MERMAIDER_LOG";

// --- Request types ---

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct CategoryRequest {
    /// Diagram type, e.g. "flowchart", "sequenceDiagram", "erDiagram". See list_categories.
    category: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct TextRequest {
    /// Plain-language description of what to visualize
    text: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct GenerateRequest {
    /// Plain-language description of what to visualize
    text: String,
    /// Diagram type to generate. Omit to use the top-ranked suggestion.
    category: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct CodeRequest {
    /// Mermaid markup
    code: String,
    /// Diagram type the markup is meant to be
    category: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct ExportRequest {
    /// Mermaid markup to export
    code: String,
    /// Title used for the file name and the HTML heading. Defaults to "diagram".
    title: Option<String>,
    /// "mmd" (raw markup, default) or "html" (self-rendering page)
    format: Option<ExportFormat>,
    /// Directory to write the file into. Omit to get the file contents back instead.
    path: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ValidationReport<'a> {
    category: DiagramCategory,
    valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    issue: Option<syntax::SyntaxIssue>,
    message: String,
    expected_header: &'a str,
}

#[derive(Clone)]
pub struct MermaiderServer {
    tool_router: ToolRouter<Self>,
    pipeline: Arc<SharedPipeline>,
    history: Arc<Mutex<SessionHistory>>,
}

#[tool_router]
impl MermaiderServer {
    pub fn new(settings: &AiSettings) -> Self {
        Self::with_pipeline(SharedPipeline::from_settings(settings))
    }

    fn with_pipeline(pipeline: SharedPipeline) -> Self {
        Self {
            tool_router: Self::tool_router(),
            pipeline: Arc::new(pipeline),
            history: Arc::new(Mutex::new(SessionHistory::new())),
        }
    }

    fn history(&self) -> MutexGuard<'_, SessionHistory> {
        self.history.lock().unwrap_or_else(|e| e.into_inner())
    }

    #[tool(description = "List the supported Mermaid diagram types and what each is best for")]
    fn list_categories(&self) -> Result<CallToolResult, McpError> {
        Ok(CallToolResult::success(vec![Content::text(format_categories())]))
    }

    #[tool(
        description = "Get the authoring rules and a minimal correct example for one diagram type. Read this before writing markup by hand."
    )]
    fn get_syntax(
        &self,
        Parameters(req): Parameters<CategoryRequest>,
    ) -> Result<CallToolResult, McpError> {
        let category = parse_category(&req.category)?;
        let text = format!(
            "## {} ({})\n\n### Rules\n{}\n\n### Example\n{}",
            category.title(),
            category.label(),
            prompt::syntax_rules(category),
            reference_syntax(category)
        );
        Ok(CallToolResult::success(vec![Content::text(text)]))
    }

    #[tool(
        description = "Analyze a description: primary intent, domain, complexity, entities, relationships and which aspects (temporal, hierarchical, data, process, system) it involves. Returns {analysis, step}."
    )]
    async fn analyze_intent(
        &self,
        Parameters(req): Parameters<TextRequest>,
    ) -> Result<CallToolResult, McpError> {
        let text = require_text(&req.text)?;
        let stepped = self.pipeline.analyze(text).await;
        Ok(json_result(&serde_json::json!({
            "analysis": stepped.value,
            "step": stepped.report,
        })))
    }

    #[tool(
        description = "Rank the diagram types that fit a description. Runs the analysis first. Returns {analysis, suggestions: [{category, title, rationale, useCase, complexity?, confidence?}], steps}."
    )]
    async fn suggest_diagrams(
        &self,
        Parameters(req): Parameters<TextRequest>,
    ) -> Result<CallToolResult, McpError> {
        let text = require_text(&req.text)?;
        let analysis = self.pipeline.analyze(text).await;
        let suggestions = self.pipeline.suggest(&analysis.value).await;
        Ok(json_result(&serde_json::json!({
            "analysis": analysis.value,
            "suggestions": suggestions.value,
            "steps": [analysis.report, suggestions.report],
        })))
    }

    #[tool(
        description = "Turn a description into a Mermaid diagram: analyze, suggest, generate, recommend. Always returns a diagram; steps the model could not serve use fixed fallbacks (see `steps`). Check `diagram.validation.valid` before rendering and use repair_diagram if it is false. The run is added to the session history."
    )]
    async fn generate_diagram(
        &self,
        Parameters(req): Parameters<GenerateRequest>,
    ) -> Result<CallToolResult, McpError> {
        let text = require_text(&req.text)?;
        let mut request = DiagramRequest::new(text);
        if let Some(category) = req.category.as_deref().filter(|c| !c.trim().is_empty()) {
            request = request.with_category(parse_category(category)?);
        }

        let run = self.pipeline.run(&request).await;
        let entry_count = {
            let mut history = self.history();
            history.record(
                &run.request,
                &run.diagram,
                run.analysis.primary_intent.as_deref(),
                run.suggestions.len(),
            );
            history.len()
        };
        info!(entries = entry_count, "history updated");
        Ok(json_result(&run))
    }

    #[tool(
        description = "Check Mermaid markup for the given diagram type: declaration line, doubled braces, bracket balance, quote pairing. Does not modify the markup."
    )]
    fn validate_diagram(
        &self,
        Parameters(req): Parameters<CodeRequest>,
    ) -> Result<CallToolResult, McpError> {
        let category = parse_category(&req.category)?;
        let status = syntax::validate(&req.code, category);
        Ok(json_result(&ValidationReport {
            category,
            valid: status.valid,
            issue: status.issue,
            message: status.describe(category),
            expected_header: syntax::expected_header(category),
        }))
    }

    #[tool(
        description = "Repair Mermaid markup. Applies local fixes first (line endings, doubled braces, header, flowchart arrows); only if the result is still invalid asks the model once for a fix. Returns {code, status, initial, method: unchanged|local|model|unresolved, detail?}."
    )]
    async fn repair_diagram(
        &self,
        Parameters(req): Parameters<CodeRequest>,
    ) -> Result<CallToolResult, McpError> {
        let category = parse_category(&req.category)?;
        let report = self.pipeline.repair_with_model(&req.code, category).await;
        Ok(json_result(&report))
    }

    #[tool(
        description = "Export markup as a .mmd file or as a standalone .html page that renders it with Mermaid from the jsDelivr CDN. With `path`, writes the file into that directory; otherwise returns the file contents."
    )]
    fn export_diagram(
        &self,
        Parameters(req): Parameters<ExportRequest>,
    ) -> Result<CallToolResult, McpError> {
        if req.code.trim().is_empty() {
            return Err(McpError::invalid_params("code must not be empty", None));
        }
        let title = req
            .title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or("diagram");
        let file = export::export(&req.code, title, req.format.unwrap_or(ExportFormat::Mmd));

        match req.path {
            Some(dir) => match export::write_export(&PathBuf::from(&dir), &file) {
                Ok(path) => {
                    info!(path = %path.display(), "diagram exported");
                    Ok(CallToolResult::success(vec![Content::text(format!(
                        "Wrote {} ({})",
                        path.display(),
                        file.mime_type
                    ))]))
                }
                Err(e) => Ok(CallToolResult::error(vec![Content::text(format!(
                    "Failed to write export into '{}': {}",
                    dir, e
                ))])),
            },
            None => Ok(json_result(&file)),
        }
    }

    #[tool(description = "List the diagrams generated in this session, oldest first")]
    fn get_history(&self) -> Result<CallToolResult, McpError> {
        let history = self.history();
        if history.is_empty() {
            return Ok(CallToolResult::success(vec![Content::text(
                "No diagrams generated yet. Use generate_diagram to create one.",
            )]));
        }
        Ok(json_result(&history.entries()))
    }

    #[tool(
        description = "Get six starter ideas (title, description, example input, diagram type) for users who do not know what to draw"
    )]
    async fn diagram_ideas(&self) -> Result<CallToolResult, McpError> {
        let ideas = self.pipeline.diagram_ideas().await;
        Ok(json_result(&serde_json::json!({
            "ideas": ideas.value,
            "step": ideas.report,
        })))
    }
}

#[tool_handler]
impl ServerHandler for MermaiderServer {
    fn get_info(&self) -> ServerInfo {
        let instructions = format!(
            "{}\n\n## Mermaid Rules\n{}",
            INSTRUCTIONS,
            mermaider_core::rules::RULES
        );
        ServerInfo {
            instructions: Some(instructions.into()),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

// --- Helpers ---

fn json_result<T: Serialize + ?Sized>(value: &T) -> CallToolResult {
    let json = serde_json::to_string_pretty(value)
        .unwrap_or_else(|e| format!("Serialization error: {}", e));
    CallToolResult::success(vec![Content::text(json)])
}

fn parse_category(s: &str) -> Result<DiagramCategory, McpError> {
    DiagramCategory::from_label(s).ok_or_else(|| {
        let valid: Vec<&str> = DiagramCategory::ALL.iter().map(|c| c.label()).collect();
        McpError::invalid_params(
            format!("Invalid category '{}'. Must be one of: {}", s, valid.join(", ")),
            None,
        )
    })
}

fn require_text(text: &str) -> Result<&str, McpError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(McpError::invalid_params("text must not be empty", None));
    }
    Ok(text)
}

fn format_categories() -> String {
    DiagramCategory::ALL
        .iter()
        .map(|c| format!("{} ({}): {}", c.label(), c.title(), c.best_for()))
        .collect::<Vec<_>>()
        .join("\n")
}

const INSTRUCTIONS: &str = r#"mermaider turns plain-language descriptions into Mermaid diagrams.

Typical flow:
1. `generate_diagram` with the user's description. Pass `category` when the user already knows the diagram type; otherwise the best-ranked suggestion is used.
2. Read `diagram.validation`. If it is not valid, call `repair_diagram` with the code and category.
3. Offer `recommendations` as follow-ups, and `export_diagram` when the user wants a file.

`suggest_diagrams` and `analyze_intent` run the first pipeline steps only, for when the user wants to choose before generating. `diagram_ideas` helps users who have nothing in mind yet.

When writing or editing markup yourself, call `get_syntax` for the diagram type and check the result with `validate_diagram`. Every step that calls the model has a fixed fallback, so results are always returned; `steps[].outcome == "fallback"` means the model was unavailable or its answer unusable."#;

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
    // stdout carries the protocol
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .try_init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Handle `mermaider-mcp init` subcommand
    if std::env::args().nth(1).as_deref() == Some("init") {
        return init::init_project();
    }

    init_tracing();

    let resolved = mermaider_core::settings::resolve_settings();
    for problem in &resolved.warnings {
        warn!(%problem, "config file skipped");
    }
    let settings = resolved.settings;
    if mermaider_core::settings::ai_configured(&settings) {
        info!(provider = %settings.provider, model = %settings.model, "LLM configured");
    } else {
        warn!(
            provider = %settings.provider,
            "no API key found; model calls will fail and every step will use its fallback"
        );
    }

    let service = MermaiderServer::new(&settings)
        .serve(rmcp::transport::io::stdio())
        .await
        .inspect_err(|e| tracing::error!(error = %e, "MCP server error"))?;
    service.waiting().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use mermaider_suggest::{ChatBackend, SuggestError};
    use std::collections::VecDeque;
    use std::time::Duration;

    fn server() -> MermaiderServer {
        MermaiderServer::new(&AiSettings::default())
    }

    #[test]
    fn category_parsing_is_lenient_and_errors_list_choices() {
        assert_eq!(parse_category("ER").unwrap(), DiagramCategory::EntityRelationship);
        assert_eq!(parse_category("sequenceDiagram").unwrap(), DiagramCategory::Sequence);
        let err = parse_category("sankey").unwrap_err();
        assert!(err.message.contains("gitgraph"));
    }

    #[test]
    fn category_listing_covers_all_types() {
        let text = format_categories();
        assert_eq!(text.lines().count(), DiagramCategory::ALL.len());
        assert!(text.contains("erDiagram (ER Diagram)"));
    }

    #[test]
    fn blank_text_is_rejected() {
        assert!(require_text("  \n").is_err());
        assert_eq!(require_text("  orders ").unwrap(), "orders");
    }

    #[test]
    fn validate_and_export_do_not_error() {
        let s = server();
        let result = s
            .validate_diagram(Parameters(CodeRequest {
                code: "graph TD\n    A{{x}} --> B".into(),
                category: "flowchart".into(),
            }))
            .unwrap();
        assert_ne!(result.is_error, Some(true));

        let dir = tempfile::tempdir().unwrap();
        let result = s
            .export_diagram(Parameters(ExportRequest {
                code: "pie\n    \"A\" : 1".into(),
                title: Some("Share".into()),
                format: Some(ExportFormat::Html),
                path: Some(dir.path().to_string_lossy().to_string()),
            }))
            .unwrap();
        assert_ne!(result.is_error, Some(true));
        assert!(dir.path().join("Share.html").exists());
    }

    #[test]
    fn export_rejects_empty_code() {
        let result = server().export_diagram(Parameters(ExportRequest {
            code: " ".into(),
            title: None,
            format: None,
            path: None,
        }));
        assert!(result.is_err());
    }

    /// Answers each model call with the next queued reply.
    struct QueuedBackend(Mutex<VecDeque<&'static str>>);

    #[async_trait]
    impl ChatBackend for QueuedBackend {
        async fn complete(&self, _system: &str, _user_msg: &str) -> Result<String, SuggestError> {
            self.0
                .lock()
                .unwrap()
                .pop_front()
                .map(str::to_string)
                .ok_or_else(|| SuggestError::Chat("no reply queued".to_string()))
        }
    }

    fn scripted_server(replies: Vec<&'static str>) -> MermaiderServer {
        let backend: Arc<dyn ChatBackend> = Arc::new(QueuedBackend(Mutex::new(replies.into())));
        MermaiderServer::with_pipeline(SharedPipeline::new(backend, Duration::from_secs(5)))
    }

    fn result_json(result: &CallToolResult) -> serde_json::Value {
        let text = &result.content[0].raw.as_text().unwrap().text;
        serde_json::from_str(text).unwrap()
    }

    const INTENT: &str = r#"{"primary_intent": "order handling", "process_flow": true}"#;
    const SUGGESTIONS: &str = r#"[{"type": "flowchart", "title": "Order flow"}]"#;
    const RECS: &str = r#"["Add an ER diagram for orders"]"#;

    #[tokio::test]
    async fn generated_diagrams_are_kept_in_history_oldest_first() {
        let s = scripted_server(vec![
            INTENT,
            SUGGESTIONS,
            "```mermaid\nflowchart TD\n    A[Order] --> B[Ship]\n```",
            RECS,
            INTENT,
            SUGGESTIONS,
            "pie title \"Share\n    \"Web\" : 3",
            RECS,
        ]);

        let empty = s.get_history().unwrap();
        assert!(says_history_is_empty(&empty));

        let first = s
            .generate_diagram(Parameters(GenerateRequest {
                text: "order handling".into(),
                category: None,
            }))
            .await
            .unwrap();
        assert_eq!(result_json(&first)["diagram"]["category"], "flowchart");

        s.generate_diagram(Parameters(GenerateRequest {
            text: "channel share".into(),
            category: Some("pie".into()),
        }))
        .await
        .unwrap();

        let history = result_json(&s.get_history().unwrap());
        let entries = history.as_array().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0]["category"], "flowchart");
        assert_eq!(entries[0]["valid"], true);
        assert_eq!(entries[0]["request"]["text"], "order handling");
        assert_eq!(entries[0]["primaryIntent"], "order handling");
        assert_eq!(entries[1]["category"], "pie");
        assert_eq!(entries[1]["valid"], false);
        assert_eq!(entries[1]["request"]["text"], "channel share");
    }

    fn says_history_is_empty(result: &CallToolResult) -> bool {
        let text = &result.content[0].raw.as_text().unwrap().text;
        text.starts_with("No diagrams generated yet")
    }

    #[tokio::test]
    async fn history_is_shared_between_clones() {
        let s = scripted_server(vec![]);
        let clone = s.clone();
        clone
            .generate_diagram(Parameters(GenerateRequest {
                text: "anything".into(),
                category: Some("flowchart".into()),
            }))
            .await
            .unwrap();
        assert_eq!(s.history().len(), 1);
        let entry = s.history().latest().cloned().unwrap();
        assert_eq!(entry.category, DiagramCategory::Flowchart);
        assert!(entry.valid);
    }
}
