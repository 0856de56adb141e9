//! Knowledge base MCP server implementation

use anyhow::Result;
use rmcp::{
    handler::server::{tool::ToolRouter, wrapper::Parameters},
    model::{CallToolResult, Content, ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler, ServiceExt,
};
use schemars::JsonSchema;
use serde::Deserialize;

use shelfsense::search::engine::require_store;
use shelfsense::search::storage::KnowledgeDb;
use shelfsense::{Config, KnowledgeBase};

/// Upper bound on results per call.
const MAX_TOP_K: usize = 50;

/// Parameters for kb_context and kb_search
#[derive(Debug, Deserialize, JsonSchema)]
pub struct QueryParams {
    /// Customer question (e.g., "¿Tienen novelas de Cortázar?")
    #[schemars(description = "Natural language question")]
    pub query: String,
    /// Number of items to return (default: configured top_k)
    #[schemars(description = "Number of items to return (default: 3)")]
    #[serde(default)]
    pub top_k: Option<usize>,
}

/// Knowledge base MCP service
#[derive(Clone)]
pub struct KnowledgeService {
    config: Config,
    tool_router: ToolRouter<Self>,
}

impl KnowledgeService {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            tool_router: Self::tool_router(),
        }
    }

    fn top_k(&self, requested: Option<usize>) -> usize {
        requested.unwrap_or(self.config.top_k).min(MAX_TOP_K)
    }

    /// Run `f` against the opened knowledge base off the async runtime.
    ///
    /// The embedding client blocks, so it must not run on a runtime thread.
    async fn with_kb<T, F>(&self, f: F) -> Result<T, McpError>
    where
        T: Send + 'static,
        F: FnOnce(&KnowledgeBase) -> shelfsense::Result<T> + Send + 'static,
    {
        let config = self.config.clone();
        tokio::task::spawn_blocking(move || {
            let kb = KnowledgeBase::open_existing(&config)?;
            f(&kb)
        })
        .await
        .map_err(|e| McpError::internal_error(format!("Worker failed: {}", e), None))?
        .map_err(|e| McpError::internal_error(e.to_string(), None))
    }
}

#[tool_router]
impl KnowledgeService {
    /// Context string for a language model prompt
    #[tool(description = "Find the catalog entries and past conversations most similar to a question and return their text joined by '---' lines, ready to use as prompt context.")]
    async fn kb_context(
        &self,
        params: Parameters<QueryParams>,
    ) -> Result<CallToolResult, McpError> {
        let top_k = self.top_k(params.0.top_k);
        let query = params.0.query;
        let context = self
            .with_kb(move |kb| kb.answer_context(&query, top_k))
            .await?;

        Ok(CallToolResult::success(vec![Content::text(context)]))
    }

    /// Ranked search with scores and metadata
    #[tool(description = "Semantic search over the knowledge base. Returns ranked items with similarity score, content and metadata as JSON.")]
    async fn kb_search(
        &self,
        params: Parameters<QueryParams>,
    ) -> Result<CallToolResult, McpError> {
        let top_k = self.top_k(params.0.top_k);
        let query = params.0.query;
        let results = self.with_kb(move |kb| kb.search(&query, top_k)).await?;

        let output = serde_json::to_string_pretty(&results).map_err(|e| {
            McpError::internal_error(format!("JSON serialization failed: {}", e), None)
        })?;

        Ok(CallToolResult::success(vec![Content::text(output)]))
    }

    /// Store statistics
    #[tool(description = "Knowledge base statistics: item count, embedded and degraded items, embedding model.")]
    async fn kb_status(&self) -> Result<CallToolResult, McpError> {
        let config = self.config.clone();
        let stats = tokio::task::spawn_blocking(move || {
            require_store(&config)?;
            KnowledgeDb::open(&config.store_path)?.stats()
        })
            .await
            .map_err(|e| McpError::internal_error(format!("Worker failed: {}", e), None))?
            .map_err(|e| McpError::internal_error(e.to_string(), None))?;

        let output = serde_json::to_string_pretty(&stats).map_err(|e| {
            McpError::internal_error(format!("JSON serialization failed: {}", e), None)
        })?;

        Ok(CallToolResult::success(vec![Content::text(output)]))
    }
}

#[tool_handler]
impl ServerHandler for KnowledgeService {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Bookshop knowledge base. Use kb_context to get prompt context for a customer question, kb_search for scored results.".to_string()
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

/// Run the MCP server
pub async fn run_mcp_server(config: Config) -> Result<()> {
    use tokio::io::{stdin, stdout};

    tracing::info!(store = %config.store_path.display(), "starting MCP server");
    let service = KnowledgeService::new(config);
    let transport = (stdin(), stdout());
    let server = service.serve(transport).await?;
    server.waiting().await?;

    Ok(())
}
