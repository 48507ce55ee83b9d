//! Tool Server: speaks the MCP line-delimited-JSON protocol on standard
//! streams.
//!
//! # Architecture
//!
//! - `mod.rs` - server setup and initialization
//! - `tools.rs` - tool implementations (the nine tools in the catalog)
//!
//! # Usage
//!
//! ```bash
//! railyard mcp              # Start MCP server (STDIO transport)
//! railyard mcp --version    # Show MCP protocol version
//! ```

pub mod tools;

use std::sync::Arc;

use rmcp::{
    RoleServer, ServerHandler, ServiceExt,
    handler::server::tool::ToolCallContext,
    model::{
        CallToolRequestParam, CallToolResult, ErrorData, ListToolsResult, PaginatedRequestParam,
        ServerCapabilities, ServerInfo,
    },
    service::RequestContext,
    transport::stdio,
};

use crate::context::AppContext;
use crate::error::{OrchestratorError, Result};
use tools::OrchestratorTools;

pub const MCP_PROTOCOL_VERSION: &str = "2024-11-05";
pub const SERVER_NAME: &str = "railyard";
pub const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

impl ServerHandler for OrchestratorTools {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Pipeline orchestration service: register, deploy, and run Jenkins-backed \
                 CI/CD pipeline templates.\n\nAvailable tools:\n\
                  - hello_world: confirm the server is reachable\n\
                  - list_templates: list registered templates\n\
                  - create_template: generate and register a new Jenkinsfile template\n\
                  - edit_template: edit a template, optionally previewing a diff\n\
                  - deploy_pipeline: deploy a template as a Jenkins job\n\
                  - run_pipeline: run a pipeline, optionally streaming console output\n\
                  - get_pipeline_status: look up a recorded execution\n\
                  - list_pipeline_runs: list recorded executions with filters\n\
                  - execute_command: run an ad-hoc shell command through Jenkins"
                    .to_string(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: rmcp::model::Implementation {
                name: SERVER_NAME.to_string(),
                version: SERVER_VERSION.to_string(),
                title: None,
                description: None,
                icons: None,
                website_url: None,
            },
            ..Default::default()
        }
    }

    async fn list_tools(
        &self,
        _pagination: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> std::result::Result<ListToolsResult, ErrorData> {
        let items = self.router().list_all();
        Ok(ListToolsResult::with_all_items(items))
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParam,
        context: RequestContext<RoleServer>,
    ) -> std::result::Result<CallToolResult, ErrorData> {
        let tcc = ToolCallContext::new(self, request, context);
        self.router().call(tcc).await
    }
}

/// Start the MCP server with STDIO transport. Blocks until the server is
/// shut down (SIGINT/SIGTERM or client disconnect).
pub async fn cmd_mcp() -> Result<()> {
    // Log startup to stderr; stdout is the MCP transport.
    eprintln!("Starting railyard MCP server...");

    let context = Arc::new(AppContext::init().await?);
    let server = OrchestratorTools::new(context);

    let service = server
        .serve(stdio())
        .await
        .map_err(|e| OrchestratorError::JenkinsApiError(format!("failed to start MCP server: {e}")))?;

    service
        .waiting()
        .await
        .map_err(|e| OrchestratorError::JenkinsApiError(format!("MCP server error: {e}")))?;

    Ok(())
}

pub fn cmd_mcp_version() {
    println!("MCP Protocol Version: {MCP_PROTOCOL_VERSION}");
    println!("railyard MCP Server: {SERVER_NAME} v{SERVER_VERSION}");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_tools() -> OrchestratorTools {
        use crate::context::AppContext;
        use crate::registry::TemplateRegistry;
        use std::path::PathBuf;

        let tmp = tempfile::tempdir().expect("tempdir");
        let config = crate::config::Config {
            templates_dir: tmp.path().join("templates").to_string_lossy().into_owned(),
            metadata_dir: tmp.path().join("metadata").to_string_lossy().into_owned(),
            ..crate::config::Config::default()
        };
        std::fs::create_dir_all(&config.templates_dir).expect("templates dir");
        std::fs::create_dir_all(&config.metadata_dir).expect("metadata dir");

        // get_or_init_store only parses the URL and defers the actual
        // connection until a store method is called, so this never
        // touches the network — exactly what these get_info/list_tools
        // tests need, since they never reach `self.context.store`.
        let store = crate::store::get_or_init_store(&config.redis_url(), PathBuf::from(&config.metadata_dir))
            .expect("store handle");
        let registry = TemplateRegistry::new(PathBuf::from(&config.templates_dir));
        let context = Arc::new(AppContext {
            config,
            registry,
            store,
        });
        // Leak the tempdir so it outlives the store's lazily-established
        // connection attempts during this test run.
        std::mem::forget(tmp);
        OrchestratorTools::new(context)
    }

    #[test]
    fn test_mcp_version_constants() {
        assert_eq!(MCP_PROTOCOL_VERSION, "2024-11-05");
        assert_eq!(SERVER_NAME, "railyard");
        assert!(!SERVER_VERSION.is_empty());
    }

    #[tokio::test]
    async fn test_server_info() {
        let server = test_tools();
        let info = server.get_info();
        assert!(info.instructions.is_some());
        assert_eq!(info.server_info.name, SERVER_NAME);
        assert_eq!(info.server_info.version, SERVER_VERSION);
    }

    #[tokio::test]
    async fn test_tools_router_has_nine_tools() {
        let server = test_tools();
        let tools = server.router().list_all();
        assert_eq!(tools.len(), 9);
        let names: Vec<&str> = tools.iter().map(|t| t.name.as_ref()).collect();
        for expected in [
            "hello_world",
            "list_templates",
            "create_template",
            "edit_template",
            "deploy_pipeline",
            "run_pipeline",
            "get_pipeline_status",
            "list_pipeline_runs",
            "execute_command",
        ] {
            assert!(names.contains(&expected), "missing tool {expected}");
        }
    }

    #[tokio::test]
    async fn test_server_capabilities_include_tools() {
        let server = test_tools();
        let info = server.get_info();
        assert!(info.capabilities.tools.is_some());
    }
}
