//! Command-line front end.
//!
//! `mcp` starts the Tool Server, the rest are thin one-shot wrappers around
//! the same
//! [`crate::coordinator::Coordinator`] and [`crate::registry::TemplateRegistry`]
//! calls the MCP tools use, so behavior never diverges between the two
//! front ends.

use clap::{Parser, Subcommand};

use crate::context::AppContext;
use crate::coordinator::Coordinator;
use crate::error::Result;
use crate::types::ExecutionStatus;

#[derive(Parser)]
#[command(name = "railyard")]
#[command(about = "Pipeline orchestration service for Jenkins-backed CI/CD")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the MCP server (STDIO transport)
    Mcp {
        /// Show MCP protocol version instead of starting the server
        #[arg(long)]
        version: bool,
    },

    /// Deploy a template to Jenkins
    Deploy {
        /// Name of the registered template
        template_name: String,

        /// Jenkins job name (defaults to template name)
        #[arg(long)]
        job_name: Option<String>,

        /// Jenkins server to use
        #[arg(long, default_value = "default")]
        server: String,
    },

    /// Run a pipeline template on Jenkins
    Run {
        /// Name of the registered template
        template_name: String,

        /// Jenkins job name (defaults to template name)
        #[arg(long)]
        job_name: Option<String>,

        /// Jenkins server to use
        #[arg(long, default_value = "default")]
        server: String,

        /// Don't stream console output
        #[arg(long)]
        no_stream: bool,
    },

    /// List all available templates
    ListTemplates,

    /// List pipeline runs from the metadata system
    ListRuns {
        /// Filter by template name
        #[arg(long)]
        template: Option<String>,

        /// Maximum number of runs to show
        #[arg(long, default_value_t = 10)]
        limit: usize,

        /// Filter by status: running, complete, or failed
        #[arg(long)]
        status: Option<String>,
    },
}

impl Commands {
    /// Execute the command, dispatching to the appropriate handler.
    pub async fn run(self) -> Result<()> {
        match self {
            Commands::Mcp { version } => {
                if version {
                    crate::mcp::cmd_mcp_version();
                    Ok(())
                } else {
                    crate::mcp::cmd_mcp().await
                }
            }
            Commands::Deploy {
                template_name,
                job_name,
                server,
            } => cmd_deploy(&template_name, job_name, &server).await,
            Commands::Run {
                template_name,
                job_name,
                server,
                no_stream,
            } => cmd_run(&template_name, job_name, &server, !no_stream).await,
            Commands::ListTemplates => cmd_list_templates().await,
            Commands::ListRuns {
                template,
                limit,
                status,
            } => cmd_list_runs(template.as_deref(), limit, status.as_deref()).await,
        }
    }
}

async fn cmd_deploy(template_name: &str, job_name: Option<String>, server: &str) -> Result<()> {
    let context = AppContext::init().await?;
    let coordinator = Coordinator::new(context.store, &context.registry, &context.config);
    let job_name_display = job_name.clone().unwrap_or_else(|| template_name.to_string());

    let result = coordinator
        .deploy(template_name, job_name, server, None, None)
        .await;

    if result["success"].as_bool().unwrap_or(false) {
        println!("Successfully deployed template {template_name} as job {job_name_display} on server {server}");
        if let Some(id) = result["deployment_id"].as_str() {
            println!("Deployment ID: {id}");
        }
        Ok(())
    } else {
        let error = result["error"].as_str().unwrap_or("unknown error");
        eprintln!("Error deploying template: {error}");
        std::process::exit(1);
    }
}

async fn cmd_run(template_name: &str, job_name: Option<String>, server: &str, stream: bool) -> Result<()> {
    let context = AppContext::init().await?;
    let coordinator = Coordinator::new(context.store, &context.registry, &context.config);

    let result = coordinator
        .run(
            Some(template_name.to_string()),
            job_name,
            server,
            Default::default(),
            stream,
            None,
            None,
            None,
        )
        .await;

    if !result["success"].as_bool().unwrap_or(false) {
        let error = result["error"].as_str().unwrap_or("unknown error");
        eprintln!("Error running template: {error}");
        std::process::exit(1);
    }

    match result["status"].as_str().unwrap_or("") {
        "queued" => {
            println!(
                "Job {} is queued. Queue number: {}",
                template_name, result["queue_number"]
            );
            Ok(())
        }
        "running" => {
            println!("Started job, build #{}", result["build_number"]);
            if let Some(id) = result["execution_id"].as_str() {
                println!("Execution ID: {id}");
            }
            Ok(())
        }
        _ => {
            println!("Started job, build #{}", result["build_number"]);
            if let Some(id) = result["execution_id"].as_str() {
                println!("Execution ID: {id}");
            }
            println!("Streaming console output...");
            let jenkins_status = result["status"].as_str().unwrap_or("");
            println!("Job completed with status: {jenkins_status}");
            if jenkins_status == "SUCCESS" {
                Ok(())
            } else {
                std::process::exit(1);
            }
        }
    }
}

async fn cmd_list_templates() -> Result<()> {
    let context = AppContext::init().await?;
    let templates = context.registry.list_templates(context.store).await?;

    if templates.is_empty() {
        println!("No templates found");
    } else {
        println!("Found {} templates:", templates.len());
        for t in &templates {
            println!("  - {} (v{}): {}", t.name, t.version, t.description);
        }
    }
    Ok(())
}

async fn cmd_list_runs(template: Option<&str>, limit: usize, status: Option<&str>) -> Result<()> {
    let context = AppContext::init().await?;
    let status = match status {
        Some(s) => match ExecutionStatus::parse(s) {
            Some(status) => Some(status),
            None => {
                eprintln!("Error listing pipeline runs: invalid status '{s}'");
                std::process::exit(1);
            }
        },
        None => None,
    };

    let executions = context.store.list_executions(template, limit, status).await?;

    if executions.is_empty() {
        println!("No pipeline runs found");
    } else {
        println!("Found {} pipeline runs:", executions.len());
        for e in &executions {
            let result_str = if e.result.is_empty() {
                String::new()
            } else {
                format!(" ({})", e.result)
            };
            let build_str = if e.build_number.is_empty() {
                String::new()
            } else {
                format!(" #{}", e.build_number)
            };
            println!(
                "  - {}: {}{}{} - {}",
                e.id, e.template_name, build_str, result_str, e.status
            );
        }
    }
    Ok(())
}
