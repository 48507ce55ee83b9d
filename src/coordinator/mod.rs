//! Pipeline Coordinator.
//!
//! Composes the Jenkins Client and Metadata Store Adapter into the
//! user-facing actions (`deploy`, `run`, `execute_command`). Every public
//! entry point returns a structured JSON record and never propagates a
//! panic to its caller; failures are logged and converted into an error
//! record carrying enough context (template/job/server name) to diagnose.
//!
//! Follows the canonical Jenkins deploy sequence: connect, check for an
//! existing job, delete it if present, recreate it from the template,
//! record the deployment, then (for `run`) trigger a build and stream
//! its console output back.

use std::collections::HashMap;

use serde_json::{Value, json};
use tracing::{error, warn};

use crate::config::Config;
use crate::error::OrchestratorError;
use crate::jenkins;
use crate::registry::TemplateRegistry;
use crate::store::MetadataStore;
use crate::types::ExecutionStatus;
use crate::utils::short_id;

pub struct Coordinator<'a> {
    pub store: &'a MetadataStore,
    pub registry: &'a TemplateRegistry,
    pub config: &'a Config,
}

impl<'a> Coordinator<'a> {
    pub fn new(store: &'a MetadataStore, registry: &'a TemplateRegistry, config: &'a Config) -> Self {
        Self {
            store,
            registry,
            config,
        }
    }

    async fn connect(
        &self,
        server_name: &str,
        username: Option<&str>,
        password: Option<&str>,
    ) -> Result<jenkins::JenkinsHandle, Value> {
        let Some(url) = self.config.server_url(server_name) else {
            return Err(error_record(
                "connect",
                server_name,
                "",
                &format!("unknown jenkins server '{server_name}'"),
            ));
        };
        let username = username.unwrap_or(&self.config.jenkins_credentials.username);
        let password = password.unwrap_or(&self.config.jenkins_credentials.password);

        jenkins::connect(server_name, &url, username, password)
            .await
            .map_err(|e| error_record("connect", server_name, "", &e.to_string()))
    }

    /// `deploy(template_name, job_name?, server_name="default", creds?)`
    pub async fn deploy(
        &self,
        template_name: &str,
        job_name: Option<String>,
        server_name: &str,
        username: Option<&str>,
        password: Option<&str>,
    ) -> Value {
        let job_name = job_name.unwrap_or_else(|| template_name.to_string());

        if !self.registry.jenkinsfile_exists(template_name) {
            return error_record(
                "deploy",
                server_name,
                &job_name,
                &OrchestratorError::TemplateNotFound(template_name.to_string()).to_string(),
            );
        }

        let handle = match self.connect(server_name, username, password).await {
            Ok(h) => h,
            Err(e) => return e,
        };

        let jenkinsfile_text = match self.registry.read_jenkinsfile(template_name) {
            Ok(t) => t,
            Err(e) => return error_record("read_jenkinsfile", server_name, &job_name, &e.to_string()),
        };

        if let Err(e) = handle.delete_job_if_exists(&job_name).await {
            warn!("delete_job_if_exists failed during deploy: {e}");
        }
        if let Err(e) = handle.create_job(&job_name, &jenkinsfile_text).await {
            return error_record("create_job", server_name, &job_name, &e.to_string());
        }

        let deployment = match self
            .store
            .deploy_pipeline(template_name, &job_name, server_name)
            .await
        {
            Ok(d) => d,
            Err(e) => {
                error!("failed to record deployment: {e}");
                return error_record("deploy_pipeline", server_name, &job_name, &e.to_string());
            }
        };

        json!({
            "success": true,
            "status": "deployed",
            "deployment_id": deployment.id,
            "template_name": template_name,
            "job_name": job_name,
            "server_name": server_name,
        })
    }

    /// `run(template_name?, job_name?, server_name="default", parameters?, stream=true, jenkinsfile_text?)`
    #[allow(clippy::too_many_arguments)]
    pub async fn run(
        &self,
        template_name: Option<String>,
        job_name: Option<String>,
        server_name: &str,
        parameters: HashMap<String, Value>,
        stream: bool,
        jenkinsfile_text: Option<String>,
        username: Option<&str>,
        password: Option<&str>,
    ) -> Value {
        if template_name.is_none() && jenkinsfile_text.is_none() {
            return error_record(
                "run",
                server_name,
                "",
                &OrchestratorError::InputMissing(
                    "one of template_name or jenkinsfile_content is required".to_string(),
                )
                .to_string(),
            );
        }

        let direct = jenkinsfile_text.is_some();
        let (job_name, effective_template_name, jenkinsfile_text) = if let Some(text) = jenkinsfile_text
        {
            let job = job_name.unwrap_or_else(|| format!("direct-pipeline-{}", short_id()));
            let label = format!("direct-{job}");
            (job, label, text)
        } else {
            let template_name = template_name.expect("checked above");
            let job = job_name.unwrap_or_else(|| template_name.clone());
            let text = match self.registry.read_jenkinsfile(&template_name) {
                Ok(t) => t,
                Err(e) => {
                    return error_record("read_jenkinsfile", server_name, &job, &e.to_string());
                }
            };
            (job, template_name, text)
        };

        let handle = match self.connect(server_name, username, password).await {
            Ok(h) => h,
            Err(e) => return e,
        };

        let job_exists = handle.job_exists(&job_name).await.unwrap_or(false);
        if direct || !job_exists {
            if let Err(e) = handle.delete_job_if_exists(&job_name).await {
                warn!("delete_job_if_exists failed during run: {e}");
            }
            if let Err(e) = handle.create_job(&job_name, &jenkinsfile_text).await {
                return error_record("create_job", server_name, &job_name, &e.to_string());
            }
        }

        let deployment_id = self
            .store
            .resolve_deployment_id(server_name, &job_name)
            .await
            .ok()
            .flatten()
            .unwrap_or_default();

        let outcome = match handle.start_job(&job_name).await {
            Ok(o) => o,
            Err(e) => return error_record("start_job", server_name, &job_name, &e.to_string()),
        };

        let Some(build_number) = outcome.build_number else {
            let execution = match self
                .store
                .record_execution(
                    Some(deployment_id),
                    Some(effective_template_name.clone()),
                    Some(job_name.clone()),
                    Some(server_name.to_string()),
                    None,
                    parameters,
                )
                .await
            {
                Ok(e) => e,
                Err(e) => return error_record("record_execution", server_name, &job_name, &e.to_string()),
            };
            return json!({
                "success": true,
                "status": "queued",
                "execution_id": execution.id,
                "queue_number": outcome.queue_number,
                "job_name": job_name,
                "server_name": server_name,
            });
        };

        let execution = match self
            .store
            .record_execution(
                Some(deployment_id),
                Some(effective_template_name.clone()),
                Some(job_name.clone()),
                Some(server_name.to_string()),
                Some(build_number.to_string()),
                parameters,
            )
            .await
        {
            Ok(e) => e,
            Err(e) => {
                // Recovery path: synthesize an id and continue.
                warn!("record_execution failed, synthesizing recovery record: {e}");
                let id = crate::utils::generate_uuid();
                crate::types::ExecutionRecord {
                    id,
                    deployment_id: String::new(),
                    template_name: effective_template_name.clone(),
                    jenkins_job_name: job_name.clone(),
                    server_name: server_name.to_string(),
                    build_number: build_number.to_string(),
                    parameters: HashMap::new(),
                    started_at: crate::utils::iso_date(),
                    status: ExecutionStatus::Running.as_str().to_string(),
                    result: String::new(),
                    duration: None,
                    finished_at: String::new(),
                    console_stored: false,
                }
            }
        };

        if !stream {
            return json!({
                "success": true,
                "status": "running",
                "execution_id": execution.id,
                "build_number": build_number,
                "job_name": job_name,
                "server_name": server_name,
            });
        }

        let stream_outcome = match handle.stream_console(&job_name, build_number).await {
            Ok(o) => o,
            Err(e) => return error_record("stream_console", server_name, &job_name, &e.to_string()),
        };

        let terminal_status = if stream_outcome.status == "SUCCESS" {
            ExecutionStatus::Complete
        } else if stream_outcome.complete {
            ExecutionStatus::Failed
        } else {
            ExecutionStatus::Unknown
        };

        let duration = handle
            .build_duration_ms(&job_name, build_number)
            .await
            .ok()
            .flatten();

        let metadata_updated = self
            .store
            .update_execution_status(
                &execution.id,
                terminal_status,
                Some(stream_outcome.status.clone()),
                Some(stream_outcome.console_output.clone()),
                duration,
            )
            .await
            .is_ok();

        json!({
            "success": true,
            "status": stream_outcome.status,
            "complete": stream_outcome.complete,
            "execution_id": execution.id,
            "build_number": build_number,
            "job_name": job_name,
            "server_name": server_name,
            "console_output": stream_outcome.console_output,
            "metadata_updated": metadata_updated,
        })
    }

    /// `execute_command(command, working_dir="/workspace", session_id?, server_name="default")`
    pub async fn execute_command(
        &self,
        command: &str,
        working_dir: &str,
        session_id: Option<String>,
        server_name: &str,
        username: Option<&str>,
        password: Option<&str>,
    ) -> Value {
        let session_id = session_id.unwrap_or_else(crate::utils::generate_uuid);
        let job_name = format!("cmd-{}", short_id());
        let jenkinsfile_text = execute_command_jenkinsfile(command, working_dir, &session_id);

        let result = self
            .run(
                None,
                Some(job_name.clone()),
                server_name,
                HashMap::new(),
                true,
                Some(jenkinsfile_text),
                username,
                password,
            )
            .await;

        if let Ok(handle) = self.connect(server_name, username, password).await {
            if let Err(e) = handle.delete_job_if_exists(&job_name).await {
                warn!("failed to clean up command job {job_name}: {e}");
            }
        }

        result
    }

    /// `get_pipeline_status(execution_id) → ExecutionRecord`
    pub async fn get_pipeline_status(&self, execution_id: &str) -> Value {
        let record = match self.store.get_execution(execution_id).await {
            Ok(record) => record,
            Err(e) => return error_record("get_execution", "", "", &e.to_string()),
        };
        let console_output = match self.store.get_console_output(execution_id).await {
            Ok(console) => console.unwrap_or_default(),
            Err(e) => {
                warn!("failed to fetch console output for {execution_id}: {e}");
                String::new()
            }
        };
        json!({
            "success": true,
            "execution": record,
            "console_output": console_output,
        })
    }

    /// `list_pipeline_runs(template_name?, limit=10, status?)`
    pub async fn list_pipeline_runs(
        &self,
        template_name: Option<&str>,
        limit: usize,
        status: Option<ExecutionStatus>,
    ) -> Value {
        match self.store.list_executions(template_name, limit, status).await {
            Ok(records) => json!({
                "success": true,
                "executions": records,
            }),
            Err(e) => error_record("list_executions", "", "", &e.to_string()),
        }
    }
}

/// The embedded Jenkinsfile for `execute_command`: the command is
/// substituted as a single-quoted shell literal, never concatenated into
/// the pipeline script body, resolving the shell-escaping open question.
fn execute_command_jenkinsfile(command: &str, working_dir: &str, session_id: &str) -> String {
    let escaped = shell_single_quote(command);
    format!(
        "// Description: ad-hoc command execution (session {session_id})\npipeline {{\n    agent any\n    stages {{\n        stage('Execute') {{\n            steps {{\n                dir('{working_dir}') {{\n                    sh {escaped}\n                }}\n            }}\n        }}\n    }}\n}}\n"
    )
}

/// Single-quote a string for POSIX shell, doubling embedded single quotes
/// via the standard `'\''` escape sequence.
fn shell_single_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

fn error_record(operation: &str, server_name: &str, job_name: &str, error: &str) -> Value {
    json!({
        "success": false,
        "status": "error",
        "error": error,
        "operation": operation,
        "server_name": server_name,
        "job_name": job_name,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shell_single_quote_escapes_embedded_quotes() {
        assert_eq!(shell_single_quote("echo hi"), "'echo hi'");
        assert_eq!(shell_single_quote("it's"), r"'it'\''s'");
    }

    #[test]
    fn test_execute_command_jenkinsfile_embeds_escaped_command() {
        let jf = execute_command_jenkinsfile("echo 'hi'", "/workspace", "sess-1");
        assert!(jf.contains("sh 'echo '\\''hi'\\'''"));
        assert!(jf.contains("dir('/workspace')"));
    }

    #[test]
    fn test_error_record_shape() {
        let rec = error_record("connect", "default", "job1", "boom");
        assert_eq!(rec["success"], false);
        assert_eq!(rec["status"], "error");
        assert_eq!(rec["error"], "boom");
    }
}
