use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const KEY_PREFIX: &str = "miladyos:";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Running,
    Complete,
    Failed,
    Unknown,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Running => "running",
            ExecutionStatus::Complete => "complete",
            ExecutionStatus::Failed => "failed",
            ExecutionStatus::Unknown => "unknown",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "running" => Some(ExecutionStatus::Running),
            "complete" => Some(ExecutionStatus::Complete),
            "failed" => Some(ExecutionStatus::Failed),
            "unknown" => Some(ExecutionStatus::Unknown),
            _ => None,
        }
    }

    pub const ALL: [ExecutionStatus; 4] = [
        ExecutionStatus::Running,
        ExecutionStatus::Complete,
        ExecutionStatus::Failed,
        ExecutionStatus::Unknown,
    ];
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateRecord {
    pub name: String,
    pub description: String,
    pub template_path: String,
    pub created_at: String,
    pub updated_at: String,
    pub version: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateSummary {
    pub name: String,
    pub description: String,
    pub version: u64,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentRecord {
    pub id: String,
    pub template_name: String,
    pub template_version: u64,
    pub jenkins_job_name: String,
    pub server_name: String,
    pub deployed_at: String,
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub id: String,
    pub deployment_id: String,
    pub template_name: String,
    pub jenkins_job_name: String,
    pub server_name: String,
    pub build_number: String,
    pub parameters: HashMap<String, serde_json::Value>,
    pub started_at: String,
    pub status: String,
    pub result: String,
    pub duration: Option<u64>,
    pub finished_at: String,
    pub console_stored: bool,
}

impl ExecutionRecord {
    pub fn to_hash_fields(&self) -> Vec<(String, String)> {
        vec![
            ("id".into(), self.id.clone()),
            ("deployment_id".into(), self.deployment_id.clone()),
            ("template_name".into(), self.template_name.clone()),
            ("jenkins_job_name".into(), self.jenkins_job_name.clone()),
            ("server_name".into(), self.server_name.clone()),
            ("build_number".into(), self.build_number.clone()),
            (
                "parameters".into(),
                serde_json::to_string(&self.parameters).unwrap_or_else(|_| "{}".into()),
            ),
            ("started_at".into(), self.started_at.clone()),
            ("status".into(), self.status.clone()),
            ("result".into(), self.result.clone()),
            (
                "duration".into(),
                self.duration.map(|d| d.to_string()).unwrap_or_default(),
            ),
            ("finished_at".into(), self.finished_at.clone()),
            (
                "console_stored".into(),
                self.console_stored.to_string(),
            ),
        ]
    }

    pub fn from_hash_fields(fields: &HashMap<String, String>) -> Option<Self> {
        let id = fields.get("id")?.clone();
        let parameters = fields
            .get("parameters")
            .and_then(|s| serde_json::from_str(s).ok())
            .unwrap_or_default();
        Some(ExecutionRecord {
            id,
            deployment_id: fields.get("deployment_id").cloned().unwrap_or_default(),
            template_name: fields.get("template_name").cloned().unwrap_or_default(),
            jenkins_job_name: fields.get("jenkins_job_name").cloned().unwrap_or_default(),
            server_name: fields.get("server_name").cloned().unwrap_or_default(),
            build_number: fields.get("build_number").cloned().unwrap_or_default(),
            parameters,
            started_at: fields.get("started_at").cloned().unwrap_or_default(),
            status: fields
                .get("status")
                .cloned()
                .unwrap_or_else(|| "unknown".into()),
            result: fields.get("result").cloned().unwrap_or_default(),
            duration: fields
                .get("duration")
                .and_then(|s| if s.is_empty() { None } else { s.parse().ok() }),
            finished_at: fields.get("finished_at").cloned().unwrap_or_default(),
            console_stored: fields
                .get("console_stored")
                .map(|s| s == "true")
                .unwrap_or(false),
        })
    }
}

pub mod keys {
    use super::KEY_PREFIX;

    pub fn template(name: &str) -> String {
        format!("{KEY_PREFIX}template:{name}")
    }

    pub fn templates_catalog() -> String {
        format!("{KEY_PREFIX}templates")
    }

    pub fn template_deployments(name: &str) -> String {
        format!("{KEY_PREFIX}template_deployments:{name}")
    }

    pub fn deployment(id: &str) -> String {
        format!("{KEY_PREFIX}deployment:{id}")
    }

    pub fn job_index(server: &str, job: &str) -> String {
        format!("{KEY_PREFIX}job_index:{server}:{job}")
    }

    pub fn execution(id: &str) -> String {
        format!("{KEY_PREFIX}execution:{id}")
    }

    pub fn executions_catalog() -> String {
        format!("{KEY_PREFIX}executions")
    }

    pub fn template_executions(name: &str) -> String {
        format!("{KEY_PREFIX}template_executions:{name}")
    }

    pub fn job_executions(server: &str, job: &str) -> String {
        format!("{KEY_PREFIX}job_executions:{server}:{job}")
    }

    pub fn status_set(status: &str) -> String {
        format!("{KEY_PREFIX}status:{status}")
    }

    pub fn console(id: &str) -> String {
        format!("{KEY_PREFIX}console:{id}")
    }
}
