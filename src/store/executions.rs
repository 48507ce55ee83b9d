//! Execution, status-transition, and console-output operations.
//!
//! Hash writes retry once on failure before propagating an error. Console
//! output is written to Redis with a delete-then-set-then-verify sequence
//! and mirrored to a `console_<id>.txt` file under the metadata directory,
//! so a lookup can recover status and output even if the Redis record was
//! never written or was evicted.

use std::collections::{HashMap, HashSet};

use redis::AsyncCommands;
use tracing::warn;

use crate::error::Result;
use crate::types::{ExecutionRecord, ExecutionStatus, keys};
use crate::utils::{epoch_score, generate_uuid, iso_date};

use super::MetadataStore;

impl MetadataStore {
    /// `record_execution(...) → ExecutionRecord`
    #[allow(clippy::too_many_arguments)]
    pub async fn record_execution(
        &self,
        deployment_id: Option<String>,
        template_name: Option<String>,
        jenkins_job_name: Option<String>,
        server_name: Option<String>,
        build_number: Option<String>,
        parameters: HashMap<String, serde_json::Value>,
    ) -> Result<ExecutionRecord> {
        let mut conn = self.conn().await?;

        let deployment_id = match deployment_id {
            Some(id) if !id.is_empty() => id,
            _ => {
                if let (Some(server), Some(job)) = (&server_name, &jenkins_job_name) {
                    self.resolve_deployment_id(server, job)
                        .await?
                        .unwrap_or_default()
                } else {
                    String::new()
                }
            }
        };

        let id = generate_uuid();
        let now = iso_date();
        let record = ExecutionRecord {
            id: id.clone(),
            deployment_id,
            template_name: template_name.unwrap_or_default(),
            jenkins_job_name: jenkins_job_name.unwrap_or_default(),
            server_name: server_name.unwrap_or_default(),
            build_number: build_number.unwrap_or_default(),
            parameters,
            started_at: now,
            status: ExecutionStatus::Running.as_str().to_string(),
            result: String::new(),
            duration: None,
            finished_at: String::new(),
            console_stored: false,
        };

        let hash_key = keys::execution(&id);
        let fields = record.to_hash_fields();

        let write_result: std::result::Result<(), redis::RedisError> =
            conn.hset_multiple(&hash_key, &fields).await;
        if write_result.is_err() {
            warn!("execution hash write failed for {id}, retrying once");
            conn.hset_multiple::<_, _, _, ()>(&hash_key, &fields).await?;
        }

        if let Err(e) = conn
            .zadd::<_, _, _, ()>(keys::executions_catalog(), &id, epoch_score())
            .await
        {
            warn!("failed to add execution to global index: {e}");
        }
        if !record.template_name.is_empty()
            && let Err(e) = conn
                .zadd::<_, _, _, ()>(keys::template_executions(&record.template_name), &id, epoch_score())
                .await
        {
            warn!("failed to add execution to template index: {e}");
        }
        if !record.server_name.is_empty()
            && !record.jenkins_job_name.is_empty()
            && let Err(e) = conn
                .zadd::<_, _, _, ()>(
                    keys::job_executions(&record.server_name, &record.jenkins_job_name),
                    &id,
                    epoch_score(),
                )
                .await
        {
            warn!("failed to add execution to job index: {e}");
        }
        if let Err(e) = conn
            .sadd::<_, _, ()>(keys::status_set(ExecutionStatus::Running.as_str()), &id)
            .await
        {
            warn!("failed to add execution to running status set: {e}");
        }

        Ok(record)
    }

    /// `update_execution_status(execution_id, status, result?, console_output?, duration?) → ExecutionRecord`
    pub async fn update_execution_status(
        &self,
        execution_id: &str,
        status: ExecutionStatus,
        result: Option<String>,
        console_output: Option<String>,
        duration: Option<u64>,
    ) -> Result<ExecutionRecord> {
        let mut conn = self.conn().await?;
        let hash_key = keys::execution(execution_id);

        let existing: HashMap<String, String> = conn.hgetall(&hash_key).await?;
        let mut record = if existing.is_empty() {
            // Recovery path: synthesize a minimal placeholder.
            ExecutionRecord {
                id: execution_id.to_string(),
                deployment_id: String::new(),
                template_name: String::new(),
                jenkins_job_name: String::new(),
                server_name: String::new(),
                build_number: String::new(),
                parameters: HashMap::new(),
                started_at: iso_date(),
                status: ExecutionStatus::Running.as_str().to_string(),
                result: String::new(),
                duration: None,
                finished_at: String::new(),
                console_stored: false,
            }
        } else {
            ExecutionRecord::from_hash_fields(&existing).unwrap_or_else(|| ExecutionRecord {
                id: execution_id.to_string(),
                deployment_id: String::new(),
                template_name: String::new(),
                jenkins_job_name: String::new(),
                server_name: String::new(),
                build_number: String::new(),
                parameters: HashMap::new(),
                started_at: iso_date(),
                status: ExecutionStatus::Running.as_str().to_string(),
                result: String::new(),
                duration: None,
                finished_at: String::new(),
                console_stored: false,
            })
        };

        let prior_status = record.status.clone();

        if let Some(console) = console_output.filter(|c| !c.is_empty()) {
            let console_key = keys::console(execution_id);
            let _: () = conn.del(&console_key).await?;
            let set_result: std::result::Result<(), redis::RedisError> =
                conn.set(&console_key, &console).await;
            let verified: bool = conn.exists(&console_key).await.unwrap_or(false);
            if set_result.is_err() || !verified {
                warn!("console write failed/unverified for {execution_id}, retrying once");
                conn.set::<_, _, ()>(&console_key, &console).await?;
            }
            record.console_stored = true;

            if let Err(e) = std::fs::write(
                self.metadata_dir()
                    .join(format!("console_{execution_id}.txt")),
                &console,
            ) {
                warn!("failed to write console fallback file for {execution_id}: {e}");
            }
        }

        record.status = status.as_str().to_string();
        if let Some(result) = result {
            record.result = result;
        }
        if let Some(duration) = duration {
            record.duration = Some(duration);
        }
        let is_terminal = matches!(status, ExecutionStatus::Complete | ExecutionStatus::Failed);
        if is_terminal {
            record.finished_at = iso_date();
        }

        let fields = record.to_hash_fields();
        let _: () = conn.hset_multiple(&hash_key, &fields).await?;

        if prior_status != record.status {
            let _: std::result::Result<(), _> = conn
                .srem::<_, _, ()>(keys::status_set(&prior_status), execution_id)
                .await;
        }
        let _: std::result::Result<(), _> = conn
            .sadd::<_, _, ()>(keys::status_set(&record.status), execution_id)
            .await;
        let _: std::result::Result<(), _> = conn
            .zadd::<_, _, _, ()>(keys::executions_catalog(), execution_id, epoch_score())
            .await;

        Ok(record)
    }

    /// `get_execution(id) → ExecutionRecord`
    pub async fn get_execution(&self, id: &str) -> Result<ExecutionRecord> {
        let mut conn = self.conn().await?;
        let fields: HashMap<String, String> = conn.hgetall(keys::execution(id)).await?;

        if !fields.is_empty() {
            let mut record = ExecutionRecord::from_hash_fields(&fields)
                .expect("id field present in non-empty hash");
            if !record.console_stored {
                // Best-effort repopulation from the filesystem fallback.
                let path = self.metadata_dir().join(format!("console_{id}.txt"));
                if path.exists()
                    && let Ok(console) = std::fs::read_to_string(&path)
                {
                    let _: std::result::Result<(), _> =
                        conn.set::<_, _, ()>(keys::console(id), &console).await;
                    record.console_stored = true;
                }
            }
            return Ok(record);
        }

        // Recovery path: no store record, but maybe a fallback console file.
        let path = self.metadata_dir().join(format!("console_{id}.txt"));
        if let Ok(console) = std::fs::read_to_string(&path) {
            let (status, result) = if console.contains("Finished: SUCCESS") {
                (ExecutionStatus::Complete, "SUCCESS")
            } else if console.contains("Finished: FAILURE") {
                (ExecutionStatus::Failed, "FAILURE")
            } else {
                (ExecutionStatus::Unknown, "")
            };
            let record = ExecutionRecord {
                id: id.to_string(),
                deployment_id: String::new(),
                template_name: String::new(),
                jenkins_job_name: String::new(),
                server_name: String::new(),
                build_number: String::new(),
                parameters: HashMap::new(),
                started_at: String::new(),
                status: status.as_str().to_string(),
                result: result.to_string(),
                duration: None,
                finished_at: String::new(),
                console_stored: true,
            };
            let _: std::result::Result<(), _> =
                conn.set::<_, _, ()>(keys::console(id), &console).await;
            let fields = record.to_hash_fields();
            let _: std::result::Result<(), _> = conn.hset_multiple(keys::execution(id), &fields).await;
            return Ok(record);
        }

        Ok(ExecutionRecord {
            id: id.to_string(),
            deployment_id: String::new(),
            template_name: String::new(),
            jenkins_job_name: String::new(),
            server_name: String::new(),
            build_number: String::new(),
            parameters: HashMap::new(),
            started_at: String::new(),
            status: ExecutionStatus::Unknown.as_str().to_string(),
            result: String::new(),
            duration: None,
            finished_at: String::new(),
            console_stored: false,
        })
    }

    /// Console output for an execution, with filesystem fallback.
    pub async fn get_console_output(&self, id: &str) -> Result<Option<String>> {
        let mut conn = self.conn().await?;
        let console: Option<String> = conn.get(keys::console(id)).await?;
        if console.is_some() {
            return Ok(console);
        }
        let path = self.metadata_dir().join(format!("console_{id}.txt"));
        if let Ok(text) = std::fs::read_to_string(&path) {
            let _: std::result::Result<(), _> =
                conn.set::<_, _, ()>(keys::console(id), &text).await;
            return Ok(Some(text));
        }
        Ok(None)
    }

    /// `list_executions(template_name?, limit=10, status?) → [ExecutionRecord]`
    pub async fn list_executions(
        &self,
        template_name: Option<&str>,
        limit: usize,
        status: Option<ExecutionStatus>,
    ) -> Result<Vec<ExecutionRecord>> {
        let mut conn = self.conn().await?;

        let ids: Vec<String> = match (template_name, status) {
            (Some(name), Some(status)) => {
                let template_ids: Vec<String> = conn
                    .zrevrange(keys::template_executions(name), 0, -1)
                    .await?;
                let status_members: HashSet<String> =
                    conn.smembers(keys::status_set(status.as_str())).await?;
                template_ids
                    .into_iter()
                    .filter(|id| status_members.contains(id))
                    .take(limit)
                    .collect()
            }
            (None, Some(status)) => {
                let global_ids: Vec<String> = conn.zrevrange(keys::executions_catalog(), 0, -1).await?;
                let status_members: HashSet<String> =
                    conn.smembers(keys::status_set(status.as_str())).await?;
                global_ids
                    .into_iter()
                    .filter(|id| status_members.contains(id))
                    .take(limit)
                    .collect()
            }
            (Some(name), None) => {
                conn.zrevrange(keys::template_executions(name), 0, limit as isize - 1)
                    .await?
            }
            (None, None) => {
                conn.zrevrange(keys::executions_catalog(), 0, limit as isize - 1)
                    .await?
            }
        };

        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            let fields: HashMap<String, String> = conn.hgetall(keys::execution(&id)).await?;
            if let Some(record) = ExecutionRecord::from_hash_fields(&fields) {
                out.push(record);
            }
        }
        Ok(out)
    }
}
