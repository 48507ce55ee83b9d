//! Metadata Store Adapter.
//!
//! Typed operations over a Redis-compatible key-value store: templates,
//! deployments, executions, console spill, and the index families under
//! the `miladyos:` keyspace. Each record is a Redis hash; catalogs and
//! per-template/per-job/per-status lookups are sorted sets and sets so
//! listing and filtering never require a full scan.
//!
//! The adapter never propagates a transient index-write failure as a hard
//! error: it logs via `tracing` and returns the best-known record, per
//! the failure semantics in the component design.

pub mod executions;

use std::collections::HashMap;
use std::path::PathBuf;

use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use std::sync::OnceLock;
use tokio::sync::OnceCell;
use tracing::warn;

use crate::error::{OrchestratorError, Result};
use crate::types::{DeploymentRecord, TemplateRecord, TemplateSummary, keys};
use crate::utils::{epoch_score, generate_uuid, iso_date};

static STORE: OnceLock<MetadataStore> = OnceLock::new();

/// Initialize (once) and return the process-wide metadata store handle.
///
/// `redis::Client::open` never touches the network; the actual
/// `ConnectionManager` is established lazily on first use (see
/// [`MetadataStore::conn`]), so constructing the store — and therefore
/// [`crate::context::AppContext`] — never requires a live Redis to be
/// reachable up front.
pub fn get_or_init_store(redis_url: &str, metadata_dir: PathBuf) -> Result<&'static MetadataStore> {
    if let Some(store) = STORE.get() {
        return Ok(store);
    }
    let client = redis::Client::open(redis_url)?;
    let store = MetadataStore {
        client,
        manager: OnceCell::const_new(),
        metadata_dir,
    };
    // If another caller raced us, keep theirs; both are equivalent handles.
    let _ = STORE.set(store);
    Ok(STORE.get().expect("just initialized"))
}

pub struct MetadataStore {
    client: redis::Client,
    manager: OnceCell<ConnectionManager>,
    metadata_dir: PathBuf,
}

impl MetadataStore {
    /// A single `ConnectionManager` is shared across tasks once
    /// established; the manager itself is concurrency-safe and cheap to
    /// clone, which is how this crate satisfies "a single long-lived
    /// handle shared across tasks" from the concurrency model.
    async fn conn(&self) -> Result<ConnectionManager> {
        let manager = self
            .manager
            .get_or_try_init(|| async { ConnectionManager::new(self.client.clone()).await })
            .await?;
        Ok(manager.clone())
    }

    pub fn metadata_dir(&self) -> &PathBuf {
        &self.metadata_dir
    }

    /// `register_template(name, description?) → TemplateRecord`
    pub async fn register_template(
        &self,
        name: &str,
        template_path: &str,
        description: Option<String>,
    ) -> Result<TemplateRecord> {
        let mut conn = self.conn().await?;
        let key = keys::template(name);
        let existing: HashMap<String, String> = conn.hgetall(&key).await?;

        let now = iso_date();
        let description = description.unwrap_or_default();

        let record = if existing.is_empty() {
            TemplateRecord {
                name: name.to_string(),
                description,
                template_path: template_path.to_string(),
                created_at: now.clone(),
                updated_at: now,
                version: 1,
            }
        } else {
            let version: u64 = existing
                .get("version")
                .and_then(|v| v.parse().ok())
                .unwrap_or(0)
                + 1;
            let description = if description.is_empty() {
                existing.get("description").cloned().unwrap_or_default()
            } else {
                description
            };
            TemplateRecord {
                name: name.to_string(),
                description,
                template_path: template_path.to_string(),
                created_at: existing.get("created_at").cloned().unwrap_or(now.clone()),
                updated_at: now,
                version,
            }
        };

        let fields: Vec<(String, String)> = vec![
            ("name".into(), record.name.clone()),
            ("description".into(), record.description.clone()),
            ("template_path".into(), record.template_path.clone()),
            ("created_at".into(), record.created_at.clone()),
            ("updated_at".into(), record.updated_at.clone()),
            ("version".into(), record.version.to_string()),
        ];

        let _: () = conn.hset_multiple(&key, &fields).await?;
        let _: std::result::Result<(), _> = conn
            .zadd::<_, _, _, ()>(keys::templates_catalog(), name, epoch_score())
            .await;

        Ok(record)
    }

    /// `list_templates() → [TemplateSummary]` reconciliation is performed
    /// by the caller (the Template Registry knows the filesystem); this
    /// method only reads the catalog as currently recorded.
    pub async fn list_templates(&self) -> Result<Vec<TemplateSummary>> {
        let mut conn = self.conn().await?;
        let names: Vec<String> = conn.zrange(keys::templates_catalog(), 0, -1).await?;
        let mut out = Vec::with_capacity(names.len());
        for name in names {
            let fields: HashMap<String, String> = conn.hgetall(keys::template(&name)).await?;
            if fields.is_empty() {
                continue;
            }
            out.push(TemplateSummary {
                name: name.clone(),
                description: fields.get("description").cloned().unwrap_or_default(),
                version: fields
                    .get("version")
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(1),
                updated_at: fields.get("updated_at").cloned().unwrap_or_default(),
            });
        }
        Ok(out)
    }

    /// Remove a catalog entry whose Jenkinsfile is gone from disk.
    pub async fn remove_template_catalog_entry(&self, name: &str) -> Result<()> {
        let mut conn = self.conn().await?;
        let _: () = conn.zrem(keys::templates_catalog(), name).await?;
        let _: () = conn.del(keys::template(name)).await?;
        Ok(())
    }

    /// `update_template(name, description) → TemplateRecord`
    pub async fn update_template(&self, name: &str, description: &str) -> Result<TemplateRecord> {
        let mut conn = self.conn().await?;
        let key = keys::template(name);
        let existing: HashMap<String, String> = conn.hgetall(&key).await?;
        if existing.is_empty() {
            return Err(OrchestratorError::TemplateNotFound(name.to_string()));
        }

        let version: u64 = existing
            .get("version")
            .and_then(|v| v.parse().ok())
            .unwrap_or(0)
            + 1;
        let now = iso_date();

        let record = TemplateRecord {
            name: name.to_string(),
            description: description.to_string(),
            template_path: existing.get("template_path").cloned().unwrap_or_default(),
            created_at: existing.get("created_at").cloned().unwrap_or(now.clone()),
            updated_at: now,
            version,
        };

        let fields: Vec<(String, String)> = vec![
            ("description".into(), record.description.clone()),
            ("updated_at".into(), record.updated_at.clone()),
            ("version".into(), record.version.to_string()),
        ];
        let _: () = conn.hset_multiple(&key, &fields).await?;
        let _: std::result::Result<(), _> = conn
            .zadd::<_, _, _, ()>(keys::templates_catalog(), name, epoch_score())
            .await;

        Ok(record)
    }

    /// `increment_template_version(name) → TemplateRecord`
    pub async fn increment_template_version(&self, name: &str) -> Result<TemplateRecord> {
        let mut conn = self.conn().await?;
        let key = keys::template(name);
        let existing: HashMap<String, String> = conn.hgetall(&key).await?;
        if existing.is_empty() {
            return Err(OrchestratorError::TemplateNotFound(name.to_string()));
        }

        let version: u64 = existing
            .get("version")
            .and_then(|v| v.parse().ok())
            .unwrap_or(0)
            + 1;
        let now = iso_date();

        let _: () = conn
            .hset_multiple(
                &key,
                &[
                    ("updated_at".to_string(), now.clone()),
                    ("version".to_string(), version.to_string()),
                ],
            )
            .await?;
        let _: std::result::Result<(), _> = conn
            .zadd::<_, _, _, ()>(keys::templates_catalog(), name, epoch_score())
            .await;

        Ok(TemplateRecord {
            name: name.to_string(),
            description: existing.get("description").cloned().unwrap_or_default(),
            template_path: existing.get("template_path").cloned().unwrap_or_default(),
            created_at: existing.get("created_at").cloned().unwrap_or(now.clone()),
            updated_at: now,
            version,
        })
    }

    /// `deploy_pipeline(template_name, jenkins_job_name, server_name) → DeploymentRecord`
    pub async fn deploy_pipeline(
        &self,
        template_name: &str,
        jenkins_job_name: &str,
        server_name: &str,
    ) -> Result<DeploymentRecord> {
        let mut conn = self.conn().await?;
        let template: HashMap<String, String> =
            conn.hgetall(keys::template(template_name)).await?;
        if template.is_empty() {
            return Err(OrchestratorError::TemplateNotFound(template_name.to_string()));
        }
        let template_version: u64 = template
            .get("version")
            .and_then(|v| v.parse().ok())
            .unwrap_or(1);

        let id = generate_uuid();
        let now = iso_date();
        let record = DeploymentRecord {
            id: id.clone(),
            template_name: template_name.to_string(),
            template_version,
            jenkins_job_name: jenkins_job_name.to_string(),
            server_name: server_name.to_string(),
            deployed_at: now,
            status: "deployed".to_string(),
        };

        let fields: Vec<(String, String)> = vec![
            ("id".into(), record.id.clone()),
            ("template_name".into(), record.template_name.clone()),
            ("template_version".into(), record.template_version.to_string()),
            ("jenkins_job_name".into(), record.jenkins_job_name.clone()),
            ("server_name".into(), record.server_name.clone()),
            ("deployed_at".into(), record.deployed_at.clone()),
            ("status".into(), record.status.clone()),
        ];

        if let Err(e) = conn
            .hset_multiple::<_, _, _, ()>(keys::deployment(&id), &fields)
            .await
        {
            warn!("failed to write deployment record: {e}");
        }
        if let Err(e) = conn
            .sadd::<_, _, ()>(keys::template_deployments(template_name), &id)
            .await
        {
            warn!("failed to add deployment to template set: {e}");
        }
        if let Err(e) = conn
            .set::<_, _, ()>(keys::job_index(server_name, jenkins_job_name), &id)
            .await
        {
            warn!("failed to write job index: {e}");
        }

        Ok(record)
    }

    /// Resolve a `(server, job)` pair to its current deployment id, if any.
    pub async fn resolve_deployment_id(&self, server_name: &str, job_name: &str) -> Result<Option<String>> {
        let mut conn = self.conn().await?;
        let id: Option<String> = conn.get(keys::job_index(server_name, job_name)).await?;
        Ok(id)
    }
}
