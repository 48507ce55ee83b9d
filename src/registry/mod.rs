//! Template Registry.
//!
//! Thin composition over the Metadata Store Adapter and the filesystem.
//! The filesystem is authoritative for template *existence*; the store
//! holds descriptions, version counters, and update timestamps.

pub mod diff;
pub mod generator;

use std::path::PathBuf;

use crate::error::{OrchestratorError, Result};
use crate::store::MetadataStore;
use crate::types::{TemplateRecord, TemplateSummary};
use crate::utils::write_atomic;

pub struct TemplateRegistry {
    templates_dir: PathBuf,
}

pub struct EditResult {
    pub diff: String,
    pub version: Option<u64>,
    pub preview: bool,
}

impl TemplateRegistry {
    pub fn new(templates_dir: PathBuf) -> Self {
        Self { templates_dir }
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.templates_dir.join(format!("{name}.Jenkinsfile"))
    }

    /// `read_jenkinsfile(name) → string`
    pub fn read_jenkinsfile(&self, name: &str) -> Result<String> {
        let path = self.path_for(name);
        std::fs::read_to_string(&path)
            .map_err(|e| OrchestratorError::TemplateFileMissing(name.to_string(), e.to_string()))
    }

    /// `write_jenkinsfile(name, text)`
    pub fn write_jenkinsfile(&self, name: &str, text: &str) -> Result<()> {
        write_atomic(&self.path_for(name), text)?;
        Ok(())
    }

    pub fn jenkinsfile_exists(&self, name: &str) -> bool {
        self.path_for(name).exists()
    }

    pub fn template_path_str(&self, name: &str) -> String {
        self.path_for(name).to_string_lossy().to_string()
    }

    /// Description extracted from a leading `// Description:` comment
    /// line, if present.
    fn extract_description(text: &str) -> Option<String> {
        text.lines().find_map(|line| {
            line.trim()
                .strip_prefix("// Description:")
                .map(|d| d.trim().to_string())
        })
    }

    /// Insert or replace the `// Description:` line, after the leading
    /// comment block if one is absent.
    fn rewrite_description_line(text: &str, description: &str) -> String {
        let mut lines: Vec<String> = text.lines().map(|l| l.to_string()).collect();
        if let Some(idx) = lines
            .iter()
            .position(|l| l.trim().starts_with("// Description:"))
        {
            lines[idx] = format!("// Description: {description}");
        } else {
            let insert_at = lines
                .iter()
                .position(|l| !l.trim_start().starts_with("//"))
                .unwrap_or(0);
            lines.insert(insert_at, format!("// Description: {description}"));
        }
        lines.join("\n") + "\n"
    }

    /// `register_template(name, description?) → TemplateRecord`, reading
    /// the description marker from disk when none is supplied.
    pub async fn register_template(
        &self,
        store: &MetadataStore,
        name: &str,
        description: Option<String>,
    ) -> Result<TemplateRecord> {
        let text = self.read_jenkinsfile(name)?;
        let description = description.or_else(|| Self::extract_description(&text));
        store
            .register_template(name, &self.template_path_str(name), description)
            .await
    }

    /// `list_templates() → [TemplateSummary]` — authoritative reconciliation:
    /// scans the templates directory, registers unknown files, and removes
    /// catalog entries whose file is gone.
    pub async fn list_templates(&self, store: &MetadataStore) -> Result<Vec<TemplateSummary>> {
        std::fs::create_dir_all(&self.templates_dir)?;

        let mut on_disk = Vec::new();
        for entry in std::fs::read_dir(&self.templates_dir)? {
            let entry = entry?;
            let path = entry.path();
            if let Some(name) = path
                .file_name()
                .and_then(|f| f.to_str())
                .and_then(|f| f.strip_suffix(".Jenkinsfile"))
            {
                on_disk.push(name.to_string());
            }
        }

        let mut catalog = store.list_templates().await?;
        let catalog_names: std::collections::HashSet<_> =
            catalog.iter().map(|t| t.name.clone()).collect();

        for name in &on_disk {
            if !catalog_names.contains(name) {
                let record = self.register_template(store, name, None).await?;
                catalog.push(TemplateSummary {
                    name: record.name,
                    description: record.description,
                    version: record.version,
                    updated_at: record.updated_at,
                });
            }
        }

        let on_disk_set: std::collections::HashSet<_> = on_disk.into_iter().collect();
        let mut out = Vec::new();
        for summary in catalog {
            if on_disk_set.contains(&summary.name) {
                out.push(summary);
            } else {
                store.remove_template_catalog_entry(&summary.name).await?;
            }
        }

        Ok(out)
    }

    /// `edit_template(name, new_text, preview?, new_description?) → EditResult`
    pub async fn edit_template(
        &self,
        store: &MetadataStore,
        name: &str,
        new_text: &str,
        preview: bool,
        new_description: Option<String>,
    ) -> Result<EditResult> {
        let current = self.read_jenkinsfile(name).unwrap_or_default();
        let diff_text = diff::unified_diff(&current, new_text, name);

        if preview {
            return Ok(EditResult {
                diff: diff_text,
                version: None,
                preview: true,
            });
        }

        self.write_jenkinsfile(name, new_text)?;

        let record = match new_description {
            Some(description) => {
                let record = store.update_template(name, &description).await?;
                let rewritten = Self::rewrite_description_line(new_text, &description);
                if let Err(e) = self.write_jenkinsfile(name, &rewritten) {
                    tracing::warn!("failed to rewrite description line for '{name}': {e}");
                }
                record
            }
            None => store.increment_template_version(name).await?,
        };

        Ok(EditResult {
            diff: diff_text,
            version: Some(record.version),
            preview: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_description() {
        let text = "// Description: does a thing\npipeline {}\n";
        assert_eq!(
            TemplateRegistry::extract_description(text),
            Some("does a thing".to_string())
        );
    }

    #[test]
    fn test_extract_description_absent() {
        assert_eq!(TemplateRegistry::extract_description("pipeline {}"), None);
    }

    #[test]
    fn test_rewrite_description_line_replaces_existing() {
        let text = "// Description: old\npipeline {}\n";
        let rewritten = TemplateRegistry::rewrite_description_line(text, "new");
        assert!(rewritten.contains("// Description: new"));
        assert!(!rewritten.contains("old"));
    }

    #[test]
    fn test_rewrite_description_line_inserts_when_absent() {
        let text = "pipeline {}\n";
        let rewritten = TemplateRegistry::rewrite_description_line(text, "new");
        assert!(rewritten.starts_with("// Description: new"));
    }

    #[test]
    fn test_read_write_jenkinsfile_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let registry = TemplateRegistry::new(dir.path().to_path_buf());
        registry.write_jenkinsfile("demo", "pipeline {}").unwrap();
        assert_eq!(registry.read_jenkinsfile("demo").unwrap(), "pipeline {}");
        assert!(registry.jenkinsfile_exists("demo"));
    }

    #[test]
    fn test_read_missing_jenkinsfile_errors() {
        let dir = tempfile::tempdir().unwrap();
        let registry = TemplateRegistry::new(dir.path().to_path_buf());
        assert!(registry.read_jenkinsfile("missing").is_err());
    }
}
