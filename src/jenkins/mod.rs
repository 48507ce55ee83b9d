//! Jenkins Client.
//!
//! Opaque HTTP client to a Jenkins master. Connection is stateless per
//! operation; credentials are either supplied per-call or taken from the
//! compiled-in/env-resolved default in [`crate::config::Config`].
//!
//! The job-config XML template, queue-resolution polling loop, and
//! console-offset streaming loop follow Jenkins' own REST conventions
//! (`/createItem`, `/build`, `/queue/item/<n>/api/json`, `/consoleText`).

pub mod xml;

use std::time::Duration;

use reqwest::Client;
use tracing::{info, warn};

use crate::error::{OrchestratorError, Result};

const CONNECT_RETRY_DELAY: Duration = Duration::from_secs(2);
const QUEUE_POLL_INTERVAL: Duration = Duration::from_secs(2);
const QUEUE_POLL_MAX_ITERATIONS: u32 = 30; // ~60s
const CONSOLE_POLL_INTERVAL: Duration = Duration::from_secs(3);
const CONSOLE_POLL_MAX_ITERATIONS: u32 = 60; // ~3 minutes

/// A connected handle to one Jenkins server. Cheap to construct per
/// operation since `reqwest::Client` itself is `Arc`-backed internally.
#[derive(Clone)]
pub struct JenkinsHandle {
    pub server_name: String,
    base_url: String,
    username: String,
    password: String,
    client: Client,
}

pub struct StartJobOutcome {
    pub queue_number: u64,
    pub build_number: Option<u64>,
}

pub struct StreamOutcome {
    pub status: String,
    pub console_output: String,
    pub complete: bool,
}

/// `connect(server_name, user?, pass?) → Handle`
pub async fn connect(
    server_name: &str,
    base_url: &str,
    username: &str,
    password: &str,
) -> Result<JenkinsHandle> {
    let client = Client::new();
    let handle = JenkinsHandle {
        server_name: server_name.to_string(),
        base_url: base_url.trim_end_matches('/').to_string(),
        username: username.to_string(),
        password: password.to_string(),
        client,
    };

    if identity_check(&handle).await.is_ok() {
        return Ok(handle);
    }

    warn!("identity check failed for jenkins server '{server_name}', retrying once");
    tokio::time::sleep(CONNECT_RETRY_DELAY).await;

    match identity_check(&handle).await {
        Ok(()) => Ok(handle),
        Err(e) => Err(OrchestratorError::JenkinsUnreachable(
            server_name.to_string(),
            e.to_string(),
        )),
    }
}

async fn identity_check(handle: &JenkinsHandle) -> Result<()> {
    let url = format!("{}/api/json", handle.base_url);
    let resp = handle
        .client
        .get(&url)
        .basic_auth(&handle.username, Some(&handle.password))
        .send()
        .await?;
    if resp.status().is_success() {
        Ok(())
    } else {
        Err(OrchestratorError::JenkinsApiError(format!(
            "identity check returned {}",
            resp.status()
        )))
    }
}

impl JenkinsHandle {
    fn job_url(&self, job_name: &str, suffix: &str) -> String {
        format!("{}/job/{}{}", self.base_url, job_name, suffix)
    }

    fn auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        req.basic_auth(&self.username, Some(&self.password))
    }

    /// `job_exists(handle, job_name) → bool`
    pub async fn job_exists(&self, job_name: &str) -> Result<bool> {
        let url = self.job_url(job_name, "/api/json");
        let resp = self.auth(self.client.get(&url)).send().await?;
        Ok(resp.status().is_success())
    }

    /// `delete_job_if_exists(handle, job_name) → bool`
    pub async fn delete_job_if_exists(&self, job_name: &str) -> Result<bool> {
        if !self.job_exists(job_name).await? {
            info!("job {job_name} does not exist, no need to delete");
            return Ok(false);
        }
        let url = self.job_url(job_name, "/doDelete");
        match self.auth(self.client.post(&url)).send().await {
            Ok(resp) if resp.status().is_success() => {
                info!("job {job_name} deleted");
                Ok(true)
            }
            Ok(resp) => {
                warn!("delete of job {job_name} returned {}", resp.status());
                Ok(false)
            }
            Err(e) => {
                warn!("error deleting job {job_name}: {e}");
                Ok(false)
            }
        }
    }

    /// `create_job(handle, job_name, jenkinsfile_text)`
    pub async fn create_job(&self, job_name: &str, jenkinsfile_text: &str) -> Result<()> {
        let config_xml = xml::build_job_config(jenkinsfile_text);
        let url = format!(
            "{}/createItem?name={}",
            self.base_url,
            urlencoding_light(job_name)
        );
        let resp = self
            .auth(self.client.post(&url))
            .header("Content-Type", "application/xml")
            .body(config_xml)
            .send()
            .await?;
        if resp.status().is_success() {
            info!("job {job_name} created successfully");
            Ok(())
        } else {
            Err(OrchestratorError::JenkinsApiError(format!(
                "create_job for '{job_name}' returned {}",
                resp.status()
            )))
        }
    }

    /// `start_job(handle, job_name, parameters?) → { queue_number, build_number? }`
    pub async fn start_job(&self, job_name: &str) -> Result<StartJobOutcome> {
        let url = self.job_url(job_name, "/build");
        let resp = self.auth(self.client.post(&url)).send().await?;
        if !resp.status().is_success() {
            return Err(OrchestratorError::JenkinsApiError(format!(
                "build trigger for '{job_name}' returned {}",
                resp.status()
            )));
        }

        let queue_number = resp
            .headers()
            .get("Location")
            .and_then(|v| v.to_str().ok())
            .and_then(|loc| loc.trim_end_matches('/').rsplit('/').next())
            .and_then(|n| n.parse::<u64>().ok())
            .unwrap_or(0);

        info!("job {job_name} build started, queue number {queue_number}");

        for _ in 0..QUEUE_POLL_MAX_ITERATIONS {
            match self.queue_item_build_number(queue_number).await {
                Ok(Some(build_number)) => {
                    info!("job {job_name} is building, build number {build_number}");
                    return Ok(StartJobOutcome {
                        queue_number,
                        build_number: Some(build_number),
                    });
                }
                Ok(None) => {
                    tokio::time::sleep(QUEUE_POLL_INTERVAL).await;
                }
                Err(e) => {
                    warn!("error polling queue item {queue_number}: {e}");
                    tokio::time::sleep(QUEUE_POLL_INTERVAL).await;
                }
            }
        }

        Ok(StartJobOutcome {
            queue_number,
            build_number: None,
        })
    }

    async fn queue_item_build_number(&self, queue_number: u64) -> Result<Option<u64>> {
        let url = format!("{}/queue/item/{}/api/json", self.base_url, queue_number);
        let resp = self.auth(self.client.get(&url)).send().await?;
        if !resp.status().is_success() {
            return Ok(None);
        }
        let body: serde_json::Value = resp.json().await?;
        Ok(body
            .get("executable")
            .and_then(|e| e.get("number"))
            .and_then(|n| n.as_u64()))
    }

    /// `stream_console(handle, job_name, build_number) → { status, console_output, complete }`
    pub async fn stream_console(&self, job_name: &str, build_number: u64) -> Result<StreamOutcome> {
        let mut offset: usize = 0;
        let mut buffer = String::new();

        for _ in 0..CONSOLE_POLL_MAX_ITERATIONS {
            let building = match self.build_info(job_name, build_number).await {
                Ok(info) => info.building,
                Err(e) => {
                    warn!("error polling build info for {job_name}#{build_number}: {e}");
                    tokio::time::sleep(CONSOLE_POLL_INTERVAL).await;
                    continue;
                }
            };

            if building {
                if let Ok(full) = self.console_text(job_name, build_number).await {
                    append_suffix(&mut buffer, &full, &mut offset);
                }
                tokio::time::sleep(CONSOLE_POLL_INTERVAL).await;
                continue;
            }

            if let Ok(full) = self.console_text(job_name, build_number).await {
                append_suffix(&mut buffer, &full, &mut offset);
            }
            let info = self.build_info(job_name, build_number).await?;
            let status = info.result.unwrap_or_else(|| "UNKNOWN".to_string());
            return Ok(StreamOutcome {
                status,
                console_output: buffer,
                complete: true,
            });
        }

        buffer.push_str("\n[TIMEOUT] console streaming iteration budget exhausted\n");
        warn!(
            "{}",
            OrchestratorError::StreamingTimeout(job_name.to_string(), build_number)
        );
        Ok(StreamOutcome {
            status: "TIMEOUT".to_string(),
            console_output: buffer,
            complete: false,
        })
    }

    async fn build_info(&self, job_name: &str, build_number: u64) -> Result<BuildInfo> {
        let url = format!(
            "{}/job/{}/{}/api/json",
            self.base_url, job_name, build_number
        );
        let resp = self.auth(self.client.get(&url)).send().await?;
        if !resp.status().is_success() {
            return Err(OrchestratorError::JenkinsApiError(format!(
                "build info for '{job_name}#{build_number}' returned {}",
                resp.status()
            )));
        }
        let body: serde_json::Value = resp.json().await?;
        Ok(BuildInfo {
            building: body.get("building").and_then(|b| b.as_bool()).unwrap_or(false),
            result: body
                .get("result")
                .and_then(|r| r.as_str())
                .map(|s| s.to_string()),
            duration: body.get("duration").and_then(|d| d.as_u64()),
        })
    }

    async fn console_text(&self, job_name: &str, build_number: u64) -> Result<String> {
        let url = format!(
            "{}/job/{}/{}/consoleText",
            self.base_url, job_name, build_number
        );
        let resp = self.auth(self.client.get(&url)).send().await?;
        Ok(resp.text().await?)
    }

    /// Duration (ms) for a finished build, used by the coordinator to
    /// populate `ExecutionRecord::duration` at the store boundary.
    pub async fn build_duration_ms(&self, job_name: &str, build_number: u64) -> Result<Option<u64>> {
        Ok(self.build_info(job_name, build_number).await?.duration)
    }
}

struct BuildInfo {
    building: bool,
    result: Option<String>,
    duration: Option<u64>,
}

fn append_suffix(buffer: &mut String, full: &str, offset: &mut usize) {
    if full.len() > *offset {
        buffer.push_str(&full[*offset..]);
        *offset = full.len();
    }
}

/// Minimal query-parameter escaping; job names are validated identifiers
/// (alphanumeric plus `-`/`_`) so this only needs to handle the common case.
fn urlencoding_light(s: &str) -> String {
    s.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c.to_string()
            } else {
                format!("%{:02X}", c as u32)
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_suffix_tracks_offset() {
        let mut buffer = String::new();
        let mut offset = 0;
        append_suffix(&mut buffer, "hello", &mut offset);
        assert_eq!(buffer, "hello");
        assert_eq!(offset, 5);
        append_suffix(&mut buffer, "hello world", &mut offset);
        assert_eq!(buffer, "hello world");
        assert_eq!(offset, 11);
    }

    #[test]
    fn test_urlencoding_light() {
        assert_eq!(urlencoding_light("demo-job_1"), "demo-job_1");
        assert_eq!(urlencoding_light("a b"), "a%20b");
    }
}
