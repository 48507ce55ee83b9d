//! Top-level application configuration.
//!
//! Configuration is entirely environment-variable driven, per the external
//! interfaces contract: `REDIS_HOST`, `REDIS_PORT`, `TEMPLATES_DIR`,
//! `METADATA_DIR`, plus the Jenkins server map (`JENKINS_SERVERS`) and
//! default credentials (`JENKINS_USER`, `JENKINS_PASSWORD`). There is no
//! config file; environment variables either override a compiled-in
//! default or are required outright.

use std::collections::HashMap;
use std::env;
use std::fmt;

/// Compiled-in default Jenkins server map, used when `JENKINS_SERVERS` is unset.
fn default_jenkins_servers() -> HashMap<String, String> {
    let mut map = HashMap::new();
    map.insert("default".to_string(), "http://localhost:8080".to_string());
    map
}

fn default_templates_dir() -> String {
    "templates".to_string()
}

fn default_metadata_dir() -> String {
    "metadata".to_string()
}

fn default_redis_host() -> String {
    "127.0.0.1".to_string()
}

fn default_redis_port() -> u16 {
    6379
}

/// Jenkins credential pair. `Debug` redacts the password.
#[derive(Clone)]
pub struct JenkinsCredentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for JenkinsCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JenkinsCredentials")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

impl Default for JenkinsCredentials {
    fn default() -> Self {
        Self {
            username: "admin".to_string(),
            password: "admin".to_string(),
        }
    }
}

/// Main configuration structure, resolved once at startup from the
/// environment and threaded through the rest of the process via
/// [`crate::context::AppContext`].
#[derive(Debug, Clone)]
pub struct Config {
    pub redis_host: String,
    pub redis_port: u16,
    pub templates_dir: String,
    pub metadata_dir: String,
    pub jenkins_servers: HashMap<String, String>,
    pub jenkins_credentials: JenkinsCredentials,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            redis_host: default_redis_host(),
            redis_port: default_redis_port(),
            templates_dir: default_templates_dir(),
            metadata_dir: default_metadata_dir(),
            jenkins_servers: default_jenkins_servers(),
            jenkins_credentials: JenkinsCredentials::default(),
        }
    }
}

impl Config {
    /// Resolve configuration from environment variables, falling back to
    /// compiled-in defaults for anything unset.
    pub fn load() -> Self {
        let mut config = Config::default();

        if let Ok(host) = env::var("REDIS_HOST")
            && !host.is_empty()
        {
            config.redis_host = host;
        }

        if let Ok(port) = env::var("REDIS_PORT")
            && let Ok(port) = port.parse()
        {
            config.redis_port = port;
        }

        if let Ok(dir) = env::var("TEMPLATES_DIR")
            && !dir.is_empty()
        {
            config.templates_dir = dir;
        }

        if let Ok(dir) = env::var("METADATA_DIR")
            && !dir.is_empty()
        {
            config.metadata_dir = dir;
        }

        if let Ok(servers) = env::var("JENKINS_SERVERS")
            && !servers.is_empty()
        {
            let mut map = HashMap::new();
            for pair in servers.split(',') {
                if let Some((name, url)) = pair.split_once('=') {
                    map.insert(name.trim().to_string(), url.trim().to_string());
                }
            }
            if !map.is_empty() {
                config.jenkins_servers = map;
            }
        }

        if let Ok(user) = env::var("JENKINS_USER")
            && !user.is_empty()
        {
            config.jenkins_credentials.username = user;
        }

        if let Ok(pass) = env::var("JENKINS_PASSWORD")
            && !pass.is_empty()
        {
            config.jenkins_credentials.password = pass;
        }

        config
    }

    pub fn redis_url(&self) -> String {
        format!("redis://{}:{}", self.redis_host, self.redis_port)
    }

    pub fn server_url(&self, server_name: &str) -> Option<String> {
        self.jenkins_servers.get(server_name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.redis_host, "127.0.0.1");
        assert_eq!(config.redis_port, 6379);
        assert_eq!(config.jenkins_servers.get("default").unwrap(), "http://localhost:8080");
    }

    #[test]
    fn test_redis_url() {
        let mut config = Config::default();
        config.redis_host = "redis.internal".into();
        config.redis_port = 6380;
        assert_eq!(config.redis_url(), "redis://redis.internal:6380");
    }

    #[test]
    fn test_jenkins_credentials_debug_redacts_password() {
        let creds = JenkinsCredentials {
            username: "bob".into(),
            password: "hunter2".into(),
        };
        let debug = format!("{creds:?}");
        assert!(debug.contains("bob"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn test_server_url_lookup() {
        let config = Config::default();
        assert!(config.server_url("default").is_some());
        assert!(config.server_url("nonexistent").is_none());
    }
}
