//! Explicit application context, per the Design Notes' "global state"
//! guidance: a single struct carrying the store handle, Jenkins server
//! map/credentials (via `Config`), and templates/metadata directories,
//! constructed once in `main` and threaded through the Tool Server and
//! Coordinator rather than reached via scattered globals.
//!
//! The metadata store connection itself is still reached through a
//! process-wide singleton (see `crate::store::get_or_init_store`), since
//! it is genuinely process-lifetime state every tool call needs.

use std::path::PathBuf;

use crate::config::Config;
use crate::error::Result;
use crate::registry::TemplateRegistry;
use crate::store::MetadataStore;

pub struct AppContext {
    pub config: Config,
    pub registry: TemplateRegistry,
    pub store: &'static MetadataStore,
}

impl AppContext {
    pub async fn init() -> Result<Self> {
        let config = Config::load();
        std::fs::create_dir_all(&config.templates_dir)?;
        std::fs::create_dir_all(&config.metadata_dir)?;

        let registry = TemplateRegistry::new(PathBuf::from(&config.templates_dir));

        let store = crate::store::get_or_init_store(
            &config.redis_url(),
            PathBuf::from(&config.metadata_dir),
        )?;

        Ok(Self {
            config,
            registry,
            store,
        })
    }
}
