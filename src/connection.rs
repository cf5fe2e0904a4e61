use anyhow::{Context, Result};
use async_trait::async_trait;
use notion_api::types::Database;
use notion_api::Notion;

use crate::config::Config;
use crate::dropbox::Dropbox;
use crate::model::RelationSource;

/// Authenticated clients for the two remote APIs, built once per invocation
/// and read-only afterwards.
pub struct Connection {
    config: Config,
    notion: Notion,
    dropbox: Dropbox,
}

impl Connection {
    pub fn new(config: Config) -> Result<Connection> {
        let notion = Notion::new(config.token.clone())?;
        let dropbox = Dropbox::new(config.dropbox_token.clone())?;
        Ok(Connection {
            config,
            notion,
            dropbox,
        })
    }

    /// Resolve a logical database name into a live handle. Fails if the name
    /// is missing from the config or the remote lookup fails.
    pub async fn get_db(&self, mode: &str) -> Result<Database> {
        let id = self.database_id(mode)?;
        self.notion
            .retrieve_database(id)
            .await
            .with_context(|| format!("Failed to look up the '{mode}' database"))
    }

    pub fn database_id(&self, mode: &str) -> Result<&str> {
        self.config
            .databases
            .get(mode)
            .map(String::as_str)
            .with_context(|| format!("No database configured for '{mode}'"))
    }

    pub fn notion(&self) -> &Notion {
        &self.notion
    }

    pub fn dropbox(&self) -> &Dropbox {
        &self.dropbox
    }
}

#[async_trait]
impl RelationSource for Connection {
    async fn entries(&self, db_name: &str) -> Result<Vec<(String, String)>> {
        let id = self.database_id(db_name)?;
        let pages = self
            .notion
            .query_database(id)
            .await
            .with_context(|| format!("Failed to query the '{db_name}' database"))?;
        Ok(pages.into_iter().map(|p| (p.title(), p.id)).collect())
    }
}
