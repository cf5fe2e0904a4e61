use std::collections::BTreeMap;

use anyhow::{bail, Context, Result};
use reqwest::{header, Method};
use serde::{de::DeserializeOwned, Serialize};

use crate::to_dashed_id;
use crate::types::*;

const NOTION_API_BASE: &str = "https://api.notion.com/v1";
const NOTION_VERSION: &str = "2022-06-28";

#[derive(Debug)]
pub struct Notion {
    client: reqwest::Client,
    token: String,
}

impl Notion {
    pub fn new(token: String) -> Result<Notion> {
        let client = reqwest::Client::builder().build().context("build client")?;
        Ok(Notion { client, token })
    }

    pub async fn retrieve_database(&self, database_id: &str) -> Result<Database> {
        let database_id = to_dashed_id(database_id).context("convert to dashed id")?;
        self.request::<(), Database>(Method::GET, &format!("/databases/{database_id}"), None)
            .await
    }

    /// Fetch every entry of a database, following pagination cursors.
    pub async fn query_database(&self, database_id: &str) -> Result<Vec<Page>> {
        let database_id = to_dashed_id(database_id).context("convert to dashed id")?;
        let resource = format!("/databases/{database_id}/query");

        let mut pages = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let req = QueryDatabaseRequest {
                start_cursor: cursor.take(),
            };
            let res: QueryDatabaseResponse =
                self.request(Method::POST, &resource, Some(&req)).await?;
            pages.extend(res.results);
            match (res.has_more, res.next_cursor) {
                (true, Some(next)) => cursor = Some(next),
                _ => break,
            }
        }
        log::debug!("queried {} entries from {database_id}", pages.len());
        Ok(pages)
    }

    /// Create one page under the given parent. The title is written into the
    /// property map under the canonical `title` property id.
    pub async fn create_page(
        &self,
        parent: Parent,
        title: &str,
        mut properties: BTreeMap<String, PropertyValue>,
    ) -> Result<Page> {
        properties.insert("title".to_string(), PropertyValue::title(title));
        let req = CreatePageRequest { parent, properties };
        self.request(Method::POST, "/pages", Some(&req)).await
    }

    async fn request<B: Serialize, R: DeserializeOwned>(
        &self,
        method: Method,
        resource: &str,
        body: Option<&B>,
    ) -> Result<R> {
        let mut req = self
            .client
            .request(method, format!("{NOTION_API_BASE}{resource}"))
            .header(header::AUTHORIZATION, format!("Bearer {}", self.token))
            .header("Notion-Version", NOTION_VERSION);
        if let Some(body) = body {
            req = req.json(body);
        }
        let res = req.send().await.context("request")?;
        let status = res.status();
        let text = res.text().await;
        if !status.is_success() {
            let text = text.unwrap_or_default();
            bail!("{status} {text}");
        }
        let text = text.context("parse text error")?;
        let res =
            serde_json::from_str::<R>(&text).with_context(|| format!("parse json {text:?}"))?;
        Ok(res)
    }
}
