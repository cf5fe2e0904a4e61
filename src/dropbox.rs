use std::path::Path;
use std::time::SystemTime;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{header, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;

const CONTENT_API_BASE: &str = "https://content.dropboxapi.com/2";
const API_BASE: &str = "https://api.dropboxapi.com/2";

#[derive(Debug)]
pub struct Dropbox {
    client: reqwest::Client,
    token: String,
}

#[derive(Serialize, PartialEq, Eq, Clone, Copy, Debug)]
#[serde(rename_all = "lowercase")]
pub enum WriteMode {
    /// Fail if the remote path already exists.
    Add,
    Overwrite,
}

#[derive(Serialize, Debug)]
struct UploadArg<'a> {
    path: &'a str,
    mode: WriteMode,
    client_modified: String,
    mute: bool,
}

#[derive(Deserialize, PartialEq, Eq, Clone, Debug)]
pub struct FileMetadata {
    pub name: String,
    #[serde(default)]
    pub path_display: Option<String>,
    #[serde(default)]
    pub path_lower: Option<String>,
    #[serde(default)]
    pub client_modified: Option<String>,

    #[serde(flatten)]
    pub rest: serde_json::Value,
}

#[derive(Deserialize, Debug)]
struct SharedLink {
    url: String,
}

#[derive(Deserialize, Debug)]
struct ListSharedLinksResponse {
    links: Vec<SharedLink>,
}

/// What the page pipeline needs back from a completed upload.
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct UploadResult {
    pub path: String,
    pub url: String,
    pub client_modified: Option<String>,
}

/// Storage side of a file page: put the file somewhere and hand back a
/// shareable URL. Cut as a trait so tests can count calls instead of
/// talking to Dropbox.
#[async_trait]
pub trait FileStore {
    async fn upload_and_share(
        &self,
        local: &Path,
        folder: &str,
        subfolder: &str,
        overwrite: bool,
    ) -> Result<UploadResult>;
}

impl Dropbox {
    pub fn new(token: String) -> Result<Dropbox> {
        let client = reqwest::Client::builder().build().context("build client")?;
        Ok(Dropbox { client, token })
    }

    /// Upload one local file, whole-buffer, tagging the remote object with
    /// the local modification time. One request, no retry.
    pub async fn upload(
        &self,
        local: &Path,
        folder: &str,
        subfolder: &str,
        name: &str,
        overwrite: bool,
    ) -> Result<FileMetadata> {
        let path = remote_path(folder, subfolder, name);
        let mode = if overwrite {
            WriteMode::Overwrite
        } else {
            WriteMode::Add
        };
        let mtime = std::fs::metadata(local)
            .and_then(|meta| meta.modified())
            .with_context(|| format!("Failed to stat {}", local.display()))?;
        let arg = UploadArg {
            path: &path,
            mode,
            client_modified: client_modified(mtime),
            mute: true,
        };
        let data = tokio::fs::read(local)
            .await
            .with_context(|| format!("Failed to read {}", local.display()))?;
        log::debug!("uploading {} bytes to {path}", data.len());

        let res = self
            .client
            .post(format!("{CONTENT_API_BASE}/files/upload"))
            .header(header::AUTHORIZATION, format!("Bearer {}", self.token))
            .header("Dropbox-API-Arg", serde_json::to_string(&arg)?)
            .header(header::CONTENT_TYPE, "application/octet-stream")
            .body(data)
            .send()
            .await
            .context("upload request")?;
        let status = res.status();
        let text = res.text().await.unwrap_or_default();
        if !status.is_success() {
            log::error!("Dropbox upload failed: {status} {text}");
            bail!("upload to {path}: {status} {text}");
        }
        let meta = serde_json::from_str::<FileMetadata>(&text)
            .with_context(|| format!("parse json {text:?}"))?;
        log::info!("Uploaded as {}", meta.name);
        Ok(meta)
    }

    /// Create a share link for an uploaded path, reusing the existing link
    /// when Dropbox reports one already exists.
    pub async fn share_link(&self, path: &str) -> Result<String> {
        let (status, text) = self
            .rpc(
                "/sharing/create_shared_link_with_settings",
                &json!({ "path": path }),
            )
            .await?;
        if status.is_success() {
            let link: SharedLink =
                serde_json::from_str(&text).with_context(|| format!("parse json {text:?}"))?;
            return Ok(link.url);
        }
        if status == StatusCode::CONFLICT && text.contains("shared_link_already_exists") {
            let (status, text) = self
                .rpc(
                    "/sharing/list_shared_links",
                    &json!({ "path": path, "direct_only": true }),
                )
                .await?;
            if status.is_success() {
                let res: ListSharedLinksResponse =
                    serde_json::from_str(&text).with_context(|| format!("parse json {text:?}"))?;
                if let Some(link) = res.links.into_iter().next() {
                    return Ok(link.url);
                }
            }
            bail!("share link for {path} exists but could not be listed: {status} {text}");
        }
        log::error!("Dropbox share link failed: {status} {text}");
        bail!("share link for {path}: {status} {text}");
    }

    async fn rpc(&self, resource: &str, body: &serde_json::Value) -> Result<(StatusCode, String)> {
        let res = self
            .client
            .post(format!("{API_BASE}{resource}"))
            .header(header::AUTHORIZATION, format!("Bearer {}", self.token))
            .json(body)
            .send()
            .await
            .context("request")?;
        let status = res.status();
        let text = res.text().await.context("parse text error")?;
        Ok((status, text))
    }
}

#[async_trait]
impl FileStore for Dropbox {
    async fn upload_and_share(
        &self,
        local: &Path,
        folder: &str,
        subfolder: &str,
        overwrite: bool,
    ) -> Result<UploadResult> {
        let name = local
            .file_name()
            .and_then(|n| n.to_str())
            .with_context(|| format!("{} has no usable file name", local.display()))?;
        let meta = self.upload(local, folder, subfolder, name, overwrite).await?;
        let path = meta
            .path_display
            .or(meta.path_lower)
            .unwrap_or_else(|| remote_path(folder, subfolder, name));
        let url = self.share_link(&path).await?;
        Ok(UploadResult {
            path,
            url,
            client_modified: meta.client_modified,
        })
    }
}

/// Join folder/subfolder/name into an absolute remote path, collapsing any
/// duplicate separators.
pub fn remote_path(folder: &str, subfolder: &str, name: &str) -> String {
    let mut path = format!("/{folder}/{subfolder}/{name}");
    while path.contains("//") {
        path = path.replace("//", "/");
    }
    path
}

/// Local mtime as UTC, truncated to whole seconds.
fn client_modified(mtime: SystemTime) -> String {
    let time: DateTime<Utc> = mtime.into();
    time.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}
