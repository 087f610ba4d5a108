//! SharePoint document library access through Microsoft Graph.
//!
//! Items are addressed by path (`/drives/{drive}/root:/{path}/{file}`); the
//! content hash lives in a custom column of the item's list entry.

pub mod auth;

use crate::config::SharePointConfig;
use crate::remote::{LogicalPath, RemoteLookup, RemoteStore, UploadMetadata};
use crate::utils::errors::{Result, SyncError};
use async_trait::async_trait;
use auth::GraphSession;
use bytes::Bytes;
use reqwest::header::CONTENT_TYPE;
use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

#[derive(Debug, Deserialize)]
struct DriveItem {
    id: String,
}

pub struct SharePointClient {
    client: reqwest::Client,
    session: GraphSession,
    base: Url,
    drive_id: String,
    hash_field: String,
}

impl SharePointClient {
    pub fn new(config: &SharePointConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()?;

        let base = Url::parse(&config.graph_url)
            .map_err(|e| SyncError::Config(format!("invalid graph_url '{}': {}", config.graph_url, e)))?;
        if base.cannot_be_a_base() {
            return Err(SyncError::Config(format!("invalid graph_url '{}'", config.graph_url)));
        }

        info!(site_id = %config.site_id, drive_id = %config.drive_id, "SharePoint client ready");

        Ok(Self {
            session: GraphSession::new(client.clone(), config),
            client,
            base,
            drive_id: config.drive_id.clone(),
            hash_field: config.hash_field.clone(),
        })
    }

    /// `{graph}/drives/{drive}/{segments...}`, each segment percent-encoded.
    fn drive_url<'s, I>(&self, segments: I) -> Url
    where
        I: IntoIterator<Item = &'s str>,
    {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().push("drives").push(&self.drive_id).extend(segments);
        }
        url
    }

    /// `root:/{path}/{name}` with an optional `:/{action}` suffix.
    fn path_url(&self, path: &LogicalPath, name: Option<&str>, action: Option<&str>) -> Url {
        let mut segments: Vec<String> = vec!["root:".to_string()];
        segments.extend(path.segments().iter().cloned());
        if let Some(name) = name {
            segments.push(name.to_string());
        }
        if let Some(action) = action {
            if let Some(last) = segments.last_mut() {
                last.push(':');
            }
            segments.push(action.to_string());
        }
        self.drive_url(segments.iter().map(String::as_str))
    }

    fn fields_url(&self, item_id: &str) -> Url {
        self.drive_url(["items", item_id, "listItem", "fields"])
    }

    fn children_url(&self, parent: Option<&LogicalPath>) -> Url {
        match parent {
            Some(parent) => self.path_url(parent, None, Some("children")),
            None => self.drive_url(["root", "children"]),
        }
    }

    /// Send an authorized request; on 401 the token is refreshed and the
    /// request sent once more.
    async fn send<F>(&self, build: F) -> Result<reqwest::Response>
    where
        F: Fn(&str) -> reqwest::RequestBuilder,
    {
        let token = self.session.token().await?;
        let response = build(&token).send().await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        warn!(url = %response.url(), "Graph rejected access token, refreshing");
        self.session.invalidate(&token).await;
        let token = self.session.token().await?;
        Ok(build(&token).send().await?)
    }

    async fn get_optional<T: DeserializeOwned>(&self, url: Url) -> Result<Option<T>> {
        let response = self
            .send(|token| self.client.get(url.clone()).bearer_auth(token))
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Ok(Some(read_json(response).await?))
    }

    async fn create_folder(&self, folder: &LogicalPath) -> Result<()> {
        let url = self.children_url(folder.parent().as_ref());
        let body = json!({
            "name": folder.name(),
            "folder": {},
            "@microsoft.graph.conflictBehavior": "fail",
        });

        let response = self
            .send(|token| self.client.post(url.clone()).bearer_auth(token).json(&body))
            .await?;

        match response.status() {
            status if status.is_success() => {
                info!(folder = %folder, "Created folder");
                Ok(())
            }
            StatusCode::CONFLICT => {
                debug!(folder = %folder, "Folder already exists");
                Ok(())
            }
            _ => Err(SyncError::from_response(response).await),
        }
    }

    async fn set_fields(&self, item_id: &str, fields: &Map<String, Value>) -> Result<()> {
        let url = self.fields_url(item_id);
        let response = self
            .send(|token| self.client.patch(url.clone()).bearer_auth(token).json(fields))
            .await?;

        if !response.status().is_success() {
            return Err(SyncError::from_response(response).await);
        }
        Ok(())
    }
}

async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    if !response.status().is_success() {
        return Err(SyncError::from_response(response).await);
    }
    let body = response.bytes().await?;
    Ok(serde_json::from_slice(&body)?)
}

#[async_trait]
impl RemoteStore for SharePointClient {
    async fn hash_at(&self, path: &LogicalPath, filename: &str) -> Result<RemoteLookup> {
        let item: Option<DriveItem> = self
            .get_optional(self.path_url(path, Some(filename), None))
            .await?;
        let Some(item) = item else {
            debug!(path = %path, file_name = filename, "File does not exist in SharePoint");
            return Ok(RemoteLookup::Missing);
        };

        let fields: Option<Map<String, Value>> = self.get_optional(self.fields_url(&item.id)).await?;
        let hash = fields
            .as_ref()
            .and_then(|f| f.get(&self.hash_field))
            .and_then(Value::as_str)
            .map(str::to_string);

        debug!(path = %path, file_name = filename, stored_hash = ?hash, "File exists in SharePoint");
        Ok(RemoteLookup::Present { hash })
    }

    async fn ensure_path(&self, path: &LogicalPath) -> Result<()> {
        let existing: Option<Value> = self.get_optional(self.path_url(path, None, None)).await?;
        if existing.is_some() {
            return Ok(());
        }

        for folder in path.ancestors() {
            let found: Option<Value> = self.get_optional(self.path_url(&folder, None, None)).await?;
            if found.is_none() {
                self.create_folder(&folder).await?;
            }
        }
        Ok(())
    }

    async fn upload(
        &self,
        path: &LogicalPath,
        filename: &str,
        content: Bytes,
        metadata: &UploadMetadata,
    ) -> Result<()> {
        let url = self.path_url(path, Some(filename), Some("content"));
        let size = content.len();

        let response = self
            .send(|token| {
                self.client
                    .put(url.clone())
                    .bearer_auth(token)
                    .header(CONTENT_TYPE, "application/octet-stream")
                    .body(content.clone())
            })
            .await?;
        let item: DriveItem = read_json(response).await?;

        self.set_fields(&item.id, &metadata.to_fields(&self.hash_field))
            .await?;

        info!(path = %path, file_name = filename, bytes = size, item_id = %item.id, "Uploaded file to SharePoint");
        Ok(())
    }
}
