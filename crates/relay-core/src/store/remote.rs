use async_trait::async_trait;
use reqwest::{header::CONTENT_TYPE, StatusCode};
use tracing::debug;

use super::{LinkStore, StoreSnapshot};
use crate::{errors::Error, Result};

/// Single JSON document held by a remote HTTP document service.
///
/// `GET <url>` returns the document (404 = nothing stored yet) and
/// `PUT <url>` replaces it. An optional bearer token is sent on both.
pub struct RemoteDocumentStore {
    client: reqwest::Client,
    url: String,
    token: Option<String>,
}

impl RemoteDocumentStore {
    pub fn new(url: String, token: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(15))
            .build()
            .map_err(|e| Error::Config(format!("failed to build store http client: {e}")))?;
        Ok(Self { client, url, token })
    }

    fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(t) => req.bearer_auth(t),
            None => req,
        }
    }

    fn map_err(&self, e: reqwest::Error) -> Error {
        Error::Persistence(format!("{}: {e}", self.url))
    }
}

#[async_trait]
impl LinkStore for RemoteDocumentStore {
    fn name(&self) -> &'static str {
        "remote"
    }

    async fn load(&self) -> Result<StoreSnapshot> {
        let resp = self
            .authorize(self.client.get(&self.url))
            .send()
            .await
            .map_err(|e| self.map_err(e))?;

        if resp.status() == StatusCode::NOT_FOUND {
            debug!(url = %self.url, "remote relay document not found; starting empty");
            return Ok(StoreSnapshot::default());
        }
        let resp = resp.error_for_status().map_err(|e| self.map_err(e))?;
        let bytes = resp.bytes().await.map_err(|e| self.map_err(e))?;

        StoreSnapshot::from_json(&bytes)
            .map_err(|e| Error::Persistence(format!("{}: {e}", self.url)))
    }

    async fn save(&self, snapshot: &StoreSnapshot) -> Result<()> {
        let body = snapshot.to_json()?;
        self.authorize(self.client.put(&self.url))
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| self.map_err(e))?
            .error_for_status()
            .map_err(|e| self.map_err(e))?;
        Ok(())
    }
}
