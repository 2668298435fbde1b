use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::{RequestBuilder, Response};

use crate::error::RemoteError;
use crate::models::{RemoteKey, RemotePatch, RemoteSnapshot};

use super::remote::RemoteStore;

const HTTP_TIMEOUT_MS: u64 = 8_000;

/// Show records stored in a Supabase table, reached through PostgREST.
pub struct SupabaseRemoteStore {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    table: String,
}

impl SupabaseRemoteStore {
    pub fn new(base_url: &str, api_key: &str, table: &str) -> Result<Self> {
        let base_url = base_url.trim().trim_end_matches('/');
        if base_url.is_empty() {
            return Err(anyhow!("supabase url is empty"));
        }
        if table.trim().is_empty() {
            return Err(anyhow!("remote table name is empty"));
        }

        let client = reqwest::Client::builder()
            .user_agent(concat!("show-timeline/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_millis(HTTP_TIMEOUT_MS))
            .build()
            .map_err(|err| anyhow!("failed to build supabase http client: {err}"))?;

        Ok(Self {
            client,
            base_url: base_url.to_string(),
            api_key: api_key.to_string(),
            table: table.trim().to_string(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/rest/v1/{}", self.base_url, self.table)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    async fn check_status(response: Response, op_name: &str) -> Result<Response, RemoteError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        log::debug!("{op_name} failed with status {status}");
        Err(RemoteError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

pub(crate) fn key_filter(key: &RemoteKey) -> [(&'static str, String); 2] {
    [
        ("show_id", format!("eq.{}", key.show_id)),
        ("host_id", format!("eq.{}", key.host_id)),
    ]
}

#[async_trait]
impl RemoteStore for SupabaseRemoteStore {
    async fn find(&self, key: &RemoteKey) -> Result<Option<RemoteSnapshot>, RemoteError> {
        let request = self
            .client
            .get(self.endpoint())
            .query(&key_filter(key))
            .query(&[("select", "id,metadata"), ("limit", "1")]);

        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|err| RemoteError::Unavailable(err.to_string()))?;
        let response = Self::check_status(response, "show record lookup").await?;

        let rows: Vec<RemoteSnapshot> = response
            .json()
            .await
            .map_err(|err| RemoteError::Decode(err.to_string()))?;
        Ok(rows.into_iter().next())
    }

    async fn partial_update(
        &self,
        key: &RemoteKey,
        patch: &RemotePatch,
    ) -> Result<(), RemoteError> {
        let request = self
            .client
            .patch(self.endpoint())
            .query(&key_filter(key))
            .header("Prefer", "return=minimal")
            .json(patch);

        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|err| RemoteError::Unavailable(err.to_string()))?;
        Self::check_status(response, "show record update").await?;
        Ok(())
    }
}
