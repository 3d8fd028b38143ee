use async_trait::async_trait;
use serde::Deserialize;

use crate::backend::{Backend, CancellationToken, Cas, Version};
use crate::error::BackendError;

/// `Backend` over the Consul KV HTTP API, using its `cas=<prior-index>`
/// semantics (`cas=0` for create-only, `?index=N&wait=...` for blocking
/// reads/watches).
pub struct ConsulBackend {
    http: reqwest::Client,
    base_url: String,
}

impl ConsulBackend {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    fn key_url(&self, key: &str) -> String {
        format!("{}/v1/kv/{}", self.base_url.trim_end_matches('/'), key)
    }
}

#[derive(Debug, Deserialize)]
struct ConsulEntry {
    #[serde(rename = "ModifyIndex")]
    modify_index: u64,
    #[serde(rename = "Value")]
    value: Option<String>,
}

fn decode_value(entry: &ConsulEntry) -> Result<String, BackendError> {
    match &entry.value {
        None => Ok(String::new()),
        Some(encoded) => {
            use base64::Engine;
            let bytes = base64::engine::general_purpose::STANDARD
                .decode(encoded)
                .map_err(|e| BackendError::Other(format!("bad base64 from consul: {e}")))?;
            String::from_utf8(bytes)
                .map_err(|e| BackendError::Other(format!("non-utf8 value from consul: {e}")))
        }
    }
}

fn transient(e: reqwest::Error) -> BackendError {
    BackendError::Transient(e.to_string())
}

async fn fetch_one(
    resp: reqwest::Response,
) -> Result<(String, Version), BackendError> {
    if resp.status() == reqwest::StatusCode::NOT_FOUND {
        return Err(BackendError::KeyMissing);
    }
    if !resp.status().is_success() {
        return Err(BackendError::Transient(format!(
            "consul returned {}",
            resp.status()
        )));
    }
    let entries: Vec<ConsulEntry> = resp.json().await.map_err(transient)?;
    let entry = entries.first().ok_or(BackendError::KeyMissing)?;
    let value = decode_value(entry)?;
    Ok((value, Version(entry.modify_index)))
}

#[async_trait]
impl Backend for ConsulBackend {
    async fn read(&self, key: &str) -> Result<(String, Version), BackendError> {
        let resp = self
            .http
            .get(self.key_url(key))
            .send()
            .await
            .map_err(transient)?;
        fetch_one(resp).await
    }

    async fn watch(
        &self,
        key: &str,
        since: Version,
        cancel: &CancellationToken,
    ) -> Result<(String, Version), BackendError> {
        let request = self
            .http
            .get(self.key_url(key))
            .query(&[("index", since.0.to_string()), ("wait", "60s".to_string())])
            .send();

        tokio::select! {
            resp = request => fetch_one(resp.map_err(transient)?).await,
            _ = cancel.cancelled() => Err(BackendError::Cancelled),
        }
    }

    async fn write(&self, key: &str, value: &str, cas: Cas) -> Result<Version, BackendError> {
        let cas_param = match cas {
            Cas::CreateOnly => "0".to_string(),
            Cas::Version(v) => v.0.to_string(),
        };

        let resp = self
            .http
            .put(self.key_url(key))
            .query(&[("cas", cas_param)])
            .body(value.to_string())
            .send()
            .await
            .map_err(transient)?;

        if !resp.status().is_success() {
            return Err(BackendError::Transient(format!(
                "consul write returned {}",
                resp.status()
            )));
        }
        let accepted: bool = resp.json().await.map_err(transient)?;
        if !accepted {
            return Err(BackendError::Contended);
        }

        let (_, version) = self.read(key).await?;
        Ok(version)
    }

    async fn delete(&self, key: &str, cas: Version) -> Result<(), BackendError> {
        let resp = self
            .http
            .delete(self.key_url(key))
            .query(&[("cas", cas.0.to_string())])
            .send()
            .await
            .map_err(transient)?;

        if !resp.status().is_success() {
            return Err(BackendError::Transient(format!(
                "consul delete returned {}",
                resp.status()
            )));
        }
        let accepted: bool = resp.json().await.map_err(transient)?;
        if !accepted {
            return Err(BackendError::Contended);
        }
        Ok(())
    }
}
