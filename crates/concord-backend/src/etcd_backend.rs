use async_trait::async_trait;
use serde::Deserialize;

use crate::backend::{Backend, CancellationToken, Cas, Version};
use crate::error::BackendError;

/// `Backend` over etcd's v2 HTTP API, using its native `modifiedIndex` CAS
/// (`PUT ?prevIndex=N`, `PUT ?prevExist=false` for create-only).
pub struct EtcdBackend {
    http: reqwest::Client,
    base_url: String,
}

impl EtcdBackend {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    fn key_url(&self, key: &str) -> String {
        format!("{}/v2/keys/{}", self.base_url.trim_end_matches('/'), key)
    }
}

#[derive(Debug, Deserialize)]
struct EtcdNode {
    value: Option<String>,
    #[serde(rename = "modifiedIndex")]
    modified_index: u64,
}

#[derive(Debug, Deserialize)]
struct EtcdResponse {
    node: EtcdNode,
}

fn transient(e: reqwest::Error) -> BackendError {
    BackendError::Transient(e.to_string())
}

#[async_trait]
impl Backend for EtcdBackend {
    async fn read(&self, key: &str) -> Result<(String, Version), BackendError> {
        let resp = self
            .http
            .get(self.key_url(key))
            .query(&[("quorum", "true")])
            .send()
            .await
            .map_err(transient)?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(BackendError::KeyMissing);
        }
        if !resp.status().is_success() {
            return Err(BackendError::Transient(format!(
                "etcd read returned {}",
                resp.status()
            )));
        }

        let body: EtcdResponse = resp.json().await.map_err(transient)?;
        let value = body.node.value.unwrap_or_default();
        Ok((value, Version(body.node.modified_index)))
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
            .query(&[("wait", "true"), ("waitIndex", &(since.0 + 1).to_string())])
            .send();

        tokio::select! {
            resp = request => {
                let resp = resp.map_err(transient)?;
                if resp.status() == reqwest::StatusCode::NOT_FOUND {
                    return Err(BackendError::KeyMissing);
                }
                if !resp.status().is_success() {
                    return Err(BackendError::Transient(format!(
                        "etcd watch returned {}",
                        resp.status()
                    )));
                }
                let body: EtcdResponse = resp.json().await.map_err(transient)?;
                let value = body.node.value.unwrap_or_default();
                Ok((value, Version(body.node.modified_index)))
            }
            _ = cancel.cancelled() => Err(BackendError::Cancelled),
        }
    }

    async fn write(&self, key: &str, value: &str, cas: Cas) -> Result<Version, BackendError> {
        let mut form = vec![("value".to_string(), value.to_string())];
        match cas {
            Cas::CreateOnly => form.push(("prevExist".to_string(), "false".to_string())),
            Cas::Version(v) => form.push(("prevIndex".to_string(), v.0.to_string())),
        }

        let resp = self
            .http
            .put(self.key_url(key))
            .form(&form)
            .send()
            .await
            .map_err(transient)?;

        if resp.status() == reqwest::StatusCode::PRECONDITION_FAILED {
            return Err(BackendError::Contended);
        }
        if !resp.status().is_success() {
            return Err(BackendError::Transient(format!(
                "etcd write returned {}",
                resp.status()
            )));
        }

        let body: EtcdResponse = resp.json().await.map_err(transient)?;
        Ok(Version(body.node.modified_index))
    }

    async fn delete(&self, key: &str, cas: Version) -> Result<(), BackendError> {
        let resp = self
            .http
            .delete(self.key_url(key))
            .query(&[("prevIndex", cas.0.to_string())])
            .send()
            .await
            .map_err(transient)?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(BackendError::KeyMissing);
        }
        if resp.status() == reqwest::StatusCode::PRECONDITION_FAILED {
            return Err(BackendError::Contended);
        }
        if !resp.status().is_success() {
            return Err(BackendError::Transient(format!(
                "etcd delete returned {}",
                resp.status()
            )));
        }
        Ok(())
    }
}
