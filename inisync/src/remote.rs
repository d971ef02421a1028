//! HTTP implementation of [`CorpusReader`] for a Paratranz-style API.
//!
//! Two endpoints are used:
//!
//! - `GET {base}/projects/{project}/files` lists the project's files.
//! - `GET {base}/projects/{project}/files/{id}/translation` returns every
//!   entry of one file.
//!
//! Both send the token verbatim in the `Authorization` header. There is no
//! retry: any transport error, non-success status or undecodable body is a
//! [`Error::RemoteFetch`].

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::{
    error::Error,
    traits::CorpusReader,
    types::{RemoteEntry, SourceFile},
};

/// Default API root of the public Paratranz service.
pub const DEFAULT_BASE_URL: &str = "https://paratranz.cn/api";

/// Read-only client for one remote project.
#[derive(Debug, Clone)]
pub struct ParatranzClient {
    http: reqwest::Client,
    base_url: String,
    project_id: u64,
    token: String,
}

impl ParatranzClient {
    /// Creates a client for `project_id`. The token is sent as-is.
    pub fn new(
        base_url: impl Into<String>,
        project_id: u64,
        token: impl Into<String>,
    ) -> Result<Self, Error> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("inisync/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self::with_http_client(http, base_url, project_id, token))
    }

    /// Creates a client reusing an existing `reqwest::Client`.
    pub fn with_http_client(
        http: reqwest::Client,
        base_url: impl Into<String>,
        project_id: u64,
        token: impl Into<String>,
    ) -> Self {
        ParatranzClient {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            project_id,
            token: token.into(),
        }
    }

    pub fn project_id(&self) -> u64 {
        self.project_id
    }

    fn files_url(&self) -> String {
        format!("{}/projects/{}/files", self.base_url, self.project_id)
    }

    fn translation_url(&self, file_id: i64) -> String {
        format!("{}/{}/translation", self.files_url(), file_id)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, Error> {
        debug!(url, "GET");
        let response = self
            .http
            .get(url)
            .header(reqwest::header::AUTHORIZATION, &self.token)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::remote_fetch(
                format!("HTTP {} from {}: {}", status, url, body.trim()),
                None,
            ));
        }

        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| {
            Error::remote_fetch(
                format!("unexpected response body from {}", url),
                Some(Box::new(e)),
            )
        })
    }
}

#[async_trait]
impl CorpusReader for ParatranzClient {
    async fn list_files(&self) -> Result<Vec<SourceFile>, Error> {
        self.get_json(&self.files_url()).await
    }

    async fn get_entries(&self, file_id: i64) -> Result<Vec<RemoteEntry>, Error> {
        self.get_json(&self.translation_url(file_id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urls() {
        let client = ParatranzClient::new("https://paratranz.cn/api/", 8340, "token").unwrap();
        assert_eq!(client.files_url(), "https://paratranz.cn/api/projects/8340/files");
        assert_eq!(
            client.translation_url(17),
            "https://paratranz.cn/api/projects/8340/files/17/translation"
        );
        assert_eq!(client.project_id(), 8340);
    }

    #[test]
    fn test_file_listing_shape() {
        let json = r#"[
            {"id": 3, "name": "override-rules/pinyin.json", "folder": "override-rules",
             "createdAt": "2024-05-01T08:00:00.000Z", "total": 120}
        ]"#;
        let files: Vec<SourceFile> = serde_json::from_str(json).unwrap();
        assert_eq!(files[0].id, 3);
        assert_eq!(files[0].display_stem(), "pinyin");
    }

    #[test]
    fn test_translation_shape() {
        let json = r#"[
            {"id": 901, "key": "ui_ok", "original": "OK", "translation": "确定",
             "stage": 1, "context": null}
        ]"#;
        let entries: Vec<RemoteEntry> = serde_json::from_str(json).unwrap();
        assert_eq!(entries[0].id, 901);
        assert_eq!(entries[0].context, None);
    }

    #[tokio::test]
    async fn test_unreachable_host_is_remote_fetch() {
        let client = ParatranzClient::new("http://127.0.0.1:9", 1, "t").unwrap();
        let err = client.list_files().await.unwrap_err();
        assert!(matches!(err, Error::RemoteFetch { .. }));
    }
}
