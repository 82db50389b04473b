use crate::error::ApiError;
use crate::manga::chapter::ChapterPages;
use crate::manga::Manga;
use reqwest::Client;
use serde_json::Value;
use tracing::debug;
use url::Url;

pub mod constants {
    pub const API_BASE: &str = "https://mangadex.org/api/";
    pub const SITE_BASE: &str = "https://mangadex.org/";
    pub const USER_AGENT: &str = concat!("mangadex-dl/", env!("CARGO_PKG_VERSION"));
}

/// Thin wrapper over the mangadex json api. Cheap to clone, the
/// underlying connection pool is shared.
#[derive(Debug, Clone)]
pub struct Api {
    client: Client,
    base: Url,
    site: Url,
}

fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

impl Api {
    pub fn new(base: Url, site: Url) -> Result<Self, ApiError> {
        let client = Client::builder()
            .user_agent(constants::USER_AGENT)
            .build()
            .map_err(|source| ApiError::Http {
                url: base.to_string(),
                source,
            })?;

        Ok(Self {
            client,
            base: with_trailing_slash(base),
            site: with_trailing_slash(site),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        self.base.join(path).map_err(|err| ApiError::Malformed {
            what: format!("endpoint {path}"),
            reason: err.to_string(),
        })
    }

    async fn send(&self, url: &str) -> Result<(reqwest::StatusCode, Vec<u8>), ApiError> {
        debug!(url, "GET");
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| ApiError::Http {
                url: url.to_string(),
                source,
            })?;

        let status = resp.status();
        let bytes = resp.bytes().await.map_err(|source| ApiError::Http {
            url: url.to_string(),
            source,
        })?;
        Ok((status, bytes.to_vec()))
    }

    pub async fn get_bytes(&self, url: &str) -> Result<Vec<u8>, ApiError> {
        let (status, bytes) = self.send(url).await?;
        if !status.is_success() {
            return Err(ApiError::Status {
                url: url.to_string(),
                status,
            });
        }
        Ok(bytes)
    }

    pub async fn get_text(&self, url: &str) -> Result<String, ApiError> {
        let bytes = self.get_bytes(url).await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Json endpoints report failures in a `status` field, often alongside
    /// an error code. Such a body is handed on whatever the HTTP code.
    async fn get_json(&self, path: &str) -> Result<Value, ApiError> {
        let url = self.endpoint(path)?;
        let (status, bytes) = self.send(url.as_str()).await?;
        let parsed = serde_json::from_slice::<Value>(&bytes);

        if !status.is_success() {
            return match parsed {
                Ok(value) if value.get("status").is_some() => {
                    debug!(%url, %status, "error code with a status body");
                    Ok(value)
                }
                _ => Err(ApiError::Status {
                    url: url.to_string(),
                    status,
                }),
            };
        }

        parsed.map_err(|err| ApiError::Malformed {
            what: format!("response from {url}"),
            reason: err.to_string(),
        })
    }

    /// Per chapter metadata. `None` when mangadex says the chapter is not
    /// available (deleted, delayed, external, ...).
    pub async fn chapter(&self, id: &str) -> Result<Option<ChapterPages>, ApiError> {
        let value = self.get_json(&format!("chapter/{id}")).await?;
        ChapterPages::from_response(id, value, &self.site)
    }

    /// Every chapter of a series in `language`, sorted by chapter number.
    pub async fn manga(&self, id: &str, language: &str) -> Result<Manga, ApiError> {
        let value = self.get_json(&format!("manga/{id}")).await?;
        Manga::from_response(id, value, language)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::StubServer;

    fn api_for(server: &StubServer) -> anyhow::Result<Api> {
        Ok(Api::new(
            Url::parse(&format!("{}/api", server.base()))?,
            Url::parse(&server.base())?,
        )?)
    }

    #[test]
    fn base_urls_get_a_trailing_slash() -> anyhow::Result<()> {
        let api = Api::new(
            Url::parse("https://mangadex.org/api")?,
            Url::parse("https://mangadex.org")?,
        )?;
        assert_eq!(api.endpoint("chapter/1")?.as_str(), "https://mangadex.org/api/chapter/1");
        assert_eq!(api.site.as_str(), "https://mangadex.org/");
        Ok(())
    }

    #[tokio::test]
    async fn http_errors_are_reported() -> anyhow::Result<()> {
        let server = StubServer::start(vec![]);
        let api = api_for(&server)?;
        let err = api.chapter("1").await.unwrap_err();
        assert!(matches!(err, ApiError::Status { status, .. } if status.as_u16() == 404));
        Ok(())
    }

    #[tokio::test]
    async fn unavailable_chapter_is_none() -> anyhow::Result<()> {
        let server = StubServer::start(vec![(
            "/api/chapter/9",
            br#"{"id": 9, "status": "deleted"}"#.to_vec(),
        )]);
        let api = api_for(&server)?;
        assert!(api.chapter("9").await?.is_none());
        assert_eq!(server.hits(), vec!["/api/chapter/9".to_string()]);
        Ok(())
    }

    #[tokio::test]
    async fn error_code_with_status_body_is_unavailable() -> anyhow::Result<()> {
        let server = StubServer::start_with_status(vec![(
            "/api/chapter/5",
            410,
            br#"{"id": 5, "status": "deleted"}"#.to_vec(),
        )]);
        let api = api_for(&server)?;
        assert!(api.chapter("5").await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn error_code_with_status_body_fails_the_listing() -> anyhow::Result<()> {
        let server = StubServer::start_with_status(vec![(
            "/api/manga/3",
            404,
            br#"{"status": "Manga ID does not exist."}"#.to_vec(),
        )]);
        let api = api_for(&server)?;
        let err = api.manga("3", "gb").await.unwrap_err();
        assert!(matches!(err, ApiError::Unsuccessful { .. }));
        Ok(())
    }

    #[tokio::test]
    async fn error_code_without_status_body_is_reported() -> anyhow::Result<()> {
        let server = StubServer::start_with_status(vec![(
            "/api/chapter/6",
            503,
            br#"{"message": "maintenance"}"#.to_vec(),
        )]);
        let api = api_for(&server)?;
        let err = api.chapter("6").await.unwrap_err();
        assert!(matches!(err, ApiError::Status { status, .. } if status.as_u16() == 503));
        Ok(())
    }

    #[tokio::test]
    async fn not_json_is_malformed() -> anyhow::Result<()> {
        let server = StubServer::start(vec![("/api/manga/3", b"<html></html>".to_vec())]);
        let api = api_for(&server)?;
        let err = api.manga("3", "gb").await.unwrap_err();
        assert!(matches!(err, ApiError::Malformed { .. }));
        Ok(())
    }
}
