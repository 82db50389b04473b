use crate::error::ApiError;
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;
use url::Url;

/// One entry of a series listing.
#[derive(Debug, Clone, PartialEq)]
pub struct ChapterInfo {
    pub id: String,
    pub volume: String,
    pub chapter: String,
    pub title: String,
    pub language: String,
    pub group: String,
}

impl ChapterInfo {
    /// Chapter numbers are strings like "10.5". Anything that is not a
    /// finite number (oneshots have "") sorts as chapter 0.
    pub fn number(&self) -> f64 {
        self.chapter
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|n| n.is_finite())
            .unwrap_or(0.0)
    }

    pub fn archive_stem(&self) -> String {
        archive_stem(&self.volume, &self.chapter, &self.title)
            .unwrap_or_else(|| format!("chapter-{}", self.id))
    }

    pub fn label(&self) -> String {
        let mut label = match self.volume.is_empty() {
            true => format!("Ch. {}", self.chapter),
            false => format!("Vol. {} Ch. {}", self.volume, self.chapter),
        };
        if !self.title.is_empty() {
            label.push_str(&format!(" - {}", self.title));
        }
        format!("{} [{}]", label, self.group)
    }
}

/// A page image to fetch and the name it is saved under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageImage {
    pub url: String,
    pub filename: String,
}

/// Everything needed to fetch the pages of a single chapter.
#[derive(Debug, Clone, PartialEq)]
pub struct ChapterPages {
    pub id: String,
    pub volume: String,
    pub chapter: String,
    pub title: String,
    /// Always absolute and ending in `/`.
    pub server: String,
    pub hash: String,
    pub pages: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ChapterPayload {
    volume: String,
    chapter: String,
    title: String,
    server: String,
    hash: String,
    page_array: Vec<String>,
}

impl ChapterPages {
    pub fn from_response(id: &str, value: Value, site: &Url) -> Result<Option<Self>, ApiError> {
        let what = format!("chapter {id} metadata");
        let status = value
            .get("status")
            .and_then(Value::as_str)
            .ok_or_else(|| ApiError::Malformed {
                what: what.clone(),
                reason: "missing status".into(),
            })?;

        if status != "OK" {
            warn!(chapter = id, status, "chapter is not available");
            return Ok(None);
        }

        let payload: ChapterPayload =
            serde_json::from_value(value).map_err(|err| ApiError::Malformed {
                what: what.clone(),
                reason: err.to_string(),
            })?;

        let server = absolute_server(&payload.server, site).ok_or_else(|| ApiError::Malformed {
            what,
            reason: format!("unusable server {:?}", payload.server),
        })?;

        Ok(Some(ChapterPages {
            id: id.to_string(),
            volume: payload.volume,
            chapter: payload.chapter,
            title: payload.title,
            server,
            hash: payload.hash,
            pages: payload.page_array,
        }))
    }

    pub fn images(&self) -> Vec<PageImage> {
        self.pages
            .iter()
            .map(|page| PageImage {
                url: format!("{}{}/{}", self.server, self.hash, page),
                filename: page.clone(),
            })
            .collect()
    }

    pub fn archive_stem(&self) -> String {
        archive_stem(&self.volume, &self.chapter, &self.title)
            .unwrap_or_else(|| format!("chapter-{}", self.id))
    }
}

/// Mangadex hands out either a full url or a site relative path such as
/// `/data/`.
fn absolute_server(server: &str, site: &Url) -> Option<String> {
    let url = if server.starts_with('/') {
        site.join(server).ok()?
    } else {
        Url::parse(server).ok()?
    };

    let mut server = url.to_string();
    if !server.ends_with('/') {
        server.push('/');
    }
    Some(server)
}

/// `v{volume}c{chapter}-{title}` built from whichever parts are present,
/// with spaces and path separators turned into underscores. `None` when
/// every part is empty.
pub fn archive_stem(volume: &str, chapter: &str, title: &str) -> Option<String> {
    let (volume, chapter, title) = (volume.trim(), chapter.trim(), title.trim());
    let mut stem = String::new();
    if !volume.is_empty() {
        stem.push_str(&format!("v{volume}"));
    }
    if !chapter.is_empty() {
        stem.push_str(&format!("c{chapter}"));
    }
    if !title.is_empty() {
        if !stem.is_empty() {
            stem.push('-');
        }
        stem.push_str(title);
    }

    if stem.is_empty() {
        None
    } else {
        Some(stem.replace([' ', '/', '\\'], "_"))
    }
}
