use crate::error::ApiError;
use anyhow::{bail, Result};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::info;

pub mod chapter;
pub mod choose;
pub mod get;

use chapter::ChapterInfo;
use choose::Choose;

/// A series and the chapters we are going to download from it.
#[derive(Debug)]
pub struct Manga {
    id: String,
    title: Option<String>,
    chapters: Vec<ChapterInfo>,
}

#[derive(Debug, Deserialize)]
struct ListingPayload {
    #[serde(default)]
    manga: Option<MangaPayload>,
    #[serde(default)]
    chapter: BTreeMap<String, ListingEntry>,
}

#[derive(Debug, Deserialize)]
struct MangaPayload {
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListingEntry {
    volume: String,
    chapter: String,
    title: String,
    lang_code: String,
    group_name: String,
}

/// Numeric chapter order; releases of the same chapter stay in upload
/// (id) order.
pub fn sort_chapters(chapters: &mut [ChapterInfo]) {
    chapters.sort_by(|a, b| {
        a.number()
            .total_cmp(&b.number())
            .then_with(|| a.chapter.cmp(&b.chapter))
            .then_with(|| a.id.len().cmp(&b.id.len()))
            .then_with(|| a.id.cmp(&b.id))
    });
}

impl Manga {
    pub fn new(id: impl Into<String>, title: Option<String>, chapters: Vec<ChapterInfo>) -> Self {
        let mut chapters = chapters;
        sort_chapters(&mut chapters);
        Self {
            id: id.into(),
            title,
            chapters,
        }
    }

    /// Builds the listing from an `api/manga/{id}` response, keeping only
    /// chapters in `language`.
    pub fn from_response(id: &str, value: Value, language: &str) -> Result<Self, ApiError> {
        let what = format!("series {id} listing");
        match value.get("status").and_then(Value::as_str) {
            Some("OK") => {}
            status => {
                return Err(ApiError::Unsuccessful {
                    what,
                    status: status.unwrap_or_default().to_string(),
                })
            }
        }

        let payload: ListingPayload =
            serde_json::from_value(value).map_err(|err| ApiError::Malformed {
                what,
                reason: err.to_string(),
            })?;

        let chapters = payload
            .chapter
            .into_iter()
            .filter(|(_, entry)| entry.lang_code == language)
            .map(|(chapter_id, entry)| ChapterInfo {
                id: chapter_id,
                volume: entry.volume,
                chapter: entry.chapter,
                title: entry.title,
                language: entry.lang_code,
                group: entry.group_name,
            })
            .collect();

        Ok(Manga::new(id, payload.manga.and_then(|m| m.title), chapters))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn chapters(&self) -> &[ChapterInfo] {
        &self.chapters
    }

    /// Collapses releases of the same chapter number from several scan
    /// groups down to one, letting `chooser` pick. Relies on the chapters
    /// being sorted so that duplicates are consecutive.
    pub fn dedup(&mut self, chooser: &mut dyn Choose) -> Result<&mut Self> {
        let mut kept = Vec::with_capacity(self.chapters.len());
        let mut rest = std::mem::take(&mut self.chapters).into_iter().peekable();

        while let Some(first) = rest.next() {
            let mut run = vec![first];
            while let Some(next) = rest.next_if(|c| c.chapter == run[0].chapter) {
                run.push(next);
            }

            if run.len() > 1 {
                let groups: Vec<&str> = run.iter().map(|c| c.group.as_str()).collect();
                let pick = chooser.choose(&run[0].chapter, &groups)?;
                if pick >= run.len() {
                    bail!(
                        "Choice {} is out of range for chapter {}",
                        pick,
                        run[0].chapter
                    );
                }
                let chosen = run.swap_remove(pick);
                info!(
                    chapter = %chosen.chapter,
                    group = %chosen.group,
                    dropped = run.len(),
                    "kept one release of a duplicated chapter"
                );
                kept.push(chosen);
            } else {
                kept.append(&mut run);
            }
        }

        self.chapters = kept;
        Ok(self)
    }
}
