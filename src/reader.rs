//! Old style online readers that show one page per url, with the page
//! count in a drop down and every image stored under the same directory.

use crate::api::Api;
use crate::error::ApiError;
use crate::manga::chapter::PageImage;
use scraper::{Html, Selector};
use url::Url;

fn malformed(page_url: &Url, reason: impl Into<String>) -> ApiError {
    ApiError::Malformed {
        what: format!("reader page {page_url}"),
        reason: reason.into(),
    }
}

fn selector(css: &str, page_url: &Url) -> Result<Selector, ApiError> {
    Selector::parse(css).map_err(|err| malformed(page_url, format!("selector {css}: {err}")))
}

/// Derives every page image of the chapter from the first page's html.
pub fn parse_reader(html: &str, page_url: &Url) -> Result<Vec<PageImage>, ApiError> {
    let doc = Html::parse_document(html);

    let source = doc
        .select(&selector("img#current_page", page_url)?)
        .next()
        .and_then(|img| img.value().attr("src"))
        .ok_or_else(|| malformed(page_url, "no img#current_page"))?;

    // The first page is numbered 1, anything after the number is a suffix
    // such as the extension.
    let position = source
        .rfind('1')
        .ok_or_else(|| malformed(page_url, format!("no page number in {source:?}")))?;
    let (base, post) = (&source[..position], &source[position + 1..]);

    let option = selector("option", page_url)?;
    let pages = doc
        .select(&selector("div.col-md-2", page_url)?)
        .next()
        .map(|menu| menu.select(&option).count())
        .ok_or_else(|| malformed(page_url, "no page drop down"))?;

    (1..=pages)
        .map(|i| -> Result<PageImage, ApiError> {
            let url = page_url
                .join(&format!("{base}{i}{post}"))
                .map_err(|err| malformed(page_url, err.to_string()))?;
            let filename = url
                .path_segments()
                .and_then(|mut segments| segments.next_back())
                .filter(|name| !name.is_empty())
                .map(String::from)
                .ok_or_else(|| malformed(page_url, format!("no file name in {url}")))?;
            Ok(PageImage {
                url: url.to_string(),
                filename,
            })
        })
        .collect()
}

pub async fn page_images(api: &Api, page_url: &Url) -> Result<Vec<PageImage>, ApiError> {
    let html = api.get_text(page_url.as_str()).await?;
    parse_reader(&html, page_url)
}
