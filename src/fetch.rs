use crate::api::Api;
use crate::browser::BrowserSession;
use crate::error::FetchError;
use crate::manga::chapter::PageImage;
use clap::ValueEnum;
use image::ImageFormat;
use indicatif::{ProgressBar, ProgressStyle};
use std::fs::{create_dir_all, write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// How page images are obtained.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum Capture {
    /// Download the image file as served.
    #[default]
    Direct,
    /// Render the image in headless Chromium and screenshot it as png.
    Browser,
}

#[derive(Debug)]
pub enum Fetcher {
    Direct(Api),
    Browser(BrowserSession),
}

/// Extensions pages are stored under, one per accepted format.
const PAGE_EXTENSIONS: [&str; 4] = ["png", "jpg", "gif", "webp"];

/// Canonical extension of a downloaded page, `None` unless it is a png,
/// jpeg, gif or webp image.
pub fn page_extension(data: &[u8]) -> Option<&'static str> {
    match image::guess_format(data).ok()? {
        ImageFormat::Png => Some("png"),
        ImageFormat::Jpeg => Some("jpg"),
        ImageFormat::Gif => Some("gif"),
        ImageFormat::WebP => Some("webp"),
        _ => None,
    }
}

fn page_stem(page: &PageImage) -> String {
    Path::new(&page.filename)
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| page.filename.clone())
}

impl Fetcher {
    /// A page stored by an earlier run. Direct pages may be in any accepted
    /// format, screenshots are always png.
    fn existing(&self, page: &PageImage, dir: &Path) -> Option<PathBuf> {
        let stem = page_stem(page);
        let extensions: &[&str] = match self {
            Fetcher::Direct(_) => &PAGE_EXTENSIONS,
            Fetcher::Browser(_) => &["png"],
        };
        extensions
            .iter()
            .map(|ext| dir.join(format!("{stem}.{ext}")))
            .find(|path| path.is_file())
    }

    /// The page's bytes and the extension they are stored under.
    async fn fetch(&self, page: &PageImage) -> Result<(Vec<u8>, &'static str), FetchError> {
        match self {
            Fetcher::Direct(api) => {
                let data = api.get_bytes(&page.url).await?;
                match page_extension(&data) {
                    Some(ext) => {
                        debug!(page = %page.filename, format = ext, "fetched page");
                        Ok((data, ext))
                    }
                    None => Err(FetchError::MissingAsset {
                        page: page.filename.clone(),
                    }),
                }
            }
            Fetcher::Browser(session) => tokio::task::block_in_place(|| session.capture(&page.url))
                .map(|data| (data, "png"))
                .map_err(|err| FetchError::Browser {
                    url: page.url.clone(),
                    reason: format!("{err:#}"),
                }),
        }
    }

    /// Fetches every page into `dir` in order, skipping pages already on
    /// disk. Returns the local path of every page either way.
    pub async fn download(&self, pages: &[PageImage], dir: &Path) -> Result<Vec<PathBuf>, FetchError> {
        create_dir_all(dir).map_err(|source| FetchError::CreateDir {
            path: dir.to_path_buf(),
            source,
        })?;

        info!("Pages to download: {}", pages.len());
        let pages_bar = ProgressBar::new(pages.len() as u64)
            .with_message("Downloading Pages")
            .with_style(
                ProgressStyle::with_template(
                    "[{elapsed_precise}] {bar:40.cyan/blue} {pos:>7}/{len:7} {msg}",
                )
                .unwrap(),
            );

        let mut files = Vec::with_capacity(pages.len());
        for page in pages {
            let path = match self.existing(page, dir) {
                Some(path) => {
                    info!("{} already exists.", path.display());
                    path
                }
                None => {
                    let (data, ext) = self.fetch(page).await?;
                    let path = dir.join(format!("{}.{}", page_stem(page), ext));
                    write(&path, &data).map_err(|source| FetchError::Write {
                        path: path.clone(),
                        source,
                    })?;
                    path
                }
            };
            files.push(path);
            pages_bar.inc(1);
        }

        pages_bar.finish_and_clear();
        Ok(files)
    }
}
