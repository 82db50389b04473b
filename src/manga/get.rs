use super::chapter::PageImage;
use super::choose::{Choose, FirstListed, Interactive};
use crate::api::{constants, Api};
use crate::archive::{Archiver, Format};
use crate::browser::BrowserSession;
use crate::fetch::{Capture, Fetcher};
use crate::reader;
use crate::target::Target;
use anyhow::{bail, Context, Result};
use clap::Parser;
use std::fs::{create_dir_all, remove_dir};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, error, info, warn};
use url::Url;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct GetManga {
    /// Url of the chapter (or with --all the series) to download. A bare
    /// mangadex id works too.
    pub url: Target,

    /// Download every chapter of the series, archiving and cleaning each
    #[arg(short, long)]
    pub all: bool,

    /// Remove the page images once they are archived
    #[arg(short, long)]
    pub clean: bool,

    /// Archive the pages under NAME, relative to --directory
    #[arg(short, long, value_name = "NAME")]
    pub rar: Option<PathBuf>,

    /// Archive the pages under a name derived from the chapter
    #[arg(long, conflicts_with = "rar")]
    pub archive: bool,

    /// Where page images and archives are written
    #[arg(short, long, default_value = ".")]
    pub directory: PathBuf,

    /// Language of the chapters kept with --all
    #[arg(long, default_value = "gb")]
    pub language: String,

    /// Ask which scan group to keep when a chapter was released more than
    /// once, instead of keeping the first
    #[arg(short, long)]
    pub interactive: bool,

    /// How page images are obtained
    #[arg(long, value_enum, default_value_t = Capture::Direct)]
    pub capture: Capture,

    /// Seconds the browser waits for a page before giving up
    #[arg(long, default_value_t = 20)]
    pub browser_timeout: u64,

    #[arg(long, value_enum, default_value_t = Format::Rar)]
    pub format: Format,

    /// Archiving program, with any leading arguments
    #[arg(long, env = "MANGADEX_ARCHIVER", default_value = "rar")]
    pub archiver: String,

    #[arg(long, env = "MANGADEX_API_BASE", default_value = constants::API_BASE)]
    pub api_base: Url,

    #[arg(long, env = "MANGADEX_SITE_BASE", default_value = constants::SITE_BASE)]
    pub site_base: Url,

    #[arg(short, long)]
    pub verbose: bool,
}

/// Which archive, if any, a chapter ends up in.
#[derive(Debug, Clone, Copy)]
pub enum ArchiveName<'a> {
    None,
    Derived,
    Named(&'a Path),
}

/// What happened to a chapter.
#[derive(Debug, PartialEq)]
pub enum Outcome {
    /// The archive was already on disk, nothing was fetched.
    AlreadyArchived(PathBuf),
    Fetched {
        files: Vec<PathBuf>,
        archive: Option<PathBuf>,
    },
}

impl GetManga {
    pub async fn get(&self) -> Result<()> {
        info!("Downloading {}", self.url);
        let api = Api::new(self.api_base.clone(), self.site_base.clone())?;
        let fetcher = match self.capture {
            Capture::Direct => Fetcher::Direct(api.clone()),
            Capture::Browser => Fetcher::Browser(
                BrowserSession::launch(Duration::from_secs(self.browser_timeout))
                    .context("Starting the browser")?,
            ),
        };
        let downloader = Downloader::new(
            api,
            fetcher,
            Archiver::new(self.format, &self.archiver),
            self.directory.clone(),
        )?;

        let archive = match (&self.rar, self.archive) {
            (Some(name), _) => ArchiveName::Named(name),
            (None, true) => ArchiveName::Derived,
            (None, false) => ArchiveName::None,
        };

        if self.all {
            if self.rar.is_some() || self.archive {
                warn!("--rar and --archive are ignored with --all, every chapter gets its own archive");
            }
            let mut chooser: Box<dyn Choose> = if self.interactive {
                Box::new(Interactive)
            } else {
                Box::new(FirstListed)
            };
            return downloader
                .series(self.url.series_id()?, &self.language, chooser.as_mut())
                .await;
        }

        let outcome = match &self.url {
            Target::Chapter(id) | Target::Id(id) => {
                downloader.chapter(id, archive, self.clean).await?
            }
            Target::Reader(url) => downloader.reader(url, archive, self.clean).await?,
            Target::Series(id) => bail!("{} is a series, pass --all to download it", id),
        };
        debug!(?outcome, "done");
        Ok(())
    }
}

/// Runs chapters through fetching and archiving. Owns the browser session
/// when one is used, so it is released when the downloader is dropped.
#[derive(Debug)]
pub struct Downloader {
    api: Api,
    fetcher: Fetcher,
    archiver: Archiver,
    directory: PathBuf,
}

impl Downloader {
    pub fn new(api: Api, fetcher: Fetcher, archiver: Archiver, directory: PathBuf) -> Result<Self> {
        create_dir_all(&directory)
            .with_context(|| format!("Creation of {} failed", directory.display()))?;
        Ok(Self {
            api,
            fetcher,
            archiver,
            directory,
        })
    }

    fn archive_path(&self, stem: &str) -> PathBuf {
        self.directory
            .join(format!("{}.{}", stem, self.archiver.extension()))
    }

    async fn fetch_and_archive(
        &self,
        images: &[PageImage],
        image_dir: &Path,
        target: Option<PathBuf>,
        clean: bool,
    ) -> Result<Outcome> {
        let files = self.fetcher.download(images, image_dir).await?;
        if let Some(target) = &target {
            self.archiver.archive(&files, target, clean)?;
        }
        Ok(Outcome::Fetched {
            files,
            archive: target,
        })
    }

    /// Single chapter: resolve pages, fetch them, then archive if asked.
    pub async fn chapter(&self, id: &str, archive: ArchiveName<'_>, clean: bool) -> Result<Outcome> {
        if let ArchiveName::Named(name) = archive {
            let target = self.directory.join(name);
            if target.exists() {
                info!("Archive '{}' already exists.", target.display());
                return Ok(Outcome::AlreadyArchived(target));
            }
        }

        let pages = self
            .api
            .chapter(id)
            .await
            .with_context(|| format!("Fetching metadata of chapter {id}"))?
            .with_context(|| format!("Chapter {id} is not available"))?;

        let target = match archive {
            ArchiveName::None => None,
            ArchiveName::Named(name) => Some(self.directory.join(name)),
            ArchiveName::Derived => {
                let target = self.archive_path(&pages.archive_stem());
                if target.exists() {
                    info!("Archive '{}' already exists.", target.display());
                    return Ok(Outcome::AlreadyArchived(target));
                }
                Some(target)
            }
        };

        self.fetch_and_archive(&pages.images(), &self.directory, target, clean)
            .await
            .with_context(|| format!("Downloading chapter {id}"))
    }

    /// Every chapter of a series, one after the other. Each chapter is
    /// fetched into its own directory, archived and cleaned up. A failing
    /// chapter does not stop the others.
    pub async fn series(&self, id: &str, language: &str, chooser: &mut dyn Choose) -> Result<()> {
        let mut manga = self
            .api
            .manga(id, language)
            .await
            .with_context(|| format!("Listing chapters of series {id}"))?;
        info!(
            "Found {} chapters of {}",
            manga.chapters().len(),
            manga.title().unwrap_or(manga.id())
        );
        manga.dedup(chooser)?;

        let total = manga.chapters().len();
        let mut failed = 0;
        for (index, info) in manga.chapters().iter().enumerate() {
            info!("Chapter {} of {}: {}", index + 1, total, info.label());
            let stem = info.archive_stem();
            let target = self.archive_path(&stem);
            if target.exists() {
                info!("Archive '{}' already exists.", target.display());
                continue;
            }

            let image_dir = self.directory.join(&stem);
            debug!(chapter = %info.id, language = %info.language, dir = %image_dir.display(), "resolving pages");
            let result = async {
                let pages = self
                    .api
                    .chapter(&info.id)
                    .await?
                    .with_context(|| format!("Chapter {} is not available", info.id))?;
                self.fetch_and_archive(&pages.images(), &image_dir, Some(target), true)
                    .await
            }
            .await;

            match result {
                Ok(_) => {
                    if let Err(err) = remove_dir(&image_dir) {
                        debug!("Leaving {}: {}", image_dir.display(), err);
                    }
                }
                Err(err) => {
                    error!("Chapter {} ({}) failed: {:#}", info.chapter, info.id, err);
                    failed += 1;
                }
            }
        }

        if failed > 0 {
            bail!("{} of {} chapters failed", failed, total);
        }
        info!("Downloaded {} chapters", total);
        Ok(())
    }

    /// Old style reader page. Only an explicit archive name can be used.
    pub async fn reader(&self, url: &Url, archive: ArchiveName<'_>, clean: bool) -> Result<Outcome> {
        let target = match archive {
            ArchiveName::None => None,
            ArchiveName::Derived => bail!("Reader pages need an archive name, use --rar NAME"),
            ArchiveName::Named(name) => {
                let target = self.directory.join(name);
                if target.exists() {
                    info!("Archive '{}' already exists.", target.display());
                    return Ok(Outcome::AlreadyArchived(target));
                }
                Some(target)
            }
        };

        let images = reader::page_images(&self.api, url)
            .await
            .with_context(|| format!("Reading {url}"))?;
        self.fetch_and_archive(&images, &self.directory, target, clean)
            .await
    }
}
