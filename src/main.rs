use anyhow::{Context, Result};
use clap::Parser;
use std::process::ExitCode;

mod api;
mod archive;
mod browser;
mod error;
mod fetch;
mod logging;
mod manga;
mod reader;
mod target;
#[cfg(test)]
mod test_support;

use manga::get::GetManga;

#[tokio::main]
async fn main() -> ExitCode {
    let manga = GetManga::parse();

    if let Err(err) = run(manga).await {
        eprintln!("{err:#}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

async fn run(manga: GetManga) -> Result<()> {
    logging::init(manga.verbose).context("init logging")?;
    tracing::debug!(?manga, "parsed cli");

    manga.get().await
}
