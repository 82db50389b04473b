use anyhow::{bail, Context};
use url::Url;

/// What the positional url on the command line points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// `/chapter/{id}` url.
    Chapter(String),
    /// `/title/{id}` or `/manga/{id}` url.
    Series(String),
    /// A bare id, its meaning depends on `--all`.
    Id(String),
    /// Any other web page, scraped as an old style reader page.
    Reader(Url),
}

impl Target {
    /// Picks the id to use for a series download.
    pub fn series_id(&self) -> anyhow::Result<&str> {
        match self {
            Target::Series(id) | Target::Id(id) => Ok(id.as_str()),
            Target::Chapter(id) => bail!("chapter {} is not a series, drop --all", id),
            Target::Reader(url) => bail!("{} is not a series url", url),
        }
    }
}

fn is_id(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Target::Chapter(id) => write!(f, "chapter {}", id),
            Target::Series(id) => write!(f, "series {}", id),
            Target::Id(id) => write!(f, "id {}", id),
            Target::Reader(url) => write!(f, "reader page {}", url),
        }
    }
}

impl std::str::FromStr for Target {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        if is_id(s) {
            return Ok(Target::Id(s.to_string()));
        }

        let url = Url::parse(s).with_context(|| format!("{:?} is not a url or id", s))?;
        if !matches!(url.scheme(), "http" | "https") {
            bail!("Unsupported url scheme {:?}", url.scheme());
        }

        let mut segments = url.path_segments().into_iter().flatten();
        while let Some(segment) = segments.next() {
            let kind: fn(String) -> Target = match segment {
                "chapter" => Target::Chapter,
                "title" | "manga" => Target::Series,
                _ => continue,
            };
            match segments.next() {
                Some(id) if is_id(id) => return Ok(kind(id.to_string())),
                _ => break,
            }
        }

        Ok(Target::Reader(url))
    }
}
