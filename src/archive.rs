use crate::error::ArchiveError;
use clap::ValueEnum;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info, warn};
use zip::write::SimpleFileOptions;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum Format {
    /// Hand the pages to an external `rar` compatible program.
    #[default]
    Rar,
    /// Write a zip based comic archive ourselves.
    Cbz,
}

impl Format {
    pub fn extension(self) -> &'static str {
        match self {
            Format::Rar => "cbr",
            Format::Cbz => "cbz",
        }
    }
}

/// What `Archiver::archive` ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Archived {
    Created,
    AlreadyExists,
}

#[derive(Debug, Clone)]
pub struct Archiver {
    format: Format,
    /// Program followed by any leading arguments, e.g. `rar` or
    /// `rar -idq`.
    command: Vec<String>,
}

fn io_err(path: &Path) -> impl FnOnce(io::Error) -> ArchiveError + '_ {
    move |source| ArchiveError::Io {
        path: path.to_path_buf(),
        source,
    }
}

impl Archiver {
    pub fn new(format: Format, command: &str) -> Self {
        Self {
            format,
            command: command.split_whitespace().map(String::from).collect(),
        }
    }

    pub fn extension(&self) -> &'static str {
        self.format.extension()
    }

    /// Bundles `files` into `target`, removing them afterwards when `clean`
    /// is set. Nothing is touched unless every file is present, and an
    /// existing `target` is left alone.
    pub fn archive(&self, files: &[PathBuf], target: &Path, clean: bool) -> Result<Archived, ArchiveError> {
        if target.exists() {
            info!("Archive '{}' already exists.", target.display());
            return Ok(Archived::AlreadyExists);
        }

        let missing: Vec<PathBuf> = files.iter().filter(|f| !f.is_file()).cloned().collect();
        if !missing.is_empty() {
            warn!("Aborting archive {}", target.display());
            for page in &missing {
                warn!("Missing: {}", page.display());
            }
            return Err(ArchiveError::Incomplete { missing });
        }

        match self.format {
            Format::Rar => self.run_external(files, target)?,
            Format::Cbz => write_cbz(files, target)?,
        }
        info!("Created {}", target.display());

        if clean {
            for file in files {
                fs::remove_file(file).map_err(io_err(file))?;
            }
            debug!("Removed {} page files", files.len());
        }

        Ok(Archived::Created)
    }

    fn run_external(&self, files: &[PathBuf], target: &Path) -> Result<(), ArchiveError> {
        let (program, leading) = match self.command.split_first() {
            Some((program, leading)) => (program.as_str(), leading),
            None => ("rar", &[][..]),
        };

        let target = if target.is_absolute() {
            target.to_path_buf()
        } else {
            std::env::current_dir()
                .map_err(io_err(target))?
                .join(target)
        };

        // Run from the pages' directory so the archive holds bare page names.
        let mut command = Command::new(program);
        command.args(leading).arg("a").arg(&target);
        let parent = files.first().and_then(|f| f.parent());
        match parent {
            Some(dir) if files.iter().all(|f| f.parent() == Some(dir)) => {
                if !dir.as_os_str().is_empty() {
                    command.current_dir(dir);
                }
                command.args(files.iter().filter_map(|f| f.file_name()));
            }
            _ => {
                command.args(files);
            }
        }

        debug!(?command, "running archiver");
        let status = command.status().map_err(|source| ArchiveError::Spawn {
            program: program.to_string(),
            source,
        })?;

        if !status.success() {
            // Never leave a half written archive behind, it would be taken
            // as complete on the next run.
            if target.exists() {
                fs::remove_file(&target).map_err(io_err(&target))?;
            }
            return Err(ArchiveError::Failed {
                program: program.to_string(),
                status,
            });
        }
        Ok(())
    }
}

/// Writes to a sibling `.part` file first and renames once complete.
fn write_cbz(files: &[PathBuf], target: &Path) -> Result<(), ArchiveError> {
    let partial = target.with_extension("part");
    let zip_err = |source| ArchiveError::Zip {
        path: target.to_path_buf(),
        source,
    };

    let out_file = File::create(&partial).map_err(io_err(&partial))?;
    let mut zip = zip::ZipWriter::new(out_file);
    let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);

    let result = (|| -> Result<(), ArchiveError> {
        for file in files {
            let name = file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            zip.start_file(name, options).map_err(zip_err)?;
            let mut page = File::open(file).map_err(io_err(file))?;
            io::copy(&mut page, &mut zip).map_err(io_err(file))?;
        }
        zip.finish().map_err(zip_err)?;
        Ok(())
    })();

    if let Err(err) = result {
        let _ = fs::remove_file(&partial);
        return Err(err);
    }
    fs::rename(&partial, target).map_err(io_err(target))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    fn pages(dir: &Path, names: &[&str]) -> anyhow::Result<Vec<PathBuf>> {
        names
            .iter()
            .map(|name| {
                let path = dir.join(name);
                fs::write(&path, name.as_bytes())?;
                Ok(path)
            })
            .collect()
    }

    #[test]
    fn missing_pages_abort_without_side_effects() -> anyhow::Result<()> {
        let tmp = tempfile::tempdir()?;
        let mut files = pages(tmp.path(), &["1.png"])?;
        files.push(tmp.path().join("2.jpg"));
        files.push(tmp.path().join("3.jpg"));
        let target = tmp.path().join("c1.cbz");

        let err = Archiver::new(Format::Cbz, "rar")
            .archive(&files, &target, true)
            .unwrap_err();

        match err {
            ArchiveError::Incomplete { missing } => {
                assert_eq!(missing, vec![tmp.path().join("2.jpg"), tmp.path().join("3.jpg")])
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(tmp.path().join("1.png").exists());
        assert!(!target.exists());
        assert!(!target.with_extension("part").exists());
        Ok(())
    }

    #[test]
    fn cbz_holds_every_page_and_cleans() -> anyhow::Result<()> {
        let tmp = tempfile::tempdir()?;
        let files = pages(tmp.path(), &["1.png", "2.jpg"])?;
        let target = tmp.path().join("c12-Arrival.cbz");

        let done = Archiver::new(Format::Cbz, "rar").archive(&files, &target, true)?;
        assert_eq!(done, Archived::Created);
        assert!(files.iter().all(|f| !f.exists()));

        let mut zip = zip::ZipArchive::new(File::open(&target)?)?;
        assert_eq!(zip.len(), 2);
        let mut page = String::new();
        zip.by_name("2.jpg")?.read_to_string(&mut page)?;
        assert_eq!(page, "2.jpg");
        Ok(())
    }

    #[test]
    fn existing_archive_is_left_alone() -> anyhow::Result<()> {
        let tmp = tempfile::tempdir()?;
        let files = pages(tmp.path(), &["1.png"])?;
        let target = tmp.path().join("done.cbz");
        fs::write(&target, b"old")?;

        let done = Archiver::new(Format::Cbz, "rar").archive(&files, &target, true)?;
        assert_eq!(done, Archived::AlreadyExists);
        assert_eq!(fs::read(&target)?, b"old");
        assert!(files[0].exists());
        Ok(())
    }

    #[test]
    fn extensions() {
        assert_eq!(Format::Rar.extension(), "cbr");
        assert_eq!(Archiver::new(Format::Cbz, "").extension(), "cbz");
    }

    #[cfg(unix)]
    mod external {
        use super::*;

        fn script(dir: &Path, body: &str) -> anyhow::Result<String> {
            let path = dir.join("archiver.sh");
            fs::write(&path, body)?;
            Ok(format!("sh {}", path.display()))
        }

        #[test]
        fn runs_add_with_bare_names() -> anyhow::Result<()> {
            let tmp = tempfile::tempdir()?;
            let pages_dir = tmp.path().join("pages");
            fs::create_dir(&pages_dir)?;
            let files = pages(&pages_dir, &["1.png", "2.jpg"])?;
            let log = tmp.path().join("args.log");
            let command = script(
                tmp.path(),
                &format!("echo \"$@\" > {}\ntouch \"$2\"\n", log.display()),
            )?;
            let target = tmp.path().join("c1.cbr");

            let done = Archiver::new(Format::Rar, &command).archive(&files, &target, false)?;
            assert_eq!(done, Archived::Created);
            assert!(target.exists());
            assert_eq!(
                fs::read_to_string(&log)?.trim(),
                format!("a {} 1.png 2.jpg", target.display())
            );
            assert!(files.iter().all(|f| f.exists()));
            Ok(())
        }

        #[test]
        fn failure_propagates_and_keeps_sources() -> anyhow::Result<()> {
            let tmp = tempfile::tempdir()?;
            let files = pages(tmp.path(), &["1.png"])?;
            let command = script(tmp.path(), "touch \"$2\"\nexit 3\n")?;
            let target = tmp.path().join("c1.cbr");

            let err = Archiver::new(Format::Rar, &command)
                .archive(&files, &target, true)
                .unwrap_err();

            assert!(matches!(err, ArchiveError::Failed { status, .. } if status.code() == Some(3)));
            assert!(!target.exists());
            assert!(files[0].exists());
            Ok(())
        }

        #[test]
        fn unknown_program_is_spawn_error() -> anyhow::Result<()> {
            let tmp = tempfile::tempdir()?;
            let files = pages(tmp.path(), &["1.png"])?;
            let err = Archiver::new(Format::Rar, "definitely-not-an-archiver-x9")
                .archive(&files, &tmp.path().join("c1.cbr"), true)
                .unwrap_err();
            assert!(matches!(err, ArchiveError::Spawn { .. }));
            assert!(files[0].exists());
            Ok(())
        }
    }
}
