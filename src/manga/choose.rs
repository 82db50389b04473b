use anyhow::{bail, Context, Result};
use dialoguer::{theme::ColorfulTheme, Select};

/// Decides which scan group's release of a chapter to keep.
pub trait Choose {
    /// Returns the index into `groups` to keep.
    fn choose(&mut self, chapter: &str, groups: &[&str]) -> Result<usize>;
}

/// Unattended policy, keeps whichever release was listed first.
#[derive(Debug, Default)]
pub struct FirstListed;

impl Choose for FirstListed {
    fn choose(&mut self, _chapter: &str, _groups: &[&str]) -> Result<usize> {
        Ok(0)
    }
}

/// Asks the operator on the terminal with a selection menu.
#[derive(Debug, Default)]
pub struct Interactive;

/// Turns the menu result into an index, Esc or `q` leaves no choice.
fn picked(chapter: &str, selection: Option<usize>) -> Result<usize> {
    match selection {
        Some(index) => Ok(index),
        None => bail!("No choice given for chapter {}", chapter),
    }
}

impl Choose for Interactive {
    fn choose(&mut self, chapter: &str, groups: &[&str]) -> Result<usize> {
        let selection = Select::with_theme(&ColorfulTheme::default())
            .with_prompt(format!(
                "Chapter {} was released by several groups, keep which? (Esc to abort)",
                chapter
            ))
            .items(groups)
            .default(0)
            .interact_opt()
            .context("Reading choice from the operator")?;
        picked(chapter, selection)
    }
}
