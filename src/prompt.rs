//! Questions the ingest flow asks the operator, behind a trait so the same
//! flow runs interactively or from command-line answers.

use std::collections::HashMap;

use anyhow::{Context, Result, anyhow};
use dialoguer::{Confirm, Input, Select};

use crate::resolver::Prompt;

const SKIP_LABEL: &str = "(leave unmapped for now)";

pub trait Prompter {
    /// Picks a canonical name for one unmatched column; `None` leaves it pending.
    fn choose_mapping(&mut self, prompt: &Prompt) -> Result<Option<String>>;

    fn confirm(&mut self, question: &str, default: bool) -> Result<bool>;

    /// Free-text answer prefilled with `default`.
    fn edit_text(&mut self, question: &str, default: &str) -> Result<String>;
}

/// Renders prompts on the terminal.
#[derive(Debug, Default)]
pub struct TerminalPrompter;

impl Prompter for TerminalPrompter {
    fn choose_mapping(&mut self, prompt: &Prompt) -> Result<Option<String>> {
        if prompt.options.is_empty() {
            return Ok(None);
        }
        let mut items: Vec<&str> = prompt.options.iter().map(String::as_str).collect();
        items.push(SKIP_LABEL);
        let choice = Select::new()
            .with_prompt(format!(
                "Column '{}' was not matched; select its canonical name",
                prompt.column
            ))
            .items(&items)
            .default(0)
            .interact_opt()
            .context("Reading column mapping choice")?;
        Ok(choice
            .and_then(|idx| prompt.options.get(idx))
            .cloned())
    }

    fn confirm(&mut self, question: &str, default: bool) -> Result<bool> {
        Confirm::new()
            .with_prompt(question)
            .default(default)
            .interact()
            .context("Reading confirmation")
    }

    fn edit_text(&mut self, question: &str, default: &str) -> Result<String> {
        Input::<String>::new()
            .with_prompt(question)
            .default(default.to_string())
            .interact_text()
            .context("Reading text answer")
    }
}

/// Answers taken from `--map ORIGINAL=CANONICAL` flags. Anything the flags
/// do not answer goes to the fallback prompter; without one, columns stay
/// pending and questions take their defaults.
#[derive(Default)]
pub struct ScriptedPrompter {
    answers: HashMap<String, String>,
    fallback: Option<Box<dyn Prompter>>,
}

impl ScriptedPrompter {
    pub fn new(answers: HashMap<String, String>) -> Self {
        ScriptedPrompter {
            answers,
            fallback: None,
        }
    }

    pub fn from_assignments(assignments: &[String]) -> Result<Self> {
        let answers = assignments
            .iter()
            .map(|assignment| parse_assignment(assignment))
            .collect::<Result<HashMap<_, _>>>()?;
        Ok(ScriptedPrompter::new(answers))
    }

    pub fn with_fallback(mut self, fallback: Box<dyn Prompter>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    /// Columns that have a scripted answer.
    pub fn answered_columns(&self) -> impl Iterator<Item = &str> {
        self.answers.keys().map(String::as_str)
    }
}

impl Prompter for ScriptedPrompter {
    fn choose_mapping(&mut self, prompt: &Prompt) -> Result<Option<String>> {
        if let Some(answer) = self.answers.get(&prompt.column) {
            return Ok(Some(answer.clone()));
        }
        match self.fallback.as_mut() {
            Some(fallback) => fallback.choose_mapping(prompt),
            None => Ok(None),
        }
    }

    fn confirm(&mut self, question: &str, default: bool) -> Result<bool> {
        match self.fallback.as_mut() {
            Some(fallback) => fallback.confirm(question, default),
            None => Ok(default),
        }
    }

    fn edit_text(&mut self, question: &str, default: &str) -> Result<String> {
        match self.fallback.as_mut() {
            Some(fallback) => fallback.edit_text(question, default),
            None => Ok(default.to_string()),
        }
    }
}

/// Splits `ORIGINAL=CANONICAL` at the last `=`, so originals may contain `=`.
pub fn parse_assignment(assignment: &str) -> Result<(String, String)> {
    let (original, canonical) = assignment
        .rsplit_once('=')
        .ok_or_else(|| anyhow!("Mapping '{assignment}' must look like ORIGINAL=CANONICAL"))?;
    let original = original.trim();
    let canonical = canonical.trim();
    if original.is_empty() || canonical.is_empty() {
        return Err(anyhow!(
            "Mapping '{assignment}' needs both an original and a canonical name"
        ));
    }
    Ok((original.to_string(), canonical.to_string()))
}
