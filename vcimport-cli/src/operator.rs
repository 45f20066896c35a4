//! Terminal operator backed by `dialoguer`.

use std::io;

use dialoguer::theme::ColorfulTheme;
use dialoguer::{Confirm, Input};
use vcimport_core::import::{Operator, PromptError};

/// Asks on the terminal and prints notices to stdout
pub struct DialoguerOperator {
    theme: ColorfulTheme,
    quiet: bool,
}

impl DialoguerOperator {
    /// Creates a terminal operator; `quiet` drops notices but still asks
    pub fn new(quiet: bool) -> Self {
        Self {
            theme: ColorfulTheme::default(),
            quiet,
        }
    }
}

fn prompt_error(err: dialoguer::Error) -> PromptError {
    match err {
        dialoguer::Error::IO(e) if e.kind() == io::ErrorKind::Interrupted => PromptError::Interrupted,
        other => PromptError::Io(other.to_string()),
    }
}

impl Operator for DialoguerOperator {
    fn is_interactive(&self) -> bool {
        true
    }

    fn confirm(&mut self, prompt: &str, default: bool) -> Result<bool, PromptError> {
        Confirm::with_theme(&self.theme)
            .with_prompt(prompt.trim_start())
            .default(default)
            .interact()
            .map_err(prompt_error)
    }

    fn input(&mut self, prompt: &str, default: &str) -> Result<String, PromptError> {
        Input::<String>::with_theme(&self.theme)
            .with_prompt(prompt.trim_start())
            .default(default.to_string())
            .show_default(!default.is_empty())
            .allow_empty(true)
            .interact_text()
            .map_err(prompt_error)
    }

    fn notify(&mut self, message: &str) {
        if !self.quiet {
            println!("{message}");
        }
    }
}

/// Unattended runs print notices instead of collecting them
pub struct PrintingDefaults {
    quiet: bool,
}

impl PrintingDefaults {
    /// Creates an unattended operator
    pub const fn new(quiet: bool) -> Self {
        Self { quiet }
    }
}

impl Operator for PrintingDefaults {
    fn is_interactive(&self) -> bool {
        false
    }

    fn confirm(&mut self, _prompt: &str, _default: bool) -> Result<bool, PromptError> {
        Ok(true)
    }

    fn input(&mut self, _prompt: &str, default: &str) -> Result<String, PromptError> {
        Ok(default.to_string())
    }

    fn notify(&mut self, message: &str) {
        tracing::debug!(message, "operator notice");
        if !self.quiet {
            println!("{message}");
        }
    }
}
