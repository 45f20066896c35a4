//! Operator port
//!
//! The pipeline never touches the console. Every question and message
//! goes through an [`Operator`]; the CLI plugs in a terminal implementation,
//! tests plug in [`ScriptedOperator`].

use std::collections::VecDeque;

use thiserror::Error;

use crate::error::ImportError;

/// Failure to obtain an answer
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PromptError {
    /// The operator interrupted the prompt (Ctrl+C)
    #[error("prompt interrupted")]
    Interrupted,

    /// The prompt could not be shown or read
    #[error("{0}")]
    Io(String),
}

impl From<PromptError> for ImportError {
    fn from(err: PromptError) -> Self {
        match err {
            PromptError::Interrupted => Self::Interrupted,
            PromptError::Io(msg) => Self::Prompt(msg),
        }
    }
}

/// Confirmation and choice port
pub trait Operator {
    /// Returns false for unattended runs, which never prompt
    fn is_interactive(&self) -> bool;

    /// Asks a yes/no question
    ///
    /// # Errors
    ///
    /// Returns `PromptError` if no answer could be read.
    fn confirm(&mut self, prompt: &str, default: bool) -> Result<bool, PromptError>;

    /// Asks for free text; an empty answer yields `default`
    ///
    /// # Errors
    ///
    /// Returns `PromptError` if no answer could be read.
    fn input(&mut self, prompt: &str, default: &str) -> Result<String, PromptError>;

    /// Shows a message
    fn notify(&mut self, message: &str);
}

/// Unattended operator: accepts everything, keeps the messages
#[derive(Debug, Default)]
pub struct AlwaysYes {
    messages: Vec<String>,
}

impl AlwaysYes {
    /// Creates an unattended operator
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages received so far
    #[must_use]
    pub fn messages(&self) -> &[String] {
        &self.messages
    }
}

impl Operator for AlwaysYes {
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
        tracing::info!(message, "operator notice");
        self.messages.push(message.to_string());
    }
}

/// One scripted reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Answer {
    /// Affirmative
    Yes,
    /// Negative
    No,
    /// Free text (empty = take the default)
    Text(String),
    /// Ctrl+C at this prompt
    Interrupt,
}

/// Interactive operator replaying a fixed list of answers
///
/// Every prompt consumes one answer. Running out of answers is a
/// `PromptError::Io`, so a test notices prompts it did not expect.
#[derive(Debug, Default)]
pub struct ScriptedOperator {
    answers: VecDeque<Answer>,
    prompts: Vec<String>,
    messages: Vec<String>,
}

impl ScriptedOperator {
    /// Creates an operator with no answers
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues an affirmative answer
    #[must_use]
    pub fn yes(mut self) -> Self {
        self.answers.push_back(Answer::Yes);
        self
    }

    /// Queues a negative answer
    #[must_use]
    pub fn no(mut self) -> Self {
        self.answers.push_back(Answer::No);
        self
    }

    /// Queues a text answer
    #[must_use]
    pub fn text(mut self, text: &str) -> Self {
        self.answers.push_back(Answer::Text(text.to_string()));
        self
    }

    /// Queues an interruption
    #[must_use]
    pub fn interrupt(mut self) -> Self {
        self.answers.push_back(Answer::Interrupt);
        self
    }

    /// Prompts shown so far
    #[must_use]
    pub fn prompts(&self) -> &[String] {
        &self.prompts
    }

    /// Messages shown so far
    #[must_use]
    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    /// Answers not consumed
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.answers.len()
    }

    fn next(&mut self, prompt: &str) -> Result<Answer, PromptError> {
        self.prompts.push(prompt.to_string());
        self.answers
            .pop_front()
            .ok_or_else(|| PromptError::Io(format!("no scripted answer for \"{prompt}\"")))
    }
}

impl Operator for ScriptedOperator {
    fn is_interactive(&self) -> bool {
        true
    }

    fn confirm(&mut self, prompt: &str, default: bool) -> Result<bool, PromptError> {
        match self.next(prompt)? {
            Answer::Yes => Ok(true),
            Answer::No => Ok(false),
            Answer::Text(text) if text.is_empty() => Ok(default),
            Answer::Text(text) => Ok(matches!(text.to_lowercase().as_str(), "y" | "yes")),
            Answer::Interrupt => Err(PromptError::Interrupted),
        }
    }

    fn input(&mut self, prompt: &str, default: &str) -> Result<String, PromptError> {
        match self.next(prompt)? {
            Answer::Yes => Ok("y".to_string()),
            Answer::No => Ok("n".to_string()),
            Answer::Text(text) if text.is_empty() => Ok(default.to_string()),
            Answer::Text(text) => Ok(text),
            Answer::Interrupt => Err(PromptError::Interrupted),
        }
    }

    fn notify(&mut self, message: &str) {
        self.messages.push(message.to_string());
    }
}
