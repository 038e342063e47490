//! Command-backed text generator.
//!
//! Pipes the prompt to a configured command (by default `claude --print`)
//! and returns whatever it writes to stdout. Any failure to produce output
//! surfaces as [`GenerateError::Unavailable`].

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use super::process::run_command;
use super::{GenerateError, Generator};

/// Default generator command
pub fn default_command() -> Vec<String> {
    vec!["claude".to_string(), "--print".to_string()]
}

/// Generator that shells out to an LLM CLI
pub struct CommandGenerator {
    argv: Vec<String>,
    timeout: Duration,
}

impl CommandGenerator {
    pub fn new(argv: Vec<String>, timeout: Duration) -> Self {
        Self { argv, timeout }
    }

    pub fn argv(&self) -> &[String] {
        &self.argv
    }
}

#[async_trait]
impl Generator for CommandGenerator {
    fn name(&self) -> &str {
        self.argv.first().map(String::as_str).unwrap_or("command")
    }

    async fn generate(&self, prompt: &str) -> Result<String, GenerateError> {
        debug!(generator = self.name(), prompt_bytes = prompt.len(), "Generating");
        run_command(&self.argv, prompt, self.timeout)
            .await
            .map_err(|e| GenerateError::Unavailable(format!("{:#}", e)))
    }
}
