//! Supported coding-agent runtimes

use std::fmt;

use serde::{Deserialize, Serialize};

/// Coding-agent CLI that runs inside a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RuntimeType {
    /// Anthropic's Claude Code CLI
    ClaudeCode,
    /// Google's Gemini CLI
    GeminiCli,
    /// OpenAI's Codex CLI
    CodexCli,
}

impl RuntimeType {
    /// Every supported runtime
    pub const ALL: [Self; 3] = [Self::ClaudeCode, Self::GeminiCli, Self::CodexCli];

    /// Wire name of the runtime
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ClaudeCode => "claude-code",
            Self::GeminiCli => "gemini-cli",
            Self::CodexCli => "codex-cli",
        }
    }

    /// Parse a wire name, case-insensitively
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        Self::ALL
            .into_iter()
            .find(|runtime| runtime.as_str().eq_ignore_ascii_case(value))
    }

    /// Parse a wire name, returning `fallback` for unknown input
    #[must_use]
    pub fn parse_or(value: &str, fallback: Self) -> Self {
        Self::parse(value).unwrap_or_else(|| {
            log::warn!("Unknown runtime type '{value}', using {fallback}");
            fallback
        })
    }
}

impl Default for RuntimeType {
    fn default() -> Self {
        Self::ClaudeCode
    }
}

impl fmt::Display for RuntimeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
