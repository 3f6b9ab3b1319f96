//! Ordered rule table classifying child output lines

use regex::Regex;
use serde::Serialize;

use crate::error::{FleetError, Result};

/// Lifecycle signal inferred from a line of child output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputSignal {
    /// The server reports it is up
    ServerStarted,
    /// The port is already taken
    PortConflict,
    /// The server reports a fatal error
    FatalError,
    /// A module or import could not be resolved
    ModuleImportError,
}

/// One `{pattern -> signal}` rule
#[derive(Debug, Clone)]
pub struct SignalRule {
    pattern: Regex,
    signal: OutputSignal,
}

impl SignalRule {
    /// Compile a rule
    ///
    /// # Errors
    /// Returns `InvalidConfig` if the pattern is not a valid regex
    pub fn new(pattern: &str, signal: OutputSignal) -> Result<Self> {
        let pattern = Regex::new(pattern)
            .map_err(|e| FleetError::invalid_config(format!("signal pattern {pattern:?}: {e}")))?;
        Ok(Self { pattern, signal })
    }

    /// Signal raised by this rule
    #[must_use]
    pub const fn signal(&self) -> OutputSignal {
        self.signal
    }

    /// Whether `line` matches
    #[must_use]
    pub fn matches(&self, line: &str) -> bool {
        self.pattern.is_match(line)
    }
}

const DEFAULT_RULES: &[(&str, OutputSignal)] = &[
    (
        r"(?i)server (is )?(running|listening|started)|listening on",
        OutputSignal::ServerStarted,
    ),
    (
        r"(?i)EADDRINUSE|address already in use",
        OutputSignal::PortConflict,
    ),
    (
        r"(?i)\bfatal\b|uncaught exception|unhandled rejection",
        OutputSignal::FatalError,
    ),
    (
        r"(?i)cannot find module|ERR_MODULE_NOT_FOUND|ModuleNotFoundError",
        OutputSignal::ModuleImportError,
    ),
];

/// Ordered rules; the first match wins
#[derive(Debug, Clone)]
pub struct SignalRules {
    rules: Vec<SignalRule>,
}

impl SignalRules {
    /// Rules in the given order
    #[must_use]
    pub const fn new(rules: Vec<SignalRule>) -> Self {
        Self { rules }
    }

    /// Startup success, port conflict, fatal error, module import error
    #[must_use]
    pub fn defaults() -> Self {
        let rules = DEFAULT_RULES
            .iter()
            .filter_map(|(pattern, signal)| SignalRule::new(pattern, *signal).ok())
            .collect();
        Self { rules }
    }

    /// Append a rule with the lowest priority
    pub fn push(&mut self, rule: SignalRule) {
        self.rules.push(rule);
    }

    /// Number of rules
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether the table is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Signal of the first rule matching `line`
    #[must_use]
    pub fn classify(&self, line: &str) -> Option<OutputSignal> {
        self.rules
            .iter()
            .find(|rule| rule.matches(line))
            .map(SignalRule::signal)
    }
}

impl Default for SignalRules {
    fn default() -> Self {
        Self::defaults()
    }
}
