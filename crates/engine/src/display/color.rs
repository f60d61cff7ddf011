//! ANSI color wrapping, gated on terminal capability.

use cjunct_workflow::ActionStatus;

/// Text colorizer. When disabled, every method is the identity.
#[derive(Debug, Clone, Copy)]
pub struct Color {
    enabled: bool,
}

impl Color {
    /// Create a colorizer.
    #[must_use]
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    fn wrap(&self, text: &str, code: u8) -> String {
        if self.enabled {
            format!("\u{1b}[{code}m{text}\u{1b}[0m")
        } else {
            text.to_string()
        }
    }

    /// Dim gray.
    #[must_use]
    pub fn gray(&self, text: &str) -> String {
        self.wrap(text, 90)
    }

    /// Red.
    #[must_use]
    pub fn red(&self, text: &str) -> String {
        self.wrap(text, 31)
    }

    /// Green.
    #[must_use]
    pub fn green(&self, text: &str) -> String {
        self.wrap(text, 32)
    }

    /// Yellow.
    #[must_use]
    pub fn yellow(&self, text: &str) -> String {
        self.wrap(text, 33)
    }

    /// The conventional color for a terminal status line.
    #[must_use]
    pub fn for_status(&self, status: ActionStatus, text: &str) -> String {
        match status {
            ActionStatus::Success => self.green(text),
            ActionStatus::Failure => self.red(text),
            ActionStatus::Warning => self.yellow(text),
            ActionStatus::Pending | ActionStatus::Skipped | ActionStatus::Omitted => {
                self.gray(text)
            }
            ActionStatus::Running => text.to_string(),
        }
    }
}
