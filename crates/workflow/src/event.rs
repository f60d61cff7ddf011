//! Line-oriented events emitted by running actions.

/// A single emitted line, tagged with its originating stream.
///
/// The display uses the tag for visual distinction; the emission scanner
/// only ever inspects stdout-tagged events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionEvent {
    /// A stdout-like line.
    Stdout(String),
    /// A stderr-like line.
    Stderr(String),
}

impl ActionEvent {
    /// The text of the line, without the stream tag.
    #[must_use]
    pub fn text(&self) -> &str {
        match self {
            Self::Stdout(text) | Self::Stderr(text) => text,
        }
    }

    /// Returns `true` for stderr-tagged events.
    #[must_use]
    pub fn is_stderr(&self) -> bool {
        matches!(self, Self::Stderr(_))
    }
}
