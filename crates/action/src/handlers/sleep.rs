//! The `sleep` handler: suspend for a fixed duration.

use std::time::Duration;

use async_trait::async_trait;

use cjunct_templar::{RenderResult, Renderer};
use cjunct_workflow::{ActionHandler, ActionIo, ActionRunError};

use crate::args::{ArgsError, ArgsReader};

/// Sleeps for `seconds` without emitting anything.
#[derive(Debug)]
pub struct SleepHandler {
    seconds: f64,
}

impl SleepHandler {
    /// Decode args: `seconds` (non-negative number, required).
    pub fn from_args(mut args: ArgsReader) -> Result<Self, ArgsError> {
        let seconds = args.take_number("seconds")?;
        if !seconds.is_finite() || seconds < 0.0 {
            return Err(ArgsError::Invalid(format!(
                "'seconds' must be a non-negative number (got {seconds})"
            )));
        }
        args.finish()?;
        Ok(Self { seconds })
    }
}

#[async_trait]
impl ActionHandler for SleepHandler {
    fn type_name(&self) -> &str {
        "sleep"
    }

    fn render_args(&mut self, _renderer: &dyn Renderer) -> RenderResult<()> {
        Ok(())
    }

    async fn run(self: Box<Self>, _io: ActionIo) -> Result<(), ActionRunError> {
        tokio::time::sleep(Duration::from_secs_f64(self.seconds)).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use indexmap::IndexMap;
    use pretty_assertions::assert_eq;

    use super::*;

    fn args(yaml_value: serde_yaml::Value) -> ArgsReader {
        let mut entries = IndexMap::new();
        entries.insert("seconds".to_string(), yaml_value);
        ArgsReader::new(entries)
    }

    #[test]
    fn accepts_fractional_seconds() {
        let handler = SleepHandler::from_args(args(serde_yaml::Value::from(0.05))).unwrap();
        assert_eq!(handler.seconds, 0.05);
    }

    #[test]
    fn rejects_negative_durations() {
        let err = SleepHandler::from_args(args(serde_yaml::Value::from(-1.0))).unwrap_err();
        assert!(matches!(err, ArgsError::Invalid(_)));
    }

    #[test]
    fn rejects_non_numbers() {
        let err = SleepHandler::from_args(args(serde_yaml::Value::from("soon"))).unwrap_err();
        assert!(matches!(err, ArgsError::WrongType { .. }));
    }
}
