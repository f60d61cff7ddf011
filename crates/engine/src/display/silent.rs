//! A display that swallows everything. Useful for validation runs and
//! embedding.

use cjunct_workflow::Workflow;

use super::{Display, DisplayResult};

/// No-op display.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentDisplay;

impl Display for SilentDisplay {
    fn on_finish(&mut self, _workflow: &Workflow) -> DisplayResult {
        Ok(())
    }
}
