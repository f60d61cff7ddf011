//! The `echo` handler: emit one rendered message.

use async_trait::async_trait;

use cjunct_templar::{RenderResult, Renderer, StringTemplate};
use cjunct_workflow::{ActionHandler, ActionIo, ActionRunError};

use crate::args::{ArgsError, ArgsReader};

/// Emits its `message` arg as a single stdout-tagged event.
#[derive(Debug)]
pub struct EchoHandler {
    message: StringTemplate,
}

impl EchoHandler {
    /// Decode args: `message` (template, required).
    pub fn from_args(mut args: ArgsReader) -> Result<Self, ArgsError> {
        let message = args.take_template("message")?;
        args.finish()?;
        Ok(Self { message })
    }
}

#[async_trait]
impl ActionHandler for EchoHandler {
    fn type_name(&self) -> &str {
        "echo"
    }

    fn render_args(&mut self, renderer: &dyn Renderer) -> RenderResult<()> {
        self.message.render_in_place(renderer)
    }

    async fn run(self: Box<Self>, io: ActionIo) -> Result<(), ActionRunError> {
        io.emit(self.message.as_str());
        Ok(())
    }
}
