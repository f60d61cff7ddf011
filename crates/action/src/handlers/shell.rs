//! The `shell` handler: run a command under `/bin/sh`, streaming output
//! line-wise and scanning stdout for the outcome sentinel.

use std::process::Stdio;

use async_trait::async_trait;
use indexmap::IndexMap;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::debug;

use cjunct_templar::{ObjectTemplate, RenderResult, Renderer, StringTemplate};
use cjunct_workflow::{ActionHandler, ActionIo, ActionRunError};

use crate::args::{ArgsError, ArgsReader};
use crate::scanner::{EmissionScanner, YIELD_FUNCTION_DEFINITION};

/// Runs `command` (or sources `file`) through `/bin/sh`.
#[derive(Debug)]
pub struct ShellHandler {
    command: Option<StringTemplate>,
    file: Option<StringTemplate>,
    /// Inline mapping (values may be templates) or an `!@` expression
    /// producing the whole mapping.
    environment: Option<ObjectTemplate<IndexMap<String, String>>>,
    cwd: Option<String>,
    inject_yield_function: bool,
    rendered_environment: Option<IndexMap<String, String>>,
}

impl ShellHandler {
    /// Decode args: exactly one of `command`/`file` (templates), optional
    /// `environment` (mapping of templated values or `!@` expression),
    /// optional plain `cwd`.
    pub fn from_args(mut args: ArgsReader, inject_yield_function: bool) -> Result<Self, ArgsError> {
        let command = args.take_optional_template("command")?;
        let file = args.take_optional_template("file")?;
        if command.is_none() && file.is_none() {
            return Err(ArgsError::Invalid("Neither command nor file specified".into()));
        }
        if command.is_some() && file.is_some() {
            return Err(ArgsError::Invalid("Both command and file specified".into()));
        }
        let environment =
            args.take_optional_object::<IndexMap<String, String>>("environment", "a mapping of strings")?;
        let cwd = args.take_optional_string("cwd")?;
        args.finish()?;
        Ok(Self {
            command,
            file,
            environment,
            cwd,
            inject_yield_function,
            rendered_environment: None,
        })
    }

    fn user_command(&self) -> String {
        match (&self.command, &self.file) {
            (Some(command), _) => command.as_str().to_string(),
            (None, Some(file)) => format!(". '{}'", file.as_str()),
            (None, None) => String::new(),
        }
    }
}

#[async_trait]
impl ActionHandler for ShellHandler {
    fn type_name(&self) -> &str {
        "shell"
    }

    fn render_args(&mut self, renderer: &dyn Renderer) -> RenderResult<()> {
        if let Some(command) = &mut self.command {
            command.render_in_place(renderer)?;
        }
        if let Some(file) = &mut self.file {
            file.render_in_place(renderer)?;
        }
        self.rendered_environment = match &self.environment {
            Some(ObjectTemplate::Object(entries)) => {
                let mut rendered = IndexMap::with_capacity(entries.len());
                for (key, value) in entries {
                    rendered.insert(key.clone(), renderer.render_str(value)?);
                }
                Some(rendered)
            }
            Some(expression @ ObjectTemplate::Expression(_)) => Some(expression.resolve(renderer)?),
            None => None,
        };
        Ok(())
    }

    async fn run(self: Box<Self>, io: ActionIo) -> Result<(), ActionRunError> {
        let mut command_text = self.user_command();
        if self.inject_yield_function {
            command_text = format!("{YIELD_FUNCTION_DEFINITION}\n{command_text}");
        }
        debug!(cwd = self.cwd.as_deref(), "spawning shell");

        let mut command = Command::new("/bin/sh");
        command
            .arg("-c")
            .arg(&command_text)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(cwd) = &self.cwd {
            command.current_dir(cwd);
        }
        if let Some(environment) = &self.rendered_environment {
            command.envs(environment);
        }

        let mut child = command.spawn()?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ActionRunError::Internal("no stdout pipe".into()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| ActionRunError::Internal("no stderr pipe".into()))?;

        let scanner = EmissionScanner::new(io);
        let read_stdout = async {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                scanner.emit_stdout(&line);
            }
        };
        let read_stderr = async {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                scanner.emit_stderr(&line);
            }
        };
        tokio::join!(read_stdout, read_stderr);

        let status = child.wait().await?;
        match status.code() {
            Some(0) => Ok(()),
            Some(code) => Err(ActionRunError::Fail(format!("Exit code: {code}"))),
            None => Err(ActionRunError::Fail("Terminated by signal".into())),
        }
    }
}
