//! Command-line entry for the cjunct task runner.

use std::path::Path;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use cjunct_config::{Config, RECOGNIZED_VARIABLES, load_dotenv};
use cjunct_engine::{Runner, source_from_arg};
use cjunct_error::{ClassifiedError, EXIT_UNHANDLED};

#[derive(Parser)]
#[command(name = "cjunct", version, about = "Declarative task runner")]
struct Cli {
    /// Logging level (error, warn, info, debug, trace).
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Display to use (prefix, silent, or a registered custom one).
    #[arg(long, global = true)]
    display: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a workflow.
    Run {
        /// Execution strategy (free, sequential, loose, strict,
        /// strict-sequential).
        #[arg(long)]
        strategy: Option<String>,

        /// Interactively choose which selectable actions run.
        #[arg(long)]
        interactive: bool,

        /// Workflow file, or `-` for standard input. Defaults to
        /// `CJUNCT_WORKFLOW_FILE`, then autodetection.
        workflow: Option<String>,
    },
    /// Load and validate a workflow without executing it.
    Validate {
        /// Workflow file, or `-` for standard input.
        workflow: Option<String>,
    },
    /// Show tool information.
    Info {
        #[command(subcommand)]
        topic: InfoTopic,
    },
}

#[derive(Subcommand)]
enum InfoTopic {
    /// Print the tool version.
    Version,
    /// List the recognized environment variables.
    EnvVars,
}

fn init_logging(config: &Config) {
    let level = config.log_level.as_deref().unwrap_or("error");
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("error"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);
    match config
        .log_file
        .as_deref()
        .and_then(|path| std::fs::File::create(path).ok())
    {
        Some(file) => builder.with_writer(Arc::new(file)).with_ansi(false).init(),
        None => builder.with_writer(std::io::stderr).init(),
    }
}

fn build_config(cli: &Cli) -> Result<Config, ClassifiedError> {
    // Dotenv is injected before the rest of the environment is read.
    let env_file = std::env::var("CJUNCT_ENV_FILE").ok().filter(|v| !v.is_empty());
    load_dotenv(env_file.as_deref().map(Path::new));

    let mut config = Config::from_env()?;
    if cli.log_level.is_some() {
        config.log_level = cli.log_level.clone();
    }
    if cli.display.is_some() {
        config.display_name = cli.display.clone();
    }
    Ok(config)
}

async fn dispatch(cli: Cli) -> Result<(), ClassifiedError> {
    let config = build_config(&cli)?;
    init_logging(&config);

    match cli.command {
        Commands::Run {
            strategy,
            interactive,
            workflow,
        } => {
            let mut runner = Runner::new(config)
                .with_source(source_from_arg(workflow.as_deref()))
                .interactive(interactive);
            if let Some(strategy) = strategy {
                runner = runner.with_strategy(strategy);
            }
            debug!("starting workflow execution");
            runner.run().await
        }
        Commands::Validate { workflow } => {
            let runner = Runner::new(config).with_source(source_from_arg(workflow.as_deref()));
            let loaded = runner.load()?;
            println!("Workflow is valid: {} action(s)", loaded.len());
            Ok(())
        }
        Commands::Info { topic } => {
            match topic {
                InfoTopic::Version => println!("{}", env!("CARGO_PKG_VERSION")),
                InfoTopic::EnvVars => {
                    let width = RECOGNIZED_VARIABLES
                        .iter()
                        .map(|spec| spec.name.len())
                        .max()
                        .unwrap_or(0);
                    for spec in RECOGNIZED_VARIABLES {
                        let default = if spec.default.is_empty() {
                            String::new()
                        } else {
                            format!(" [default: {}]", spec.default)
                        };
                        println!("{:width$}  {}{}", spec.name, spec.description, default);
                    }
                }
            }
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() {
    // Anything that escapes classification must exit with the dedicated
    // unhandled code, not the default panic code.
    std::panic::set_hook(Box::new(|info| {
        eprintln!("! UNHANDLED EXCEPTION: {info}");
        std::process::exit(EXIT_UNHANDLED);
    }));

    let cli = Cli::parse();
    if let Err(error) = dispatch(cli).await {
        let first_line = error.to_string();
        let first_line = first_line.lines().next().unwrap_or_default().to_string();
        eprintln!("! {first_line}");
        std::process::exit(error.exit_code());
    }
}
