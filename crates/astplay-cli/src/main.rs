#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::struct_excessive_bools)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::doc_markdown)]

mod commands;
mod logging;

use astplay_core::{CursorPosition, PlaygroundConfig, TransformMode};
use clap::Parser;
use miette::{IntoDiagnostic, Result};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "astplay")]
#[command(author, version, about = "Inspect JavaScript ASTs and try transform plugins against them", long_about = None)]
struct Cli {
    /// Increase logging verbosity (-v for DEBUG, -vv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit JSON formatted output (stable, machine-readable)
    #[arg(long, global = true)]
    json: bool,

    /// Override the working directory
    #[arg(long, global = true, value_name = "PATH")]
    cwd: Option<PathBuf>,

    /// Config file to use instead of discovering astplay.config.json
    #[arg(long, global = true, value_name = "FILE", env = "ASTPLAY_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Print version information
    Version,

    /// Print the display tree of a source file
    Tree {
        /// Source file to parse
        input: PathBuf,

        /// Stop descending below this depth
        #[arg(long)]
        depth: Option<usize>,

        /// Show every scalar field, not only the whitelist
        #[arg(long)]
        show_all: bool,

        /// Scalar fields to show (comma-separated)
        #[arg(long, value_delimiter = ',')]
        whitelist: Vec<String>,

        /// Highlight nodes of this visitor type (e.g. "Identifier")
        #[arg(long, value_name = "TYPE")]
        active: Option<String>,
    },

    /// Run transform code against a source file and print the output
    Run {
        /// Source file the transform is applied to
        input: PathBuf,

        /// File holding the transform code
        plugin: PathBuf,

        /// How the transform code is applied
        #[arg(long, value_enum)]
        mode: Option<ModeArg>,
    },

    /// Guess the node type under a cursor in transform code
    Locate {
        /// File holding the transform code
        plugin: PathBuf,

        /// Cursor position as LINE:COLUMN (1-indexed)
        #[arg(long)]
        cursor: CursorPosition,
    },

    /// List the source ranges of every node of a visitor type
    Resolve {
        /// Source file to parse
        input: PathBuf,

        /// Visitor type, e.g. "Identifier" or an alias like "Function"
        node_type: String,
    },

    /// Watch a source file and transform code, re-running on change
    Watch {
        /// Source file the transform is applied to
        input: PathBuf,

        /// File holding the transform code
        plugin: PathBuf,

        /// Delay before an input change is picked up
        #[arg(long)]
        debounce_ms: Option<u64>,

        /// Cursor in the transform code, to highlight the node type under it
        #[arg(long)]
        cursor: Option<CursorPosition>,

        /// How the transform code is applied
        #[arg(long, value_enum)]
        mode: Option<ModeArg>,
    },
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum ModeArg {
    /// Babel-style plugin editing the parsed input
    Ast,
    /// Function from input text to output text
    Code,
}

impl From<ModeArg> for TransformMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Ast => TransformMode::AstMutation,
            ModeArg::Code => TransformMode::DirectCode,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Determine working directory
    let cwd = cli
        .cwd
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."));

    logging::init(cli.verbose, cli.json);

    let config = PlaygroundConfig::discover(&cwd, cli.config.as_deref()).into_diagnostic()?;

    match cli.command {
        Commands::Version => commands::version::run(),
        Commands::Tree {
            input,
            depth,
            show_all,
            whitelist,
            active,
        } => {
            let args = commands::tree::TreeArgs {
                depth,
                show_all,
                whitelist,
                active,
            };
            commands::tree::run(&cwd, &config, &input, &args, cli.json)
        }
        Commands::Run {
            input,
            plugin,
            mode,
        } => {
            let config = match mode {
                Some(mode) => config.with_mode(mode.into()),
                None => config,
            };
            commands::run::run(&cwd, &config, &input, &plugin, cli.json)
        }
        Commands::Locate { plugin, cursor } => {
            commands::locate::run(&cwd, &plugin, cursor, cli.json)
        }
        Commands::Resolve { input, node_type } => {
            commands::resolve::run(&cwd, &config, &input, &node_type, cli.json)
        }
        Commands::Watch {
            input,
            plugin,
            debounce_ms,
            cursor,
            mode,
        } => {
            let mut config = config;
            if let Some(ms) = debounce_ms {
                config = config.with_debounce_ms(ms);
            }
            if let Some(mode) = mode {
                config = config.with_mode(mode.into());
            }
            commands::watch::run(&cwd, &config, &input, &plugin, cursor, cli.json)
        }
    }
}
