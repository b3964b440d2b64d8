mod commands;
mod logging;
mod tui;

use anyhow::Result;
use clap::{Parser, Subcommand};
use taskdeck_core::{Config, HttpTaskApi, Overrides, ReconcileStrategy, Status};
use tracing::debug;

use crate::commands::FieldArgs;

#[derive(Parser)]
#[command(name = "taskdeck")]
#[command(about = "A terminal client for a REST task tracker", long_about = None)]
struct Cli {
    /// Base URL of the task API (e.g. http://localhost:5000/api)
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// How the list catches up after a change: full or patch
    #[arg(long, global = true)]
    reconcile: Option<ReconcileStrategy>,

    /// More log output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Less log output (-q warn, -qq error)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    quiet: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the Terminal User Interface (default)
    Tui,
    /// List all tasks
    List,
    /// Add a new task (usage: add Buy milk --due tomorrow)
    Add {
        /// Task title
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        title: Vec<String>,
        #[arg(short, long)]
        description: Option<String>,
        /// pending, in-progress or completed
        #[arg(short, long)]
        status: Option<Status>,
        /// YYYY-MM-DD or today, tomorrow, +3d, eow, eom, fri
        #[arg(long)]
        due: Option<String>,
    },
    /// Change fields of an existing task
    Edit {
        /// Task id or a unique prefix of it
        id: String,
        #[arg(short, long)]
        title: Option<String>,
        #[arg(short, long)]
        description: Option<String>,
        #[arg(short, long)]
        status: Option<Status>,
        /// Pass an empty string to clear the due date
        #[arg(long)]
        due: Option<String>,
    },
    /// Flip a task between completed and pending
    Toggle { id: String },
    /// Move a task to the next status (pending, in progress, completed)
    Advance { id: String },
    /// Delete a task
    Delete {
        id: String,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Show the resolved configuration
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load(Overrides {
        api_url: cli.api_url,
        reconcile: cli.reconcile,
    })?;

    let command = cli.command.unwrap_or(Commands::Tui);
    if matches!(command, Commands::Tui) {
        logging::init_file(&config, cli.verbose, cli.quiet)?;
    } else {
        logging::init_stderr(cli.verbose, cli.quiet)?;
    }
    debug!(api_url = %config.api_url, reconcile = %config.reconcile, "configuration loaded");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let api = HttpTaskApi::new(&config)?;
    let strategy = config.reconcile;

    match command {
        Commands::Tui => tui::run(runtime.handle().clone(), api, strategy)?,
        Commands::List => runtime.block_on(commands::list(&api, strategy))?,
        Commands::Add { title, description, status, due } => {
            let fields = FieldArgs {
                title: Some(title.join(" ")),
                description,
                status,
                due,
            };
            runtime.block_on(commands::add(&api, strategy, fields))?
        }
        Commands::Edit { id, title, description, status, due } => {
            let fields = FieldArgs { title, description, status, due };
            runtime.block_on(commands::edit(&api, strategy, &id, fields))?
        }
        Commands::Toggle { id } => {
            runtime.block_on(commands::change_status(&api, strategy, &id, false))?
        }
        Commands::Advance { id } => {
            runtime.block_on(commands::change_status(&api, strategy, &id, true))?
        }
        Commands::Delete { id, yes } => {
            runtime.block_on(commands::delete(&api, strategy, &id, yes))?
        }
        Commands::Config => commands::show_config(&config),
    }

    Ok(())
}
