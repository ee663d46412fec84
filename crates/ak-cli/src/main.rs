mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// auto-kingdom CLI -- run and inspect unattended game cycles.
#[derive(Parser)]
#[command(name = "ak", version, about)]
struct Cli {
    /// Config file (defaults to ~/.auto-kingdom/config.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one cycle for an instance in the foreground.
    Run {
        /// Instance id from the config file.
        instance: String,
        /// Run daily tasks even if already done today.
        #[arg(long)]
        force: bool,
        /// First entity index to process.
        #[arg(long)]
        start_from: Option<u32>,
        /// Number of entities (overrides the configured count).
        #[arg(long)]
        entities: Option<u32>,
    },

    /// Show today's task completion and the schedule for an instance.
    Status {
        instance: String,
        /// Only show this entity's task dates.
        #[arg(long)]
        entity: Option<u32>,
    },

    /// Clear recorded task completions.
    Reset {
        instance: String,
        /// Only reset this entity.
        #[arg(long)]
        entity: Option<u32>,
    },

    /// Inspect or change an instance's run schedule.
    Schedule {
        instance: String,
        #[command(subcommand)]
        action: Option<ScheduleAction>,
    },

    /// List configured instances.
    Instances,
}

#[derive(Subcommand)]
enum ScheduleAction {
    Enable,
    Disable,
    /// Hours between runs.
    Interval { hours: u32 },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = commands::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Run {
            instance,
            force,
            start_from,
            entities,
        } => {
            let clean = commands::run::run(config, &instance, force, start_from, entities).await?;
            if !clean {
                std::process::exit(1);
            }
        }
        Commands::Status { instance, entity } => commands::status::run(&config, &instance, entity)?,
        Commands::Reset { instance, entity } => commands::reset::run(&config, &instance, entity)?,
        Commands::Schedule { instance, action } => {
            let change = match action {
                None => commands::schedule::Change::Show,
                Some(ScheduleAction::Enable) => commands::schedule::Change::Enable,
                Some(ScheduleAction::Disable) => commands::schedule::Change::Disable,
                Some(ScheduleAction::Interval { hours }) => commands::schedule::Change::Interval(hours),
            };
            commands::schedule::run(&config, &instance, change)?;
        }
        Commands::Instances => commands::instances::run(&config),
    }

    Ok(())
}
