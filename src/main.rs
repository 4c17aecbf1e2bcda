mod cli;
mod commands;
mod ui;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use gooddays::config::Config;
use gooddays::store::FallbackStore;

fn main() -> Result<()> {
    // Logs go to stderr so they never end up inside the TUI or piped output.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("gooddays=warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = cli::Cli::parse();
    let command = args.command.unwrap_or(cli::Command::Tui { month: None });
    let config = Config::from_env()?;
    match command {
        cli::Command::Init => commands::init(),
        command => {
            let store = commands::open_store(&config)?;
            dispatch(command, store, &config)
        }
    }
}

fn dispatch(command: cli::Command, store: FallbackStore, config: &Config) -> Result<()> {
    match command {
        cli::Command::Init => commands::init(),
        cli::Command::Log {
            day,
            energy,
            touch,
            note,
            photos,
            date,
        } => commands::log(&store, date, day, energy, touch, note, photos),
        cli::Command::List { limit } => commands::list(&store, limit),
        cli::Command::Show { date } => commands::show(&store, date),
        cli::Command::Remove { date } => commands::remove(&store, date),
        cli::Command::Stats => commands::stats(&store),
        cli::Command::Theme(theme) => match theme {
            cli::ThemeCommand::Add {
                title,
                start,
                end,
                color,
            } => commands::theme_add(&store, title, start, end, color),
            cli::ThemeCommand::Edit {
                id,
                title,
                start,
                end,
                clear_end,
                color,
            } => commands::theme_edit(&store, id, title, start, end, clear_end, color),
            cli::ThemeCommand::Delete { id } => commands::theme_delete(&store, id),
            cli::ThemeCommand::List => commands::theme_list(&store),
        },
        cli::Command::Calendar { month } => commands::calendar(&store, month),
        cli::Command::Analyze {
            month,
            days,
            mode,
            force,
        } => commands::analyze(&store, config, month, days, mode, force),
        cli::Command::Status => commands::status(&store, config),
        cli::Command::Tui { month } => commands::tui(store, month),
    }
}
