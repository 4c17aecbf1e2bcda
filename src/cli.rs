use clap::{Parser, Subcommand};

use gooddays::model::{DayType, Energy, Touch};
use gooddays::summarizer::AnalysisMode;

#[derive(Parser, Debug)]
#[command(name = "gooddays", version, about = "One line a day, on a calendar")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create a journal in the current directory
    Init,
    /// Record (or overwrite) the entry for a day
    Log {
        /// Good or bad day
        #[arg(long, value_enum)]
        day: DayType,
        #[arg(long, value_enum)]
        energy: Energy,
        #[arg(long, value_enum)]
        touch: Touch,
        /// Free-text note
        #[arg(long, default_value = "")]
        note: String,
        /// Photo reference (repeatable, up to 3)
        #[arg(long = "photo", short = 'p')]
        photos: Vec<String>,
        /// Day to log in YYYY-MM-DD format (defaults to today)
        #[arg(long)]
        date: Option<String>,
    },
    /// List logged days, newest first
    List {
        /// Only show this many days
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Show everything recorded for one day
    Show {
        /// Day in YYYY-MM-DD format
        date: String,
    },
    /// Delete the entry for a day
    Remove {
        /// Day in YYYY-MM-DD format
        date: String,
    },
    /// Streaks and good-day rate
    Stats,
    /// Manage themes (labelled date ranges)
    #[command(subcommand)]
    Theme(ThemeCommand),
    /// Print a month grid with theme ribbons
    Calendar {
        /// Month in YYYY-MM format (defaults to the current month)
        #[arg(long)]
        month: Option<String>,
    },
    /// Summarize the mood of recent notes
    Analyze {
        /// Analyze a calendar month (YYYY-MM) instead of a trailing window
        #[arg(long, conflicts_with = "days")]
        month: Option<String>,
        /// Trailing window in days (defaults to GOODDAYS_SENTIMENT_DAYS)
        #[arg(long)]
        days: Option<u32>,
        #[arg(long, value_enum, default_value = "grade")]
        mode: AnalysisMode,
        /// Ignore any cached result and ask again
        #[arg(long)]
        force: bool,
    },
    /// Show which store is active
    Status,
    /// Launch the interactive calendar
    Tui {
        /// Month to open in YYYY-MM format
        #[arg(long)]
        month: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum ThemeCommand {
    /// Add a theme
    Add {
        title: String,
        /// First day in YYYY-MM-DD format
        #[arg(long)]
        start: String,
        /// Last day in YYYY-MM-DD format (single-day theme when omitted)
        #[arg(long)]
        end: Option<String>,
        /// Ribbon color as #rrggbb
        #[arg(long)]
        color: Option<String>,
    },
    /// Replace fields of an existing theme
    Edit {
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        start: Option<String>,
        #[arg(long)]
        end: Option<String>,
        /// Make it a single-day theme
        #[arg(long, conflicts_with = "end")]
        clear_end: bool,
        #[arg(long)]
        color: Option<String>,
    },
    /// Delete a theme
    Delete { id: String },
    /// List themes by start date
    List,
}
