use agenda::window::ViewMode;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "agenda", version, about = "Practice agenda: month, week and day views")]
pub struct Cli {
    /// Read events from this YAML file instead of the project/global one
    #[arg(long, global = true)]
    pub file: Option<PathBuf>,
    /// Log debug output to stderr (text commands only; the TUI reads AGENDA_LOG)
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create an .agenda directory with an empty events file and default config
    Init,
    /// Print the date range a view would fetch
    Window {
        mode: Mode,
        /// Anchor date (YYYY-MM-DD), defaults to today
        #[arg(long)]
        date: Option<String>,
    },
    /// Month overview: per-day counts, colour dots and alert flags
    Month(ViewArgs),
    /// Week overview: first events of each day
    Week(ViewArgs),
    /// Day view with all-day events and column layout
    Day(ViewArgs),
    /// Launch the interactive TUI
    Tui(FilterArgs),
}

#[derive(Args, Debug, Clone, Default)]
pub struct FilterArgs {
    /// Anchor date (YYYY-MM-DD), defaults to today
    #[arg(long)]
    pub date: Option<String>,
    /// Only show these event types (repeatable), e.g. prenatal-exam
    #[arg(long = "type", short = 't')]
    pub types: Vec<String>,
    /// Only show events for this patient id
    #[arg(long)]
    pub patient: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct ViewArgs {
    #[command(flatten)]
    pub filter: FilterArgs,
    /// Print the computed view as YAML
    #[arg(long)]
    pub yaml: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Month,
    Week,
    Day,
}

impl From<Mode> for ViewMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Month => ViewMode::Month,
            Mode::Week => ViewMode::Week,
            Mode::Day => ViewMode::Day,
        }
    }
}
