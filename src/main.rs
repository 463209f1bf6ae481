mod cli;
mod commands;
mod logging;
mod ui;

use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    let args = cli::Cli::parse();
    let command = args
        .command
        .unwrap_or_else(|| cli::Command::Tui(cli::FilterArgs::default()));
    logging::init(args.verbose, matches!(command, cli::Command::Tui(_)));
    match command {
        cli::Command::Init => commands::init(),
        cli::Command::Window { mode, date } => commands::window(mode.into(), date),
        cli::Command::Month(view) => commands::month(args.file, view),
        cli::Command::Week(view) => commands::week(args.file, view),
        cli::Command::Day(view) => commands::day(args.file, view),
        cli::Command::Tui(filter) => commands::tui(args.file, filter),
    }
}
