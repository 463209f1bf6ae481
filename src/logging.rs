use tracing_subscriber::EnvFilter;

const ENV_VAR: &str = "AGENDA_LOG";

/// Logs go to stderr. `AGENDA_LOG` overrides the default level; the TUI is
/// silent unless it is set, so log lines do not land on the alternate screen.
pub fn init(verbose: bool, interactive: bool) {
    let filter = EnvFilter::try_from_env(ENV_VAR)
        .unwrap_or_else(|_| EnvFilter::new(default_level(verbose, interactive)));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn default_level(verbose: bool, interactive: bool) -> &'static str {
    match (verbose, interactive) {
        (_, true) => "off",
        (true, false) => "debug",
        (false, false) => "warn",
    }
}
