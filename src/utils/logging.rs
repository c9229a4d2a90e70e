/// Initialize tracing/logging for the application.
///
/// Logs go to standard error so that standard output stays free for the
/// payload sink. `default_level` is one of `error`, `warn`, `info`, `debug`,
/// `trace`; anything else falls back to `info`.
pub fn init(default_level: &str) {
    let lvl = match default_level.to_lowercase().as_str() {
        "error" => tracing::Level::ERROR,
        "warn" | "warning" => tracing::Level::WARN,
        "debug" => tracing::Level::DEBUG,
        "trace" => tracing::Level::TRACE,
        _ => tracing::Level::INFO,
    };

    // try_init so tests can call this repeatedly without panicking
    let _ = tracing_subscriber::fmt()
        .with_max_level(lvl)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Level string for the `-v` toggle.
pub fn level_for(verbose: bool) -> &'static str {
    if verbose { "debug" } else { "info" }
}
