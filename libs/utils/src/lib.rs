use tracing_subscriber::EnvFilter;

pub mod signal;

/// Install the global subscriber. `RUST_LOG` takes precedence over `default_filter`.
pub fn set_log(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .compact()
        .with_file(true)
        .with_line_number(true)
        .with_thread_ids(true)
        .with_target(true)
        .init();
}

/// Filter directive applying `level` to every crate of the workspace
pub fn log_filter(level: &str) -> String {
    ["screenrec", "recserver", "recclient", "storage", "tower_http"]
        .iter()
        .map(|target| format!("{target}={level}"))
        .chain(std::iter::once("sqlx=warn".to_string()))
        .collect::<Vec<_>>()
        .join(",")
}
