use tracing_subscriber::EnvFilter;

/// Install the global subscriber.
///
/// Filtering follows `RUST_LOG`, defaulting to `info`. With `json` set, each
/// event is written as one JSON object per line.
pub fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}
