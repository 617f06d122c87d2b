use tracing_subscriber::EnvFilter;

/// Installs the global `fmt` subscriber. `RUST_LOG` wins over `debug` when it is set.
pub fn init(debug: bool) {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::new(default_directives(debug)),
    };

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();
}

fn default_directives(debug: bool) -> &'static str {
    if debug {
        "orgmove=debug"
    } else {
        "orgmove=info"
    }
}
