use tracing_subscriber::{fmt, EnvFilter};

pub fn init(debug: bool) {
    // RUST_LOG wins; otherwise info, or debug with --debug
    let default = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    fmt().with_env_filter(filter).with_target(false).init();
}
