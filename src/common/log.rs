//! Logging helpers

/// Initialize the logging system
///
/// `RUST_LOG` takes precedence; otherwise `level` is used as the filter.
/// Calling this more than once is harmless.
///
/// # Parameters
///
/// * `level` - Log level
pub fn init_logger(level: &str) {
    let env = env_logger::Env::default()
        .filter_or("RUST_LOG", level);

    let _ = env_logger::Builder::from_env(env)
        .format_timestamp_millis()
        .try_init();
}
