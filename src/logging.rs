//! Logging setup.
//!
//! The runtime logs through [`tracing`]. Applications that do not install their
//! own subscriber can enable the `log-subscriber` feature and call
//! [`init_logging`], which reads its filter from `SPARK_VDOM_LOG`
//! (for example `SPARK_VDOM_LOG=spark_vdom=debug`).

/// Environment variable holding the log filter directive.
pub const ENV_LOG: &str = "SPARK_VDOM_LOG";

/// Install a fmt subscriber filtered by [`ENV_LOG`] (default `warn`).
///
/// Returns `false` when a global subscriber was already installed.
#[cfg(feature = "log-subscriber")]
pub fn init_logging() -> bool {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_env(ENV_LOG).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_ok()
}
