use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// Environment variable selecting the log format (`json` or anything else)
pub const LOG_FORMAT_ENV: &str = "MATHCHUNK_LOG_FORMAT";

pub fn logs_are_json() -> bool {
    matches!(std::env::var(LOG_FORMAT_ENV).as_deref(), Ok("json"))
}

/// Initialize tracing on stderr according to `RUST_LOG` and `MATHCHUNK_LOG_FORMAT`.
///
/// `default_level` applies when `RUST_LOG` is unset.
pub fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let fmt_layer = fmt::layer().with_writer(std::io::stderr).with_target(false);
    let builder = tracing_subscriber::registry().with(filter);

    if logs_are_json() {
        let _ = builder.with(fmt_layer.json().flatten_event(true)).try_init();
    } else {
        let _ = builder.with(fmt_layer.compact()).try_init();
    }
}
