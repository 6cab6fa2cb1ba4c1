//! Logging utilities

pub use log::{debug, error, info, trace, warn, LevelFilter};

/// Initialize the logging system at `level`.
///
/// `RUST_LOG` still overrides the level when set. Calling this more than once
/// is harmless; later calls are ignored.
pub fn init(level: LevelFilter) {
    let _ = env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_timestamp_millis()
        .try_init();
}

/// Parse a level name from configuration, falling back to `Info`
pub fn parse_level(name: &str) -> LevelFilter {
    name.parse().unwrap_or(LevelFilter::Info)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("debug"), LevelFilter::Debug);
        assert_eq!(parse_level("WARN"), LevelFilter::Warn);
        assert_eq!(parse_level("loud"), LevelFilter::Info);
    }

    #[test]
    fn test_init_is_idempotent() {
        init(LevelFilter::Debug);
        init(LevelFilter::Trace);
    }
}
