//! Utility functions and helpers

use log::LevelFilter;

/// Logging utilities
pub struct Logger;

impl Logger {
    /// Initialize logger with specified level.
    /// `RUST_LOG` still applies per module; output goes to stderr.
    pub fn init(level: LevelFilter) {
        env_logger::Builder::from_default_env()
            .filter_level(level)
            .format_timestamp_secs()
            .init();
    }

    /// Level for a `-v` count: warn, info, debug, trace
    pub fn level_for(verbosity: u8) -> LevelFilter {
        match verbosity {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_levels() {
        assert_eq!(Logger::level_for(0), LevelFilter::Warn);
        assert_eq!(Logger::level_for(2), LevelFilter::Debug);
        assert_eq!(Logger::level_for(9), LevelFilter::Trace);
    }
}
