//! # Logging module
//!
//! This module provides a one-shot `tracing-subscriber` initialization,
//! mapping an integer verbosity (as commonly supplied via repeated `-v`
//! flags) to a `tracing::Level`. The core's own modules log exclusively
//! through `tracing`'s macros with structured fields, never `println!`.

use tracing::Level;

// -----------------------------------------------------------------------------
// Error enumeration

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("failed to set global default subscriber, {0}")]
    GlobalDefaultSubscriber(tracing::subscriber::SetGlobalDefaultError),
}

// -----------------------------------------------------------------------------
// helpers

pub const fn level(verbosity: u8) -> Level {
    match verbosity {
        0 => Level::ERROR,
        1 => Level::WARN,
        2 => Level::INFO,
        3 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

/// Installs a global `tracing_subscriber::fmt` subscriber. Safe to call at
/// most once per process; a second call returns [`Error::GlobalDefaultSubscriber`]
/// rather than panicking, so tests that spin up multiple `Operator`s in one
/// process don't abort.
pub fn init(verbosity: u8) -> Result<(), Error> {
    tracing::subscriber::set_global_default(
        tracing_subscriber::fmt()
            .with_max_level(level(verbosity))
            .with_thread_names(true)
            .with_line_number(true)
            .with_thread_ids(true)
            .with_target(true)
            .finish(),
    )
    .map_err(Error::GlobalDefaultSubscriber)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_mapping_covers_the_documented_verbosities() {
        assert_eq!(level(0), Level::ERROR);
        assert_eq!(level(1), Level::WARN);
        assert_eq!(level(2), Level::INFO);
        assert_eq!(level(3), Level::DEBUG);
        assert_eq!(level(99), Level::TRACE);
    }

    #[test]
    fn second_init_call_errors_instead_of_panicking() {
        let _ = init(0);
        let second = init(0);
        assert!(second.is_err());
    }
}
