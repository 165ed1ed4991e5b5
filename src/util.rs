//! Small helpers shared across the CLI entry points.

use log::LevelFilter;

/// Installs `env_logger` at the given level. Call once from `main` before
/// touching the index, matching every CLI binary's setup call.
pub fn init_logging(level: LevelFilter) {
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .init();
}
