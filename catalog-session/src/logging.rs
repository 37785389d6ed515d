use log::LevelFilter;
use simplelog::{ColorChoice, ConfigBuilder, TermLogger, TerminalMode};
use std::str::FromStr;

/// Turn a configured level name into a filter.
pub fn parse_level(level: &str) -> Option<LevelFilter> {
    LevelFilter::from_str(level.trim()).ok()
}

/// Install the terminal logger. Only the first call in a process wins.
pub fn init(level: LevelFilter) -> Result<(), log::SetLoggerError> {
    let config = ConfigBuilder::new()
        .set_target_level(LevelFilter::Error)
        .set_thread_level(LevelFilter::Off)
        .build();

    TermLogger::init(level, config, TerminalMode::Mixed, ColorChoice::Auto)
}
