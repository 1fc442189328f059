use log::LevelFilter;
use log4rs::{
    append::{
        console::{ConsoleAppender, Target},
        file::FileAppender,
    },
    config::{Appender, Config, Root},
    encode::{json::JsonEncoder, pattern::PatternEncoder},
};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use once_cell::sync::OnceCell;

pub struct Logger;

pub static LOGGER_ENABLED: OnceCell<bool> = OnceCell::new();

#[macro_export]
macro_rules! logger {
    ($level:ident, $($arg:tt)+) => {
        if let Some(true) = $crate::logging::LOGGER_ENABLED.get() {
            ::log::$level!($($arg)+);
        }
    };
}

#[derive(Debug, Default, Clone)]
pub struct LoggerConfig {
    pub verbosity: u8,
    pub log_file: Option<PathBuf>,
}

/// verbosity 0..=3 を LevelFilter に変換する
pub fn level_from_verbosity(verbosity: u8) -> LevelFilter {
    match verbosity {
        0 => LevelFilter::Error,
        1 => LevelFilter::Warn,
        2 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    }
}

impl Logger {
    pub fn init(config: &LoggerConfig) -> Result<(), anyhow::Error> {
        let level_filter = env::var("RUST_LOG")
            .ok()
            .and_then(|level| LevelFilter::from_str(&level).ok())
            .unwrap_or_else(|| level_from_verbosity(config.verbosity));

        let console = ConsoleAppender::builder()
            .target(Target::Stderr)
            .encoder(Box::new(PatternEncoder::new("{h({l})} {m}{n}")))
            .build();

        let mut builder =
            Config::builder().appender(Appender::builder().build("console", Box::new(console)));

        let mut root = Root::builder().appender("console");

        if let Some(path) = &config.log_file {
            let logfile = FileAppender::builder()
                .append(false)
                .encoder(Box::new(JsonEncoder::new()))
                .build(path)?;

            builder = builder.appender(Appender::builder().build("logfile", Box::new(logfile)));
            root = root.appender("logfile");
        }

        let config = builder.build(root.build(level_filter))?;

        log4rs::init_config(config)?;

        LOGGER_ENABLED
            .set(true)
            .map_err(|_| anyhow::anyhow!("logger is already initialized"))?;

        Ok(())
    }
}
