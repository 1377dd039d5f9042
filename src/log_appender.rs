use anyhow::Result;
use log::LevelFilter;
use log4rs::append::console::{ConsoleAppender, Target};
use log4rs::append::rolling_file::policy::compound::{
    roll::fixed_window::FixedWindowRoller, trigger::size::SizeTrigger, CompoundPolicy,
};
use log4rs::append::rolling_file::RollingFileAppender;
use log4rs::config::{Appender, Config, Root};
use log4rs::encode::pattern::PatternEncoder;
use std::fs;
use std::path::Path;

/// Roll the log file once it reaches 5MB
const LOG_FILE_LIMIT: u64 = 5 * 1024 * 1024;

/// Number of compressed archives to keep
const LOG_ARCHIVES: u32 = 3;

/// Console logging on stderr (stdout carries command output) plus a
/// size-rolled file under `<log_dir>/logs`.
pub fn setup_logging(log_dir: &Path, level: LevelFilter) -> Result<()> {
    let logs = log_dir.join("logs");
    fs::create_dir_all(&logs)?;

    let stderr = ConsoleAppender::builder()
        .target(Target::Stderr)
        .encoder(Box::new(PatternEncoder::new(
            "{h({l})} {d(%Y-%m-%d %H:%M:%S)} {M} - {m}{n}",
        )))
        .build();

    let archive_pattern = logs.join("bdfs.{}.log.gz");
    let roller = FixedWindowRoller::builder()
        .base(1)
        .build(&archive_pattern.to_string_lossy(), LOG_ARCHIVES)?;

    let trigger = SizeTrigger::new(LOG_FILE_LIMIT);

    let policy = CompoundPolicy::new(Box::new(trigger), Box::new(roller));

    let file = RollingFileAppender::builder()
        .encoder(Box::new(PatternEncoder::new("{d} {l} {M}::{m}{n}")))
        .build(logs.join("bdfs.log"), Box::new(policy))?;

    let config = Config::builder()
        .appender(Appender::builder().build("stderr", Box::new(stderr)))
        .appender(Appender::builder().build("file", Box::new(file)))
        .build(
            Root::builder()
                .appender("stderr")
                .appender("file")
                .build(level),
        )?;

    log4rs::init_config(config)?;
    Ok(())
}
