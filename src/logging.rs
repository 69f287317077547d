//! 全局日志

use chrono::Local;
use colored::Colorize;
use log::{Level, LevelFilter, Log, Metadata, Record};

/// 按级别着色，带时间戳，输出到 stderr
struct ShellLogger;

impl Log for ShellLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let level = match record.level() {
            Level::Error => "ERROR".red().bold(),
            Level::Warn => " WARN".bright_yellow(),
            Level::Info => " INFO".blue(),
            Level::Debug => "DEBUG".green(),
            Level::Trace => "TRACE".bright_black(),
        };
        eprintln!(
            "{} [{}][{}] {}",
            Local::now().format("%H:%M:%S%.3f").to_string().bright_black(),
            level,
            record.target(),
            record.args()
        );
    }

    fn flush(&self) {}
}

/// `LOG` 环境变量的取值对应的级别，默认只输出警告和错误
pub fn level_from(value: Option<&str>) -> LevelFilter {
    match value.map(str::to_ascii_uppercase).as_deref() {
        Some("ERROR") => LevelFilter::Error,
        Some("WARN") => LevelFilter::Warn,
        Some("INFO") => LevelFilter::Info,
        Some("DEBUG") => LevelFilter::Debug,
        Some("TRACE") => LevelFilter::Trace,
        Some("OFF") => LevelFilter::Off,
        _ => LevelFilter::Warn,
    }
}

/// 初始化日志，重复调用无效果
pub fn init() {
    static LOGGER: ShellLogger = ShellLogger;
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(level_from(std::env::var("LOG").ok().as_deref()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_names_are_case_insensitive() {
        assert_eq!(level_from(Some("debug")), LevelFilter::Debug);
        assert_eq!(level_from(Some("TRACE")), LevelFilter::Trace);
        assert_eq!(level_from(Some("nonsense")), LevelFilter::Warn);
        assert_eq!(level_from(None), LevelFilter::Warn);
    }
}
