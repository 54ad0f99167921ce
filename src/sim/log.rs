use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicU64, Ordering};

/// Ordered so that a line is printed when its level is at or below the logger's.
#[derive(PartialEq, PartialOrd, Debug, Default, Clone, Copy)]
pub enum LogLevel {
    #[default]
    NONE,
    INFO,
    DEBUG,
}

impl From<u64> for LogLevel {
    /// 0 none, 1 info, 2 and above debug
    fn from(ulevel: u64) -> Self {
        match ulevel {
            0 => LogLevel::NONE,
            1 => LogLevel::INFO,
            _ => LogLevel::DEBUG,
        }
    }
}

impl Display for LogLevel {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            LogLevel::NONE => "NONE",
            LogLevel::INFO => "INFO",
            LogLevel::DEBUG => "DEBUG",
        };
        f.write_str(name)
    }
}

/// Simulator console log. Every line carries the step it was emitted in, which
/// the owner keeps current with [`Logger::set_cycle`].
pub struct Logger {
    level: LogLevel,
    cycle: AtomicU64,
}

impl Logger {
    pub fn new(ulevel: u64) -> Self {
        Logger { level: LogLevel::from(ulevel), cycle: AtomicU64::new(0) }
    }

    pub fn set_cycle(&self, cycle: u64) {
        self.cycle.store(cycle, Ordering::Relaxed);
    }

    pub fn enabled(&self, level: LogLevel) -> bool {
        level != LogLevel::NONE && level <= self.level
    }

    pub fn log(&self, level: LogLevel, args: std::fmt::Arguments<'_>) {
        if self.enabled(level) {
            println!("[{}] @{} {}", level, self.cycle.load(Ordering::Relaxed), args);
        }
    }
}

#[macro_export]
macro_rules! log {
    // usage: log!(logger, LogLevel::INFO, "w{} flushed", warp)
    ($logger:expr, $level:expr, $($arg:tt)+) => {{
        $logger.log($level, format_args!($($arg)+));
    }};
}
#[macro_export]
macro_rules! info {
    ($logger:expr, $($arg:tt)+) => ( $crate::log!($logger, $crate::sim::log::LogLevel::INFO, $($arg)+); )
}
#[macro_export]
macro_rules! debug {
    ($logger:expr, $($arg:tt)+) => ( $crate::log!($logger, $crate::sim::log::LogLevel::DEBUG, $($arg)+); )
}
