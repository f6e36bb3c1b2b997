use std::fmt;
use std::sync::mpsc::Sender;
use std::thread;

use chrono::Local;

/// Severity of a log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warn => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

/// A LoggerSender representing the sender channel connected to a Logger.
///
/// There are three ways to write to the log:
///  - `info()` to log information.
///  - `warn()` to log a non critical warning.
///  - `error()` to log a critical error.
///
/// To clone the LoggerSender simply call the `clone()` method.
#[derive(Debug, Clone)]
pub struct LoggerSender {
    sender: Sender<String>,
}

impl LoggerSender {
    /// Creates a new LoggerSender from a clone of an existing sender.
    pub fn new(sender: Sender<String>) -> Self {
        Self { sender }
    }

    /// Writes an Info type log to the connected logger.
    pub fn info(&self, value: &str) {
        self.send(self.format_line(value, LogLevel::Info));
    }

    /// Writes a Warn type log to the connected logger.
    pub fn warn(&self, value: &str) {
        self.send(self.format_line(value, LogLevel::Warn));
    }

    /// Writes an Error type log to the connected logger.
    pub fn error(&self, value: &str) {
        self.send(self.format_line(value, LogLevel::Error));
    }

    fn send(&self, line: String) {
        if self.sender.send(line.clone()).is_err() {
            eprintln!("Logger receiver is gone, dropping log line: {}", line);
        }
    }

    fn format_line(&self, value: &str, level: LogLevel) -> String {
        let timestamp = Local::now().format("[%Y/%m/%d %H:%M:%S]");
        let current_thread = thread::current();
        let thread_name = current_thread.name().unwrap_or("unnamed-thread");
        format!("{} [{}] [{}] - {}\n", timestamp, thread_name, level, value)
    }
}
