use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver};
use std::{io::Write, thread};

use chrono::Local;

use super::constants::{LOGGER_THREAD_NAME, LOG_FILE_EXTENSION};
use super::logger_error::LoggerError;
use super::logger_sender::LoggerSender;

/// A logger that writes into a file inside a given directory.
///
/// The logger works with channels: a receiver thread owns the log file
/// and any number of `LoggerSender` clones feed it, so it can be used
/// from multiple threads at the same time. When the file grows past the
/// configured size a fresh file is started.
///
/// To clone the sender's channel it has a new_sender() method which
/// returns a LoggerSender struct.
#[derive(Debug)]
pub struct Logger {
    sender: LoggerSender,
}

impl Logger {
    /// Constructs a new Logger writing under `dir_path`.
    ///
    /// In case of success it returns a Logger struct and creates a new
    /// log file at the directory path.
    ///
    /// It returns a LoggerError if:
    /// - There was a problem creating the logging directory.
    /// - A new file could not be created at the logging directory.
    /// - There was a problem creating a new thread for the logger receiver.
    pub fn new(dir_path: &str, max_log_file_kb_size: u32) -> Result<Self, LoggerError> {
        let (sender, receiver) = channel();

        Self::create_log_directory(dir_path)?;
        let file_path = Self::next_file_path(dir_path);
        let file = Self::create_log_file(&file_path)?;
        Self::spawn_receiver(receiver, dir_path.to_string(), file, max_log_file_kb_size)?;

        Ok(Self {
            sender: LoggerSender::new(sender),
        })
    }

    /// Creates a new LoggerSender for the current Logger.
    pub fn new_sender(&self) -> LoggerSender {
        self.sender.clone()
    }

    fn create_log_directory(dir_path: &str) -> Result<(), LoggerError> {
        fs::create_dir_all(dir_path)
            .map_err(|err| LoggerError::LogDirectoryError(format!("{}", err)))
    }

    fn create_log_file(path: &Path) -> Result<File, LoggerError> {
        File::create(path).map_err(|err| LoggerError::LogFileError(format!("{}", err)))
    }

    fn next_file_path(dir_path: &str) -> PathBuf {
        let name = format!(
            "{}.{}",
            Local::now().format("%Y%m%d_%H%M%S%.3f"),
            LOG_FILE_EXTENSION
        );
        Path::new(dir_path).join(name)
    }

    fn spawn_receiver(
        receiver: Receiver<String>,
        dir_path: String,
        file: File,
        max_log_file_kb_size: u32,
    ) -> Result<(), LoggerError> {
        let max_bytes = u64::from(max_log_file_kb_size) * 1024;
        let builder = thread::Builder::new().name(LOGGER_THREAD_NAME.to_string());

        builder
            .spawn(move || {
                let mut file = file;
                while let Ok(line) = receiver.recv() {
                    if let Err(err) = file.write_all(line.as_bytes()) {
                        eprintln!("Error({}) writing to the log", err);
                        continue;
                    }
                    let size = file.metadata().map(|m| m.len()).unwrap_or(0);
                    if size > max_bytes {
                        match Self::create_log_file(&Self::next_file_path(&dir_path)) {
                            Ok(fresh) => file = fresh,
                            Err(err) => eprintln!("Error({:?}) rotating the log file", err),
                        }
                    }
                }
            })
            .map_err(|_| LoggerError::SpawnThreadError)?;

        Ok(())
    }
}
