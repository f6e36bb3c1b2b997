/// Logger posible errors
#[derive(Debug)]
pub enum LoggerError {
    SpawnThreadError,
    LogDirectoryError(String),
    LogFileError(String),
}
