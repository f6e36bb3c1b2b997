pub const LOGGER_THREAD_NAME: &str = "logger";
pub const LOG_FILE_EXTENSION: &str = "log";
