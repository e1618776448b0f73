use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use crate::error::{CodeCastError, Result};

const DEFAULT_MAX_LOG_FILES: usize = 5;
const LOG_FILE_PREFIX: &str = "code_cast";

/// Daily-rotated log files next to the console output
pub struct FileLogger {
    log_directory: PathBuf,
    max_files: usize,
    rotation: Rotation,
}

impl FileLogger {
    pub fn new(log_directory: PathBuf) -> Self {
        Self {
            log_directory,
            max_files: DEFAULT_MAX_LOG_FILES,
            rotation: Rotation::DAILY,
        }
    }

    fn file_appender(&self) -> Result<RollingFileAppender> {
        std::fs::create_dir_all(&self.log_directory).map_err(|e| {
            CodeCastError::LoggingError(format!(
                "Failed to create log directory '{}': {}",
                self.log_directory.display(),
                e
            ))
        })?;

        RollingFileAppender::builder()
            .rotation(self.rotation.clone())
            .filename_prefix(LOG_FILE_PREFIX)
            .max_log_files(self.max_files)
            .build(&self.log_directory)
            .map_err(|e| CodeCastError::LoggingError(e.to_string()))
    }
}

/// Installs the global subscriber: `RUST_LOG`-filtered console output, plus
/// plain-text file output when a [`FileLogger`] is given.
///
/// The returned guard flushes the file writer on drop and must be held for
/// the life of the process.
pub fn setup_logging(file_logger: Option<&FileLogger>) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let (file_layer, guard) = match file_logger {
        Some(logger) => {
            let (writer, guard) = tracing_appender::non_blocking(logger.file_appender()?);
            let layer = fmt::layer().with_writer(writer).with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(file_layer)
        .try_init()
        .map_err(|e| CodeCastError::LoggingError(e.to_string()))?;

    Ok(guard)
}
