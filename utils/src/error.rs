use thiserror::Error as ThisError;

pub type Result<T> = std::result::Result<T, Error>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// 应用级错误 - 描述信息加上可选的底层错误
#[derive(Debug, ThisError)]
#[error("{msg}")]
pub struct Error {
    msg: String,
    #[source]
    source: Option<BoxError>,
}

impl Error {
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            msg: msg.into(),
            source: None,
        }
    }

    /// 包装底层错误，保留原始错误链
    pub fn with_source(msg: impl Into<String>, source: BoxError) -> Self {
        Self {
            msg: msg.into(),
            source: Some(source),
        }
    }

    pub fn message(&self) -> &str {
        &self.msg
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::with_source(format!("I/O error: {}", err), Box::new(err))
    }
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        Error::with_source(format!("Configuration error: {}", err), Box::new(err))
    }
}

impl From<log::SetLoggerError> for Error {
    fn from(err: log::SetLoggerError) -> Self {
        Error::with_source("Failed to install the log bridge", Box::new(err))
    }
}

impl<T> From<std::sync::PoisonError<T>> for Error {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Error::new(format!("Configuration lock poisoned: {}", err))
    }
}
