use std::fmt::{self, Display};

use serde::Serialize;
use warp::reject;

/// Error surfaced to the caller. `code` is the HTTP status the reply is rendered with.
#[derive(Debug, Clone, Serialize)]
pub struct Error {
    pub code: u16,
    pub info: Option<String>,
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.info {
            Some(info) => write!(f, "{} ({})", self.code, info),
            None => write!(f, "{}", self.code),
        }
    }
}

impl std::error::Error for Error {}
impl reject::Reject for Error {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HtmlError {
    InvalidRequest,
    Unauthorized,
    Forbidden,
    NotFound,
    InvalidSession,
    InternalServerError,
}

impl HtmlError {
    pub fn code(&self) -> u16 {
        match self {
            HtmlError::InvalidRequest => 400,
            HtmlError::Unauthorized => 401,
            HtmlError::InvalidSession => 401,
            HtmlError::Forbidden => 403,
            HtmlError::NotFound => 404,
            HtmlError::InternalServerError => 500,
        }
    }

    fn message(&self) -> &'static str {
        match self {
            HtmlError::InvalidRequest => "Invalid request",
            HtmlError::Unauthorized => "Authentication credentials were not provided",
            HtmlError::InvalidSession => "Invalid session",
            HtmlError::Forbidden => "You don't have permission to perform this action",
            HtmlError::NotFound => "Not found",
            HtmlError::InternalServerError => "Internal server error",
        }
    }

    pub fn new(self, info: &str) -> Error {
        Error {
            code: self.code(),
            info: Some(info.to_owned()),
        }
    }

    pub fn default(self) -> Error {
        self.new(self.message())
    }
}

// Postgres SQLSTATE codes
const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";
const CHECK_VIOLATION: &str = "23514";

pub struct QueryError {
    kind: HtmlError,
    info: String,
}

impl QueryError {
    pub fn new(info: String) -> Self {
        Self {
            kind: HtmlError::InternalServerError,
            info,
        }
    }

    pub fn is_unique_violation(&self) -> bool {
        self.kind == HtmlError::InvalidRequest && self.info.starts_with("Already exists")
    }
}

impl From<sqlx::Error> for QueryError {
    fn from(value: sqlx::Error) -> Self {
        match value {
            sqlx::Error::Database(e) => match e.code().as_deref() {
                Some(UNIQUE_VIOLATION) => Self {
                    kind: HtmlError::InvalidRequest,
                    info: format!(
                        "Already exists ({})",
                        e.constraint().unwrap_or("unique constraint")
                    ),
                },
                Some(FOREIGN_KEY_VIOLATION) => Self {
                    kind: HtmlError::NotFound,
                    info: format!(
                        "Referenced object does not exist ({})",
                        e.constraint().unwrap_or("foreign key")
                    ),
                },
                Some(CHECK_VIOLATION) => Self {
                    kind: HtmlError::InvalidRequest,
                    info: format!(
                        "Constraint violated ({})",
                        e.constraint().unwrap_or("check constraint")
                    ),
                },
                _ => Self::new(format!("{e}")),
            },
            sqlx::Error::Configuration(e) => Self::new(format!("{e}")),
            sqlx::Error::Io(e) => Self::new(format!("{e}")),
            sqlx::Error::Tls(e) => Self::new(format!("{e}")),
            sqlx::Error::Protocol(e) => Self::new(e),
            sqlx::Error::RowNotFound => Self {
                kind: HtmlError::NotFound,
                info: String::from("Not found"),
            },
            sqlx::Error::TypeNotFound { type_name } => {
                Self::new(format!("Type not found: {type_name}"))
            }
            sqlx::Error::ColumnIndexOutOfBounds { index, len } => {
                Self::new(format!("Column index out of bounds {index} ({len})"))
            }
            sqlx::Error::ColumnNotFound(e) => Self::new(e),
            sqlx::Error::ColumnDecode { index, source } => {
                Self::new(format!("Column decode {index} ({source})"))
            }
            sqlx::Error::Decode(e) => Self::new(format!("{e}")),
            sqlx::Error::PoolTimedOut => Self::new(String::from("Pool timed out")),
            sqlx::Error::PoolClosed => Self::new(String::from("Pool closed")),
            sqlx::Error::WorkerCrashed => Self::new(String::from("Worker crashed")),
            sqlx::Error::Migrate(e) => Self::new(format!("{e}")),
            _ => Self::new(String::from("Unknown error")),
        }
    }
}

impl From<QueryError> for Error {
    fn from(value: QueryError) -> Self {
        if value.kind == HtmlError::InternalServerError {
            log::error!("Query failed: {}", value.info);
        }
        value.kind.new(&value.info)
    }
}

pub struct CacheError {
    info: String,
}

impl From<redis::RedisError> for CacheError {
    fn from(value: redis::RedisError) -> Self {
        Self {
            info: format!("{:?} - {:?}", value.code(), value.detail()),
        }
    }
}

impl CacheError {
    pub fn new(info: String) -> Self {
        Self { info }
    }
}

impl From<CacheError> for Error {
    fn from(value: CacheError) -> Self {
        HtmlError::InternalServerError.new(&value.info)
    }
}

#[derive(Debug)]
pub struct TypeError {
    info: String,
}

impl TypeError {
    pub fn new(info: &str) -> Self {
        Self {
            info: info.to_string(),
        }
    }
}

impl From<TypeError> for Error {
    fn from(value: TypeError) -> Self {
        HtmlError::InvalidRequest.new(&value.info)
    }
}

impl Display for TypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({})", self.info)
    }
}

impl std::error::Error for TypeError {}
