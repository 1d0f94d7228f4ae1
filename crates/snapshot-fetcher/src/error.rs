//! Error types for the snapshot blob fetcher

use std::fmt;

#[derive(Debug)]
pub enum FetchError {
    Http(Box<reqwest::Error>),
    Status { status: u16, url: String },
    InvalidLocator(String),
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::Http(err) => write!(f, "HTTP error: {}", err),
            FetchError::Status { status, url } => {
                write!(f, "Blob store returned status {} for {}", status, url)
            }
            FetchError::InvalidLocator(locator) => write!(f, "Invalid blob locator: {:?}", locator),
        }
    }
}

impl std::error::Error for FetchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FetchError::Http(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        FetchError::Http(Box::new(err))
    }
}

pub type Result<T> = std::result::Result<T, FetchError>;
