use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Transport failure, timeout or non-success HTTP status.
    #[error("Network error: {0}")]
    Network(String),

    /// Identifier or file absent from a response payload.
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("License rejected: {0}")]
    LicenseRejected(String),

    #[error("No candidate found for {0}")]
    NoCandidate(String),

    #[error("Entity {0} has no representative image")]
    NoImageClaim(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Errors that only concern the catalog entry being resolved. Anything else
    /// aborts the run.
    pub fn is_entry_local(&self) -> bool {
        matches!(
            self,
            Error::Network(_)
                | Error::NotFound(_)
                | Error::LicenseRejected(_)
                | Error::NoCandidate(_)
                | Error::NoImageClaim(_)
        )
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Network(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_local_kinds() {
        assert!(Error::Network("timeout".into()).is_entry_local());
        assert!(Error::LicenseRejected("All rights reserved".into()).is_entry_local());
        assert!(Error::NoImageClaim("Q1".into()).is_entry_local());
        assert!(!Error::Config("bad rules".into()).is_entry_local());
        assert!(!Error::Io(std::io::Error::new(std::io::ErrorKind::NotFound, "gone")).is_entry_local());
    }
}
