use crate::model::UnknownStatus;
use thiserror::Error;

pub type StatusResult<T> = std::result::Result<T, StatusError>;

#[derive(Error, Debug)]
pub enum StatusError {
    /// The mapping produced something that is not a deposit status
    #[error("Status mapping of remote status '{remote}' produced an invalid deposit status: {source}")]
    InvalidMapping {
        remote: String,
        #[source]
        source: UnknownStatus,
    },

    #[error("Invalid status reference '{reference}': {message}")]
    InvalidReference { reference: String, message: String },

    #[error("Unable to retrieve status document '{url}': {source}")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Status document '{url}' returned HTTP {status}")]
    HttpStatus { url: String, status: u16 },

    #[error("Unable to parse status document '{url}': {message}")]
    Parse { url: String, message: String },
}

impl StatusError {
    /// Operator misconfiguration rather than a remote failure
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            StatusError::InvalidMapping { .. } | StatusError::InvalidReference { .. }
        )
    }
}
