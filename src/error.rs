use thiserror::Error;

/// Failure talking to the similarity backend.
///
/// Both variants are treated the same by the dashboard: logged for the
/// operator, never turned into view state.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Connection failure, timeout, or a 2xx body that did not decode
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The backend answered with a non-success status
    #[error("backend returned {status}: {body}")]
    Backend { status: u16, body: String },
}

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("{0} is required")]
    MissingField(&'static str),

    #[error(transparent)]
    Api(#[from] ApiError),
}

pub type DeleteError = ApiError;
