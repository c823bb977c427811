use herald_common::FromMessage;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),
    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),
    /// The application backend rejected the delivery outright.
    #[error("delivery failed: HTTP {status}: {body}")]
    Http { status: u16, body: String },
    /// The backend answered 2xx but did not acknowledge the save.
    #[error("unexpected response status: {got}")]
    UnexpectedAck { got: String },
    #[error("{message}")]
    Message { message: String },
}

impl Error {
    #[must_use]
    pub fn http(status: u16, body: impl Into<String>) -> Self {
        Self::Http {
            status,
            body: body.into(),
        }
    }

    #[must_use]
    pub fn unexpected_ack(got: impl Into<String>) -> Self {
        Self::UnexpectedAck { got: got.into() }
    }

    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
        }
    }
}

impl FromMessage for Error {
    fn from_message(message: String) -> Self {
        Self::Message { message }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

herald_common::impl_context!();
