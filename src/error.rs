use std::{fmt, panic::Location};

/// What failed and where it was raised. The message is owned by the
/// descriptor; nothing here borrows from a transient buffer.
#[derive(Debug, Clone)]
pub struct Descriptor {
    message: String,
    file: &'static str,
    line: u32,
}

impl Descriptor {
    #[track_caller]
    pub(crate) fn new(message: impl Into<String>) -> Self {
        let loc = Location::caller();
        Self {
            message: message.into(),
            file: loc.file(),
            line: loc.line(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn file(&self) -> &'static str {
        self.file
    }

    pub fn line(&self) -> u32 {
        self.line
    }
}

impl fmt::Display for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}.", self.message, self.file, self.line)
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    #[error("Out of capacity: {0}")]
    OutOfCapacity(Descriptor),

    #[error("Invalid request size: {0}")]
    InvalidRequestSize(Descriptor),
}

impl Error {
    #[track_caller]
    pub(crate) fn out_of_capacity(message: impl Into<String>) -> Self {
        Error::OutOfCapacity(Descriptor::new(message))
    }

    #[track_caller]
    pub(crate) fn invalid_request_size(message: impl Into<String>) -> Self {
        Error::InvalidRequestSize(Descriptor::new(message))
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
