use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Transport,
    Status(u16),
    InvalidUrl,
    Decode,
    UnknownTarget,
    Config,
    Usage,
}

#[derive(Debug)]
pub struct ClientError {
    pub kind: ErrorKind,
    pub message: String,
}

impl ClientError {
    pub fn transport(err: impl fmt::Display) -> Self {
        Self {
            kind: ErrorKind::Transport,
            message: err.to_string(),
        }
    }

    pub fn status(code: u16) -> Self {
        Self {
            kind: ErrorKind::Status(code),
            message: format!("server responded with status {code}"),
        }
    }

    pub fn invalid_url(input: &str, err: impl fmt::Display) -> Self {
        Self {
            kind: ErrorKind::InvalidUrl,
            message: format!("invalid url '{input}': {err}"),
        }
    }

    pub fn decode(err: impl fmt::Display) -> Self {
        Self {
            kind: ErrorKind::Decode,
            message: err.to_string(),
        }
    }

    pub fn unknown_target(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::UnknownTarget,
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Config,
            message: message.into(),
        }
    }

    pub fn usage(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Usage,
            message: message.into(),
        }
    }
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ClientError {}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => Self::status(status.as_u16()),
            None => Self::transport(err),
        }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        Self::decode(err)
    }
}
