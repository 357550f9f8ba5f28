use std::path::PathBuf;

pub type AnimResult<T> = Result<T, AnimError>;

#[derive(thiserror::Error, Debug)]
pub enum AnimError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("empty input: {0}")]
    EmptyInput(String),

    #[error("inference error: {0}")]
    Inference(String),

    #[error("encode error: {0}")]
    Encode(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Coarse classification of an [`AnimError`], used by callers to pick exit codes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Decode,
    EmptyInput,
    Inference,
    Encode,
    Other,
}

impl ErrorKind {
    pub fn exit_code(self) -> i32 {
        match self {
            Self::Other => 1,
            Self::Validation => 2,
            Self::NotFound => 3,
            Self::Decode => 4,
            Self::EmptyInput => 5,
            Self::Inference => 6,
            Self::Encode => 7,
        }
    }
}

impl AnimError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(path: impl Into<PathBuf>) -> Self {
        Self::NotFound(path.into())
    }

    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    pub fn empty_input(msg: impl Into<String>) -> Self {
        Self::EmptyInput(msg.into())
    }

    pub fn inference(msg: impl Into<String>) -> Self {
        Self::Inference(msg.into())
    }

    pub fn encode(msg: impl Into<String>) -> Self {
        Self::Encode(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Decode(_) => ErrorKind::Decode,
            Self::EmptyInput(_) => ErrorKind::EmptyInput,
            Self::Inference(_) => ErrorKind::Inference,
            Self::Encode(_) => ErrorKind::Encode,
            Self::Other(_) => ErrorKind::Other,
        }
    }
}
