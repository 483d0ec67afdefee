use ssb_ref::MsgRef;
use thiserror::Error as ThisError;

/// Opaque failure from a storage collaborator. The composer does not look
/// inside; it only decides whether the submission can continue.
#[derive(Debug, ThisError)]
#[error("{source}")]
pub struct StorageError {
    source: Box<dyn std::error::Error + Send + Sync + 'static>,
}

impl StorageError {
    pub fn new(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self {
            source: Box::new(err),
        }
    }

    pub fn message(text: impl Into<String>) -> Self {
        Self {
            source: text.into().into(),
        }
    }
}

/// Fatal submission errors. Everything here aborts before any append; an
/// already-stored blob without a message is harmless content-addressed data.
#[derive(Debug, ThisError)]
pub enum ComposeError {
    #[error("Attachment is too big, maximum size is 5 mebibytes (got {size} bytes)")]
    PayloadTooLarge { size: usize },
    #[error("Storage failure: {0}")]
    Storage(#[from] StorageError),
    #[error("Message not found: {0}")]
    NotFound(MsgRef),
}
