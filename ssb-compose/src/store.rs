use async_trait::async_trait;
use serde_json::Value;
use ssb_msg::Msg;
use ssb_ref::{BlobRef, MsgRef};

use crate::error::StorageError;

/// Content-addressed blob storage collaborator.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store bytes and return their ref. Identical bytes yield an identical
    /// ref, and re-adding existing content must not be an error, so
    /// concurrent duplicate adds are merely redundant work.
    async fn add(&self, bytes: &[u8]) -> Result<BlobRef, StorageError>;
}

/// Append-only message log collaborator.
#[async_trait]
pub trait LogStore: Send + Sync {
    async fn get(&self, key: &MsgRef) -> Result<Option<Msg<Value>>, StorageError>;

    /// Known replies under a thread root. The root itself is not expected
    /// in the listing; the thread resolver appends it.
    async fn thread_members(&self, root: &MsgRef) -> Result<Vec<Msg<Value>>, StorageError>;

    /// Append a draft content object. The log assigns key, author and
    /// timestamps; the message is durable once this returns.
    async fn append(&self, content: Value) -> Result<Msg<Value>, StorageError>;
}
