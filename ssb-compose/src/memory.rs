//! In-memory collaborators: a social graph, a content-addressed blob store
//! and a single-author log. They back the test suite and work as an
//! offline backend; ids follow SSB's sha256 content addressing.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use serde_json::Value;
use sha2::{Digest, Sha256};
use ssb_msg::{Msg, MsgContent, MsgValue};
use ssb_ref::{BlobRef, FeedRef, MsgRef};

use crate::error::StorageError;
use crate::graph::{AuthorProfile, NamedFeed, Relationship, SocialGraph};
use crate::store::{BlobStore, LogStore};

#[derive(Default)]
pub struct MemoryGraph {
    named: Vec<NamedFeed>,
    avatars: HashMap<FeedRef, BlobRef>,
    relationships: HashMap<(FeedRef, FeedRef), Relationship>,
}

impl MemoryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_named(&mut self, name: &str, feed: FeedRef) {
        self.named.push(NamedFeed {
            name: name.to_string(),
            feed,
        });
    }

    pub fn set_avatar(&mut self, feed: FeedRef, image: BlobRef) {
        self.avatars.insert(feed, image);
    }

    pub fn set_relationship(&mut self, own: FeedRef, other: FeedRef, relationship: Relationship) {
        self.relationships.insert((own, other), relationship);
    }
}

#[async_trait]
impl SocialGraph for MemoryGraph {
    async fn find_by_name(&self, name: &str) -> Vec<NamedFeed> {
        self.named
            .iter()
            .filter(|named| named.name == name)
            .cloned()
            .collect()
    }

    async fn relationship(&self, own: &FeedRef, other: &FeedRef) -> Relationship {
        self.relationships
            .get(&(own.clone(), other.clone()))
            .copied()
            .unwrap_or_default()
    }

    async fn profile(&self, feed: &FeedRef) -> AuthorProfile {
        AuthorProfile {
            feed: feed.clone(),
            name: self
                .named
                .iter()
                .find(|named| &named.feed == feed)
                .map(|named| named.name.clone()),
            image: self.avatars.get(feed).cloned(),
        }
    }
}

#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: Mutex<HashMap<BlobRef, Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.blobs.lock().map(|blobs| blobs.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, blob_ref: &BlobRef) -> Option<Vec<u8>> {
        self.blobs
            .lock()
            .ok()
            .and_then(|blobs| blobs.get(blob_ref).cloned())
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn add(&self, bytes: &[u8]) -> Result<BlobRef, StorageError> {
        let blob_ref = BlobRef::from_hash(Sha256::digest(bytes).into());
        let mut blobs = self
            .blobs
            .lock()
            .map_err(|_| StorageError::message("blob store lock poisoned"))?;
        blobs
            .entry(blob_ref.clone())
            .or_insert_with(|| bytes.to_vec());
        Ok(blob_ref)
    }
}

/// Append-only log for a single author.
pub struct MemoryLog {
    author: FeedRef,
    msgs: Mutex<Vec<Msg<Value>>>,
}

impl MemoryLog {
    pub fn new(author: FeedRef) -> Self {
        Self {
            author,
            msgs: Mutex::new(Vec::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.msgs.lock().map(|msgs| msgs.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn now_millis() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as f64)
        .unwrap_or(0.0)
}

#[async_trait]
impl LogStore for MemoryLog {
    async fn get(&self, key: &MsgRef) -> Result<Option<Msg<Value>>, StorageError> {
        let msgs = self
            .msgs
            .lock()
            .map_err(|_| StorageError::message("log lock poisoned"))?;
        Ok(msgs.iter().find(|msg| &msg.key == key).cloned())
    }

    async fn thread_members(&self, root: &MsgRef) -> Result<Vec<Msg<Value>>, StorageError> {
        let msgs = self
            .msgs
            .lock()
            .map_err(|_| StorageError::message("log lock poisoned"))?;
        Ok(msgs
            .iter()
            .filter(|msg| {
                matches!(
                    serde_json::from_value::<MsgContent>(msg.value.content.clone()),
                    Ok(MsgContent::Post(post)) if post.root.as_ref() == Some(root)
                )
            })
            .cloned()
            .collect())
    }

    async fn append(&self, content: Value) -> Result<Msg<Value>, StorageError> {
        let mut msgs = self
            .msgs
            .lock()
            .map_err(|_| StorageError::message("log lock poisoned"))?;

        let timestamp = now_millis();
        let value = MsgValue {
            author: self.author.clone(),
            sequence: msgs.len() as u64 + 1,
            timestamp_asserted: timestamp,
            content,
        };
        let bytes = serde_json::to_vec(&value).map_err(StorageError::new)?;
        let msg = Msg {
            key: MsgRef::from_hash(Sha256::digest(&bytes).into()),
            value,
            timestamp_received: timestamp,
        };
        msgs.push(msg.clone());
        Ok(msg)
    }
}
