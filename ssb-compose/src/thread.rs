//! Thread placement for replies: find the root a new reply anchors to and
//! the known members under it.

use log::trace;
use serde_json::Value;
use ssb_msg::{Msg, MsgContent, PostContent};
use ssb_ref::MsgRef;

use crate::{error::ComposeError, store::LogStore};

/// The parent being replied to, the resolved thread root, and every known
/// member of that thread (root included, appended last).
#[derive(Clone, Debug)]
pub struct ThreadContext {
    pub parent: Msg<Value>,
    pub root: Msg<Value>,
    pub members: Vec<Msg<Value>>,
}

/// Resolve the thread a reply to `parent_ref` belongs in.
///
/// A parent that declares both `root` and `fork` is itself the anchor for
/// new replies: a forked subtopic keeps its own fork point rather than
/// walking up to the original root. Resolution is idempotent, resolving
/// against a root returns that root.
pub async fn resolve_thread<L: LogStore + ?Sized>(
    log: &L,
    parent_ref: &MsgRef,
) -> Result<ThreadContext, ComposeError> {
    let parent = log
        .get(parent_ref)
        .await?
        .ok_or_else(|| ComposeError::NotFound(parent_ref.clone()))?;

    // misformatted or non-post content anchors at the parent itself
    let content: MsgContent =
        serde_json::from_value(parent.value.content.clone()).unwrap_or(MsgContent::Unknown);

    let root = match content {
        MsgContent::Post(PostContent {
            root: Some(_),
            fork: Some(_),
            ..
        }) => parent.clone(),
        MsgContent::Post(PostContent {
            root: Some(root_ref),
            fork: None,
            ..
        }) => log
            .get(&root_ref)
            .await?
            .ok_or(ComposeError::NotFound(root_ref))?,
        _ => parent.clone(),
    };

    let mut members = log.thread_members(&root.key).await?;
    trace!("thread {} has {} known replies", root.key, members.len());
    members.push(root.clone());

    Ok(ThreadContext {
        parent,
        root,
        members,
    })
}
