//! The orchestrator: one submission in, one preview or published message
//! out. Each call owns its own buffers; the only shared resources are the
//! injected collaborators.

use log::debug;
use serde_json::Value;
use ssb_msg::{Link, Msg, MsgContent, PostContent};
use ssb_ref::{FeedRef, MsgRef};

use crate::{
    blob::{ingest, markdown_fragment, Attachment},
    error::{ComposeError, StorageError},
    graph::{AuthorProfile, MentionCandidate, SocialGraph},
    mention::{resolve_mentions, PendingMention},
    store::{BlobStore, LogStore},
    thread::{resolve_thread, ThreadContext},
};

/// Raw form input as the HTTP layer hands it over.
#[derive(Clone, Debug, Default)]
pub struct Submission {
    pub text: String,
    pub content_warning: Option<String>,
    pub attachment: Option<Attachment>,
    pub reply_to: Option<MsgRef>,
    /// Split the reply off into its own subtopic instead of continuing the
    /// parent's thread.
    pub fork: bool,
}

/// Everything a preview page needs. Never persisted.
#[derive(Clone, Debug)]
pub struct Preview {
    pub text: String,
    pub pending_mentions: Vec<PendingMention>,
    pub author: AuthorProfile,
    pub content_warning: Option<String>,
    pub thread: Option<ThreadContext>,
}

/// Sequences blob ingestion, mention resolution and thread placement over
/// collaborators borrowed for the lifetime of the request.
pub struct Composer<'a, G, B, L> {
    graph: &'a G,
    blobs: &'a B,
    log: &'a L,
    author: FeedRef,
}

struct Composed {
    text: String,
    resolved: Vec<MentionCandidate>,
    pending: Vec<PendingMention>,
    content_warning: Option<String>,
    thread: Option<ThreadContext>,
}

impl<'a, G, B, L> Composer<'a, G, B, L>
where
    G: SocialGraph,
    B: BlobStore,
    L: LogStore,
{
    pub fn new(graph: &'a G, blobs: &'a B, log: &'a L, author: FeedRef) -> Self {
        Self {
            graph,
            blobs,
            log,
            author,
        }
    }

    // Shared preprocessing: ingest the upload and append its fragment, then
    // resolve mentions over the combined text, then place the reply.
    async fn compose(&self, submission: &Submission) -> Result<Composed, ComposeError> {
        let mut text = submission.text.clone();
        if let Some(attachment) = &submission.attachment {
            if let Some(blob) = ingest(self.blobs, attachment).await? {
                text.push_str(&markdown_fragment(&blob));
            }
        }

        let mentions = resolve_mentions(self.graph, &self.author, &text).await;

        let thread = match &submission.reply_to {
            Some(parent_ref) => Some(resolve_thread(self.log, parent_ref).await?),
            None => None,
        };

        let content_warning = submission
            .content_warning
            .as_deref()
            .map(str::trim)
            .filter(|trimmed| !trimmed.is_empty())
            .map(str::to_string);

        Ok(Composed {
            text: mentions.text,
            resolved: mentions.resolved,
            pending: mentions.pending,
            content_warning,
            thread,
        })
    }

    /// Compose without publishing. Uploads are still stored (an unused blob
    /// is harmless content-addressed data); the log is never written.
    pub async fn preview(&self, submission: &Submission) -> Result<Preview, ComposeError> {
        let composed = self.compose(submission).await?;
        let author = self.graph.profile(&self.author).await;

        Ok(Preview {
            text: composed.text,
            pending_mentions: composed.pending,
            author,
            content_warning: composed.content_warning,
            thread: composed.thread,
        })
    }

    /// Compose and append to the log. Pending mentions never block a
    /// publish, the ambiguous `@name` just stays literal in the text.
    pub async fn publish(&self, submission: &Submission) -> Result<Msg<Value>, ComposeError> {
        let composed = self.compose(submission).await?;
        if !composed.pending.is_empty() {
            debug!(
                "publishing with {} unresolved mention names",
                composed.pending.len()
            );
        }

        let mut post = PostContent::new(composed.text);
        post.content_warning = composed.content_warning;
        if !composed.resolved.is_empty() {
            post.mentions = Some(
                composed
                    .resolved
                    .into_iter()
                    .map(|candidate| Link::Feed {
                        link: candidate.feed,
                        name: Some(candidate.name),
                    })
                    .collect(),
            );
        }

        if let Some(thread) = composed.thread {
            if submission.fork {
                // a subtopic anchors at the forked-from message and keeps a
                // pointer back to the thread it split away from
                post.root = Some(thread.parent.key.clone());
                post.fork = Some(thread.root.key.clone());
            } else {
                post.root = Some(thread.root.key.clone());
                post.branch = Some(vec![thread.parent.key.clone()]);
            }
        }

        let content = serde_json::to_value(MsgContent::Post(post)).map_err(StorageError::new)?;
        Ok(self.log.append(content).await?)
    }
}
