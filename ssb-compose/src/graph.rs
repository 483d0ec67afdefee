use async_trait::async_trait;
use serde::Serialize;
use ssb_ref::{BlobRef, FeedRef};

/// Relationship snapshot between the submitting feed and another feed,
/// taken once per resolution call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Relationship {
    pub follows_me: bool,
    pub following: bool,
    pub blocking: bool,
}

impl Relationship {
    /// Known contact: either side follows and no block is in place.
    pub fn is_known(&self) -> bool {
        (self.follows_me || self.following) && !self.blocking
    }
}

/// A feed as the graph knows it under some name.
#[derive(Clone, Debug, Serialize)]
pub struct NamedFeed {
    pub name: String,
    pub feed: FeedRef,
}

/// One possible target for an `@name` token.
#[derive(Clone, Debug, Serialize)]
pub struct MentionCandidate {
    pub name: String,
    pub feed: FeedRef,
    pub relationship: Relationship,
}

/// Display metadata for the preview header.
#[derive(Clone, Debug, Serialize)]
pub struct AuthorProfile {
    pub feed: FeedRef,
    pub name: Option<String>,
    pub image: Option<BlobRef>,
}

/// Read-only social graph collaborator. Safe to call concurrently.
#[async_trait]
pub trait SocialGraph: Send + Sync {
    /// All feeds the graph knows under `name` (case-sensitive).
    async fn find_by_name(&self, name: &str) -> Vec<NamedFeed>;

    /// Relationship between `own` and `other`.
    async fn relationship(&self, own: &FeedRef, other: &FeedRef) -> Relationship;

    /// Name and avatar for a feed.
    async fn profile(&self, feed: &FeedRef) -> AuthorProfile;
}
