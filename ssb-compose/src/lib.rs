//! Content composition and threading for an append-only social feed.
//!
//! The pipeline turns a raw submission (text, optional upload, optional
//! parent message) into either a preview or a publish-ready post: uploads
//! are sanitized and content-addressed ([`blob`]), `@name` tokens are
//! disambiguated against the social graph ([`mention`]), and replies are
//! anchored in their thread ([`thread`]). [`Composer`] sequences the three
//! over collaborators injected per instance, so the whole pipeline runs
//! against fakes in tests (see [`memory`]).

pub mod blob;
pub mod compose;
pub mod error;
pub mod graph;
pub mod memory;
pub mod mention;
pub mod store;
pub mod thread;

pub use blob::{Attachment, Sanitized, MAX_BLOB_BYTES};
pub use compose::{Composer, Preview, Submission};
pub use error::{ComposeError, StorageError};
pub use graph::{AuthorProfile, MentionCandidate, NamedFeed, Relationship, SocialGraph};
pub use mention::{MentionResolution, PendingMention};
pub use store::{BlobStore, LogStore};
pub use thread::ThreadContext;
