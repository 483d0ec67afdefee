// Message shapes follow https://github.com/ssbc/ssb-typescript

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DefaultOnError, OneOrMany};
use ssb_ref::{BlobRef, FeedRef, MsgRef};

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Msg<Content> {
    pub key: MsgRef,
    pub value: MsgValue<Content>,
    #[serde(alias = "timestamp")]
    pub timestamp_received: f64,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct MsgValue<Content> {
    pub author: FeedRef,
    pub sequence: u64,
    #[serde(alias = "timestamp")]
    pub timestamp_asserted: f64,
    pub content: Content,
}

/// Known content types. Anything else in the log deserializes as `Unknown`.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(tag = "type")]
pub enum MsgContent {
    #[serde(rename = "post")]
    Post(PostContent),
    #[serde(other)]
    Unknown,
}

#[serde_as]
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct PostContent {
    pub text: String,
    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    #[serde_as(deserialize_as = "DefaultOnError<Option<OneOrMany<_>>>")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mentions: Option<Vec<Link>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<MsgRef>,
    #[serde_as(deserialize_as = "DefaultOnError<Option<OneOrMany<_>>>")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<Vec<MsgRef>>,
    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fork: Option<MsgRef>,
    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(
        rename = "contentWarning",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub content_warning: Option<String>,
}

impl PostContent {
    /// A bare post with nothing but text, the starting point for drafts.
    pub fn new(text: String) -> Self {
        Self {
            text,
            channel: None,
            mentions: None,
            root: None,
            branch: None,
            fork: None,
            content_warning: None,
        }
    }
}

#[serde_as]
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Link {
    Feed {
        link: FeedRef,
        #[serde_as(deserialize_as = "DefaultOnError")]
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
    Msg {
        link: MsgRef,
        #[serde_as(deserialize_as = "DefaultOnError")]
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
    Blob(BlobLink),
}

#[serde_as]
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct BlobLink {
    pub link: BlobRef,
    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(alias = "type", default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}
