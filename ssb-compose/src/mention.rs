//! Mention scanning and disambiguation.
//!
//! Text is tokenized into plain runs and `@name` tokens, candidate lookups
//! run concurrently per distinct name, and the rewrite is a single fold
//! over the tokens once every lookup has finished. A token is a mention
//! when the `@` sits at the start of the text or after whitespace (so
//! `[@name](...)` inside an existing link never re-matches), the name is
//! one or more alphanumeric/hyphen characters, and the next character is a
//! sentence delimiter or the end of the text.

use std::borrow::Cow;
use std::collections::HashMap;

use futures::future::join_all;
use itertools::Itertools;
use log::trace;
use serde::Serialize;
use ssb_ref::FeedRef;

use crate::graph::{MentionCandidate, SocialGraph};

/// An `@name` whose target could not be reduced to exactly one feed. The
/// caller presents the candidates as a disambiguation hint; publishing with
/// pending mentions is allowed and leaves the token as plain text.
#[derive(Clone, Debug, Serialize)]
pub struct PendingMention {
    pub name: String,
    pub candidates: Vec<MentionCandidate>,
}

/// Outcome of one resolution pass. `resolved` keeps first-resolved order,
/// which is the order the published `mentions` array uses.
#[derive(Clone, Debug)]
pub struct MentionResolution {
    pub text: String,
    pub resolved: Vec<MentionCandidate>,
    pub pending: Vec<PendingMention>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Token<'a> {
    Text(&'a str),
    Mention { name: &'a str },
}

fn is_delimiter(c: char) -> bool {
    c.is_whitespace() || matches!(c, '.' | ',' | '!' | '?' | ')' | '~')
}

fn tokenize(text: &str) -> Vec<Token<'_>> {
    let bytes = text.as_bytes();
    let mut tokens = Vec::new();
    let mut text_start = 0;
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] != b'@' {
            i += 1;
            continue;
        }

        let boundary_ok = text[..i].chars().next_back().map_or(true, char::is_whitespace);
        let name_start = i + 1;
        let mut name_end = name_start;
        while name_end < bytes.len()
            && (bytes[name_end].is_ascii_alphanumeric() || bytes[name_end] == b'-')
        {
            name_end += 1;
        }
        let delimited =
            name_end == bytes.len() || text[name_end..].chars().next().is_some_and(is_delimiter);

        if !boundary_ok || name_end == name_start || !delimited {
            i = name_end.max(i + 1);
            continue;
        }

        if i > text_start {
            tokens.push(Token::Text(&text[text_start..i]));
        }
        tokens.push(Token::Mention {
            name: &text[name_start..name_end],
        });
        text_start = name_end;
        i = name_end;
    }

    if text_start < bytes.len() {
        tokens.push(Token::Text(&text[text_start..]));
    }

    tokens
}

/// Resolve every `@name` in `text` against the graph, rewriting the
/// unambiguous ones as inline `[@name](@feed)` links. Names the graph does
/// not know at all stay untouched and are not reported.
pub async fn resolve_mentions<G: SocialGraph + ?Sized>(
    graph: &G,
    own: &FeedRef,
    text: &str,
) -> MentionResolution {
    let tokens = tokenize(text);
    let names: Vec<&str> = tokens
        .iter()
        .filter_map(|token| match token {
            Token::Mention { name } => Some(*name),
            Token::Text(_) => None,
        })
        .unique()
        .collect();
    trace!("resolving {} distinct mention names", names.len());

    // lookups for distinct names have no ordering dependency
    let groups: Vec<(&str, Vec<MentionCandidate>)> = join_all(names.iter().map(|&name| async move {
        let mut candidates = Vec::new();
        for named in graph.find_by_name(name).await {
            let relationship = graph.relationship(own, &named.feed).await;
            candidates.push(MentionCandidate {
                name: named.name,
                feed: named.feed,
                relationship,
            });
        }

        // a non-empty set of known contacts beats raw name matches
        let known: Vec<MentionCandidate> = candidates
            .iter()
            .filter(|candidate| candidate.relationship.is_known())
            .cloned()
            .collect();
        let candidates = if known.is_empty() { candidates } else { known };

        (name, candidates)
    }))
    .await;

    let mut resolved: Vec<(&str, MentionCandidate)> = Vec::new();
    let mut pending = Vec::new();
    for (name, mut candidates) in groups {
        if candidates.is_empty() {
            continue;
        }
        if candidates.len() == 1 {
            resolved.push((name, candidates.remove(0)));
        } else {
            pending.push(PendingMention {
                name: name.to_string(),
                candidates,
            });
        }
    }

    let resolved_by_name: HashMap<&str, &MentionCandidate> = resolved
        .iter()
        .map(|(name, candidate)| (*name, candidate))
        .collect();

    let text: String = tokens
        .iter()
        .map(|token| match token {
            Token::Text(slice) => Cow::Borrowed(*slice),
            Token::Mention { name } => match resolved_by_name.get(name) {
                Some(candidate) => {
                    Cow::Owned(format!("[@{}]({})", candidate.name, candidate.feed))
                }
                None => Cow::Owned(format!("@{}", name)),
            },
        })
        .collect();

    MentionResolution {
        text,
        resolved: resolved.into_iter().map(|(_, candidate)| candidate).collect(),
        pending,
    }
}
