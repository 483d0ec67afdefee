use base64::{engine::general_purpose::STANDARD as b64, DecodeError, Engine};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use thiserror::Error as ThisError;

/// All SSB refs wrap a 32-byte hash or public key.
pub const HASH_LEN: usize = 32;

#[derive(Clone, Debug, ThisError)]
pub enum RefError {
    #[error("Does not match as {ref_type}: {input}")]
    BadFormat {
        ref_type: &'static str,
        input: String,
    },
    #[error("Failed to decode base64: {0}")]
    Decode(#[from] DecodeError),
}

macro_rules! sigil_ref {
    ($(#[$doc:meta])* $name:ident, $ref_type:literal, $sigil:literal, $suffix:literal) => {
        $(#[$doc])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(Vec<u8>);

        impl $name {
            pub fn from_hash(hash: [u8; HASH_LEN]) -> Self {
                Self(hash.to_vec())
            }

            pub fn hash(&self) -> &[u8] {
                &self.0
            }

            pub fn single_regex() -> &'static Regex {
                lazy_static! {
                    static ref RE: Regex =
                        canonical_base64($sigil, $suffix, HASH_LEN as u32, true);
                }
                &RE
            }

            pub fn multi_regex() -> &'static Regex {
                lazy_static! {
                    static ref RE: Regex =
                        canonical_base64($sigil, $suffix, HASH_LEN as u32, false);
                }
                &RE
            }

            pub fn is_match(string: &str) -> bool {
                Self::single_regex().is_match(string)
            }
        }

        impl FromStr for $name {
            type Err = RefError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                if !Self::is_match(s) {
                    return Err(RefError::BadFormat {
                        ref_type: $ref_type,
                        input: s.to_string(),
                    });
                }
                let data = &s[1..s.len() - $suffix.len()];
                Ok(Self(b64.decode(data)?))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}{}{}", $sigil, b64.encode(&self.0), $suffix)
            }
        }

        impl TryFrom<String> for $name {
            type Error = RefError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                value.parse()
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> String {
                value.to_string()
            }
        }

        impl From<&$name> for String {
            fn from(value: &$name) -> String {
                value.to_string()
            }
        }
    };
}

sigil_ref!(
    /// A feed (author) ref: `@...=.ed25519`
    FeedRef, "Feed", '@', ".ed25519"
);

sigil_ref!(
    /// A message ref: `%...=.sha256`
    MsgRef, "Msg", '%', ".sha256"
);

sigil_ref!(
    /// A blob ref: `&...=.sha256`, the sha256 of the blob bytes.
    BlobRef, "Blob", '&', ".sha256"
);

// https://github.com/dominictarr/is-canonical-base64/blob/master/index.js
fn canonical_base64(sigil: char, suffix: &str, data_len: u32, anchored: bool) -> Regex {
    let chars = (data_len * 8) / 6;
    let tail = match data_len % 3 {
        0 => "",
        1 => "[AQgw]==",
        _ => "[AEIMQUYcgkosw048]=",
    };

    let body = format!(
        "{}[a-zA-Z0-9/+]{{{}}}{}{}",
        regex::escape(&sigil.to_string()),
        chars,
        tail,
        regex::escape(suffix),
    );
    let re = if anchored {
        format!("^{}$", body)
    } else {
        body
    };

    Regex::new(&re).unwrap()
}
