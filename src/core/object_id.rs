// Copyright (c) 2026 Amunchain
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//     http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

#![forbid(unsafe_code)]

//! Object identifiers and content hashes.
//!
//! An object identifier is a two-part string `uuid:hex-digest`: a
//! client-generated random token paired with the SHA-256 digest of the
//! payload. The digest component alone (the [`ContentHash`]) names the
//! on-disk file; the full identifier is the key pins and tombstones are
//! recorded under.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Error parsing an object identifier or content hash from a wire string.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// Identifier did not contain exactly one `:` separator.
    #[error("malformed identifier")]
    Malformed,
    /// Digest component was not 64 lowercase hex characters.
    #[error("malformed content hash")]
    BadHash,
}

/// The SHA-256 digest of an object's bytes, as a lowercase hex string.
/// Used verbatim as the on-disk file name in `pinned/` and `cached/`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentHash(String);

impl ContentHash {
    /// Compute the content hash of a payload.
    pub fn of(bytes: &[u8]) -> Self {
        let digest = Sha256::digest(bytes);
        Self(hex::encode(digest))
    }

    /// Borrow the hex string, e.g. for use as a file name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for ContentHash {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 64 || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(ParseError::BadHash);
        }
        Ok(Self(s.to_ascii_lowercase()))
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A two-part object identifier: `<uuid>:<content-hash>`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(String);

impl ObjectId {
    /// Build a fresh identifier for newly uploaded bytes: a random token
    /// paired with the digest of `bytes`.
    pub fn generate(bytes: &[u8]) -> Self {
        let token = uuid::Uuid::new_v4();
        let hash = ContentHash::of(bytes);
        Self(format!("{token}:{hash}"))
    }

    /// Extract the content hash component.
    pub fn content_hash(&self) -> ContentHash {
        // Validated at construction time (`generate` / `FromStr`), so the
        // split and hash parse cannot fail here.
        let (_, hash) = self.0.split_once(':').expect("validated identifier");
        hash.parse().expect("validated identifier")
    }

    /// Borrow the full wire-format string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for ObjectId {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (token, hash) = s.split_once(':').ok_or(ParseError::Malformed)?;
        if uuid::Uuid::parse_str(token).is_err() {
            return Err(ParseError::Malformed);
        }
        let _: ContentHash = hash.parse()?;
        Ok(Self(s.to_string()))
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
