//! The persisted and in-flight data types defined by the protocol.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::ops::Deref;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The plaintext record a user submits: who they're naming, and who they
/// are. Both fields must be non-empty for `encrypt` to accept the record.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Record {
    #[serde(rename = "perpId")]
    pub perp_id: PerpId,
    #[serde(rename = "userId")]
    pub user_id: UserId,
}

impl Record {
    /// A record is well-formed iff both fields are present and non-empty.
    #[must_use]
    pub(crate) fn is_well_formed(&self) -> bool {
        !self.perp_id.is_empty() && !self.user_id.is_empty()
    }
}

/// A point on the secret-sharing line, plus the record key encrypted under
/// the line's intercept `k`. This is the plaintext sealed inside `eOC`; it
/// never touches disk unsealed.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Share {
    /// Decimal-string encoded `x` coordinate (`H(userId)`, interpreted
    /// big-endian per the spec's share-construction convention).
    pub x: String,
    /// Decimal-string encoded `y` coordinate.
    pub y: String,
    /// The record key, AEAD-encrypted under the line's intercept `k`.
    #[serde(rename = "eRecordKey")]
    pub e_record_key: String,
}

/// The per-submission, per-OC unit persisted server-side. `e_record` is the
/// only field ever mutated after creation (by [`crate::user_editor`]); all
/// other fields are immutable for the life of the object.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct EncryptedData {
    /// Uniquely identifies this (submission, OC) ciphertext.
    pub id: Uuid,
    /// Opaque grouping identifier, equal for all submissions naming the
    /// same perpetrator.
    #[serde(rename = "matchingIndex")]
    pub matching_index: String,
    /// Sealed-box ciphertext of the JSON-serialized [`Share`], addressed to
    /// one OC's public key.
    pub e_oc: String,
    /// AEAD ciphertext of the record key under the submitting user's
    /// passphrase.
    pub e_user: String,
    /// AEAD ciphertext of the JSON-serialized [`Record`] under the record
    /// key.
    pub e_record: String,
}

/// `π → (OCid → [EncryptedData])`. Insertion order of either map carries no
/// meaning; only the grouping matters.
pub type EncryptedMap = HashMap<String, HashMap<OcId, Vec<EncryptedData>>>;

/// `OCid → 32-byte X25519 public key`.
pub type OcKeyMap = HashMap<OcId, [u8; 32]>;

macro_rules! string_newtype {
    ($name:ident) => {
        #[doc = concat!("A thin, behaviorless wrapper around the ", stringify!($name), " string, used at the public surface so signatures stay self-documenting.")]
        #[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                $name(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                $name(s)
            }
        }

        impl Deref for $name {
            type Target = str;
            fn deref(&self) -> &str {
                &self.0
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

string_newtype!(OcId);
string_newtype!(UserId);
string_newtype!(PerpId);
