use thiserror::Error;

/// The taxonomy of recoverable failures this crate can attribute to a single
/// submission (or to the batch as a whole). Every public operation downgrades
/// failures of this shape into a [`MalformedEntry`] rather than propagating
/// them as a `Result::Err` — see the crate docs on error propagation.
#[derive(Clone, Copy, Debug, Eq, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum MalformedKind {
    /// `encrypt` was called with an empty OC key dictionary.
    NoOcKeys,
    /// `encrypt` was called with a [`crate::model::Record`] missing `perpId` or `userId`.
    MissingFields,
    /// A [`crate::deriver::Deriver`] primitive failed for a given `randId`.
    KeyDerivationFailure,
    /// `decrypt` was called with fewer than two entries.
    NotEnoughMatches,
    /// An entry's matching index appears only once in the input bucket.
    MatchingIndexSingleton,
    /// Opening a sealed-box ciphertext failed.
    AsymmetricDecryptFailure,
    /// An AEAD authentication check failed.
    SymmetricDecryptFailure,
    /// A symmetric key of the wrong length was supplied to a primitive.
    ImproperKeyLength,
}

impl MalformedKind {
    /// A short, stable, human-readable label, used for logging and for the
    /// `error` field of a [`MalformedEntry`].
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            MalformedKind::NoOcKeys => "NoOCKeys",
            MalformedKind::MissingFields => "MissingFields",
            MalformedKind::KeyDerivationFailure => "KeyDerivationFailure",
            MalformedKind::NotEnoughMatches => "NotEnoughMatches",
            MalformedKind::MatchingIndexSingleton => "MatchingIndexSingleton",
            MalformedKind::AsymmetricDecryptFailure => "AsymmetricDecryptFailure",
            MalformedKind::SymmetricDecryptFailure => "SymmetricDecryptFailure",
            MalformedKind::ImproperKeyLength => "ImproperKeyLength",
        }
    }
}

/// A single best-effort failure, tagged with the id of the offending
/// submission (or `"All"` / `"encryption"` per the batch-level conventions
/// described in the crate docs).
#[derive(Clone, Debug, Eq, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MalformedEntry {
    /// The id of the offending entry, `"All"` for a batch-wide precondition
    /// failure, or `"encryption"` for a per-randId failure during `encrypt`.
    pub id: String,
    /// What went wrong.
    pub error: MalformedKind,
}

impl MalformedEntry {
    /// Construct a malformed entry, logging it at `debug` level with no
    /// sensitive material attached.
    #[must_use]
    pub fn new(id: impl Into<String>, error: MalformedKind) -> Self {
        let id = id.into();
        tracing::debug!(id = %id, kind = error.as_str(), "malformed entry");
        MalformedEntry { id, error }
    }
}

/// An error returned when the [`crate::deriver::Deriver`] fails.
///
/// This never crosses the public API — every call site that can observe it
/// converts it into a [`MalformedEntry`] tagged
/// [`MalformedKind::KeyDerivationFailure`].
#[derive(Debug, Error)]
pub enum KeyDerivationError {
    /// The underlying KDF primitive rejected its inputs.
    #[error("key derivation primitive failure")]
    PrimitiveFailure,
}

/// An error in [`crate::field::FieldArith`] operations.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum FieldError {
    /// Two points shared the same `x` coordinate, so the slope between them
    /// is undefined (division by zero in the field).
    #[error("degenerate pair: identical x coordinates mod p")]
    DegenerateSlope,
}

/// A defensive check against a miswired symmetric key, per the "Key length
/// check" requirement on every symmetric decryption.
#[derive(Debug, Error, Eq, PartialEq)]
#[error("expected a {expected}-byte key, got {actual}")]
pub struct ImproperKeyLength {
    pub(crate) expected: usize,
    pub(crate) actual: usize,
}
