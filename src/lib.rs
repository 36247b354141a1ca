#![warn(missing_docs)]

//! A cryptographic core for a two-report matching escrow protocol.
//!
//! Two users independently report the same perpetrator without either
//! learning the other's identity until a quorum (here, exactly two)
//! submissions name the same person. Each submission is secret-shared
//! across one or more oblivious custodians (OCs) with a simple two-point
//! line: only when an OC sees two shares on the same line can it
//! reconstruct the line's intercept and, with it, the record key that
//! unlocks both users' records.
//!
//! ```
//! use matching_escrow_core::{CryptoProvider, MatchingEscrow, OcKeyMap, Record};
//!
//! let crypto = CryptoProvider::new();
//! let escrow = MatchingEscrow::new(crypto);
//!
//! let mut oc_keys = OcKeyMap::new();
//! oc_keys.insert("oc1".into(), [9u8; 32]);
//!
//! let record = Record { perp_id: "perp-handle".into(), user_id: "alice".into() };
//! let passphrase = b"at-least-one-byte-but-really-32b";
//! let out = escrow.encrypt(&[[1u8; 32]], &record, &oc_keys, passphrase);
//! assert!(out.malformed.is_empty());
//! ```
//!
//! # Error handling
//!
//! Every public operation is best-effort over a batch: a malformed or
//! unmatched entry is reported as a [`MalformedEntry`] tagged with the
//! offending id and a [`MalformedKind`], never as a propagated `Result::Err`
//! that would abort the whole batch. The only `Result`-returning internals
//! are in [`field`] and [`deriver`], and every caller that can observe them
//! downgrades the error into a `MalformedEntry` before it crosses a public
//! boundary.
//!
//! # Logging
//!
//! This crate emits [`tracing`] events at `debug` level when an entry is
//! flagged malformed (see [`errors::MalformedEntry::new`]). It does not
//! install a subscriber; embedding applications choose how (or whether) to
//! collect these events.

pub mod bucketer;
pub mod codec;
pub mod crypto;
pub mod decryptor;
pub mod deriver;
pub mod encryptor;
pub mod errors;
pub mod field;
pub mod model;
pub mod user_editor;

pub use crypto::CryptoProvider;
pub use decryptor::DecryptResult;
pub use encryptor::EncryptResult;
pub use errors::{MalformedEntry, MalformedKind};
pub use field::{FieldArith, FieldParams};
pub use model::{EncryptedData, EncryptedMap, OcId, OcKeyMap, PerpId, Record, Share, UserId};

/// The protocol's entry point: a thin, stateless facade over
/// [`encryptor`], [`decryptor`], and [`user_editor`], bound to one
/// [`CryptoProvider`] and the field arithmetic's modulus.
///
/// Cheap to construct and to clone; holds no mutable state of its own, so
/// one instance may be shared across threads or reused per request.
#[derive(Clone, Debug, Default)]
pub struct MatchingEscrow {
    crypto: CryptoProvider,
    field: FieldArith,
}

impl MatchingEscrow {
    /// Construct an escrow bound to `crypto`, using the protocol's default
    /// field modulus (`p = 2^256 + 297`).
    #[must_use]
    pub fn new(crypto: CryptoProvider) -> Self {
        MatchingEscrow { crypto, field: FieldArith::default() }
    }

    /// Construct an escrow bound to `crypto` and a custom [`FieldParams`],
    /// for tests that want a smaller modulus.
    #[must_use]
    pub fn with_field(crypto: CryptoProvider, params: FieldParams) -> Self {
        MatchingEscrow { crypto, field: FieldArith::new(params) }
    }

    /// Encrypts `record` once per `rand_id`, fanning each submission out to
    /// every OC in `oc_keys`. See [`encryptor::encrypt`].
    #[must_use]
    pub fn encrypt(
        &self,
        rand_ids: &[[u8; 32]],
        record: &Record,
        oc_keys: &OcKeyMap,
        user_passphrase: &[u8],
    ) -> EncryptResult {
        encryptor::encrypt(self.crypto, &self.field, rand_ids, record, oc_keys, user_passphrase)
    }

    /// Opens and pairs one OC's view of a bucket of ciphertexts. See
    /// [`decryptor::decrypt`].
    #[must_use]
    pub fn decrypt(
        &self,
        entries: &[EncryptedData],
        oc_pk: &[u8; 32],
        oc_sk: &[u8; 32],
    ) -> DecryptResult {
        decryptor::decrypt(self.crypto, &self.field, entries, oc_pk, oc_sk)
    }

    /// Decrypts a user's own submission(s) with their passphrase, without
    /// OC involvement. See [`user_editor::decrypt_user_record`].
    #[must_use]
    pub fn decrypt_user_record(&self, user_passphrase: &[u8], entries: &[EncryptedData]) -> DecryptResult {
        user_editor::decrypt_user_record(self.crypto, user_passphrase, entries)
    }

    /// Rewrites a user's own submission(s) in place with `new_record`. See
    /// [`user_editor::update_user_record`].
    #[must_use]
    pub fn update_user_record(
        &self,
        user_passphrase: &[u8],
        entries: &mut [EncryptedData],
        new_record: &Record,
    ) -> Vec<MalformedEntry> {
        user_editor::update_user_record(self.crypto, user_passphrase, entries, new_record)
    }
}
