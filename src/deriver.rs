//! Derives a slope, an intercept key, and a matching index from a single
//! 32-byte `randId` supplied by the (out-of-scope) OPRF step.

use num_bigint::BigUint;
use zeroize::Zeroizing;

use crate::codec::ByteCodec;
use crate::crypto::CryptoProvider;
use crate::errors::KeyDerivationError;

/// The 8-byte KDF contexts used at each derivation step. The spec names
/// these steps with longer descriptive strings ("slope derivation", "key
/// derivation", "matching index derivation"); `CryptoPrims`'s
/// `derive-from-key` binding takes a fixed 8-byte context (matching
/// libsodium's `crypto_kdf_derive_from_key`), so each is mapped to an
/// 8-byte mnemonic here. This mapping is itself part of the domain
/// separation and must not change once data has been persisted.
mod context {
    pub const SLOPE: &[u8; 8] = b"slopeder";
    pub const KEY: &[u8; 8] = b"keyderiv";
    pub const MATCHING_INDEX: &[u8; 8] = b"matchidx";
}

/// The three values derived from a `randId`: the secret-sharing line's
/// slope, its intercept (the symmetric key `k`), and the opaque matching
/// index `π` that group submissions about the same perpetrator.
pub struct Derived {
    /// The line's slope `a`, already reduced to a field element.
    pub slope: BigUint,
    /// The intercept / symmetric key `k`, 32 raw bytes. Zeroized on drop.
    pub k: Zeroizing<[u8; 32]>,
    /// The opaque, base64-encoded matching index.
    pub matching_index: String,
}

/// Derives [`Derived`] from a 32-byte `randId`.
#[derive(Clone, Copy, Debug, Default)]
pub struct Deriver {
    crypto: CryptoProvider,
}

impl Deriver {
    /// Construct a deriver bound to the given crypto provider.
    #[must_use]
    pub fn new(crypto: CryptoProvider) -> Self {
        Deriver { crypto }
    }

    /// Runs the five-step derivation in `spec.md` §4.4.
    ///
    /// # Errors
    ///
    /// Returns [`KeyDerivationError`] if any underlying KDF call fails.
    /// Callers attribute this to the offending `randId` and downgrade it to
    /// a `MalformedEntry` tagged `KeyDerivationFailure`; it never otherwise
    /// crosses the public API.
    pub fn derive(self, rand_id: &[u8; 32]) -> Result<Derived, KeyDerivationError> {
        // Step 1: a = KDF(32, 1, "slope derivation", randId).
        let a = self.crypto.kdf_derive(32, 1, context::SLOPE, rand_id)?;
        let a: [u8; 32] = a.try_into().map_err(|_| KeyDerivationError::PrimitiveFailure)?;

        // Step 2: k = KDF(32, 2, "key derivation", randId).
        let k = self.crypto.kdf_derive(32, 2, context::KEY, rand_id)?;
        let k: Zeroizing<[u8; 32]> = Zeroizing::new(
            <[u8; 32]>::try_from(k.as_slice()).map_err(|_| KeyDerivationError::PrimitiveFailure)?,
        );

        // Step 3: ak = BLAKE2b(32, base64(a) || base64(k)).
        let mut ak_input = ByteCodec::base64_encode(&a).into_bytes();
        ak_input.extend_from_slice(ByteCodec::base64_encode(k.as_ref()).as_bytes());
        let ak = self.crypto.generic_hash(32, &ak_input);
        let ak: [u8; 32] = ak.try_into().map_err(|_| KeyDerivationError::PrimitiveFailure)?;

        // Step 4: pi = base64(KDF(32, 3, "matching index derivation", ak)).
        let pi_bytes = self.crypto.kdf_derive(32, 3, context::MATCHING_INDEX, &ak)?;
        let matching_index = ByteCodec::base64_encode(&pi_bytes);

        // Step 5: slope = bytes_to_int(a) mod p (reduction happens on first use).
        let slope = ByteCodec::bytes_to_int(&a);

        Ok(Derived { slope, k, matching_index })
    }
}
