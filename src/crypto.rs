//! Bindings over the five cryptographic primitives this crate relies on:
//! an AEAD, an anonymous public-key "sealed box", a key-derivation function,
//! a generic hash, and a CSPRNG. Every other module reaches the outside
//! crypto ecosystem only through [`CryptoProvider`].

use blake2::digest::{Update, VariableOutput};
use blake2::Blake2bVar;
use chacha20poly1305::aead::{Aead, AeadCore, KeyInit, OsRng as AeadOsRng, Payload};
use chacha20poly1305::{Key as AeadKey, XChaCha20Poly1305, XNonce};
use crypto_box::{PublicKey, SalsaBox, SecretKey};
use rand::rngs::OsRng;
use rand::RngCore;

use crate::codec::ByteCodec;
use crate::errors::{ImproperKeyLength, KeyDerivationError, MalformedKind};

const AEAD_KEY_LEN: usize = 32;
const SEALED_BOX_EPHEMERAL_PK_LEN: usize = 32;

/// An already-initialized handle to the crypto primitives, injected into
/// [`crate::MatchingEscrow::new`]. It is stateless beyond a CSPRNG handle
/// and is cheap to clone; multiple instances may coexist and share no
/// mutable state, per the concurrency model.
#[derive(Clone, Copy, Debug, Default)]
pub struct CryptoProvider;

impl CryptoProvider {
    /// Construct a new provider. There is no fallible initialization step
    /// in this implementation, but the constructor is kept so call sites
    /// read the same way they would against a binding with real setup
    /// (e.g. a libsodium `sodium_init` check).
    #[must_use]
    pub fn new() -> Self {
        CryptoProvider
    }

    /// Encrypts `plaintext` under `key` with XChaCha20-Poly1305-IETF,
    /// returning the framed ciphertext `base64(ct) ∥ "$" ∥ base64(nonce)`.
    pub fn aead_encrypt(
        self,
        key: &[u8],
        plaintext: &[u8],
        ad: &[u8],
    ) -> Result<String, MalformedKind> {
        let key = check_key_len(key)?;
        let cipher = XChaCha20Poly1305::new(AeadKey::from_slice(key));
        let nonce = XChaCha20Poly1305::generate_nonce(&mut AeadOsRng);
        let ciphertext = cipher
            .encrypt(&nonce, Payload { msg: plaintext, aad: ad })
            .map_err(|_| MalformedKind::SymmetricDecryptFailure)?;
        Ok(format!(
            "{}${}",
            ByteCodec::base64_encode(&ciphertext),
            ByteCodec::base64_encode(nonce.as_slice())
        ))
    }

    /// Decrypts a ciphertext framed as `base64(ct) ∥ "$" ∥ base64(nonce)`
    /// under `key`, with the same `ad` used at encryption time.
    ///
    /// Any authentication failure, malformed framing, or wrong key length
    /// is reported as a [`MalformedKind`] rather than propagated, per this
    /// crate's error-handling policy.
    pub fn aead_decrypt(
        self,
        key: &[u8],
        framed: &str,
        ad: &[u8],
    ) -> Result<Vec<u8>, MalformedKind> {
        let key = check_key_len(key)?;
        let (ct_b64, nonce_b64) =
            framed.split_once('$').ok_or(MalformedKind::SymmetricDecryptFailure)?;
        let ciphertext =
            ByteCodec::base64_decode(ct_b64).map_err(|_| MalformedKind::SymmetricDecryptFailure)?;
        let nonce_bytes = ByteCodec::base64_decode(nonce_b64)
            .map_err(|_| MalformedKind::SymmetricDecryptFailure)?;
        if nonce_bytes.len() != 24 {
            return Err(MalformedKind::SymmetricDecryptFailure);
        }
        let nonce = XNonce::from_slice(&nonce_bytes);
        let cipher = XChaCha20Poly1305::new(AeadKey::from_slice(key));
        cipher
            .decrypt(nonce, Payload { msg: &ciphertext, aad: ad })
            .map_err(|_| MalformedKind::SymmetricDecryptFailure)
    }

    /// Anonymously encrypts `plaintext` for the holder of `receiver_pk`
    /// (X25519 + XSalsa20-Poly1305), in the manner of libsodium's sealed
    /// boxes: a fresh ephemeral key pair is generated, the nonce is derived
    /// from both public keys, and the ephemeral public key is prepended to
    /// the ciphertext so only the receiver's static key is needed to open
    /// it. Returns the base64-encoded sealed ciphertext.
    pub fn seal(self, receiver_pk: &[u8; 32], plaintext: &[u8]) -> String {
        let ephemeral_sk = SecretKey::generate(&mut OsRng);
        let ephemeral_pk = ephemeral_sk.public_key();
        let receiver_pk = PublicKey::from(*receiver_pk);

        let nonce = sealed_box_nonce(ephemeral_pk.as_bytes(), receiver_pk.as_bytes());
        let sbox = SalsaBox::new(&receiver_pk, &ephemeral_sk);
        let ciphertext =
            sbox.encrypt(&nonce, plaintext).expect("sealed-box encryption cannot fail");

        let mut out = Vec::with_capacity(SEALED_BOX_EPHEMERAL_PK_LEN + ciphertext.len());
        out.extend_from_slice(ephemeral_pk.as_bytes());
        out.extend_from_slice(&ciphertext);
        ByteCodec::base64_encode(&out)
    }

    /// Opens a sealed-box ciphertext produced by [`seal`](Self::seal),
    /// given the receiver's key pair.
    pub fn unseal(
        self,
        receiver_pk: &[u8; 32],
        receiver_sk: &[u8; 32],
        ciphertext_b64: &str,
    ) -> Result<Vec<u8>, MalformedKind> {
        let raw = ByteCodec::base64_decode(ciphertext_b64)
            .map_err(|_| MalformedKind::AsymmetricDecryptFailure)?;
        if raw.len() < SEALED_BOX_EPHEMERAL_PK_LEN {
            return Err(MalformedKind::AsymmetricDecryptFailure);
        }
        let (ephemeral_pk_bytes, ciphertext) = raw.split_at(SEALED_BOX_EPHEMERAL_PK_LEN);
        let ephemeral_pk_arr: [u8; 32] =
            ephemeral_pk_bytes.try_into().map_err(|_| MalformedKind::AsymmetricDecryptFailure)?;
        let ephemeral_pk = PublicKey::from(ephemeral_pk_arr);
        let receiver_sk = SecretKey::from(*receiver_sk);

        let nonce = sealed_box_nonce(ephemeral_pk.as_bytes(), receiver_pk);
        let sbox = SalsaBox::new(&ephemeral_pk, &receiver_sk);
        sbox.decrypt(&nonce, ciphertext).map_err(|_| MalformedKind::AsymmetricDecryptFailure)
    }

    /// `derive(out_len, subkey_id, context, master_key)`: a deterministic,
    /// domain-separated subkey derivation built on keyed BLAKE2b, in the
    /// manner of libsodium's `crypto_kdf_derive_from_key` (context bytes
    /// and subkey id are absorbed ahead of the master key's contribution).
    pub fn kdf_derive(
        self,
        out_len: usize,
        subkey_id: u64,
        context: &[u8; 8],
        master_key: &[u8; 32],
    ) -> Result<Vec<u8>, KeyDerivationError> {
        use blake2::digest::Mac;
        use blake2::Blake2bMac512;

        let mut mac = Blake2bMac512::new_from_slice(master_key)
            .map_err(|_| KeyDerivationError::PrimitiveFailure)?;
        mac.update(context);
        mac.update(&subkey_id.to_le_bytes());
        let tag = mac.finalize().into_bytes();
        if out_len > tag.len() {
            return Err(KeyDerivationError::PrimitiveFailure);
        }
        Ok(tag[..out_len].to_vec())
    }

    /// Unkeyed BLAKE2b over `data`, truncated/extended to `out_len` bytes.
    #[must_use]
    pub fn generic_hash(self, out_len: usize, data: &[u8]) -> Vec<u8> {
        let mut hasher = Blake2bVar::new(out_len).expect("valid BLAKE2b output length");
        hasher.update(data);
        let mut out = vec![0u8; out_len];
        hasher.finalize_variable(&mut out).expect("buffer sized to out_len");
        out
    }

    /// Fills `out` with CSPRNG output, for nonces and fresh record keys.
    pub fn random_bytes(self, out: &mut [u8]) {
        OsRng.fill_bytes(out);
    }
}

fn sealed_box_nonce(ephemeral_pk: &[u8; 32], receiver_pk: &[u8; 32]) -> crypto_box::Nonce {
    let mut combined = Vec::with_capacity(64);
    combined.extend_from_slice(ephemeral_pk);
    combined.extend_from_slice(receiver_pk);
    let mut hasher = Blake2bVar::new(24).expect("24 is a valid BLAKE2b output length");
    hasher.update(&combined);
    let mut nonce_bytes = [0u8; 24];
    hasher.finalize_variable(&mut nonce_bytes).expect("buffer sized to 24");
    *crypto_box::Nonce::from_slice(&nonce_bytes)
}

fn check_key_len(key: &[u8]) -> Result<&[u8], MalformedKind> {
    if key.len() != AEAD_KEY_LEN {
        let err = ImproperKeyLength { expected: AEAD_KEY_LEN, actual: key.len() };
        tracing::debug!(expected = err.expected, actual = err.actual, "{err}");
        return Err(MalformedKind::ImproperKeyLength);
    }
    Ok(key)
}
