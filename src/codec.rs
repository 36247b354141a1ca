//! Little-endian 256-bit integer encoding and the base64 framing used
//! throughout this crate's ciphertext formats.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use num_bigint::BigUint;

/// The byte width of every round-tripped field element in this crate.
pub const INT_LEN: usize = 32;

/// Conversions between 32-byte little-endian arrays and arbitrary-precision
/// integers.
#[derive(Clone, Copy, Debug, Default)]
pub struct ByteCodec;

impl ByteCodec {
    /// Interprets `bytes` as a little-endian integer: `result = sum(b[i] << (8*i))`.
    #[must_use]
    pub fn bytes_to_int(bytes: &[u8; INT_LEN]) -> BigUint {
        BigUint::from_bytes_le(bytes)
    }

    /// Encodes `v` as exactly [`INT_LEN`] little-endian bytes, truncating
    /// any bits at or above bit 256. Callers must ensure `v < 2^256` before
    /// round-tripping; the only value this crate round-trips this way is
    /// `k`, a 32-byte KDF output.
    #[must_use]
    pub fn int_to_bytes(v: &BigUint) -> [u8; INT_LEN] {
        let raw = v.to_bytes_le();
        let mut out = [0u8; INT_LEN];
        let n = raw.len().min(INT_LEN);
        out[..n].copy_from_slice(&raw[..n]);
        out
    }

    /// URL-safe, unpadded base64 encoding, used consistently at every
    /// ciphertext boundary in this crate.
    #[must_use]
    pub fn base64_encode(bytes: &[u8]) -> String {
        URL_SAFE_NO_PAD.encode(bytes)
    }

    /// The inverse of [`base64_encode`](Self::base64_encode).
    pub fn base64_decode(s: &str) -> Result<Vec<u8>, base64::DecodeError> {
        URL_SAFE_NO_PAD.decode(s)
    }
}
