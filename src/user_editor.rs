//! The user-held edit path: decrypting and rotating a user's own
//! submission using their passphrase, without help from any OC.

use zeroize::Zeroizing;

use crate::codec::ByteCodec;
use crate::crypto::CryptoProvider;
use crate::decryptor::DecryptResult;
use crate::errors::{MalformedEntry, MalformedKind};
use crate::model::{EncryptedData, Record};

const AD_USER_EDIT: &[u8] = b"user edit";
const AD_RECORD: &[u8] = b"record";

/// Decrypts `entries` (the per-OC copies of one user's own submission)
/// using `passphrase`. Each entry is attempted independently; a well-formed
/// submission yields one identical [`Record`] per surviving entry (the
/// spec tolerates this duplication rather than deduplicating).
#[must_use]
pub fn decrypt_user_record(
    crypto: CryptoProvider,
    passphrase: &[u8],
    entries: &[EncryptedData],
) -> DecryptResult {
    let mut records = Vec::new();
    let mut malformed = Vec::new();

    for entry in entries {
        match open_one(crypto, passphrase, entry) {
            Ok(record) => records.push(record),
            Err(kind) => malformed.push(MalformedEntry::new(entry.id.to_string(), kind)),
        }
    }

    DecryptResult { records, malformed }
}

/// Decrypts `entries` the same way as [`decrypt_user_record`], then
/// rewrites each entry's `eRecord` in place under a fresh AEAD nonce with
/// `new_record` as plaintext. `eRecordKey` and `eUser` are untouched.
#[must_use]
pub fn update_user_record(
    crypto: CryptoProvider,
    passphrase: &[u8],
    entries: &mut [EncryptedData],
    new_record: &Record,
) -> Vec<MalformedEntry> {
    let mut malformed = Vec::new();
    let new_record_json = serde_json::to_vec(new_record).expect("Record serialization cannot fail");

    for entry in entries.iter_mut() {
        match record_key_for(crypto, passphrase, entry) {
            Ok(record_key) => {
                let ad = ad(AD_RECORD, &entry.matching_index);
                match crypto.aead_encrypt(&record_key, &new_record_json, &ad) {
                    Ok(e_record) => entry.e_record = e_record,
                    Err(kind) => malformed.push(MalformedEntry::new(entry.id.to_string(), kind)),
                }
            }
            Err(kind) => malformed.push(MalformedEntry::new(entry.id.to_string(), kind)),
        }
    }

    malformed
}

fn open_one(crypto: CryptoProvider, passphrase: &[u8], entry: &EncryptedData) -> Result<Record, MalformedKind> {
    let record_key = record_key_for(crypto, passphrase, entry)?;
    let ad_record = ad(AD_RECORD, &entry.matching_index);
    let plaintext = crypto.aead_decrypt(&record_key, &entry.e_record, &ad_record)?;
    serde_json::from_slice(&plaintext).map_err(|_| MalformedKind::SymmetricDecryptFailure)
}

/// Recovers the raw 32-byte record key from `eUser`. The AEAD plaintext is
/// itself a base64 string (the same encoding `encrypt` uses when storing
/// the record key), so a second decode step is required before the result
/// can be used as an AEAD key — both this path and `encrypt` must agree on
/// that convention.
fn record_key_for(
    crypto: CryptoProvider,
    passphrase: &[u8],
    entry: &EncryptedData,
) -> Result<Zeroizing<Vec<u8>>, MalformedKind> {
    let ad_user = ad(AD_USER_EDIT, &entry.matching_index);
    let record_key_b64 = crypto.aead_decrypt(passphrase, &entry.e_user, &ad_user)?;
    let record_key_b64 =
        String::from_utf8(record_key_b64).map_err(|_| MalformedKind::SymmetricDecryptFailure)?;
    ByteCodec::base64_decode(&record_key_b64)
        .map(Zeroizing::new)
        .map_err(|_| MalformedKind::SymmetricDecryptFailure)
}

fn ad(role: &[u8], matching_index: &str) -> Vec<u8> {
    let mut v = role.to_vec();
    v.extend_from_slice(matching_index.as_bytes());
    v
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encryptor;
    use crate::model::OcKeyMap;

    #[test]
    fn edit_round_trip() {
        use crate::field::FieldArith;

        let crypto = CryptoProvider::new();
        let field = FieldArith::default();
        let mut oc_keys = OcKeyMap::new();
        oc_keys.insert("oc1".into(), [3u8; 32]);
        oc_keys.insert("oc2".into(), [4u8; 32]);

        let passphrase = b"this-is-a-32-byte-user-passphras";
        let record = Record { perp_id: "p".into(), user_id: "u".into() };
        let out = encryptor::encrypt(crypto, &field, &[[1u8; 32]], &record, &oc_keys, passphrase);
        assert!(out.malformed.is_empty());

        let mut entries: Vec<EncryptedData> =
            out.encrypted_map.into_values().flat_map(|m| m.into_values().flatten()).collect();
        assert_eq!(entries.len(), 2);

        let new_record = Record { perp_id: "p".into(), user_id: "u-renamed".into() };
        let malformed = update_user_record(crypto, passphrase, &mut entries, &new_record);
        assert!(malformed.is_empty());

        let result = decrypt_user_record(crypto, passphrase, &entries);
        assert!(result.malformed.is_empty());
        assert_eq!(result.records.len(), 2);
        for record in result.records {
            assert_eq!(record, new_record);
        }
    }

    #[test]
    fn wrong_passphrase_is_malformed() {
        use crate::field::FieldArith;

        let crypto = CryptoProvider::new();
        let field = FieldArith::default();
        let mut oc_keys = OcKeyMap::new();
        oc_keys.insert("oc1".into(), [3u8; 32]);

        let record = Record { perp_id: "p".into(), user_id: "u".into() };
        let out = encryptor::encrypt(
            crypto,
            &field,
            &[[1u8; 32]],
            &record,
            &oc_keys,
            b"correct-horse-battery-staple-32",
        );
        let entries: Vec<EncryptedData> =
            out.encrypted_map.into_values().flat_map(|m| m.into_values().flatten()).collect();

        let result = decrypt_user_record(crypto, b"wrong-passphrase-also-32-bytes!!", &entries);
        assert!(result.records.is_empty());
        assert_eq!(result.malformed.len(), 1);
        assert_eq!(result.malformed[0].error, MalformedKind::SymmetricDecryptFailure);
    }
}
