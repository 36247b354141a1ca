//! Builds one user's submission: shares, a fresh record key, three layered
//! ciphertexts, and per-OC fan-out.

use num_bigint::BigUint;
use uuid::Uuid;
use zeroize::Zeroizing;

use crate::codec::ByteCodec;
use crate::crypto::CryptoProvider;
use crate::deriver::Deriver;
use crate::errors::{MalformedEntry, MalformedKind};
use crate::field::FieldArith;
use crate::model::{EncryptedData, EncryptedMap, OcId, OcKeyMap, Record, Share};

const AD_RECORD_KEY: &[u8] = b"record key";
const AD_USER_EDIT: &[u8] = b"user edit";
const AD_RECORD: &[u8] = b"record";

/// The result of [`encrypt`]: the nested `π → OCid → [EncryptedData]` map,
/// plus any best-effort failures encountered along the way.
#[derive(Debug, Default)]
pub struct EncryptResult {
    pub encrypted_map: EncryptedMap,
    pub malformed: Vec<MalformedEntry>,
}

/// Encrypts `record` once per `rand_id`, fanning each submission out to
/// every OC in `oc_keys`.
///
/// Pre-validation (an empty OC dictionary or a malformed record) aborts
/// the whole call with a single `"All"`-tagged malformed entry and no
/// partial encryption. Per-`rand_id` failures are independent: one bad
/// `rand_id` does not prevent the others from succeeding.
#[must_use]
pub fn encrypt(
    crypto: CryptoProvider,
    field: &FieldArith,
    rand_ids: &[[u8; 32]],
    record: &Record,
    oc_keys: &OcKeyMap,
    user_passphrase: &[u8],
) -> EncryptResult {
    if oc_keys.is_empty() {
        return EncryptResult {
            encrypted_map: EncryptedMap::new(),
            malformed: vec![MalformedEntry::new("All", MalformedKind::NoOcKeys)],
        };
    }
    if !record.is_well_formed() {
        return EncryptResult {
            encrypted_map: EncryptedMap::new(),
            malformed: vec![MalformedEntry::new("All", MalformedKind::MissingFields)],
        };
    }

    let deriver = Deriver::new(crypto);
    let mut encrypted_map = EncryptedMap::new();
    let mut malformed = Vec::new();

    for rand_id in rand_ids {
        match encrypt_one(crypto, field, deriver, rand_id, record, oc_keys, user_passphrase) {
            Ok((matching_index, per_oc)) => {
                let bucket = encrypted_map.entry(matching_index).or_default();
                for (oc_id, data) in per_oc {
                    bucket.entry(oc_id).or_default().push(data);
                }
            }
            Err(kind) => malformed.push(MalformedEntry::new("encryption", kind)),
        }
    }

    EncryptResult { encrypted_map, malformed }
}

fn encrypt_one(
    crypto: CryptoProvider,
    field: &FieldArith,
    deriver: Deriver,
    rand_id: &[u8; 32],
    record: &Record,
    oc_keys: &OcKeyMap,
    user_passphrase: &[u8],
) -> Result<(String, Vec<(OcId, EncryptedData)>), MalformedKind> {
    let derived = deriver.derive(rand_id).map_err(|_| MalformedKind::KeyDerivationFailure)?;
    let pi = derived.matching_index.clone();

    // U = int(BLAKE2b_hex(32, userId), base 16): interpret the hash as a
    // big-endian integer.
    let user_hash = crypto.generic_hash(32, record.user_id.as_bytes());
    let u = BigUint::from_bytes_be(&user_hash);

    let p = field.prime();
    let k_int = ByteCodec::bytes_to_int(&derived.k);
    let s = (&derived.slope * &u + &k_int) % p;

    let mut record_key_bytes = [0u8; 32];
    crypto.random_bytes(&mut record_key_bytes);
    let record_key = Zeroizing::new(record_key_bytes);

    let e_record_key = crypto.aead_encrypt(
        &derived.k[..],
        ByteCodec::base64_encode(&record_key[..]).as_bytes(),
        &ad(AD_RECORD_KEY, &pi),
    )?;
    let e_user = crypto.aead_encrypt(
        user_passphrase,
        ByteCodec::base64_encode(&record_key[..]).as_bytes(),
        &ad(AD_USER_EDIT, &pi),
    )?;
    let record_json = serde_json::to_vec(record).expect("Record serialization cannot fail");
    let e_record = crypto.aead_encrypt(&record_key[..], &record_json, &ad(AD_RECORD, &pi))?;

    let record_id = Uuid::new_v4();
    let share = Share { x: u.to_string(), y: s.to_string(), e_record_key };
    let share_json = serde_json::to_vec(&share).expect("Share serialization cannot fail");

    let mut per_oc = Vec::with_capacity(oc_keys.len());
    for (oc_id, pk_oc) in oc_keys {
        let e_oc = crypto.seal(pk_oc, &share_json);
        per_oc.push((
            oc_id.clone(),
            EncryptedData {
                id: record_id,
                matching_index: pi.clone(),
                e_oc,
                e_user: e_user.clone(),
                e_record: e_record.clone(),
            },
        ));
    }

    Ok((pi, per_oc))
}

fn ad(role: &[u8], matching_index: &str) -> Vec<u8> {
    let mut v = role.to_vec();
    v.extend_from_slice(matching_index.as_bytes());
    v
}
