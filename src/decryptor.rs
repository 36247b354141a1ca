//! Opens OC ciphertexts into shares, pairs them, reconstructs the shared
//! secret `k`, and opens record keys and records — tolerating malformed or
//! unmatched submissions.

use std::collections::{HashMap, HashSet};

use num_bigint::BigUint;
use uuid::Uuid;
use zeroize::Zeroizing;

use crate::bucketer;
use crate::codec::ByteCodec;
use crate::crypto::CryptoProvider;
use crate::errors::{MalformedEntry, MalformedKind};
use crate::field::{FieldArith, Point};
use crate::model::{EncryptedData, Record, Share};

const AD_RECORD_KEY: &[u8] = b"record key";
const AD_RECORD: &[u8] = b"record";

/// The result of [`decrypt`]: every record that was successfully paired and
/// opened, plus a best-effort accounting of everything that wasn't.
#[derive(Debug, Default)]
pub struct DecryptResult {
    pub records: Vec<Record>,
    pub malformed: Vec<MalformedEntry>,
}

struct OpenedShare {
    point: Point,
    e_record_key: String,
    e_record: String,
    matching_index: String,
}

/// Opens and pairs `entries` (one OC's view of a bucket, possibly mixing
/// several matching indices) using `oc_pk`/`oc_sk`.
#[must_use]
pub fn decrypt(
    crypto: CryptoProvider,
    field: &FieldArith,
    entries: &[EncryptedData],
    oc_pk: &[u8; 32],
    oc_sk: &[u8; 32],
) -> DecryptResult {
    // Step 1: bucket sanity. An empty or single-entry input is reported
    // wholesale as `NotEnoughMatches`; otherwise singletons are flagged and
    // dropped, and remaining groups are flattened back into one pool for
    // the pairing loop, which relies on AEAD/AD as the authoritative signal
    // for correct pairing.
    let (groups, mut malformed) = bucketer::bucket(entries);
    let remaining: Vec<&EncryptedData> = groups.into_iter().flatten().collect();
    if remaining.is_empty() {
        return DecryptResult { records: Vec::new(), malformed };
    }

    // Step 2: open each share.
    let mut shares: HashMap<Uuid, OpenedShare> = HashMap::new();
    for entry in &remaining {
        match open_share(crypto, oc_pk, oc_sk, entry) {
            Ok(opened) => {
                shares.insert(entry.id, opened);
            }
            Err(kind) => malformed.push(MalformedEntry::new(entry.id.to_string(), kind)),
        }
    }

    // Step 3: need at least two surviving shares to reconstruct anything.
    if shares.len() < 2 {
        return DecryptResult { records: Vec::new(), malformed };
    }

    // Step 4: pair-and-reconstruct loop.
    let mut pending: Vec<Uuid> = shares.keys().copied().collect();
    let mut decrypted: HashSet<Uuid> = HashSet::new();
    let mut records = Vec::new();

    while let Some(i1) = pending.pop() {
        let mut matched = false;

        // 4a: try partners that have already been successfully decrypted.
        let already_decrypted: Vec<Uuid> = decrypted.iter().copied().collect();
        for i2 in already_decrypted {
            if try_pair(crypto, field, &shares, i1, i2, &mut records, false).is_some() {
                decrypted.insert(i1);
                matched = true;
                break;
            }
        }

        // 4b: otherwise, scan remaining pending shares, requiring both
        // sides to decrypt cleanly before either is accepted.
        if !matched {
            let candidates: Vec<Uuid> = pending.clone();
            for i2 in candidates {
                if try_pair(crypto, field, &shares, i1, i2, &mut records, true).is_some() {
                    decrypted.insert(i1);
                    decrypted.insert(i2);
                    pending.retain(|&id| id != i2);
                    matched = true;
                    break;
                }
            }
        }

        if !matched {
            malformed.push(MalformedEntry::new(i1.to_string(), MalformedKind::SymmetricDecryptFailure));
        }
    }

    DecryptResult { records, malformed }
}

/// Attempts to reconstruct `k` from `i1` and `i2`'s shares and decrypt
/// `i1`'s record key and record (and, if `require_both` is set, `i2`'s as
/// well). On success the decrypted record(s) are pushed onto `records` and
/// `Some(())` is returned so the caller can mark both ids as matched.
fn try_pair(
    crypto: CryptoProvider,
    field: &FieldArith,
    shares: &HashMap<Uuid, OpenedShare>,
    i1: Uuid,
    i2: Uuid,
    records: &mut Vec<Record>,
    require_both: bool,
) -> Option<()> {
    let s1 = shares.get(&i1)?;
    let s2 = shares.get(&i2)?;

    let slope = field.derive_slope(&s1.point, &s2.point).ok()?;
    let k_bytes = Zeroizing::new(ByteCodec::int_to_bytes(&field.intercept(&s1.point, &slope)));

    let record1 = open_record(crypto, &k_bytes, s1)?;
    if require_both {
        let record2 = open_record(crypto, &k_bytes, s2)?;
        tracing::trace!(i1 = %i1, i2 = %i2, "reconstructed shared secret, paired two shares");
        records.push(record1);
        records.push(record2);
    } else {
        tracing::trace!(i1 = %i1, i2 = %i2, "reconstructed shared secret against an already-decrypted share");
        records.push(record1);
    }
    Some(())
}

fn open_record(crypto: CryptoProvider, k_bytes: &[u8; 32], share: &OpenedShare) -> Option<Record> {
    let ad_key = ad(AD_RECORD_KEY, &share.matching_index);
    let record_key_b64 = crypto.aead_decrypt(k_bytes, &share.e_record_key, &ad_key).ok()?;
    let record_key_b64 = String::from_utf8(record_key_b64).ok()?;
    let record_key = Zeroizing::new(ByteCodec::base64_decode(&record_key_b64).ok()?);

    let ad_record = ad(AD_RECORD, &share.matching_index);
    let plaintext = crypto.aead_decrypt(&record_key, &share.e_record, &ad_record).ok()?;
    serde_json::from_slice(&plaintext).ok()
}

fn open_share(
    crypto: CryptoProvider,
    oc_pk: &[u8; 32],
    oc_sk: &[u8; 32],
    entry: &EncryptedData,
) -> Result<OpenedShare, MalformedKind> {
    let opened = crypto.unseal(oc_pk, oc_sk, &entry.e_oc)?;
    let share: Share =
        serde_json::from_slice(&opened).map_err(|_| MalformedKind::AsymmetricDecryptFailure)?;
    let x = share
        .x
        .parse::<BigUint>()
        .map_err(|_| MalformedKind::AsymmetricDecryptFailure)?;
    let y = share
        .y
        .parse::<BigUint>()
        .map_err(|_| MalformedKind::AsymmetricDecryptFailure)?;

    Ok(OpenedShare {
        point: Point { x, y },
        e_record_key: share.e_record_key,
        e_record: entry.e_record.clone(),
        matching_index: entry.matching_index.clone(),
    })
}

fn ad(role: &[u8], matching_index: &str) -> Vec<u8> {
    let mut v = role.to_vec();
    v.extend_from_slice(matching_index.as_bytes());
    v
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use crypto_box::SecretKey;
    use rand::rngs::OsRng;
    use rand::{RngCore, SeedableRng};
    use rand_chacha::ChaChaRng;

    use crate::encryptor;
    use crate::model::OcKeyMap;

    fn oc_keypair() -> ([u8; 32], [u8; 32]) {
        let sk = SecretKey::generate(&mut OsRng);
        let pk = *sk.public_key().as_bytes();
        (pk, sk.to_bytes())
    }

    /// Deterministic fixture setup, in the style of `veil`'s seeded-RNG
    /// `setup()` test helpers: a fixed seed makes the generated user ids
    /// (and thus their field-element `x` coordinates) reproducible across
    /// runs without hardcoding yet another literal byte string per test.
    fn seeded_user_id(rng: &mut ChaChaRng) -> String {
        let mut raw = [0u8; 16];
        rng.fill_bytes(&mut raw);
        ByteCodec::base64_encode(&raw)
    }

    #[test]
    fn round_trip_with_two_matching_submissions() {
        let crypto = CryptoProvider::new();
        let field = FieldArith::default();
        let (oc_pk, oc_sk) = oc_keypair();
        let mut oc_keys = OcKeyMap::new();
        oc_keys.insert("oc1".into(), oc_pk);

        let rand_id = [42u8; 32];
        let r1 = Record { perp_id: "perp".into(), user_id: "u1".into() };
        let r2 = Record { perp_id: "perp".into(), user_id: "u2".into() };

        let out1 =
            encryptor::encrypt(crypto, &field, &[rand_id], &r1, &oc_keys, b"pass-one-32-bytes-aaaaaaaaaaaaaa");
        let out2 =
            encryptor::encrypt(crypto, &field, &[rand_id], &r2, &oc_keys, b"pass-two-32-bytes-bbbbbbbbbbbbbb");
        assert!(out1.malformed.is_empty());
        assert!(out2.malformed.is_empty());

        let mut entries = Vec::new();
        for map in [out1.encrypted_map, out2.encrypted_map] {
            for (_, per_oc) in map {
                entries.extend(per_oc.get("oc1").cloned().unwrap_or_default());
            }
        }

        let result = decrypt(crypto, &field, &entries, &oc_pk, &oc_sk);
        assert!(result.malformed.is_empty(), "{:?}", result.malformed);
        let mut records = result.records;
        records.sort_by(|a, b| a.user_id.cmp(&b.user_id));
        assert_eq!(records, vec![r1, r2]);
    }

    #[test]
    fn single_submission_is_not_enough() {
        let crypto = CryptoProvider::new();
        let field = FieldArith::default();
        let (oc_pk, oc_sk) = oc_keypair();
        let mut oc_keys = OcKeyMap::new();
        oc_keys.insert("oc1".into(), oc_pk);

        let r1 = Record { perp_id: "perp".into(), user_id: "u1".into() };
        let out1 =
            encryptor::encrypt(crypto, &field, &[[7u8; 32]], &r1, &oc_keys, b"pass-0123456789012345678901234567");
        let entries: Vec<EncryptedData> = out1
            .encrypted_map
            .into_values()
            .flat_map(|per_oc| per_oc.into_values().flatten())
            .collect();

        let result = decrypt(crypto, &field, &entries, &oc_pk, &oc_sk);
        assert!(result.records.is_empty());
        assert_eq!(result.malformed.len(), 1);
        assert_matches!(result.malformed[0].error, MalformedKind::NotEnoughMatches);
    }

    #[test]
    fn malformed_entry_does_not_block_the_remaining_pair() {
        let crypto = CryptoProvider::new();
        let field = FieldArith::default();
        let (oc_pk, oc_sk) = oc_keypair();
        let mut oc_keys = OcKeyMap::new();
        oc_keys.insert("oc1".into(), oc_pk);

        let rand_id = [11u8; 32];
        let r1 = Record { perp_id: "perp".into(), user_id: "u1".into() };
        let r2 = Record { perp_id: "perp".into(), user_id: "u2".into() };
        let r3 = Record { perp_id: "perp".into(), user_id: "u3".into() };

        let mut entries = Vec::new();
        for (r, pass) in [
            (&r1, b"pass-a-0123456789012345678901234" as &[u8]),
            (&r2, b"pass-b-0123456789012345678901234"),
            (&r3, b"pass-c-0123456789012345678901234"),
        ] {
            let out = encryptor::encrypt(crypto, &field, &[rand_id], r, &oc_keys, pass);
            for (_, per_oc) in out.encrypted_map {
                entries.extend(per_oc.get("oc1").cloned().unwrap_or_default());
            }
        }

        // Corrupt the first entry's sealed share.
        entries[0].e_oc = ByteCodec::base64_encode(b"not a valid sealed box at all!!");

        let result = decrypt(crypto, &field, &entries, &oc_pk, &oc_sk);
        assert_eq!(result.records.len(), 2);
        assert_eq!(result.malformed.len(), 1);
        assert_matches!(result.malformed[0].error, MalformedKind::AsymmetricDecryptFailure);
    }

    #[test]
    fn seeded_random_user_ids_round_trip_across_several_trials() {
        let crypto = CryptoProvider::new();
        let field = FieldArith::default();
        let mut rng = ChaChaRng::seed_from_u64(0xDEAD_BEEF);

        for trial in 0..8u64 {
            let (oc_pk, oc_sk) = oc_keypair();
            let mut oc_keys = OcKeyMap::new();
            oc_keys.insert("oc1".into(), oc_pk);

            let mut rand_id = [0u8; 32];
            rng.fill_bytes(&mut rand_id);

            let r1 = Record { perp_id: "perp".into(), user_id: seeded_user_id(&mut rng).into() };
            let r2 = Record { perp_id: "perp".into(), user_id: seeded_user_id(&mut rng).into() };

            let out1 = encryptor::encrypt(
                crypto,
                &field,
                &[rand_id],
                &r1,
                &oc_keys,
                b"pass-one-32-bytes-aaaaaaaaaaaaaa",
            );
            let out2 = encryptor::encrypt(
                crypto,
                &field,
                &[rand_id],
                &r2,
                &oc_keys,
                b"pass-two-32-bytes-bbbbbbbbbbbbbb",
            );
            assert_matches!(out1.malformed.as_slice(), []);
            assert_matches!(out2.malformed.as_slice(), []);

            let mut entries = Vec::new();
            for map in [out1.encrypted_map, out2.encrypted_map] {
                for (_, per_oc) in map {
                    entries.extend(per_oc.get("oc1").cloned().unwrap_or_default());
                }
            }

            let result = decrypt(crypto, &field, &entries, &oc_pk, &oc_sk);
            assert_matches!(result.malformed.as_slice(), []);
            let mut records = result.records;
            records.sort_by(|a, b| a.user_id.cmp(&b.user_id));
            let mut expected = vec![r1, r2];
            expected.sort_by(|a, b| a.user_id.cmp(&b.user_id));
            assert_eq!(records, expected, "trial {trial}");
        }
    }
}
