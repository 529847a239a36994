/*
 * Copyright (c) Huawei Technologies Co., Ltd. 2025. All rights reserved.
 * Global Trust Authority is licensed under the Mulan PSL v2.
 * You can use this software according to the terms and conditions of the Mulan PSL v2.
 * You may obtain a copy of Mulan PSL v2 at:
 *     http://license.coscl.org.cn/MulanPSL2
 * THIS SOFTWARE IS PROVIDED ON AN "AS IS" BASIS, WITHOUT WARRANTIES OF ANY KIND, EITHER EXPRESS OR
 * IMPLIED, INCLUDING BUT NOT LIMITED TO NON-INFRINGEMENT, MERCHANTABILITY OR FIT FOR A PARTICULAR
 * PURPOSE.
 * See the Mulan PSL v2 for more details.
 */

use openssl::hash::{hash, MessageDigest};
use serde_json::json;
use tpm_common_verifier::{AlgorithmId, AttestationError, PcrBank};

// Test Objective: Verify PCR bank JSON with hex values round-trips through serde
// Expected Result: Indices are sorted and values decoded
#[test]
fn test_pcr_bank_from_json() {
    let json_value = json!({
        "hash_alg": "sha1",
        "pcr_values": {
            "7": "0000000000000000000000000000000000000007",
            "0": "0000000000000000000000000000000000000000"
        }
    });
    let bank = PcrBank::from_json(&json_value).unwrap();
    assert_eq!(bank.hash_alg, AlgorithmId::Sha1);
    assert_eq!(bank.get_pcr_indices(), vec![0, 7]);
    assert_eq!(bank.get_pcr_value(7).unwrap()[19], 7);

    let encoded = serde_json::to_value(&bank).unwrap();
    assert_eq!(encoded["pcr_values"]["7"], "0000000000000000000000000000000000000007");
}

// Test Objective: Verify values whose width does not match the bank are rejected
// Expected Result: Returns QuoteVerificationFailed
#[test]
fn test_pcr_bank_rejects_wrong_width() {
    let json_value = json!({
        "hash_alg": "sha256",
        "pcr_values": { "0": "00" }
    });
    assert!(matches!(PcrBank::from_json(&json_value), Err(AttestationError::QuoteVerificationFailed(_))));
}

// Test Objective: Verify initial PCR values follow the PC client reset rules
// Expected Result: PCR 17-22 all ones, others zero, locality in PCR 0 last byte, index 24 rejected
#[test]
fn test_create_initial_pcr_value() {
    let zero = PcrBank::create_initial_pcr_value(&AlgorithmId::Sha256, 10, None).unwrap();
    assert_eq!(zero, vec![0u8; 32]);

    let drtm = PcrBank::create_initial_pcr_value(&AlgorithmId::Sha384, 17, None).unwrap();
    assert_eq!(drtm, vec![0xffu8; 48]);

    let locality = PcrBank::create_initial_pcr_value(&AlgorithmId::Sha1, 0, Some(3)).unwrap();
    assert_eq!(locality[19], 3);
    assert!(locality[..19].iter().all(|b| *b == 0));

    assert!(PcrBank::create_initial_pcr_value(&AlgorithmId::Sha1, 24, None).is_err());
    assert!(PcrBank::create_initial_pcr_value(&AlgorithmId::Unknown, 0, None).is_err());
}

// Test Objective: Verify replay extends digests in order
// Expected Result: Replay equals H(H(0 || a) || b)
#[test]
fn test_replay_extends_in_order() {
    let initial = vec![0u8; 32];
    let a = vec![0xaau8; 32];
    let b = vec![0xbbu8; 32];

    let first = hash(MessageDigest::sha256(), &[initial.clone(), a.clone()].concat()).unwrap().to_vec();
    let expected = hash(MessageDigest::sha256(), &[first, b.clone()].concat()).unwrap().to_vec();

    let replayed = PcrBank::replay(&AlgorithmId::Sha256, &initial, &[a.clone(), b.clone()]).unwrap();
    assert_eq!(replayed, expected);

    let swapped = PcrBank::replay(&AlgorithmId::Sha256, &initial, &[b, a]).unwrap();
    assert_ne!(swapped, expected);
}

// Test Objective: Verify the bank digest covers values in ascending index order
// Expected Result: Digest equals hash of PCR 1 value followed by PCR 5 value
#[test]
fn test_calculate_digest_order() {
    let mut bank = PcrBank::new(AlgorithmId::Sha256);
    bank.set_pcr_value(5, vec![5u8; 32]);
    bank.set_pcr_value(1, vec![1u8; 32]);

    let expected = hash(MessageDigest::sha256(), &[vec![1u8; 32], vec![5u8; 32]].concat()).unwrap().to_vec();
    assert_eq!(bank.calculate_digest(&AlgorithmId::Sha256).unwrap(), expected);
}
