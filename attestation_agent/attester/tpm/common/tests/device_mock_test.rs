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

use mockall::predicate::eq;
use tpm_common_attester::{
    event_with_sequencing, hash, hash_with_sequencing, HashError, HashResolver, MockTpmDevice, Ticket,
    TPM_ALG_NULL, TPM_RH_NULL,
};
use tpm_common_verifier::AlgorithmId;

const SEQUENCE: u32 = 0x8000_0001;

// Test Objective: Verify an unresolved or unknown algorithm is rejected before a sequence starts
// Expected Result: UnsupportedAlgorithm and no device call at all
#[test]
fn test_sequence_rejects_algorithm_before_start() {
    let mut device = MockTpmDevice::new();
    device.expect_hash_sequence_start().never();

    let mut resolver = HashResolver::with_device(None, &mut device);
    assert!(matches!(
        hash_with_sequencing(b"data", &mut resolver, "", TPM_RH_NULL),
        Err(HashError::UnsupportedAlgorithm(_))
    ));

    let mut resolver = HashResolver::with_device(Some(AlgorithmId::Unknown), &mut device);
    assert!(matches!(
        event_with_sequencing(b"data", &mut resolver, "", "", 0),
        Err(HashError::UnsupportedAlgorithm(_))
    ));
}

// Test Objective: Verify a failing update abandons the sequence without retrying
// Expected Result: Error surfaces, complete is never called and the handle is flushed once
#[test]
fn test_update_failure_flushes_sequence() {
    let mut device = MockTpmDevice::new();
    device.expect_hash_sequence_start()
        .with(eq("auth"), eq(AlgorithmId::Sha256.to_tpm_alg()))
        .times(1)
        .returning(|_, _| Ok(SEQUENCE));
    let mut calls = 0;
    device.expect_sequence_update()
        .times(2)
        .returning(move |_, _, _| {
            calls += 1;
            if calls == 2 { Err(HashError::Device("TPM_RC_FAILURE".to_string())) } else { Ok(()) }
        });
    device.expect_sequence_complete().never();
    device.expect_flush_context().with(eq(SEQUENCE)).times(1).returning(|_| Ok(()));

    let data = vec![0x5Au8; 3000];
    let mut resolver = HashResolver::with_device(Some(AlgorithmId::Sha256), &mut device);
    assert_eq!(
        hash_with_sequencing(&data, &mut resolver, "auth", TPM_RH_NULL),
        Err(HashError::Device("TPM_RC_FAILURE".to_string()))
    );
}

// Test Objective: Verify a failing complete abandons the sequence
// Expected Result: Error surfaces and the handle is flushed; a flush failure does not mask it
#[test]
fn test_complete_failure_flushes_sequence() {
    let mut device = MockTpmDevice::new();
    device.expect_hash_sequence_start().times(1).returning(|_, _| Ok(SEQUENCE));
    device.expect_sequence_update().times(1).returning(|_, _, _| Ok(()));
    device.expect_event_sequence_complete()
        .times(1)
        .returning(|_, _, _, _| Err(HashError::Device("TPM_RC_LOCALITY".to_string())));
    device.expect_flush_context()
        .with(eq(SEQUENCE))
        .times(1)
        .returning(|_| Err(HashError::Device("TPM_RC_HANDLE".to_string())));

    let mut resolver = HashResolver::with_device(None, &mut device);
    assert_eq!(
        event_with_sequencing(b"event", &mut resolver, "", "", 16),
        Err(HashError::Device("TPM_RC_LOCALITY".to_string()))
    );
}

// Test Objective: Verify a completed sequence is not flushed and an event sequence uses TPM_ALG_NULL
// Expected Result: Start receives TPM_ALG_NULL, flush_context is never called
#[test]
fn test_completed_sequence_not_flushed() {
    let mut device = MockTpmDevice::new();
    device.expect_hash_sequence_start()
        .with(eq(""), eq(TPM_ALG_NULL))
        .times(1)
        .returning(|_, _| Ok(SEQUENCE));
    device.expect_sequence_update()
        .withf(|_, sequence, chunk| *sequence == SEQUENCE && chunk.is_empty())
        .times(1)
        .returning(|_, _, _| Ok(()));
    device.expect_event_sequence_complete()
        .withf(|pcr_auth, _, pcr, sequence| pcr_auth == "pcr-auth" && *pcr == 16 && *sequence == SEQUENCE)
        .times(1)
        .returning(|_, _, _, _| Ok(Vec::new()));
    device.expect_flush_context().never();

    let mut resolver = HashResolver::with_device(None, &mut device);
    assert_eq!(event_with_sequencing(&[], &mut resolver, "", "pcr-auth", 16), Ok(Vec::new()));
}

// Test Objective: Verify a one-shot device failure is returned as is
// Expected Result: Device error from TPM2_Hash, no sequence is started
#[test]
fn test_one_shot_failure() {
    let mut device = MockTpmDevice::new();
    device.expect_hash()
        .times(1)
        .returning(|_, _, _| Err(HashError::Device("TPM_RC_HIERARCHY".to_string())));
    device.expect_hash_sequence_start().never();

    let mut resolver = HashResolver::with_device(Some(AlgorithmId::Sha384), &mut device);
    let result: Result<(Vec<u8>, Option<Ticket>), HashError> = hash(b"small", &mut resolver, Some(0x4000_000C), None);
    assert_eq!(result, Err(HashError::Device("TPM_RC_HIERARCHY".to_string())));
}
