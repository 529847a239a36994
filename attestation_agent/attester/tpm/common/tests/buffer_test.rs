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

use tpm_common_attester::{HashError, U32Bytes, MAX_BYTES_BUFFER_SIZE};

// Test Objective: Verify a size prefix above 1 MiB is rejected before allocating
// Expected Result: BufferTooLarge for a 0xFFFFFFFF prefix on an 8 byte input
#[test]
fn test_u32_bytes_oversized_prefix() {
    let input = [0xFF, 0xFF, 0xFF, 0xFF, 1, 2, 3, 4];
    assert!(matches!(U32Bytes::unmarshal(&input), Err(HashError::BufferTooLarge(_))));

    let limit = ((MAX_BYTES_BUFFER_SIZE + 1) as u32).to_be_bytes();
    assert!(matches!(U32Bytes::unmarshal(&limit), Err(HashError::BufferTooLarge(_))));
    assert!(matches!(U32Bytes::new(vec![0; MAX_BYTES_BUFFER_SIZE + 1]), Err(HashError::BufferTooLarge(_))));
}

// Test Objective: Verify truncated buffers are rejected
// Expected Result: Errors for a short size field and for a prefix larger than the data
#[test]
fn test_u32_bytes_truncated() {
    assert!(U32Bytes::unmarshal(&[0, 0]).is_err());
    assert!(matches!(U32Bytes::unmarshal(&[0, 0, 0, 5, 1, 2]), Err(HashError::Internal(_))));
}

// Test Objective: Verify a prefixed buffer decodes and leaves the tail untouched
// Expected Result: Payload and tail are split at the declared size
#[test]
fn test_u32_bytes_unmarshal() {
    let input = [0, 0, 0, 3, 0xAA, 0xBB, 0xCC, 0x01, 0x02];
    let (bytes, rest) = U32Bytes::unmarshal(&input).unwrap();
    assert_eq!(bytes.as_bytes(), &[0xAA, 0xBB, 0xCC]);
    assert_eq!(rest, &[0x01, 0x02]);
    assert_eq!(bytes.marshal(), input[..7].to_vec());
}
