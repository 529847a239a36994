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

#![allow(dead_code)]

use openssl::hash::{hash, MessageDigest};
use tpm_common_verifier::{AlgorithmId, PcrBank};
use tpm_boot_verifier::{SPEC_ID_EVENT_SIGNATURE_03, STARTUP_LOCALITY_SIGNATURE};

pub const TPM_ALG_SHA1: u16 = 0x0004;
pub const TPM_ALG_SHA256: u16 = 0x000B;

pub const EV_NO_ACTION: u32 = 0x00000003;
pub const EV_SEPARATOR: u32 = 0x00000004;
pub const EV_ACTION: u32 = 0x00000005;
pub const EV_EVENT_TAG: u32 = 0x00000006;
pub const EV_POST_CODE: u32 = 0x00000001;
pub const EV_EFI_VARIABLE_DRIVER_CONFIG: u32 = 0x80000001;
pub const EV_EFI_VARIABLE_BOOT: u32 = 0x80000002;
pub const EV_EFI_BOOT_SERVICES_APPLICATION: u32 = 0x80000003;
pub const EV_EFI_PLATFORM_FIRMWARE_BLOB: u32 = 0x80000008;

pub fn sha1(data: &[u8]) -> Vec<u8> {
    hash(MessageDigest::sha1(), data).unwrap().to_vec()
}

pub fn sha256(data: &[u8]) -> Vec<u8> {
    hash(MessageDigest::sha256(), data).unwrap().to_vec()
}

/// TCG 1.2 layout record: pcr, type, sha1 digest, size, data
pub fn v1_event(pcr: u32, event_type: u32, digest: &[u8], data: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&pcr.to_le_bytes());
    out.extend_from_slice(&event_type.to_le_bytes());
    out.extend_from_slice(digest);
    out.extend_from_slice(&(data.len() as u32).to_le_bytes());
    out.extend_from_slice(data);
    out
}

/// Crypto agile record with the given (algorithm, digest) pairs
pub fn v2_event(pcr: u32, event_type: u32, digests: &[(u16, Vec<u8>)], data: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&pcr.to_le_bytes());
    out.extend_from_slice(&event_type.to_le_bytes());
    out.extend_from_slice(&(digests.len() as u32).to_le_bytes());
    for (alg, digest) in digests {
        out.extend_from_slice(&alg.to_le_bytes());
        out.extend_from_slice(digest);
    }
    out.extend_from_slice(&(data.len() as u32).to_le_bytes());
    out.extend_from_slice(data);
    out
}

/// "Spec ID Event03" header record declaring the given (algorithm, digest size) table
pub fn spec_id_event(algorithms: &[(u16, u16)]) -> Vec<u8> {
    let mut data = SPEC_ID_EVENT_SIGNATURE_03.to_vec();
    data.extend_from_slice(&0u32.to_le_bytes()); // platform class
    data.extend_from_slice(&[0, 2, 0, 2]); // family minor, major, errata, uintn size
    data.extend_from_slice(&(algorithms.len() as u32).to_le_bytes());
    for (alg, size) in algorithms {
        data.extend_from_slice(&alg.to_le_bytes());
        data.extend_from_slice(&size.to_le_bytes());
    }
    data.push(0); // vendor info size
    v1_event(0, EV_NO_ACTION, &[0u8; 20], &data)
}

pub fn startup_locality_event(locality: u8) -> Vec<u8> {
    let mut data = STARTUP_LOCALITY_SIGNATURE.to_vec();
    data.push(locality);
    v2_event(0, EV_NO_ACTION, &[(TPM_ALG_SHA256, vec![0u8; 32])], &data)
}

/// Crypto agile SHA-256 record whose digest is the hash of its data
pub fn sha256_event(pcr: u32, event_type: u32, data: &[u8]) -> Vec<u8> {
    v2_event(pcr, event_type, &[(TPM_ALG_SHA256, sha256(data))], data)
}

/// UEFI_VARIABLE_DATA payload
pub fn uefi_variable(name: &str, data: &[u8]) -> Vec<u8> {
    let name_utf16: Vec<u16> = name.encode_utf16().collect();
    let mut out = vec![0x61u8; 16]; // variable GUID
    out.extend_from_slice(&(name_utf16.len() as u64).to_le_bytes());
    out.extend_from_slice(&(data.len() as u64).to_le_bytes());
    for unit in name_utf16 {
        out.extend_from_slice(&unit.to_le_bytes());
    }
    out.extend_from_slice(data);
    out
}

/// Expected PCR values from zero initial values, in log order
pub fn expected_bank(hash_alg: AlgorithmId, extends: &[(u32, Vec<u8>)]) -> PcrBank {
    let mut bank = PcrBank::new(hash_alg);
    for (pcr, digest) in extends {
        let current = match bank.get_pcr_value(*pcr) {
            Some(value) => value.to_vec(),
            None => PcrBank::create_initial_pcr_value(&hash_alg, *pcr, None).unwrap(),
        };
        bank.set_pcr_value(*pcr, PcrBank::extend(&hash_alg, &current, digest).unwrap());
    }
    bank
}

/// One canonical event log record: recnum, pcr, digests and content TLVs
pub fn cel_record(recnum: u64, pcr: u8, digests: &[(u8, Vec<u8>)], content_type: u8, content: &[u8]) -> Vec<u8> {
    let mut digest_tlvs = Vec::new();
    for (alg, digest) in digests {
        digest_tlvs.extend(tlv(*alg, digest));
    }
    let mut out = tlv(0, &recnum.to_be_bytes());
    out.extend(tlv(1, &[pcr]));
    out.extend(tlv(3, &digest_tlvs));
    out.extend(tlv(content_type, content));
    out
}

pub fn tlv(tlv_type: u8, value: &[u8]) -> Vec<u8> {
    let mut out = vec![tlv_type];
    out.extend_from_slice(&(value.len() as u32).to_be_bytes());
    out.extend_from_slice(value);
    out
}

/// COS launch event content with a SHA-256 digest of the content
pub fn cos_record(recnum: u64, pcr: u8, cos_type: u8, data: &[u8]) -> Vec<u8> {
    let content = tlv(cos_type, data);
    cel_record(recnum, pcr, &[(TPM_ALG_SHA256 as u8, sha256(&content))], 80, &content)
}
