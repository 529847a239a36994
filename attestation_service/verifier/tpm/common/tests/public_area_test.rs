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

use openssl::bn::{BigNum, BigNumContext};
use openssl::ec::{EcGroup, EcKey};
use openssl::nid::Nid;
use openssl::pkey::{PKey, Public};
use openssl::rsa::Rsa;
use tpm_common_verifier::{public_keys_equal, AlgorithmId, AttestationError, TpmtPublic};

fn tpm2b(out: &mut Vec<u8>, data: &[u8]) {
    out.extend_from_slice(&(data.len() as u16).to_be_bytes());
    out.extend_from_slice(data);
}

fn rsa_public_area(modulus: &[u8], exponent: u32, scheme: Option<u16>) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&0x0001u16.to_be_bytes());
    out.extend_from_slice(&0x000Bu16.to_be_bytes());
    out.extend_from_slice(&0x0005_0072u32.to_be_bytes());
    tpm2b(&mut out, &[]);
    out.extend_from_slice(&0x0010u16.to_be_bytes());
    match scheme {
        Some(hash) => {
            out.extend_from_slice(&0x0014u16.to_be_bytes());
            out.extend_from_slice(&hash.to_be_bytes());
        },
        None => out.extend_from_slice(&0x0010u16.to_be_bytes()),
    }
    out.extend_from_slice(&2048u16.to_be_bytes());
    out.extend_from_slice(&exponent.to_be_bytes());
    tpm2b(&mut out, modulus);
    out
}

fn ecc_public_area(curve: u16, x: &[u8], y: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&0x0023u16.to_be_bytes());
    out.extend_from_slice(&0x000Bu16.to_be_bytes());
    out.extend_from_slice(&0x0005_0072u32.to_be_bytes());
    tpm2b(&mut out, &[]);
    out.extend_from_slice(&0x0010u16.to_be_bytes());
    out.extend_from_slice(&0x0018u16.to_be_bytes());
    out.extend_from_slice(&0x000Cu16.to_be_bytes());
    out.extend_from_slice(&curve.to_be_bytes());
    out.extend_from_slice(&0x0010u16.to_be_bytes());
    tpm2b(&mut out, x);
    tpm2b(&mut out, y);
    out
}

fn ec_coordinates(key: &EcKey<openssl::pkey::Private>) -> (Vec<u8>, Vec<u8>) {
    let mut ctx = BigNumContext::new().unwrap();
    let mut x = BigNum::new().unwrap();
    let mut y = BigNum::new().unwrap();
    key.public_key().affine_coordinates_gfp(key.group(), &mut x, &mut y, &mut ctx).unwrap();
    (x.to_vec(), y.to_vec())
}

// Test Objective: Verify an RSA public area decodes to the same key OpenSSL generated
// Expected Result: Keys compare equal, exponent 0 is read as 65537, signing hash is SHA-256
#[test]
fn test_decode_rsa_public_area() {
    let rsa = Rsa::generate(2048).unwrap();
    let area = rsa_public_area(&rsa.n().to_vec(), 0, Some(0x000B));

    let public = TpmtPublic::decode(&area).unwrap();
    assert_eq!(public.signing_hash_alg().unwrap(), AlgorithmId::Sha256);
    assert_eq!(public.name_alg, AlgorithmId::Sha256);

    let decoded = public.to_public_key().unwrap();
    let expected: PKey<Public> = PKey::public_key_from_pem(&PKey::from_rsa(rsa).unwrap().public_key_to_pem().unwrap())
        .unwrap();
    assert!(public_keys_equal(&decoded, &expected).unwrap());
}

// Test Objective: Verify a key without signing scheme has no signing hash
// Expected Result: signing_hash_alg returns MalformedKey
#[test]
fn test_null_scheme_has_no_signing_hash() {
    let rsa = Rsa::generate(2048).unwrap();
    let area = rsa_public_area(&rsa.n().to_vec(), 65537, None);
    let public = TpmtPublic::decode(&area).unwrap();
    assert!(matches!(public.signing_hash_alg(), Err(AttestationError::MalformedKey(_))));
}

// Test Objective: Verify ECC public areas on P-256 decode and compare by curve and point
// Expected Result: Decoded key equals the source key and differs from another P-256 key
#[test]
fn test_decode_ecc_public_area() {
    let group = EcGroup::from_curve_name(Nid::X9_62_PRIME256V1).unwrap();
    let key = EcKey::generate(&group).unwrap();
    let (x, y) = ec_coordinates(&key);
    let public = TpmtPublic::decode(&ecc_public_area(0x0003, &x, &y)).unwrap();
    assert_eq!(public.signing_hash_alg().unwrap(), AlgorithmId::Sha384);

    let decoded = public.to_public_key().unwrap();
    let expected = PKey::from_ec_key(EcKey::from_public_key(&group, key.public_key()).unwrap()).unwrap();
    assert!(public_keys_equal(&decoded, &expected).unwrap());

    let other = EcKey::generate(&group).unwrap();
    let other = PKey::from_ec_key(EcKey::from_public_key(&group, other.public_key()).unwrap()).unwrap();
    assert!(!public_keys_equal(&decoded, &other).unwrap());
}

// Test Objective: Verify RSA and EC keys never compare equal
// Expected Result: public_keys_equal returns false
#[test]
fn test_keys_of_different_type_are_not_equal() {
    let rsa = PKey::from_rsa(Rsa::generate(2048).unwrap()).unwrap();
    let rsa = PKey::public_key_from_pem(&rsa.public_key_to_pem().unwrap()).unwrap();
    let group = EcGroup::from_curve_name(Nid::SECP384R1).unwrap();
    let ec = EcKey::generate(&group).unwrap();
    let ec = PKey::from_ec_key(EcKey::from_public_key(&group, ec.public_key()).unwrap()).unwrap();
    assert!(!public_keys_equal(&rsa, &ec).unwrap());
}

// Test Objective: Verify truncated areas, unsupported key types and curves are rejected
// Expected Result: Each returns MalformedKey
#[test]
fn test_decode_malformed_public_area() {
    let rsa = Rsa::generate(2048).unwrap();
    let area = rsa_public_area(&rsa.n().to_vec(), 0, Some(0x000B));
    assert!(matches!(TpmtPublic::decode(&area[..area.len() - 10]), Err(AttestationError::MalformedKey(_))));

    let mut wrong_type = area.clone();
    wrong_type[1] = 0x08;
    assert!(matches!(TpmtPublic::decode(&wrong_type), Err(AttestationError::MalformedKey(_))));

    let bad_curve = TpmtPublic::decode(&ecc_public_area(0x0010, &[1; 32], &[2; 32])).unwrap();
    assert!(matches!(bad_curve.to_public_key(), Err(AttestationError::MalformedKey(_))));
}
