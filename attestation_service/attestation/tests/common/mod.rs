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

use openssl::asn1::{Asn1Integer, Asn1Time};
use openssl::bn::BigNum;
use openssl::hash::{hash, MessageDigest};
use openssl::pkey::{HasPublic, PKey, PKeyRef, Private, Public};
use openssl::rsa::Rsa;
use openssl::sign::Signer;
use openssl::x509::extension::{BasicConstraints, KeyUsage};
use openssl::x509::{X509, X509NameBuilder};
use attestation::{Quote, VerifyOpts};
use tpm_common_verifier::{AlgorithmId, PcrBank};

pub const TPM_ALG_SHA1: u16 = 0x0004;
pub const TPM_ALG_SHA256: u16 = 0x000B;
pub const NONCE: &[u8] = b"attestation-nonce-0001";

/// Simulated prover holding an RSA attestation key
pub struct Prover {
    pub key: PKey<Private>,
    pub ak_pub: Vec<u8>,
}

fn tpm2b(out: &mut Vec<u8>, data: &[u8]) {
    out.extend_from_slice(&(data.len() as u16).to_be_bytes());
    out.extend_from_slice(data);
}

impl Prover {
    /// RSA 2048 restricted signing key with an RSASSA scheme over `scheme_hash`
    pub fn new(scheme_hash: u16) -> Self {
        let rsa = Rsa::generate(2048).unwrap();
        let mut area = Vec::new();
        area.extend_from_slice(&0x0001u16.to_be_bytes()); // TPM_ALG_RSA
        area.extend_from_slice(&TPM_ALG_SHA256.to_be_bytes()); // name alg
        area.extend_from_slice(&0x0005_0072u32.to_be_bytes());
        tpm2b(&mut area, &[]);
        area.extend_from_slice(&0x0010u16.to_be_bytes()); // symmetric NULL
        area.extend_from_slice(&0x0014u16.to_be_bytes()); // RSASSA
        area.extend_from_slice(&scheme_hash.to_be_bytes());
        area.extend_from_slice(&2048u16.to_be_bytes());
        area.extend_from_slice(&0u32.to_be_bytes());
        tpm2b(&mut area, &rsa.n().to_vec());
        Prover { key: PKey::from_rsa(rsa).unwrap(), ak_pub: area }
    }

    pub fn public_key(&self) -> PKey<Public> {
        PKey::public_key_from_pem(&self.key.public_key_to_pem().unwrap()).unwrap()
    }

    /// Sign a TPMS_ATTEST over `bank` with the given nonce
    pub fn quote(&self, nonce: &[u8], bank: &PcrBank) -> Quote {
        let digest = bank.calculate_digest(&AlgorithmId::Sha256).unwrap();
        let quote = build_quote(nonce, bank, &digest);

        let mut signer = Signer::new(MessageDigest::sha256(), &self.key).unwrap();
        signer.update(&quote).unwrap();
        let sig = signer.sign_to_vec().unwrap();
        let mut raw_sig = Vec::new();
        raw_sig.extend_from_slice(&0x0014u16.to_be_bytes());
        raw_sig.extend_from_slice(&TPM_ALG_SHA256.to_be_bytes());
        tpm2b(&mut raw_sig, &sig);

        Quote { pcrs: bank.clone(), quote, raw_sig }
    }
}

/// Marshal a TPMS_ATTEST quote selecting the bank's PCRs
pub fn build_quote(nonce: &[u8], bank: &PcrBank, pcr_digest: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&0xff544347u32.to_be_bytes());
    out.extend_from_slice(&0x8018u16.to_be_bytes());
    tpm2b(&mut out, &[]);
    tpm2b(&mut out, nonce);
    out.extend_from_slice(&[0u8; 8 + 4 + 4]);
    out.push(1);
    out.extend_from_slice(&0u64.to_be_bytes());
    out.extend_from_slice(&1u32.to_be_bytes());
    out.extend_from_slice(&bank.hash_alg.to_tpm_alg().to_be_bytes());
    out.push(3);
    let mut select = [0u8; 3];
    for index in bank.get_pcr_indices() {
        select[(index / 8) as usize] |= 1 << (index % 8);
    }
    out.extend_from_slice(&select);
    tpm2b(&mut out, pcr_digest);
    out
}

fn event_v2(pcr: u32, event_type: u32, digests: &[(u16, Vec<u8>)], data: &[u8]) -> Vec<u8> {
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

/// Crypto agile log with SHA-1 and SHA-256 banks and a single separator on PCR 0
pub fn separator_log() -> Vec<u8> {
    let mut spec_id = b"Spec ID Event03\0".to_vec();
    spec_id.extend_from_slice(&0u32.to_le_bytes());
    spec_id.extend_from_slice(&[0, 2, 0, 2]);
    spec_id.extend_from_slice(&2u32.to_le_bytes());
    spec_id.extend_from_slice(&TPM_ALG_SHA1.to_le_bytes());
    spec_id.extend_from_slice(&20u16.to_le_bytes());
    spec_id.extend_from_slice(&TPM_ALG_SHA256.to_le_bytes());
    spec_id.extend_from_slice(&32u16.to_le_bytes());
    spec_id.push(0);

    let mut log = Vec::new();
    log.extend_from_slice(&0u32.to_le_bytes());
    log.extend_from_slice(&3u32.to_le_bytes()); // EV_NO_ACTION
    log.extend_from_slice(&[0u8; 20]);
    log.extend_from_slice(&(spec_id.len() as u32).to_le_bytes());
    log.extend_from_slice(&spec_id);

    let data = [0u8; 4];
    log.extend(event_v2(0, 4, &[
        (TPM_ALG_SHA1, hash(MessageDigest::sha1(), &data).unwrap().to_vec()),
        (TPM_ALG_SHA256, hash(MessageDigest::sha256(), &data).unwrap().to_vec()),
    ], &data));
    log
}

/// PCR 0 after replaying `separator_log` in the given bank
pub fn separator_bank(hash_alg: AlgorithmId) -> PcrBank {
    let md = match hash_alg {
        AlgorithmId::Sha1 => MessageDigest::sha1(),
        _ => MessageDigest::sha256(),
    };
    let digest = hash(md, &[0u8; 4]).unwrap().to_vec();
    let initial = vec![0u8; hash_alg.digest_size()];
    let mut bank = PcrBank::new(hash_alg);
    bank.set_pcr_value(0, PcrBank::extend(&hash_alg, &initial, &digest).unwrap());
    bank
}

pub fn trusting(prover: &Prover) -> VerifyOpts {
    VerifyOpts {
        nonce: NONCE.to_vec(),
        trusted_aks: vec![prover.public_key()],
        ..Default::default()
    }
}

/// Issue a certificate for `subject` signed by `issuer_key`; self-signed when `issuer` is None
pub fn issue_cert<T: HasPublic>(
    common_name: &str,
    subject: &PKeyRef<T>,
    issuer: Option<&X509>,
    issuer_key: &PKey<Private>,
    ca: bool,
) -> X509 {
    let mut name = X509NameBuilder::new().unwrap();
    name.append_entry_by_text("CN", common_name).unwrap();
    let name = name.build();

    let mut builder = X509::builder().unwrap();
    builder.set_version(2).unwrap();
    let serial = Asn1Integer::from_bn(&BigNum::from_u32(1).unwrap()).unwrap();
    builder.set_serial_number(&serial).unwrap();
    builder.set_subject_name(&name).unwrap();
    match issuer {
        Some(cert) => builder.set_issuer_name(cert.subject_name()).unwrap(),
        None => builder.set_issuer_name(&name).unwrap(),
    }
    builder.set_pubkey(subject).unwrap();
    builder.set_not_before(&Asn1Time::days_from_now(0).unwrap()).unwrap();
    builder.set_not_after(&Asn1Time::days_from_now(365).unwrap()).unwrap();
    if ca {
        builder.append_extension(BasicConstraints::new().critical().ca().build().unwrap()).unwrap();
        builder.append_extension(KeyUsage::new().critical().key_cert_sign().build().unwrap()).unwrap();
    }
    builder.sign(issuer_key, MessageDigest::sha256()).unwrap();
    builder.build()
}
