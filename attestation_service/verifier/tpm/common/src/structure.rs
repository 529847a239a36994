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

//! TPM structure, including TPM2.0 magic value, TPM2.0 attestation type, TPM clock information, algorithm id,
//! PCR selection, PCR information, signature algorithm type, RSA signature, ECC signature, and signature structure.
//! All multi-byte fields are big-endian, as marshalled by the TPM.
//! # Examples
//! See the `deserialize` method for an example of how to use the TpmsAttest struct.
use serde::{Serialize, Deserialize};
use std::convert::TryFrom;
use std::fmt;
use std::str::FromStr;
use byteorder::{BigEndian, ReadBytesExt};
use std::io::{Cursor, Read};
use crate::error::AttestationError;

/// TPM 2.0 Magic constant (byte representation of ASCII "TPM\x02")
pub const TPM2_GENERATED_VALUE: u32 = 0xff544347;

/// TPM_ALG_NULL, used for "no algorithm" and to start event sequences
pub const TPM_ALG_NULL: u16 = 0x0010;

/// Upper bound on any length-prefixed buffer read from untrusted input
pub const MAX_BYTES_BUFFER_SIZE: usize = 1024 * 1024;

/// Big-endian reader over a marshalled TPM structure.
///
/// Every read failure is reported with the error kind chosen by the caller, so the same reader
/// serves quote parsing (`QuoteVerificationFailed`) and AK decoding (`MalformedKey`).
pub struct TpmReader<'a> {
    cursor: Cursor<&'a [u8]>,
    kind: fn(String) -> AttestationError,
}

impl<'a> TpmReader<'a> {
    pub fn new(data: &'a [u8], kind: fn(String) -> AttestationError) -> Self {
        Self { cursor: Cursor::new(data), kind }
    }

    fn fail(&self, field: &str, detail: impl fmt::Display) -> AttestationError {
        (self.kind)(format!("Failed to deserialize {}: {}", field, detail))
    }

    pub fn remaining(&self) -> usize {
        let total = self.cursor.get_ref().len() as u64;
        total.saturating_sub(self.cursor.position()) as usize
    }

    pub fn read_u8(&mut self, field: &str) -> Result<u8, AttestationError> {
        self.cursor.read_u8().map_err(|e| self.fail(field, e))
    }

    pub fn read_u16(&mut self, field: &str) -> Result<u16, AttestationError> {
        self.cursor.read_u16::<BigEndian>().map_err(|e| self.fail(field, e))
    }

    pub fn read_u32(&mut self, field: &str) -> Result<u32, AttestationError> {
        self.cursor.read_u32::<BigEndian>().map_err(|e| self.fail(field, e))
    }

    pub fn read_u64(&mut self, field: &str) -> Result<u64, AttestationError> {
        self.cursor.read_u64::<BigEndian>().map_err(|e| self.fail(field, e))
    }

    /// Read `length` bytes, refusing lengths beyond the remaining input before allocating
    pub fn read_bytes(&mut self, length: usize, field: &str) -> Result<Vec<u8>, AttestationError> {
        if length > self.remaining() {
            return Err(self.fail(field, format!("size {} exceeds remaining {} bytes", length, self.remaining())));
        }
        let mut buffer = vec![0u8; length];
        self.cursor.read_exact(&mut buffer).map_err(|e| self.fail(field, e))?;
        Ok(buffer)
    }

    /// Read a TPM2B structure: u16 size followed by that many bytes
    pub fn read_tpm2b(&mut self, field: &str) -> Result<Vec<u8>, AttestationError> {
        let size = self.read_u16(field)?;
        self.read_bytes(size as usize, field)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TpmStType {
    AttestNone = 0x0000,
    AttestQuote = 0x8018,
}

impl TryFrom<u16> for TpmStType {
    type Error = AttestationError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            0x0000 => Ok(TpmStType::AttestNone),
            0x8018 => Ok(TpmStType::AttestQuote),
            _ => Err(AttestationError::QuoteVerificationFailed(
                format!("Invalid TPMI_ST_ATTEST value: 0x{:04X}", value)
            )),
        }
    }
}

/// TPM clock information structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TpmsClockInfo {
    pub clock: u64,
    pub reset_count: u32,
    pub restart_count: u32,
    pub safe: bool,
}

impl TpmsClockInfo {
    pub fn deserialize(reader: &mut TpmReader<'_>) -> Result<Self, AttestationError> {
        Ok(TpmsClockInfo {
            clock: reader.read_u64("clock")?,
            reset_count: reader.read_u32("reset_count")?,
            restart_count: reader.read_u32("restart_count")?,
            safe: reader.read_u8("safe")? != 0,
        })
    }
}

/// TPM hash algorithm identifiers used by PCR banks, event logs and signatures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u16)]
pub enum AlgorithmId {
    Sha1 = 0x0004,
    Sha256 = 0x000B,
    Sha384 = 0x000C,
    Sha512 = 0x000D,
    Sm3 = 0x0012,
    Unknown = 0xFFFF,
}

impl From<u16> for AlgorithmId {
    fn from(value: u16) -> Self {
        match value {
            0x0004 => AlgorithmId::Sha1,
            0x000B => AlgorithmId::Sha256,
            0x000C => AlgorithmId::Sha384,
            0x000D => AlgorithmId::Sha512,
            0x0012 => AlgorithmId::Sm3,
            _ => AlgorithmId::Unknown,
        }
    }
}

impl FromStr for AlgorithmId {
    type Err = AttestationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sha1" => Ok(AlgorithmId::Sha1),
            "sha256" => Ok(AlgorithmId::Sha256),
            "sha384" => Ok(AlgorithmId::Sha384),
            "sha512" => Ok(AlgorithmId::Sha512),
            "sm3" => Ok(AlgorithmId::Sm3),
            _ => Err(AttestationError::UnsupportedHashAlgorithm(format!("Unsupported algorithm: {}", s))),
        }
    }
}

impl fmt::Display for AlgorithmId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlgorithmId::Sha1 => write!(f, "sha1"),
            AlgorithmId::Sha256 => write!(f, "sha256"),
            AlgorithmId::Sha384 => write!(f, "sha384"),
            AlgorithmId::Sha512 => write!(f, "sha512"),
            AlgorithmId::Sm3 => write!(f, "sm3"),
            AlgorithmId::Unknown => write!(f, "unknown"),
        }
    }
}

impl AlgorithmId {
    /// Digest width in bytes, 0 for unknown algorithms
    pub fn digest_size(&self) -> usize {
        match self {
            AlgorithmId::Sha1 => 20,
            AlgorithmId::Sha256 => 32,
            AlgorithmId::Sha384 => 48,
            AlgorithmId::Sha512 => 64,
            AlgorithmId::Sm3 => 32,
            AlgorithmId::Unknown => 0,
        }
    }

    /// TPM_ALG_ID wire value
    pub fn to_tpm_alg(&self) -> u16 {
        *self as u16
    }
}

/// PCR selection structure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TpmsPcrSelection {
    pub hash_alg: AlgorithmId,
    pub size_of_select: u8,
    pub pcr_select: Vec<u8>,
}

impl TpmsPcrSelection {
    pub fn deserialize(reader: &mut TpmReader<'_>) -> Result<Self, AttestationError> {
        let hash_alg = AlgorithmId::from(reader.read_u16("hash_alg")?);
        let size_of_select = reader.read_u8("size_of_select")?;
        let pcr_select = reader.read_bytes(size_of_select as usize, "pcr_select")?;

        Ok(TpmsPcrSelection {
            hash_alg,
            size_of_select,
            pcr_select,
        })
    }

    /// Check if the specified PCR index is selected
    pub fn is_pcr_selected(&self, pcr_index: u32) -> bool {
        if pcr_index >= 8 * (self.size_of_select as u32) {
            return false;
        }

        let byte_index = (pcr_index / 8) as usize;
        let bit_index = pcr_index % 8;
        let mask = 1 << bit_index;

        byte_index < self.pcr_select.len() && (self.pcr_select[byte_index] & mask) != 0
    }

    /// Selected PCR indices in ascending order
    pub fn selected_pcrs(&self) -> Vec<u32> {
        (0..8 * self.size_of_select as u32)
            .filter(|index| self.is_pcr_selected(*index))
            .collect()
    }
}

/// PCR information structure in Quote
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TpmsQuoteInfo {
    pub pcr_select: Vec<TpmsPcrSelection>,
    pub pcr_digest: Vec<u8>,
}

impl TpmsQuoteInfo {
    pub fn deserialize(reader: &mut TpmReader<'_>) -> Result<Self, AttestationError> {
        let pcr_select_count = reader.read_u32("pcr_select count")?;

        // Each selection takes at least 3 bytes, a larger count cannot be satisfied by the input
        if pcr_select_count as usize > reader.remaining() / 3 {
            return Err(AttestationError::QuoteVerificationFailed(
                format!("Invalid pcr_select count: {}", pcr_select_count)
            ));
        }

        let mut pcr_select = Vec::with_capacity(pcr_select_count as usize);
        for _ in 0..pcr_select_count {
            pcr_select.push(TpmsPcrSelection::deserialize(reader)?);
        }

        let pcr_digest = reader.read_tpm2b("pcr_digest")?;

        Ok(TpmsQuoteInfo {
            pcr_select,
            pcr_digest,
        })
    }
}

/// TPM Quote attestation structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TpmsAttest {
    pub magic: u32,
    pub type_: TpmStType,
    pub qualified_signer: Vec<u8>,
    pub extra_data: Vec<u8>,           // Caller-supplied nonce
    pub clock_info: TpmsClockInfo,
    pub firmware_version: u64,
    pub attested: TpmsQuoteInfo,
}

impl TpmsAttest {
    /// Parse a marshalled TPMS_ATTEST of type TPM_ST_ATTEST_QUOTE
    ///
    /// # Errors
    /// * `QuoteVerificationFailed` - On truncated input, wrong magic, or a non-quote attestation type
    pub fn deserialize(data: &[u8]) -> Result<Self, AttestationError> {
        let mut reader = TpmReader::new(data, AttestationError::QuoteVerificationFailed);

        let magic = reader.read_u32("magic")?;
        if magic != TPM2_GENERATED_VALUE {
            return Err(AttestationError::QuoteVerificationFailed(
                format!("Invalid magic value: 0x{:08X}, expected 0x{:08X}", magic, TPM2_GENERATED_VALUE)
            ));
        }

        let type_ = TpmStType::try_from(reader.read_u16("type")?)?;
        if type_ != TpmStType::AttestQuote {
            return Err(AttestationError::QuoteVerificationFailed(
                format!("Expected Quote type, but got {:?}", type_)
            ));
        }

        let qualified_signer = reader.read_tpm2b("qualified_signer")?;
        let extra_data = reader.read_tpm2b("extra_data")?;
        let clock_info = TpmsClockInfo::deserialize(&mut reader)?;
        let firmware_version = reader.read_u64("firmware_version")?;
        let attested = TpmsQuoteInfo::deserialize(&mut reader)?;

        Ok(TpmsAttest {
            magic,
            type_,
            qualified_signer,
            extra_data,
            clock_info,
            firmware_version,
            attested,
        })
    }
}

/// Signature algorithm type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Tpm2SignatureAlgID {
    RsaSsa = 0x0014,
    RsaPss = 0x0016,
    Ecdsa = 0x0018,
    Unknown = 0xFFFF,
}

impl From<u16> for Tpm2SignatureAlgID {
    fn from(value: u16) -> Self {
        match value {
            0x0014 => Tpm2SignatureAlgID::RsaSsa,
            0x0016 => Tpm2SignatureAlgID::RsaPss,
            0x0018 => Tpm2SignatureAlgID::Ecdsa,
            _ => Tpm2SignatureAlgID::Unknown,
        }
    }
}

/// RSA signature structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TpmtSignatureRsa {
    pub hash: AlgorithmId,
    pub signature: Vec<u8>,
}

impl TpmtSignatureRsa {
    pub fn deserialize(reader: &mut TpmReader<'_>) -> Result<Self, AttestationError> {
        let hash = AlgorithmId::from(reader.read_u16("hash algorithm")?);
        let signature = reader.read_tpm2b("signature")?;
        Ok(TpmtSignatureRsa { hash, signature })
    }
}

/// ECC signature structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TpmtSignatureEcc {
    pub hash: AlgorithmId,
    pub signature_r: Vec<u8>,
    pub signature_s: Vec<u8>,
}

impl TpmtSignatureEcc {
    pub fn deserialize(reader: &mut TpmReader<'_>) -> Result<Self, AttestationError> {
        let hash = AlgorithmId::from(reader.read_u16("hash algorithm")?);
        let signature_r = reader.read_tpm2b("R coordinate")?;
        let signature_s = reader.read_tpm2b("S coordinate")?;
        Ok(TpmtSignatureEcc { hash, signature_r, signature_s })
    }
}

/// Signature structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TpmtSignature {
    pub sig_alg: Tpm2SignatureAlgID,
    pub signature: SignatureData,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SignatureData {
    RsaSignature(TpmtSignatureRsa),
    EccSignature(TpmtSignatureEcc),
}

impl TpmtSignature {
    pub fn deserialize(data: &[u8]) -> Result<Self, AttestationError> {
        let mut reader = TpmReader::new(data, AttestationError::QuoteVerificationFailed);

        let sig_alg = Tpm2SignatureAlgID::from(reader.read_u16("signature algorithm")?);

        let signature = match sig_alg {
            Tpm2SignatureAlgID::RsaSsa | Tpm2SignatureAlgID::RsaPss => {
                SignatureData::RsaSignature(TpmtSignatureRsa::deserialize(&mut reader)?)
            },
            Tpm2SignatureAlgID::Ecdsa => {
                SignatureData::EccSignature(TpmtSignatureEcc::deserialize(&mut reader)?)
            },
            Tpm2SignatureAlgID::Unknown => return Err(AttestationError::QuoteVerificationFailed(
                format!("Unsupported signature algorithm: {:?}", sig_alg)
            )),
        };

        Ok(TpmtSignature {
            sig_alg,
            signature,
        })
    }

    /// Hash algorithm the signature was produced with
    pub fn hash_alg(&self) -> AlgorithmId {
        match &self.signature {
            SignatureData::RsaSignature(rsa) => rsa.hash,
            SignatureData::EccSignature(ecc) => ecc.hash,
        }
    }
}
