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

//! TPMT_PUBLIC decoding for attestation keys.
//!
//! Only RSA and ECC keys with a signing scheme are accepted. The decoded area is converted to an
//! OpenSSL public key for signature verification and trust list comparison.
use openssl::bn::{BigNum, BigNumContext};
use openssl::ec::{EcGroup, EcKey};
use openssl::nid::Nid;
use openssl::pkey::{Id, PKey, Public};
use openssl::rsa::Rsa;
use crate::error::AttestationError;
use crate::structure::{AlgorithmId, TpmReader, TPM_ALG_NULL};

pub const TPM_ALG_RSA: u16 = 0x0001;
pub const TPM_ALG_ECC: u16 = 0x0023;
pub const TPM_ALG_RSAES: u16 = 0x0015;
pub const TPM_ALG_ECDAA: u16 = 0x001A;

pub const TPM_ECC_NIST_P256: u16 = 0x0003;
pub const TPM_ECC_NIST_P384: u16 = 0x0004;
pub const TPM_ECC_NIST_P521: u16 = 0x0005;

const DEFAULT_RSA_EXPONENT: u32 = 65537;

/// Key scheme of a TPMT_PUBLIC
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyScheme {
    pub scheme: u16,
    /// Hash of a signing scheme, absent for TPM_ALG_NULL and encryption schemes
    pub hash_alg: Option<AlgorithmId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublicParameters {
    Rsa {
        key_bits: u16,
        exponent: u32,
        modulus: Vec<u8>,
    },
    Ecc {
        curve_id: u16,
        x: Vec<u8>,
        y: Vec<u8>,
    },
}

/// Decoded TPMT_PUBLIC
#[derive(Debug, Clone)]
pub struct TpmtPublic {
    pub key_type: u16,
    pub name_alg: AlgorithmId,
    pub object_attributes: u32,
    pub auth_policy: Vec<u8>,
    pub scheme: KeyScheme,
    pub parameters: PublicParameters,
}

impl TpmtPublic {
    /// Decode a marshalled TPMT_PUBLIC.
    ///
    /// # Errors
    /// * `MalformedKey` - On truncated input or an unsupported key type
    pub fn decode(data: &[u8]) -> Result<Self, AttestationError> {
        let mut reader = TpmReader::new(data, AttestationError::MalformedKey);

        let key_type = reader.read_u16("key type")?;
        let name_alg = AlgorithmId::from(reader.read_u16("name algorithm")?);
        let object_attributes = reader.read_u32("object attributes")?;
        let auth_policy = reader.read_tpm2b("auth policy")?;

        // TPMT_SYM_DEF_OBJECT, signing keys normally carry TPM_ALG_NULL
        let symmetric = reader.read_u16("symmetric algorithm")?;
        if symmetric != TPM_ALG_NULL {
            reader.read_u16("symmetric key bits")?;
            reader.read_u16("symmetric mode")?;
        }

        let scheme = Self::read_scheme(&mut reader)?;

        let parameters = match key_type {
            TPM_ALG_RSA => {
                let key_bits = reader.read_u16("RSA key bits")?;
                let exponent = match reader.read_u32("RSA exponent")? {
                    0 => DEFAULT_RSA_EXPONENT,
                    e => e,
                };
                let modulus = reader.read_tpm2b("RSA modulus")?;
                PublicParameters::Rsa { key_bits, exponent, modulus }
            },
            TPM_ALG_ECC => {
                let curve_id = reader.read_u16("ECC curve")?;
                let kdf = reader.read_u16("ECC kdf scheme")?;
                if kdf != TPM_ALG_NULL {
                    reader.read_u16("ECC kdf hash")?;
                }
                let x = reader.read_tpm2b("ECC point x")?;
                let y = reader.read_tpm2b("ECC point y")?;
                PublicParameters::Ecc { curve_id, x, y }
            },
            other => return Err(AttestationError::MalformedKey(
                format!("Unsupported key type: 0x{:04X}", other)
            )),
        };

        Ok(TpmtPublic {
            key_type,
            name_alg,
            object_attributes,
            auth_policy,
            scheme,
            parameters,
        })
    }

    fn read_scheme(reader: &mut TpmReader<'_>) -> Result<KeyScheme, AttestationError> {
        let scheme = reader.read_u16("key scheme")?;
        let hash_alg = match scheme {
            TPM_ALG_NULL | TPM_ALG_RSAES => None,
            TPM_ALG_ECDAA => {
                let hash = reader.read_u16("scheme hash")?;
                reader.read_u16("ECDAA count")?;
                Some(AlgorithmId::from(hash))
            },
            _ => Some(AlgorithmId::from(reader.read_u16("scheme hash")?)),
        };
        Ok(KeyScheme { scheme, hash_alg })
    }

    /// Hash algorithm the key signs with
    ///
    /// # Errors
    /// * `MalformedKey` - The key has no signing scheme
    pub fn signing_hash_alg(&self) -> Result<AlgorithmId, AttestationError> {
        self.scheme.hash_alg.ok_or_else(|| AttestationError::MalformedKey(
            "Key has no signing scheme".to_string()
        ))
    }

    /// Convert the public area to an OpenSSL key
    pub fn to_public_key(&self) -> Result<PKey<Public>, AttestationError> {
        let to_malformed = |e: openssl::error::ErrorStack| AttestationError::MalformedKey(e.to_string());
        match &self.parameters {
            PublicParameters::Rsa { exponent, modulus, .. } => {
                let n = BigNum::from_slice(modulus).map_err(to_malformed)?;
                let e = BigNum::from_u32(*exponent).map_err(to_malformed)?;
                let rsa = Rsa::from_public_components(n, e).map_err(to_malformed)?;
                PKey::from_rsa(rsa).map_err(to_malformed)
            },
            PublicParameters::Ecc { curve_id, x, y } => {
                let nid = curve_to_nid(*curve_id)?;
                let group = EcGroup::from_curve_name(nid).map_err(to_malformed)?;
                let x = BigNum::from_slice(x).map_err(to_malformed)?;
                let y = BigNum::from_slice(y).map_err(to_malformed)?;
                let ec = EcKey::from_public_key_affine_coordinates(&group, &x, &y).map_err(to_malformed)?;
                PKey::from_ec_key(ec).map_err(to_malformed)
            },
        }
    }
}

fn curve_to_nid(curve_id: u16) -> Result<Nid, AttestationError> {
    match curve_id {
        TPM_ECC_NIST_P256 => Ok(Nid::X9_62_PRIME256V1),
        TPM_ECC_NIST_P384 => Ok(Nid::SECP384R1),
        TPM_ECC_NIST_P521 => Ok(Nid::SECP521R1),
        other => Err(AttestationError::MalformedKey(
            format!("Unsupported ECC curve: 0x{:04X}", other)
        )),
    }
}

/// Compare two public keys by type: RSA on modulus and exponent, EC on curve and point.
/// Keys of different types are never equal.
pub fn public_keys_equal(a: &PKey<Public>, b: &PKey<Public>) -> Result<bool, AttestationError> {
    if a.id() != b.id() {
        return Ok(false);
    }
    match a.id() {
        Id::RSA => {
            let (ra, rb) = (a.rsa()?, b.rsa()?);
            Ok(ra.n() == rb.n() && ra.e() == rb.e())
        },
        Id::EC => {
            let (ea, eb) = (a.ec_key()?, b.ec_key()?);
            let (ga, gb) = (ea.group(), eb.group());
            if ga.curve_name().is_none() || ga.curve_name() != gb.curve_name() {
                return Ok(false);
            }
            let mut ctx = BigNumContext::new()?;
            Ok(ea.public_key().eq(ga, eb.public_key(), &mut ctx)?)
        },
        _ => Ok(a.public_eq(b)),
    }
}
