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

//! Canonical event log (CEL)
//!
//! TLV encoded records: type u8, length u32 big-endian, value. Each record is a recnum TLV,
//! a PCR TLV, a digests TLV holding one nested TLV per bank, and a content TLV. Container OS
//! launch events are the only content this crate interprets.

use std::collections::BTreeMap;
use std::fmt;
use log::{debug, info};
use openssl::memcmp;
use tpm_common_verifier::{AttestationError, CryptoVerifier, PcrBank};
use crate::byte_reader::ByteReader;
use crate::machine_state::{ContainerState, MachineState, VerifiedEvent};
use crate::replay::PcrReplay;

pub const CEL_SOURCE: &str = "cel";

pub const RECNUM_TYPE: u8 = 0;
pub const PCR_TYPE: u8 = 1;
pub const DIGESTS_TYPE: u8 = 3;
pub const COS_EVENT_TYPE: u8 = 80;

const RECNUM_SIZE: usize = 8;
const PCR_SIZE: usize = 1;

/// One type-length-value element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tlv {
    pub tlv_type: u8,
    pub value: Vec<u8>,
}

impl Tlv {
    fn parse_from(reader: &mut ByteReader) -> Result<Self, AttestationError> {
        let tlv_type = reader.read_u8()?;
        let length = reader.read_u32_be()?;
        if length as u64 > reader.remaining() {
            return Err(AttestationError::MalformedLog(format!(
                "TLV type {} length {} exceeds remaining data {}", tlv_type, length, reader.remaining()
            )));
        }
        let value = reader.read_bytes(length as usize)?;
        Ok(Tlv { tlv_type, value })
    }

    fn expect(reader: &mut ByteReader, tlv_type: u8, name: &str) -> Result<Self, AttestationError> {
        let tlv = Self::parse_from(reader).map_err(|e| e.with_context(&format!("failed to read {}", name)))?;
        if tlv.tlv_type != tlv_type {
            return Err(AttestationError::MalformedLog(format!(
                "expected {} TLV (type {}), got type {}", name, tlv_type, tlv.tlv_type
            )));
        }
        Ok(tlv)
    }
}

/// Container OS event types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CosEventType {
    ImageRef = 0,
    ImageDigest = 1,
    RestartPolicy = 2,
    ImageId = 3,
    Arg = 4,
    EnvVar = 5,
    OverrideArg = 6,
    OverrideEnv = 7,
    LaunchSeparator = 8,
}

impl TryFrom<u8> for CosEventType {
    type Error = AttestationError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::ImageRef),
            1 => Ok(Self::ImageDigest),
            2 => Ok(Self::RestartPolicy),
            3 => Ok(Self::ImageId),
            4 => Ok(Self::Arg),
            5 => Ok(Self::EnvVar),
            6 => Ok(Self::OverrideArg),
            7 => Ok(Self::OverrideEnv),
            8 => Ok(Self::LaunchSeparator),
            _ => Err(AttestationError::MalformedLog(format!("unknown COS event type {}", value))),
        }
    }
}

impl fmt::Display for CosEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ImageRef => "ImageRef",
            Self::ImageDigest => "ImageDigest",
            Self::RestartPolicy => "RestartPolicy",
            Self::ImageId => "ImageID",
            Self::Arg => "Arg",
            Self::EnvVar => "EnvVar",
            Self::OverrideArg => "OverrideArg",
            Self::OverrideEnv => "OverrideEnv",
            Self::LaunchSeparator => "LaunchSeparator",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CosEvent {
    pub event_type: CosEventType,
    pub data: Vec<u8>,
}

impl CosEvent {
    /// Parse the value of a COS content TLV, which is itself a single TLV
    pub fn parse(content: &[u8]) -> Result<Self, AttestationError> {
        let mut reader = ByteReader::new(content);
        let inner = Tlv::parse_from(&mut reader)?;
        if !reader.is_end() {
            return Err(AttestationError::MalformedLog(format!(
                "{} trailing bytes after COS event", reader.remaining()
            )));
        }
        Ok(CosEvent {
            event_type: CosEventType::try_from(inner.tlv_type)?,
            data: inner.value,
        })
    }

    fn text(&self) -> Result<String, AttestationError> {
        String::from_utf8(self.data.clone()).map_err(|e| AttestationError::MalformedLog(
            format!("{} event is not valid UTF-8: {}", self.event_type, e)
        ))
    }

    fn env_pair(&self) -> Result<(String, String), AttestationError> {
        let text = self.text()?;
        let (name, value) = text.split_once('=').ok_or_else(|| AttestationError::MalformedLog(
            format!("{} event {:?} is not NAME=VALUE", self.event_type, text)
        ))?;
        Ok((name.to_string(), value.to_string()))
    }
}

/// One CEL record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CelRecord {
    pub recnum: u64,
    pub pcr_index: u32,
    /// Digest per TPM algorithm id
    pub digests: BTreeMap<u16, Vec<u8>>,
    pub content: Tlv,
}

#[derive(Debug, Clone, Default)]
pub struct CanonicalEventLog {
    pub records: Vec<CelRecord>,
}

impl CanonicalEventLog {
    /// Parse a TLV encoded canonical event log
    ///
    /// # Errors
    /// * `MalformedLog` - On truncation, an unexpected TLV order, or recnums not sequential from 0
    pub fn parse(raw: &[u8]) -> Result<Self, AttestationError> {
        let mut reader = ByteReader::new(raw);
        let mut records = Vec::new();

        while !reader.is_end() {
            let expected_recnum = records.len() as u64;
            let record = Self::parse_record(&mut reader)
                .map_err(|e| e.with_context(&format!("record {}", expected_recnum)))?;
            if record.recnum != expected_recnum {
                return Err(AttestationError::MalformedLog(format!(
                    "CEL recnum {} out of sequence, expected {}", record.recnum, expected_recnum
                )));
            }
            records.push(record);
        }

        Ok(CanonicalEventLog { records })
    }

    fn parse_record(reader: &mut ByteReader) -> Result<CelRecord, AttestationError> {
        let recnum = Tlv::expect(reader, RECNUM_TYPE, "recnum")?;
        if recnum.value.len() != RECNUM_SIZE {
            return Err(AttestationError::MalformedLog(format!("recnum has {} bytes", recnum.value.len())));
        }
        let recnum = ByteReader::new(&recnum.value).read_u64_be()?;

        let pcr = Tlv::expect(reader, PCR_TYPE, "pcr")?;
        if pcr.value.len() != PCR_SIZE {
            return Err(AttestationError::MalformedLog(format!("pcr has {} bytes", pcr.value.len())));
        }
        let pcr_index = pcr.value[0] as u32;

        let digests_tlv = Tlv::expect(reader, DIGESTS_TYPE, "digests")?;
        let mut digests = BTreeMap::new();
        let mut digest_reader = ByteReader::new(&digests_tlv.value);
        while !digest_reader.is_end() {
            let digest = Tlv::parse_from(&mut digest_reader)?;
            digests.insert(digest.tlv_type as u16, digest.value);
        }

        let content = Tlv::parse_from(reader).map_err(|e| e.with_context("failed to read content"))?;

        Ok(CelRecord { recnum, pcr_index, digests, content })
    }
}

/// Replay CEL records against a quoted PCR bank and collect container facts
///
/// # Errors
/// * `MalformedLog` - A record has no digest for the bank, or a COS event is malformed or follows
///   the launch separator
/// * `ReplayMismatch` - A digest is not the hash of the record content, or a replayed PCR differs
///   from the quoted value
pub fn replay_cel(records: &[CelRecord], pcrs: &PcrBank) -> Result<MachineState, AttestationError> {
    let mut replay = PcrReplay::new(pcrs, None);
    let hash_alg = *replay.hash_alg();
    let tpm_alg = hash_alg.to_tpm_alg();
    let mut verified: Vec<(&CelRecord, &[u8])> = Vec::new();

    for record in records {
        if !replay.is_quoted(record.pcr_index) {
            debug!("Skipping CEL record {} on PCR{}, not in quote", record.recnum, record.pcr_index);
            continue;
        }

        let digest = record.digests.get(&tpm_alg).ok_or_else(|| AttestationError::MalformedLog(
            format!("CEL record {} has no {} digest", record.recnum, hash_alg)
        ))?;

        let computed = CryptoVerifier::digest(&hash_alg, &record.content.value)?;
        if computed.len() != digest.len() || !memcmp::eq(&computed, digest) {
            return Err(AttestationError::ReplayMismatch(format!(
                "CEL record {} digest {} does not match content hash {}",
                record.recnum, hex::encode(digest), hex::encode(&computed)
            )));
        }

        replay.extend(record.pcr_index, digest)?;
        verified.push((record, digest.as_slice()));
    }

    replay.finish()?;
    info!("Canonical event log replayed, {} records verified on {} bank", verified.len(), hash_alg);

    let mut state = MachineState::default();
    let mut container: Option<ContainerState> = None;
    for (record, digest) in verified {
        let event_type = if record.content.tlv_type == COS_EVENT_TYPE {
            let event = CosEvent::parse(&record.content.value)
                .map_err(|e| e.with_context(&format!("CEL record {}", record.recnum)))?;
            let name = event.event_type.to_string();
            add_cos_fact(container.get_or_insert_with(ContainerState::default), &event)?;
            name
        } else {
            format!("content type {}", record.content.tlv_type)
        };
        state.events.push(VerifiedEvent {
            source: CEL_SOURCE.to_string(),
            pcr: record.pcr_index,
            event_type,
            digest: hex::encode(digest),
        });
    }
    state.container = container;
    Ok(state)
}

fn add_cos_fact(container: &mut ContainerState, event: &CosEvent) -> Result<(), AttestationError> {
    if container.launch_separator_seen {
        return Err(AttestationError::MalformedLog(format!(
            "{} event found after the launch separator", event.event_type
        )));
    }
    match event.event_type {
        CosEventType::ImageRef => container.image_reference = Some(event.text()?),
        CosEventType::ImageDigest => container.image_digest = Some(event.text()?),
        CosEventType::RestartPolicy => container.restart_policy = Some(event.text()?),
        CosEventType::ImageId => container.image_id = Some(event.text()?),
        CosEventType::Arg => container.args.push(event.text()?),
        CosEventType::EnvVar => {
            let (name, value) = event.env_pair()?;
            container.env.insert(name, value);
        },
        CosEventType::OverrideArg => container.override_args.push(event.text()?),
        CosEventType::OverrideEnv => {
            let (name, value) = event.env_pair()?;
            container.override_env.insert(name, value);
        },
        CosEventType::LaunchSeparator => container.launch_separator_seen = true,
    }
    Ok(())
}
