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

//! PCR replay of PC client event log records
//!
//! Records are extended in log order onto per-PCR running values and the results compared with
//! the quoted bank. Facts are extracted only once every touched PCR matched.

use std::collections::BTreeMap;
use log::{debug, info};
use openssl::memcmp;
use tpm_common_verifier::{AttestationError, AlgorithmId, CryptoVerifier, PcrBank};
use crate::event::log::parse_event_data;
use crate::event::parser::uefi_variable_data_bytes;
use crate::event::model::{
    EventLogRecord, EventType, TpmEventLog, EfiSignatureList, EfiVariableData, NO_ACTION_EVENT_SIZE,
    STARTUP_LOCALITY_SIGNATURE,
};
use crate::machine_state::{
    MachineState, VerifiedEvent, FirmwareBlob, Separator, SignatureEntry, BootEntry, TaggedEvent,
};

pub const PCCLIENT_SOURCE: &str = "pcclient";

/// Running PCR values of one bank, created lazily from the PC client reset values
pub(crate) struct PcrReplay<'a> {
    pcrs: &'a PcrBank,
    locality: Option<u8>,
    running: BTreeMap<u32, Vec<u8>>,
}

impl<'a> PcrReplay<'a> {
    pub(crate) fn new(pcrs: &'a PcrBank, locality: Option<u8>) -> Self {
        Self { pcrs, locality, running: BTreeMap::new() }
    }

    pub(crate) fn hash_alg(&self) -> &AlgorithmId {
        &self.pcrs.hash_alg
    }

    pub(crate) fn is_quoted(&self, pcr_index: u32) -> bool {
        self.pcrs.get_pcr_value(pcr_index).is_some()
    }

    pub(crate) fn extend(&mut self, pcr_index: u32, digest: &[u8]) -> Result<(), AttestationError> {
        let hash_alg = self.pcrs.hash_alg;
        if digest.len() != hash_alg.digest_size() {
            return Err(AttestationError::MalformedLog(format!(
                "PCR{} digest has {} bytes, {} bank expects {}", pcr_index, digest.len(), hash_alg, hash_alg.digest_size()
            )));
        }
        let current = match self.running.remove(&pcr_index) {
            Some(value) => value,
            None => PcrBank::create_initial_pcr_value(&hash_alg, pcr_index, self.locality)?,
        };
        let next = PcrBank::extend(&hash_alg, &current, digest)?;
        self.running.insert(pcr_index, next);
        Ok(())
    }

    /// Every PCR touched by the log must equal its quoted value
    pub(crate) fn finish(self) -> Result<(), AttestationError> {
        for (pcr_index, replayed) in &self.running {
            let quoted = self.pcrs.get_pcr_value(*pcr_index).ok_or_else(|| AttestationError::InternalError(
                format!("PCR{} was replayed but is not quoted", pcr_index)
            ))?;
            if quoted.len() != replayed.len() || !memcmp::eq(quoted, replayed) {
                return Err(AttestationError::ReplayMismatch(format!(
                    "PCR{} replayed to {}, quoted value is {}",
                    pcr_index, hex::encode(replayed), hex::encode(quoted)
                )));
            }
        }
        Ok(())
    }
}

fn digest_eq(computed: &[u8], logged: &[u8]) -> bool {
    computed.len() == logged.len() && memcmp::eq(computed, logged)
}

/// A boot variable digest must cover either the whole payload or its VariableData
fn check_boot_variable(record: &EventLogRecord, hash_alg: &AlgorithmId, digest: &[u8]) -> Result<(), AttestationError> {
    if digest_eq(&CryptoVerifier::digest(hash_alg, &record.data)?, digest) {
        return Ok(());
    }
    let variable_data = uefi_variable_data_bytes(&record.data).map_err(|e| e.with_context(
        &format!("event {} ({})", record.event_number, record.event_type)
    ))?;
    if digest_eq(&CryptoVerifier::digest(hash_alg, &variable_data)?, digest) {
        return Ok(());
    }
    Err(AttestationError::ReplayMismatch(format!(
        "event {} ({}) digest {} matches neither the variable payload nor its data",
        record.event_number, record.event_type, hex::encode(digest)
    )))
}

/// Locality announced by a "StartupLocality" no action event, if any
fn startup_locality(records: &[EventLogRecord]) -> Option<u8> {
    records.iter()
        .filter(|r| r.event_type == EventType::EvNoAction)
        .filter(|r| r.data.len() > NO_ACTION_EVENT_SIZE && &r.data[..NO_ACTION_EVENT_SIZE] == STARTUP_LOCALITY_SIGNATURE)
        .map(|r| r.data[NO_ACTION_EVENT_SIZE])
        .next()
}

/// Replay PC client records against a quoted PCR bank
///
/// # Errors
/// * `MalformedLog` - A record carries no digest for the bank, or a verified payload does not decode
/// * `ReplayMismatch` - A checkable payload or boot variable does not hash to its digest, or a
///   replayed PCR differs from the quoted value
pub fn replay_pcclient(records: &[EventLogRecord], pcrs: &PcrBank) -> Result<MachineState, AttestationError> {
    let hash_alg = pcrs.hash_alg;
    let mut replay = PcrReplay::new(pcrs, startup_locality(records));
    let mut verified: Vec<(&EventLogRecord, Vec<u8>)> = Vec::new();

    for record in records {
        if !replay.is_quoted(record.pcr_index) {
            debug!("Skipping event {} on PCR{}, not in quote", record.event_number, record.pcr_index);
            continue;
        }
        if record.event_type == EventType::EvNoAction {
            continue;
        }

        let digest = record.digest.get_digest_value(hash_alg).ok_or_else(|| AttestationError::MalformedLog(
            format!("event {} ({}) has no {} digest", record.event_number, record.event_type, hash_alg)
        ))?;

        if record.event_type.is_payload_checkable() {
            let computed = CryptoVerifier::digest(&hash_alg, &record.data)?;
            if !digest_eq(&computed, digest) {
                return Err(AttestationError::ReplayMismatch(format!(
                    "event {} ({}) digest {} does not match payload hash {}",
                    record.event_number, record.event_type, hex::encode(digest), hex::encode(&computed)
                )));
            }
        } else if record.event_type.is_boot_variable() {
            check_boot_variable(record, &hash_alg, digest)?;
        }

        debug!("Extending PCR{} with event {} ({})", record.pcr_index, record.event_number, record.event_type);
        replay.extend(record.pcr_index, digest)?;
        verified.push((record, digest.to_vec()));
    }

    replay.finish()?;
    info!("PC client event log replayed, {} events verified on {} bank", verified.len(), hash_alg);

    let mut state = MachineState::default();
    for (record, digest) in verified {
        add_record_facts(&mut state, record, &digest)?;
    }
    Ok(state)
}

fn signature_entries(database: &str, lists: &[EfiSignatureList]) -> Vec<SignatureEntry> {
    lists.iter()
        .flat_map(|list| list.signatures.iter().map(move |s| SignatureEntry {
            database: database.to_string(),
            signature_type: list.signature_type.clone(),
            owner: s.signature_owner.clone(),
            data: hex::encode(&s.signature_data),
        }))
        .collect()
}

fn add_record_facts(state: &mut MachineState, record: &EventLogRecord, digest: &[u8]) -> Result<(), AttestationError> {
    state.events.push(VerifiedEvent {
        source: PCCLIENT_SOURCE.to_string(),
        pcr: record.pcr_index,
        event_type: record.event_type.to_string(),
        digest: hex::encode(digest),
    });

    // Only the digest binds these payloads
    match record.event_type {
        EventType::EvEfiPlatformFirmwareBlob | EventType::EvEfiPlatformFirmwareBlob2 => {
            state.platform.firmware_blobs.push(FirmwareBlob {
                pcr: record.pcr_index,
                digest: hex::encode(digest),
            });
            return Ok(());
        },
        EventType::EvEfiBootServicesApplication => {
            state.efi.apps.push(hex::encode(digest));
            return Ok(());
        },
        _ => {},
    }
    if !record.event_type.is_payload_checkable() && !record.event_type.is_boot_variable() {
        return Ok(());
    }

    let event = parse_event_data(&record.event_type, &record.data).map_err(|e| AttestationError::MalformedLog(
        format!("event {} ({}): {}", record.event_number, record.event_type, e.message())
    ))?;

    match event {
        TpmEventLog::EventSCrtmVersion(version) => state.platform.scrtm_version = Some(version),
        TpmEventLog::EventSeparator(value) => state.platform.separators.push(Separator {
            pcr: record.pcr_index,
            value: hex::encode(value),
        }),
        TpmEventLog::EventBaseStr(action)
            if matches!(record.event_type, EventType::EvAction | EventType::EvEfiAction) => {
            state.platform.actions.push(action);
        },
        TpmEventLog::EventPCClientTagged(tagged) => state.tagged_events.push(TaggedEvent {
            id: tagged.id,
            data: hex::encode(tagged.data),
        }),
        TpmEventLog::EventEfiGptEvent(gpt) => state.efi.gpt_partition_count = Some(gpt.partitions.len() as u64),
        TpmEventLog::EventUefiVariable(variable) => match (record.event_type, variable.variable_data) {
            (EventType::EvEfiVariableAuthority, EfiVariableData::AuthoritySignature(signature)) => {
                state.secure_boot.authorities.push(SignatureEntry {
                    database: variable.unicode_name,
                    signature_type: String::new(),
                    owner: signature.signature_owner,
                    data: hex::encode(signature.signature_data),
                });
            },
            (EventType::EvEfiVariableDriverConfig, EfiVariableData::SecureBoot(enabled)) => {
                state.secure_boot.enabled = Some(enabled);
            },
            (EventType::EvEfiVariableDriverConfig, EfiVariableData::SignatureList(lists)) => {
                let entries = signature_entries(&variable.unicode_name, &lists);
                match variable.unicode_name.as_str() {
                    "PK" => state.secure_boot.pk.extend(entries),
                    "KEK" => state.secure_boot.kek.extend(entries),
                    "db" => state.secure_boot.db.extend(entries),
                    _ => state.secure_boot.dbx.extend(entries),
                }
            },
            (_, EfiVariableData::BootOrder(order)) => state.efi.boot_order = Some(order),
            (_, EfiVariableData::Boot(option)) => state.efi.boot_entries.push(BootEntry {
                name: variable.unicode_name,
                description: option.description,
                device_path: hex::encode(option.device_path),
            }),
            _ => {},
        },
        _ => {},
    }
    Ok(())
}
