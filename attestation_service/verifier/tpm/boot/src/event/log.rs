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

//! Event Log Parsing
//!
//! Splits a raw PC client event log into records and decodes record payloads.
//!
//! The first record always uses the TCG 1.2 layout. When it is a "Spec ID Event03" no action
//! event, the remaining records use the crypto agile layout sized by the algorithm table it
//! declares; otherwise the whole log is TCG 1.2.
//!
//! Parsing records never interprets payloads. `parse_event_data` is only meant for records whose
//! digest has already been confirmed by replay.

use log::debug;
use tpm_common_verifier::AttestationError;
use crate::byte_reader::{ByteReader, ByteParseable};
use crate::event::model::{
    EventType, TpmEventLog, TcgDigestAlgorithm, EventLogRecord, EfiSpecIdEvent, EvNoActionEvent,
    UefiGptDataEvent, UefiImageLoadEvent, NO_ACTION_EVENT_SIZE, SPEC_ID_EVENT_SIGNATURE_03,
};
use crate::event::parser::{
    TcgDigestParse, TcgDigestParseV1, TcgDigestParseV2,
    parse_uefi_variable_data_event, parse_typed_event, parse_firmware_blob, parse_scrtm_version,
};

/// Records of a PC client event log, in log order
#[derive(Debug, Clone, Default)]
pub struct PcClientEventLog {
    pub records: Vec<EventLogRecord>,
    pub spec_id: Option<EfiSpecIdEvent>,
}

impl PcClientEventLog {
    /// Parse a raw PC client event log into records
    ///
    /// An empty input yields an empty log.
    ///
    /// # Errors
    /// * `MalformedLog` - On truncation, an illegal event type, an event size larger than the
    ///   remaining data, or a digest algorithm not declared by the Spec ID event
    pub fn parse(raw: &[u8]) -> Result<Self, AttestationError> {
        let mut parser = ByteReader::new(raw);
        let mut log = PcClientEventLog::default();
        if parser.is_end() {
            return Ok(log);
        }

        let first = Self::parse_record(&mut parser, &TcgDigestParseV1, 0)?;
        if first.event_type == EventType::EvNoAction
            && first.data.len() >= NO_ACTION_EVENT_SIZE
            && &first.data[..NO_ACTION_EVENT_SIZE] == SPEC_ID_EVENT_SIGNATURE_03
        {
            let spec_id = EfiSpecIdEvent::parse_from(&mut ByteReader::new(&first.data[NO_ACTION_EVENT_SIZE..]))
                .map_err(|e| e.with_context("failed to parse Spec ID event"))?;
            debug!("Crypto agile event log, {} digest algorithms declared", spec_id.digest_algorithms.len());
            log.spec_id = Some(spec_id);
        }
        log.records.push(first);

        match log.spec_id.clone() {
            Some(spec_id) => {
                let digest_parser = TcgDigestParseV2 { spec_id: &spec_id };
                log.parse_remaining(&mut parser, &digest_parser)?;
            },
            None => log.parse_remaining(&mut parser, &TcgDigestParseV1)?,
        }

        Ok(log)
    }

    fn parse_remaining(
        &mut self,
        parser: &mut ByteReader,
        digest_parser: &dyn TcgDigestParse,
    ) -> Result<(), AttestationError> {
        while !parser.is_end() {
            let event_number = self.records.len() as u32;
            let record = Self::parse_record(parser, digest_parser, event_number)?;
            self.records.push(record);
        }
        Ok(())
    }

    /// Parse a single record: PCR index, event type, digest, event size and event data
    fn parse_record(
        parser: &mut ByteReader,
        digest_parser: &dyn TcgDigestParse,
        event_number: u32,
    ) -> Result<EventLogRecord, AttestationError> {
        let context = |step: &str| format!("{}, event_number: {}", step, event_number);

        let pcr_index: u32 = parser.read_u32()
            .map_err(|e| e.with_context(&context("failed to read PCR index")))?;
        let event_type_raw: u32 = parser.read_u32()
            .map_err(|e| e.with_context(&context("failed to read event type")))?;
        let event_type = EventType::untrusted_parse(event_type_raw)
            .map_err(|e| AttestationError::from(e).with_context(&context("invalid event type")))?;

        let digest: TcgDigestAlgorithm = digest_parser.parse_digest(parser)
            .map_err(|e| e.with_context(&context("failed to parse digest")))?;

        let event_size: u32 = parser.read_u32()
            .map_err(|e| e.with_context(&context("failed to read event size")))?;
        if event_size as u64 > parser.remaining() {
            return Err(AttestationError::MalformedLog(format!(
                "Event size {} exceeds remaining data {}, event_number: {}, event_type: {}",
                event_size, parser.remaining(), event_number, event_type
            )));
        }
        let data: Vec<u8> = parser.read_bytes(event_size as usize)?;

        Ok(EventLogRecord {
            event_number,
            pcr_index,
            event_type,
            digest,
            data,
        })
    }
}

/// Parse event data
///
/// Decodes a record payload according to its event type. Types this crate does not interpret
/// are returned as raw data.
///
/// # Errors
/// * `MalformedLog` - When the payload does not match the layout its event type prescribes
pub fn parse_event_data(event_type: &EventType, event_data: &[u8]) -> Result<TpmEventLog, AttestationError> {
    let mut parser = ByteReader::new(event_data);

    let event = match event_type {
        EventType::EvEfiPlatformFirmwareBlob => {
            TpmEventLog::EventUefiPlatformFirmwareBlob(parse_firmware_blob(&mut parser, false)?)
        },
        EventType::EvEfiPlatformFirmwareBlob2 => {
            TpmEventLog::EventUefiPlatformFirmwareBlob(parse_firmware_blob(&mut parser, true)?)
        },
        EventType::EvNoAction => {
            parse_typed_event::<EvNoActionEvent, _, _>(&mut parser, TpmEventLog::EventNoAction, "No Action Event")?
        },
        EventType::EvSeparator => TpmEventLog::EventSeparator(parser.read_remaining()?),
        EventType::EvAction | EventType::EvOmitBootDeviceEvents |
        EventType::EvEfiAction | EventType::EvIpl | EventType::EvEfiHcrtmEvent => {
            TpmEventLog::EventBaseStr(String::from_utf8_lossy(event_data).trim_end_matches('\0').to_string())
        },
        EventType::EvEventTag => {
            parse_typed_event(&mut parser, TpmEventLog::EventPCClientTagged, "PC Client Tagged Event")?
        },
        EventType::EvSCrtmVersion => TpmEventLog::EventSCrtmVersion(parse_scrtm_version(&mut parser)?),
        EventType::EvEfiVariableDriverConfig | EventType::EvEfiVariableBoot |
        EventType::EvEfiVariableBoot2 | EventType::EvEfiVariableAuthority => {
            let variable = parse_uefi_variable_data_event(event_type, &mut parser)
                .map_err(|e| e.with_context("failed to parse UEFI Variable Event"))?;
            TpmEventLog::EventUefiVariable(variable)
        },
        EventType::EvEfiGptEvent | EventType::EvEfiGptEvent2 => {
            parse_typed_event::<UefiGptDataEvent, _, _>(&mut parser, TpmEventLog::EventEfiGptEvent, "GPT Event")?
        },
        EventType::EvEfiBootServicesApplication | EventType::EvEfiBootServicesDriver |
        EventType::EvEfiRuntimeServicesDriver => {
            parse_typed_event::<UefiImageLoadEvent, _, _>(
                &mut parser,
                TpmEventLog::EventEfiBootServicesApplication,
                "Image Load Event"
            )?
        },
        _ => TpmEventLog::EventBase(parser.read_remaining()?),
    };

    Ok(event)
}
