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

pub mod byte_reader;
pub mod error;
pub mod event;
pub mod machine_state;
pub mod replay;
pub mod cel;

use tpm_common_verifier::{AttestationError, PcrBank};

pub use byte_reader::{ByteReader, ByteParseable, UEFI_GUID_SIZE};
pub use error::EventTypeError;
pub use event::model::{
    EventType, TpmEventLog, EventLogRecord, TcgDigestAlgorithm, TpmDigestEntry,
    EfiSpecIdEvent, EvNoActionEvent, TaggedEventData, EfiVariableData,
    NO_ACTION_EVENT_SIZE, SPEC_ID_EVENT_SIGNATURE_03, STARTUP_LOCALITY_SIGNATURE,
};
pub use event::parser::parse_tagged_event_data;
pub use event::log::{PcClientEventLog, parse_event_data};
pub use cel::{CanonicalEventLog, CelRecord, CosEvent, CosEventType, Tlv, replay_cel};
pub use replay::replay_pcclient;
pub use machine_state::{
    MachineState, PlatformState, SecureBootState, EfiState, ContainerState,
    VerifiedEvent, FirmwareBlob, Separator, SignatureEntry, BootEntry, TaggedEvent,
};

/// Parse a PC client event log and replay it against the quoted bank
///
/// An empty log yields an empty state.
pub fn parse_pcclient_event_log(raw: &[u8], pcrs: &PcrBank) -> Result<MachineState, AttestationError> {
    let log = PcClientEventLog::parse(raw)?;
    replay_pcclient(&log.records, pcrs)
}

/// Parse a canonical event log and replay it against the quoted bank
///
/// An empty log yields an empty state.
pub fn parse_canonical_event_log(raw: &[u8], pcrs: &PcrBank) -> Result<MachineState, AttestationError> {
    let log = CanonicalEventLog::parse(raw)?;
    replay_cel(&log.records, pcrs)
}
