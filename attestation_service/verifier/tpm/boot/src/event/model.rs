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

//! Event Type Definitions
//!
//! This module defines the event types, records and payload structures of the PC client TCG event log.
//! Records keep their raw payload; payload structures are only decoded from records whose digest
//! was confirmed by replay.

use std::fmt;
use tpm_common_verifier::AlgorithmId;
use crate::error::EventTypeError;

pub const NO_ACTION_EVENT_SIZE: usize = 16;
pub const UEFI_PARTITION_NAME_SIZE: usize = 72;

/// Spec id event signature 03
pub const SPEC_ID_EVENT_SIGNATURE_03: &[u8] = &[
    0x53, 0x70, 0x65, 0x63, 0x20,  // "Spec "
    0x49, 0x44, 0x20,              // "ID "
    0x45, 0x76, 0x65, 0x6E, 0x74,  // "Event"
    0x30, 0x33,                    // "03"
    0x00                           // Null terminator
];

/// Byte representation of startup locality identifier
pub const STARTUP_LOCALITY_SIGNATURE: &[u8] = &[
    0x53, 0x74, 0x61, 0x72, 0x74, 0x75, 0x70,           // "Startup"
    0x4C, 0x6F, 0x63, 0x61, 0x6C, 0x69, 0x74, 0x79,     // "Locality"
    0x00                                                // Null terminator
];

const BIOS_EVENT_RANGE: std::ops::RangeInclusive<u32> = 0x00000000..=0x00000012;
const EFI_EVENT_RANGE: std::ops::RangeInclusive<u32> = 0x80000000..=0x800000FF;

/// TCG Event Type Enumeration
///
/// Standard PC client event types and UEFI-specific event types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum EventType {
    EvPrebootCert = 0x00000000,
    EvPostCode = 0x00000001,
    EvUnused = 0x00000002,
    EvNoAction = 0x00000003,
    EvSeparator = 0x00000004,
    EvAction = 0x00000005,
    EvEventTag = 0x00000006,
    EvSCrtmContents = 0x00000007,
    EvSCrtmVersion = 0x00000008,
    EvCpuMicrocode = 0x00000009,
    EvPlatformConfigFlags = 0x0000000A,
    EvTableOfDevices = 0x0000000B,
    EvCompactHash = 0x0000000C,
    EvIpl = 0x0000000D,
    EvIplPartitionData = 0x0000000E,
    EvNonhostCode = 0x0000000F,
    EvNonhostConfig = 0x00000010,
    EvNonhostInfo = 0x00000011,
    EvOmitBootDeviceEvents = 0x00000012,

    // EFI specific event types
    EvEfiEventBase = 0x80000000,
    EvEfiVariableDriverConfig = 0x80000001,
    EvEfiVariableBoot = 0x80000002,
    EvEfiBootServicesApplication = 0x80000003,
    EvEfiBootServicesDriver = 0x80000004,
    EvEfiRuntimeServicesDriver = 0x80000005,
    EvEfiGptEvent = 0x80000006,
    EvEfiAction = 0x80000007,
    EvEfiPlatformFirmwareBlob = 0x80000008,
    EvEfiHandoffTables = 0x80000009,
    EvEfiPlatformFirmwareBlob2 = 0x8000000A,
    EvEfiHandoffTables2 = 0x8000000B,
    EvEfiVariableBoot2 = 0x8000000C,
    EvEfiGptEvent2 = 0x8000000D,
    EvEfiHcrtmEvent = 0x80000010,

    EvEfiVariableAuthority = 0x800000E0,
    EvEfiSpdmFirmwareBlob = 0x800000E1,
    EvEfiSpdmFirmwareConfig = 0x800000E2,
    EvEfiSpdmDevicePolicy = 0x800000E3,
    EvEfiSpdmDeviceAuthority = 0x800000E4,
}

impl EventType {
    /// Look up a value in the known event type table
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            0x00000000 => Some(Self::EvPrebootCert),
            0x00000001 => Some(Self::EvPostCode),
            0x00000002 => Some(Self::EvUnused),
            0x00000003 => Some(Self::EvNoAction),
            0x00000004 => Some(Self::EvSeparator),
            0x00000005 => Some(Self::EvAction),
            0x00000006 => Some(Self::EvEventTag),
            0x00000007 => Some(Self::EvSCrtmContents),
            0x00000008 => Some(Self::EvSCrtmVersion),
            0x00000009 => Some(Self::EvCpuMicrocode),
            0x0000000A => Some(Self::EvPlatformConfigFlags),
            0x0000000B => Some(Self::EvTableOfDevices),
            0x0000000C => Some(Self::EvCompactHash),
            0x0000000D => Some(Self::EvIpl),
            0x0000000E => Some(Self::EvIplPartitionData),
            0x0000000F => Some(Self::EvNonhostCode),
            0x00000010 => Some(Self::EvNonhostConfig),
            0x00000011 => Some(Self::EvNonhostInfo),
            0x00000012 => Some(Self::EvOmitBootDeviceEvents),

            // EFI specific event types
            0x80000000 => Some(Self::EvEfiEventBase),
            0x80000001 => Some(Self::EvEfiVariableDriverConfig),
            0x80000002 => Some(Self::EvEfiVariableBoot),
            0x80000003 => Some(Self::EvEfiBootServicesApplication),
            0x80000004 => Some(Self::EvEfiBootServicesDriver),
            0x80000005 => Some(Self::EvEfiRuntimeServicesDriver),
            0x80000006 => Some(Self::EvEfiGptEvent),
            0x80000007 => Some(Self::EvEfiAction),
            0x80000008 => Some(Self::EvEfiPlatformFirmwareBlob),
            0x80000009 => Some(Self::EvEfiHandoffTables),
            0x8000000A => Some(Self::EvEfiPlatformFirmwareBlob2),
            0x8000000B => Some(Self::EvEfiHandoffTables2),
            0x8000000C => Some(Self::EvEfiVariableBoot2),
            0x8000000D => Some(Self::EvEfiGptEvent2),
            0x80000010 => Some(Self::EvEfiHcrtmEvent),

            0x800000E0 => Some(Self::EvEfiVariableAuthority),
            0x800000E1 => Some(Self::EvEfiSpdmFirmwareBlob),
            0x800000E2 => Some(Self::EvEfiSpdmFirmwareConfig),
            0x800000E3 => Some(Self::EvEfiSpdmDevicePolicy),
            0x800000E4 => Some(Self::EvEfiSpdmDeviceAuthority),
            _ => None,
        }
    }

    /// Parse an event type read from an untrusted log.
    ///
    /// A value is legal only inside `[0x0, 0x12]` or `[0x80000000, 0x800000FF]`, and only if the
    /// known event type table contains it.
    ///
    /// # Errors
    /// * `EventTypeError::OutOfRange` - The value lies outside both ranges
    /// * `EventTypeError::Unknown` - The value is in range but not a known event type
    pub fn untrusted_parse(value: u32) -> Result<Self, EventTypeError> {
        if !BIOS_EVENT_RANGE.contains(&value) && !EFI_EVENT_RANGE.contains(&value) {
            return Err(EventTypeError::OutOfRange(value));
        }
        Self::from_u32(value).ok_or(EventTypeError::Unknown(value))
    }

    /// Boot variable events. Firmware hashes either the whole UEFI_VARIABLE_DATA or only its
    /// VariableData into the digest.
    pub fn is_boot_variable(&self) -> bool {
        matches!(self, Self::EvEfiVariableBoot | Self::EvEfiVariableBoot2)
    }

    /// Event types whose digest is the hash of the event data itself, so the payload can be
    /// re-hashed and compared to the logged digest
    pub fn is_payload_checkable(&self) -> bool {
        matches!(self,
            Self::EvSeparator |
            Self::EvEventTag |
            Self::EvAction |
            Self::EvEfiAction |
            Self::EvSCrtmVersion |
            Self::EvPlatformConfigFlags |
            Self::EvTableOfDevices |
            Self::EvOmitBootDeviceEvents |
            Self::EvEfiVariableDriverConfig |
            Self::EvEfiVariableAuthority |
            Self::EvEfiGptEvent |
            Self::EvEfiGptEvent2)
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::EvPrebootCert => "EV_PREBOOT_CERT",
            Self::EvPostCode => "EV_POST_CODE",
            Self::EvUnused => "EV_UNUSED",
            Self::EvNoAction => "EV_NO_ACTION",
            Self::EvSeparator => "EV_SEPARATOR",
            Self::EvAction => "EV_ACTION",
            Self::EvEventTag => "EV_EVENT_TAG",
            Self::EvSCrtmContents => "EV_S_CRTM_CONTENTS",
            Self::EvSCrtmVersion => "EV_S_CRTM_VERSION",
            Self::EvCpuMicrocode => "EV_CPU_MICROCODE",
            Self::EvPlatformConfigFlags => "EV_PLATFORM_CONFIG_FLAGS",
            Self::EvTableOfDevices => "EV_TABLE_OF_DEVICES",
            Self::EvCompactHash => "EV_COMPACT_HASH",
            Self::EvIpl => "EV_IPL",
            Self::EvIplPartitionData => "EV_IPL_PARTITION_DATA",
            Self::EvNonhostCode => "EV_NONHOST_CODE",
            Self::EvNonhostConfig => "EV_NONHOST_CONFIG",
            Self::EvNonhostInfo => "EV_NONHOST_INFO",
            Self::EvOmitBootDeviceEvents => "EV_OMIT_BOOT_DEVICE_EVENTS",
            Self::EvEfiEventBase => "EV_EFI_EVENT_BASE",
            Self::EvEfiVariableDriverConfig => "EV_EFI_VARIABLE_DRIVER_CONFIG",
            Self::EvEfiVariableBoot => "EV_EFI_VARIABLE_BOOT",
            Self::EvEfiBootServicesApplication => "EV_EFI_BOOT_SERVICES_APPLICATION",
            Self::EvEfiBootServicesDriver => "EV_EFI_BOOT_SERVICES_DRIVER",
            Self::EvEfiRuntimeServicesDriver => "EV_EFI_RUNTIME_SERVICES_DRIVER",
            Self::EvEfiGptEvent => "EV_EFI_GPT_EVENT",
            Self::EvEfiAction => "EV_EFI_ACTION",
            Self::EvEfiPlatformFirmwareBlob => "EV_EFI_PLATFORM_FIRMWARE_BLOB",
            Self::EvEfiHandoffTables => "EV_EFI_HANDOFF_TABLES",
            Self::EvEfiPlatformFirmwareBlob2 => "EV_EFI_PLATFORM_FIRMWARE_BLOB2",
            Self::EvEfiHandoffTables2 => "EV_EFI_HANDOFF_TABLES2",
            Self::EvEfiVariableBoot2 => "EV_EFI_VARIABLE_BOOT2",
            Self::EvEfiGptEvent2 => "EV_EFI_GPT_EVENT2",
            Self::EvEfiHcrtmEvent => "EV_EFI_HCRTM_EVENT",
            Self::EvEfiVariableAuthority => "EV_EFI_VARIABLE_AUTHORITY",
            Self::EvEfiSpdmFirmwareBlob => "EV_EFI_SPDM_FIRMWARE_BLOB",
            Self::EvEfiSpdmFirmwareConfig => "EV_EFI_SPDM_FIRMWARE_CONFIG",
            Self::EvEfiSpdmDevicePolicy => "EV_EFI_SPDM_DEVICE_POLICY",
            Self::EvEfiSpdmDeviceAuthority => "EV_EFI_SPDM_DEVICE_AUTHORITY",
        };
        write!(f, "{}", name)
    }
}

/// TPM Digest Entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TpmDigestEntry {
    pub algorithm_id: u16,
    pub digest_value: Vec<u8>,
}

/// TCG Digest Algorithm
///
/// Supports two versions of digest formats:
/// - V1: TCG 1.2 version, contains only SHA1 digest
/// - V2: crypto agile format, one digest per active bank
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TcgDigestAlgorithm {
    V1(Vec<u8>),
    V2(Vec<TpmDigestEntry>),
}

impl TcgDigestAlgorithm {
    /// Digest for the given bank, None when the record does not carry one
    pub fn get_digest_value(&self, hash_alg: AlgorithmId) -> Option<&[u8]> {
        match self {
            TcgDigestAlgorithm::V1(value) if hash_alg == AlgorithmId::Sha1 => Some(value.as_slice()),
            TcgDigestAlgorithm::V1(_) => None,
            TcgDigestAlgorithm::V2(digests) => {
                digests.iter()
                    .find(|d| d.algorithm_id == hash_alg.to_tpm_alg())
                    .map(|d| d.digest_value.as_slice())
            }
        }
    }
}

/// One record of the PC client event log, in log order
#[derive(Debug, Clone)]
pub struct EventLogRecord {
    pub event_number: u32,              // Position in the log
    pub pcr_index: u32,                 // PCR register index
    pub event_type: EventType,          // Event type
    pub digest: TcgDigestAlgorithm,     // Event digest
    pub data: Vec<u8>,                  // Raw event data
}

/// TCG EFI Specification ID Event Algorithm Size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TcgEfiSpecIdEventAlgorithmSize {
    pub algorithm_id: u16,
    pub digest_size: u16,
}

/// Specification ID Event Data
///
/// Contains TCG specification version information and supported digest algorithms
#[derive(Debug, Clone)]
pub struct EfiSpecIdEvent {
    pub platform_class: u32,
    pub family_minor: u8,
    pub family_major: u8,
    pub spec_errata: u8,
    pub uintn_size: u8,                     // UINTN data size (typically 2 or 4 bytes)
    pub digest_algorithms: Vec<TcgEfiSpecIdEventAlgorithmSize>,
    pub vendor_info: Vec<u8>,
}

impl EfiSpecIdEvent {
    pub fn digest_size_of(&self, algorithm_id: u16) -> Option<usize> {
        self.digest_algorithms.iter()
            .find(|a| a.algorithm_id == algorithm_id)
            .map(|a| a.digest_size as usize)
    }
}

/// No Action Event Data
#[derive(Debug, Clone)]
pub enum EvNoActionEvent {
    SpecIdEvent(EfiSpecIdEvent),
    StartupLocality(u8),
    Unknown(Vec<u8>),
}

#[derive(Debug, Clone)]
pub struct EfiSignatureList {
    pub signature_type: String, // guid
    pub signatures: Vec<EfiSignatureData>,
}

#[derive(Debug, Clone)]
pub struct EfiSignatureData {
    pub signature_owner: String, // guid
    pub signature_data: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct EfiLoadOption {
    pub attributes: u32,
    pub description: String,
    pub device_path: Vec<u8>,
}

/// UEFI Variable Data
#[derive(Debug, Clone)]
pub enum EfiVariableData {
    SignatureList(Vec<EfiSignatureList>),       // PK, KEK, db, dbx
    SecureBoot(bool),                           // SecureBoot or MokListTrusted
    AuthoritySignature(EfiSignatureData),       // Authority that verified an image
    BootOrder(Vec<String>),                     // Boot order
    Boot(EfiLoadOption),                        // Boot option
    Unknown(Vec<u8>),                           // Unknown data
}

/// UEFI Variable Event Data
#[derive(Debug, Clone)]
pub struct UefiVariableDataEvent {
    pub variable_name: String,                  // Variable GUID
    pub unicode_name: String,                   // Variable name
    pub variable_data: EfiVariableData,
}

/// Platform Firmware Blob Event Data
#[derive(Debug, Clone)]
pub struct UefiPlatformFirmwareBlobEvent {
    pub blob_description: Option<String>,       // Only present in the BLOB2 layout
    pub blob_base: u64,                         // Efi physical address
    pub blob_length: u64,
}

/// TCG_PCClientTaggedEvent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaggedEventData {
    pub id: u32,
    pub data: Vec<u8>,
}

/// GPT header, fields this crate reports on
#[derive(Debug, Clone)]
pub struct UefiPartitionHeader {
    pub signature: String,                  // "EFI PART"
    pub revision: u32,
    pub header_size: u32,
    pub disk_guid: String,
    pub number_of_partition_entries: u32,
    pub size_of_partition_entry: u32,
}

/// GPT Partition Entry
#[derive(Debug, Clone)]
pub struct UefiPartitionEntry {
    pub partition_type_guid: String,
    pub unique_partition_guid: String,
    pub starting_lba: u64,
    pub ending_lba: u64,
    pub attributes: u64,
    pub partition_name: String,
}

/// EFI GPT Event Data
#[derive(Debug, Clone)]
pub struct UefiGptDataEvent {
    pub uefi_partition_header: UefiPartitionHeader,
    pub partitions: Vec<UefiPartitionEntry>,
}

#[derive(Debug, Clone)]
pub struct UefiImageLoadEvent {
    pub image_location_in_memory: u64,
    pub image_length_in_memory: u64,
    pub image_link_time_address: u64,
    pub device_path: Vec<u8>,
}

/// Decoded event payloads
#[derive(Debug, Clone)]
pub enum TpmEventLog {
    EventBase(Vec<u8>),                                     // Raw event data
    EventBaseStr(String),                                   // Printable event string
    EventNoAction(EvNoActionEvent),
    EventSeparator(Vec<u8>),
    EventPCClientTagged(TaggedEventData),
    EventSCrtmVersion(String),                              // GUID or UCS-2 version string
    EventUefiPlatformFirmwareBlob(UefiPlatformFirmwareBlobEvent),
    EventUefiVariable(UefiVariableDataEvent),
    EventEfiBootServicesApplication(UefiImageLoadEvent),
    EventEfiGptEvent(UefiGptDataEvent),
}
