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

//! Event Parsing Module
//!
//! This module implements parsing functionality for the structures found in PC client event logs:
//! - TCG digest parsing, TCG 1.2 and crypto agile
//! - EFI specification ID and startup locality events
//! - Tagged events
//! - Firmware BLOB events
//! - UEFI variable events
//! - UEFI partition table and image load events
//!
//! Every length or count read from the log is checked against the remaining input before anything
//! is allocated for it.

use std::mem::size_of;
use tpm_common_verifier::AttestationError;
use crate::byte_reader::{ByteReader, ByteParseable, UEFI_GUID_SIZE};
use crate::event::model::{
    EventType, NO_ACTION_EVENT_SIZE, UEFI_PARTITION_NAME_SIZE,
    SPEC_ID_EVENT_SIGNATURE_03, STARTUP_LOCALITY_SIGNATURE,
    TpmDigestEntry, TcgDigestAlgorithm, TcgEfiSpecIdEventAlgorithmSize, EfiSpecIdEvent, EvNoActionEvent,
    EfiSignatureList, EfiSignatureData, UefiVariableDataEvent, EfiLoadOption, EfiVariableData,
    UefiPlatformFirmwareBlobEvent, TaggedEventData,
    UefiPartitionHeader, UefiPartitionEntry, UefiGptDataEvent, UefiImageLoadEvent,
};

// SHA1 digest length in bytes
const SHA1_DIGEST_SIZE: usize = 20;
const TCG_DIGEST_ALGORITHM_COUNT: u32 = 5; // sha1, sha256, sha384, sha512, sm3

const VAR_SECURE_BOOT: &str = "SecureBoot";
const VAR_DB: &str = "db";
const VAR_DBX: &str = "dbx";
const VAR_KEK: &str = "KEK";
const VAR_PK: &str = "PK";
const VAR_SHIM: &str = "Shim";
const VAR_MOK_LIST: &str = "MokList";
const VAR_MOK_LIST_TRUSTED: &str = "MokListTrusted";
const VAR_BOOT_ORDER: &str = "BootOrder";
const VAR_BOOT_PREFIX: &str = "Boot";
// Boot entry name length, format is BootXXXX, total 8 characters
const VAR_BOOT_ENTRY_LENGTH: usize = 8;

// GPT header fields before the disk GUID: signature, revision, header size, crc, reserved, 4 LBAs
const GPT_HEADER_LBA_FIELDS: usize = 4;
const GPT_PARTITION_ENTRY_SIZE: u64 = 128;

/// TCG Digest Parsing Trait
///
/// Different TCG specification versions have different digest formats, and this trait
/// provides a unified interface for handling both.
pub trait TcgDigestParse {
    /// Parses digest data from a byte stream
    ///
    /// # Errors
    /// * `AttestationError::MalformedLog` - If the digest data is truncated or names an undeclared algorithm
    fn parse_digest(&self, cursor: &mut ByteReader) -> Result<TcgDigestAlgorithm, AttestationError>;
}

/// TCG 1.2 version digest parser
pub struct TcgDigestParseV1;

/// Crypto agile digest parser, sized by the Spec ID event's algorithm table
pub struct TcgDigestParseV2<'a> {
    pub spec_id: &'a EfiSpecIdEvent,
}

/// TCG 1.2 digest contains only a single SHA-1 digest field
impl TcgDigestParse for TcgDigestParseV1 {
    fn parse_digest(&self, cursor: &mut ByteReader) -> Result<TcgDigestAlgorithm, AttestationError> {
        let digest: Vec<u8> = cursor.read_bytes(SHA1_DIGEST_SIZE)?;
        Ok(TcgDigestAlgorithm::V1(digest))
    }
}

/// Crypto agile digests: a count followed by (algorithm ID, digest) pairs
impl TcgDigestParse for TcgDigestParseV2<'_> {
    fn parse_digest(&self, cursor: &mut ByteReader) -> Result<TcgDigestAlgorithm, AttestationError> {
        let digest_count: u32 = cursor.read_u32()?;

        if digest_count as usize > self.spec_id.digest_algorithms.len() {
            return Err(AttestationError::MalformedLog(format!(
                "Invalid digest count: {}, Spec ID event declares {} algorithms",
                digest_count, self.spec_id.digest_algorithms.len()
            )));
        }

        let mut digests: Vec<TpmDigestEntry> = Vec::with_capacity(digest_count as usize);
        for _ in 0..digest_count {
            let algorithm_id: u16 = cursor.read_u16()?;
            let digest_size = self.spec_id.digest_size_of(algorithm_id).ok_or_else(|| {
                AttestationError::MalformedLog(format!(
                    "Algorithm 0x{:04X} is not declared in the Spec ID event", algorithm_id
                ))
            })?;
            let digest_value: Vec<u8> = cursor.read_bytes(digest_size)?;
            digests.push(TpmDigestEntry { algorithm_id, digest_value });
        }

        Ok(TcgDigestAlgorithm::V2(digests))
    }
}

impl ByteParseable for EfiSpecIdEvent {
    /// Parses the body of a "Spec ID Event03" no action event, after the signature
    fn parse_from(parser: &mut ByteReader) -> Result<Self, AttestationError> {
        let platform_class: u32 = parser.read_u32()?;
        let family_minor: u8 = parser.read_u8()?;
        let family_major: u8 = parser.read_u8()?;
        let spec_errata: u8 = parser.read_u8()?;
        let uintn_size: u8 = parser.read_u8()?;

        let algorithm_count: u32 = parser.read_u32()?;
        if algorithm_count == 0 || algorithm_count > TCG_DIGEST_ALGORITHM_COUNT {
            return Err(AttestationError::MalformedLog(format!("Invalid algorithm count: {}", algorithm_count)));
        }

        let mut digest_algorithms = Vec::with_capacity(algorithm_count as usize);
        for _ in 0..algorithm_count {
            let algorithm_id: u16 = parser.read_u16()?;
            let digest_size: u16 = parser.read_u16()?;
            digest_algorithms.push(TcgEfiSpecIdEventAlgorithmSize { algorithm_id, digest_size });
        }

        let vendor_info_size: u8 = parser.read_u8()?;
        let vendor_info: Vec<u8> = parser.read_bytes(vendor_info_size as usize)?;

        Ok(EfiSpecIdEvent {
            platform_class,
            family_minor,
            family_major,
            spec_errata,
            uintn_size,
            digest_algorithms,
            vendor_info,
        })
    }
}

impl ByteParseable for EvNoActionEvent {
    /// Parses into different no action event types based on signature
    fn parse_from(parser: &mut ByteReader) -> Result<Self, AttestationError> {
        if parser.remaining() < NO_ACTION_EVENT_SIZE as u64 {
            return Ok(EvNoActionEvent::Unknown(parser.read_remaining()?));
        }
        let signature: Vec<u8> = parser.read_bytes(NO_ACTION_EVENT_SIZE)?;
        if signature == SPEC_ID_EVENT_SIGNATURE_03 {
            Ok(EvNoActionEvent::SpecIdEvent(EfiSpecIdEvent::parse_from(parser)?))
        } else if signature == STARTUP_LOCALITY_SIGNATURE {
            Ok(EvNoActionEvent::StartupLocality(parser.read_u8()?))
        } else {
            let mut unknown_data = signature;
            unknown_data.extend(parser.read_remaining()?);
            Ok(EvNoActionEvent::Unknown(unknown_data))
        }
    }
}

impl ByteParseable for TaggedEventData {
    /// Parses a TCG_PCClientTaggedEvent: id, data length, data
    fn parse_from(parser: &mut ByteReader) -> Result<Self, AttestationError> {
        let id: u32 = parser.read_u32()?;
        let data_len: u32 = parser.read_u32()?;
        if data_len as u64 > parser.remaining() {
            return Err(AttestationError::MalformedLog(format!(
                "tagged event len ({} bytes) larger than remaining data ({} bytes)", data_len, parser.remaining()
            )));
        }
        let data: Vec<u8> = parser.read_bytes(data_len as usize)?;
        Ok(TaggedEventData { id, data })
    }
}

/// Parses a tagged event payload
///
/// # Errors
/// * `MalformedLog` - On a truncated header or when the data length exceeds the payload
pub fn parse_tagged_event_data(data: &[u8]) -> Result<TaggedEventData, AttestationError> {
    TaggedEventData::parse_from(&mut ByteReader::new(data))
}

/// Parses a platform firmware blob event, BLOB2 when `with_description` is set
pub fn parse_firmware_blob(
    parser: &mut ByteReader,
    with_description: bool,
) -> Result<UefiPlatformFirmwareBlobEvent, AttestationError> {
    let blob_description = if with_description {
        let blob_description_size: u8 = parser.read_u8()?;
        let description: Vec<u8> = parser.read_bytes(blob_description_size as usize)?;
        Some(String::from_utf8_lossy(&description).trim_end_matches('\0').to_string())
    } else {
        None
    };
    let blob_base: u64 = parser.read_u64()?;
    let blob_length: u64 = parser.read_u64()?;
    Ok(UefiPlatformFirmwareBlobEvent {
        blob_description,
        blob_base,
        blob_length,
    })
}

/// Parses S-CRTM version event data, either a 16-byte GUID or a UCS-2 string
pub fn parse_scrtm_version(parser: &mut ByteReader) -> Result<String, AttestationError> {
    if parser.remaining() as usize == UEFI_GUID_SIZE {
        parser.read_guid()
    } else {
        parser.read_ucs2_string()
    }
}

impl ByteParseable for EfiSignatureList {
    /// Parses EFI signature list
    ///
    /// Contains signature type, list size, header size, signature size, and multiple signature data
    fn parse_from(parser: &mut ByteReader) -> Result<Self, AttestationError> {
        let signature_type: String = parser.read_guid()?;

        let signature_list_size: u32 = parser.read_u32()?;
        let signature_header_size: u32 = parser.read_u32()?;
        let signature_size: u32 = parser.read_u32()?;
        parser.read_bytes(signature_header_size as usize)?;

        // guid + list size(4 bytes) + header size(4 bytes) + sign size(4 bytes) + sign header size
        let prefix_size = UEFI_GUID_SIZE + size_of::<u32>() * 3 + signature_header_size as usize;
        if signature_list_size as usize <= prefix_size || (signature_size as usize) <= UEFI_GUID_SIZE {
            return Err(AttestationError::MalformedLog("Invalid signature list size or signature size".to_string()));
        }

        let body_size = signature_list_size as usize - prefix_size;
        if body_size as u64 > parser.remaining() || body_size % signature_size as usize != 0 {
            return Err(AttestationError::MalformedLog(format!(
                "Signature list body of {} bytes does not fit {} remaining bytes in {}-byte signatures",
                body_size, parser.remaining(), signature_size
            )));
        }

        let signature_count = body_size / signature_size as usize;
        let mut signatures: Vec<EfiSignatureData> = Vec::with_capacity(signature_count);
        for _ in 0..signature_count {
            let signature_owner: String = parser.read_guid()?;
            let signature_data: Vec<u8> = parser.read_bytes(signature_size as usize - UEFI_GUID_SIZE)?;
            signatures.push(EfiSignatureData { signature_owner, signature_data });
        }

        Ok(EfiSignatureList { signature_type, signatures })
    }
}

impl ByteParseable for EfiSignatureData {
    /// A single EFI_SIGNATURE_DATA spanning the rest of the payload
    fn parse_from(parser: &mut ByteReader) -> Result<Self, AttestationError> {
        let signature_owner: String = parser.read_guid()?;
        let signature_data: Vec<u8> = parser.read_remaining()?;
        Ok(EfiSignatureData { signature_owner, signature_data })
    }
}

impl ByteParseable for EfiLoadOption {
    /// Parses EFI load option: attributes, file path list length, description, device path
    fn parse_from(parser: &mut ByteReader) -> Result<Self, AttestationError> {
        let attributes: u32 = parser.read_u32()?;
        let file_path_list_length: u16 = parser.read_u16()?;
        let description: String = parser.read_ucs2_string()?;
        let device_path: Vec<u8> = parser.read_bytes((file_path_list_length as u64).min(parser.remaining()) as usize)?;
        Ok(EfiLoadOption {
            attributes,
            description,
            device_path,
        })
    }
}

/// Parses UEFI variable data event
///
/// # Description
/// This function parses different types of UEFI variable data based on event type and variable name.
/// Supported variable types include:
/// - Secure boot status (SecureBoot)
/// - Signature databases (db, dbx, KEK, PK)
/// - Authorities that verified loaded images
/// - Boot order and boot entries
/// Other variables are kept as raw data.
///
/// # Errors
/// * `AttestationError::MalformedLog` - If input data is truncated or cannot be parsed
pub fn parse_uefi_variable_data_event(
    event_type: &EventType,
    parser: &mut ByteReader
) -> Result<UefiVariableDataEvent, AttestationError> {
    let guid: String = parser.read_guid()?;

    // unicode name length, in char16
    let unicode_name_length: u64 = parser.read_u64()?;
    // variable data length, in bytes
    let variable_data_length: u64 = parser.read_u64()?;

    if unicode_name_length.saturating_mul(2) > parser.remaining() {
        return Err(AttestationError::MalformedLog(format!(
            "Variable name length {} exceeds remaining data {}", unicode_name_length, parser.remaining()
        )));
    }
    let name_bytes = parser.read_bytes(unicode_name_length as usize * 2)?;
    let unicode_name: String = ByteReader::new(&name_bytes).read_ucs2_string()?;

    if variable_data_length != parser.remaining() {
        return Err(AttestationError::MalformedLog(format!(
            "Variable {} declares {} data bytes, {} present", unicode_name, variable_data_length, parser.remaining()
        )));
    }

    let variable_data = match event_type {
        EventType::EvEfiVariableDriverConfig => {
            match unicode_name.as_str() {
                VAR_DB | VAR_DBX | VAR_KEK | VAR_PK => {
                    let mut signature_list = Vec::new();
                    while !parser.is_end() {
                        signature_list.push(EfiSignatureList::parse_from(parser)?);
                    }
                    EfiVariableData::SignatureList(signature_list)
                },
                VAR_SECURE_BOOT if variable_data_length == 1 => {
                    EfiVariableData::SecureBoot(parser.read_u8()? == 1)
                },
                _ => EfiVariableData::Unknown(parser.read_remaining()?),
            }
        },
        EventType::EvEfiVariableAuthority => {
            match unicode_name.as_str() {
                VAR_DB | VAR_SHIM | VAR_MOK_LIST => {
                    EfiVariableData::AuthoritySignature(EfiSignatureData::parse_from(parser)?)
                },
                VAR_MOK_LIST_TRUSTED if variable_data_length == 1 => {
                    EfiVariableData::SecureBoot(parser.read_u8()? == 1)
                },
                _ => EfiVariableData::Unknown(parser.read_remaining()?),
            }
        },
        EventType::EvEfiVariableBoot | EventType::EvEfiVariableBoot2 => {
            match unicode_name.as_str() {
                VAR_BOOT_ORDER => {
                    // Each boot order entry is 2 bytes (u16), data length was checked above
                    let boot_order_count = (variable_data_length / 2) as usize;
                    let mut boot_order = Vec::with_capacity(boot_order_count);
                    for _ in 0..boot_order_count {
                        let boot_order_item: u16 = parser.read_u16()?;
                        boot_order.push(format!("{}{:04X}", VAR_BOOT_PREFIX, boot_order_item));
                    }
                    EfiVariableData::BootOrder(boot_order)
                },
                name if name.len() == VAR_BOOT_ENTRY_LENGTH && name.starts_with(VAR_BOOT_PREFIX) => {
                    EfiVariableData::Boot(EfiLoadOption::parse_from(parser)?)
                },
                _ => EfiVariableData::Unknown(parser.read_remaining()?),
            }
        },
        _ => EfiVariableData::Unknown(parser.read_remaining()?),
    };

    Ok(UefiVariableDataEvent {
        variable_name: guid,
        unicode_name,
        variable_data,
    })
}

/// VariableData bytes of a UEFI_VARIABLE_DATA payload, without decoding them
///
/// # Errors
/// * `AttestationError::MalformedLog` - If the header is truncated or the declared lengths do not fit
pub fn uefi_variable_data_bytes(data: &[u8]) -> Result<Vec<u8>, AttestationError> {
    let mut parser = ByteReader::new(data);
    parser.read_bytes(UEFI_GUID_SIZE)?;
    let unicode_name_length: u64 = parser.read_u64()?;
    let variable_data_length: u64 = parser.read_u64()?;

    if unicode_name_length.saturating_mul(2) > parser.remaining() {
        return Err(AttestationError::MalformedLog(format!(
            "Variable name length {} exceeds remaining data {}", unicode_name_length, parser.remaining()
        )));
    }
    parser.read_bytes(unicode_name_length as usize * 2)?;
    if variable_data_length != parser.remaining() {
        return Err(AttestationError::MalformedLog(format!(
            "Variable declares {} data bytes, {} present", variable_data_length, parser.remaining()
        )));
    }
    parser.read_remaining()
}

impl ByteParseable for UefiPartitionHeader {
    fn parse_from(parser: &mut ByteReader) -> Result<Self, AttestationError> {
        let signature: String = parser.read_string(size_of::<u64>())?;
        let revision: u32 = parser.read_u32()?;
        let header_size: u32 = parser.read_u32()?;
        let _header_crc32: u32 = parser.read_u32()?;
        let _reserved: u32 = parser.read_u32()?;
        for _ in 0..GPT_HEADER_LBA_FIELDS {
            parser.read_u64()?;
        }
        let disk_guid: String = parser.read_guid()?;
        let _partition_entries_lba: u64 = parser.read_u64()?;
        let number_of_partition_entries: u32 = parser.read_u32()?;
        let size_of_partition_entry: u32 = parser.read_u32()?;
        let _partition_entry_array_crc32: u32 = parser.read_u32()?;
        Ok(Self {
            signature,
            revision,
            header_size,
            disk_guid,
            number_of_partition_entries,
            size_of_partition_entry,
        })
    }
}

impl ByteParseable for UefiPartitionEntry {
    fn parse_from(parser: &mut ByteReader) -> Result<Self, AttestationError> {
        let partition_type_guid: String = parser.read_guid()?;
        let unique_partition_guid: String = parser.read_guid()?;
        let starting_lba: u64 = parser.read_u64()?;
        let ending_lba: u64 = parser.read_u64()?;
        let attributes: u64 = parser.read_u64()?;
        let name_bytes: Vec<u8> = parser.read_bytes(UEFI_PARTITION_NAME_SIZE)?;
        let partition_name: String = ByteReader::new(&name_bytes).read_ucs2_string()?;
        Ok(Self {
            partition_type_guid,
            unique_partition_guid,
            starting_lba,
            ending_lba,
            attributes,
            partition_name,
        })
    }
}

impl ByteParseable for UefiGptDataEvent {
    /// Partition header, u64 partition count, then 128-byte partition entries
    fn parse_from(parser: &mut ByteReader) -> Result<Self, AttestationError> {
        let uefi_partition_header: UefiPartitionHeader = UefiPartitionHeader::parse_from(parser)?;
        let number_of_partitions: u64 = parser.read_u64()?;
        if number_of_partitions.saturating_mul(GPT_PARTITION_ENTRY_SIZE) > parser.remaining() {
            return Err(AttestationError::MalformedLog(format!(
                "GPT event declares {} partitions, only {} bytes remain", number_of_partitions, parser.remaining()
            )));
        }
        let mut partitions: Vec<UefiPartitionEntry> = Vec::with_capacity(number_of_partitions as usize);
        for _ in 0..number_of_partitions {
            partitions.push(UefiPartitionEntry::parse_from(parser)?);
        }
        Ok(Self {
            uefi_partition_header,
            partitions,
        })
    }
}

impl ByteParseable for UefiImageLoadEvent {
    /// Contains image location, size, and device path information
    fn parse_from(parser: &mut ByteReader) -> Result<Self, AttestationError> {
        let image_location_in_memory: u64 = parser.read_u64()?;
        let image_length_in_memory: u64 = parser.read_u64()?;
        let image_link_time_address: u64 = parser.read_u64()?;
        let length_of_device_path: u64 = parser.read_u64()?;
        if length_of_device_path > parser.remaining() {
            return Err(AttestationError::MalformedLog(format!(
                "Device path length {} exceeds remaining data {}", length_of_device_path, parser.remaining()
            )));
        }
        let device_path: Vec<u8> = parser.read_bytes(length_of_device_path as usize)?;
        Ok(Self {
            image_location_in_memory,
            image_length_in_memory,
            image_link_time_address,
            device_path,
        })
    }
}

/// Generic event parsing function
///
/// Parses an event of type T and wraps it, prefixing any error with the event name.
pub fn parse_typed_event<T, R, F>(
    parser: &mut ByteReader,
    wrapper: F,
    event_name: &str
) -> Result<R, AttestationError>
where
    T: ByteParseable,
    F: FnOnce(T) -> R
{
    T::parse_from(parser)
        .map(wrapper)
        .map_err(|e| e.with_context(&format!("failed to parse {}", event_name)))
}
