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

//! Byte Reader Module
//!
//! This module provides tools for parsing binary event log data from byte streams.
//! The PC client log is little-endian, the canonical event log TLV framing is big-endian,
//! so both orders are offered. Every read failure is reported as `MalformedLog`.
//!
//! The module contains two main components:
//! - `ByteReader`: A byte stream reader providing methods for reading various data types
//! - `ByteParseable`: A parseable trait; types implementing this trait can be parsed directly from byte streams

use byteorder::{BigEndian, LittleEndian, ReadBytesExt};
use std::io::{Cursor, Read};
use tpm_common_verifier::AttestationError;
use uuid::Uuid;

/// UEFI GUID size
pub const UEFI_GUID_SIZE: usize = 16;

/// Binary data parsing helper structure
///
/// Internally uses Cursor for data reading and position tracking.
pub struct ByteReader<'a> {
    cursor: Cursor<&'a [u8]>,
}

/// Trait for types that can be parsed from a byte stream
///
/// # Example
///
/// ```rust ignore
/// use tpm_boot_verifier::byte_reader::{ByteReader, ByteParseable};
/// use tpm_common_verifier::AttestationError;
///
/// struct MyStruct {
///     field1: u32,
///     field2: String,
/// }
///
/// impl ByteParseable for MyStruct {
///     fn parse_from(parser: &mut ByteReader) -> Result<Self, AttestationError> {
///         let field1 = parser.read_u32()?;
///         let field2 = parser.read_string(16)?;
///         Ok(Self { field1, field2 })
///     }
/// }
/// ```
pub trait ByteParseable: Sized {
    /// Parse an instance of the current type from a byte reader
    ///
    /// # Errors
    ///
    /// Returns `MalformedLog` when the byte stream contains insufficient data or is incorrectly formatted
    fn parse_from(parser: &mut ByteReader<'_>) -> Result<Self, AttestationError>;
}

fn malformed(what: &str, e: std::io::Error) -> AttestationError {
    AttestationError::MalformedLog(format!("Failed to read {}: {}", what, e))
}

impl<'a> ByteReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            cursor: Cursor::new(data),
        }
    }

    /// Current reading position (byte offset)
    pub fn position(&self) -> u64 {
        self.cursor.position()
    }

    /// Get the number of unread bytes remaining
    pub fn remaining(&self) -> u64 {
        let total: u64 = self.cursor.get_ref().len() as u64;
        total.saturating_sub(self.cursor.position())
    }

    pub fn read_u8(&mut self) -> Result<u8, AttestationError> {
        self.cursor.read_u8().map_err(|e| malformed("u8", e))
    }

    /// Read a u16 value (little-endian)
    pub fn read_u16(&mut self) -> Result<u16, AttestationError> {
        self.cursor.read_u16::<LittleEndian>().map_err(|e| malformed("u16", e))
    }

    /// Read a u32 value (little-endian)
    pub fn read_u32(&mut self) -> Result<u32, AttestationError> {
        self.cursor.read_u32::<LittleEndian>().map_err(|e| malformed("u32", e))
    }

    /// Read a u64 value (little-endian)
    pub fn read_u64(&mut self) -> Result<u64, AttestationError> {
        self.cursor.read_u64::<LittleEndian>().map_err(|e| malformed("u64", e))
    }

    /// Read a u32 value (big-endian)
    pub fn read_u32_be(&mut self) -> Result<u32, AttestationError> {
        self.cursor.read_u32::<BigEndian>().map_err(|e| malformed("u32", e))
    }

    /// Read a u64 value (big-endian)
    pub fn read_u64_be(&mut self) -> Result<u64, AttestationError> {
        self.cursor.read_u64::<BigEndian>().map_err(|e| malformed("u64", e))
    }

    /// Read bytes of specified length
    ///
    /// # Errors
    /// * Returns an error when the requested number of bytes exceeds the remaining bytes.
    ///   The check happens before the buffer is allocated.
    pub fn read_bytes(&mut self, length: usize) -> Result<Vec<u8>, AttestationError> {
        if length as u64 > self.remaining() {
            return Err(AttestationError::MalformedLog(
                format!("Read exceeds data range: requested {} bytes but only {} bytes remain",
                        length, self.remaining())
            ));
        }

        let mut buffer: Vec<u8> = vec![0u8; length];
        self.cursor.read_exact(&mut buffer).map_err(|e| malformed("bytes", e))?;
        Ok(buffer)
    }

    /// Read all remaining bytes
    pub fn read_remaining(&mut self) -> Result<Vec<u8>, AttestationError> {
        self.read_bytes(self.remaining() as usize)
    }

    /// Read UTF-8 string
    pub fn read_string(&mut self, length: usize) -> Result<String, AttestationError> {
        let bytes: Vec<u8> = self.read_bytes(length)?;
        String::from_utf8(bytes)
            .map_err(|e| AttestationError::MalformedLog(format!("Failed to convert to UTF-8 string: {}", e)))
    }

    /// Read GUID (16 bytes, mixed-endian as stored by UEFI)
    pub fn read_guid(&mut self) -> Result<String, AttestationError> {
        let mut guid_bytes: [u8; UEFI_GUID_SIZE] = [0; UEFI_GUID_SIZE];
        self.cursor.read_exact(&mut guid_bytes).map_err(|e| malformed("guid", e))?;

        let guid: Uuid = Uuid::from_bytes_le(guid_bytes);
        Ok(guid.to_string())
    }

    /// Read UCS-2 (UTF-16LE) string up to the end of data or a null character
    pub fn read_ucs2_string(&mut self) -> Result<String, AttestationError> {
        let mut unicode_str = String::new();

        while self.remaining() >= 2 {
            let code_unit = self.read_u16()?;
            if code_unit == 0 {
                break;
            }
            match std::char::from_u32(code_unit as u32) {
                Some(c) => unicode_str.push(c),
                None => unicode_str.push('\u{FFFD}'),
            }
        }

        Ok(unicode_str)
    }

    /// Check if the end of data has been reached
    pub fn is_end(&self) -> bool {
        self.cursor.position() >= self.cursor.get_ref().len() as u64
    }
}
