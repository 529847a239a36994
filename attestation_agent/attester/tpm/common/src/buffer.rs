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

use byteorder::{BigEndian, ByteOrder};
use crate::error::HashError;

/// Upper bound for a u32 length prefix; no TPM buffer comes close to 1 MiB
pub const MAX_BYTES_BUFFER_SIZE: usize = 1024 * 1024;
/// Largest chunk handed to TPM2_SequenceUpdate, below the command size limit of real TPMs
pub const MAX_DIGEST_BUFFER_SIZE: usize = 1024;

/// Byte buffer carried on the wire with a big-endian u32 length prefix
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct U32Bytes(Vec<u8>);

impl U32Bytes {
    pub fn new(data: Vec<u8>) -> Result<Self, HashError> {
        if data.len() > MAX_BYTES_BUFFER_SIZE {
            return Err(HashError::BufferTooLarge(format!(
                "{} bytes exceeds the {} byte limit", data.len(), MAX_BYTES_BUFFER_SIZE
            )));
        }
        Ok(U32Bytes(data))
    }

    /// Decode a prefixed buffer, returning it and the unread tail
    ///
    /// The declared length is checked against the limit and the input before anything is copied.
    pub fn unmarshal(input: &[u8]) -> Result<(Self, &[u8]), HashError> {
        if input.len() < 4 {
            return Err(HashError::Internal(format!("U32Bytes needs a 4 byte size, got {} bytes", input.len())));
        }
        let size = BigEndian::read_u32(&input[..4]) as usize;
        if size > MAX_BYTES_BUFFER_SIZE {
            return Err(HashError::BufferTooLarge(format!(
                "size prefix {} exceeds the {} byte limit", size, MAX_BYTES_BUFFER_SIZE
            )));
        }
        let rest = &input[4..];
        if size > rest.len() {
            return Err(HashError::Internal(format!(
                "size prefix {} larger than remaining data ({} bytes)", size, rest.len()
            )));
        }
        Ok((U32Bytes(rest[..size].to_vec()), &rest[size..]))
    }

    pub fn marshal(&self) -> Vec<u8> {
        let mut out = vec![0u8; 4];
        BigEndian::write_u32(&mut out, self.0.len() as u32);
        out.extend_from_slice(&self.0);
        out
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.0
    }
}

/// Pull buffer over caller data, handing out at most `chunk_size` bytes per call
#[derive(Debug)]
pub struct ChunkReader<'a> {
    data: &'a [u8],
    chunk_size: usize,
}

impl<'a> ChunkReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        ChunkReader { data, chunk_size: MAX_DIGEST_BUFFER_SIZE }
    }

    pub fn with_chunk_size(data: &'a [u8], chunk_size: usize) -> Result<Self, HashError> {
        if chunk_size == 0 {
            return Err(HashError::Internal("chunk size must be positive".to_string()));
        }
        Ok(ChunkReader { data, chunk_size })
    }

    pub fn remaining(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Next chunk, empty once the data is exhausted
    pub fn next_chunk(&mut self) -> &'a [u8] {
        let take = self.chunk_size.min(self.data.len());
        let (chunk, rest) = self.data.split_at(take);
        self.data = rest;
        chunk
    }

    /// Feed every chunk to `sink`; `sink` runs at least once, with an empty chunk for empty data
    pub fn drain<F>(&mut self, mut sink: F) -> Result<usize, HashError>
    where
        F: FnMut(&'a [u8]) -> Result<(), HashError>,
    {
        let mut chunks = 0;
        loop {
            sink(self.next_chunk())?;
            chunks += 1;
            if self.is_empty() {
                return Ok(chunks);
            }
        }
    }
}
