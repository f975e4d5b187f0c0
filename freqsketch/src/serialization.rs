// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

//! Serialization constants and helpers for the frequent longs sketch.
//!
//! The binary image starts with a one-long preamble for an empty sketch, or a
//! four-long preamble followed by the active counter values and then the
//! active keys (both as little-endian i64) for a populated one.

/// Family ID of the frequency sketch.
pub const FAMILY_ID: u8 = 10;
/// Serialization version.
pub const SER_VER: u8 = 1;

/// Preamble longs for an empty sketch.
pub const PREAMBLE_LONGS_EMPTY: u8 = 1;
/// Preamble longs for a non-empty sketch.
pub const PREAMBLE_LONGS_NONEMPTY: u8 = 4;

/// Empty flag mask within the flags byte.
pub const EMPTY_FLAG_MASK: u8 = 4;

/// Offset of the preamble longs byte.
pub const PREAMBLE_LONGS_BYTE: usize = 0;
/// Offset of the serialization version byte.
pub const SER_VER_BYTE: usize = 1;
/// Offset of the family ID byte.
pub const FAMILY_BYTE: usize = 2;
/// Offset of the lg max map size byte.
pub const LG_MAX_MAP_SIZE_BYTE: usize = 3;
/// Offset of the lg current map size byte.
pub const LG_CUR_MAP_SIZE_BYTE: usize = 4;
/// Offset of the flags byte.
pub const FLAGS_BYTE: usize = 5;

/// Offset of the active items count (low 32 bits of the second pre-long).
pub const ACTIVE_ITEMS_INT: usize = 8;
/// Offset of the stream length (third pre-long).
pub const STREAM_LENGTH_LONG: usize = 16;
/// Offset of the error offset (fourth pre-long).
pub const OFFSET_LONG: usize = 24;

/// Number of tokens before the counter pairs in the string form.
pub const STR_PREAMBLE_TOKENS: usize = 6;

/// Reads a u32 value from bytes at the given offset (little-endian).
#[inline]
pub fn read_u32_le(bytes: &[u8], offset: usize) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&bytes[offset..offset + 4]);
    u32::from_le_bytes(buf)
}

/// Reads an i64 value from bytes at the given offset (little-endian).
#[inline]
pub fn read_i64_le(bytes: &[u8], offset: usize) -> i64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[offset..offset + 8]);
    i64::from_le_bytes(buf)
}

/// Writes a u32 value to bytes at the given offset (little-endian).
#[inline]
pub fn write_u32_le(bytes: &mut [u8], offset: usize, value: u32) {
    bytes[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

/// Writes an i64 value to bytes at the given offset (little-endian).
#[inline]
pub fn write_i64_le(bytes: &mut [u8], offset: usize, value: i64) {
    bytes[offset..offset + 8].copy_from_slice(&value.to_le_bytes());
}
