// Copyright 2020 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Type-Length-Value codec for WSC attribute streams.
//!
//! WSC messages are flat streams of 16-bit-type/16-bit-length records; the
//! WFA Vendor Extension nests a second stream of 8-bit-type/8-bit-length
//! subelements inside one record. All integer fields are big-endian on the
//! wire regardless of host endianness.
//!
//! A record whose declared length would run past the remaining buffer is
//! treated as not present: that guards every reader against malformed or
//! truncated attribute streams.

use crate::Error;

/// Header bytes of a 16-bit-type record: 2 type + 2 length.
pub const TLV16_HDR_LEN: usize = 4;

/// Value of a record, tagged by how the bytes are interpreted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TlvValue<'a> {
    U8(u8),
    U16(u16),
    U32(u32),
    Bytes(&'a [u8]),
}

impl<'a> TlvValue<'a> {
    fn wire_len(&self) -> usize {
        match self {
            TlvValue::U8(_) => 1,
            TlvValue::U16(_) => 2,
            TlvValue::U32(_) => 4,
            TlvValue::Bytes(b) => b.len(),
        }
    }
}

/// Finds the first 16-bit-type record of type `id` and returns its value
/// bytes. Linear scan; `None` on absence or on a declared length that
/// overruns `buf`.
pub fn find_tlv16(buf: &[u8], id: u16) -> Option<&[u8]> {
    let mut rest = buf;
    while !rest.is_empty() {
        let hdr = rest.get(..TLV16_HDR_LEN)?;
        let rec_type = u16::from_be_bytes([hdr[0], hdr[1]]);
        let rec_len = u16::from_be_bytes([hdr[2], hdr[3]]) as usize;
        let value = rest.get(TLV16_HDR_LEN..TLV16_HDR_LEN + rec_len)?;
        if rec_type == id {
            return Some(value);
        }
        rest = &rest[TLV16_HDR_LEN + rec_len..];
    }
    None
}

/// 8-bit-type/8-bit-length variant of [`find_tlv16`], used for subelements
/// nested inside a vendor extension value.
pub fn find_tlv8(buf: &[u8], id: u8) -> Option<&[u8]> {
    let mut rest = buf;
    while !rest.is_empty() {
        let hdr = rest.get(..2)?;
        let rec_len = hdr[1] as usize;
        let value = rest.get(2..2 + rec_len)?;
        if hdr[0] == id {
            return Some(value);
        }
        rest = &rest[2 + rec_len..];
    }
    None
}

/// Reads the value of record `id` as a big-endian u8.
pub fn read_u8(buf: &[u8], id: u16) -> Result<u8, Error> {
    let v = find_tlv16(buf, id).ok_or(Error::MissingTlv(id))?;
    if v.len() != 1 {
        return Err(Error::MissingTlv(id));
    }
    Ok(v[0])
}

/// Reads the value of record `id` as a big-endian u16.
pub fn read_u16(buf: &[u8], id: u16) -> Result<u16, Error> {
    let v = find_tlv16(buf, id).ok_or(Error::MissingTlv(id))?;
    if v.len() != 2 {
        return Err(Error::MissingTlv(id));
    }
    Ok(u16::from_be_bytes([v[0], v[1]]))
}

/// Reads the value of record `id` as a big-endian u32.
pub fn read_u32(buf: &[u8], id: u16) -> Result<u32, Error> {
    let v = find_tlv16(buf, id).ok_or(Error::MissingTlv(id))?;
    if v.len() != 4 {
        return Err(Error::MissingTlv(id));
    }
    Ok(u32::from_be_bytes([v[0], v[1], v[2], v[3]]))
}

/// Reads the value of record `id` into a caller-sized array; the record must
/// carry exactly `N` bytes.
pub fn read_bytes<const N: usize>(buf: &[u8], id: u16) -> Result<[u8; N], Error> {
    let v = find_tlv16(buf, id).ok_or(Error::MissingTlv(id))?;
    if v.len() != N {
        return Err(Error::MissingTlv(id));
    }
    let mut out = [0u8; N];
    out.copy_from_slice(v);
    Ok(out)
}

/// Appends a complete record: big-endian header, then the value in its wire
/// representation.
pub fn write_value(buf: &mut Vec<u8>, id: u16, value: TlvValue<'_>) {
    write_header(buf, id, value.wire_len() as u16);
    match value {
        TlvValue::U8(v) => buf.push(v),
        TlvValue::U16(v) => buf.extend_from_slice(&v.to_be_bytes()),
        TlvValue::U32(v) => buf.extend_from_slice(&v.to_be_bytes()),
        TlvValue::Bytes(b) => buf.extend_from_slice(b),
    }
}

/// Appends a record header only; used when the value is produced by a
/// subsequent nested encode step.
pub fn write_header(buf: &mut Vec<u8>, id: u16, len: u16) {
    buf.extend_from_slice(&id.to_be_bytes());
    buf.extend_from_slice(&len.to_be_bytes());
}
