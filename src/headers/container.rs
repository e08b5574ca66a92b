// decram: Decode CRAM alignment containers to SAM.
//
// Copyright 2025 Tommi Mäklin [tommi@maklin.fi].
//
// Copyrights in this project are retained by contributors. No copyright assignment
// is required to contribute to this project.
//
// Except as otherwise noted (below and/or in individual files), this
// project is licensed under the Apache License, Version 2.0
// <LICENSE-APACHE> or <http://www.apache.org/licenses/LICENSE-2.0> or
// the MIT license, <LICENSE-MIT> or <http://opensource.org/licenses/MIT>,
// at your option.
//
use crate::DecodeError;
use crate::itf8::read_itf8;
use crate::itf8::read_itf8_from_first_byte;
use crate::itf8::read_ltf8;
use crate::itf8::write_itf8;
use crate::itf8::write_ltf8;

use std::io::Read;

/// Reference sequence id of a multi-reference container.
pub const SEQUENCE_ID_MULTI_REF: i32 = -1;
/// Reference sequence id of an unmapped container.
pub const SEQUENCE_ID_UNMAPPED: i32 = -2;

/// Container header.
///
/// `length` is the byte size of the container data that follows the
/// header (the compression header block plus the slices); `crc32` covers
/// exactly those bytes. Landmarks are slice byte offsets into the data,
/// retained for random access through an external index.
///
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerHeader {
    pub length: i32,
    pub sequence_id: i32,
    pub alignment_start: i32,
    pub alignment_span: i32,
    pub n_records: i32,
    pub record_counter: i64,
    pub n_bases: i64,
    pub n_blocks: i32,
    pub landmarks: Vec<i32>,
    pub crc32: u32,
}

/// Reads a container header, or `None` on clean end of stream.
///
/// End of stream is only clean on the first byte; running out mid-header
/// fails [DecodeError::TruncatedStream].
///
pub fn read_container_header<R: Read>(
    conn: &mut R,
) -> Result<Option<ContainerHeader>, DecodeError> {
    let mut first = [0_u8; 1];
    let nof_read = conn
        .read(&mut first)
        .map_err(|e| DecodeError::TruncatedStream(format!("container header read failed: {}", e)))?;
    if nof_read == 0 {
        return Ok(None);
    }

    let length = read_itf8_from_first_byte(first[0], conn)?;
    if length < 0 {
        return Err(DecodeError::MalformedStream(
            "negative container length".to_string(),
        ));
    }
    let sequence_id = read_itf8(conn)?;
    let alignment_start = read_itf8(conn)?;
    let alignment_span = read_itf8(conn)?;
    let n_records = read_itf8(conn)?;
    let record_counter = read_ltf8(conn)?;
    let n_bases = read_ltf8(conn)?;
    let n_blocks = read_itf8(conn)?;

    let nof_landmarks = read_itf8(conn)?;
    if nof_landmarks < 0 {
        return Err(DecodeError::MalformedStream(
            "negative landmark count".to_string(),
        ));
    }
    let mut landmarks: Vec<i32> = Vec::with_capacity(nof_landmarks as usize);
    for _ in 0..nof_landmarks {
        landmarks.push(read_itf8(conn)?);
    }

    let mut crc_bytes = [0_u8; 4];
    conn.read_exact(&mut crc_bytes)
        .map_err(|_| DecodeError::TruncatedStream("container header cut short".to_string()))?;
    let crc32 = u32::from_le_bytes(crc_bytes);

    Ok(Some(ContainerHeader {
        length,
        sequence_id,
        alignment_start,
        alignment_span,
        n_records,
        record_counter,
        n_bases,
        n_blocks,
        landmarks,
        crc32,
    }))
}

/// Encodes a container header; serves the test suite.
pub fn encode_container_header(
    header: &ContainerHeader,
) -> Vec<u8> {
    let mut bytes: Vec<u8> = Vec::new();
    write_itf8(header.length, &mut bytes);
    write_itf8(header.sequence_id, &mut bytes);
    write_itf8(header.alignment_start, &mut bytes);
    write_itf8(header.alignment_span, &mut bytes);
    write_itf8(header.n_records, &mut bytes);
    write_ltf8(header.record_counter, &mut bytes);
    write_ltf8(header.n_bases, &mut bytes);
    write_itf8(header.n_blocks, &mut bytes);
    write_itf8(header.landmarks.len() as i32, &mut bytes);
    for landmark in &header.landmarks {
        write_itf8(*landmark, &mut bytes);
    }
    bytes.extend_from_slice(&header.crc32.to_le_bytes());
    bytes
}

/// CRC32 of the container data bytes, as stored in the header.
pub fn container_crc32(
    data: &[u8],
) -> u32 {
    let mut crc = flate2::Crc::new();
    crc.update(data);
    crc.sum()
}
