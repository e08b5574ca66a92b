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
use crate::slice::Block;
use crate::slice::CONTENT_FILE_HEADER;

use std::io::Cursor;
use std::io::Read;

use noodles_sam as sam;

pub const MAGIC: [u8; 4] = *b"CRAM";

/// Supported major version; the minor version is accepted as recorded.
pub const MAJOR_VERSION: u8 = 2;

/// The fixed file header plus the embedded SAM header.
///
/// Always the first bytes of a CRAM stream: the 4-byte magic, one byte
/// each for the major and minor version, a 20-byte zero-padded file id,
/// then a block whose payload is the SAM header text prefixed with its
/// 4-byte little-endian length.
///
#[derive(Debug, Clone)]
pub struct CramHeader {
    pub major_version: u8,
    pub minor_version: u8,
    pub id: [u8; 20],
    pub sam_header: sam::Header,
}

pub fn read_cram_header<R: Read>(
    conn: &mut R,
) -> Result<CramHeader, DecodeError> {
    let mut fixed = [0_u8; 26];
    conn.read_exact(&mut fixed)
        .map_err(|_| DecodeError::TruncatedStream("stream shorter than the file header".to_string()))?;

    if fixed[0..4] != MAGIC {
        return Err(DecodeError::MalformedStream(
            "not a CRAM stream (bad magic)".to_string(),
        ));
    }
    let major_version = fixed[4];
    let minor_version = fixed[5];
    if major_version != MAJOR_VERSION {
        return Err(DecodeError::MalformedStream(format!(
            "unsupported CRAM version {}.{}",
            major_version, minor_version
        )));
    }
    let mut id = [0_u8; 20];
    id.copy_from_slice(&fixed[6..26]);

    let sam_header = read_sam_header_block(conn)?;

    Ok(CramHeader {
        major_version,
        minor_version,
        id,
        sam_header,
    })
}

fn read_sam_header_block<R: Read>(
    conn: &mut R,
) -> Result<sam::Header, DecodeError> {
    let block = Block::read_from(conn)?;
    if block.content_type != CONTENT_FILE_HEADER {
        return Err(DecodeError::MalformedStream(format!(
            "expected a SAM header block, found content type {}",
            block.content_type
        )));
    }
    if block.data.len() < 4 {
        return Err(DecodeError::MalformedStream(
            "SAM header block too short".to_string(),
        ));
    }

    let nof_bytes = i32::from_le_bytes(block.data[0..4].try_into().unwrap());
    if nof_bytes < 0 || 4 + nof_bytes as usize > block.data.len() {
        return Err(DecodeError::MalformedStream(
            "SAM header length exceeds its block".to_string(),
        ));
    }
    let text = &block.data[4..4 + nof_bytes as usize];

    let mut reader = sam::io::Reader::new(Cursor::new(text));
    let header = reader
        .read_header()
        .map_err(|e| DecodeError::MalformedStream(format!("invalid SAM header: {}", e)))?;
    Ok(header)
}

/// Encodes the fixed file header bytes; serves the test suite.
pub fn encode_cram_header(
    major_version: u8,
    minor_version: u8,
    id: &str,
) -> Vec<u8> {
    let mut bytes: Vec<u8> = Vec::with_capacity(26);
    bytes.extend_from_slice(&MAGIC);
    bytes.push(major_version);
    bytes.push(minor_version);

    let mut padded = [0_u8; 20];
    let taken = id.len().min(20);
    padded[0..taken].copy_from_slice(&id.as_bytes()[0..taken]);
    bytes.extend_from_slice(&padded);

    bytes
}
