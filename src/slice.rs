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
use crate::itf8::read_u8;
use crate::itf8::write_itf8;

use std::collections::HashMap;
use std::io::Read;
use std::io::Write;

use flate2::write::GzDecoder;

/// Block compression methods.
pub const METHOD_RAW: u8 = 0;
pub const METHOD_GZIP: u8 = 1;

/// Block content types.
pub const CONTENT_FILE_HEADER: u8 = 0;
pub const CONTENT_COMPRESSION_HEADER: u8 = 1;
pub const CONTENT_SLICE_HEADER: u8 = 2;
pub const CONTENT_EXTERNAL: u8 = 4;
pub const CONTENT_CORE: u8 = 5;

/// Inflates a gzip-compressed byte buffer.
fn inflate_bytes(
    deflated: &[u8],
) -> Result<Vec<u8>, DecodeError> {
    let gzip_failed =
        |e: std::io::Error| DecodeError::MalformedStream(format!("gzip block failed to inflate: {}", e));

    let mut inflated: Vec<u8> = Vec::new();
    let mut decoder = GzDecoder::new(&mut inflated);
    decoder.write_all(deflated).map_err(gzip_failed)?;
    decoder.finish().map_err(gzip_failed)?;
    Ok(inflated)
}

/// One block of a container: a method, a content type, a content id for
/// external blocks, and the (already inflated) payload bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub method: u8,
    pub content_type: u8,
    pub content_id: i32,
    pub data: Vec<u8>,
}

impl Block {
    /// Reads and inflates one block.
    ///
    /// Wire: method byte, content type byte, content id ITF8, compressed
    /// size ITF8, raw size ITF8, then the compressed bytes. A raw size
    /// that disagrees with the inflated payload is a malformed block.
    ///
    pub fn read_from<R: Read>(
        conn: &mut R,
    ) -> Result<Block, DecodeError> {
        let method = read_u8(conn)?;
        let content_type = read_u8(conn)?;
        let content_id = read_itf8(conn)?;
        let compressed_size = read_itf8(conn)?;
        let raw_size = read_itf8(conn)?;
        if compressed_size < 0 || raw_size < 0 {
            return Err(DecodeError::MalformedStream(
                "negative block size".to_string(),
            ));
        }

        let mut bytes: Vec<u8> = vec![0; compressed_size as usize];
        conn.read_exact(&mut bytes)
            .map_err(|_| DecodeError::TruncatedStream("block data cut short".to_string()))?;

        let data = match method {
            METHOD_RAW => bytes,
            METHOD_GZIP => inflate_bytes(&bytes)?,
            _ => return Err(DecodeError::UnsupportedEncoding(method as i32)),
        };
        if data.len() != raw_size as usize {
            return Err(DecodeError::MalformedStream(format!(
                "invalid block length: declared {}, inflated {}",
                raw_size,
                data.len()
            )));
        }

        Ok(Block {
            method,
            content_type,
            content_id,
            data,
        })
    }

    /// Encodes this block uncompressed; serves the test suite.
    pub fn encode_raw(
        &self,
        out: &mut Vec<u8>,
    ) {
        out.push(METHOD_RAW);
        out.push(self.content_type);
        write_itf8(self.content_id, out);
        write_itf8(self.data.len() as i32, out);
        write_itf8(self.data.len() as i32, out);
        out.extend_from_slice(&self.data);
    }
}

/// Slice header block contents.
///
/// `content_ids` lists the external blocks of the slice in wire order;
/// `ref_md5` holds the MD5 of the reference window the slice aligns to,
/// all zero when the writer did not record one.
///
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SliceHeader {
    pub sequence_id: i32,
    pub alignment_start: i32,
    pub alignment_span: i32,
    pub n_records: i32,
    pub record_counter: i64,
    pub n_blocks: i32,
    pub content_ids: Vec<i32>,
    pub embedded_ref_block_id: i32,
    pub ref_md5: [u8; 16],
}

impl SliceHeader {
    /// Checks the stored reference MD5 against the reference window this
    /// slice spans. An all-zero digest means the writer recorded none.
    pub fn validate_ref_md5(
        &self,
        ref_bases: &[u8],
    ) -> bool {
        if self.ref_md5 == [0_u8; 16] {
            return true;
        }

        let from = (self.alignment_start.max(1) - 1) as usize;
        let to = (from + self.alignment_span.max(0) as usize).min(ref_bases.len());
        let window = if from < ref_bases.len() {
            &ref_bases[from..to]
        } else {
            &[]
        };

        md5::compute(window).0 == self.ref_md5
    }
}

/// One slice: its header plus the core bit block and the external byte
/// blocks keyed by content id.
#[derive(Debug, Clone)]
pub struct Slice {
    pub header: SliceHeader,
    pub core: Vec<u8>,
    pub external: HashMap<i32, Vec<u8>>,
}

impl Slice {
    pub fn read_from<R: Read>(
        conn: &mut R,
    ) -> Result<Slice, DecodeError> {
        let header_block = Block::read_from(conn)?;
        if header_block.content_type != CONTENT_SLICE_HEADER {
            return Err(DecodeError::MalformedStream(format!(
                "expected a slice header block, found content type {}",
                header_block.content_type
            )));
        }
        let header = read_slice_header(&header_block.data)?;

        let mut core: Option<Vec<u8>> = None;
        let mut external: HashMap<i32, Vec<u8>> = HashMap::new();
        for i in 0..header.n_blocks {
            let block = Block::read_from(conn)?;
            match block.content_type {
                CONTENT_CORE if i == 0 => core = Some(block.data),
                CONTENT_EXTERNAL if i > 0 => {
                    external.insert(block.content_id, block.data);
                }
                _ => {
                    return Err(DecodeError::MalformedStream(format!(
                        "unexpected content type {} in slice block {}",
                        block.content_type, i
                    )))
                }
            }
        }
        let core = core.ok_or_else(|| {
            DecodeError::MalformedStream("slice has no core block".to_string())
        })?;

        Ok(Slice {
            header,
            core,
            external,
        })
    }
}

fn read_slice_header(
    data: &[u8],
) -> Result<SliceHeader, DecodeError> {
    let mut conn = std::io::Cursor::new(data);

    let sequence_id = read_itf8(&mut conn)?;
    let alignment_start = read_itf8(&mut conn)?;
    let alignment_span = read_itf8(&mut conn)?;
    let n_records = read_itf8(&mut conn)?;
    let record_counter = crate::itf8::read_ltf8(&mut conn)?;
    let n_blocks = read_itf8(&mut conn)?;
    if n_blocks < 1 {
        return Err(DecodeError::MalformedStream(
            "slice declares no blocks".to_string(),
        ));
    }

    let nof_ids = read_itf8(&mut conn)?;
    if nof_ids < 0 {
        return Err(DecodeError::MalformedStream(
            "negative content id count".to_string(),
        ));
    }
    let mut content_ids: Vec<i32> = Vec::with_capacity(nof_ids as usize);
    for _ in 0..nof_ids {
        content_ids.push(read_itf8(&mut conn)?);
    }
    let embedded_ref_block_id = read_itf8(&mut conn)?;

    let mut ref_md5 = [0_u8; 16];
    conn.read_exact(&mut ref_md5)
        .map_err(|_| DecodeError::TruncatedStream("slice header cut short".to_string()))?;

    Ok(SliceHeader {
        sequence_id,
        alignment_start,
        alignment_span,
        n_records,
        record_counter,
        n_blocks,
        content_ids,
        embedded_ref_block_id,
        ref_md5,
    })
}

/// Encodes a slice header block payload; serves the test suite.
#[cfg(test)]
pub fn encode_slice_header(
    header: &SliceHeader,
) -> Vec<u8> {
    use crate::itf8::write_ltf8;

    let mut bytes: Vec<u8> = Vec::new();
    write_itf8(header.sequence_id, &mut bytes);
    write_itf8(header.alignment_start, &mut bytes);
    write_itf8(header.alignment_span, &mut bytes);
    write_itf8(header.n_records, &mut bytes);
    write_ltf8(header.record_counter, &mut bytes);
    write_itf8(header.n_blocks, &mut bytes);
    write_itf8(header.content_ids.len() as i32, &mut bytes);
    for content_id in &header.content_ids {
        write_itf8(*content_id, &mut bytes);
    }
    write_itf8(header.embedded_ref_block_id, &mut bytes);
    bytes.extend_from_slice(&header.ref_md5);
    bytes
}

// Tests
#[cfg(test)]
mod tests {

    #[test]
    fn raw_block_round_trip() {
        use super::Block;
        use super::CONTENT_EXTERNAL;
        use std::io::Cursor;

        let expected = Block {
            method: 0,
            content_type: CONTENT_EXTERNAL,
            content_id: 4,
            data: b"ACGTACGT".to_vec(),
        };

        let mut bytes: Vec<u8> = Vec::new();
        expected.encode_raw(&mut bytes);

        let mut conn = Cursor::new(bytes);
        let got = Block::read_from(&mut conn).unwrap();

        assert_eq!(got, expected);
    }

    #[test]
    fn gzip_block_inflates() {
        use crate::itf8::write_itf8;
        use super::Block;
        use super::CONTENT_EXTERNAL;
        use super::METHOD_GZIP;
        use flate2::Compression;
        use flate2::write::GzEncoder;
        use std::io::Cursor;
        use std::io::Write;

        let raw = b"AAAAAAAAAAAAAAAAAAAACCCCCCCCCC".to_vec();
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&raw).unwrap();
        let deflated = encoder.finish().unwrap();

        let mut bytes: Vec<u8> = vec![METHOD_GZIP, CONTENT_EXTERNAL];
        write_itf8(4, &mut bytes);
        write_itf8(deflated.len() as i32, &mut bytes);
        write_itf8(raw.len() as i32, &mut bytes);
        bytes.extend_from_slice(&deflated);

        let mut conn = Cursor::new(bytes);
        let got = Block::read_from(&mut conn).unwrap();

        assert_eq!(got.data, raw);
    }

    #[test]
    fn wrong_raw_size_is_malformed() {
        use crate::DecodeError;
        use crate::itf8::write_itf8;
        use super::Block;
        use super::CONTENT_EXTERNAL;
        use super::METHOD_RAW;
        use std::io::Cursor;

        let mut bytes: Vec<u8> = vec![METHOD_RAW, CONTENT_EXTERNAL];
        write_itf8(4, &mut bytes);
        write_itf8(3, &mut bytes);
        write_itf8(5, &mut bytes); // declared raw size disagrees
        bytes.extend_from_slice(b"abc");

        let mut conn = Cursor::new(bytes);
        let got = Block::read_from(&mut conn);

        assert!(matches!(got, Err(DecodeError::MalformedStream(_))));
    }

    #[test]
    fn unknown_method_is_unsupported() {
        use crate::DecodeError;
        use crate::itf8::write_itf8;
        use super::Block;
        use std::io::Cursor;

        let mut bytes: Vec<u8> = vec![9, 4];
        write_itf8(0, &mut bytes);
        write_itf8(0, &mut bytes);
        write_itf8(0, &mut bytes);

        let mut conn = Cursor::new(bytes);
        let got = Block::read_from(&mut conn);

        assert!(matches!(got, Err(DecodeError::UnsupportedEncoding(9))));
    }

    #[test]
    fn slice_round_trip() {
        use super::Block;
        use super::CONTENT_CORE;
        use super::CONTENT_EXTERNAL;
        use super::CONTENT_SLICE_HEADER;
        use super::Slice;
        use super::SliceHeader;
        use super::encode_slice_header;
        use std::io::Cursor;

        let header = SliceHeader {
            sequence_id: 0,
            alignment_start: 1,
            alignment_span: 8,
            n_records: 2,
            record_counter: 0,
            n_blocks: 2,
            content_ids: vec![4],
            embedded_ref_block_id: -1,
            ref_md5: [0; 16],
        };

        let mut bytes: Vec<u8> = Vec::new();
        Block {
            method: 0,
            content_type: CONTENT_SLICE_HEADER,
            content_id: 0,
            data: encode_slice_header(&header),
        }
        .encode_raw(&mut bytes);
        Block {
            method: 0,
            content_type: CONTENT_CORE,
            content_id: 0,
            data: vec![0b1010_0000],
        }
        .encode_raw(&mut bytes);
        Block {
            method: 0,
            content_type: CONTENT_EXTERNAL,
            content_id: 4,
            data: b"readname".to_vec(),
        }
        .encode_raw(&mut bytes);

        let mut conn = Cursor::new(bytes);
        let got = Slice::read_from(&mut conn).unwrap();

        assert_eq!(got.header, header);
        assert_eq!(got.core, vec![0b1010_0000]);
        assert_eq!(got.external[&4], b"readname".to_vec());
    }

    #[test]
    fn ref_md5_validation() {
        use super::SliceHeader;

        let reference = b"ACGTACGTACGT".to_vec();
        let digest = md5::compute(&reference[0..8]).0;

        let mut header = SliceHeader {
            sequence_id: 0,
            alignment_start: 1,
            alignment_span: 8,
            n_records: 1,
            record_counter: 0,
            n_blocks: 1,
            content_ids: Vec::new(),
            embedded_ref_block_id: -1,
            ref_md5: digest,
        };

        assert!(header.validate_ref_md5(&reference));

        header.ref_md5[0] ^= 0xff;
        assert!(!header.validate_ref_md5(&reference));

        // An unset digest always validates.
        header.ref_md5 = [0; 16];
        assert!(header.validate_ref_md5(&reference));
    }
}
