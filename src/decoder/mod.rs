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
use crate::headers::compression::CompressionHeader;
use crate::headers::container::ContainerHeader;
use crate::headers::container::container_crc32;
use crate::headers::container::read_container_header;
use crate::headers::file::CramHeader;
use crate::headers::file::read_cram_header;
use crate::record::CramRecord;
use crate::slice::Block;
use crate::slice::CONTENT_COMPRESSION_HEADER;
use crate::slice::Slice;
use crate::slice::SliceHeader;

use std::io::Cursor;
use std::io::Read;

pub mod records;

/// All records of one container, ready for normalization.
#[derive(Debug, Clone)]
pub struct Batch {
    pub header: ContainerHeader,
    pub compression: CompressionHeader,
    pub slices: Vec<SliceHeader>,
    pub records: Vec<CramRecord>,
}

/// Walks the containers of a CRAM stream.
///
/// Construction consumes the file header and the embedded SAM header;
/// [read_container](Decoder::read_container) then yields one [Batch] per
/// container until end of stream. The container data is buffered by its
/// declared length before parsing, so a malformed container never
/// desynchronizes the outer stream and the caller may skip to the next
/// one.
///
pub struct Decoder<'a, R: Read> {
    conn: &'a mut R,
    header: CramHeader,
}

impl<'a, R: Read> Decoder<'a, R> {
    pub fn new(
        conn: &'a mut R,
    ) -> Result<Self, DecodeError> {
        let header = read_cram_header(conn)?;
        Ok(Decoder { conn, header })
    }
}

impl<R: Read> Decoder<'_, R> {
    pub fn cram_header(
        &self,
    ) -> &CramHeader {
        &self.header
    }

    /// Reads and parses the next container; `None` at end of stream.
    pub fn read_container(
        &mut self,
    ) -> Result<Option<Batch>, DecodeError> {
        let header = match read_container_header(self.conn)? {
            Some(header) => header,
            None => return Ok(None),
        };

        let mut data: Vec<u8> = vec![0; header.length as usize];
        self.conn
            .read_exact(&mut data)
            .map_err(|_| DecodeError::TruncatedStream("container data cut short".to_string()))?;
        if container_crc32(&data) != header.crc32 {
            return Err(DecodeError::MalformedStream(
                "container checksum mismatch".to_string(),
            ));
        }

        let mut cursor = Cursor::new(data.as_slice());
        let block = Block::read_from(&mut cursor)?;
        if block.content_type != CONTENT_COMPRESSION_HEADER {
            return Err(DecodeError::MalformedStream(format!(
                "expected a compression header block, found content type {}",
                block.content_type
            )));
        }
        let compression = CompressionHeader::from_block(&block.data)?;

        let mut slices: Vec<SliceHeader> = Vec::new();
        let mut records: Vec<CramRecord> = Vec::with_capacity(header.n_records.max(0) as usize);
        while (cursor.position() as usize) < data.len() {
            let slice = Slice::read_from(&mut cursor)?;
            records.append(&mut records::read_slice_records(&compression, &slice)?);
            slices.push(slice.header);
        }

        Ok(Some(Batch {
            header,
            compression,
            slices,
            records,
        }))
    }
}

impl<R: Read> Iterator for Decoder<'_, R> {
    type Item = Result<Batch, DecodeError>;

    fn next(
        &mut self,
    ) -> Option<Self::Item> {
        self.read_container().transpose()
    }
}
