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

//! Data series codecs and their wire descriptors.
//!
//! The compression header names one encoding per data series; [Encoding]
//! holds the raw `(id, params)` pair and [Encoding::build] turns it into
//! a concrete [Codec]. Bit codecs read from the slice's core bit stream,
//! the external codecs from the per-series byte blocks.

pub mod beta;
pub mod golomb;
pub mod huffman;

use crate::DecodeError;
use crate::bitstream::BitReader;
use crate::bitstream::BitWriter;
use crate::itf8::read_itf8;

use beta::BetaCodec;
use golomb::GolombCodec;
use huffman::CanonicalHuffman;

use std::collections::HashMap;
use std::io::Cursor;
use std::io::Read;
use std::io::Write;

/// Encoding identifiers recognized in compression headers.
///
/// Wire integers: 0 Null, 1 External, 2 Golomb, 3 Huffman,
/// 4 ByteArrayLen, 5 ByteArrayStop, 6 Beta. Anything else is rejected
/// with [DecodeError::UnsupportedEncoding].
///
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodingId {
    Null,
    External,
    Golomb,
    Huffman,
    ByteArrayLen,
    ByteArrayStop,
    Beta,
}

impl EncodingId {
    pub fn from_wire(
        id: i32,
    ) -> Result<Self, DecodeError> {
        match id {
            0 => Ok(EncodingId::Null),
            1 => Ok(EncodingId::External),
            2 => Ok(EncodingId::Golomb),
            3 => Ok(EncodingId::Huffman),
            4 => Ok(EncodingId::ByteArrayLen),
            5 => Ok(EncodingId::ByteArrayStop),
            6 => Ok(EncodingId::Beta),
            _ => Err(DecodeError::UnsupportedEncoding(id)),
        }
    }

    pub fn to_wire(
        &self,
    ) -> i32 {
        match self {
            EncodingId::Null => 0,
            EncodingId::External => 1,
            EncodingId::Golomb => 2,
            EncodingId::Huffman => 3,
            EncodingId::ByteArrayLen => 4,
            EncodingId::ByteArrayStop => 5,
            EncodingId::Beta => 6,
        }
    }
}

/// An encoding descriptor: the codec id plus its serialized parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Encoding {
    pub id: EncodingId,
    pub params: Vec<u8>,
}

impl Encoding {
    /// Reads `id` ITF8, parameter length ITF8, then the parameter bytes.
    pub fn read_from<R: Read>(
        conn: &mut R,
    ) -> Result<Self, DecodeError> {
        let id = EncodingId::from_wire(read_itf8(conn)?)?;
        let nof_bytes = read_itf8(conn)?;
        if nof_bytes < 0 {
            return Err(DecodeError::MalformedStream(
                "negative encoding parameter length".to_string(),
            ));
        }
        let mut params: Vec<u8> = vec![0; nof_bytes as usize];
        conn.read_exact(&mut params).map_err(|_| {
            DecodeError::TruncatedStream("encoding parameters cut short".to_string())
        })?;
        Ok(Encoding { id, params })
    }

    /// Builds the concrete codec this descriptor names.
    pub fn build(
        &self,
    ) -> Result<Codec, DecodeError> {
        let mut params = Cursor::new(self.params.as_slice());
        let codec = match self.id {
            EncodingId::Null => Codec::Null,
            EncodingId::External => Codec::External {
                block_id: read_itf8(&mut params)?,
            },
            EncodingId::Golomb => {
                let offset = read_itf8(&mut params)?;
                let m = read_itf8(&mut params)?;
                Codec::Golomb(GolombCodec::new(offset, m)?)
            }
            EncodingId::Huffman => {
                let nof_values = read_itf8(&mut params)?;
                if nof_values < 0 {
                    return Err(DecodeError::MalformedStream(
                        "negative Huffman alphabet size".to_string(),
                    ));
                }
                let mut values: Vec<i32> = Vec::with_capacity(nof_values as usize);
                for _ in 0..nof_values {
                    values.push(read_itf8(&mut params)?);
                }
                let nof_lengths = read_itf8(&mut params)?;
                if nof_lengths != nof_values {
                    return Err(DecodeError::MalformedStream(
                        "Huffman alphabet and bit length counts differ".to_string(),
                    ));
                }
                let mut bit_lengths: Vec<u32> = Vec::with_capacity(nof_lengths as usize);
                for _ in 0..nof_lengths {
                    bit_lengths.push(read_itf8(&mut params)? as u32);
                }
                Codec::Huffman(CanonicalHuffman::new(&values, &bit_lengths)?)
            }
            EncodingId::ByteArrayLen => {
                let lengths = Encoding::read_from(&mut params)?.build()?;
                let values = Encoding::read_from(&mut params)?.build()?;
                Codec::ByteArrayLen {
                    lengths: Box::new(lengths),
                    values: Box::new(values),
                }
            }
            EncodingId::ByteArrayStop => {
                let stop = crate::itf8::read_u8(&mut params)?;
                let block_id = read_itf8(&mut params)?;
                Codec::ByteArrayStop { stop, block_id }
            }
            EncodingId::Beta => {
                let offset = read_itf8(&mut params)?;
                let bit_limit = read_itf8(&mut params)?;
                if bit_limit < 0 {
                    return Err(DecodeError::MalformedStream(
                        "negative beta bit limit".to_string(),
                    ));
                }
                Codec::Beta(BetaCodec::new(offset, bit_limit as u32)?)
            }
        };
        Ok(codec)
    }
}

/// Read cursors over a slice's external byte blocks, keyed by content id.
#[derive(Debug)]
pub struct ExternalBlocks<'a> {
    cursors: HashMap<i32, Cursor<&'a [u8]>>,
}

impl<'a> ExternalBlocks<'a> {
    pub fn new(
        blocks: &'a HashMap<i32, Vec<u8>>,
    ) -> Self {
        let cursors = blocks
            .iter()
            .map(|(id, bytes)| (*id, Cursor::new(bytes.as_slice())))
            .collect();
        ExternalBlocks { cursors }
    }

    fn cursor(
        &mut self,
        block_id: i32,
    ) -> Result<&mut Cursor<&'a [u8]>, DecodeError> {
        self.cursors.get_mut(&block_id).ok_or_else(|| {
            DecodeError::MalformedStream(format!("no external block with content id {}", block_id))
        })
    }
}

/// A built data series codec.
///
/// The encoding-id to codec mapping is a closed enumeration, so the
/// family is a tagged union with a shared integer/byte/byte-array read
/// contract rather than trait objects.
///
#[derive(Debug, Clone)]
pub enum Codec {
    Null,
    External { block_id: i32 },
    Golomb(GolombCodec),
    Huffman(CanonicalHuffman),
    ByteArrayLen { lengths: Box<Codec>, values: Box<Codec> },
    ByteArrayStop { stop: u8, block_id: i32 },
    Beta(BetaCodec),
}

impl Codec {
    /// Decodes one integer from the core bit stream or an external block.
    pub fn read_int<R: Read>(
        &self,
        core: &mut BitReader<R>,
        external: &mut ExternalBlocks<'_>,
    ) -> Result<i32, DecodeError> {
        match self {
            Codec::Null => Err(DecodeError::MalformedStream(
                "read from null encoding".to_string(),
            )),
            Codec::External { block_id } => read_itf8(external.cursor(*block_id)?),
            Codec::Golomb(codec) => codec.read(core),
            Codec::Huffman(codec) => codec.read(core),
            Codec::Beta(codec) => codec.read(core),
            Codec::ByteArrayLen { .. } | Codec::ByteArrayStop { .. } => Err(
                DecodeError::MalformedStream("byte array encoding read as integer".to_string()),
            ),
        }
    }

    /// Decodes one byte.
    ///
    /// External blocks store bytes raw; the bit codecs decode an integer
    /// that must land in `0..256`.
    ///
    pub fn read_byte<R: Read>(
        &self,
        core: &mut BitReader<R>,
        external: &mut ExternalBlocks<'_>,
    ) -> Result<u8, DecodeError> {
        match self {
            Codec::External { block_id } => crate::itf8::read_u8(external.cursor(*block_id)?),
            Codec::ByteArrayLen { .. } | Codec::ByteArrayStop { .. } => Err(
                DecodeError::MalformedStream("byte array encoding read as byte".to_string()),
            ),
            _ => {
                let value = self.read_int(core, external)?;
                u8::try_from(value).map_err(|_| {
                    DecodeError::MalformedStream(format!("byte series produced {}", value))
                })
            }
        }
    }

    /// Decodes a byte array via ByteArrayLen or ByteArrayStop.
    pub fn read_bytes<R: Read>(
        &self,
        core: &mut BitReader<R>,
        external: &mut ExternalBlocks<'_>,
    ) -> Result<Vec<u8>, DecodeError> {
        match self {
            Codec::ByteArrayLen { lengths, values } => {
                let nof_bytes = lengths.read_int(core, external)?;
                if nof_bytes < 0 {
                    return Err(DecodeError::MalformedStream(
                        "negative byte array length".to_string(),
                    ));
                }
                match values.as_ref() {
                    // Bulk read when the values live in an external block.
                    Codec::External { block_id } => {
                        let cursor = external.cursor(*block_id)?;
                        let mut bytes: Vec<u8> = vec![0; nof_bytes as usize];
                        cursor.read_exact(&mut bytes).map_err(|_| {
                            DecodeError::TruncatedStream(
                                "external block ended mid-array".to_string(),
                            )
                        })?;
                        Ok(bytes)
                    }
                    _ => (0..nof_bytes)
                        .map(|_| values.read_byte(core, external))
                        .collect(),
                }
            }
            Codec::ByteArrayStop { stop, block_id } => {
                let cursor = external.cursor(*block_id)?;
                let mut bytes: Vec<u8> = Vec::new();
                loop {
                    let byte = crate::itf8::read_u8(cursor)?;
                    if byte == *stop {
                        break;
                    }
                    bytes.push(byte);
                }
                Ok(bytes)
            }
            _ => Err(DecodeError::MalformedStream(
                "series is not a byte array encoding".to_string(),
            )),
        }
    }

    /// Encodes one integer to the core bit stream (bit codecs only);
    /// serves the codec write contracts and the test suite.
    pub fn write_int<W: Write>(
        &self,
        core: &mut BitWriter<W>,
        value: i32,
    ) -> Result<u32, DecodeError> {
        match self {
            Codec::Golomb(codec) => codec.write(core, value),
            Codec::Huffman(codec) => codec.write(core, value),
            Codec::Beta(codec) => codec.write(core, value),
            _ => Err(DecodeError::MalformedStream(
                "encoding does not write to the core bit stream".to_string(),
            )),
        }
    }
}
