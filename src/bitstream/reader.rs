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

use std::io::Read;

/// Reads bits most-significant-first from an underlying byte stream.
///
/// Holds an 8-bit accumulator and a count of bits still buffered in it;
/// `read_bits` drains the accumulator before refilling from the source.
///
#[derive(Debug)]
pub struct BitReader<R: Read> {
    source: R,
    buffer: u8,
    nof_buffered_bits: u32,
}

impl<R: Read> BitReader<R> {
    pub fn new(
        source: R,
    ) -> Self {
        BitReader {
            source,
            buffer: 0,
            nof_buffered_bits: 0,
        }
    }

    fn refill(
        &mut self,
    ) -> Result<(), DecodeError> {
        let mut byte = [0_u8; 1];
        self.source
            .read_exact(&mut byte)
            .map_err(|_| DecodeError::TruncatedStream("bit stream ended mid-read".to_string()))?;
        self.buffer = byte[0];
        self.nof_buffered_bits = 8;
        Ok(())
    }

    /// Reads a single bit.
    pub fn read_bit(
        &mut self,
    ) -> Result<bool, DecodeError> {
        if self.nof_buffered_bits == 0 {
            self.refill()?;
        }
        self.nof_buffered_bits -= 1;
        Ok((self.buffer >> self.nof_buffered_bits) & 1 == 1)
    }

    /// Reads `n` bits (`0..=64`), returned right-aligned in the result.
    ///
    /// Reading zero bits is legal and returns 0 without touching the source.
    ///
    pub fn read_bits(
        &mut self,
        n: u32,
    ) -> Result<u64, DecodeError> {
        if n > 64 {
            return Err(DecodeError::ValueOutOfRange(format!(
                "cannot read {} bits into a 64-bit value",
                n
            )));
        }

        let mut result: u64 = 0;
        let mut needed = n;
        while needed > 0 {
            if self.nof_buffered_bits == 0 {
                self.refill()?;
            }
            let taken = needed.min(self.nof_buffered_bits);
            let shift = self.nof_buffered_bits - taken;
            let mask: u8 = if taken == 8 { 0xff } else { (1 << taken) - 1 };
            result = (result << taken) | ((self.buffer >> shift) & mask) as u64;
            self.nof_buffered_bits -= taken;
            needed -= taken;
        }
        Ok(result)
    }
}
