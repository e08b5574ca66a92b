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
use crate::bitstream::BitReader;
use crate::bitstream::BitWriter;

use std::io::Read;
use std::io::Write;

/// Fixed-width binary codec with an additive offset.
///
/// Stores `value + offset` in exactly `bit_limit` bits.
///
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BetaCodec {
    offset: i32,
    bit_limit: u32,
}

impl BetaCodec {
    pub fn new(
        offset: i32,
        bit_limit: u32,
    ) -> Result<Self, DecodeError> {
        if bit_limit == 0 || bit_limit > 32 {
            return Err(DecodeError::MalformedStream(format!(
                "beta bit limit {} out of range",
                bit_limit
            )));
        }
        Ok(BetaCodec { offset, bit_limit })
    }

    pub fn read<R: Read>(
        &self,
        bis: &mut BitReader<R>,
    ) -> Result<i32, DecodeError> {
        let stored = bis.read_bits(self.bit_limit)? as i64;
        Ok((stored - self.offset as i64) as i32)
    }

    /// Encodes one value, returning the number of bits written.
    pub fn write<W: Write>(
        &self,
        bos: &mut BitWriter<W>,
        value: i32,
    ) -> Result<u32, DecodeError> {
        let stored = value as i64 + self.offset as i64;
        if stored < 0 || stored >= 1_i64 << self.bit_limit {
            return Err(DecodeError::ValueOutOfRange(format!(
                "{} does not fit in {} bits with offset {}",
                value, self.bit_limit, self.offset
            )));
        }
        bos.write_bits(stored as u64, self.bit_limit)?;
        Ok(self.bit_limit)
    }
}

// Tests
#[cfg(test)]
mod tests {

    #[test]
    fn known_bit_patterns() {
        use super::BetaCodec;

        use crate::bitstream::BitWriter;

        // offset 5, 4 bits: -5 -> 0000, 0 -> 0101, 10 -> 1111.
        let codec = BetaCodec::new(5, 4).unwrap();

        let mut writer = BitWriter::new(Vec::new());
        for value in [-5, 0, 10] {
            assert_eq!(codec.write(&mut writer, value).unwrap(), 4);
        }
        let got = writer.finish().unwrap();

        assert_eq!(got, vec![0b0000_0101, 0b1111_0000]);
    }

    #[test]
    fn round_trip() {
        use super::BetaCodec;

        use crate::bitstream::BitReader;
        use crate::bitstream::BitWriter;
        use std::io::Cursor;

        let codec = BetaCodec::new(5, 4).unwrap();

        let values = vec![-5, -1, 0, 3, 10];
        let mut writer = BitWriter::new(Vec::new());
        for value in &values {
            codec.write(&mut writer, *value).unwrap();
        }
        let bytes = writer.finish().unwrap();

        let mut reader = BitReader::new(Cursor::new(bytes));
        let got: Vec<i32> = values
            .iter()
            .map(|_| codec.read(&mut reader).unwrap())
            .collect();
        assert_eq!(got, values);
    }

    #[test]
    fn value_out_of_range() {
        use crate::DecodeError;
        use super::BetaCodec;

        use crate::bitstream::BitWriter;

        let codec = BetaCodec::new(5, 4).unwrap();
        let mut writer = BitWriter::new(Vec::new());

        assert!(matches!(
            codec.write(&mut writer, 11),
            Err(DecodeError::ValueOutOfRange(_))
        ));
        assert!(matches!(
            codec.write(&mut writer, -6),
            Err(DecodeError::ValueOutOfRange(_))
        ));
    }

    #[test]
    fn full_width_values() {
        use super::BetaCodec;

        use crate::bitstream::BitReader;
        use crate::bitstream::BitWriter;
        use std::io::Cursor;

        let codec = BetaCodec::new(0, 32).unwrap();

        let values = vec![0, 1, i32::MAX];
        let mut writer = BitWriter::new(Vec::new());
        for value in &values {
            codec.write(&mut writer, *value).unwrap();
        }
        let bytes = writer.finish().unwrap();

        let mut reader = BitReader::new(Cursor::new(bytes));
        let got: Vec<i32> = values
            .iter()
            .map(|_| codec.read(&mut reader).unwrap())
            .collect();
        assert_eq!(got, values);
    }
}
