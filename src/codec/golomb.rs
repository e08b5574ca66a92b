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

/// Golomb codec with an additive offset.
///
/// `x + offset` splits into a quotient by `m`, written in unary as
/// one-bits terminated by a zero-bit, and a remainder in truncated
/// binary: `b = ceil(log2 m)` bits, short form (`b - 1` bits) below the
/// cutoff `2^b - m`, long form (`b` bits, biased by the cutoff) above.
///
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GolombCodec {
    m: i32,
    offset: i32,
    b: u32,
    cutoff: i32,
}

impl GolombCodec {
    pub fn new(
        offset: i32,
        m: i32,
    ) -> Result<Self, DecodeError> {
        if m < 1 {
            return Err(DecodeError::MalformedStream(format!(
                "Golomb parameter m = {} out of range",
                m
            )));
        }
        let b: u32 = if m == 1 {
            0
        } else {
            32 - ((m - 1) as u32).leading_zeros()
        };
        let cutoff = (1_i64 << b) as i32 - m;
        Ok(GolombCodec { m, offset, b, cutoff })
    }

    pub fn read<R: Read>(
        &self,
        bis: &mut BitReader<R>,
    ) -> Result<i32, DecodeError> {
        let mut quotient: i64 = 0;
        while bis.read_bit()? {
            quotient += 1;
        }

        let remainder: i64 = if self.b == 0 {
            0
        } else {
            let mut r = bis.read_bits(self.b - 1)? as i64;
            if r >= self.cutoff as i64 {
                r = r * 2 + bis.read_bit()? as i64 - self.cutoff as i64;
            }
            r
        };

        let stored = quotient * self.m as i64 + remainder;
        if stored < self.offset as i64 {
            return Err(DecodeError::ValueOutOfRange(format!(
                "Golomb decode produced {} below offset {}",
                stored, self.offset
            )));
        }
        Ok((stored - self.offset as i64) as i32)
    }

    /// Encodes one value, returning the number of bits written.
    pub fn write<W: Write>(
        &self,
        bos: &mut BitWriter<W>,
        value: i32,
    ) -> Result<u32, DecodeError> {
        let stored = value as i64 + self.offset as i64;
        if value < 0 || stored < 0 {
            return Err(DecodeError::ValueOutOfRange(format!(
                "cannot Golomb encode {} with offset {}",
                value, self.offset
            )));
        }

        let quotient = stored / self.m as i64;
        let remainder = stored % self.m as i64;

        let mut nof_bits = quotient as u32 + 1;
        for _ in 0..quotient {
            bos.write_bit(true)?;
        }
        bos.write_bit(false)?;

        if self.b > 0 {
            if remainder < self.cutoff as i64 {
                bos.write_bits(remainder as u64, self.b - 1)?;
                nof_bits += self.b - 1;
            } else {
                bos.write_bits((remainder + self.cutoff as i64) as u64, self.b)?;
                nof_bits += self.b;
            }
        }
        Ok(nof_bits)
    }
}

// Tests
#[cfg(test)]
mod tests {

    #[test]
    fn round_trip_various_m() {
        use super::GolombCodec;

        use crate::bitstream::BitReader;
        use crate::bitstream::BitWriter;
        use std::io::Cursor;

        let values: Vec<i32> = vec![0, 1, 2, 3, 4, 5, 7, 8, 15, 100, 4095];
        for m in [1, 2, 3, 4, 5, 8, 10, 64] {
            let codec = GolombCodec::new(0, m).unwrap();

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
            assert_eq!(got, values, "m = {}", m);
        }
    }

    #[test]
    fn round_trip_with_offset() {
        use super::GolombCodec;

        use crate::bitstream::BitReader;
        use crate::bitstream::BitWriter;
        use std::io::Cursor;

        let codec = GolombCodec::new(10, 3).unwrap();

        let values: Vec<i32> = vec![0, 1, 5, 29];
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
    fn truncated_binary_remainders() {
        use super::GolombCodec;

        use crate::bitstream::BitWriter;

        // m = 3: b = 2, cutoff = 1. Remainders: 0 -> '0', 1 -> '10',
        // 2 -> '11'. Quotient 0 is a single terminating zero-bit.
        let codec = GolombCodec::new(0, 3).unwrap();

        let mut writer = BitWriter::new(Vec::new());
        assert_eq!(codec.write(&mut writer, 0).unwrap(), 2); // 0 0
        assert_eq!(codec.write(&mut writer, 1).unwrap(), 3); // 0 10
        assert_eq!(codec.write(&mut writer, 2).unwrap(), 3); // 0 11
        assert_eq!(codec.write(&mut writer, 3).unwrap(), 3); // 10 0
        let got = writer.finish().unwrap();

        assert_eq!(got, vec![0b0001_0011, 0b1000_0000]);
    }

    #[test]
    fn negative_value_is_rejected() {
        use crate::DecodeError;
        use super::GolombCodec;

        use crate::bitstream::BitWriter;

        let codec = GolombCodec::new(0, 4).unwrap();
        let mut writer = BitWriter::new(Vec::new());

        assert!(matches!(
            codec.write(&mut writer, -1),
            Err(DecodeError::ValueOutOfRange(_))
        ));
    }

    #[test]
    fn invalid_m_is_rejected() {
        use crate::DecodeError;
        use super::GolombCodec;

        assert!(matches!(
            GolombCodec::new(0, 0),
            Err(DecodeError::MalformedStream(_))
        ));
    }
}
