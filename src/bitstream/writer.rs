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

use std::io::Write;

/// Writes bits most-significant-first to an underlying byte sink.
///
/// The mirror image of [BitReader](super::BitReader); serves the codec
/// write contracts and the test suite. Call [flush](BitWriter::flush) to
/// zero-pad and emit a trailing partial byte.
///
#[derive(Debug)]
pub struct BitWriter<W: Write> {
    sink: W,
    buffer: u8,
    nof_buffered_bits: u32,
}

impl<W: Write> BitWriter<W> {
    pub fn new(
        sink: W,
    ) -> Self {
        BitWriter {
            sink,
            buffer: 0,
            nof_buffered_bits: 0,
        }
    }

    fn emit(
        &mut self,
    ) -> Result<(), DecodeError> {
        self.sink
            .write_all(&[self.buffer])
            .map_err(|e| DecodeError::TruncatedStream(format!("bit sink write failed: {}", e)))?;
        self.buffer = 0;
        self.nof_buffered_bits = 0;
        Ok(())
    }

    /// Writes a single bit.
    pub fn write_bit(
        &mut self,
        bit: bool,
    ) -> Result<(), DecodeError> {
        self.buffer = (self.buffer << 1) | bit as u8;
        self.nof_buffered_bits += 1;
        if self.nof_buffered_bits == 8 {
            self.emit()?;
        }
        Ok(())
    }

    /// Writes the low `n` bits of `value`, high bit first.
    pub fn write_bits(
        &mut self,
        value: u64,
        n: u32,
    ) -> Result<(), DecodeError> {
        if n > 64 {
            return Err(DecodeError::ValueOutOfRange(format!(
                "cannot write {} bits from a 64-bit value",
                n
            )));
        }

        for i in (0..n).rev() {
            self.write_bit((value >> i) & 1 == 1)?;
        }
        Ok(())
    }

    /// Pads a trailing partial byte with zero bits and emits it.
    pub fn flush(
        &mut self,
    ) -> Result<(), DecodeError> {
        if self.nof_buffered_bits > 0 {
            self.buffer <<= 8 - self.nof_buffered_bits;
            self.emit()?;
        }
        Ok(())
    }

    /// Flushes and returns the underlying sink.
    pub fn finish(
        mut self,
    ) -> Result<W, DecodeError> {
        self.flush()?;
        Ok(self.sink)
    }
}

// Tests
#[cfg(test)]
mod tests {

    #[test]
    fn write_bits_msb_first() {
        use super::BitWriter;

        let mut writer = BitWriter::new(Vec::new());
        writer.write_bits(0b101, 3).unwrap();
        writer.write_bits(0b10010, 5).unwrap();
        writer.write_bits(0xc1, 8).unwrap();

        let got = writer.finish().unwrap();
        assert_eq!(got, vec![0b1011_0010, 0xc1]);
    }

    #[test]
    fn flush_pads_with_zero_bits() {
        use super::BitWriter;

        let mut writer = BitWriter::new(Vec::new());
        writer.write_bits(0b11, 2).unwrap();

        let got = writer.finish().unwrap();
        assert_eq!(got, vec![0b1100_0000]);
    }

    #[test]
    fn write_then_read_round_trip() {
        use crate::bitstream::BitReader;
        use super::BitWriter;
        use std::io::Cursor;

        let fields: Vec<(u64, u32)> = vec![(1, 1), (0, 2), (13, 4), (0x1234, 16), (u64::MAX, 64)];

        let mut writer = BitWriter::new(Vec::new());
        for (value, width) in &fields {
            writer.write_bits(*value, *width).unwrap();
        }
        let bytes = writer.finish().unwrap();

        let mut reader = BitReader::new(Cursor::new(bytes));
        for (value, width) in &fields {
            assert_eq!(reader.read_bits(*width).unwrap(), *value);
        }
    }

    #[test]
    fn overwide_write_is_rejected() {
        use crate::DecodeError;
        use super::BitWriter;

        let mut writer = BitWriter::new(Vec::new());

        let got = writer.write_bits(0, 65);
        assert!(matches!(got, Err(DecodeError::ValueOutOfRange(_))));
    }

    #[test]
    fn empty_flush_writes_nothing() {
        use super::BitWriter;

        let writer = BitWriter::new(Vec::new());
        let got = writer.finish().unwrap();
        assert!(got.is_empty());
    }
}
