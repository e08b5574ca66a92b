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

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::collections::HashMap;

use std::io::Read;
use std::io::Write;

/// One symbol of a canonical Huffman codebook.
///
/// Invariant: `bit_code` fits in `bit_length` bits.
///
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HuffmanBitCode {
    pub value: i32,
    pub bit_length: u32,
    pub bit_code: u32,
}

/// Canonical Huffman codec over an `i32` alphabet.
///
/// The byte variant of the CRAM data series widens its `u8` alphabet into
/// `0..256` at construction; both variants share this codec.
///
/// The codebook is uniquely determined by the `(value, bit_length)` pairs:
/// symbols are grouped by bit length, sorted ascending within each group,
/// and assigned consecutive left-padded code values in group order. A
/// single-symbol alphabet has bit length zero and costs no bits on the
/// stream.
///
#[derive(Debug, Clone)]
pub struct CanonicalHuffman {
    // Ordered by (bit_length, bit_code); decoding walks the length groups.
    sorted_codes: Vec<HuffmanBitCode>,
    sorted_values_by_rank: Vec<i32>,
    sorted_bit_lens_by_rank: Vec<u32>,
    // Sparse: left-aligned bit pattern -> rank among sorted codes, -1 if absent.
    rank_by_code: Vec<i32>,
    value_to_code: HashMap<i32, HuffmanBitCode>,
}

impl CanonicalHuffman {
    pub fn new(
        values: &[i32],
        bit_lengths: &[u32],
    ) -> Result<Self, DecodeError> {
        if values.len() != bit_lengths.len() || values.is_empty() {
            return Err(DecodeError::MalformedStream(
                "Huffman alphabet and bit length counts differ".to_string(),
            ));
        }

        let mut codebook: BTreeMap<u32, BTreeSet<i32>> = BTreeMap::new();
        for (value, bit_length) in values.iter().zip(bit_lengths.iter()) {
            if *bit_length > 32 {
                return Err(DecodeError::MalformedStream(format!(
                    "Huffman bit length {} out of range",
                    bit_length
                )));
            }
            codebook.entry(*bit_length).or_default().insert(*value);
        }

        let mut sorted_codes: Vec<HuffmanBitCode> = Vec::with_capacity(values.len());
        let mut code_value: i64 = -1;
        let mut code_length: u32 = 0;
        for (&bit_length, group) in &codebook {
            for &value in group {
                code_value += 1;
                code_value <<= bit_length - code_length;
                code_length = bit_length;

                if (code_value as u64).count_ones() > bit_length {
                    return Err(DecodeError::MalformedStream(
                        "Huffman symbol out of range".to_string(),
                    ));
                }
                sorted_codes.push(HuffmanBitCode {
                    value,
                    bit_length,
                    bit_code: code_value as u32,
                });
            }
        }

        let mut sorted_values_by_rank: Vec<i32> = Vec::with_capacity(sorted_codes.len());
        let mut sorted_bit_lens_by_rank: Vec<u32> = Vec::with_capacity(sorted_codes.len());
        let mut max_code: u32 = 0;
        for code in &sorted_codes {
            sorted_values_by_rank.push(code.value);
            sorted_bit_lens_by_rank.push(code.bit_length);
            max_code = max_code.max(code.bit_code);
        }

        let mut rank_by_code: Vec<i32> = vec![-1; max_code as usize + 1];
        for (rank, code) in sorted_codes.iter().enumerate() {
            rank_by_code[code.bit_code as usize] = rank as i32;
        }

        let mut value_to_code: HashMap<i32, HuffmanBitCode> =
            HashMap::with_capacity(sorted_codes.len());
        for code in &sorted_codes {
            value_to_code.insert(code.value, *code);
        }

        Ok(CanonicalHuffman {
            sorted_codes,
            sorted_values_by_rank,
            sorted_bit_lens_by_rank,
            rank_by_code,
            value_to_code,
        })
    }

    /// Decodes one symbol from the bit stream.
    ///
    /// Bits accumulate incrementally: each length group extends the
    /// pattern by the difference to the previous group's length and probes
    /// the rank table. Falling through every group means the stream does
    /// not hold a valid code.
    ///
    pub fn read<R: Read>(
        &self,
        bis: &mut BitReader<R>,
    ) -> Result<i32, DecodeError> {
        let mut bits: u64 = 0;
        let mut prev_len: u32 = 0;

        let mut i = 0;
        while i < self.sorted_codes.len() {
            let len = self.sorted_codes[i].bit_length;
            bits = (bits << (len - prev_len)) | bis.read_bits(len - prev_len)?;
            prev_len = len;

            let rank = match self.rank_by_code.get(bits as usize) {
                Some(rank) => *rank,
                None => -1,
            };
            if rank >= 0 && self.sorted_bit_lens_by_rank[rank as usize] == len {
                return Ok(self.sorted_values_by_rank[rank as usize]);
            }

            // The remaining codes of this length cannot match either: the
            // rank table probe already rejected this bit pattern.
            while i + 1 < self.sorted_codes.len() && self.sorted_codes[i + 1].bit_length == len {
                i += 1;
            }
            i += 1;
        }

        Err(DecodeError::MalformedStream(
            "no Huffman code matches the bit stream".to_string(),
        ))
    }

    /// Encodes one symbol, returning the number of bits written.
    pub fn write<W: Write>(
        &self,
        bos: &mut BitWriter<W>,
        value: i32,
    ) -> Result<u32, DecodeError> {
        let code = self
            .value_to_code
            .get(&value)
            .ok_or(DecodeError::SymbolNotInAlphabet(value))?;
        bos.write_bits(code.bit_code as u64, code.bit_length)?;
        Ok(code.bit_length)
    }

    /// Code length in bits for `value`.
    pub fn bits_for(
        &self,
        value: i32,
    ) -> Result<u32, DecodeError> {
        match self.value_to_code.get(&value) {
            Some(code) => Ok(code.bit_length),
            None => Err(DecodeError::SymbolNotInAlphabet(value)),
        }
    }
}

// Tests
#[cfg(test)]
mod tests {

    #[test]
    fn one_symbol_alphabet_costs_no_bits() {
        use crate::bitstream::BitReader;
        use crate::bitstream::BitWriter;
        use super::CanonicalHuffman;
        use std::io::Cursor;

        let codec = CanonicalHuffman::new(&[42], &[0]).unwrap();

        let mut writer = BitWriter::new(Vec::new());
        for _ in 0..3 {
            assert_eq!(codec.write(&mut writer, 42).unwrap(), 0);
        }
        let bytes = writer.finish().unwrap();
        assert!(bytes.is_empty());

        let mut reader = BitReader::new(Cursor::new(bytes));
        let got: Vec<i32> = (0..3).map(|_| codec.read(&mut reader).unwrap()).collect();
        assert_eq!(got, vec![42, 42, 42]);
    }

    #[test]
    fn canonical_three_symbol_codes() {
        use super::CanonicalHuffman;

        let codec = CanonicalHuffman::new(&[1, 2, 3], &[1, 2, 2]).unwrap();

        assert_eq!(codec.bits_for(1).unwrap(), 1);
        assert_eq!(codec.bits_for(2).unwrap(), 2);
        assert_eq!(codec.bits_for(3).unwrap(), 2);

        // Canonical assignment: 1 -> 0, 2 -> 10, 3 -> 11.
        assert_eq!(codec.value_to_code[&1].bit_code, 0b0);
        assert_eq!(codec.value_to_code[&2].bit_code, 0b10);
        assert_eq!(codec.value_to_code[&3].bit_code, 0b11);
    }

    #[test]
    fn three_symbol_encode_decode() {
        use crate::bitstream::BitReader;
        use crate::bitstream::BitWriter;
        use super::CanonicalHuffman;
        use std::io::Cursor;

        let codec = CanonicalHuffman::new(&[1, 2, 3], &[1, 2, 2]).unwrap();

        let symbols = vec![1, 3, 2, 1];
        let mut writer = BitWriter::new(Vec::new());
        for symbol in &symbols {
            codec.write(&mut writer, *symbol).unwrap();
        }
        let bytes = writer.finish().unwrap();

        // Bits 0 11 10 0, zero-padded to a byte boundary.
        assert_eq!(bytes, vec![0b0111_0000]);

        let mut reader = BitReader::new(Cursor::new(bytes));
        let got: Vec<i32> = symbols
            .iter()
            .map(|_| codec.read(&mut reader).unwrap())
            .collect();
        assert_eq!(got, symbols);
    }

    #[test]
    fn kraft_compliant_alphabet_round_trip() {
        use crate::bitstream::BitReader;
        use crate::bitstream::BitWriter;
        use super::CanonicalHuffman;
        use std::io::Cursor;

        let values: Vec<i32> = vec![-4, 0, 7, 100, 5000, -1, 65536, 9];
        let bit_lengths: Vec<u32> = vec![2, 2, 3, 3, 4, 4, 4, 4];
        let codec = CanonicalHuffman::new(&values, &bit_lengths).unwrap();

        let mut writer = BitWriter::new(Vec::new());
        let mut expected_bits: u32 = 0;
        for value in &values {
            expected_bits += codec.write(&mut writer, *value).unwrap();
        }
        let total: u32 = values
            .iter()
            .map(|v| codec.bits_for(*v).unwrap())
            .sum();
        assert_eq!(expected_bits, total);

        let bytes = writer.finish().unwrap();
        let mut reader = BitReader::new(Cursor::new(bytes));
        let got: Vec<i32> = values
            .iter()
            .map(|_| codec.read(&mut reader).unwrap())
            .collect();
        assert_eq!(got, values);
    }

    #[test]
    fn unknown_symbol_is_rejected() {
        use crate::DecodeError;
        use crate::bitstream::BitWriter;
        use super::CanonicalHuffman;

        let codec = CanonicalHuffman::new(&[1, 2, 3], &[1, 2, 2]).unwrap();

        let mut writer = BitWriter::new(Vec::new());
        let got = codec.write(&mut writer, 4);
        assert!(matches!(got, Err(DecodeError::SymbolNotInAlphabet(4))));
        assert!(matches!(
            codec.bits_for(4),
            Err(DecodeError::SymbolNotInAlphabet(4))
        ));
    }

    #[test]
    fn overlong_bit_length_is_rejected() {
        use crate::DecodeError;
        use super::CanonicalHuffman;

        // Two symbols cannot share bit length zero: the second symbol's
        // code would not fit its declared length.
        let got = CanonicalHuffman::new(&[1, 2], &[0, 0]);
        assert!(matches!(got, Err(DecodeError::MalformedStream(_))));
    }

    #[test]
    fn malformed_bit_stream_fails_decode() {
        use crate::DecodeError;
        use crate::bitstream::BitReader;
        use super::CanonicalHuffman;
        use std::io::Cursor;

        // Codebook with lengths 2, 2, 2: only codes 00, 01 and 10 are
        // assigned, so a stream starting with 11 matches nothing.
        let codec = CanonicalHuffman::new(&[5, 6, 7], &[2, 2, 2]).unwrap();

        let mut reader = BitReader::new(Cursor::new(vec![0b1100_0000]));
        let got = codec.read(&mut reader);
        assert!(matches!(got, Err(DecodeError::MalformedStream(_))));
    }
}
