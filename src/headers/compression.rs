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
use crate::codec::Encoding;
use crate::itf8::read_itf8;
use crate::itf8::read_u8;

use std::collections::HashMap;
use std::io::Cursor;
use std::io::Read;

/// The per-record data series of a CRAM slice.
///
/// Each value names one stream of decoded integers, bytes or byte arrays
/// that the record reader pulls in lock step; the two-byte tags key the
/// compression header's encoding map.
///
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataSeries {
    BitFlags,
    CompressionFlags,
    ReadLength,
    AlignmentStart,
    ReadGroup,
    MappingQuality,
    ReadName,
    MateFlags,
    MateSequenceId,
    MateAlignmentStart,
    TemplateSize,
    RecordsToNextFragment,
    FeatureCount,
    FeatureCode,
    FeaturePosition,
    SubstitutionCode,
    Insertion,
    SoftClip,
    DeletionLength,
    Base,
    QualityScore,
    HardClipLength,
    PaddingLength,
    RefSkipLength,
    TagCount,
    TagId,
}

impl DataSeries {
    pub fn tag(
        &self,
    ) -> [u8; 2] {
        match self {
            DataSeries::BitFlags => *b"BF",
            DataSeries::CompressionFlags => *b"CF",
            DataSeries::ReadLength => *b"RL",
            DataSeries::AlignmentStart => *b"AP",
            DataSeries::ReadGroup => *b"RG",
            DataSeries::MappingQuality => *b"MQ",
            DataSeries::ReadName => *b"RN",
            DataSeries::MateFlags => *b"MF",
            DataSeries::MateSequenceId => *b"NS",
            DataSeries::MateAlignmentStart => *b"NP",
            DataSeries::TemplateSize => *b"TS",
            DataSeries::RecordsToNextFragment => *b"NF",
            DataSeries::FeatureCount => *b"FN",
            DataSeries::FeatureCode => *b"FC",
            DataSeries::FeaturePosition => *b"FP",
            DataSeries::SubstitutionCode => *b"BS",
            DataSeries::Insertion => *b"IN",
            DataSeries::SoftClip => *b"SC",
            DataSeries::DeletionLength => *b"DL",
            DataSeries::Base => *b"BA",
            DataSeries::QualityScore => *b"QS",
            DataSeries::HardClipLength => *b"HC",
            DataSeries::PaddingLength => *b"PD",
            DataSeries::RefSkipLength => *b"RS",
            DataSeries::TagCount => *b"TC",
            DataSeries::TagId => *b"TN",
        }
    }
}

const BASES: [u8; 5] = [b'A', b'C', b'G', b'T', b'N'];

fn base_index(
    base: u8,
) -> usize {
    match base.to_ascii_uppercase() {
        b'A' => 0,
        b'C' => 1,
        b'G' => 2,
        b'T' => 3,
        _ => 4,
    }
}

/// Per-reference-base substitution alphabet.
///
/// Five wire bytes, one per reference base in `ACGTN` order; each packs
/// the 2-bit codes of the four substitute bases taken in `ACGTN` order
/// with the reference base itself skipped. Both lookup directions are
/// precomputed: code to base for decoding, base to code for encoding.
///
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubstitutionMatrix {
    bytes: [u8; 5],
    code_to_base: [[u8; 4]; 5],
    base_to_code: [[u8; 5]; 5],
}

impl SubstitutionMatrix {
    pub fn new(
        bytes: [u8; 5],
    ) -> Self {
        let mut code_to_base = [[0_u8; 4]; 5];
        let mut base_to_code = [[0_u8; 5]; 5];
        for r in 0..5 {
            let mut j = 0;
            for s in 0..5 {
                if s == r {
                    continue;
                }
                let code = (bytes[r] >> (6 - 2 * j)) & 0x03;
                code_to_base[r][code as usize] = BASES[s];
                base_to_code[r][s] = code;
                j += 1;
            }
        }
        SubstitutionMatrix {
            bytes,
            code_to_base,
            base_to_code,
        }
    }

    /// The substitute base for `code` against `ref_base`.
    pub fn base(
        &self,
        ref_base: u8,
        code: u8,
    ) -> u8 {
        self.code_to_base[base_index(ref_base)][(code & 0x03) as usize]
    }

    /// The code that maps `ref_base` to `alt_base`.
    pub fn code(
        &self,
        ref_base: u8,
        alt_base: u8,
    ) -> u8 {
        self.base_to_code[base_index(ref_base)][base_index(alt_base)]
    }

    pub fn to_wire_bytes(
        &self,
    ) -> [u8; 5] {
        self.bytes
    }
}

impl Default for SubstitutionMatrix {
    /// Codes assigned in `ACGTN` order for every reference base.
    fn default() -> Self {
        SubstitutionMatrix::new([0x1b; 5])
    }
}

/// Decoding parameters shared by every slice of one container.
#[derive(Debug, Clone)]
pub struct CompressionHeader {
    /// Are read names stored, or synthesized by the normalizer?
    pub read_names_included: bool,
    /// Are alignment starts delta-encoded within a slice?
    pub ap_delta: bool,
    /// Does decoding need the reference sequence?
    pub reference_required: bool,
    pub substitution_matrix: SubstitutionMatrix,
    /// Data series tag -> encoding descriptor.
    pub encodings: HashMap<[u8; 2], Encoding>,
    /// Tag id (`name0 << 16 | name1 << 8 | value_type`) -> descriptor.
    pub tag_encodings: HashMap<i32, Encoding>,
}

impl CompressionHeader {
    pub fn from_block(
        data: &[u8],
    ) -> Result<Self, DecodeError> {
        let mut conn = Cursor::new(data);

        let mut read_names_included = true;
        let mut ap_delta = true;
        let mut reference_required = true;
        let mut substitution_matrix = SubstitutionMatrix::default();

        // Preservation map.
        let _nof_bytes = read_itf8(&mut conn)?;
        let nof_entries = read_itf8(&mut conn)?;
        for _ in 0..nof_entries {
            let key = read_map_key(&mut conn)?;
            match &key {
                b"RN" => read_names_included = read_u8(&mut conn)? != 0,
                b"AP" => ap_delta = read_u8(&mut conn)? != 0,
                b"RR" => reference_required = read_u8(&mut conn)? != 0,
                b"SM" => {
                    let mut bytes = [0_u8; 5];
                    conn.read_exact(&mut bytes).map_err(|_| {
                        DecodeError::TruncatedStream("substitution matrix cut short".to_string())
                    })?;
                    substitution_matrix = SubstitutionMatrix::new(bytes);
                }
                _ => {
                    return Err(DecodeError::MalformedStream(format!(
                        "unknown preservation map key {}{}",
                        key[0] as char, key[1] as char
                    )))
                }
            }
        }

        // Data series encoding map.
        let _nof_bytes = read_itf8(&mut conn)?;
        let nof_entries = read_itf8(&mut conn)?;
        let mut encodings: HashMap<[u8; 2], Encoding> = HashMap::new();
        for _ in 0..nof_entries {
            let key = read_map_key(&mut conn)?;
            let encoding = Encoding::read_from(&mut conn)?;
            encodings.insert(key, encoding);
        }

        // Tag encoding map.
        let _nof_bytes = read_itf8(&mut conn)?;
        let nof_entries = read_itf8(&mut conn)?;
        let mut tag_encodings: HashMap<i32, Encoding> = HashMap::new();
        for _ in 0..nof_entries {
            let key = read_itf8(&mut conn)?;
            let encoding = Encoding::read_from(&mut conn)?;
            tag_encodings.insert(key, encoding);
        }

        Ok(CompressionHeader {
            read_names_included,
            ap_delta,
            reference_required,
            substitution_matrix,
            encodings,
            tag_encodings,
        })
    }

    pub fn encoding_for(
        &self,
        series: DataSeries,
    ) -> Option<&Encoding> {
        self.encodings.get(&series.tag())
    }
}

fn read_map_key<R: Read>(
    conn: &mut R,
) -> Result<[u8; 2], DecodeError> {
    let mut key = [0_u8; 2];
    conn.read_exact(&mut key)
        .map_err(|_| DecodeError::TruncatedStream("map key cut short".to_string()))?;
    Ok(key)
}

/// Serializes a compression header for test fixtures; the decoder itself
/// never writes one.
#[cfg(test)]
pub fn encode_compression_header(
    preservation: &[(&[u8; 2], Vec<u8>)],
    encodings: &[([u8; 2], Encoding)],
    tag_encodings: &[(i32, Encoding)],
) -> Vec<u8> {
    use crate::itf8::write_itf8;

    let mut out: Vec<u8> = Vec::new();

    let mut map: Vec<u8> = Vec::new();
    for (key, value) in preservation {
        map.extend_from_slice(&key[..]);
        map.extend_from_slice(value);
    }
    let mut counted: Vec<u8> = Vec::new();
    write_itf8(preservation.len() as i32, &mut counted);
    counted.append(&mut map);
    write_itf8(counted.len() as i32, &mut out);
    out.append(&mut counted);

    let mut map: Vec<u8> = Vec::new();
    for (key, encoding) in encodings {
        map.extend_from_slice(&key[..]);
        write_itf8(encoding.id.to_wire(), &mut map);
        write_itf8(encoding.params.len() as i32, &mut map);
        map.extend_from_slice(&encoding.params);
    }
    let mut counted: Vec<u8> = Vec::new();
    write_itf8(encodings.len() as i32, &mut counted);
    counted.append(&mut map);
    write_itf8(counted.len() as i32, &mut out);
    out.append(&mut counted);

    let mut map: Vec<u8> = Vec::new();
    for (key, encoding) in tag_encodings {
        write_itf8(*key, &mut map);
        write_itf8(encoding.id.to_wire(), &mut map);
        write_itf8(encoding.params.len() as i32, &mut map);
        map.extend_from_slice(&encoding.params);
    }
    let mut counted: Vec<u8> = Vec::new();
    write_itf8(tag_encodings.len() as i32, &mut counted);
    counted.append(&mut map);
    write_itf8(counted.len() as i32, &mut out);
    out.append(&mut counted);

    out
}
