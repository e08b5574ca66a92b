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
use crate::codec::Codec;
use crate::codec::ExternalBlocks;
use crate::headers::compression::CompressionHeader;
use crate::headers::compression::DataSeries;
use crate::record::CramRecord;
use crate::record::NO_ALIGNMENT_SEQUENCE_ID;
use crate::record::ReadTag;
use crate::record::features::ReadFeature;
use crate::slice::Slice;

use std::collections::HashMap;
use std::io::Cursor;

/// Pulls records out of one slice, reading every data series in lock
/// step through the codecs named by the compression header.
pub struct RecordReader<'a> {
    core: BitReader<Cursor<&'a [u8]>>,
    external: ExternalBlocks<'a>,
    codecs: HashMap<[u8; 2], Codec>,
    tag_codecs: HashMap<i32, Codec>,
    read_names_included: bool,
    ap_delta: bool,
    slice_sequence_id: i32,
    prev_alignment_start: i32,
}

impl<'a> RecordReader<'a> {
    pub fn new(
        compression: &CompressionHeader,
        slice: &'a Slice,
    ) -> Result<Self, DecodeError> {
        let mut codecs: HashMap<[u8; 2], Codec> = HashMap::new();
        for (tag, encoding) in &compression.encodings {
            codecs.insert(*tag, encoding.build()?);
        }
        let mut tag_codecs: HashMap<i32, Codec> = HashMap::new();
        for (id, encoding) in &compression.tag_encodings {
            tag_codecs.insert(*id, encoding.build()?);
        }

        Ok(RecordReader {
            core: BitReader::new(Cursor::new(slice.core.as_slice())),
            external: ExternalBlocks::new(&slice.external),
            codecs,
            tag_codecs,
            read_names_included: compression.read_names_included,
            ap_delta: compression.ap_delta,
            slice_sequence_id: slice.header.sequence_id,
            // AP deltas accumulate from the slice alignment start.
            prev_alignment_start: slice.header.alignment_start,
        })
    }

    fn int(
        &mut self,
        series: DataSeries,
    ) -> Result<i32, DecodeError> {
        let tag = series.tag();
        match self.codecs.get(&tag) {
            Some(codec) => codec.read_int(&mut self.core, &mut self.external),
            None => Err(missing_series(series)),
        }
    }

    fn byte(
        &mut self,
        series: DataSeries,
    ) -> Result<u8, DecodeError> {
        let tag = series.tag();
        match self.codecs.get(&tag) {
            Some(codec) => codec.read_byte(&mut self.core, &mut self.external),
            None => Err(missing_series(series)),
        }
    }

    fn bytes(
        &mut self,
        series: DataSeries,
    ) -> Result<Vec<u8>, DecodeError> {
        let tag = series.tag();
        match self.codecs.get(&tag) {
            Some(codec) => codec.read_bytes(&mut self.core, &mut self.external),
            None => Err(missing_series(series)),
        }
    }

    fn byte_run(
        &mut self,
        series: DataSeries,
        nof_bytes: i32,
    ) -> Result<Vec<u8>, DecodeError> {
        (0..nof_bytes).map(|_| self.byte(series)).collect()
    }

    /// Decodes the next record from the parallel series streams.
    pub fn read_record(
        &mut self,
    ) -> Result<CramRecord, DecodeError> {
        let mut record = CramRecord {
            sequence_id: if self.slice_sequence_id < 0 {
                NO_ALIGNMENT_SEQUENCE_ID
            } else {
                self.slice_sequence_id
            },
            ..Default::default()
        };

        record.flags = self.int(DataSeries::BitFlags)?;
        record.compression_flags = self.int(DataSeries::CompressionFlags)?;

        if self.read_names_included {
            let name = self.bytes(DataSeries::ReadName)?;
            record.read_name = Some(String::from_utf8_lossy(&name).into_owned());
        }

        record.read_length = self.int(DataSeries::ReadLength)?;
        if record.read_length < 0 {
            return Err(DecodeError::MalformedRecord(
                "negative read length".to_string(),
            ));
        }
        let start = self.int(DataSeries::AlignmentStart)?;
        record.alignment_start = if self.ap_delta {
            self.prev_alignment_start += start;
            self.prev_alignment_start
        } else {
            start
        };

        record.read_group_id = self.int(DataSeries::ReadGroup)?;
        record.mapping_quality = self.int(DataSeries::MappingQuality)?;

        if !record.is_segment_unmapped() {
            let nof_features = self.int(DataSeries::FeatureCount)?;
            if nof_features < 0 {
                return Err(DecodeError::MalformedRecord(
                    "negative feature count".to_string(),
                ));
            }
            record.read_features = self.read_features(nof_features)?;
        } else {
            record.read_bases = self.byte_run(DataSeries::Base, record.read_length)?;
        }

        if record.is_detached() {
            record.mate_flags = self.int(DataSeries::MateFlags)?;
            // Detached records carry their name even when names are not
            // preserved globally; the mate cannot be reached by offset.
            if record.read_name.is_none() {
                let name = self.bytes(DataSeries::ReadName)?;
                record.read_name = Some(String::from_utf8_lossy(&name).into_owned());
            }
            record.mate_sequence_id = self.int(DataSeries::MateSequenceId)?;
            record.mate_alignment_start = self.int(DataSeries::MateAlignmentStart)?;
            record.template_size = self.int(DataSeries::TemplateSize)?;
        } else if record.is_has_mate_downstream() {
            record.records_to_next_fragment = self.int(DataSeries::RecordsToNextFragment)?;
            if record.records_to_next_fragment < 0 {
                return Err(DecodeError::MalformedRecord(
                    "negative distance to the next fragment".to_string(),
                ));
            }
        }

        let nof_tags = self.int(DataSeries::TagCount)?;
        if nof_tags < 0 {
            return Err(DecodeError::MalformedRecord("negative tag count".to_string()));
        }
        for _ in 0..nof_tags {
            let id = self.int(DataSeries::TagId)?;
            let value = match self.tag_codecs.get(&id) {
                Some(codec) => codec.read_bytes(&mut self.core, &mut self.external)?,
                None => {
                    return Err(DecodeError::MalformedStream(format!(
                        "no encoding for tag id {}",
                        id
                    )))
                }
            };
            let (name, value_type) = ReadTag::from_id(id);
            record.tags.push(ReadTag {
                name,
                value_type,
                value,
            });
        }

        if record.is_force_preserve_quality_scores() {
            record.quality_scores = self.byte_run(DataSeries::QualityScore, record.read_length)?;
        }

        Ok(record)
    }

    fn read_features(
        &mut self,
        nof_features: i32,
    ) -> Result<Vec<ReadFeature>, DecodeError> {
        let mut features: Vec<ReadFeature> = Vec::with_capacity(nof_features as usize);
        let mut position: i32 = 0;
        for _ in 0..nof_features {
            let operator = self.byte(DataSeries::FeatureCode)?;
            // FP deltas are cumulative within the record.
            position += self.int(DataSeries::FeaturePosition)?;

            let feature = match operator {
                b'B' => ReadFeature::ReadBase {
                    position,
                    base: self.byte(DataSeries::Base)?,
                    quality_score: self.byte(DataSeries::QualityScore)?,
                },
                b'X' => ReadFeature::Substitution {
                    position,
                    code: self.byte(DataSeries::SubstitutionCode)?,
                    base: 0,
                    reference_base: 0,
                },
                b'I' => ReadFeature::Insertion {
                    position,
                    sequence: self.bytes(DataSeries::Insertion)?,
                },
                b'S' => ReadFeature::SoftClip {
                    position,
                    sequence: self.bytes(DataSeries::SoftClip)?,
                },
                b'D' => ReadFeature::Deletion {
                    position,
                    length: self.int(DataSeries::DeletionLength)?,
                },
                b'i' => ReadFeature::InsertBase {
                    position,
                    base: self.byte(DataSeries::Base)?,
                },
                b'Q' => ReadFeature::BaseQualityScore {
                    position,
                    quality_score: self.byte(DataSeries::QualityScore)?,
                },
                b'H' => ReadFeature::HardClip {
                    position,
                    length: self.int(DataSeries::HardClipLength)?,
                },
                b'P' => ReadFeature::Padding {
                    position,
                    length: self.int(DataSeries::PaddingLength)?,
                },
                b'N' => ReadFeature::RefSkip {
                    position,
                    length: self.int(DataSeries::RefSkipLength)?,
                },
                _ => {
                    return Err(DecodeError::MalformedRecord(format!(
                        "invalid read feature operator {:#04x}",
                        operator
                    )))
                }
            };
            features.push(feature);
        }
        Ok(features)
    }
}

fn missing_series(
    series: DataSeries,
) -> DecodeError {
    let tag = series.tag();
    DecodeError::MalformedStream(format!(
        "no encoding for data series {}{}",
        tag[0] as char, tag[1] as char
    ))
}

/// Decodes all records of a slice, annotating failures with the slice
/// coordinates.
pub fn read_slice_records(
    compression: &CompressionHeader,
    slice: &Slice,
) -> Result<Vec<CramRecord>, DecodeError> {
    let annotate = |e: DecodeError| {
        e.with_slice_context(
            slice.header.sequence_id,
            slice.header.alignment_start,
            slice.header.alignment_span,
        )
    };

    let mut reader = RecordReader::new(compression, slice).map_err(annotate)?;
    let mut records: Vec<CramRecord> = Vec::with_capacity(slice.header.n_records.max(0) as usize);
    for _ in 0..slice.header.n_records {
        records.push(reader.read_record().map_err(annotate)?);
    }
    Ok(records)
}

// Tests
#[cfg(test)]
mod tests {
    use crate::codec::Encoding;
    use crate::codec::EncodingId;
    use crate::headers::compression::CompressionHeader;
    use crate::headers::compression::SubstitutionMatrix;
    use crate::slice::Slice;
    use crate::slice::SliceHeader;

    use std::collections::HashMap;

    fn external_encoding(block_id: i32) -> Encoding {
        use crate::itf8::write_itf8;

        let mut params: Vec<u8> = Vec::new();
        write_itf8(block_id, &mut params);
        Encoding { id: EncodingId::External, params }
    }

    fn constant_encoding(value: i32) -> Encoding {
        use crate::itf8::write_itf8;

        let mut params: Vec<u8> = Vec::new();
        write_itf8(1, &mut params);
        write_itf8(value, &mut params);
        write_itf8(1, &mut params);
        write_itf8(0, &mut params);
        Encoding { id: EncodingId::Huffman, params }
    }

    fn stop_encoding(stop: u8, block_id: i32) -> Encoding {
        use crate::itf8::write_itf8;

        let mut params: Vec<u8> = vec![stop];
        write_itf8(block_id, &mut params);
        Encoding { id: EncodingId::ByteArrayStop, params }
    }

    /// Two mapped records sharing one external block per varying series;
    /// constant series cost zero bits through one-symbol Huffman codes.
    fn test_fixture() -> (CompressionHeader, Slice) {
        use crate::itf8::write_itf8;

        let mut encodings: HashMap<[u8; 2], Encoding> = HashMap::new();
        encodings.insert(*b"BF", constant_encoding(0x1 | 0x40));
        encodings.insert(*b"CF", constant_encoding(0));
        encodings.insert(*b"RL", external_encoding(1));
        encodings.insert(*b"AP", external_encoding(2));
        encodings.insert(*b"RG", constant_encoding(-1));
        encodings.insert(*b"MQ", constant_encoding(60));
        encodings.insert(*b"FN", external_encoding(3));
        encodings.insert(*b"FC", external_encoding(4));
        encodings.insert(*b"FP", external_encoding(5));
        encodings.insert(*b"BS", external_encoding(6));
        encodings.insert(*b"TC", constant_encoding(0));
        encodings.insert(*b"RN", stop_encoding(0, 7));

        let compression = CompressionHeader {
            read_names_included: true,
            ap_delta: true,
            reference_required: true,
            substitution_matrix: SubstitutionMatrix::default(),
            encodings,
            tag_encodings: HashMap::new(),
        };

        let mut external: HashMap<i32, Vec<u8>> = HashMap::new();

        let mut read_lengths: Vec<u8> = Vec::new();
        write_itf8(8, &mut read_lengths);
        write_itf8(4, &mut read_lengths);
        external.insert(1, read_lengths);

        let mut starts: Vec<u8> = Vec::new();
        write_itf8(0, &mut starts); // delta from slice start 1
        write_itf8(2, &mut starts);
        external.insert(2, starts);

        let mut feature_counts: Vec<u8> = Vec::new();
        write_itf8(1, &mut feature_counts);
        write_itf8(0, &mut feature_counts);
        external.insert(3, feature_counts);

        external.insert(4, vec![b'X']);

        let mut feature_positions: Vec<u8> = Vec::new();
        write_itf8(4, &mut feature_positions);
        external.insert(5, feature_positions);

        external.insert(6, vec![2]); // substitution code

        external.insert(7, b"read.1\0read.2\0".to_vec());

        let slice = Slice {
            header: SliceHeader {
                sequence_id: 0,
                alignment_start: 1,
                alignment_span: 10,
                n_records: 2,
                record_counter: 0,
                n_blocks: 8,
                content_ids: vec![1, 2, 3, 4, 5, 6, 7],
                embedded_ref_block_id: -1,
                ref_md5: [0; 16],
            },
            core: Vec::new(),
            external,
        };

        (compression, slice)
    }

    #[test]
    fn decode_slice_records() {
        use crate::record::features::ReadFeature;
        use super::read_slice_records;

        let (compression, slice) = test_fixture();
        let got = read_slice_records(&compression, &slice).unwrap();

        assert_eq!(got.len(), 2);

        assert_eq!(got[0].read_name.as_deref(), Some("read.1"));
        assert_eq!(got[0].read_length, 8);
        assert_eq!(got[0].alignment_start, 1);
        assert_eq!(got[0].mapping_quality, 60);
        assert_eq!(
            got[0].read_features,
            vec![ReadFeature::Substitution { position: 4, code: 2, base: 0, reference_base: 0 }]
        );

        assert_eq!(got[1].read_name.as_deref(), Some("read.2"));
        assert_eq!(got[1].read_length, 4);
        // AP delta accumulates: 1 + 0, then + 2.
        assert_eq!(got[1].alignment_start, 3);
        assert!(got[1].read_features.is_empty());
    }

    #[test]
    fn missing_series_is_malformed() {
        use crate::DecodeError;
        use super::read_slice_records;

        let (mut compression, slice) = test_fixture();
        compression.encodings.remove(b"RL");

        let got = read_slice_records(&compression, &slice);
        assert!(matches!(got, Err(DecodeError::MalformedStream(_))));
    }

    #[test]
    fn truncated_external_block() {
        use crate::DecodeError;
        use super::read_slice_records;

        let (compression, mut slice) = test_fixture();
        // Drop the second read length.
        slice.external.insert(1, {
            let mut bytes: Vec<u8> = Vec::new();
            crate::itf8::write_itf8(8, &mut bytes);
            bytes
        });

        let got = read_slice_records(&compression, &slice);
        assert!(matches!(got, Err(DecodeError::TruncatedStream(_))));
    }
}
