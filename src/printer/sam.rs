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
use crate::record::CramRecord;
use crate::record::ReadTag;

use bstr::BString;
use noodles_sam::{
    self as sam,
    alignment::io::Write,
    alignment::record::Flags,
    alignment::record::MappingQuality,
    alignment::record::cigar::op::{Kind, Op},
    alignment::record::data::field::Tag,
    alignment::record_buf::data::field::Value,
    alignment::record_buf::{Cigar, QualityScores, RecordBuf, Sequence},
};

type E = Box<dyn std::error::Error>;

/// Converts a normalized record into a `noodles_sam` record buffer.
pub fn to_sam_record(
    record: &CramRecord,
    header: &sam::Header,
) -> Result<RecordBuf, E> {
    let mut builder = RecordBuf::builder()
        .set_flags(Flags::from(record.sam_flags()))
        .set_template_length(record.template_size);

    if let Some(name) = &record.read_name {
        builder = builder.set_name(name.clone());
    }

    if !record.is_segment_unmapped() && record.sequence_id >= 0 {
        builder = builder.set_reference_sequence_id(record.sequence_id as usize);
        if record.alignment_start >= 1 {
            builder = builder
                .set_alignment_start(noodles_core::Position::try_from(record.alignment_start as usize)?);
        }
        if let Some(mapping_quality) = MappingQuality::new(record.mapping_quality as u8) {
            builder = builder.set_mapping_quality(mapping_quality);
        }
        let ops: Vec<Op> = record
            .cigar()
            .iter()
            .map(|(operator, length)| cigar_op(*operator, *length))
            .collect::<Result<Vec<Op>, E>>()?;
        builder = builder.set_cigar(Cigar::from(ops));
    }

    if record.mate_sequence_id >= 0 {
        builder = builder.set_mate_reference_sequence_id(record.mate_sequence_id as usize);
        if record.mate_alignment_start >= 1 {
            builder = builder.set_mate_alignment_start(noodles_core::Position::try_from(
                record.mate_alignment_start as usize,
            )?);
        }
    }

    if !record.read_bases.is_empty() {
        builder = builder.set_sequence(Sequence::from(record.read_bases.clone()));
    }
    if !record.quality_scores.is_empty() {
        builder = builder.set_quality_scores(QualityScores::from(record.quality_scores.clone()));
    }

    let mut fields: Vec<(Tag, Value)> = Vec::with_capacity(record.tags.len() + 1);
    for tag in &record.tags {
        fields.push((Tag::from(tag.name), decode_tag_value(tag)?));
    }
    if record.read_group_id >= 0 {
        if let Some((name, _)) = header.read_groups().get_index(record.read_group_id as usize) {
            fields.push((Tag::READ_GROUP, Value::String(name.clone())));
        }
    }
    if !fields.is_empty() {
        builder = builder.set_data(fields.into_iter().collect());
    }

    Ok(builder.build())
}

fn cigar_op(
    operator: u8,
    length: i32,
) -> Result<Op, E> {
    let kind = match operator {
        b'M' => Kind::Match,
        b'I' => Kind::Insertion,
        b'D' => Kind::Deletion,
        b'N' => Kind::Skip,
        b'S' => Kind::SoftClip,
        b'H' => Kind::HardClip,
        b'P' => Kind::Pad,
        _ => {
            return Err(Box::new(DecodeError::MalformedRecord(format!(
                "invalid CIGAR operator {:#04x}",
                operator
            ))))
        }
    };
    Ok(Op::new(kind, length as usize))
}

/// Decodes a tag value from its BAM byte layout.
fn decode_tag_value(
    tag: &ReadTag,
) -> Result<Value, E> {
    let malformed = || {
        Box::new(DecodeError::MalformedRecord(format!(
            "bad value for tag {}{}:{}",
            tag.name[0] as char, tag.name[1] as char, tag.value_type as char
        )))
    };
    let bytes = tag.value.as_slice();

    let value = match tag.value_type {
        b'A' => Value::Character(*bytes.first().ok_or_else(malformed)?),
        b'c' => Value::Int8(*bytes.first().ok_or_else(malformed)? as i8),
        b'C' => Value::UInt8(*bytes.first().ok_or_else(malformed)?),
        b's' => Value::Int16(i16::from_le_bytes(
            bytes.try_into().map_err(|_| malformed())?,
        )),
        b'S' => Value::UInt16(u16::from_le_bytes(
            bytes.try_into().map_err(|_| malformed())?,
        )),
        b'i' => Value::Int32(i32::from_le_bytes(
            bytes.try_into().map_err(|_| malformed())?,
        )),
        b'I' => Value::UInt32(u32::from_le_bytes(
            bytes.try_into().map_err(|_| malformed())?,
        )),
        b'f' => Value::Float(f32::from_le_bytes(
            bytes.try_into().map_err(|_| malformed())?,
        )),
        b'Z' => Value::String(BString::from(strip_nul(bytes))),
        b'H' => Value::Hex(BString::from(strip_nul(bytes))),
        _ => return Err(malformed()),
    };
    Ok(value)
}

fn strip_nul(
    bytes: &[u8],
) -> &[u8] {
    match bytes.split_last() {
        Some((0, rest)) => rest,
        _ => bytes,
    }
}

/// Formats a single record as a SAM line into `conn`.
pub fn format_sam_line<W: std::io::Write>(
    record: &CramRecord,
    header: &sam::Header,
    conn: &mut W,
) -> Result<(), E> {
    let mut writer = sam::io::Writer::new(Vec::new());

    let record_buf = to_sam_record(record, header)?;
    writer.write_alignment_record(header, &record_buf)?;
    conn.write_all(writer.get_ref())?;

    Ok(())
}

/// Formats a SAM header into `conn`.
pub fn format_sam_header<W: std::io::Write>(
    header: &sam::Header,
    conn: &mut W,
) -> Result<(), E> {
    let mut writer = sam::io::Writer::new(Vec::new());
    writer.write_header(header)?;
    conn.write_all(writer.get_ref())?;
    Ok(())
}

// Tests
#[cfg(test)]
mod tests {
    use noodles_sam as sam;

    fn sam_header_with(names: &[&str]) -> sam::Header {
        use bstr::BString;
        use indexmap::IndexMap;
        use noodles_sam::header::record::value::{Map, map::ReferenceSequence};

        let refs = names
            .iter()
            .map(|name| {
                (
                    BString::from(*name),
                    Map::<ReferenceSequence>::new(std::num::NonZeroUsize::try_from(8).unwrap()),
                )
            })
            .collect::<IndexMap<BString, Map<ReferenceSequence>>>();

        sam::Header::builder().set_reference_sequences(refs).build()
    }

    #[test]
    fn format_mapped_record() {
        use crate::record::CramRecord;
        use super::format_sam_line;

        let header = sam_header_with(&["seq1"]);

        let record = CramRecord {
            read_name: Some("read.1".to_string()),
            flags: 0,
            sequence_id: 0,
            alignment_start: 2,
            read_length: 4,
            mapping_quality: 60,
            read_bases: b"ACGT".to_vec(),
            quality_scores: vec![30; 4],
            records_to_next_fragment: -1,
            read_group_id: -1,
            ..Default::default()
        };

        let mut got: Vec<u8> = Vec::new();
        format_sam_line(&record, &header, &mut got).unwrap();

        let expected = b"read.1\t0\tseq1\t2\t60\t4M\t*\t0\t0\tACGT\t????\n".to_vec();
        assert_eq!(
            got.iter().map(|x| *x as char).collect::<String>(),
            expected.iter().map(|x| *x as char).collect::<String>()
        );
    }

    #[test]
    fn format_unmapped_record() {
        use crate::record::CramRecord;
        use super::format_sam_line;

        let header = sam_header_with(&["seq1"]);

        let record = CramRecord {
            read_name: Some("read.2".to_string()),
            flags: 0x4,
            sequence_id: -1,
            alignment_start: 0,
            read_length: 4,
            read_bases: b"ACGT".to_vec(),
            quality_scores: vec![30; 4],
            records_to_next_fragment: -1,
            read_group_id: -1,
            ..Default::default()
        };

        let mut got: Vec<u8> = Vec::new();
        format_sam_line(&record, &header, &mut got).unwrap();

        let expected = b"read.2\t4\t*\t0\t255\t*\t*\t0\t0\tACGT\t????\n".to_vec();
        assert_eq!(
            got.iter().map(|x| *x as char).collect::<String>(),
            expected.iter().map(|x| *x as char).collect::<String>()
        );
    }

    #[test]
    fn decode_scalar_tag_values() {
        use crate::record::ReadTag;
        use super::decode_tag_value;
        use noodles_sam::alignment::record_buf::data::field::Value;

        let tag = ReadTag { name: *b"NM", value_type: b'i', value: 5_i32.to_le_bytes().to_vec() };
        assert_eq!(decode_tag_value(&tag).unwrap(), Value::Int32(5));

        let tag = ReadTag { name: *b"XZ", value_type: b'Z', value: b"hello\0".to_vec() };
        assert_eq!(decode_tag_value(&tag).unwrap(), Value::String("hello".into()));

        let tag = ReadTag { name: *b"XA", value_type: b'A', value: vec![b'y'] };
        assert_eq!(decode_tag_value(&tag).unwrap(), Value::Character(b'y'));

        let tag = ReadTag { name: *b"XB", value_type: b'?', value: vec![] };
        assert!(decode_tag_value(&tag).is_err());
    }
}
