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
use crate::headers::compression::SubstitutionMatrix;
use crate::record::CramRecord;
use crate::record::NO_ALIGNMENT_SEQUENCE_ID;
use crate::record::NO_ALIGNMENT_SEQUENCE_NAME;
use crate::record::NO_ALIGNMENT_START;
use crate::record::features::ReadFeature;

use noodles_sam as sam;

/// Quality score assigned where the writer preserved none: `'?' - '!'`.
pub const DEFAULT_QUALITY_SCORE: u8 = b'?' - b'!';

/// Sentinel marking a missing entry in a preserved quality array.
const MISSING_QUALITY_SCORE: u8 = 0xff;

/// Restores the absolute view of a decoded record batch.
///
/// Runs once per container, in order: assign session-wide record
/// indices and sequence names, wire up mate pairs from their relative
/// offsets, synthesize missing read names, rebuild read bases from the
/// reference and the feature list, and fill in quality scores.
///
/// The read counter is carried across batches so synthesized names stay
/// unique over a whole decode session.
///
pub struct Normalizer<'a> {
    header: &'a sam::Header,
    read_counter: i64,
    read_name_prefix: String,
    default_quality_score: u8,
}

impl<'a> Normalizer<'a> {
    pub fn new(
        header: &'a sam::Header,
        read_name_prefix: &str,
        default_quality_score: u8,
    ) -> Self {
        Normalizer {
            header,
            read_counter: 0,
            read_name_prefix: read_name_prefix.to_string(),
            default_quality_score,
        }
    }

    pub fn normalize(
        &mut self,
        records: &mut [CramRecord],
        ref_bases: &[u8],
        substitution_matrix: &SubstitutionMatrix,
    ) -> Result<(), DecodeError> {
        // Indices and sequence names.
        for record in records.iter_mut() {
            self.read_counter += 1;
            record.index = self.read_counter;

            if record.sequence_id == NO_ALIGNMENT_SEQUENCE_ID {
                record.sequence_name = Some(NO_ALIGNMENT_SEQUENCE_NAME.to_string());
                record.alignment_start = NO_ALIGNMENT_START;
            } else {
                let (name, _) = self
                    .header
                    .reference_sequences()
                    .get_index(record.sequence_id as usize)
                    .ok_or(DecodeError::UnknownSequence(record.sequence_id))?;
                record.sequence_name = Some(name.to_string());
            }
        }

        // Restore pairing first.
        for i in 0..records.len() {
            if !records[i].is_multi_fragment() || records[i].is_detached() {
                records[i].records_to_next_fragment = -1;
                records[i].next = None;
                records[i].previous = None;
                continue;
            }
            if records[i].is_has_mate_downstream() {
                let offset = records[i].records_to_next_fragment;
                if offset < 1 || i + offset as usize >= records.len() {
                    return Err(DecodeError::MalformedRecord(format!(
                        "record {} points {} records ahead in a batch of {}",
                        records[i].index, offset, records.len()
                    )));
                }
                let j = i + offset as usize;

                let (head, tail) = records.split_at_mut(j);
                let record = &mut head[i];
                let mate = &mut tail[0];

                record.next = Some(j);
                mate.previous = Some(i);

                record.mate_alignment_start = mate.alignment_start;
                record.set_mate_unmapped(mate.is_segment_unmapped());
                record.set_mate_negative_strand(mate.is_negative_strand());
                record.mate_sequence_id = mate.sequence_id;
                if record.mate_sequence_id == NO_ALIGNMENT_SEQUENCE_ID {
                    record.mate_alignment_start = NO_ALIGNMENT_START;
                }

                mate.mate_alignment_start = record.alignment_start;
                mate.set_mate_unmapped(record.is_segment_unmapped());
                mate.set_mate_negative_strand(record.is_negative_strand());
                mate.mate_sequence_id = record.sequence_id;
                if mate.mate_sequence_id == NO_ALIGNMENT_SEQUENCE_ID {
                    mate.mate_alignment_start = NO_ALIGNMENT_START;
                }

                compute_template_size(record, mate);
            }
        }

        // Assign read names where needed.
        for i in 0..records.len() {
            if records[i].read_name.is_none() {
                let name = format!("{}{}", self.read_name_prefix, records[i].index);
                records[i].read_name = Some(name.clone());
                if let Some(j) = records[i].next {
                    records[j].read_name = Some(name.clone());
                }
                if let Some(j) = records[i].previous {
                    records[j].read_name = Some(name);
                }
            }
        }

        // Resolve bases.
        for record in records.iter_mut() {
            if record.is_segment_unmapped() {
                continue;
            }
            restore_read_bases(record, ref_bases, substitution_matrix)?;
        }

        // Restore quality scores.
        for record in records.iter_mut() {
            self.restore_quality_scores(record)?;
        }

        Ok(())
    }

    fn restore_quality_scores(
        &self,
        record: &mut CramRecord,
    ) -> Result<(), DecodeError> {
        let read_length = record.read_length as usize;

        if !record.is_force_preserve_quality_scores() {
            let mut scores: Vec<u8> = vec![self.default_quality_score; read_length];
            for feature in &record.read_features {
                let (position, quality_score) = match feature {
                    ReadFeature::BaseQualityScore { position, quality_score } => {
                        (*position, *quality_score)
                    }
                    ReadFeature::ReadBase { position, quality_score, .. } => {
                        (*position, *quality_score)
                    }
                    _ => continue,
                };
                if position < 1 || position as usize > read_length {
                    return Err(DecodeError::MalformedRecord(format!(
                        "quality at position {} outside read {} of length {}",
                        position, record.index, read_length
                    )));
                }
                scores[position as usize - 1] = quality_score;
            }
            record.quality_scores = scores;
        } else {
            for score in record.quality_scores.iter_mut() {
                if *score == MISSING_QUALITY_SCORE {
                    *score = self.default_quality_score;
                }
            }
        }

        Ok(())
    }
}

/// Template size: rightmost mapped coordinate of the pair minus the
/// leftmost, positive on the leftmost record, ties broken by batch
/// order; zero across references or when either end is unmapped.
fn compute_template_size(
    record: &mut CramRecord,
    mate: &mut CramRecord,
) {
    if record.is_segment_unmapped()
        || mate.is_segment_unmapped()
        || record.sequence_id != mate.sequence_id
    {
        record.template_size = 0;
        mate.template_size = 0;
        return;
    }

    let leftmost = record.alignment_start.min(mate.alignment_start);
    let rightmost = record.alignment_end().max(mate.alignment_end());
    let template_size = rightmost - leftmost;

    if record.alignment_start <= mate.alignment_start {
        record.template_size = template_size;
        mate.template_size = -template_size;
    } else {
        mate.template_size = template_size;
        record.template_size = -template_size;
    }
}

fn ref_base_at(
    ref_bases: &[u8],
    position: i64,
) -> u8 {
    if position < 0 || position as usize >= ref_bases.len() {
        b'N'
    } else {
        ref_bases[position as usize]
    }
}

fn normalize_base(
    base: u8,
) -> u8 {
    let upper = base.to_ascii_uppercase();
    match upper {
        b'A' | b'C' | b'G' | b'T' | b'N' | b'M' | b'R' | b'W' | b'S' | b'Y' | b'K' | b'V'
        | b'H' | b'D' | b'B' => upper,
        _ => b'N',
    }
}

fn restore_read_bases(
    record: &mut CramRecord,
    ref_bases: &[u8],
    substitution_matrix: &SubstitutionMatrix,
) -> Result<(), DecodeError> {
    let read_length = record.read_length as usize;
    let alignment_start = record.alignment_start as i64 - 1;
    let mut bases: Vec<u8> = vec![0; read_length];

    if record.read_features.is_empty() {
        for (i, base) in bases.iter_mut().enumerate() {
            *base = ref_base_at(ref_bases, alignment_start + i as i64);
        }
        for base in bases.iter_mut() {
            *base = normalize_base(*base);
        }
        record.read_bases = bases;
        return Ok(());
    }

    let outside = |position: i32, record_index: i64| {
        DecodeError::MalformedRecord(format!(
            "feature at position {} outside read {} of length {}",
            position, record_index, read_length
        ))
    };

    let record_index = record.index;
    let mut pos_in_read: usize = 1;
    let mut pos_in_seq: i64 = 0;
    for feature in record.read_features.iter_mut() {
        let position = feature.position();
        // Non-consuming features (a trailing hard clip) may sit one past
        // the last base; anything further out is broken.
        if position < 1 || position as usize > read_length + 1 {
            return Err(outside(position, record_index));
        }

        while pos_in_read < position as usize && pos_in_read <= read_length {
            bases[pos_in_read - 1] = ref_base_at(ref_bases, alignment_start + pos_in_seq);
            pos_in_read += 1;
            pos_in_seq += 1;
        }

        match feature {
            ReadFeature::Substitution { code, base, reference_base, .. } => {
                if pos_in_read > read_length {
                    return Err(outside(position, record_index));
                }
                let ref_base = ref_base_at(ref_bases, alignment_start + pos_in_seq);
                let alt_base = substitution_matrix.base(ref_base, *code);
                // Record what was consumed for downstream tag computation.
                *base = alt_base;
                *reference_base = ref_base;
                bases[pos_in_read - 1] = alt_base;
                pos_in_read += 1;
                pos_in_seq += 1;
            }
            ReadFeature::Insertion { sequence, .. } | ReadFeature::SoftClip { sequence, .. } => {
                for inserted in sequence.iter() {
                    if pos_in_read > read_length {
                        return Err(outside(position, record_index));
                    }
                    bases[pos_in_read - 1] = *inserted;
                    pos_in_read += 1;
                }
            }
            ReadFeature::InsertBase { base, .. } => {
                if pos_in_read > read_length {
                    return Err(outside(position, record_index));
                }
                bases[pos_in_read - 1] = *base;
                pos_in_read += 1;
            }
            ReadFeature::Deletion { length, .. } | ReadFeature::RefSkip { length, .. } => {
                pos_in_seq += *length as i64;
            }
            ReadFeature::ReadBase { .. }
            | ReadFeature::BaseQualityScore { .. }
            | ReadFeature::HardClip { .. }
            | ReadFeature::Padding { .. } => {}
        }
    }
    while pos_in_read <= read_length {
        bases[pos_in_read - 1] = ref_base_at(ref_bases, alignment_start + pos_in_seq);
        pos_in_read += 1;
        pos_in_seq += 1;
    }

    // ReadBase features take precedence over the reference.
    for feature in &record.read_features {
        if let ReadFeature::ReadBase { position, base, .. } = feature {
            if *position < 1 || *position as usize > read_length {
                return Err(outside(*position, record_index));
            }
            bases[*position as usize - 1] = *base;
        }
    }

    for base in bases.iter_mut() {
        *base = normalize_base(*base);
    }
    record.read_bases = bases;

    Ok(())
}
