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

//! The decoded alignment record and its read features.

pub mod features;

use features::ReadFeature;

/// Sequence id of a record with no alignment.
pub const NO_ALIGNMENT_SEQUENCE_ID: i32 = -1;
/// Alignment start of a record with no alignment.
pub const NO_ALIGNMENT_START: i32 = 0;
/// Sequence name of a record with no alignment.
pub const NO_ALIGNMENT_SEQUENCE_NAME: &str = "*";

// BF bit flags. These use the SAM flag bit positions with the two
// mate-specific bits carried separately in the MF series.
const MULTI_FRAGMENT: i32 = 0x1;
const PROPER_PAIR: i32 = 0x2;
const SEGMENT_UNMAPPED: i32 = 0x4;
const NEGATIVE_STRAND: i32 = 0x10;
const FIRST_SEGMENT: i32 = 0x40;
const LAST_SEGMENT: i32 = 0x80;
const SECONDARY_ALIGNMENT: i32 = 0x100;
const VENDOR_FILTERED: i32 = 0x200;
const DUPLICATE: i32 = 0x400;

// CF compression flags.
const FORCE_PRESERVE_QUALITY_SCORES: i32 = 0x1;
const DETACHED: i32 = 0x2;
const HAS_MATE_DOWNSTREAM: i32 = 0x4;

// MF mate flags.
const MATE_NEGATIVE_STRAND: i32 = 0x1;
const MATE_UNMAPPED: i32 = 0x2;

/// A tag attached to a record: two-byte name, BAM value type character,
/// and the value bytes in BAM layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadTag {
    pub name: [u8; 2],
    pub value_type: u8,
    pub value: Vec<u8>,
}

impl ReadTag {
    /// Packs name and type into the three-byte TN series integer.
    pub fn id(
        name: [u8; 2],
        value_type: u8,
    ) -> i32 {
        (name[0] as i32) << 16 | (name[1] as i32) << 8 | value_type as i32
    }

    /// Unpacks a TN series integer into name and type.
    pub fn from_id(
        id: i32,
    ) -> ([u8; 2], u8) {
        ([(id >> 16) as u8, (id >> 8) as u8], id as u8)
    }
}

/// One alignment record as decoded from a slice.
///
/// Read bases and quality scores arrive empty from the parser (unless
/// preserved on the wire) and are restored by the normalizer, as are the
/// mate links, which index into the record's batch.
///
#[derive(Debug, Clone, PartialEq)]
pub struct CramRecord {
    /// 1-based monotonic index across the decode session.
    pub index: i64,
    pub flags: i32,
    pub compression_flags: i32,
    pub mate_flags: i32,
    pub sequence_id: i32,
    pub sequence_name: Option<String>,
    pub alignment_start: i32,
    pub read_length: i32,
    pub read_name: Option<String>,
    pub read_group_id: i32,
    pub mapping_quality: i32,
    pub read_features: Vec<ReadFeature>,
    pub read_bases: Vec<u8>,
    pub quality_scores: Vec<u8>,
    pub mate_sequence_id: i32,
    pub mate_alignment_start: i32,
    pub template_size: i32,
    pub records_to_next_fragment: i32,
    pub next: Option<usize>,
    pub previous: Option<usize>,
    pub tags: Vec<ReadTag>,
}

impl Default for CramRecord {
    /// A record with the no-alignment sentinels in place.
    fn default() -> Self {
        CramRecord {
            index: 0,
            flags: 0,
            compression_flags: 0,
            mate_flags: 0,
            sequence_id: NO_ALIGNMENT_SEQUENCE_ID,
            sequence_name: None,
            alignment_start: NO_ALIGNMENT_START,
            read_length: 0,
            read_name: None,
            read_group_id: -1,
            mapping_quality: 0,
            read_features: Vec::new(),
            read_bases: Vec::new(),
            quality_scores: Vec::new(),
            mate_sequence_id: NO_ALIGNMENT_SEQUENCE_ID,
            mate_alignment_start: NO_ALIGNMENT_START,
            template_size: 0,
            records_to_next_fragment: -1,
            next: None,
            previous: None,
            tags: Vec::new(),
        }
    }
}

impl CramRecord {
    pub fn is_multi_fragment(&self) -> bool {
        self.flags & MULTI_FRAGMENT != 0
    }

    pub fn is_proper_pair(&self) -> bool {
        self.flags & PROPER_PAIR != 0
    }

    pub fn is_segment_unmapped(&self) -> bool {
        self.flags & SEGMENT_UNMAPPED != 0
    }

    pub fn is_negative_strand(&self) -> bool {
        self.flags & NEGATIVE_STRAND != 0
    }

    pub fn is_first_segment(&self) -> bool {
        self.flags & FIRST_SEGMENT != 0
    }

    pub fn is_last_segment(&self) -> bool {
        self.flags & LAST_SEGMENT != 0
    }

    pub fn is_secondary_alignment(&self) -> bool {
        self.flags & SECONDARY_ALIGNMENT != 0
    }

    pub fn is_vendor_filtered(&self) -> bool {
        self.flags & VENDOR_FILTERED != 0
    }

    pub fn is_duplicate(&self) -> bool {
        self.flags & DUPLICATE != 0
    }

    pub fn is_force_preserve_quality_scores(&self) -> bool {
        self.compression_flags & FORCE_PRESERVE_QUALITY_SCORES != 0
    }

    pub fn is_detached(&self) -> bool {
        self.compression_flags & DETACHED != 0
    }

    pub fn is_has_mate_downstream(&self) -> bool {
        self.compression_flags & HAS_MATE_DOWNSTREAM != 0
    }

    pub fn is_mate_negative_strand(&self) -> bool {
        self.mate_flags & MATE_NEGATIVE_STRAND != 0
    }

    pub fn is_mate_unmapped(&self) -> bool {
        self.mate_flags & MATE_UNMAPPED != 0
    }

    pub fn set_mate_negative_strand(
        &mut self,
        value: bool,
    ) {
        if value {
            self.mate_flags |= MATE_NEGATIVE_STRAND;
        } else {
            self.mate_flags &= !MATE_NEGATIVE_STRAND;
        }
    }

    pub fn set_mate_unmapped(
        &mut self,
        value: bool,
    ) {
        if value {
            self.mate_flags |= MATE_UNMAPPED;
        } else {
            self.mate_flags &= !MATE_UNMAPPED;
        }
    }

    /// The full SAM flag word: the BF bits plus the mate bits from MF.
    pub fn sam_flags(
        &self,
    ) -> u16 {
        let mut flags = self.flags as u16;
        if self.is_multi_fragment() {
            if self.is_mate_unmapped() {
                flags |= 0x8;
            }
            if self.is_mate_negative_strand() {
                flags |= 0x20;
            }
        }
        flags
    }

    /// Reference bases consumed by this record: the read length plus
    /// deletions, minus insertions.
    pub fn reference_length(
        &self,
    ) -> i32 {
        let mut length = self.read_length;
        for feature in &self.read_features {
            match feature {
                ReadFeature::Deletion { length: l, .. } => length += l,
                ReadFeature::Insertion { sequence, .. } => length -= sequence.len() as i32,
                _ => {}
            }
        }
        length
    }

    /// 1-based inclusive alignment end.
    pub fn alignment_end(
        &self,
    ) -> i32 {
        self.alignment_start + self.reference_length() - 1
    }

    /// CIGAR operations reconstructed from the read features, as
    /// `(operator, length)` pairs using the SAM operator characters.
    /// Unmapped records have no CIGAR.
    pub fn cigar(
        &self,
    ) -> Vec<(u8, i32)> {
        if self.is_segment_unmapped() || self.read_length == 0 {
            return Vec::new();
        }

        let mut ops: Vec<(u8, i32)> = Vec::new();
        let mut push = |ops: &mut Vec<(u8, i32)>, op: u8, length: i32| {
            if length == 0 {
                return;
            }
            match ops.last_mut() {
                Some((last_op, last_length)) if *last_op == op => *last_length += length,
                _ => ops.push((op, length)),
            }
        };

        let mut pos_in_read: i32 = 1;
        for feature in &self.read_features {
            let position = feature.position();
            if position > pos_in_read {
                push(&mut ops, b'M', position - pos_in_read);
                pos_in_read = position;
            }
            match feature {
                ReadFeature::Insertion { sequence, .. } => {
                    push(&mut ops, b'I', sequence.len() as i32);
                    pos_in_read += sequence.len() as i32;
                }
                ReadFeature::SoftClip { sequence, .. } => {
                    push(&mut ops, b'S', sequence.len() as i32);
                    pos_in_read += sequence.len() as i32;
                }
                ReadFeature::InsertBase { .. } => {
                    push(&mut ops, b'I', 1);
                    pos_in_read += 1;
                }
                ReadFeature::Deletion { length, .. } => push(&mut ops, b'D', *length),
                ReadFeature::RefSkip { length, .. } => push(&mut ops, b'N', *length),
                ReadFeature::Padding { length, .. } => push(&mut ops, b'P', *length),
                ReadFeature::HardClip { length, .. } => push(&mut ops, b'H', *length),
                ReadFeature::Substitution { .. } | ReadFeature::ReadBase { .. } => {
                    push(&mut ops, b'M', 1);
                    pos_in_read += 1;
                }
                ReadFeature::BaseQualityScore { .. } => {}
            }
        }
        if pos_in_read <= self.read_length {
            push(&mut ops, b'M', self.read_length - pos_in_read + 1);
        }

        ops
    }
}

// Tests
#[cfg(test)]
mod tests {

    #[test]
    fn flag_accessors() {
        use super::CramRecord;

        let record = CramRecord {
            flags: 0x1 | 0x10 | 0x40,
            compression_flags: 0x4,
            mate_flags: 0x2,
            ..Default::default()
        };

        assert!(record.is_multi_fragment());
        assert!(record.is_negative_strand());
        assert!(record.is_first_segment());
        assert!(!record.is_segment_unmapped());
        assert!(record.is_has_mate_downstream());
        assert!(!record.is_detached());
        assert!(record.is_mate_unmapped());
        assert!(!record.is_mate_negative_strand());
    }

    #[test]
    fn sam_flags_include_mate_bits() {
        use super::CramRecord;

        let mut record = CramRecord {
            flags: 0x1 | 0x40,
            ..Default::default()
        };
        record.set_mate_negative_strand(true);

        assert_eq!(record.sam_flags(), 0x1 | 0x20 | 0x40);

        // Mate bits only apply to paired records.
        let mut unpaired = CramRecord::default();
        unpaired.set_mate_unmapped(true);
        assert_eq!(unpaired.sam_flags(), 0);
    }

    #[test]
    fn tag_id_round_trip() {
        use super::ReadTag;

        let id = ReadTag::id(*b"NM", b'i');
        assert_eq!(ReadTag::from_id(id), (*b"NM", b'i'));
    }

    #[test]
    fn reference_length_with_features() {
        use super::CramRecord;
        use super::features::ReadFeature;

        let record = CramRecord {
            read_length: 8,
            read_features: vec![
                ReadFeature::Insertion { position: 3, sequence: b"NN".to_vec() },
                ReadFeature::Deletion { position: 5, length: 2 },
            ],
            ..Default::default()
        };

        assert_eq!(record.reference_length(), 8);
    }

    #[test]
    fn cigar_matched_read() {
        use super::CramRecord;

        let record = CramRecord {
            read_length: 8,
            alignment_start: 1,
            ..Default::default()
        };

        assert_eq!(record.cigar(), vec![(b'M', 8)]);
    }

    #[test]
    fn cigar_with_features() {
        use super::CramRecord;
        use super::features::ReadFeature;

        let record = CramRecord {
            read_length: 10,
            alignment_start: 1,
            read_features: vec![
                ReadFeature::SoftClip { position: 1, sequence: b"AC".to_vec() },
                ReadFeature::Substitution { position: 4, code: 0, base: 0, reference_base: 0 },
                ReadFeature::Insertion { position: 6, sequence: b"GG".to_vec() },
                ReadFeature::Deletion { position: 8, length: 3 },
            ],
            ..Default::default()
        };

        assert_eq!(
            record.cigar(),
            vec![(b'S', 2), (b'M', 3), (b'I', 2), (b'D', 3), (b'M', 3)]
        );
    }

    #[test]
    fn cigar_ignores_quality_features() {
        use super::CramRecord;
        use super::features::ReadFeature;

        let record = CramRecord {
            read_length: 5,
            read_features: vec![ReadFeature::BaseQualityScore { position: 3, quality_score: 30 }],
            ..Default::default()
        };

        assert_eq!(record.cigar(), vec![(b'M', 5)]);
    }
}
