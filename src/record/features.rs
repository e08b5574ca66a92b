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

/// A read feature: one difference between a read and the reference it
/// aligns to, anchored at a 1-based position within the read.
///
/// `Substitution` carries only its matrix code off the wire; the
/// normalizer fills in the resolved base and the consumed reference base
/// for downstream tag computation.
///
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadFeature {
    ReadBase { position: i32, base: u8, quality_score: u8 },
    Substitution { position: i32, code: u8, base: u8, reference_base: u8 },
    Insertion { position: i32, sequence: Vec<u8> },
    Deletion { position: i32, length: i32 },
    InsertBase { position: i32, base: u8 },
    BaseQualityScore { position: i32, quality_score: u8 },
    SoftClip { position: i32, sequence: Vec<u8> },
    HardClip { position: i32, length: i32 },
    Padding { position: i32, length: i32 },
    RefSkip { position: i32, length: i32 },
}

impl ReadFeature {
    pub fn position(
        &self,
    ) -> i32 {
        match self {
            ReadFeature::ReadBase { position, .. } => *position,
            ReadFeature::Substitution { position, .. } => *position,
            ReadFeature::Insertion { position, .. } => *position,
            ReadFeature::Deletion { position, .. } => *position,
            ReadFeature::InsertBase { position, .. } => *position,
            ReadFeature::BaseQualityScore { position, .. } => *position,
            ReadFeature::SoftClip { position, .. } => *position,
            ReadFeature::HardClip { position, .. } => *position,
            ReadFeature::Padding { position, .. } => *position,
            ReadFeature::RefSkip { position, .. } => *position,
        }
    }

    /// The wire operator byte of this feature.
    pub fn operator(
        &self,
    ) -> u8 {
        match self {
            ReadFeature::ReadBase { .. } => b'B',
            ReadFeature::Substitution { .. } => b'X',
            ReadFeature::Insertion { .. } => b'I',
            ReadFeature::Deletion { .. } => b'D',
            ReadFeature::InsertBase { .. } => b'i',
            ReadFeature::BaseQualityScore { .. } => b'Q',
            ReadFeature::SoftClip { .. } => b'S',
            ReadFeature::HardClip { .. } => b'H',
            ReadFeature::Padding { .. } => b'P',
            ReadFeature::RefSkip { .. } => b'N',
        }
    }
}
