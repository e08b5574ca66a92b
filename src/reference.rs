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

use std::collections::HashMap;
use std::path::Path;

use log::warn;
use noodles_sam as sam;

type E = Box<dyn std::error::Error>;

/// Reference bases keyed by sequence name.
///
/// Sequence names are the first whitespace-delimited token of each FASTA
/// record id, matching how SAM headers name their reference sequences.
///
#[derive(Debug, Default)]
pub struct ReferenceSource {
    sequences: HashMap<String, Vec<u8>>,
}

impl ReferenceSource {
    /// A source with no sequences; every lookup misses.
    pub fn empty() -> Self {
        ReferenceSource {
            sequences: HashMap::new(),
        }
    }

    /// A source over sequences already in memory.
    pub fn from_sequences(
        sequences: HashMap<String, Vec<u8>>,
    ) -> Self {
        ReferenceSource { sequences }
    }

    pub fn from_fasta(
        path: &Path,
    ) -> Result<Self, E> {
        let mut reader = needletail::parse_fastx_file(path)?;

        let mut sequences: HashMap<String, Vec<u8>> = HashMap::new();
        while let Some(record) = reader.next() {
            let record = record?;
            let id: String = record.id().iter().map(|x| *x as char).collect();
            let name = id.split_whitespace().next().unwrap_or("").to_string();
            sequences.insert(name, record.seq().to_vec());
        }

        Ok(ReferenceSource { sequences })
    }

    pub fn bases(
        &self,
        sequence_name: &str,
    ) -> Option<&[u8]> {
        self.sequences.get(sequence_name).map(|bases| bases.as_slice())
    }
}

/// Uppercased bases of the sequence the current container aligns to.
///
/// Containers sharing a sequence id reuse the cached copy; the cache
/// invalidates when the id changes.
///
#[derive(Debug)]
pub struct ReferenceCache {
    prev_sequence_id: i32,
    bases: Vec<u8>,
}

impl ReferenceCache {
    pub fn new() -> Self {
        ReferenceCache {
            prev_sequence_id: -1,
            bases: Vec::new(),
        }
    }

    /// The reference window for `sequence_id`, empty for unmapped and
    /// multi-reference containers and for sequences the source misses.
    pub fn bases_for(
        &mut self,
        source: &ReferenceSource,
        header: &sam::Header,
        sequence_id: i32,
    ) -> Result<&[u8], DecodeError> {
        if sequence_id < 0 {
            return Ok(&[]);
        }

        if self.prev_sequence_id != sequence_id {
            let (name, _) = header
                .reference_sequences()
                .get_index(sequence_id as usize)
                .ok_or(DecodeError::UnknownSequence(sequence_id))?;
            let name = name.to_string();

            self.bases = match source.bases(&name) {
                Some(bases) => {
                    let mut upper = bases.to_vec();
                    upper.make_ascii_uppercase();
                    upper
                }
                None => {
                    warn!("reference sequence {} not in the FASTA, decoding against N bases", name);
                    Vec::new()
                }
            };
            self.prev_sequence_id = sequence_id;
        }

        Ok(&self.bases)
    }
}

impl Default for ReferenceCache {
    fn default() -> Self {
        ReferenceCache::new()
    }
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
    fn cache_uppercases_and_reuses() {
        use super::ReferenceCache;
        use super::ReferenceSource;

        let mut source = ReferenceSource::empty();
        source.sequences.insert("seq1".to_string(), b"acgtacgt".to_vec());
        source.sequences.insert("seq2".to_string(), b"tttt".to_vec());

        let header = sam_header_with(&["seq1", "seq2"]);
        let mut cache = ReferenceCache::new();

        assert_eq!(
            cache.bases_for(&source, &header, 0).unwrap(),
            b"ACGTACGT".to_vec().as_slice()
        );
        assert_eq!(
            cache.bases_for(&source, &header, 0).unwrap(),
            b"ACGTACGT".to_vec().as_slice()
        );
        assert_eq!(
            cache.bases_for(&source, &header, 1).unwrap(),
            b"TTTT".to_vec().as_slice()
        );
    }

    #[test]
    fn negative_sequence_id_is_empty() {
        use super::ReferenceCache;
        use super::ReferenceSource;

        let source = ReferenceSource::empty();
        let header = sam_header_with(&["seq1"]);
        let mut cache = ReferenceCache::new();

        assert!(cache.bases_for(&source, &header, -1).unwrap().is_empty());
        assert!(cache.bases_for(&source, &header, -2).unwrap().is_empty());
    }

    #[test]
    fn unknown_sequence_id_fails() {
        use crate::DecodeError;
        use super::ReferenceCache;
        use super::ReferenceSource;

        let source = ReferenceSource::empty();
        let header = sam_header_with(&["seq1"]);
        let mut cache = ReferenceCache::new();

        let got = cache.bases_for(&source, &header, 3);
        assert!(matches!(got, Err(DecodeError::UnknownSequence(3))));
    }
}
