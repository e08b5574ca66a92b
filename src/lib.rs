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

//! decram is a library and a command-line client for decoding CRAM
//! alignment containers into SAM records.
//!
//! CRAM stores alignments column-wise: each record field lives in its
//! own data series with its own codec, and read sequences are stored as
//! deltas against a reference genome. Decoding reverses this in three
//! stages:
//!
//!   - the [codec] family turns bit and byte streams back into series
//!     values (canonical Huffman, Beta, Golomb, and the external byte
//!     codecs),
//!   - the [decoder] walks containers and slices and reassembles
//!     [records](record::CramRecord) from the parallel series streams,
//!   - the [normalizer](normalizer::Normalizer) restores the absolute
//!     view: read bases from the reference and the feature list, quality
//!     scores, mate links and read names.
//!
//! decram supports the following two operations:
//!   - `decram view` decode a CRAM file and print SAM.
//!   - `decram count` count records and bases without decoding records.
//!

use std::io::Read;
use std::io::Write;

use log::error;
use log::info;
use log::warn;

pub mod bitstream;
pub mod codec;
pub mod decoder;
pub mod headers;
pub mod itf8;
pub mod normalizer;
pub mod printer;
pub mod record;
pub mod reference;
pub mod slice;

type E = Box<dyn std::error::Error>;

/// Everything that can go wrong while decoding a CRAM stream.
///
/// All kinds are fatal at container granularity; a lenient caller may
/// skip to the next container because container data is length-prefixed.
///
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Unexpected end of input on a bit or byte read.
    TruncatedStream(String),
    /// The stream decodes to something structurally impossible.
    MalformedStream(String),
    /// The compression header names a codec this implementation does not
    /// handle (the unknown wire id is attached).
    UnsupportedEncoding(i32),
    /// Encode-side lookup of a symbol missing from a Huffman alphabet.
    SymbolNotInAlphabet(i32),
    /// A value does not fit its codec parameters.
    ValueOutOfRange(String),
    /// A record is internally inconsistent.
    MalformedRecord(String),
    /// A slice's stored reference MD5 disagrees with the reference.
    RefMd5Mismatch {
        sequence_id: i32,
        alignment_start: i32,
        alignment_span: i32,
    },
    /// A sequence id with no entry in the SAM header.
    UnknownSequence(i32),
}

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            DecodeError::TruncatedStream(msg) => write!(f, "truncated stream: {}", msg),
            DecodeError::MalformedStream(msg) => write!(f, "malformed stream: {}", msg),
            DecodeError::UnsupportedEncoding(id) => {
                write!(f, "unsupported encoding id {}", id)
            }
            DecodeError::SymbolNotInAlphabet(value) => {
                write!(f, "symbol {} not in the alphabet", value)
            }
            DecodeError::ValueOutOfRange(msg) => write!(f, "value out of range: {}", msg),
            DecodeError::MalformedRecord(msg) => write!(f, "malformed record: {}", msg),
            DecodeError::RefMd5Mismatch {
                sequence_id,
                alignment_start,
                alignment_span,
            } => write!(
                f,
                "reference MD5 mismatch for slice at {}:{}+{}",
                sequence_id, alignment_start, alignment_span
            ),
            DecodeError::UnknownSequence(id) => {
                write!(f, "sequence id {} not in the SAM header", id)
            }
        }
    }
}

impl std::error::Error for DecodeError {}

impl DecodeError {
    /// Annotates a message-bearing error with slice coordinates.
    pub fn with_slice_context(
        self,
        sequence_id: i32,
        alignment_start: i32,
        alignment_span: i32,
    ) -> DecodeError {
        let annotate =
            |msg: String| format!("slice {}:{}+{}: {}", sequence_id, alignment_start, alignment_span, msg);
        match self {
            DecodeError::TruncatedStream(msg) => DecodeError::TruncatedStream(annotate(msg)),
            DecodeError::MalformedStream(msg) => DecodeError::MalformedStream(annotate(msg)),
            DecodeError::ValueOutOfRange(msg) => DecodeError::ValueOutOfRange(annotate(msg)),
            DecodeError::MalformedRecord(msg) => DecodeError::MalformedRecord(annotate(msg)),
            other => other,
        }
    }
}

/// Decoding behavior knobs, populated from the command line.
#[derive(Debug, Clone)]
pub struct DecodeOptions {
    /// Quality score substituted where the writer preserved none.
    pub default_quality_score: u8,
    /// Prefix of read names synthesized for records without one.
    pub read_name_prefix: String,
    /// Skip slice reference MD5 validation entirely.
    pub skip_md5_check: bool,
    /// Log reference MD5 mismatches instead of failing.
    pub ignore_md5_mismatch: bool,
    /// Log container-level failures and continue with the next container.
    pub lenient: bool,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        DecodeOptions {
            default_quality_score: normalizer::DEFAULT_QUALITY_SCORE,
            read_name_prefix: String::new(),
            skip_md5_check: false,
            ignore_md5_mismatch: false,
            lenient: false,
        }
    }
}

/// Counts accumulated over one decode run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecodeStats {
    pub n_records: u64,
    pub n_bases: u64,
}

/// Decodes a CRAM stream from [Read](std::io::Read) and writes SAM to
/// [Write](std::io::Write).
pub fn decode_from_std_read_to_std_write<R: Read, W: Write>(
    reference: &reference::ReferenceSource,
    options: &DecodeOptions,
    conn_in: &mut R,
    conn_out: &mut W,
) -> Result<DecodeStats, E> {
    let mut decoder = decoder::Decoder::new(conn_in)?;
    let sam_header = decoder.cram_header().sam_header.clone();

    printer::sam::format_sam_header(&sam_header, conn_out)?;

    let mut normalizer = normalizer::Normalizer::new(
        &sam_header,
        &options.read_name_prefix,
        options.default_quality_score,
    );
    let mut cache = reference::ReferenceCache::new();
    let mut stats = DecodeStats::default();

    loop {
        let mut batch = match decoder.read_container() {
            Ok(Some(batch)) => batch,
            Ok(None) => break,
            Err(e @ DecodeError::TruncatedStream(_)) => return Err(Box::new(e)),
            Err(e) if options.lenient => {
                error!("skipping container: {}", e);
                continue;
            }
            Err(e) => return Err(Box::new(e)),
        };

        let ref_bases = cache.bases_for(reference, &sam_header, batch.header.sequence_id)?;

        if !options.skip_md5_check {
            for slice in &batch.slices {
                if slice.sequence_id < 0 || slice.validate_ref_md5(ref_bases) {
                    continue;
                }
                let mismatch = DecodeError::RefMd5Mismatch {
                    sequence_id: slice.sequence_id,
                    alignment_start: slice.alignment_start,
                    alignment_span: slice.alignment_span,
                };
                if options.ignore_md5_mismatch {
                    warn!("{}", mismatch);
                } else {
                    return Err(Box::new(mismatch));
                }
            }
        }

        normalizer.normalize(
            &mut batch.records,
            ref_bases,
            &batch.compression.substitution_matrix,
        )?;

        for record in &batch.records {
            printer::sam::format_sam_line(record, &sam_header, conn_out)?;
            stats.n_records += 1;
            stats.n_bases += record.read_length as u64;
        }

        info!(
            "container {}:{}+{}: {} records",
            batch.header.sequence_id,
            batch.header.alignment_start,
            batch.header.alignment_span,
            batch.records.len()
        );
    }

    conn_out.flush()?;
    Ok(stats)
}

/// Counts records and bases from the container headers alone.
pub fn count_from_std_read<R: Read>(
    conn: &mut R,
) -> Result<DecodeStats, E> {
    let _ = headers::file::read_cram_header(conn)?;

    let mut stats = DecodeStats::default();
    while let Some(header) = headers::container::read_container_header(conn)? {
        stats.n_records += header.n_records.max(0) as u64;
        stats.n_bases += header.n_bases.max(0) as u64;

        std::io::copy(&mut (&mut *conn).take(header.length as u64), &mut std::io::sink())
            .map_err(|_| DecodeError::TruncatedStream("container data cut short".to_string()))?;
    }

    Ok(stats)
}
