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

//! MSB-first bit streams over byte streams.
//!
//! The core block of a CRAM slice is a single bit stream shared by all
//! bit-level codecs; bit order within each byte is most significant first.

pub mod reader;
pub mod writer;

pub use reader::BitReader;
pub use writer::BitWriter;
