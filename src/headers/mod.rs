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

//! File, container and compression headers of a CRAM stream.
//!
//! A CRAM stream opens with the fixed 26-byte file header
//! ([CramHeader](file::CramHeader)) and the embedded SAM header, then
//! carries containers until end of stream. Each container starts with a
//! [ContainerHeader](container::ContainerHeader) followed by a
//! [CompressionHeader](compression::CompressionHeader) block naming the
//! codec of every data series, and one or more slices holding the record
//! data itself.

pub mod compression;
pub mod container;
pub mod file;
