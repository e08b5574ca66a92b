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
use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(version)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    // Decode a CRAM file and print SAM
    View {
        // Input CRAM file
        #[arg(group = "input", required = true, help = "Input CRAM file")]
        input_file: PathBuf,

        // Reference fasta
        #[arg(long = "reference", short = 'R', help = "Reference fasta file the input was compressed against")]
        reference: Option<PathBuf>,

        // Output file
        #[arg(long = "output", short = 'O', help = "Output SAM file (default: stdout)")]
        output_file: Option<PathBuf>,

        // Quality score for positions the writer did not preserve
        #[arg(long = "default-quality-score", default_value_t = 30)]
        default_quality_score: u8,

        // Prefix of synthesized read names
        #[arg(long = "read-name-prefix", default_value = "")]
        read_name_prefix: String,

        // Reference MD5 policy
        #[arg(long = "skip-md5-check", default_value_t = false)]
        skip_md5_check: bool,

        #[arg(long = "ignore-md5-mismatch", default_value_t = false)]
        ignore_md5_mismatch: bool,

        // Keep going past broken containers
        #[arg(long = "lenient", default_value_t = false)]
        lenient: bool,

        // Verbosity
        #[arg(long = "verbose", default_value_t = false)]
        verbose: bool,
    },

    // Count records and bases from the container headers
    Count {
        // Input CRAM file
        #[arg(group = "input", required = true, help = "Input CRAM file")]
        input_file: PathBuf,

        // Verbosity
        #[arg(long = "verbose", default_value_t = false)]
        verbose: bool,
    },
}
