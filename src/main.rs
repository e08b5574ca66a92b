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
use decram::DecodeOptions;
use decram::reference::ReferenceSource;

use std::fs::File;
use std::io::BufReader;
use std::io::BufWriter;
use std::io::Write;

use clap::Parser;
use log::error;
use log::info;
use log::warn;

mod cli;

/// Initializes the logger with verbosity given in `log_max_level`.
fn init_log(log_max_level: usize) {
    stderrlog::new()
    .module(module_path!())
    .quiet(false)
    .verbosity(log_max_level)
    .timestamp(stderrlog::Timestamp::Off)
    .init()
    .unwrap();
}

fn main() {
    let cli = cli::Cli::parse();

    // Subcommands:
    match &cli.command {
        // View
        cli::Commands::View {
            input_file,
            reference,
            output_file,
            default_quality_score,
            read_name_prefix,
            skip_md5_check,
            ignore_md5_mismatch,
            lenient,
            verbose,
        } => {
            init_log(if *verbose { 2 } else { 1 });

            let reference = if let Some(path) = reference {
                match ReferenceSource::from_fasta(path) {
                    Ok(reference) => reference,
                    Err(e) => {
                        error!("could not read reference {}: {}", path.display(), e);
                        std::process::exit(1);
                    }
                }
            } else {
                warn!("no reference file given, reference-coded bases decode to N");
                ReferenceSource::empty()
            };

            let options = DecodeOptions {
                default_quality_score: *default_quality_score,
                read_name_prefix: read_name_prefix.clone(),
                skip_md5_check: *skip_md5_check,
                ignore_md5_mismatch: *ignore_md5_mismatch,
                lenient: *lenient,
            };

            let f = File::open(input_file).unwrap_or_else(|e| {
                error!("could not open {}: {}", input_file.display(), e);
                std::process::exit(1);
            });
            let mut conn_in = BufReader::new(f);

            let stats = if let Some(path) = output_file {
                let f = File::create(path).unwrap_or_else(|e| {
                    error!("could not create {}: {}", path.display(), e);
                    std::process::exit(1);
                });
                let mut conn_out = BufWriter::new(f);
                decram::decode_from_std_read_to_std_write(
                    &reference,
                    &options,
                    &mut conn_in,
                    &mut conn_out,
                )
            } else {
                let stdout = std::io::stdout();
                let mut conn_out = BufWriter::new(stdout.lock());
                let stats = decram::decode_from_std_read_to_std_write(
                    &reference,
                    &options,
                    &mut conn_in,
                    &mut conn_out,
                );
                let _ = conn_out.flush();
                stats
            };

            match stats {
                Ok(stats) => info!("decoded {} records, {} bases", stats.n_records, stats.n_bases),
                Err(e) => {
                    error!("{}", e);
                    std::process::exit(1);
                }
            }
        },

        // Count
        cli::Commands::Count {
            input_file,
            verbose,
        } => {
            init_log(if *verbose { 2 } else { 1 });

            let f = File::open(input_file).unwrap_or_else(|e| {
                error!("could not open {}: {}", input_file.display(), e);
                std::process::exit(1);
            });
            let mut conn_in = BufReader::new(f);

            match decram::count_from_std_read(&mut conn_in) {
                Ok(stats) => println!("READS: {}; BASES: {}", stats.n_records, stats.n_bases),
                Err(e) => {
                    error!("{}", e);
                    std::process::exit(1);
                }
            }
        },
    }
}
