//! GRIB2 to image converter.
//!
//! Extracts the parameters named in a JSON config from a GRIB2 file and
//! writes one image per parameter plus a bounds file next to the input.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use tracing::debug;
use tracing_subscriber::{fmt, EnvFilter};

use extraction::{parse_add_exif, OutputFormat, RunOptions, RunSummary};

#[derive(Parser, Debug)]
#[command(name = "grib2-image")]
#[command(about = "Convert GRIB2 parameters into images and a bounds file")]
struct Args {
    /// GRIB2 input file; outputs are written to its directory
    input: PathBuf,

    /// Suffix appended to every output file name
    output_suffix: String,

    /// JSON config mapping parameter names to band settings
    config: PathBuf,

    /// Output format: jpeg or png
    #[arg(default_value = "jpeg")]
    output_format: String,

    /// Embed per-band value ranges as EXIF: true or false
    #[arg(default_value = "true")]
    add_exif: String,

    /// Log level (overridden by RUST_LOG)
    #[arg(long, default_value = "warn", env = "LOG_LEVEL")]
    log_level: String,

    /// Log format
    #[arg(long, default_value = "text", value_parser = ["text", "json"])]
    log_format: String,
}

impl Args {
    fn run_options(&self) -> Option<RunOptions> {
        let format: OutputFormat = self.output_format.parse().ok()?;
        Some(
            RunOptions::new(&self.input, &self.output_suffix, &self.config)
                .with_format(format)
                .with_exif(parse_add_exif(&self.add_exif)),
        )
    }
}

fn main() -> ExitCode {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) if e.kind() == ErrorKind::MissingRequiredArgument => {
            print_usage();
            return ExitCode::FAILURE;
        }
        Err(e) => e.exit(),
    };

    init_tracing(&args);

    let Some(options) = args.run_options() else {
        println!("Error: output_format must be either 'jpeg' or 'png'");
        return ExitCode::FAILURE;
    };

    match run(&options) {
        Ok(summary) => {
            debug!(
                written = summary.written.len(),
                skipped = summary.skipped.len(),
                "Finished"
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error processing file: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(options: &RunOptions) -> Result<RunSummary> {
    debug!(?options, "Starting extraction");
    Ok(extraction::run(options)?)
}

fn print_usage() {
    println!("{}", Args::command().render_usage());
    println!("output_format: jpeg or png (default: jpeg)");
    println!("add_exif: true or false (default: true)");
}

fn init_tracing(args: &Args) {
    // RUST_LOG wins over --log-level
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&args.log_level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let builder = fmt().with_env_filter(filter).with_target(false);
    if args.log_format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}
