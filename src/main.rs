//
// ringfit - Ring Gaussian measurement of centrioles in dual-channel microscopy images
// Copyright (c) 2020 Filip Szczerek <ga.software@yahoo.com>
//
// This project is licensed under the terms of the MIT license
// (see the LICENSE file for details).
//

//!
//! Entry point and main functions of the `ringfit` executable.
//!

mod args;
mod detect;
mod image;
mod logging;
mod measure;
mod montage;
mod pipeline;
mod plot;
mod report;
mod ring;
mod utils;

use logging::Logger;
use measure::{AcceptanceCriteria, ChannelNames, RadiusRange};
use pipeline::{ConfigError, MeasurementPipeline, PipelineConfig};
use report::ReportError;
use ring::RingGaussian;
use std::path::Path;

const VERSION_STRING: &'static str = include_str!(concat!(env!("OUT_DIR"), "/version"));

fn print_header() {
    println!(r#"
_________________

   {}
   Ring Gaussian measurement of centrioles in dual-channel microscopy images

   Copyright © 2020 Filip Szczerek <ga.software@yahoo.com>

   This program is licensed under MIT license (see LICENSE.txt for details).

_________________
"#,
        VERSION_STRING
    );
}

#[derive(Debug)]
enum RunError {
    Config(ConfigError),
    InputDir{ dir: String, err: std::io::Error },
    NoInputFiles(String),
    OutputDir{ dir: String, err: std::io::Error },
    Report(ReportError)
}

impl std::fmt::Display for RunError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunError::Config(err) => write!(f, "invalid configuration: {}", err),
            RunError::InputDir{ dir, err } => write!(f, "cannot read input directory {}: {}", dir, err),
            RunError::NoInputFiles(dir) => write!(f, "no TIFF images found in {}", dir),
            RunError::OutputDir{ dir, err } => write!(f, "cannot create output directory {}: {}", dir, err),
            RunError::Report(err) => write!(f, "{}", err)
        }
    }
}

impl From<ConfigError> for RunError {
    fn from(err: ConfigError) -> RunError { RunError::Config(err) }
}

impl From<ReportError> for RunError {
    fn from(err: ReportError) -> RunError { RunError::Report(err) }
}

fn pipeline_config(config: &args::Configuration) -> PipelineConfig {
    let (red_min, red_max) = config.red_radius();
    let (green_min, green_max) = config.green_radius();

    PipelineConfig{
        marker_color: config.marker_color(),
        window_size: config.window_size(),
        box_bounds: config.box_bounds(),
        montage_cell: config.montage_cell(),
        montage_columns: config.montage_columns(),
        red_initial: RingGaussian::from_array(config.red_init()),
        green_initial: RingGaussian::from_array(config.green_init()),
        criteria: AcceptanceCriteria{
            max_eccentricity: config.eccentricity(),
            red_radius: RadiusRange{ min: red_min, max: red_max },
            green_radius: RadiusRange{ min: green_min, max: green_max }
        },
        fit_timeout: match config.fit_timeout_ms() {
            0 => None,
            ms => Some(std::time::Duration::from_millis(ms))
        },
        ..PipelineConfig::new(ChannelNames{
            red: config.red_name().to_string(),
            green: config.green_name().to_string()
        })
    }
}

fn run_measurement(config: &args::Configuration, logger: &Logger) -> Result<(), RunError> {
    let pipeline_config = pipeline_config(config);
    pipeline_config.validate()?;

    let input_dir = config.input_dir();
    let input_files = utils::list_input_files(input_dir)
        .map_err(|err| RunError::InputDir{ dir: input_dir.to_string(), err })?;
    if input_files.is_empty() {
        return Err(RunError::NoInputFiles(input_dir.to_string()));
    }
    logger.info(&format!("Found {} image(s) in {}.", input_files.len(), input_dir));

    let output_dir = match config.output_dir() {
        Some(dir) => dir.clone(),
        None => Path::new(input_dir).join(args::defaults::RESULTS_SUBDIR).to_string_lossy().to_string()
    };
    std::fs::create_dir_all(&output_dir).map_err(|err| RunError::OutputDir{ dir: output_dir.clone(), err })?;

    let mut pipeline = MeasurementPipeline::new(pipeline_config.clone(), logger)?;
    for file_name in &input_files {
        pipeline.process_file(file_name);
    }
    let output = pipeline.finish();

    logger.info(&format!(
        "\n{} detection(s), {} fitted, {} failed, {} accepted.",
        output.num_detections, output.records.len(), output.num_failed_fits, output.accepted.len()
    ));

    let image_names: Vec<String> = input_files.iter().map(|f| utils::file_name_of(f)).collect();
    report::write_all(&output_dir, &pipeline_config, &output, &image_names, VERSION_STRING)?;
    logger.info(&format!("Results saved in {}.", output_dir));

    Ok(())
}

fn run_program() -> bool {
    print_header();
    println!();

    let config = match args::parse_command_line(std::env::args()) {
        Ok(config) => match config {
            None => return true, // help was requested
            Some(config) => config
        },
        Err(_) => { println!("\nUse --{} for more information.\n", args::cmdline::HELP); return false; }
    };

    let logger = Logger::new(config.log_level());

    let tstart = std::time::Instant::now();

    if let Err(err) = run_measurement(&config, &logger) {
        eprintln!("Error: {}.", err);
        return false;
    }

    let elapsed = tstart.elapsed();
    let mins = elapsed.as_secs() / 60;
    let secs = elapsed.as_secs() % 60;
    let frac_secs = elapsed.as_secs_f32() - (mins * 60) as f32 - secs as f32;
    logger.info(&format!("Completed in {} min {:02}.{:0.0} s.", mins, secs, frac_secs * 10.0));

    true
}

fn main() {
    std::process::exit(if run_program() { 0 } else { 1 });
}
