//
// ringfit - Ring Gaussian measurement of centrioles in dual-channel microscopy images
// Copyright (c) 2020 Filip Szczerek <ga.software@yahoo.com>
//
// This project is licensed under the terms of the MIT license
// (see the LICENSE file for details).
//

//!
//! Output files: measurement tables, summary, run parameters, montages and the radius plot.
//!

use crate::image::ImageError;
use crate::measure::{self, ChannelNames, ColumnSummary, MeasurementRecord};
use crate::pipeline::{PipelineConfig, PipelineOutput};
use crate::plot;
use std::io::Write;
use std::path::Path;

pub const ACCEPTED_RECORDS_FILE: &str = "raw_data.csv";
pub const ALL_RECORDS_FILE: &str = "all_measurements.csv";
pub const SUMMARY_FILE: &str = "summary.csv";
pub const PARAMETERS_FILE: &str = "Parameters_results.txt";
pub const RADIUS_PLOT_FILE: &str = "radius_profile.png";

#[derive(Debug)]
pub enum ReportError {
    Io{ file_name: String, err: std::io::Error },
    Image{ file_name: String, err: ImageError }
}

impl std::fmt::Display for ReportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReportError::Io{ file_name, err } => write!(f, "cannot write {}: {}", file_name, err),
            ReportError::Image{ file_name, err } => write!(f, "cannot save {}: {}", file_name, err)
        }
    }
}

impl std::error::Error for ReportError {}

fn path_str(dir: &str, file_name: &str) -> String {
    Path::new(dir).join(file_name).to_string_lossy().to_string()
}

/// Quotes a CSV field if needed.
fn csv_field(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

/// Formats a number for CSV; undefined values become empty fields.
fn csv_number(value: f64) -> String {
    if value.is_nan() { String::new() } else { format!("{}", value) }
}

/// Writes records as CSV: detection index, source image, then one column per field.
pub fn write_records_csv<W: Write>(
    out: &mut W,
    records: &[MeasurementRecord],
    names: &ChannelNames,
    image_names: &[String]
) -> std::io::Result<()> {
    let header: Vec<String> = measure::field_names(names).iter().map(|n| csv_field(n)).collect();
    writeln!(out, ",Image,{}", header.join(","))?;

    for record in records {
        let image = image_names.get(record.image_index).map(|s| s.as_str()).unwrap_or("");
        let values: Vec<String> = record.values().iter().map(|&v| csv_number(v)).collect();
        writeln!(out, "{},{},{}", record.detection, csv_field(image), values.join(","))?;
    }

    Ok(())
}

/// Writes per-field statistics as CSV: one column per field, one row per statistic.
pub fn write_summary_csv<W: Write>(out: &mut W, summary: &[(String, ColumnSummary)]) -> std::io::Result<()> {
    let header: Vec<String> = summary.iter().map(|(name, _)| csv_field(name)).collect();
    writeln!(out, ",{}", header.join(","))?;

    let rows: [(&str, fn(&ColumnSummary) -> f64); 8] = [
        ("count", |s| s.count as f64),
        ("mean",  |s| s.mean),
        ("std",   |s| s.std),
        ("min",   |s| s.min),
        ("25%",   |s| s.q25),
        ("50%",   |s| s.median),
        ("75%",   |s| s.q75),
        ("max",   |s| s.max)
    ];
    for (label, stat) in rows.iter() {
        let values: Vec<String> = summary.iter().map(|(_, s)| csv_number(stat(s))).collect();
        writeln!(out, "{},{}", label, values.join(","))?;
    }

    Ok(())
}

fn mean_or_nan(values: &[f64]) -> String {
    let s = measure::summarize(values);
    if s.count == 0 { "nan".to_string() } else { format!("{}", s.mean) }
}

/// Writes the run parameters and the mean average radius of accepted records per channel.
pub fn write_parameters<W: Write>(
    out: &mut W,
    config: &PipelineConfig,
    output: &PipelineOutput,
    version: &str
) -> std::io::Result<()> {
    let names = &config.names;
    let criteria = &config.criteria;

    writeln!(out, "{}\n", version)?;
    writeln!(out, "Parameters")?;
    writeln!(out, "The name of red channel: {}, The name of green channel: {}", names.red, names.green)?;
    writeln!(out, "The eccentricity threshold: {}", criteria.max_eccentricity)?;
    writeln!(out, "The lower bound of radius(red): {}, The upper bound of radius(red): {}",
        criteria.red_radius.min, criteria.red_radius.max)?;
    writeln!(out, "The lower bound of radius(green): {}, The upper bound of radius(green): {}",
        criteria.green_radius.min, criteria.green_radius.max)?;
    writeln!(out, "Initial parameters ({}): {:?}", names.red, config.red_initial.to_array())?;
    writeln!(out, "Initial parameters ({}): {:?}", names.green, config.green_initial.to_array())?;
    writeln!(out, "Window size: {0}x{0}, marker color: {1:?}", config.window_size, config.marker_color)?;
    writeln!(out, "The number of tif images analyzed: {}", output.num_images)?;
    writeln!(out, "\n")?;

    let red_avg: Vec<f64> = output.accepted.iter().map(|r| r.red.average_radius).collect();
    let green_avg: Vec<f64> = output.accepted.iter().map(|r| r.green.average_radius).collect();
    writeln!(out, "Results")?;
    writeln!(out, "Detections: {}, fitted: {}, failed: {}, accepted: {}",
        output.num_detections, output.records.len(), output.num_failed_fits, output.accepted.len())?;
    writeln!(out, "The mean radius of {}: {} px", names.red, mean_or_nan(&red_avg))?;
    writeln!(out, "The mean radius of {}: {} px", names.green, mean_or_nan(&green_avg))?;

    Ok(())
}

fn write_text_file<F>(output_dir: &str, file_name: &str, contents: F) -> Result<(), ReportError>
where F: FnOnce(&mut std::io::BufWriter<std::fs::File>) -> std::io::Result<()> {
    let full_name = path_str(output_dir, file_name);
    let to_err = |err| ReportError::Io{ file_name: full_name.clone(), err };

    let file = std::fs::File::create(&full_name).map_err(to_err)?;
    let mut writer = std::io::BufWriter::new(file);
    contents(&mut writer).map_err(to_err)?;
    writer.flush().map_err(to_err)
}

fn save_image<F>(output_dir: &str, file_name: &str, save: F) -> Result<(), ReportError>
where F: FnOnce(&str) -> Result<(), ImageError> {
    let full_name = path_str(output_dir, file_name);
    save(&full_name).map_err(|err| ReportError::Image{ file_name: full_name.clone(), err })
}

/// Writes all output files into `output_dir` (which must exist).
pub fn write_all(
    output_dir: &str,
    config: &PipelineConfig,
    output: &PipelineOutput,
    image_names: &[String],
    version: &str
) -> Result<(), ReportError> {
    let names = &config.names;

    write_text_file(output_dir, ACCEPTED_RECORDS_FILE, |w| write_records_csv(w, &output.accepted, names, image_names))?;
    write_text_file(output_dir, ALL_RECORDS_FILE, |w| write_records_csv(w, &output.records, names, image_names))?;
    write_text_file(output_dir, SUMMARY_FILE, |w| write_summary_csv(w, &measure::summarize_records(&output.accepted, names)))?;
    write_text_file(output_dir, PARAMETERS_FILE, |w| write_parameters(w, config, output, version))?;

    save_image(output_dir, &format!("{}_montages.png", names.red), |f| output.red_montage.export(f))?;
    save_image(output_dir, &format!("{}_montages.png", names.green), |f| output.green_montage.export(f))?;

    let red_avg: Vec<f64> = output.accepted.iter().map(|r| r.red.average_radius).collect();
    let green_avg: Vec<f64> = output.accepted.iter().map(|r| r.green.average_radius).collect();
    save_image(output_dir, RADIUS_PLOT_FILE, |f| plot::save_radius_profile(f, &red_avg, &green_avg))?;

    Ok(())
}
