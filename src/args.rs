//
// ringfit - Ring Gaussian measurement of centrioles in dual-channel microscopy images
// Copyright (c) 2020 Filip Szczerek <ga.software@yahoo.com>
//
// This project is licensed under the terms of the MIT license
// (see the LICENSE file for details).
//

//!
//! Command-line options definitions and parsing.
//!

use crate::detect::BoxBounds;
use crate::logging;
use strum::IntoEnumIterator;

pub mod cmdline {
    pub const HELP:            &str = "help";
    pub const INPUT_DIRECTORY: &str = "input_dir";
    pub const OUTPUT_DIRECTORY:&str = "output_dir";
    pub const RED_NAME:        &str = "red_name";
    pub const GREEN_NAME:      &str = "green_name";
    pub const ECCENTRICITY:    &str = "eccentricity";
    pub const RED_RADIUS:      &str = "red_radius";
    pub const GREEN_RADIUS:    &str = "green_radius";
    pub const RED_INIT:        &str = "red_init";
    pub const GREEN_INIT:      &str = "green_init";
    pub const WINDOW_SIZE:     &str = "window_size";
    pub const MONTAGE_CELL:    &str = "montage_cell";
    pub const MONTAGE_COLUMNS: &str = "montage_columns";
    pub const MARKER_COLOR:    &str = "marker_color";
    pub const BOX_BOUNDS:      &str = "box_bounds";
    pub const FIT_TIMEOUT_MS:  &str = "fit_timeout_ms";
    pub const LOG_LEVEL:       &str = "log_level";
}

pub mod defaults {
    pub const ECCENTRICITY: f64 = 1.2;
    pub const RED_RADIUS: [f64; 2] = [0.5, 2.5];
    pub const GREEN_RADIUS: [f64; 2] = [3.5, 4.5];
    pub const RED_INIT: [f64; 8] = [13.0, 13.0, 2.0, 2.0, 0.01, 2.0, 300.0, 100.0];
    pub const GREEN_INIT: [f64; 8] = [14.0, 14.0, 5.0, 5.0, 0.01, 4.0, 300.0, 100.0];
    pub const WINDOW_SIZE: u32 = 28;
    pub const MONTAGE_CELL: u32 = 30;
    pub const MONTAGE_COLUMNS: u32 = 20;
    pub const MARKER_COLOR: [u16; 3] = [0, 0, 255];
    pub const FIT_TIMEOUT_MS: u64 = 5000;
    pub const RESULTS_SUBDIR: &str = "Results";
}

#[derive(Debug)]
pub struct Configuration {
    input_dir: String,
    output_dir: Option<String>,
    red_name: String,
    green_name: String,
    eccentricity: f64,
    red_radius: [f64; 2],
    green_radius: [f64; 2],
    red_init: [f64; 8],
    green_init: [f64; 8],
    window_size: u32,
    montage_cell: u32,
    montage_columns: u32,
    marker_color: [u16; 3],
    box_bounds: BoxBounds,
    fit_timeout_ms: u64,
    log_level: logging::Level
}

impl Configuration {
    pub fn input_dir(&self) -> &str { &self.input_dir }
    pub fn output_dir(&self) -> &Option<String> { &self.output_dir }
    pub fn red_name(&self) -> &str { &self.red_name }
    pub fn green_name(&self) -> &str { &self.green_name }
    pub fn eccentricity(&self) -> f64 { self.eccentricity }
    /// Returns (min, max).
    pub fn red_radius(&self) -> (f64, f64) { (self.red_radius[0], self.red_radius[1]) }
    /// Returns (min, max).
    pub fn green_radius(&self) -> (f64, f64) { (self.green_radius[0], self.green_radius[1]) }
    pub fn red_init(&self) -> &[f64; 8] { &self.red_init }
    pub fn green_init(&self) -> &[f64; 8] { &self.green_init }
    pub fn window_size(&self) -> u32 { self.window_size }
    pub fn montage_cell(&self) -> u32 { self.montage_cell }
    pub fn montage_columns(&self) -> u32 { self.montage_columns }
    pub fn marker_color(&self) -> [u16; 3] { self.marker_color }
    pub fn box_bounds(&self) -> BoxBounds { self.box_bounds }
    /// 0 means no limit.
    pub fn fit_timeout_ms(&self) -> u64 { self.fit_timeout_ms }
    pub fn log_level(&self) -> logging::Level { self.log_level }
}

impl From<logging::Level> for &str {
    fn from(level: logging::Level) -> &'static str {
        match level {
            logging::Level::Quiet   => "quiet",
            logging::Level::Info    => "info",
            logging::Level::Verbose => "verbose"
        }
    }
}

impl std::str::FromStr for logging::Level {
    type Err = ();
    fn from_str(s: &str) -> Result<logging::Level, ()> {

        for level in logging::Level::iter() {
            if s == Into::<&str>::into(level) {
                return Ok(level);
            }
        }

        Err(())
    }
}

impl From<BoxBounds> for &str {
    fn from(bounds: BoxBounds) -> &'static str {
        match bounds {
            BoxBounds::PerAxis          => "per-axis",
            BoxBounds::LargestDimension => "largest-dim"
        }
    }
}

impl std::str::FromStr for BoxBounds {
    type Err = ();
    fn from_str(s: &str) -> Result<BoxBounds, ()> {
        for bounds in BoxBounds::iter() {
            if s == Into::<&str>::into(bounds) {
                return Ok(bounds);
            }
        }

        Err(())
    }
}

pub fn print_help() {
    println!(
r#"Command-line options:

  --{} <directory>

    Directory containing the input images (*.tif, *.tiff). Each image has the red and green channels
    to measure and the annotation markers drawn in the blue channel color given by --{}.


  --{} <name>
  --{} <name>

    Names of the red and green channel (e.g. the imaged proteins); used in output file and column names.


  --{} <directory>

    Output directory for results. Default: <input directory>/{}.


  --{} <value>

    Upper (exclusive) limit of the major/minor radius ratio in both channels. Default: {}.


  --{} <min> <max>
  --{} <min> <max>

    Exclusive limits of the average ring radius (pixels) in the red and green channel.
    Defaults: {} {} (red), {} {} (green).


  --{} <x0> <y0> <ma> <mi> <angle> <width> <amplitude> <background>
  --{} <x0> <y0> <ma> <mi> <angle> <width> <amplitude> <background>

    Initial ring parameters for fitting (position in window pixels, semi-axes, orientation in radians,
    ring width, amplitude, background).
    Defaults: {:?} (red), {:?} (green).


  --{} <pixels>

    Size of the square window cut out around each marker. Default: {}.


  --{} <pixels>

    Size of a montage cell; must be at least window size + 2. Default: {}.


  --{} <count>

    Number of cells per montage row. Default: {}.


  --{} <r> <g> <b>

    Marker color (raw channel values). Default: {} {} {}.


  --{} <{}|{}>

    How marker windows are checked against the image: each axis against its own dimension,
    or both against the larger dimension. Default: {}.


  --{} <milliseconds>

    Time limit of a single fit; 0 disables the limit. Default: {}.


  --{} <{}|{}|{}>

    Chooses the amount of messages to print during processing.

"#,
        cmdline::INPUT_DIRECTORY, cmdline::MARKER_COLOR,

        cmdline::RED_NAME,
        cmdline::GREEN_NAME,

        cmdline::OUTPUT_DIRECTORY, defaults::RESULTS_SUBDIR,

        cmdline::ECCENTRICITY, defaults::ECCENTRICITY,

        cmdline::RED_RADIUS,
        cmdline::GREEN_RADIUS,
        defaults::RED_RADIUS[0], defaults::RED_RADIUS[1], defaults::GREEN_RADIUS[0], defaults::GREEN_RADIUS[1],

        cmdline::RED_INIT,
        cmdline::GREEN_INIT,
        defaults::RED_INIT, defaults::GREEN_INIT,

        cmdline::WINDOW_SIZE, defaults::WINDOW_SIZE,

        cmdline::MONTAGE_CELL, defaults::MONTAGE_CELL,

        cmdline::MONTAGE_COLUMNS, defaults::MONTAGE_COLUMNS,

        cmdline::MARKER_COLOR, defaults::MARKER_COLOR[0], defaults::MARKER_COLOR[1], defaults::MARKER_COLOR[2],

        cmdline::BOX_BOUNDS,
        Into::<&str>::into(BoxBounds::PerAxis),
        Into::<&str>::into(BoxBounds::LargestDimension),
        Into::<&str>::into(BoxBounds::PerAxis),

        cmdline::FIT_TIMEOUT_MS, defaults::FIT_TIMEOUT_MS,

        cmdline::LOG_LEVEL,
        Into::<&str>::into(logging::Level::Quiet),
        Into::<&str>::into(logging::Level::Info),
        Into::<&str>::into(logging::Level::Verbose)
    );
}

/// Returns the value of a single-valued option of type `T`.
fn get_option_value<T: std::str::FromStr>(
    option: &str,
    option_values: &std::collections::HashMap::<String, Vec<String>>
) -> Result<Option<T>, ()> {
    match option_values.get(option) {
        None => Ok(None),
        Some(vals) => if vals.is_empty() {
            eprintln!("Value missing for option {}.", option);
            Err(())
        } else if vals.len() > 1 {
            eprintln!("Too many values for option {}.", option);
            Err(())
        } else {
            match vals[0].parse::<T>() {
                Ok(value) => Ok(Some(value)),
                Err(_) => {
                    eprintln!("Invalid value for option {}: {}.", option, vals[0]);
                    Err(())
                }
            }
        }
    }
}

/// Returns the values of an option taking exactly `N` values of type `T`.
fn get_option_values<T: std::str::FromStr + Copy + Default, const N: usize>(
    option: &str,
    option_values: &std::collections::HashMap::<String, Vec<String>>
) -> Result<Option<[T; N]>, ()> {
    match option_values.get(option) {
        None => Ok(None),
        Some(vals) => if vals.len() != N {
            eprintln!("Option {} expects {} value(s), got {}.", option, N, vals.len());
            Err(())
        } else {
            let mut result = [T::default(); N];
            for (dest, val) in result.iter_mut().zip(vals.iter()) {
                match val.parse::<T>() {
                    Ok(value) => *dest = value,
                    Err(_) => {
                        eprintln!("Invalid value for option {}: {}.", option, val);
                        return Err(());
                    }
                }
            }
            Ok(Some(result))
        }
    }
}

/// Returns Ok(None) if help was requested.
pub fn parse_command_line<I: Iterator<Item=String>>(stream: I) -> Result<Option<Configuration>, ()> {
    let allowed_options = vec![
     cmdline::HELP,
     cmdline::INPUT_DIRECTORY,
     cmdline::OUTPUT_DIRECTORY,
     cmdline::RED_NAME,
     cmdline::GREEN_NAME,
     cmdline::ECCENTRICITY,
     cmdline::RED_RADIUS,
     cmdline::GREEN_RADIUS,
     cmdline::RED_INIT,
     cmdline::GREEN_INIT,
     cmdline::WINDOW_SIZE,
     cmdline::MONTAGE_CELL,
     cmdline::MONTAGE_COLUMNS,
     cmdline::MARKER_COLOR,
     cmdline::BOX_BOUNDS,
     cmdline::FIT_TIMEOUT_MS,
     cmdline::LOG_LEVEL
    ];

    // key: option name
    let mut option_values = std::collections::HashMap::<String, Vec<String>>::new();

    let mut current: Option<&mut Vec<String>> = None;

    for arg in stream.skip(1) /*skip the binary name*/ {
        if arg.starts_with("--") {
            match &arg[2..] {
                cmdline::HELP => { print_help(); return Ok(None); },
                x if !allowed_options.contains(&x) => {
                    eprintln!("Unknown command-line option: {}.", x); return Err(());
                },
                opt => current = Some(option_values.entry(opt.to_string()).or_insert(vec![])),
            }
        } else {
            match current.as_mut() {
                None => {
                    eprintln!("Unexpected value: {}.", arg);
                    return Err(());
                },
                Some(values) => values.push(arg)
            }
        }
    }

    let input_dir = match get_option_value::<String>(cmdline::INPUT_DIRECTORY, &option_values)? {
        Some(dir) => dir,
        None => { eprintln!("Input directory not specified."); return Err(()); }
    };

    let output_dir = get_option_value::<String>(cmdline::OUTPUT_DIRECTORY, &option_values)?;

    let red_name = match get_option_value::<String>(cmdline::RED_NAME, &option_values)? {
        Some(name) => name,
        None => { eprintln!("Red channel name not specified."); return Err(()); }
    };

    let green_name = match get_option_value::<String>(cmdline::GREEN_NAME, &option_values)? {
        Some(name) => name,
        None => { eprintln!("Green channel name not specified."); return Err(()); }
    };

    let eccentricity = get_option_value::<f64>(cmdline::ECCENTRICITY, &option_values)?
        .unwrap_or(defaults::ECCENTRICITY);

    let red_radius = get_option_values::<f64, 2>(cmdline::RED_RADIUS, &option_values)?
        .unwrap_or(defaults::RED_RADIUS);

    let green_radius = get_option_values::<f64, 2>(cmdline::GREEN_RADIUS, &option_values)?
        .unwrap_or(defaults::GREEN_RADIUS);

    let red_init = get_option_values::<f64, 8>(cmdline::RED_INIT, &option_values)?
        .unwrap_or(defaults::RED_INIT);

    let green_init = get_option_values::<f64, 8>(cmdline::GREEN_INIT, &option_values)?
        .unwrap_or(defaults::GREEN_INIT);

    let window_size = get_option_value::<u32>(cmdline::WINDOW_SIZE, &option_values)?
        .unwrap_or(defaults::WINDOW_SIZE);

    let montage_cell = get_option_value::<u32>(cmdline::MONTAGE_CELL, &option_values)?
        .unwrap_or(defaults::MONTAGE_CELL);

    let montage_columns = get_option_value::<u32>(cmdline::MONTAGE_COLUMNS, &option_values)?
        .unwrap_or(defaults::MONTAGE_COLUMNS);

    let marker_color = get_option_values::<u16, 3>(cmdline::MARKER_COLOR, &option_values)?
        .unwrap_or(defaults::MARKER_COLOR);

    let box_bounds = get_option_value::<BoxBounds>(cmdline::BOX_BOUNDS, &option_values)?
        .unwrap_or(BoxBounds::PerAxis);

    let fit_timeout_ms = get_option_value::<u64>(cmdline::FIT_TIMEOUT_MS, &option_values)?
        .unwrap_or(defaults::FIT_TIMEOUT_MS);

    let log_level = get_option_value::<logging::Level>(cmdline::LOG_LEVEL, &option_values)?
        .unwrap_or(logging::Level::Info);

    Ok(Some(Configuration{
        input_dir,
        output_dir,
        red_name,
        green_name,
        eccentricity,
        red_radius,
        green_radius,
        red_init,
        green_init,
        window_size,
        montage_cell,
        montage_columns,
        marker_color,
        box_bounds,
        fit_timeout_ms,
        log_level
    }))
}
