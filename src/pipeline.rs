//
// ringfit - Ring Gaussian measurement of centrioles in dual-channel microscopy images
// Copyright (c) 2020 Filip Szczerek <ga.software@yahoo.com>
//
// This project is licensed under the terms of the MIT license
// (see the LICENSE file for details).
//

//!
//! Measurement pipeline: detection, cropping, fitting, montage and record accumulation.
//!

use crate::detect::{self, BoxBounds, WindowSize};
use crate::image::Image;
use crate::logging::Logger;
use crate::measure::{self, AcceptanceCriteria, ChannelMeasurement, ChannelNames, MeasurementRecord};
use crate::montage::{self, GridCounter, MontageCanvas};
use crate::ring::{CoordinateGrid, RingGaussian};
use crate::ring::fit::{FitError, FitResult, RingFitter};
use rayon::prelude::*;
use std::time::Duration;

const RED_CHANNEL: usize = 0;
const GREEN_CHANNEL: usize = 1;

#[derive(Debug, PartialEq)]
pub enum ConfigError {
    EmptyChannelName,
    IdenticalChannelNames(String),
    /// The eccentricity threshold must be finite and greater than 1.
    InvalidEccentricity(f64),
    InvalidRadiusRange{ channel: String, min: f64, max: f64 },
    InvalidInitialParameters(String),
    ZeroWindowSize,
    /// A montage cell must hold the window plus a 1-pixel margin on each side.
    CellTooSmall{ cell: u32, window: u32 },
    ZeroMontageColumns
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::EmptyChannelName => write!(f, "channel names must not be empty"),
            ConfigError::IdenticalChannelNames(name) => write!(f, "both channels are named \"{}\"", name),
            ConfigError::InvalidEccentricity(e) => write!(f, "invalid eccentricity threshold: {} (expected > 1)", e),
            ConfigError::InvalidRadiusRange{ channel, min, max } =>
                write!(f, "invalid radius range for {}: {} - {} (expected min < max)", channel, min, max),
            ConfigError::InvalidInitialParameters(channel) =>
                write!(f, "initial ring parameters for {} must be finite", channel),
            ConfigError::ZeroWindowSize => write!(f, "window size must be positive"),
            ConfigError::CellTooSmall{ cell, window } =>
                write!(f, "montage cell size {} is too small for window size {} (need at least {})", cell, window, window + 2),
            ConfigError::ZeroMontageColumns => write!(f, "number of montage columns must be positive")
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Clone, Debug)]
pub struct PipelineConfig {
    pub names: ChannelNames,
    /// Annotation color (R, G, B), compared with raw channel values.
    pub marker_color: [u16; 3],
    /// Side of the square window cut out around each marker.
    pub window_size: u32,
    pub box_bounds: BoxBounds,
    pub montage_cell: u32,
    pub montage_columns: u32,
    pub red_initial: RingGaussian,
    pub green_initial: RingGaussian,
    pub criteria: AcceptanceCriteria,
    pub fit_timeout: Option<Duration>,
    /// Value of the frame drawn around accepted detections in the montages.
    pub highlight_value: f64
}

impl PipelineConfig {
    pub fn new(names: ChannelNames) -> PipelineConfig {
        PipelineConfig{
            names,
            marker_color: [0, 0, 255],
            window_size: 28,
            box_bounds: BoxBounds::PerAxis,
            montage_cell: 30,
            montage_columns: 20,
            red_initial: RingGaussian::from_array(&[13.0, 13.0, 2.0, 2.0, 0.01, 2.0, 300.0, 100.0]),
            green_initial: RingGaussian::from_array(&[14.0, 14.0, 5.0, 5.0, 0.01, 4.0, 300.0, 100.0]),
            criteria: AcceptanceCriteria::default(),
            fit_timeout: Some(Duration::from_millis(5000)),
            highlight_value: 255.0
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.names.red.is_empty() || self.names.green.is_empty() {
            return Err(ConfigError::EmptyChannelName);
        }
        if self.names.red == self.names.green {
            return Err(ConfigError::IdenticalChannelNames(self.names.red.clone()));
        }

        let e = self.criteria.max_eccentricity;
        if !e.is_finite() || e <= 1.0 {
            return Err(ConfigError::InvalidEccentricity(e));
        }

        for (channel, range) in &[(&self.names.red, self.criteria.red_radius), (&self.names.green, self.criteria.green_radius)] {
            if !(range.min < range.max) {
                return Err(ConfigError::InvalidRadiusRange{ channel: channel.to_string(), min: range.min, max: range.max });
            }
        }

        if !self.red_initial.is_finite() {
            return Err(ConfigError::InvalidInitialParameters(self.names.red.clone()));
        }
        if !self.green_initial.is_finite() {
            return Err(ConfigError::InvalidInitialParameters(self.names.green.clone()));
        }

        if self.window_size == 0 {
            return Err(ConfigError::ZeroWindowSize);
        }
        if self.montage_cell < self.window_size + 2 {
            return Err(ConfigError::CellTooSmall{ cell: self.montage_cell, window: self.window_size });
        }
        if self.montage_columns == 0 {
            return Err(ConfigError::ZeroMontageColumns);
        }

        Ok(())
    }
}

/// Results of a whole run.
pub struct PipelineOutput {
    /// All successfully fitted detections, in detection order.
    pub records: Vec<MeasurementRecord>,
    /// Records passing the acceptance criteria.
    pub accepted: Vec<MeasurementRecord>,
    /// Montages with accepted detections highlighted.
    pub red_montage: MontageCanvas,
    pub green_montage: MontageCanvas,
    pub num_images: usize,
    pub num_detections: usize,
    pub num_failed_fits: usize
}

/// Patches of one detection; `None` if the window does not fit in the image.
type DetectionPatches = Option<(Image, Image)>;

type FitPair = (Result<FitResult, FitError>, Result<FitResult, FitError>);

pub struct MeasurementPipeline<'a> {
    config: PipelineConfig,
    logger: &'a Logger,
    grid: CoordinateGrid,
    fitter: RingFitter,
    counter: GridCounter,
    red_montage: MontageCanvas,
    green_montage: MontageCanvas,
    records: Vec<MeasurementRecord>,
    /// Index of the next input image, counting skipped ones.
    next_image: usize,
    num_images: usize,
    num_detections: usize,
    num_failed_fits: usize
}

impl<'a> MeasurementPipeline<'a> {
    pub fn new(config: PipelineConfig, logger: &'a Logger) -> Result<MeasurementPipeline<'a>, ConfigError> {
        config.validate()?;

        Ok(MeasurementPipeline{
            grid: CoordinateGrid::new(config.window_size, config.window_size),
            fitter: RingFitter::new(config.fit_timeout),
            counter: GridCounter::new(config.montage_columns),
            red_montage: MontageCanvas::new(config.montage_cell, config.montage_columns),
            green_montage: MontageCanvas::new(config.montage_cell, config.montage_columns),
            records: vec![],
            next_image: 0,
            num_images: 0,
            num_detections: 0,
            num_failed_fits: 0,
            config,
            logger
        })
    }

    /// Loads and processes an image; an image which cannot be loaded is skipped with a warning.
    pub fn process_file(&mut self, file_name: &str) {
        match Image::load(file_name) {
            Ok(image) => {
                self.logger.info(&format!("Processing {}", file_name));
                let num_found = self.process_image(&image);
                self.logger.verbose(&format!("  {} detection(s)", num_found));
            },
            Err(err) => {
                self.logger.warning(&format!("skipping {}: {}", file_name, err));
                self.next_image += 1;
            }
        }
    }

    /// Processes one RGB image; returns the number of detections.
    pub fn process_image(&mut self, image: &Image) -> usize {
        let image_index = self.next_image;
        self.next_image += 1;
        self.num_images += 1;

        let boxes = detect::detect_boxes(
            image,
            self.config.marker_color,
            WindowSize::square(self.config.window_size),
            self.config.box_bounds
        );
        if boxes.is_empty() {
            self.logger.warning(&format!("no markers found in image #{}", image_index + 1));
            return 0;
        }

        let red = image.extract_channel(RED_CHANNEL);
        let green = image.extract_channel(GREEN_CHANNEL);

        let patches: Vec<DetectionPatches> = boxes.iter()
            .map(|bbox| {
                let rect = bbox.to_rect();
                match (red.fragment(&rect), green.fragment(&rect)) {
                    (Some(r), Some(g)) => Some((r, g)),
                    _ => None
                }
            })
            .collect();

        let fitter = &self.fitter;
        let grid = &self.grid;
        let (red_initial, green_initial) = (self.config.red_initial, self.config.green_initial);
        let fits: Vec<Option<FitPair>> = patches.par_iter()
            .map(|p| p.as_ref().map(|(r, g)| (
                fitter.fit(r, grid, &red_initial),
                fitter.fit(g, grid, &green_initial)
            )))
            .collect();

        for (bbox, (p, fit)) in boxes.iter().zip(patches.iter().zip(fits.into_iter())) {
            let detection = self.num_detections;
            self.num_detections += 1;

            let (col, row) = self.counter.position();
            if let Some((red_patch, green_patch)) = p {
                self.red_montage.place(red_patch, col, row);
                self.green_montage.place(green_patch, col, row);
            }
            self.counter.advance();

            let (col, row) = self.counter.position();
            match fit {
                None => {
                    self.num_failed_fits += 1;
                    self.logger.warning(&format!(
                        "detection {}: window ({}, {})-({}, {}) exceeds image bounds",
                        detection, bbox.xmin, bbox.ymin, bbox.xmax, bbox.ymax
                    ));
                },

                Some((Ok(red_fit), Ok(green_fit))) => {
                    self.red_montage.place(&red_fit.params.render(&self.grid), col, row);
                    self.green_montage.place(&green_fit.params.render(&self.grid), col, row);
                    self.logger.verbose(&format!(
                        "  detection {}: {}: {} ({} iter., chi2 {:.3e}{}); {}: {} ({} iter., chi2 {:.3e}{})",
                        detection,
                        self.config.names.red, red_fit.params, red_fit.iterations, red_fit.chi2,
                        if red_fit.converged { "" } else { ", not converged" },
                        self.config.names.green, green_fit.params, green_fit.iterations, green_fit.chi2,
                        if green_fit.converged { "" } else { ", not converged" }
                    ));
                    self.records.push(MeasurementRecord{
                        detection,
                        image_index,
                        red: ChannelMeasurement::from_fit(&red_fit.params),
                        green: ChannelMeasurement::from_fit(&green_fit.params)
                    });
                },

                Some((red_result, green_result)) => {
                    self.num_failed_fits += 1;
                    for (name, result) in &[(&self.config.names.red, red_result), (&self.config.names.green, green_result)] {
                        if let Err(err) = result {
                            self.logger.warning(&format!("detection {}: {} fit failed: {}", detection, name, err));
                        }
                    }
                }
            }
            self.counter.advance();
        }

        boxes.len()
    }

    /// Applies the acceptance criteria and highlights accepted detections in the montages.
    pub fn finish(self) -> PipelineOutput {
        let accepted = measure::filter_records(&self.records, &self.config.criteria);

        let mut red_montage = self.red_montage;
        let mut green_montage = self.green_montage;
        let columns = self.config.montage_columns;
        for record in &accepted {
            let fields: Vec<String> = record.fields(&self.config.names).iter()
                .map(|(name, value)| format!("{} = {:.3}", name, value))
                .collect();
            self.logger.verbose(&format!("accepted detection {}: {}", record.detection, fields.join(", ")));

            let raw_cell = montage::cell_position(2 * record.detection, columns);
            let fitted_cell = montage::cell_position(2 * record.detection + 1, columns);
            red_montage.highlight_pair(raw_cell, fitted_cell, self.config.highlight_value);
            green_montage.highlight_pair(raw_cell, fitted_cell, self.config.highlight_value);
        }

        PipelineOutput{
            records: self.records,
            accepted,
            red_montage,
            green_montage,
            num_images: self.num_images,
            num_detections: self.num_detections,
            num_failed_fits: self.num_failed_fits
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::PixelFormat;
    use crate::logging::Level;

    const SIZE: u32 = 64;

    fn names() -> ChannelNames { ChannelNames{ red: "Cep63".to_string(), green: "Cep152".to_string() } }

    /// Renders the rings into R and G over the whole image, then draws a blue square outline
    /// with corners (16, 16) and (47, 47). Its centroid (31.5, 31.5) rounds to (32, 32),
    /// so the 28x28 window starts at (18, 18).
    fn synthetic_image(red_ring: &RingGaussian, green_ring: &RingGaussian, with_marker: bool) -> Image {
        const WINDOW_ORIGIN: f64 = 18.0;
        let mut values = vec![0u16; (SIZE * SIZE * 3) as usize];
        for y in 0..SIZE {
            for x in 0..SIZE {
                let idx = 3 * (y * SIZE + x) as usize;
                let (px, py) = (x as f64 - WINDOW_ORIGIN, y as f64 - WINDOW_ORIGIN);
                values[idx] = red_ring.value(px, py).round() as u16;
                values[idx + 1] = green_ring.value(px, py).round() as u16;

                let on_outline = (x == 16 || x == 47) && (16..=47).contains(&y)
                    || (y == 16 || y == 47) && (16..=47).contains(&x);
                if with_marker && on_outline {
                    values[idx] = 0;
                    values[idx + 1] = 0;
                    values[idx + 2] = 255;
                }
            }
        }

        Image::new_from_pixels(SIZE, SIZE, PixelFormat::RGB16, values)
    }

    fn red_ring() -> RingGaussian {
        RingGaussian{ x0: 13.4, y0: 12.7, ma: 2.0, mi: 2.0, angle: 0.0, width: 2.0, amplitude: 300.0, background: 100.0 }
    }

    fn green_ring() -> RingGaussian {
        RingGaussian{ x0: 14.3, y0: 13.8, ma: 4.0, mi: 4.0, angle: 0.0, width: 3.5, amplitude: 300.0, background: 100.0 }
    }

    #[test]
    fn given_single_marker_measure_one_record() {
        let logger = Logger::new(Level::Quiet);
        let mut pipeline = MeasurementPipeline::new(PipelineConfig::new(names()), &logger).unwrap();

        assert_eq!(1, pipeline.process_image(&synthetic_image(&red_ring(), &green_ring(), true)));
        let output = pipeline.finish();

        assert_eq!(1, output.records.len());
        assert_eq!(0, output.num_failed_fits);
        let record = &output.records[0];
        assert_eq!(0, record.detection);
        assert!((record.red.average_radius - 2.0).abs() < 0.2);
        assert!((record.red.eccentricity - 1.0).abs() < 0.05);
        assert!((record.green.average_radius - 4.0).abs() < 0.2);

        assert_eq!(1, output.accepted.len());

        // raw red patch in cell (0, 0), fitted rendering in cell (1, 0), one frame around both
        let red_montage = output.red_montage.image();
        assert_eq!((600, 30), (red_montage.width(), red_montage.height()));
        assert_eq!(255.0, red_montage.value(0, 0, 0));
        assert_eq!(255.0, red_montage.value(59, 29, 0));
        assert_eq!(0.0, red_montage.value(60, 0, 0));
        let raw_value = red_montage.value(1 + 13, 1 + 13, 0);
        assert!(raw_value > 100.0);
        assert!((red_montage.value(30 + 1 + 13, 1 + 13, 0) - raw_value).abs() < 30.0);
    }

    #[test]
    fn given_no_markers_produce_no_records() {
        let logger = Logger::new(Level::Quiet);
        let mut pipeline = MeasurementPipeline::new(PipelineConfig::new(names()), &logger).unwrap();

        assert_eq!(0, pipeline.process_image(&synthetic_image(&red_ring(), &green_ring(), false)));
        let output = pipeline.finish();

        assert!(output.records.is_empty());
        assert!(output.accepted.is_empty());
        assert_eq!(1, output.num_images);
        assert_eq!(0, output.num_detections);
        assert!(output.red_montage.image().pixels::<f64>().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn given_strict_criteria_keep_record_but_do_not_accept() {
        let logger = Logger::new(Level::Quiet);
        let mut config = PipelineConfig::new(names());
        config.criteria.red_radius.max = 1.5;
        let mut pipeline = MeasurementPipeline::new(config, &logger).unwrap();

        pipeline.process_image(&synthetic_image(&red_ring(), &green_ring(), true));
        let output = pipeline.finish();

        assert_eq!(1, output.records.len());
        assert!(output.accepted.is_empty());
        assert_eq!(0.0, output.red_montage.image().value(0, 0, 0));
    }

    #[test]
    fn given_two_images_continue_montage_layout() {
        let logger = Logger::new(Level::Quiet);
        let mut config = PipelineConfig::new(names());
        config.montage_columns = 3;
        let mut pipeline = MeasurementPipeline::new(config, &logger).unwrap();

        let image = synthetic_image(&red_ring(), &green_ring(), true);
        pipeline.process_image(&image);
        pipeline.process_image(&image);
        let output = pipeline.finish();

        assert_eq!(2, output.num_images);
        assert_eq!(vec![0, 1], output.records.iter().map(|r| r.detection).collect::<Vec<_>>());
        assert_eq!(vec![0, 1], output.records.iter().map(|r| r.image_index).collect::<Vec<_>>());
        // second pair occupies cells (2, 0) and (0, 1): framed separately
        assert_eq!(2, output.red_montage.rows());
        assert_eq!(255.0, output.red_montage.image().value(60, 0, 0));
        assert_eq!(255.0, output.red_montage.image().value(0, 30, 0));
        assert_eq!(255.0, output.red_montage.image().value(29, 59, 0));
    }

    #[test]
    fn when_file_cannot_be_loaded_skip_but_advance_image_index() {
        let logger = Logger::new(Level::Quiet);
        let mut pipeline = MeasurementPipeline::new(PipelineConfig::new(names()), &logger).unwrap();

        pipeline.process_file("/nonexistent-dir/image 1.tif");
        pipeline.process_image(&synthetic_image(&red_ring(), &green_ring(), true));
        let output = pipeline.finish();

        assert_eq!(1, output.num_images);
        assert_eq!(1, output.records.len());
        assert_eq!(1, output.records[0].image_index);
        assert_eq!(0, output.records[0].detection);
    }

    #[test]
    fn given_16_bit_file_find_full_scale_marker() {
        let file_name = std::env::temp_dir().join(format!("ringfit-marker16-{}.tif", std::process::id()));
        let mut values = vec![0u16; (SIZE * SIZE * 3) as usize];
        for i in 16..=47usize {
            for &(x, y) in &[(i, 16usize), (i, 47), (16, i), (47, i)] {
                values[3 * (y * SIZE as usize + x) + 2] = 65535;
            }
        }
        ::image::ImageBuffer::<::image::Rgb<u16>, Vec<u16>>::from_raw(SIZE, SIZE, values).unwrap()
            .save_with_format(&file_name, ::image::ImageFormat::Tiff).unwrap();

        let logger = Logger::new(Level::Quiet);
        let mut pipeline = MeasurementPipeline::new(PipelineConfig::new(names()), &logger).unwrap();
        pipeline.process_file(file_name.to_str().unwrap());
        std::fs::remove_file(&file_name).unwrap();
        let output = pipeline.finish();

        assert_eq!(1, output.num_images);
        assert_eq!(1, output.num_detections);
    }

    #[test]
    fn when_cell_smaller_than_window_fail() {
        let mut config = PipelineConfig::new(names());
        config.montage_cell = 29;
        assert_eq!(Err(ConfigError::CellTooSmall{ cell: 29, window: 28 }), config.validate());
    }

    #[test]
    fn when_radius_range_empty_fail() {
        let mut config = PipelineConfig::new(names());
        config.criteria.green_radius.min = 4.5;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidRadiusRange{ .. })));
    }

    #[test]
    fn when_channel_names_invalid_fail() {
        let config = PipelineConfig::new(ChannelNames{ red: "".to_string(), green: "Cep152".to_string() });
        assert_eq!(Err(ConfigError::EmptyChannelName), config.validate());

        let config = PipelineConfig::new(ChannelNames{ red: "Cep63".to_string(), green: "Cep63".to_string() });
        assert!(matches!(config.validate(), Err(ConfigError::IdenticalChannelNames(_))));

        let mut config = PipelineConfig::new(names());
        config.criteria.max_eccentricity = 1.0;
        assert_eq!(Err(ConfigError::InvalidEccentricity(1.0)), config.validate());
    }

    #[test]
    fn given_default_config_validate() {
        assert_eq!(Ok(()), PipelineConfig::new(names()).validate());
    }
}
