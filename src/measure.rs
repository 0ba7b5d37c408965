//
// ringfit - Ring Gaussian measurement of centrioles in dual-channel microscopy images
// Copyright (c) 2020 Filip Szczerek <ga.software@yahoo.com>
//
// This project is licensed under the terms of the MIT license
// (see the LICENSE file for details).
//

//!
//! Measurement records, acceptance filters and summary statistics.
//!

use crate::ring::RingGaussian;

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ChannelNames {
    pub red: String,
    pub green: String
}

/// Descriptors of one fitted ring.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ChannelMeasurement {
    pub major_radius: f64,
    pub minor_radius: f64,
    pub ring_width: f64,
    pub eccentricity: f64,
    pub average_radius: f64
}

impl ChannelMeasurement {
    pub fn from_fit(params: &RingGaussian) -> ChannelMeasurement {
        let (major_radius, minor_radius) = params.sorted_radii();
        ChannelMeasurement{
            major_radius,
            minor_radius,
            ring_width: params.width.abs(),
            eccentricity: major_radius / minor_radius,
            average_radius: 0.5 * (major_radius + minor_radius)
        }
    }
}

/// Measurements of one detection in both channels.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct MeasurementRecord {
    /// Sequence number of the detection within the run; also the index of its cell pair in the montage.
    pub detection: usize,
    /// Index of the source image in the processed list.
    pub image_index: usize,
    pub red: ChannelMeasurement,
    pub green: ChannelMeasurement
}

const FIELD_SUFFIXES: [&str; 5] = ["Major Radius", "Minor Radius", "Ring Width", "Eccentricity", "Average Radius"];

/// Returns field names in table order: radii and widths of both channels, then eccentricities, then average radii.
pub fn field_names(names: &ChannelNames) -> Vec<String> {
    let field = |channel: &str, suffix: usize| format!("{} {}", channel, FIELD_SUFFIXES[suffix]);
    vec![
        field(&names.red, 0), field(&names.red, 1), field(&names.red, 2),
        field(&names.green, 0), field(&names.green, 1), field(&names.green, 2),
        field(&names.red, 3), field(&names.green, 3),
        field(&names.red, 4), field(&names.green, 4)
    ]
}

impl MeasurementRecord {
    /// Returns values in the order of `field_names`.
    pub fn values(&self) -> [f64; 10] {
        let (r, g) = (&self.red, &self.green);
        [
            r.major_radius, r.minor_radius, r.ring_width,
            g.major_radius, g.minor_radius, g.ring_width,
            r.eccentricity, g.eccentricity,
            r.average_radius, g.average_radius
        ]
    }

    /// Returns (field name, value) pairs.
    pub fn fields(&self, names: &ChannelNames) -> Vec<(String, f64)> {
        field_names(names).into_iter().zip(self.values().iter().copied()).collect()
    }
}

/// Open interval of accepted average radii.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct RadiusRange {
    pub min: f64,
    pub max: f64
}

impl RadiusRange {
    pub fn contains(&self, value: f64) -> bool { value > self.min && value < self.max }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct AcceptanceCriteria {
    /// Records with eccentricity at or above this in either channel are rejected.
    pub max_eccentricity: f64,
    pub red_radius: RadiusRange,
    pub green_radius: RadiusRange
}

impl Default for AcceptanceCriteria {
    fn default() -> AcceptanceCriteria {
        AcceptanceCriteria{
            max_eccentricity: 1.2,
            red_radius: RadiusRange{ min: 0.5, max: 2.5 },
            green_radius: RadiusRange{ min: 3.5, max: 4.5 }
        }
    }
}

impl AcceptanceCriteria {
    pub fn accepts(&self, record: &MeasurementRecord) -> bool {
        record.red.eccentricity < self.max_eccentricity
            && record.green.eccentricity < self.max_eccentricity
            && self.red_radius.contains(record.red.average_radius)
            && self.green_radius.contains(record.green.average_radius)
    }
}

pub fn filter_records(records: &[MeasurementRecord], criteria: &AcceptanceCriteria) -> Vec<MeasurementRecord> {
    records.iter().filter(|r| criteria.accepts(r)).copied().collect()
}

/// Descriptive statistics of one column. Undefined values are NaN.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ColumnSummary {
    pub count: usize,
    pub mean: f64,
    /// Sample standard deviation (n - 1 in the denominator).
    pub std: f64,
    pub min: f64,
    pub q25: f64,
    pub median: f64,
    pub q75: f64,
    pub max: f64
}

/// Quantile `q` of sorted values, linearly interpolated between closest ranks.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;

    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

pub fn summarize(values: &[f64]) -> ColumnSummary {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let n = sorted.len();

    let mean = if n > 0 { sorted.iter().sum::<f64>() / n as f64 } else { f64::NAN };
    let std = if n > 1 {
        (sorted.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / (n - 1) as f64).sqrt()
    } else {
        f64::NAN
    };

    ColumnSummary{
        count: n,
        mean,
        std,
        min: sorted.first().copied().unwrap_or(f64::NAN),
        q25: quantile(&sorted, 0.25),
        median: quantile(&sorted, 0.5),
        q75: quantile(&sorted, 0.75),
        max: sorted.last().copied().unwrap_or(f64::NAN)
    }
}

/// Returns (field name, summary) for every record field.
pub fn summarize_records(records: &[MeasurementRecord], names: &ChannelNames) -> Vec<(String, ColumnSummary)> {
    field_names(names).into_iter().enumerate()
        .map(|(i, name)| {
            let column: Vec<f64> = records.iter().map(|r| r.values()[i]).collect();
            (name, summarize(&column))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ring(ma: f64, mi: f64) -> RingGaussian {
        RingGaussian{ x0: 13.0, y0: 13.0, ma, mi, angle: 0.0, width: -2.0, amplitude: 300.0, background: 100.0 }
    }

    fn record(red: (f64, f64), green: (f64, f64)) -> MeasurementRecord {
        MeasurementRecord{
            detection: 0,
            image_index: 0,
            red: ChannelMeasurement::from_fit(&ring(red.0, red.1)),
            green: ChannelMeasurement::from_fit(&ring(green.0, green.1))
        }
    }

    fn names() -> ChannelNames { ChannelNames{ red: "Cep63".to_string(), green: "Cep152".to_string() } }

    #[test]
    fn given_unsorted_axes_derive_descriptors() {
        let m = ChannelMeasurement::from_fit(&ring(1.5, 2.0));
        assert_eq!(2.0, m.major_radius);
        assert_eq!(1.5, m.minor_radius);
        assert_eq!(2.0, m.ring_width);
        assert!((m.eccentricity - 4.0 / 3.0).abs() < 1e-12);
        assert_eq!(1.75, m.average_radius);
        assert!(m.eccentricity >= 1.0);
    }

    #[test]
    fn given_axes_of_opposite_signs_do_not_pass_as_ring() {
        let m = ChannelMeasurement::from_fit(&ring(-2.0, 1.8));
        assert_eq!(1.8, m.major_radius);
        assert_eq!(-2.0, m.minor_radius);
        assert!((m.average_radius + 0.1).abs() < 1e-12);
        assert!((m.eccentricity + 0.9).abs() < 1e-12);

        assert!(!AcceptanceCriteria::default().accepts(&record((-2.0, 1.8), (4.0, 4.0))));
    }

    #[test]
    fn given_channel_names_format_fields() {
        let fields = record((2.0, 1.8), (4.0, 3.9)).fields(&names());
        assert_eq!(10, fields.len());
        assert_eq!("Cep63 Major Radius", fields[0].0);
        assert_eq!(2.0, fields[0].1);
        assert_eq!("Cep152 Ring Width", fields[5].0);
        assert_eq!("Cep63 Eccentricity", fields[6].0);
        assert_eq!("Cep152 Average Radius", fields[9].0);
        assert!((fields[9].1 - 3.95).abs() < 1e-12);
    }

    #[test]
    fn given_default_criteria_filter_strictly() {
        let criteria = AcceptanceCriteria::default();
        assert!(criteria.accepts(&record((2.0, 2.0), (4.0, 4.0))));
        // eccentricity 1.25
        assert!(!criteria.accepts(&record((2.0, 1.6), (4.0, 4.0))));
        assert!(!criteria.accepts(&record((2.0, 2.0), (4.6, 4.5))));
        // average radius exactly at the bound
        assert!(!criteria.accepts(&record((2.5, 2.5), (4.0, 4.0))));
        assert!(!criteria.accepts(&record((2.0, 2.0), (3.5, 3.5))));
        assert!(!criteria.accepts(&record((0.4, 0.4), (4.0, 4.0))));
    }

    #[test]
    fn given_records_keep_accepted_in_order() {
        let mut records = vec![record((2.0, 2.0), (4.0, 4.0)), record((9.0, 9.0), (4.0, 4.0)), record((1.0, 1.0), (4.0, 4.0))];
        for (i, r) in records.iter_mut().enumerate() { r.detection = i; }

        let accepted = filter_records(&records, &AcceptanceCriteria::default());
        assert_eq!(vec![0, 2], accepted.iter().map(|r| r.detection).collect::<Vec<_>>());
    }

    #[test]
    fn given_values_summarize_with_interpolated_quartiles() {
        let s = summarize(&[4.0, 1.0, 3.0, 2.0]);
        assert_eq!(4, s.count);
        assert_eq!(2.5, s.mean);
        assert!((s.std - (5.0f64 / 3.0).sqrt()).abs() < 1e-12);
        assert_eq!(1.0, s.min);
        assert_eq!(1.75, s.q25);
        assert_eq!(2.5, s.median);
        assert_eq!(3.25, s.q75);
        assert_eq!(4.0, s.max);
    }

    #[test]
    fn given_single_value_std_undefined() {
        let s = summarize(&[3.0]);
        assert_eq!(1, s.count);
        assert!(s.std.is_nan());
        assert_eq!(3.0, s.median);

        let empty = summarize(&[]);
        assert_eq!(0, empty.count);
        assert!(empty.mean.is_nan() && empty.min.is_nan() && empty.q75.is_nan());
    }

    #[test]
    fn given_records_summarize_every_field() {
        let records = vec![record((2.0, 2.0), (4.0, 4.0)), record((1.0, 1.0), (3.0, 3.0))];
        let summary = summarize_records(&records, &names());
        assert_eq!(10, summary.len());
        assert_eq!("Cep63 Average Radius", summary[8].0);
        assert_eq!(1.5, summary[8].1.mean);
        assert_eq!(3.0, summary[9].1.min);
    }
}
