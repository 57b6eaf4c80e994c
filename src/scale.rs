//! Domain to range mappings behind every visual channel.

use crate::theme::Color;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Range values that a linear scale can blend between control points.
pub trait Interpolate: Clone {
    fn interpolate(&self, other: &Self, t: f64) -> Self;
}

impl Interpolate for Color {
    fn interpolate(&self, other: &Self, t: f64) -> Self {
        self.lerp(*other, t)
    }
}

impl Interpolate for f64 {
    fn interpolate(&self, other: &Self, t: f64) -> Self {
        self * (1.0 - t) + other * t
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScaleType {
    Linear,
    Ordinal,
}

impl fmt::Display for ScaleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Linear => f.write_str("linear"),
            Self::Ordinal => f.write_str("ordinal"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScaleError {
    #[error("linear scale needs 2 or 3 control points, got {0}")]
    Arity(usize),
    #[error("domain has {domain} entries but range has {range}")]
    Mismatch { domain: usize, range: usize },
    #[error("linear domain must be finite and ascending")]
    Unordered,
}

/// Piecewise linear interpolation over two (`[min, max]`) or three
/// (`[min, mean, max]`) control points.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearScale<R> {
    domain: Vec<f64>,
    range: Vec<R>,
}

impl<R: Interpolate> LinearScale<R> {
    pub fn new(domain: Vec<f64>, range: Vec<R>) -> Result<Self, ScaleError> {
        if !(2..=3).contains(&range.len()) {
            return Err(ScaleError::Arity(range.len()));
        }
        if domain.len() != range.len() {
            return Err(ScaleError::Mismatch {
                domain: domain.len(),
                range: range.len(),
            });
        }
        if domain.iter().any(|v| !v.is_finite()) || domain.windows(2).any(|w| w[0] > w[1]) {
            return Err(ScaleError::Unordered);
        }
        Ok(Self { domain, range })
    }

    /// Control points for observed values: `[min, max]` for two stops,
    /// `[min, mean, max]` for three.
    pub fn from_stats(stats: NumericStats, range: Vec<R>) -> Result<Self, ScaleError> {
        let domain = match range.len() {
            2 => vec![stats.min, stats.max],
            3 => vec![stats.min, stats.mean, stats.max],
            n => return Err(ScaleError::Arity(n)),
        };
        Self::new(domain, range)
    }

    pub fn domain(&self) -> &[f64] {
        &self.domain
    }

    pub fn range(&self) -> &[R] {
        &self.range
    }

    pub fn range_at(&self, index: usize) -> Option<&R> {
        self.range.get(index)
    }

    /// Values outside `[min, max]` extrapolate along the end segment; callers
    /// validate input first.
    pub fn apply(&self, value: f64) -> R {
        if let Some(idx) = self.domain.iter().position(|d| *d == value) {
            return self.range[idx].clone();
        }
        let last = self.domain.len() - 1;
        let segment = (0..last)
            .find(|&i| value <= self.domain[i + 1])
            .unwrap_or(last - 1);
        let (d0, d1) = (self.domain[segment], self.domain[segment + 1]);
        let span = d1 - d0;
        if span == 0.0 || !span.is_finite() {
            return self.range[segment].clone();
        }
        let t = (value - d0) / span;
        self.range[segment].interpolate(&self.range[segment + 1], t)
    }

    pub fn set_range(&mut self, range: Vec<R>) -> Result<(), ScaleError> {
        if range.len() != self.domain.len() {
            return Err(ScaleError::Mismatch {
                domain: self.domain.len(),
                range: range.len(),
            });
        }
        self.range = range;
        Ok(())
    }
}

/// Exact lookup from a categorical domain into a finite range.
#[derive(Debug, Clone, PartialEq)]
pub struct OrdinalScale<R> {
    domain: Vec<String>,
    range: Vec<R>,
}

impl<R: Clone> OrdinalScale<R> {
    /// Duplicate domain entries keep their first position.
    pub fn new(domain: Vec<String>, range: Vec<R>) -> Self {
        let mut unique: Vec<String> = Vec::with_capacity(domain.len());
        for value in domain {
            if !unique.contains(&value) {
                unique.push(value);
            }
        }
        Self {
            domain: unique,
            range,
        }
    }

    pub fn domain(&self) -> &[String] {
        &self.domain
    }

    pub fn range(&self) -> &[R] {
        &self.range
    }

    pub fn index_of(&self, key: &str) -> Option<usize> {
        self.domain.iter().position(|d| d == key)
    }

    /// Fails closed for unknown keys and for keys whose slot lies beyond the
    /// range.
    pub fn apply(&self, key: &str) -> Option<R> {
        self.index_of(key).and_then(|idx| self.range.get(idx).cloned())
    }

    /// Like [`OrdinalScale::apply`] but wraps around the range, so an
    /// overflowing domain repeats values.
    pub fn apply_cyclic(&self, key: &str) -> Option<R> {
        let idx = self.index_of(key)?;
        self.cyclic_at(idx)
    }

    pub fn cyclic_at(&self, index: usize) -> Option<R> {
        if self.range.is_empty() {
            return None;
        }
        Some(self.range[index % self.range.len()].clone())
    }

    pub fn is_out_of_range(&self) -> bool {
        self.domain.len() > self.range.len()
    }

    pub fn set_range(&mut self, range: Vec<R>) {
        self.range = range;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScaleAdapter<R> {
    Linear(LinearScale<R>),
    Ordinal(OrdinalScale<R>),
}

impl<R: Interpolate> ScaleAdapter<R> {
    pub fn scale_type(&self) -> ScaleType {
        match self {
            Self::Linear(_) => ScaleType::Linear,
            Self::Ordinal(_) => ScaleType::Ordinal,
        }
    }

    /// Maps a raw selector value. Linear scales parse it as a number.
    pub fn apply(&self, raw: &str) -> Option<R> {
        match self {
            Self::Linear(scale) => parse_number(raw).map(|v| scale.apply(v)),
            Self::Ordinal(scale) => scale.apply(raw),
        }
    }

    pub fn is_out_of_range(&self) -> bool {
        match self {
            Self::Linear(_) => false,
            Self::Ordinal(scale) => scale.is_out_of_range(),
        }
    }
}

pub(crate) fn parse_number(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NumericStats {
    pub min: f64,
    pub mean: f64,
    pub max: f64,
}

impl NumericStats {
    pub fn from_values<'a>(values: impl IntoIterator<Item = &'a str>) -> Option<Self> {
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        let mut sum = 0.0;
        let mut count = 0usize;
        for value in values.into_iter().filter_map(parse_number) {
            min = min.min(value);
            max = max.max(value);
            sum += value;
            count += 1;
        }
        if count == 0 {
            return None;
        }
        Some(Self {
            min,
            mean: sum / count as f64,
            max,
        })
    }
}

/// Rounds half away from zero to `decimals` places.
pub fn round_half_away(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    let rounded = (value * factor).round() / factor;
    if rounded == 0.0 { 0.0 } else { rounded }
}

/// Legend text for a numeric control point.
pub fn format_number(value: f64, decimals: u32) -> String {
    let rounded = round_half_away(value, decimals);
    let text = format!("{rounded:.prec$}", prec = decimals as usize);
    if text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn three_point_linear_hits_control_points_exactly() {
        let stats = NumericStats {
            min: 0.1,
            mean: 0.37,
            max: 2.9,
        };
        let scale = LinearScale::from_stats(stats, vec![1.5, 7.25, 20.0]).unwrap();
        assert_eq!(scale.apply(0.1), 1.5);
        assert_eq!(scale.apply(0.37), 7.25);
        assert_eq!(scale.apply(2.9), 20.0);

        let colors = vec![
            Color::rgb(255, 0, 0),
            Color::rgb(255, 255, 255),
            Color::rgb(0, 0, 255),
        ];
        let scale = LinearScale::from_stats(stats, colors.clone()).unwrap();
        assert_eq!(scale.apply(0.1), colors[0]);
        assert_eq!(scale.apply(0.37), colors[1]);
        assert_eq!(scale.apply(2.9), colors[2]);
    }

    #[test]
    fn linear_interpolates_within_segments() {
        let scale = LinearScale::new(vec![0.0, 10.0, 20.0], vec![0.0, 100.0, 200.0]).unwrap();
        assert_eq!(scale.apply(5.0), 50.0);
        assert_eq!(scale.apply(15.0), 150.0);
    }

    #[test]
    fn linear_extrapolates_instead_of_clamping() {
        let scale = LinearScale::new(vec![0.0, 10.0], vec![0.0, 100.0]).unwrap();
        assert_eq!(scale.apply(20.0), 200.0);
        assert_eq!(scale.apply(-10.0), -100.0);
    }

    #[test]
    fn linear_degenerate_domain_returns_left_stop() {
        let scale = LinearScale::new(vec![3.0, 3.0], vec![1.0, 9.0]).unwrap();
        assert_eq!(scale.apply(3.0), 1.0);
        assert_eq!(scale.apply(4.0), 1.0);
    }

    #[test]
    fn linear_rejects_bad_arity() {
        assert_eq!(
            LinearScale::new(vec![0.0], vec![1.0]).unwrap_err(),
            ScaleError::Arity(1)
        );
        assert_eq!(
            LinearScale::<f64>::from_stats(
                NumericStats {
                    min: 0.0,
                    mean: 1.0,
                    max: 2.0
                },
                vec![1.0, 2.0, 3.0, 4.0]
            )
            .unwrap_err(),
            ScaleError::Arity(4)
        );
        assert_eq!(
            LinearScale::new(vec![2.0, 1.0], vec![1.0, 2.0]).unwrap_err(),
            ScaleError::Unordered
        );
    }

    #[test]
    fn ordinal_maps_in_construction_order() {
        let domain: Vec<String> = ["bat", "cow", "dog"].iter().map(|s| s.to_string()).collect();
        let scale = OrdinalScale::new(domain, vec![1, 2, 3, 4]);
        assert_eq!(scale.apply("bat"), Some(1));
        assert_eq!(scale.apply("cow"), Some(2));
        assert_eq!(scale.apply("dog"), Some(3));
        assert_eq!(scale.apply("eel"), None);
        assert!(!scale.is_out_of_range());
    }

    #[test]
    fn ordinal_overflow_fails_closed_or_repeats() {
        let domain: Vec<String> = ["a", "b", "c"].iter().map(|s| s.to_string()).collect();
        let scale = OrdinalScale::new(domain, vec![10, 20]);
        assert!(scale.is_out_of_range());
        assert_eq!(scale.apply("c"), None);
        assert_eq!(scale.apply_cyclic("c"), Some(10));
    }

    #[test]
    fn adapter_parses_numbers_for_linear() {
        let adapter = ScaleAdapter::Linear(LinearScale::new(vec![0.0, 1.0], vec![0.0, 10.0]).unwrap());
        assert_eq!(adapter.apply("0.5"), Some(5.0));
        assert_eq!(adapter.apply("n/a"), None);
        assert_eq!(adapter.scale_type(), ScaleType::Linear);
    }

    #[test]
    fn stats_ignore_non_numeric_values() {
        let stats = NumericStats::from_values(["1", "x", "3", "5"]).unwrap();
        assert_eq!(stats.min, 1.0);
        assert_eq!(stats.mean, 3.0);
        assert_eq!(stats.max, 5.0);
        assert!(NumericStats::from_values(["x"]).is_none());
    }

    #[test]
    fn rounding_is_half_away_from_zero() {
        assert_eq!(round_half_away(2.5, 0), 3.0);
        assert_eq!(round_half_away(-2.5, 0), -3.0);
        assert_eq!(round_half_away(1.25, 1), 1.3);
        assert_eq!(format_number(1.0, 2), "1");
        assert_eq!(format_number(0.125, 2), "0.13");
    }
}
