//! Fixed-binning histograms for per-channel diagnostics
//!
//! Only what the selection needs: uniform binning with underflow/overflow,
//! weighted fills, bin-by-bin merging and scaling. The mean is computed from
//! in-range entries only, so scaling a histogram never moves its mean.

use serde::{Deserialize, Serialize};

use crate::error::CalibrationError;

/// Uniform binning over `[low, high)`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Binning {
    pub bins: usize,
    pub low: f64,
    pub high: f64,
}

impl Binning {
    pub fn new(bins: usize, low: f64, high: f64) -> Self {
        Self { bins, low, high }
    }

    pub fn width(&self) -> f64 {
        (self.high - self.low) / self.bins as f64
    }

    /// Bin for `x`: `None` outside the range
    pub fn find(&self, x: f64) -> Option<usize> {
        if !(x >= self.low && x < self.high) || self.bins == 0 {
            return None;
        }
        let bin = ((x - self.low) / self.width()) as usize;
        Some(bin.min(self.bins - 1))
    }

    pub fn center(&self, bin: usize) -> f64 {
        self.low + (bin as f64 + 0.5) * self.width()
    }
}

/// One-dimensional histogram
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Histogram1D {
    binning: Binning,
    contents: Vec<f64>,
    underflow: f64,
    overflow: f64,
    entries: u64,
    sum_w: f64,
    sum_wx: f64,
}

impl Histogram1D {
    pub fn new(binning: Binning) -> Self {
        Self {
            binning,
            contents: vec![0.0; binning.bins],
            underflow: 0.0,
            overflow: 0.0,
            entries: 0,
            sum_w: 0.0,
            sum_wx: 0.0,
        }
    }

    pub fn fill(&mut self, x: f64) {
        self.fill_weighted(x, 1.0);
    }

    pub fn fill_weighted(&mut self, x: f64, weight: f64) {
        self.entries += 1;
        match self.binning.find(x) {
            Some(bin) => {
                self.contents[bin] += weight;
                self.sum_w += weight;
                self.sum_wx += weight * x;
            }
            None if x < self.binning.low => self.underflow += weight,
            None => self.overflow += weight,
        }
    }

    pub fn binning(&self) -> Binning {
        self.binning
    }

    pub fn contents(&self) -> &[f64] {
        &self.contents
    }

    pub fn underflow(&self) -> f64 {
        self.underflow
    }

    pub fn overflow(&self) -> f64 {
        self.overflow
    }

    /// Number of fill calls, including out-of-range ones
    pub fn entries(&self) -> u64 {
        self.entries
    }

    /// Weighted sum of in-range contents
    pub fn integral(&self) -> f64 {
        self.sum_w
    }

    /// Mean of in-range entries; 0 for an empty histogram
    pub fn mean(&self) -> f64 {
        if self.sum_w == 0.0 {
            0.0
        } else {
            self.sum_wx / self.sum_w
        }
    }

    /// Multiply every bin by `factor`
    pub fn scale(&mut self, factor: f64) {
        for bin in self.contents.iter_mut() {
            *bin *= factor;
        }
        self.underflow *= factor;
        self.overflow *= factor;
        self.sum_w *= factor;
        self.sum_wx *= factor;
    }

    /// Bin-by-bin sum with a histogram of identical binning
    pub fn add(&mut self, other: &Histogram1D) -> Result<(), CalibrationError> {
        if self.binning != other.binning {
            return Err(CalibrationError::BinningMismatch {
                reason: format!("{:?} vs {:?}", self.binning, other.binning),
            });
        }
        for (a, b) in self.contents.iter_mut().zip(other.contents.iter()) {
            *a += b;
        }
        self.underflow += other.underflow;
        self.overflow += other.overflow;
        self.entries += other.entries;
        self.sum_w += other.sum_w;
        self.sum_wx += other.sum_wx;
        Ok(())
    }
}

/// Two-dimensional histogram, row-major in y
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Histogram2D {
    x: Binning,
    y: Binning,
    contents: Vec<f64>,
    entries: u64,
    out_of_range: f64,
}

impl Histogram2D {
    pub fn new(x: Binning, y: Binning) -> Self {
        Self {
            x,
            y,
            contents: vec![0.0; x.bins * y.bins],
            entries: 0,
            out_of_range: 0.0,
        }
    }

    pub fn fill(&mut self, x: f64, y: f64) {
        self.entries += 1;
        match (self.x.find(x), self.y.find(y)) {
            (Some(ix), Some(iy)) => self.contents[iy * self.x.bins + ix] += 1.0,
            _ => self.out_of_range += 1.0,
        }
    }

    pub fn x_binning(&self) -> Binning {
        self.x
    }

    pub fn y_binning(&self) -> Binning {
        self.y
    }

    pub fn get(&self, ix: usize, iy: usize) -> f64 {
        self.contents[iy * self.x.bins + ix]
    }

    pub fn contents(&self) -> &[f64] {
        &self.contents
    }

    pub fn entries(&self) -> u64 {
        self.entries
    }

    pub fn out_of_range(&self) -> f64 {
        self.out_of_range
    }

    pub fn add(&mut self, other: &Histogram2D) -> Result<(), CalibrationError> {
        if self.x != other.x || self.y != other.y {
            return Err(CalibrationError::BinningMismatch {
                reason: "2D histogram axes differ".to_string(),
            });
        }
        for (a, b) in self.contents.iter_mut().zip(other.contents.iter()) {
            *a += b;
        }
        self.entries += other.entries;
        self.out_of_range += other.out_of_range;
        Ok(())
    }
}
