//! Null-aware statistical reducers shared by the aggregation, band-local
//! and zonal kernels.
//!
//! Reducers consume only *valid* values (callers filter masked cells and
//! NaNs first). Distribution statistics (mode, unique, entropy, asm) run
//! on an exact value-count table that merges associatively, so per-tile
//! partial results can be combined in any order.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::RasterError;

/// The statistic vocabulary shared by `aggregate`, `local_stats` and
/// `zonal_stats`.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum StatKind {
    Asm,
    Count,
    Entropy,
    Max,
    Mean,
    Median,
    Min,
    Mode,
    Prod,
    Std,
    Sum,
    Unique,
    Var,
}

impl StatKind {
    pub fn parse(name: &str) -> Result<Self, RasterError> {
        use StatKind::*;
        match name.to_ascii_lowercase().as_str() {
            "asm" => Ok(Asm),
            "count" => Ok(Count),
            "entropy" => Ok(Entropy),
            "max" => Ok(Max),
            "mean" => Ok(Mean),
            "median" => Ok(Median),
            "min" => Ok(Min),
            "mode" => Ok(Mode),
            "prod" => Ok(Prod),
            "std" => Ok(Std),
            "sum" => Ok(Sum),
            "unique" => Ok(Unique),
            "var" => Ok(Var),
            other => Err(RasterError::InvalidArgument(format!(
                "Invalid stat name: '{}'",
                other
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        use StatKind::*;
        match self {
            Asm => "asm",
            Count => "count",
            Entropy => "entropy",
            Max => "max",
            Mean => "mean",
            Median => "median",
            Min => "min",
            Mode => "mode",
            Prod => "prod",
            Std => "std",
            Sum => "sum",
            Unique => "unique",
            Var => "var",
        }
    }

    /// Whether this statistic needs the exact value distribution.
    pub fn needs_counts(&self) -> bool {
        matches!(
            self,
            StatKind::Mode | StatKind::Unique | StatKind::Entropy | StatKind::Asm
        )
    }

    /// Whether this statistic needs every value retained (median).
    pub fn needs_values(&self) -> bool {
        matches!(self, StatKind::Median)
    }
}

/// An exact table of value -> occurrence count. Values are keyed by their
/// bit pattern (with -0.0 normalized to 0.0); NaNs must be filtered before
/// insertion.
#[derive(Debug, Clone, Default)]
pub struct ValueCounts {
    counts: HashMap<u64, u64>,
    total: u64,
}

impl ValueCounts {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    fn key(v: f64) -> u64 {
        // Normalize the two zero representations into one bucket.
        let v = if v == 0.0 { 0.0 } else { v };
        v.to_bits()
    }

    pub fn add(&mut self, v: f64) {
        debug_assert!(!v.is_nan());
        *self.counts.entry(Self::key(v)).or_insert(0) += 1;
        self.total += 1;
    }

    pub fn merge(&mut self, other: &ValueCounts) {
        for (&k, &c) in &other.counts {
            *self.counts.entry(k).or_insert(0) += c;
        }
        self.total += other.total;
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    pub fn unique_count(&self) -> usize {
        self.counts.len()
    }

    /// The most frequent value; the smallest value wins a tie, matching
    /// SciPy's mode.
    pub fn mode(&self) -> Option<f64> {
        let mut best: Option<(u64, f64)> = None;
        for (&bits, &count) in &self.counts {
            let v = f64::from_bits(bits);
            best = match best {
                None => Some((count, v)),
                Some((bc, bv)) => {
                    if count > bc || (count == bc && v < bv) {
                        Some((count, v))
                    } else {
                        Some((bc, bv))
                    }
                }
            };
        }
        best.map(|(_, v)| v)
    }

    /// Shannon entropy, -sum(p * ln p) with p = count / total.
    pub fn entropy(&self) -> f64 {
        if self.total == 0 {
            return f64::NAN;
        }
        let n = self.total as f64;
        -self
            .counts
            .values()
            .map(|&c| {
                let p = c as f64 / n;
                p * p.ln()
            })
            .sum::<f64>()
    }

    /// Angular second moment, sum(p^2).
    pub fn asm(&self) -> f64 {
        if self.total == 0 {
            return f64::NAN;
        }
        let n = self.total as f64;
        self.counts
            .values()
            .map(|&c| {
                let p = c as f64 / n;
                p * p
            })
            .sum()
    }
}

/// Median with NumPy semantics: mean of the two central values for even
/// counts. Sorts the buffer in place.
pub fn median_in_place(values: &mut [f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.sort_by(|a, b| a.partial_cmp(b).expect("NaNs are filtered before reduction"));
    let n = values.len();
    if n % 2 == 1 {
        values[n / 2]
    } else {
        (values[n / 2 - 1] + values[n / 2]) / 2.0
    }
}

/// Reduces a buffer of valid values to a single statistic. The buffer may
/// be reordered (median sorts it).
pub fn reduce_values(values: &mut Vec<f64>, stat: StatKind) -> f64 {
    use StatKind::*;
    if values.is_empty() {
        return match stat {
            Count | Unique => 0.0,
            Sum => 0.0,
            Prod => 1.0,
            _ => f64::NAN,
        };
    }
    let n = values.len() as f64;
    match stat {
        Count => n,
        Sum => values.iter().sum(),
        Prod => values.iter().product(),
        Min => values.iter().cloned().fold(f64::INFINITY, f64::min),
        Max => values.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
        Mean => values.iter().sum::<f64>() / n,
        Var => {
            let mean = values.iter().sum::<f64>() / n;
            values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n
        }
        Std => {
            let mean = values.iter().sum::<f64>() / n;
            (values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n).sqrt()
        }
        Median => median_in_place(values),
        Mode | Unique | Entropy | Asm => {
            let mut counts = ValueCounts::new();
            for &v in values.iter() {
                counts.add(v);
            }
            match stat {
                Mode => counts.mode().unwrap_or(f64::NAN),
                Unique => counts.unique_count() as f64,
                Entropy => counts.entropy(),
                _ => counts.asm(),
            }
        }
    }
}
