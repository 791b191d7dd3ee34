//! Configuration for the compute pipelines.
//!
//! Segment lengths double as WGSL workgroup sizes, so they must be powers of
//! two no larger than the device's workgroup limits.

use crate::error::{ComputeError, ComputeResult};

/// Elements collapsed per workgroup in reduce and scan shaders.
pub const DEFAULT_SEGMENT_LENGTH: u32 = 256;
/// Digit width for radix sort passes.
pub const DEFAULT_RADIX_BITS: u32 = 8;
/// Significant key bits consumed by a full sort.
pub const DEFAULT_KEY_BITS: u32 = 32;

fn check_segment_length(label: &str, segment_length: u32) -> ComputeResult<()> {
    if segment_length < 2 || !segment_length.is_power_of_two() {
        return Err(ComputeError::construction(format!(
            "{label}: segment_length must be a power of two >= 2, got {segment_length}"
        )));
    }
    Ok(())
}

/// Settings for a sum-reduction chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReduceConfig {
    pub segment_length: u32,
}

impl Default for ReduceConfig {
    fn default() -> Self {
        Self {
            segment_length: DEFAULT_SEGMENT_LENGTH,
        }
    }
}

impl ReduceConfig {
    pub fn validate(&self) -> ComputeResult<()> {
        check_segment_length("ReduceConfig", self.segment_length)
    }
}

/// Settings for an inclusive prefix-scan engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanConfig {
    pub segment_length: u32,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            segment_length: DEFAULT_SEGMENT_LENGTH,
        }
    }
}

impl ScanConfig {
    pub fn validate(&self) -> ComputeResult<()> {
        check_segment_length("ScanConfig", self.segment_length)
    }
}

/// Settings for an LSD radix sort.
///
/// `segment_length` sizes the histogram and scatter workgroups while
/// `scan_segment_length` sizes the nested scan over per-digit counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortConfig {
    pub segment_length: u32,
    pub radix_bits: u32,
    pub key_bits: u32,
    pub scan_segment_length: u32,
}

impl Default for SortConfig {
    fn default() -> Self {
        Self {
            segment_length: DEFAULT_SEGMENT_LENGTH,
            radix_bits: DEFAULT_RADIX_BITS,
            key_bits: DEFAULT_KEY_BITS,
            scan_segment_length: DEFAULT_SEGMENT_LENGTH,
        }
    }
}

impl SortConfig {
    pub fn validate(&self) -> ComputeResult<()> {
        check_segment_length("SortConfig", self.segment_length)?;
        check_segment_length("SortConfig (scan)", self.scan_segment_length)?;
        if self.radix_bits < 1 || self.radix_bits > 8 {
            return Err(ComputeError::construction(format!(
                "SortConfig: radix_bits must be in 1..=8, got {}",
                self.radix_bits
            )));
        }
        if self.key_bits < 1 || self.key_bits > 32 {
            return Err(ComputeError::construction(format!(
                "SortConfig: key_bits must be in 1..=32, got {}",
                self.key_bits
            )));
        }
        Ok(())
    }

    /// Sort passes needed to consume every key bit.
    pub fn pass_count(&self) -> u32 {
        self.key_bits.div_ceil(self.radix_bits)
    }
}

/// Selects which primitives a [`crate::dispatch::Dispatcher`] builds.
///
/// A `None` entry skips that primitive entirely; no pipelines or buffers are
/// created for it.
#[derive(Debug, Clone, Copy, Default)]
pub struct PipelineConfig {
    pub reduce: Option<ReduceConfig>,
    pub scan: Option<ScanConfig>,
    pub sort: Option<SortConfig>,
}

impl PipelineConfig {
    /// Every primitive enabled with default settings.
    pub fn all_enabled() -> Self {
        Self {
            reduce: Some(ReduceConfig::default()),
            scan: Some(ScanConfig::default()),
            sort: Some(SortConfig::default()),
        }
    }

    pub fn validate(&self) -> ComputeResult<()> {
        if let Some(reduce) = &self.reduce {
            reduce.validate()?;
        }
        if let Some(scan) = &self.scan {
            scan.validate()?;
        }
        if let Some(sort) = &self.sort {
            sort.validate()?;
        }
        Ok(())
    }
}
