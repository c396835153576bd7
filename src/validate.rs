//! Validate command - Check a .bin file produced by `convert`

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use crate::encoder::{self, RECORD_SIZE};

/// What a .bin file contains.
#[derive(Debug, Clone, PartialEq)]
pub struct BinReport {
    pub records: usize,
    /// Records whose x, y or z is NaN or infinite
    pub non_finite: usize,
    /// Range of the stored (already scaled) intensity, if any finite value exists
    pub intensity_range: Option<(f32, f32)>,
}

/// Read a .bin file and describe it.
///
/// Fails when the file is missing, is not a regular file, or its length is not
/// a multiple of the record size. Non-finite coordinates are reported, not
/// rejected: PCD files that are not dense legitimately carry NaN points.
pub fn inspect_bin(path: &Path) -> Result<BinReport> {
    let metadata = fs::metadata(path).with_context(|| format!("cannot stat {}", path.display()))?;
    if !metadata.is_file() {
        anyhow::bail!("{} is not a file", path.display());
    }
    let bytes = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    if bytes.len() % RECORD_SIZE != 0 {
        anyhow::bail!(
            "{} bytes is not a whole number of {}-byte records ({} stray bytes)",
            bytes.len(),
            RECORD_SIZE,
            bytes.len() % RECORD_SIZE
        );
    }

    let records = encoder::decode(&bytes)?;
    let non_finite = records
        .iter()
        .filter(|r| !(r.x.is_finite() && r.y.is_finite() && r.z.is_finite()))
        .count();
    let intensity_range = records
        .iter()
        .map(|r| r.intensity)
        .filter(|i| i.is_finite())
        .fold(None, |acc: Option<(f32, f32)>, i| match acc {
            Some((lo, hi)) => Some((lo.min(i), hi.max(i))),
            None => Some((i, i)),
        });

    Ok(BinReport {
        records: records.len(),
        non_finite,
        intensity_range,
    })
}

pub fn validate_bin(bin_path: &str) -> Result<()> {
    match inspect_bin(Path::new(bin_path)) {
        Ok(report) => {
            println!("Validation of {}: PASSED", bin_path);
            println!("Records: {} ({} bytes)", report.records, report.records * RECORD_SIZE);
            if let Some((lo, hi)) = report.intensity_range {
                println!("Intensity (scaled): {:.6} .. {:.6}", lo, hi);
            }
            if report.non_finite > 0 {
                println!("[WARN] {} records have non-finite coordinates", report.non_finite);
            }
            Ok(())
        }
        Err(e) => {
            println!("Validation of {}: FAILED", bin_path);
            println!("[ERROR] {:#}", e);
            Err(e)
        }
    }
}
