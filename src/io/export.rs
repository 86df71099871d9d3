//! Export per-observation results and observation files.
//!
//! The residual CSV is meant to be easy to consume in spreadsheets or
//! downstream scripts; observation files use the same plain-text layout the
//! ingest accepts.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::domain::{Observation, ObservationResidual, SampleLayout};
use crate::error::AppError;

/// Write per-observation fit results to a CSV file.
pub fn write_residuals_csv(path: &Path, residuals: &[ObservationResidual]) -> Result<(), AppError> {
    let mut file = File::create(path)
        .map_err(|e| AppError::input(format!("Failed to create export CSV '{}': {e}", path.display())))?;

    writeln!(
        file,
        "index,raw_x,raw_y,raw_z,corrected_x,corrected_y,corrected_z,corrected_norm,residual"
    )
    .map_err(|e| AppError::input(format!("Failed to write export CSV header: {e}")))?;

    for r in residuals {
        writeln!(
            file,
            "{},{:.10},{:.10},{:.10},{:.10},{:.10},{:.10},{:.10},{:.10}",
            r.index + 1,
            r.raw.x,
            r.raw.y,
            r.raw.z,
            r.corrected.x,
            r.corrected.y,
            r.corrected.z,
            r.corrected_norm(),
            r.residual,
        )
        .map_err(|e| AppError::input(format!("Failed to write export CSV row: {e}")))?;
    }

    Ok(())
}

/// Render observations in the plain-text ingest format.
pub fn render_observations(observations: &[Observation], layout: SampleLayout) -> String {
    let mut out = String::new();
    for o in observations {
        match layout {
            SampleLayout::Triple => out.push_str(&format!("{:.9} {:.9} {:.9}\n", o.x, o.y, o.z)),
            SampleLayout::Single => out.push_str(&format!("{:.9}\n{:.9}\n{:.9}\n", o.x, o.y, o.z)),
        }
    }
    out
}

/// Write observations to a plain-text file.
pub fn write_observations(path: &Path, observations: &[Observation], layout: SampleLayout) -> Result<(), AppError> {
    std::fs::write(path, render_observations(observations, layout))
        .map_err(|e| AppError::input(format!("Failed to write observations '{}': {e}", path.display())))
}
