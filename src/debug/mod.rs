//! Debug bundle writer for inspecting a calibration run.

use std::fs::{File, create_dir_all};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Local;

use crate::app::pipeline::RunOutput;
use crate::domain::CalibrationConfig;
use crate::error::AppError;
use crate::fit::fmt_sci;

pub fn write_debug_bundle(run: &RunOutput, config: &CalibrationConfig) -> Result<PathBuf, AppError> {
    write_debug_bundle_in(Path::new("debug"), run, config)
}

pub fn write_debug_bundle_in(dir: &Path, run: &RunOutput, config: &CalibrationConfig) -> Result<PathBuf, AppError> {
    create_dir_all(dir).map_err(|e| AppError::input(format!("Failed to create debug dir: {e}")))?;

    let ts = Local::now().format("%Y%m%d_%H%M%S");
    let stem = config
        .input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "input".to_string());
    let path = dir.join(format!("calib_debug_{stem}_{ts}.md"));

    let mut file = File::create(&path)
        .map_err(|e| AppError::input(format!("Failed to create debug file: {e}")))?;
    write_bundle(&mut file, run, config)
        .map_err(|e| AppError::input(format!("Failed to write debug bundle: {e}")))?;

    Ok(path)
}

fn write_bundle(file: &mut File, run: &RunOutput, config: &CalibrationConfig) -> std::io::Result<()> {
    let stats = &run.ingest.stats;

    writeln!(file, "# accel-calib debug bundle")?;
    writeln!(file, "- generated: {}", Local::now().to_rfc3339())?;
    writeln!(file, "- input: {}", config.input.display())?;
    writeln!(
        file,
        "- lines: {}, numbers: {}, observations: {}, dropped: {}",
        stats.lines, stats.tokens, stats.n_observations, stats.dropped_tokens
    )?;
    writeln!(
        file,
        "- solver: {}, max_iterations={}, ftol={}, gtol={}, ptol={}, gravity={:.4}",
        config.solver.linear_solver.report_name(),
        config.solver.max_iterations,
        fmt_sci(config.solver.function_tolerance, 1),
        fmt_sci(config.solver.gradient_tolerance, 1),
        fmt_sci(config.solver.parameter_tolerance, 1),
        config.solver.gravity
    )?;

    writeln!(file, "\n## Parameters")?;
    writeln!(file, "| name | initial | fitted |")?;
    writeln!(file, "| - | - | - |")?;
    const NAMES: [&str; 6] = ["a1", "a2", "a3", "b1", "b2", "b3"];
    for (i, name) in NAMES.iter().enumerate() {
        writeln!(
            file,
            "| {} | {:.6} | {:.9} |",
            name,
            run.initial.values()[i],
            run.params.values()[i]
        )?;
    }

    writeln!(file, "\n## Iterations")?;
    writeln!(file, "| iter | cost | cost_change | gradient | step | tr_ratio | tr_radius | accepted |")?;
    writeln!(file, "| - | - | - | - | - | - | - | - |")?;
    for it in &run.summary.iterations {
        writeln!(
            file,
            "| {} | {} | {} | {} | {} | {} | {} | {} |",
            it.iteration,
            fmt_sci(it.cost, 6),
            fmt_sci(it.cost_change, 3),
            fmt_sci(it.gradient_max_norm, 3),
            fmt_sci(it.step_norm, 3),
            fmt_sci(it.relative_decrease, 3),
            fmt_sci(it.trust_region_radius, 3),
            it.step_is_successful
        )?;
    }

    writeln!(file, "\n## Observations")?;
    writeln!(file, "| # | raw_x | raw_y | raw_z | corrected_norm | residual |")?;
    writeln!(file, "| - | - | - | - | - | - |")?;
    for r in &run.residuals {
        writeln!(
            file,
            "| {} | {:.6} | {:.6} | {:.6} | {:.6} | {} |",
            r.index + 1,
            r.raw.x,
            r.raw.y,
            r.raw.z,
            r.corrected_norm(),
            fmt_sci(r.residual, 3)
        )?;
    }

    writeln!(file, "\n## Solver report")?;
    writeln!(file, "```text{}```", run.summary.full_report())?;

    Ok(())
}
