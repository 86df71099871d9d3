//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - loads `.env` and sets up logging
//! - parses CLI arguments
//! - runs calibration / simulation / correction
//! - prints reports
//! - writes optional exports

use clap::Parser;
use log::info;

use crate::cli::{ApplyArgs, CalibrateArgs, Command, SimulateArgs};
use crate::domain::{CalibrationConfig, CalibrationParams, SimulationConfig, SolverConfig};
use crate::error::AppError;
use crate::io::calibration::CalibrationFile;

pub mod pipeline;

/// Entry point for the `accel-calib` binary.
pub fn run() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_logging();

    // `accel-calib data.txt` behaves like `accel-calib calibrate data.txt`.
    let argv = rewrite_args(std::env::args().collect());
    let cli = crate::cli::Cli::parse_from(argv);

    match cli.command {
        Command::Calibrate(args) => handle_calibrate(args),
        Command::Simulate(args) => handle_simulate(args),
        Command::Apply(args) => handle_apply(args),
    }
}

fn init_logging() {
    // Status lines go to stderr; reports go to stdout.
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .format_target(false)
        .try_init();
}

fn handle_calibrate(args: CalibrateArgs) -> Result<(), AppError> {
    let config = calibration_config_from_args(&args);

    let params = CalibrationParams::seed();
    let ingest = crate::io::ingest::load_observations(&config.input, config.partial)?;
    println!("{}", crate::report::format_run_summary(&ingest, &config));

    let run = pipeline::calibrate_ingested(&config, ingest, params)?;

    println!(
        "{}",
        crate::report::format_solve_result(&run.params, &run.summary)
    );

    if config.top_n > 0 {
        println!(
            "{}",
            crate::report::format_residual_table(&run.worst, config.solver.gravity, run.norm_rmse)
        );
    }

    // Optional exports.
    if let Some(path) = &config.export_residuals {
        crate::io::export::write_residuals_csv(path, &run.residuals)?;
        info!("Wrote residuals to '{}'", path.display());
    }
    if let Some(path) = &config.export_calibration {
        let doc = CalibrationFile::new(&run.params, &run.summary, &config.solver, Some(config.input.as_path()));
        crate::io::calibration::write_calibration_json(path, &doc)?;
        info!("Wrote calibration to '{}'", path.display());
    }
    if config.debug_bundle {
        let path = crate::debug::write_debug_bundle(&run, &config)?;
        info!("Wrote debug bundle to '{}'", path.display());
    }

    Ok(())
}

fn handle_simulate(args: SimulateArgs) -> Result<(), AppError> {
    let config = simulation_config_from_args(&args)?;
    let sample = crate::data::generate_sample(&config)?;

    match &args.output {
        Some(path) => {
            crate::io::export::write_observations(path, &sample.observations, config.layout)?;
            info!(
                "Wrote {} simulated observations to '{}'",
                sample.observations.len(),
                path.display()
            );
        }
        None => print!(
            "{}",
            crate::io::export::render_observations(&sample.observations, config.layout)
        ),
    }

    Ok(())
}

fn handle_apply(args: ApplyArgs) -> Result<(), AppError> {
    let calibration = crate::io::calibration::read_calibration_json(&args.calibration)?;
    let params = calibration.params();
    let ingest = crate::io::ingest::load_observations(&args.input, args.partial)?;
    let rows = crate::report::compute_residuals(&ingest.observations, &params, calibration.gravity)?;

    match &args.output {
        Some(path) => {
            let corrected: Vec<_> = rows.iter().map(|r| r.corrected).collect();
            crate::io::export::write_observations(path, &corrected, args.layout)?;
            info!("Wrote {} corrected observations to '{}'", corrected.len(), path.display());
        }
        None => {
            println!("{}", crate::report::format_parameters(&params));
            println!("{}", crate::report::format_corrected(&rows));
        }
    }

    Ok(())
}

pub fn calibration_config_from_args(args: &CalibrateArgs) -> CalibrationConfig {
    CalibrationConfig {
        input: args.input.clone(),
        partial: args.partial,
        solver: SolverConfig {
            max_iterations: args.max_iterations,
            linear_solver: args.linear_solver,
            progress_to_stdout: !args.quiet,
            function_tolerance: args.function_tolerance,
            gradient_tolerance: args.gradient_tolerance,
            parameter_tolerance: args.parameter_tolerance,
            gravity: args.gravity,
        },
        top_n: args.top,
        export_residuals: args.export.clone(),
        export_calibration: args.export_calibration.clone(),
        debug_bundle: args.debug_bundle,
    }
}

pub fn simulation_config_from_args(args: &SimulateArgs) -> Result<SimulationConfig, AppError> {
    let scale: [f64; 3] = args
        .scale
        .as_slice()
        .try_into()
        .map_err(|_| AppError::input("`--scale` takes exactly three values."))?;
    let bias: [f64; 3] = args
        .bias
        .as_slice()
        .try_into()
        .map_err(|_| AppError::input("`--bias` takes exactly three values."))?;

    Ok(SimulationConfig {
        count: args.count,
        seed: args.seed,
        truth: CalibrationParams::from_scale_bias(scale, bias),
        noise: args.noise,
        gravity: args.gravity,
        layout: args.layout,
    })
}

/// Rewrite argv so `accel-calib` defaults to `accel-calib calibrate`.
///
/// Rules:
/// - `accel-calib`                      -> `accel-calib calibrate` (input from `ACCEL_CALIB_INPUT`)
/// - `accel-calib data.txt ...`         -> `accel-calib calibrate data.txt ...`
/// - `accel-calib --help/--version/-h`  -> unchanged (show top-level help/version)
fn rewrite_args(mut argv: Vec<String>) -> Vec<String> {
    let Some(arg1) = argv.get(1).cloned() else {
        argv.push("calibrate".to_string());
        return argv;
    };

    let is_top_level_help_or_version = matches!(
        arg1.as_str(),
        "-h" | "--help" | "-V" | "--version" | "help"
    );
    if is_top_level_help_or_version {
        return argv;
    }

    let is_subcommand = matches!(arg1.as_str(), "calibrate" | "simulate" | "apply");
    if is_subcommand {
        return argv;
    }

    argv.insert(1, "calibrate".to_string());
    argv
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn bare_invocation_defaults_to_calibrate() {
        assert_eq!(rewrite_args(argv(&["accel-calib"])), argv(&["accel-calib", "calibrate"]));
        assert_eq!(
            rewrite_args(argv(&["accel-calib", "data.txt", "--quiet"])),
            argv(&["accel-calib", "calibrate", "data.txt", "--quiet"])
        );
        assert_eq!(
            rewrite_args(argv(&["accel-calib", "--linear-solver", "dense-svd", "x.txt"])),
            argv(&["accel-calib", "calibrate", "--linear-solver", "dense-svd", "x.txt"])
        );
    }

    #[test]
    fn subcommands_and_help_are_untouched() {
        for a in [
            argv(&["accel-calib", "simulate", "-n", "12"]),
            argv(&["accel-calib", "apply", "--calibration", "c.json", "raw.txt"]),
            argv(&["accel-calib", "--help"]),
        ] {
            assert_eq!(rewrite_args(a.clone()), a);
        }
    }

    #[test]
    fn quiet_disables_progress() {
        let cli = crate::cli::Cli::try_parse_from(["accel-calib", "calibrate", "x.txt", "--quiet"]).unwrap();
        let Command::Calibrate(args) = cli.command else {
            panic!("expected calibrate");
        };
        let config = calibration_config_from_args(&args);
        assert!(!config.solver.progress_to_stdout);
        assert_eq!(config.top_n, 10);
    }

    #[test]
    fn simulate_config_carries_truth() {
        let cli = crate::cli::Cli::try_parse_from([
            "accel-calib",
            "simulate",
            "--scale",
            "1.1",
            "1.0",
            "0.9",
            "--noise",
            "0.01",
        ])
        .unwrap();
        let Command::Simulate(args) = cli.command else {
            panic!("expected simulate");
        };
        let config = simulation_config_from_args(&args).unwrap();
        assert_eq!(config.truth.scale(), [1.1, 1.0, 0.9]);
        assert_eq!(config.truth.bias(), [0.0, 0.0, 0.0]);
        assert!((config.noise - 0.01).abs() < 1e-12);
    }
}
