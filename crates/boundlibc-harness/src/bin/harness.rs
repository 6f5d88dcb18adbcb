//! CLI entrypoint for the boundlibc contract harness.

use std::path::PathBuf;

use boundlibc_harness::structured_log::{ArtifactIndex, LogEmitter, LogLevel, validate_log_file};
use boundlibc_harness::{CaseResult, HarnessError, builtin_suite};
use boundlibc_membrane::SafetyLevel;
use clap::{Parser, Subcommand};

/// Contract tooling for boundlibc.
#[derive(Debug, Parser)]
#[command(name = "boundlibc-harness")]
#[command(about = "Contract testing harness for boundlibc guarded operations")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the built-in contract catalog.
    Contracts {
        /// Restrict the run to one guarded function (e.g. "memcpy_s").
        #[arg(long)]
        function: Option<String>,
        /// Safety mode: strict, hardened, off or all.
        #[arg(long, default_value = "all")]
        mode: String,
        /// Structured JSONL log path (if omitted, verdicts print to stdout).
        #[arg(long)]
        log: Option<PathBuf>,
        /// Artifact index JSON path; requires --log.
        #[arg(long, requires = "log")]
        artifact_index: Option<PathBuf>,
        /// Run identifier embedded in trace ids.
        #[arg(long, default_value = "contracts")]
        run_id: String,
    },
    /// Validate a structured JSONL log against the log schema.
    ValidateLog {
        /// Structured JSONL log path.
        #[arg(long)]
        log: PathBuf,
    },
}

fn parse_modes(raw: &str) -> Result<Vec<SafetyLevel>, HarnessError> {
    match raw.to_ascii_lowercase().as_str() {
        "all" => Ok(vec![SafetyLevel::Strict, SafetyLevel::Hardened, SafetyLevel::Off]),
        "strict" => Ok(vec![SafetyLevel::Strict]),
        "hardened" => Ok(vec![SafetyLevel::Hardened]),
        "off" => Ok(vec![SafetyLevel::Off]),
        _ => Err(HarnessError::UnknownMode(raw.to_string())),
    }
}

fn run_contracts(
    function: Option<&str>,
    modes: &[SafetyLevel],
    log: Option<&PathBuf>,
    artifact_index: Option<&PathBuf>,
    run_id: &str,
) -> Result<(), HarnessError> {
    let mut suite = builtin_suite();
    if let Some(name) = function {
        suite = suite.only(name);
        if suite.cases().is_empty() {
            return Err(HarnessError::NoCases(name.to_string()));
        }
    }

    let mut emitter = match log {
        Some(path) => LogEmitter::to_file(path, run_id)?,
        None => LogEmitter::to_stdout(run_id),
    };
    emitter.emit(LogLevel::Info, "run_start")?;

    let mut results: Vec<CaseResult> = Vec::new();
    for &level in modes {
        for result in suite.run(level) {
            emitter.emit_case(&result)?;
            results.push(result);
        }
    }
    emitter.emit(LogLevel::Info, "run_end")?;
    emitter.flush()?;

    if let (Some(log_path), Some(index_path)) = (log, artifact_index) {
        let mut index = ArtifactIndex::new(run_id);
        index.add_file(log_path, "log")?;
        std::fs::write(index_path, index.to_json()?)?;
    }

    let failed = results.iter().filter(|r| !r.passed).count();
    for result in results.iter().filter(|r| !r.passed) {
        eprintln!(
            "FAIL {} [{}] expected {} observed {}",
            result.id, result.mode, result.expected, result.observed
        );
        for failure in &result.failures {
            eprintln!("    {failure}");
        }
    }
    eprintln!(
        "{} of {} contract cases passed",
        results.len() - failed,
        results.len()
    );
    if failed > 0 {
        return Err(HarnessError::ContractFailures {
            failed,
            total: results.len(),
        });
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Command::Contracts {
            function,
            mode,
            log,
            artifact_index,
            run_id,
        } => {
            let modes = parse_modes(&mode)?;
            run_contracts(
                function.as_deref(),
                &modes,
                log.as_ref(),
                artifact_index.as_ref(),
                &run_id,
            )?;
        }
        Command::ValidateLog { log } => {
            let (lines, errors) = validate_log_file(&log)?;
            for error in &errors {
                eprintln!("{error}");
            }
            if !errors.is_empty() {
                return Err(HarnessError::InvalidLog {
                    lines,
                    errors: errors.len(),
                }
                .into());
            }
            eprintln!("{} log lines valid", lines);
        }
    }

    Ok(())
}
