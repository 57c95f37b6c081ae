//! csroll CLI binary entry point.
//! Resolves configuration, runs the requested command and maps failures to
//! exit codes.

use clap::Parser;
use csroll::analysis::DotnetBuildEngine;
use csroll::cancel::CancelToken;
use csroll::cli::{Cli, Commands};
use csroll::config::{self, Effective};
use csroll::error::{Result, RollError};
use csroll::evaluate::ManifestEvaluator;
use csroll::logging::{self, LoggingConfig};
use csroll::models::{ProjectHandle, RollOptions};
use csroll::output;
use csroll::paths::PathIdentity;
use csroll::resolver::SourceResolver;
use csroll::roll::RollAssembler;
use csroll::{solution, writer};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

fn main() {
    let cli = Cli::parse();
    if let Commands::Version = cli.cmd {
        println!("{}", env!("CARGO_PKG_VERSION"));
        return;
    }

    let eff = match config::resolve_effective(&cli.cmd.overrides()) {
        Ok(eff) => eff,
        Err(e) => fail(e),
    };
    logging::init_logging(LoggingConfig::resolve(
        eff.log_level.as_deref(),
        eff.log_json,
        cli.verbose,
    ));
    debug!(root = %eff.config_root.display(), "configuration resolved");

    let res = match cli.cmd {
        Commands::Projects { .. } => run_projects(&eff),
        Commands::Roll { .. } => run_roll(&eff),
        Commands::Version => Ok(()),
    };
    if let Err(e) = res {
        fail(e);
    }
}

fn fail(e: RollError) -> ! {
    eprintln!("{} {}", output::error_prefix(), e);
    std::process::exit(e.exit_code());
}

/// Locate the solution and list its C# projects.
fn open_solution(
    eff: &Effective,
    identity: &PathIdentity,
) -> Result<(PathBuf, PathBuf, Vec<ProjectHandle>)> {
    let explicit = eff
        .solution
        .as_ref()
        .map(|p| p.to_string_lossy().to_string());
    let sln = solution::resolve_solution(explicit.as_deref(), &eff.search_dir, identity)?;
    let sln_dir = sln
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| eff.search_dir.clone());
    let projects = solution::read_projects(&sln, identity)?;
    if projects.is_empty() {
        return Err(RollError::NoProjects(sln));
    }
    Ok((sln, sln_dir, projects))
}

fn run_projects(eff: &Effective) -> Result<()> {
    let identity = PathIdentity::for_host();
    let (sln, _, projects) = open_solution(eff, &identity)?;
    output::print_projects(&projects, &sln, &eff.report);
    Ok(())
}

fn run_roll(eff: &Effective) -> Result<()> {
    let identity = PathIdentity::for_host();
    if eff.report != "json" && config::load_config(&eff.config_root)?.is_none() {
        eprintln!("{} No csroll.toml found; using defaults.", output::note_prefix());
    }

    let (sln, sln_dir, projects) = open_solution(eff, &identity)?;
    let selected = solution::select_projects(&projects, &sln_dir, &eff.projects, &identity)?;
    let output_path =
        solution::resolve_output(eff.output.as_deref(), eff.format, &sln_dir, &identity);
    info!(
        solution = %sln.display(),
        selected = selected.len(),
        output = %output_path.display(),
        "rolling"
    );

    let options = RollOptions {
        include_generated: eff.include_generated,
        skip_evaluation: eff.no_evaluation,
        analysis_mode: eff.analysis_mode,
    };
    let resolver = SourceResolver::standard(identity, Box::new(ManifestEvaluator));
    let assembler = RollAssembler::new(identity, resolver, options);
    let mut engine = DotnetBuildEngine::new(identity, eff.analysis_mode);
    // only library callers cancel; Ctrl+C ends the process here
    let bundle = assembler.assemble(&sln, &selected, &mut engine, &CancelToken::new())?;

    let text = writer::render(&bundle, eff.format, &sln_dir);
    if let Some(parent) = output_path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&output_path, text)?;

    output::print_report(&bundle, &output_path, &sln_dir, &eff.report);
    Ok(())
}
