//! CLI argument parsing via `clap`.

use crate::config::CliOverrides;
use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "csroll",
    version,
    about = "Roll a C# solution into one reviewable file",
    long_about = "csroll collects the C# sources of selected projects in a .sln/.slnx solution and writes them, with project manifests and compiler/analyzer diagnostics, into a single .cs or .md file.\n\nConfiguration precedence: CLI > csroll.toml > defaults.",
    after_help = "Examples:\n  csroll roll\n  csroll roll --sln src/App.sln --projects src/Web/Web.csproj,src/Core/Core.csproj --format md\n  csroll roll --analysis-mode None --report json\n  csroll projects --sln App.slnx",
    arg_required_else_help = true
)]
/// Top-level CLI options and subcommands.
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Args, Clone, Default)]
/// Options shared by commands that open a solution.
pub struct SolutionArgs {
    #[arg(long, help = "Directory searched for the solution and csroll.toml (default: current dir)")]
    pub dir: Option<String>,
    #[arg(long, help = "Path to the .sln or .slnx file, relative to --dir")]
    pub sln: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show version
    #[command(about = "Show version", long_about = "Print the current csroll version.")]
    Version,
    /// Roll selected projects into one file
    #[command(
        about = "Roll sources into one file",
        long_about = "Resolve the source files of the selected projects, collect diagnostics and write the rolled output. Exit codes: 0 ok, 1 fatal, 2 solution/projects not found, 3 no C# files collected.",
        after_help = "Examples:\n  csroll roll --out review/Roll.cs\n  csroll roll --include-generated --no-eval"
    )]
    Roll {
        #[command(flatten)]
        solution: SolutionArgs,
        #[arg(long, value_delimiter = ',', help = "Project manifests to roll, comma-separated (default: all)")]
        projects: Vec<String>,
        #[arg(long, help = "Output file, relative to the solution directory")]
        out: Option<String>,
        #[arg(long, help = "Output format: cs|md (default: cs)")]
        format: Option<String>,
        #[arg(long, action = clap::ArgAction::SetTrue, help = "Keep generated sources (*.g.cs, *.Designer.cs, ...)")]
        include_generated: bool,
        #[arg(long, action = clap::ArgAction::SetTrue, help = "Skip build evaluation and scan the filesystem")]
        no_eval: bool,
        #[arg(long, help = "Analysis mode: Default|Recommended|Minimum|All|None")]
        analysis_mode: Option<String>,
        #[arg(long, help = "Report mode: human|json (default: human)")]
        report: Option<String>,
    },
    /// List the C# projects of a solution
    #[command(
        about = "List projects",
        long_about = "Print the C# projects found in the solution, in roll order."
    )]
    Projects {
        #[command(flatten)]
        solution: SolutionArgs,
        #[arg(long, help = "Report mode: human|json (default: human)")]
        report: Option<String>,
    },
}

impl Commands {
    /// CLI values in the shape the config resolver expects. Boolean flags
    /// only override the config file when set.
    pub fn overrides(&self) -> CliOverrides {
        match self {
            Commands::Version => CliOverrides::default(),
            Commands::Roll {
                solution,
                projects,
                out,
                format,
                include_generated,
                no_eval,
                analysis_mode,
                report,
            } => CliOverrides {
                dir: solution.dir.clone(),
                solution: solution.sln.clone(),
                projects: projects.clone(),
                output: out.clone(),
                format: format.clone(),
                include_generated: include_generated.then_some(true),
                no_evaluation: no_eval.then_some(true),
                analysis_mode: analysis_mode.clone(),
                report: report.clone(),
            },
            Commands::Projects { solution, report } => CliOverrides {
                dir: solution.dir.clone(),
                solution: solution.sln.clone(),
                report: report.clone(),
                ..Default::default()
            },
        }
    }
}
