//! diffgrade CLI.
//!
//! Grades catalog submissions against their reference and prints the run
//! result as JSON.

use clap::{Parser, Subcommand};
use diffgrade::{Catalog, GradeError, RunOptions, RunnerArgs};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Exit code when every check passed.
const EXIT_PASS: u8 = 0;
/// Exit code for test failures, mismatches, missing members, and timeouts.
const EXIT_FAIL: u8 = 1;
/// Exit code for broken references and bad invocations.
const EXIT_CONFIG: u8 = 2;

#[derive(Parser)]
#[command(name = "diffgrade")]
#[command(about = "Differential grading of submissions against a reference", long_about = None)]
#[command(version)]
struct Cli {
    /// Log debug events to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version information
    Version,

    /// List catalog questions and their submissions
    List,

    /// Grade one submission of a catalog question
    Check {
        /// Question name
        question: String,
        /// Submission name
        submission: String,
        /// Solution name; the default solution when omitted
        #[arg(long, default_value = "")]
        solution: String,
        /// Random seed
        #[arg(long, default_value_t = 0)]
        seed: u64,
        /// Number of counted tests
        #[arg(long)]
        tests: Option<u32>,
        /// Wall-clock budget in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,
        /// Skip the structural check
        #[arg(long)]
        no_design_check: bool,
        /// Also write the result JSON here
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Print the declaration shape of a question's class as JSON
    Shape {
        /// Question name
        question: String,
        /// Show this submission's class instead of the reference
        #[arg(long)]
        submission: Option<String>,
    },
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let catalog = Catalog::builtin();

    match cli.command {
        Some(Commands::Version) => {
            println!("diffgrade v{}", env!("CARGO_PKG_VERSION"));
            println!("Differential grading engine");
            ExitCode::SUCCESS
        }
        None => {
            println!("diffgrade v{}", env!("CARGO_PKG_VERSION"));
            println!("Use --help for usage information");
            ExitCode::SUCCESS
        }
        Some(Commands::List) => {
            for entry in catalog.entries() {
                let submissions: Vec<&str> = entry.submission_names().collect();
                println!("{:<10} {} [{}]", entry.name(), entry.description(), submissions.join(", "));
            }
            ExitCode::SUCCESS
        }
        Some(Commands::Check {
            question,
            submission,
            solution,
            seed,
            tests,
            timeout_ms,
            no_design_check,
            output,
        }) => {
            let Some(entry) = catalog.get(&question) else {
                eprintln!("error: unknown question {:?}", question);
                return ExitCode::from(EXIT_CONFIG);
            };
            let Some(space) = entry.build_submission(&submission) else {
                eprintln!("error: question {} has no submission {:?}", question, submission);
                return ExitCode::from(EXIT_CONFIG);
            };
            let loaded = match entry.load(&solution) {
                Ok(q) => q,
                Err(err) => return report_error(&err),
            };

            let mut options = RunOptions::default().with_args(RunnerArgs {
                num_tests: tests,
                ..RunnerArgs::default()
            });
            if let Some(ms) = timeout_ms {
                options = options.with_timeout(Duration::from_millis(ms));
            }
            if no_design_check {
                options = options.with_design_check(false);
            }

            let result = match loaded.run(&space, loaded.class(), seed, &options) {
                Ok(result) => result,
                Err(err) => return report_error(&err),
            };
            match result.to_json() {
                Ok(json) => println!("{}", json),
                Err(err) => {
                    eprintln!("error: could not serialize result: {}", err);
                    return ExitCode::from(EXIT_CONFIG);
                }
            }
            if let Some(path) = output {
                if let Err(err) = result.save(&path) {
                    eprintln!("error: could not write {}: {}", path.display(), err);
                    return ExitCode::from(EXIT_CONFIG);
                }
            }
            eprintln!("{}", result.summary());
            if result.passed() {
                ExitCode::from(EXIT_PASS)
            } else {
                ExitCode::from(EXIT_FAIL)
            }
        }
        Some(Commands::Shape { question, submission }) => {
            let Some(entry) = catalog.get(&question) else {
                eprintln!("error: unknown question {:?}", question);
                return ExitCode::from(EXIT_CONFIG);
            };
            let config = entry.config();
            let space = match &submission {
                Some(name) => match entry.build_submission(name) {
                    Some(space) => space,
                    None => {
                        eprintln!("error: question {} has no submission {:?}", question, name);
                        return ExitCode::from(EXIT_CONFIG);
                    }
                },
                None => config.reference().clone(),
            };
            let Some(shape) = space.shape(config.class()) else {
                eprintln!("error: class {} not found", config.class());
                return ExitCode::from(EXIT_FAIL);
            };
            match serde_json::to_string_pretty(&shape) {
                Ok(json) => {
                    println!("{}", json);
                    ExitCode::SUCCESS
                }
                Err(err) => {
                    eprintln!("error: could not serialize shape: {}", err);
                    ExitCode::from(EXIT_CONFIG)
                }
            }
        }
    }
}

fn report_error(err: &GradeError) -> ExitCode {
    eprintln!("error [{}]: {}", err.name(), err);
    match err {
        GradeError::ClassDesign(_) | GradeError::StructuralMismatch { .. } => ExitCode::from(EXIT_FAIL),
        GradeError::Configuration { .. } | GradeError::Verification { .. } | GradeError::Fatal(_) => {
            ExitCode::from(EXIT_CONFIG)
        }
    }
}
