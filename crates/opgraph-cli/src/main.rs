//! opgraph command line tools.
//!
//! Provides the `opgraph` binary for working with saved node graph projects
//! outside the editor. `reconcile` replays a compilation event against a
//! project and reports what the type update engine changed; `dependents`
//! and `check-cycle` expose the structural queries.
//!
//! Library settings come from the `OPGRAPH_*` environment variables; the
//! flags below override them.

use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use opgraph_core::{Connection, SymbolId};
use opgraph_project::{load_operators, load_project, save_project, ProjectConfig, ProjectFile, SymbolLibrary};

/// opgraph node graph tools.
#[derive(Parser)]
#[command(name = "opgraph", about = "opgraph node graph tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Apply compiled operator metadata to a project and report the changes.
    Reconcile {
        /// Path to the project file.
        #[arg(short, long)]
        project: PathBuf,

        /// Path to the operator manifest of the new compilation.
        #[arg(short = 'O', long)]
        operators: PathBuf,

        /// Reconcile symbols one after another.
        #[arg(long)]
        no_parallel: bool,

        /// Keep connections to removed slots in depending symbols.
        #[arg(long)]
        no_prune: bool,

        /// Do not flag depending symbols as modified.
        #[arg(long)]
        no_flag_dependents: bool,

        /// Write the updated project here.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List the symbols that place the given symbol as a child.
    Dependents {
        /// Path to the project file.
        #[arg(short, long)]
        project: PathBuf,

        /// Symbol ID.
        #[arg(short, long)]
        symbol: Uuid,
    },

    /// Check whether a connection would create a cycle in a symbol.
    CheckCycle {
        /// Path to the project file.
        #[arg(short, long)]
        project: PathBuf,

        /// Symbol ID.
        #[arg(short, long)]
        symbol: Uuid,

        /// The candidate connection as JSON.
        #[arg(short, long)]
        connection: String,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let exit_code = match cli.command {
        Commands::Reconcile {
            project,
            operators,
            no_parallel,
            no_prune,
            no_flag_dependents,
            output,
        } => {
            let mut config = ProjectConfig::from_env();
            if no_parallel {
                config.parallel_updates = false;
            }
            if no_prune {
                config.prune_dependents = false;
            }
            if no_flag_dependents {
                config.flag_dependents = false;
            }
            run_reconcile(&project, &operators, config, output.as_deref())
        }
        Commands::Dependents { project, symbol } => run_dependents(&project, SymbolId(symbol)),
        Commands::CheckCycle {
            project,
            symbol,
            connection,
        } => run_check_cycle(&project, SymbolId(symbol), &connection),
    };
    process::exit(exit_code);
}

/// Loads a project file into a library.
///
/// Returns the library and the home symbol, or the exit code on failure.
fn open_project(path: &Path, config: ProjectConfig) -> Result<(SymbolLibrary, Option<SymbolId>), i32> {
    let project: ProjectFile = match load_project(path) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Error: failed to load project '{}': {}", path.display(), e);
            return Err(3);
        }
    };
    let home = project.home;
    match SymbolLibrary::from_project(project, config) {
        Ok(library) => Ok((library, home)),
        Err(e) => {
            eprintln!("Error: invalid project '{}': {}", path.display(), e);
            Err(3)
        }
    }
}

/// Execute the reconcile subcommand.
///
/// Returns exit code: 0 = success, 1 = some symbols failed to update,
/// 3 = I/O or format error.
fn run_reconcile(project_path: &Path, operators_path: &Path, config: ProjectConfig, output: Option<&Path>) -> i32 {
    let (library, home) = match open_project(project_path, config) {
        Ok(opened) => opened,
        Err(code) => return code,
    };

    let registry = match load_operators(operators_path) {
        Ok(manifest) => manifest.into_registry(),
        Err(e) => {
            eprintln!("Error: failed to load operators '{}': {}", operators_path.display(), e);
            return 3;
        }
    };

    // Live instances make the pass exercise runtime slots and wiring too.
    if let Some(home) = home {
        if let Err(e) = library.create_instance(home, None) {
            eprintln!("Error: failed to instantiate home symbol {}: {}", home, e);
            return 1;
        }
    }

    let report = match library.apply_compilation(registry) {
        Ok(report) => report,
        Err(e) => {
            eprintln!("Error: compilation could not be applied: {}", e);
            return 1;
        }
    };

    let json = serde_json::to_string_pretty(&report)
        .unwrap_or_else(|e| format!("{{\"error\": \"failed to serialize report: {}\"}}", e));
    println!("{}", json);

    if let Some(output) = output {
        if let Err(e) = save_project(output, &library.to_project_file(home)) {
            eprintln!("Error: failed to write project '{}': {}", output.display(), e);
            return 3;
        }
    }

    if report.has_failures() {
        eprintln!("{} symbol(s) failed to update", report.failed.len());
        return 1;
    }
    0
}

/// Execute the dependents subcommand.
fn run_dependents(project_path: &Path, symbol: SymbolId) -> i32 {
    let (library, _) = match open_project(project_path, ProjectConfig::from_env()) {
        Ok(opened) => opened,
        Err(code) => return code,
    };
    if library.symbol(symbol).is_none() {
        eprintln!("Error: symbol {} not found", symbol);
        return 1;
    }

    let dependents = library.collect_depending_symbols(symbol);
    match serde_json::to_string_pretty(&dependents) {
        Ok(json) => {
            println!("{}", json);
            0
        }
        Err(e) => {
            eprintln!("Error: failed to serialize result: {}", e);
            3
        }
    }
}

/// Execute the check-cycle subcommand.
///
/// Prints `true` or `false`; exits 0 either way.
fn run_check_cycle(project_path: &Path, symbol: SymbolId, connection: &str) -> i32 {
    let connection: Connection = match serde_json::from_str(connection) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: invalid connection JSON: {}", e);
            return 1;
        }
    };
    let (library, _) = match open_project(project_path, ProjectConfig::from_env()) {
        Ok(opened) => opened,
        Err(code) => return code,
    };

    match library.check_for_cycle(symbol, &connection) {
        Ok(cycle) => {
            if cycle {
                tracing::debug!("This action is not allowed. This connection would create a cycle.");
            }
            println!("{}", cycle);
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}
