//! Command-line interface for cem-analyzer.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::analysis::{AnalysisContext, AnalysisOutput};
use crate::config::{self, Config, DependencyConfig, DEFAULT_CONFIG_NAMES, TEMPLATE};
use crate::error::AnalyzeError;
use crate::plugins::{self, PluginPipeline};
use crate::report::{self, RunSummary};
use crate::watch::{self, WatchSession};

/// Exit codes.
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILED: i32 = 1;
pub const EXIT_ERROR: i32 = 2;

/// Generate a custom elements manifest from JavaScript and TypeScript sources.
///
/// Finds classes registered as custom elements, documents their members,
/// attributes, events, slots and CSS hooks, resolves inheritance across
/// modules and dependency packages, and writes `custom-elements.json`.
#[derive(Parser)]
#[command(name = "cem-analyzer")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Analyze a source tree and emit the manifest
    Analyze(AnalyzeArgs),
    /// Write a starter configuration file
    Init(InitArgs),
}

/// How diagnostics are printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DiagnosticsFormat {
    Pretty,
    Json,
}

/// Arguments for the analyze command.
#[derive(Parser, Debug)]
pub struct AnalyzeArgs {
    /// Root directory of the sources
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Path to a config file (default: auto-discover in PATH)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Include patterns, replacing the configured ones
    #[arg(long, num_args = 1..)]
    pub globs: Vec<String>,

    /// Exclude patterns, added to the configured ones
    #[arg(long, num_args = 1..)]
    pub exclude: Vec<String>,

    /// Directory to write custom-elements.json to
    #[arg(short, long)]
    pub outdir: Option<PathBuf>,

    /// Enable the Lit plugin
    #[arg(long)]
    pub lit: bool,

    /// Enable the FAST plugin
    #[arg(long)]
    pub fast: bool,

    /// Enable the Stencil plugin
    #[arg(long)]
    pub stencil: bool,

    /// Enable a plugin by name (repeatable)
    #[arg(long = "plugin")]
    pub plugins: Vec<String>,

    /// Dependency manifest as NAME=PATH (repeatable)
    #[arg(long = "dependency", value_parser = parse_dependency)]
    pub dependencies: Vec<DependencyConfig>,

    /// Print the manifest to stdout instead of writing a file
    #[arg(long)]
    pub stdout: bool,

    /// Diagnostics format
    #[arg(long, value_enum, default_value = "pretty")]
    pub diagnostics: DiagnosticsFormat,

    /// Keep running and re-analyze on file changes
    #[arg(short, long)]
    pub watch: bool,

    /// Verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

fn parse_dependency(value: &str) -> Result<DependencyConfig, String> {
    DependencyConfig::parse_arg(value).map_err(|e| e.to_string())
}

/// Arguments for the init command.
#[derive(Parser, Debug)]
pub struct InitArgs {
    /// Output file path
    #[arg(short, long, default_value = "cem.yaml")]
    pub output: PathBuf,
}

/// Load the config for a run and apply command-line overrides.
pub fn resolve_config(args: &AnalyzeArgs) -> anyhow::Result<Config> {
    let path = match &args.config {
        Some(p) => Some(p.clone()),
        None => config::discover(&args.path),
    };
    let mut config = match path {
        Some(p) => Config::parse_file(&p)
            .map_err(|e| anyhow::anyhow!("error parsing config {}: {}", p.display(), e))?,
        None => Config::default(),
    };

    if !args.globs.is_empty() {
        config.globs = args.globs.clone();
    }
    config.exclude.extend(args.exclude.iter().cloned());
    if let Some(ref outdir) = args.outdir {
        config.outdir = outdir.clone();
    }
    config.lit |= args.lit;
    config.fast |= args.fast;
    config.stencil |= args.stencil;
    config.plugins.extend(args.plugins.iter().cloned());
    for dep in &args.dependencies {
        config.dependencies.retain(|d| d.name != dep.name);
        config.dependencies.push(dep.clone());
    }
    config.watch |= args.watch;

    config::validate_config(&config)?;
    Ok(config)
}

/// Run the analyze command.
pub fn run_analyze(args: &AnalyzeArgs) -> anyhow::Result<i32> {
    let root = match args.path.canonicalize() {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Error: cannot access path {:?}: {}", args.path, e);
            return Ok(EXIT_ERROR);
        }
    };
    if !root.is_dir() {
        eprintln!("Error: {} is not a directory", root.display());
        return Ok(EXIT_ERROR);
    }

    let config = match resolve_config(args) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {}", e);
            return Ok(EXIT_ERROR);
        }
    };

    // Relative paths in the config are relative to the analyzed root.
    let packages = match config.load_packages(&root) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Error: {}", e);
            return Ok(EXIT_ERROR);
        }
    };
    let outdir = if config.outdir.is_absolute() {
        config.outdir.clone()
    } else {
        root.join(&config.outdir)
    };

    plugins::init();
    let (pipeline, unavailable) = PluginPipeline::from_names(&config.plugin_names());
    let context = AnalysisContext::new(pipeline)
        .with_packages(packages)
        .with_link_options(config.link_options())
        .with_diagnostics(unavailable);

    let sources = config.source_set(&root)?;
    let inputs = sources.inputs()?;
    if inputs.is_empty() && !config.watch {
        eprintln!("Warning: no source files matched {:?}", config.globs);
        return Ok(EXIT_FAILED);
    }

    context.analyze_sources(inputs);
    let mut code = emit(context.link(), &outdir, args)?;

    if config.watch {
        let session = WatchSession::new(&context, sources);
        watch::watch(&session, Duration::from_millis(config.debounce_ms), |result| {
            code = emit(result, &outdir, args)?;
            Ok(())
        })?;
    }

    Ok(code)
}

/// Emit one run's result and report diagnostics. Returns the exit code.
fn emit(
    result: Result<AnalysisOutput, AnalyzeError>,
    outdir: &Path,
    args: &AnalyzeArgs,
) -> anyhow::Result<i32> {
    let (code, summary_modules, diagnostics, dangling) = match &result {
        Ok(output) => {
            if args.stdout {
                report::print_manifest(&output.manifest)?;
            } else {
                let path = report::write_manifest(&output.manifest, outdir)?;
                eprintln!("Wrote {}", path.display());
            }
            (EXIT_SUCCESS, output.manifest.modules.len(), &output.diagnostics[..], &[][..])
        }
        Err(AnalyzeError::Validation {
            dangling,
            diagnostics,
        }) => (EXIT_FAILED, 0, &diagnostics[..], &dangling[..]),
        Err(e) => {
            eprintln!("Error: {}", e);
            (EXIT_FAILED, 0, e.diagnostics(), &[][..])
        }
    };

    let summary = RunSummary {
        passed: code == EXIT_SUCCESS,
        modules: summary_modules,
        diagnostics,
        dangling,
    };
    match args.diagnostics {
        DiagnosticsFormat::Json => report::write_diagnostics_json(&summary)?,
        DiagnosticsFormat::Pretty => report::write_diagnostics_pretty(&summary),
    }
    Ok(code)
}

/// Run the init command.
pub fn run_init(args: &InitArgs) -> anyhow::Result<i32> {
    if args.output.exists() {
        eprintln!("Error: file already exists: {}", args.output.display());
        eprintln!("Remove it or use --output to specify a different path");
        return Ok(EXIT_ERROR);
    }

    if let Some(parent) = args.output.parent() {
        if !parent.as_os_str().is_empty() && parent != Path::new(".") {
            if let Err(e) = std::fs::create_dir_all(parent) {
                eprintln!("Error: failed to create directory: {}", e);
                return Ok(EXIT_ERROR);
            }
        }
    }

    if let Err(e) = std::fs::write(&args.output, TEMPLATE) {
        eprintln!("Error: failed to write config: {}", e);
        return Ok(EXIT_ERROR);
    }

    println!("Created {}", args.output.display());
    println!();
    println!("Next steps:");
    println!("  1. Edit {} to match your sources", args.output.display());
    if !DEFAULT_CONFIG_NAMES.iter().any(|n| args.output.ends_with(n)) {
        println!(
            "  2. Run: cem-analyzer analyze . --config {}",
            args.output.display()
        );
    } else {
        println!("  2. Run: cem-analyzer analyze .");
    }

    Ok(EXIT_SUCCESS)
}
