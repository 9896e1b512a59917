use clap::{ArgAction, Parser};
use confc::api::OutputFormat;
use confc::batch::{resolve_all, BatchConfig};
use confc::config::{PreDefinition, ResolveOptions};
use confc::error::ConfcError;
use confc::schema::Schema;
use log::{info, LevelFilter};
use miette::Report;
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

/// Resolve configuration templates (includes, macros, conditionals) into JSON documents.
#[derive(Parser, Debug)]
#[command(name = "confc", version, about)]
struct Args {
    /// Root template files
    #[arg(required = true, value_name = "ROOT")]
    roots: Vec<PathBuf>,

    /// Add a directory to the include search path
    #[arg(short = 'I', value_name = "DIR")]
    include: Vec<PathBuf>,

    /// Define a macro (a bare NAME is defined to 1)
    #[arg(short = 'D', value_name = "NAME[=VALUE]")]
    define: Vec<PreDefinition>,

    /// Parse roots as plain documents without running directives
    #[arg(long)]
    no_preprocess: bool,

    /// Print the files included by each root instead of the document
    #[arg(long)]
    list_includes: bool,

    /// Validate against a JSON or YAML schema file
    #[arg(long, value_name = "FILE", conflicts_with = "simulation_schema")]
    schema: Option<PathBuf>,

    /// Validate against the built-in simulation schema
    #[arg(long)]
    simulation_schema: bool,

    /// Write YAML instead of JSON
    #[arg(long, conflicts_with = "compact")]
    yaml: bool,

    /// Write single-line JSON
    #[arg(long)]
    compact: bool,

    /// Number of roots resolved in parallel
    #[arg(short = 'j', long, value_name = "N")]
    jobs: Option<usize>,

    /// Write each document to DIR/<stem>.json (or .yaml) instead of stdout
    #[arg(long, value_name = "DIR")]
    out_dir: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short = 'v', long, action = ArgAction::Count)]
    verbose: u8,
}

fn init_logging(verbose: u8) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    match verbose {
        0 => {}
        1 => {
            builder.filter_level(LevelFilter::Debug);
        }
        _ => {
            builder.filter_level(LevelFilter::Trace);
        }
    }
    builder.format_timestamp(None).init();
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    match run(args) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("{:?}", Report::new(err));
            ExitCode::FAILURE
        }
    }
}

/// Returns `Ok(false)` when some root failed; its errors have already been reported.
fn run(args: Args) -> Result<bool, ConfcError> {
    let options =
        ResolveOptions::from_env(args.include, args.define)?.no_preprocess(args.no_preprocess);

    let schema = match (&args.schema, args.simulation_schema) {
        (Some(path), _) => Some(Schema::from_file(path)?),
        (None, true) => Some(Schema::simulation()),
        (None, false) => None,
    };
    let format = if args.yaml {
        OutputFormat::Yaml
    } else if args.compact {
        OutputFormat::JsonCompact
    } else {
        OutputFormat::Json
    };

    let mut config = BatchConfig {
        schema,
        ..Default::default()
    };
    if let Some(jobs) = args.jobs {
        config.max_threads = jobs.max(1);
    }

    let results = resolve_all(&args.roots, &options, &config);
    info!("{}", results.summary());
    if !results.is_success() {
        for (_, result) in results.outcomes {
            if let Err(err) = result {
                eprintln!("{:?}", Report::new(err));
            }
        }
        for path in &results.skipped {
            eprintln!("skipped {}: not resolved after an earlier failure", path.display());
        }
        return Ok(false);
    }

    // Everything is rendered before anything is written.
    let mut rendered = Vec::with_capacity(results.outcomes.len());
    for (path, result) in results.outcomes {
        let resolution = result?;
        let text = if args.list_includes {
            resolution
                .includes
                .iter()
                .map(|p| format!("{}\n", p.display()))
                .collect::<String>()
        } else {
            let mut text = resolution.render(format)?;
            if !text.ends_with('\n') {
                text.push('\n');
            }
            text
        };
        rendered.push((path, text));
    }

    match &args.out_dir {
        Some(dir) => write_files(dir, &rendered, format.extension())?,
        None => write_stdout(&rendered)?,
    }
    Ok(true)
}

/// Roots are written as `<dir>/<stem>.<extension>`; two roots with the same stem fail
/// the run before anything is written.
fn write_files(dir: &Path, rendered: &[(PathBuf, String)], extension: &str) -> Result<(), ConfcError> {
    let output_error = |path: &Path, e: std::io::Error| ConfcError::Output {
        path: path.display().to_string(),
        reason: e.to_string(),
    };

    let mut targets: HashMap<PathBuf, &Path> = HashMap::new();
    let mut planned = Vec::with_capacity(rendered.len());
    for (root, text) in rendered {
        let stem = root.file_stem().map_or_else(
            || "document".to_string(),
            |s| s.to_string_lossy().into_owned(),
        );
        let target = dir.join(format!("{}.{}", stem, extension));
        if let Some(previous) = targets.insert(target.clone(), root.as_path()) {
            return Err(ConfcError::Output {
                path: target.display().to_string(),
                reason: format!(
                    "both {} and {} would be written to this file",
                    previous.display(),
                    root.display()
                ),
            });
        }
        planned.push((target, text));
    }

    fs::create_dir_all(dir).map_err(|e| output_error(dir, e))?;
    for (target, text) in planned {
        fs::write(&target, text).map_err(|e| output_error(&target, e))?;
        info!("wrote {}", target.display());
    }
    Ok(())
}

fn write_stdout(rendered: &[(PathBuf, String)]) -> Result<(), ConfcError> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    for (_, text) in rendered {
        out.write_all(text.as_bytes()).map_err(|e| ConfcError::Output {
            path: "<stdout>".to_string(),
            reason: e.to_string(),
        })?;
    }
    Ok(())
}
