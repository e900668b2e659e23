use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use docmerge::{Context, Document, Evaluator, Models, Outline, Registry, Sheet, Value};
use tracing_subscriber::EnvFilter;

/// Mail-merge runner: resolve expressions, evaluate a template outline or
/// calculate a sheet against JSON models.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Resolve one path expression and print its text.
    Resolve {
        /// Path expression, e.g. `order.items.1.name` or `total?`
        path: String,
        /// JSON model file; repeat to add fallback models
        #[arg(long = "model")]
        models: Vec<PathBuf>,
        /// Label quoted in error messages
        #[arg(long)]
        label: Option<String>,
    },
    /// Evaluate a JSON template outline and print the result.
    Evaluate {
        /// Template outline (JSON)
        template: PathBuf,
        /// JSON model file; repeat to add fallback models
        #[arg(long = "model")]
        models: Vec<PathBuf>,
        /// Render digits as kanji numerals
        #[arg(long)]
        vertical: bool,
        /// Label quoted in error messages (defaults to the template file name)
        #[arg(long)]
        label: Option<String>,
        /// Treat the first model file as an array and merge one copy per element
        #[arg(long)]
        merge: bool,
    },
    /// Fill the noted cells of a JSON sheet and print the result.
    Calculate {
        /// Sheet (JSON)
        sheet: PathBuf,
        /// JSON model file; repeat to add fallback models
        #[arg(long = "model")]
        models: Vec<PathBuf>,
        /// Label quoted in error messages (defaults to the sheet file name)
        #[arg(long)]
        label: Option<String>,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    match run(args.command) {
        Ok(out) => println!("{out}"),
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    }
}

fn run(command: Command) -> Result<String, Box<dyn std::error::Error>> {
    match command {
        Command::Resolve { path, models, label } => {
            let models = Models::new(read_models(&models)?);
            let evaluator = Evaluator::new(Registry::with_builtins()).with_context(context(label, false));
            Ok(evaluator.resolve(&path, &models)?.to_text())
        }
        Command::Evaluate { template, models, vertical, label, merge } => {
            let outline: Outline = serde_json::from_str(&fs::read_to_string(&template)?)?;
            let mut document = Document::from_outline(&outline);
            let label = label.or_else(|| file_name(&template));
            let evaluator = Evaluator::new(Registry::with_builtins()).with_context(context(label, vertical));

            let mut models = read_models(&models)?;
            let result = if merge {
                if models.is_empty() {
                    return Err("--merge needs at least one --model file".into());
                }
                let merged = match models.remove(0) {
                    Value::List(items) => items,
                    other => return Err(format!("--merge expects a JSON array, got {}", other.type_name()).into()),
                };
                evaluator.evaluate_and_merge(&document, &merged, &Models::new(models))?
            } else {
                evaluator.evaluate(&mut document, &Models::new(models))?;
                document
            };
            Ok(serde_json::to_string_pretty(&result.to_outline())?)
        }
        Command::Calculate { sheet, models, label } => {
            let mut parsed: Sheet = serde_json::from_str(&fs::read_to_string(&sheet)?)?;
            let label = label.or_else(|| file_name(&sheet));
            let evaluator = Evaluator::new(Registry::with_builtins()).with_context(context(label, false));
            evaluator.calculate(&mut parsed, &Models::new(read_models(&models)?))?;
            Ok(serde_json::to_string_pretty(&parsed)?)
        }
    }
}

fn context(label: Option<String>, vertical: bool) -> Context {
    let ctx = Context::default().vertical(vertical);
    match label {
        Some(label) => ctx.with_file_name(label),
        None => ctx,
    }
}

fn read_models(files: &[PathBuf]) -> Result<Vec<Value>, Box<dyn std::error::Error>> {
    files
        .iter()
        .map(|file| -> Result<Value, Box<dyn std::error::Error>> {
            let json: serde_json::Value = serde_json::from_str(&fs::read_to_string(file)?)?;
            Ok(Value::from(json))
        })
        .collect()
}

fn file_name(path: &Path) -> Option<String> {
    path.file_name().map(|n| n.to_string_lossy().into_owned())
}
