//! Toolflow CLI - validate and compile workflow specs

use clap::{Parser, Subcommand};
use colored::Colorize;
use std::fs;
use std::path::{Path, PathBuf};

use toolflow::document::load_document;
use toolflow::error::{FixSuggestion, ToolflowError};
use toolflow::validate::{ValidationIssue, ValidationReport};
use toolflow::{Compiler, CompilerConfig};

#[derive(Parser)]
#[command(name = "toolflow")]
#[command(about = "Toolflow - compile tool-orchestration workflow specs into runnable programs")]
#[command(version)]
struct Cli {
    /// Config file (overrides TOOLFLOW_CONFIG and the default location)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a workflow document and list every issue
    Check {
        /// Path to workflow document (.json, or YAML)
        file: PathBuf,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Compile a workflow document to a Python program
    Compile {
        /// Path to workflow document (.json, or YAML)
        file: PathBuf,

        /// Output file (stdout if not specified)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List the distinct tools a workflow uses
    Tools {
        /// Path to workflow document
        file: PathBuf,
    },

    /// Print the canonical JSON form of a valid workflow
    Fmt {
        /// Path to workflow document
        file: PathBuf,
    },
}

fn main() {
    // Initialize tracing (stderr, so program text on stdout stays clean)
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    let result = CompilerConfig::load(cli.config.as_deref())
        .map(Compiler::new)
        .and_then(|compiler| match cli.command {
            Commands::Check { file, json } => check_workflow(&compiler, &file, json),
            Commands::Compile { file, output } => compile_workflow(&compiler, &file, output.as_deref()),
            Commands::Tools { file } => list_tools(&compiler, &file),
            Commands::Fmt { file } => format_workflow(&compiler, &file),
        });

    match result {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);
            if let Some(report) = e.report() {
                print_issues(report);
            }
            if let Some(suggestion) = e.fix_suggestion() {
                eprintln!("  {} {}", "Fix:".yellow(), suggestion);
            }
            std::process::exit(1);
        }
    }
}

fn print_issue(issue: &ValidationIssue, error: bool) {
    let path = if issue.path.is_empty() { "<document>" } else { issue.path.as_str() };
    let marker = if error { "✗".red() } else { "!".yellow() };
    eprintln!(
        "  {} {} {} {}",
        marker,
        format!("[{}]", issue.kind).dimmed(),
        path.cyan(),
        issue.message
    );
}

fn print_issues(report: &ValidationReport) {
    for issue in &report.errors {
        print_issue(issue, true);
    }
    for issue in &report.warnings {
        print_issue(issue, false);
    }
}

fn check_workflow(compiler: &Compiler, file: &Path, json: bool) -> Result<bool, ToolflowError> {
    let doc = load_document(file)?;
    let report = compiler.validator().check(&doc);

    if json {
        let text = serde_json::to_string_pretty(&report).map_err(|e| ToolflowError::SerializeError {
            details: e.to_string(),
        })?;
        println!("{}", text);
        return Ok(report.is_valid());
    }

    print_issues(&report);
    if report.is_valid() {
        println!("{} Workflow '{}' is valid", "✓".green(), file.display());
        if report.has_warnings() {
            println!("  Warnings: {}", report.warnings.len());
        }
    } else {
        println!("{} Workflow '{}' rejected: {}", "✗".red(), file.display(), report.summary());
    }
    Ok(report.is_valid())
}

fn compile_workflow(compiler: &Compiler, file: &Path, output: Option<&Path>) -> Result<bool, ToolflowError> {
    let doc = load_document(file)?;
    let program = compiler.compile(&doc)?;

    match output {
        Some(path) => {
            fs::write(path, &program.source)?;
            eprintln!("{} Wrote {}", "✓".green(), path.display());
        }
        None => print!("{}", program.source),
    }

    let tools: Vec<&str> = program.tools.iter().map(String::as_str).collect();
    eprintln!("  Tools: {}", tools.join(", "));
    if !program.secret_params.is_empty() {
        let secrets: Vec<&str> = program.secret_params.iter().map(String::as_str).collect();
        eprintln!("  Secrets (from environment): {}", secrets.join(", "));
    }
    eprintln!("  Spec hash: {}", program.spec_hash);
    Ok(true)
}

fn list_tools(compiler: &Compiler, file: &Path) -> Result<bool, ToolflowError> {
    let doc = load_document(file)?;
    let accepted = compiler.accept(&doc)?;
    for tool in accepted.spec().tool_names() {
        let marker = if compiler.config().library.contains_key(&tool) {
            "library".green()
        } else {
            "stub".yellow()
        };
        println!("{}\t{}", tool, marker);
    }
    Ok(true)
}

fn format_workflow(compiler: &Compiler, file: &Path) -> Result<bool, ToolflowError> {
    let doc = load_document(file)?;
    let accepted = compiler.accept(&doc)?;
    println!("{}", accepted.spec().to_json()?);
    Ok(true)
}
