//! Macroscope CLI
//!
//! Command-line driver for macro exploration.

use anyhow::Result;
use clap::{Parser, Subcommand};
use macroscope_core::config::Config;
use macroscope_core::SourceRegion;
use macroscope_explore::diff_step;
use macroscope_parser::scan::MacroScanner;
use macroscope_query::ExplorationEngine;
use macroscope_sched::Priority;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "macroscope")]
#[command(author, version, about = "Macro expansion exploration tool", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List macro definitions in a source file
    Macros {
        /// Source file
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Output format (json, text)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show the expansion steps at a source position
    Expand {
        /// Source file
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Byte offset of the position
        #[arg(short, long)]
        offset: usize,

        /// Selection length in bytes (0 for a caret)
        #[arg(short, long, default_value_t = 0)]
        length: usize,

        /// Output format (json, text)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show the highlight ranges for one expansion step
    Diff {
        /// Source file
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Byte offset of the position
        #[arg(short, long)]
        offset: usize,

        /// Step index to diff
        #[arg(short, long, default_value_t = 0)]
        step: usize,
    },

    /// Scan a directory tree for macro definitions
    Scan {
        /// Directory to scan
        #[arg(value_name = "DIR")]
        dir: PathBuf,

        /// Output format (json, text)
        #[arg(short, long, default_value = "text")]
        format: String,
    },
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Macros { file, format } => cmd_macros(&file, &format)?,
        Commands::Expand {
            file,
            offset,
            length,
            format,
        } => cmd_expand(&file, offset, length, &format)?,
        Commands::Diff { file, offset, step } => cmd_diff(&file, offset, step)?,
        Commands::Scan { dir, format } => cmd_scan(&dir, &format)?,
    }

    Ok(())
}

fn cmd_macros(file: &PathBuf, format: &str) -> Result<()> {
    let engine = ExplorationEngine::new();
    let Some(entries) = engine.macros(file, Priority::Interactive) else {
        anyhow::bail!("could not parse {}", file.display());
    };

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    println!("🔍 Macros in {}:", file.display());
    println!();
    for entry in &entries {
        if entry.body.is_empty() {
            println!("  #define {}", entry.signature);
        } else {
            println!("  #define {} {}", entry.signature, entry.body);
        }
        println!("     at offset {}", entry.offset);
    }
    println!();
    println!("  {} definitions", entries.len());

    Ok(())
}

fn cmd_expand(file: &PathBuf, offset: usize, length: usize, format: &str) -> Result<()> {
    let engine = ExplorationEngine::new();
    let region = SourceRegion::new(offset, length);
    let allow_selection = length > 0;

    let Some(session) = engine.explore(file, region, allow_selection, Priority::Interactive) else {
        println!("No macro at {}:{}", file.display(), offset);
        return Ok(());
    };

    if format == "json" {
        let steps: Vec<_> = (0..session.step_count())
            .filter_map(|i| session.step_at(i))
            .collect();
        let result = serde_json::json!({
            "file": file.to_string_lossy(),
            "step_count": session.step_count(),
            "steps": steps,
            "full_expansion": session.full_expansion(),
        });
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    println!("🔎 Expansion at {}:{}", file.display(), offset);
    println!();
    for index in 0..session.step_count() {
        let Some(step) = session.step_at(index) else {
            break;
        };
        println!("  Step {}: {}", index, step.code_before_step);
        println!("     expands {}", step.expanded_macro.signature());
        if let Some(text) = session.definition_text_at(index) {
            if !text.is_empty() {
                println!("     via {}", text);
            }
        }
        println!("     → {}", step.code_after_step);
        println!();
    }
    println!("  Full expansion: {}", session.full_expansion().code_after_step);
    if session.was_truncated() {
        println!("  (step ceiling reached; history truncated)");
    }

    Ok(())
}

fn cmd_diff(file: &PathBuf, offset: usize, step_index: usize) -> Result<()> {
    let engine = ExplorationEngine::new();
    let region = SourceRegion::point(offset);

    let Some(session) = engine.explore(file, region, false, Priority::Interactive) else {
        println!("No macro at {}:{}", file.display(), offset);
        return Ok(());
    };
    let Some(step) = session.step_at(step_index) else {
        anyhow::bail!(
            "step {} out of range (0..{})",
            step_index,
            session.step_count()
        );
    };

    let (before, after) = diff_step(step, 0);

    println!("🔀 Step {} of {}:", step.index, session.step_count());
    println!();
    println!("  before: {}", step.code_before_step);
    for range in &before {
        println!("     deleted  [{}, +{}]", range.start, range.length);
    }
    println!("  after:  {}", step.code_after_step);
    for range in &after {
        println!("     inserted [{}, +{}]", range.start, range.length);
    }

    Ok(())
}

fn cmd_scan(dir: &PathBuf, format: &str) -> Result<()> {
    let config = Config::default();
    let scanner = MacroScanner::new(config.scan)?;
    let report = scanner.scan(dir);

    if format == "json" {
        let result = serde_json::json!({
            "files_parsed": report.files_parsed,
            "entries": report.entries,
            "errors": report.errors,
        });
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    println!("📂 Scanned {}: {} files", dir.display(), report.files_parsed);
    println!();
    for entry in &report.entries {
        println!("  {}  ({})", entry.signature, entry.file);
    }
    println!();
    println!("  {} definitions", report.entries.len());
    for error in &report.errors {
        println!("  ⚠ {}", error);
    }

    Ok(())
}
