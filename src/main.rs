use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::{debug, info, warn};
use lopdf::Document;

mod combine;
mod numbering;
mod outline;
mod scoring;
mod spans;

use outline::Outline;
use scoring::{FontStats, ScoreConfig, SpacingProfile};
use spans::TextElement;

/// Infer a document outline (title + H1-H3 headings) from a PDF's layout.
#[derive(Parser)]
#[command(version, about)]
struct Args {
    /// PDF file, or a directory of PDFs for batch mode
    input: PathBuf,
    /// Output JSON file (single mode) or output directory (batch mode)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    if !args.input.exists() {
        bail!("input not found: {}", args.input.display());
    }

    if args.input.is_dir() {
        process_directory(&args.input, args.output.as_deref())
    } else {
        let output = args
            .output
            .unwrap_or_else(|| default_output_file(&args.input));
        process_one(&args.input, &output)
    }
}

/// Run every `*.pdf` in the directory through the pipeline, sorted by name.
/// A document that fails is logged and skipped; the batch continues.
fn process_directory(input_dir: &Path, output: Option<&Path>) -> Result<()> {
    let mut pdf_files: Vec<PathBuf> = fs::read_dir(input_dir)
        .with_context(|| format!("cannot read directory {}", input_dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .map(|e| e.eq_ignore_ascii_case("pdf"))
                .unwrap_or(false)
        })
        .collect();
    pdf_files.sort();

    if pdf_files.is_empty() {
        bail!("no PDF files found in {}", input_dir.display());
    }

    let output_dir = match output {
        Some(dir) => dir.to_path_buf(),
        None => default_output_dir(input_dir),
    };
    fs::create_dir_all(&output_dir)
        .with_context(|| format!("cannot create {}", output_dir.display()))?;

    for pdf in &pdf_files {
        let stem = pdf.file_stem().and_then(|s| s.to_str()).unwrap_or("output");
        let out_path = output_dir.join(format!("{}.json", stem));
        if let Err(e) = process_one(pdf, &out_path) {
            warn!("skipping {}: {:#}", pdf.display(), e);
        }
    }
    Ok(())
}

fn process_one(input: &Path, output: &Path) -> Result<()> {
    info!("processing {}", input.display());
    let outline = extract_outline(input)
        .with_context(|| format!("failed to process {}", input.display()))?;

    if let Some(parent) = output.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("cannot create {}", parent.display()))?;
        }
    }
    fs::write(output, serde_json::to_string_pretty(&outline)?)
        .with_context(|| format!("cannot write {}", output.display()))?;
    info!(
        "{}: \"{}\", {} outline entries",
        output.display(),
        outline.title,
        outline.outline.len()
    );
    Ok(())
}

fn extract_outline(pdf_path: &Path) -> Result<Outline> {
    let doc = Document::load(pdf_path)
        .with_context(|| format!("cannot load {}", pdf_path.display()))?;
    let elements = spans::extract_elements(&doc);
    info!("extracted {} text elements", elements.len());
    Ok(outline_from_elements(elements))
}

/// The whole heuristic pipeline after span extraction: combine detached
/// numbering prefixes, profile the document, score every element, assemble.
/// An empty element list degrades to a placeholder title and empty outline.
fn outline_from_elements(elements: Vec<TextElement>) -> Outline {
    if elements.is_empty() {
        return Outline {
            title: outline::UNTITLED.to_string(),
            outline: Vec::new(),
        };
    }

    let elements = combine::combine_numbered_headings(elements);
    let profile = SpacingProfile::from_elements(&elements);
    let stats = FontStats::from_elements(&elements);
    debug!(
        "body size {}, spacing thresholds before {:.1}/{:.1} after {:.1}/{:.1}",
        stats.body_size,
        profile.normal_before,
        profile.large_before,
        profile.normal_after,
        profile.large_after
    );

    let cfg = ScoreConfig::default();
    let candidates = elements
        .iter()
        .filter_map(|e| scoring::classify(e, &profile, &stats, &cfg))
        .collect();

    outline::assemble(candidates)
}

/// Single-file default: alongside the input with a `.json` extension, or
/// under `app/output` when the input follows the `app/input` convention.
fn default_output_file(input: &Path) -> PathBuf {
    if let Some(parent) = input.parent() {
        if parent.ends_with("app/input") {
            let stem = input.file_stem().and_then(|s| s.to_str()).unwrap_or("output");
            return Path::new("app/output").join(format!("{}.json", stem));
        }
    }
    input.with_extension("json")
}

/// Batch default: `app/output` for the `app/input` convention, otherwise a
/// sibling `output/` directory.
fn default_output_dir(input_dir: &Path) -> PathBuf {
    if input_dir.ends_with("app/input") {
        return PathBuf::from("app/output");
    }
    match input_dir.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.join("output"),
        _ => PathBuf::from("output"),
    }
}
