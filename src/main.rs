//! folio - document to sectioned XHTML converter

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use folio::{Docx, Epub, EpubOptions, Error, Markdown, Result, Rewrites};

#[derive(Parser)]
#[command(name = "folio")]
#[command(version, about = "Convert EPUB, DOCX and Markdown to sectioned XHTML", long_about = None)]
#[command(after_help = "EXAMPLES:
    folio book.epub book.html       Rebuild EPUB sections as one XHTML article
    folio notes.md                  Print Markdown as a sectioned article
    folio paper.docx paper.xml      Write the flat OPC package of a DOCX
    folio -i book.epub              Show book metadata")]
struct Cli {
    /// Input file (EPUB, DOCX, or Markdown)
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// Output file (stdout when absent)
    #[arg(value_name = "OUTPUT")]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = Format::Auto)]
    format: Format,

    /// Show document metadata without converting
    #[arg(short, long)]
    info: bool,

    /// Write conversion warnings as JSON to this file
    #[arg(long, value_name = "JSON")]
    report: Option<PathBuf>,

    /// Regex cleanup table (pattern TAB replacement) run over EPUB sections
    #[arg(long, value_name = "TSV")]
    rewrites: Option<PathBuf>,

    /// Only log errors
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Log progress
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    /// html for EPUB and Markdown, tei-pkg for DOCX
    Auto,
    /// Sectioned XHTML article
    Html,
    /// Flat OPC package (DOCX only)
    TeiPkg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InputKind {
    Epub,
    Docx,
    Markdown,
}

impl InputKind {
    fn detect(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        match ext.as_str() {
            "epub" => Ok(Self::Epub),
            "docx" => Ok(Self::Docx),
            "md" | "markdown" | "txt" => Ok(Self::Markdown),
            _ => Err(Error::UnsupportedFormat(path.display().to_string())),
        }
    }
}

#[derive(Serialize)]
struct Report<'a> {
    input: &'a str,
    format: &'a str,
    warnings: &'a [String],
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli);

    let result = if cli.info {
        show_info(&cli.input)
    } else {
        convert(&cli)
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(cli: &Cli) {
    let filter = if cli.quiet {
        EnvFilter::new("error")
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn show_info(path: &Path) -> Result<()> {
    println!("File: {}", path.display());
    match InputKind::detect(path)? {
        InputKind::Epub => {
            let epub = Epub::open(path)?;
            let meta = epub.metadata();
            println!("Title: {}", meta.title);
            if !meta.creators.is_empty() {
                println!("Authors: {}", meta.creators.join(", "));
            }
            if !meta.language.is_empty() {
                println!("Language: {}", meta.language);
            }
            if !meta.identifier.is_empty() {
                println!("Identifier: {}", meta.identifier);
            }
            if let Some(ref publisher) = meta.publisher {
                println!("Publisher: {publisher}");
            }
            if let Some(ref date) = meta.date {
                println!("Date: {date}");
            }
            if let Some(ref desc) = meta.description {
                let desc = desc.trim();
                match desc.char_indices().nth(200) {
                    Some((cut, _)) => println!("Description: {}...", &desc[..cut]),
                    None => println!("Description: {desc}"),
                }
            }
            println!("Spine: {}", epub.package().spine.len());
            match epub.navigation() {
                Ok(root) => println!("Navigation entries: {}", root.content_count()),
                Err(e) => println!("Navigation: {e}"),
            }
            println!("Manifest: {}", epub.package().manifest.len());
        }
        InputKind::Docx => {
            let package = Docx::open(path)?.package()?;
            println!("Parts: {}", package.matches("<pkg:part ").count());
        }
        InputKind::Markdown => {
            let md = Markdown::open(path)?;
            println!("Lines: {}", md.source().lines().count());
        }
    }
    Ok(())
}

fn convert(cli: &Cli) -> Result<()> {
    let kind = InputKind::detect(&cli.input)?;
    let (output, warnings, format) = match (kind, cli.format) {
        (InputKind::Epub, Format::Auto | Format::Html) => {
            let mut options = EpubOptions::default();
            if let Some(path) = &cli.rewrites {
                options.rewrites = Rewrites::parse(&std::fs::read_to_string(path)?);
                tracing::debug!("{} rewrite rules from {}", options.rewrites.len(), path.display());
            }
            let epub = Epub::open(&cli.input)?.with_options(options);
            let html = epub.html()?;
            (html, epub.warnings(), "html")
        }
        (InputKind::Markdown, Format::Auto | Format::Html) => {
            (Markdown::open(&cli.input)?.html(), Vec::new(), "html")
        }
        (InputKind::Docx, Format::Auto | Format::TeiPkg) => {
            (Docx::open(&cli.input)?.package()?, Vec::new(), "tei-pkg")
        }
        (_, format) => {
            return Err(Error::UnsupportedFormat(format!(
                "{format:?} output from {}",
                cli.input.display()
            )));
        }
    };

    match &cli.output {
        Some(path) => {
            std::fs::write(path, &output)?;
            tracing::info!("{} -> {}", cli.input.display(), path.display());
        }
        None => print!("{output}"),
    }

    if !warnings.is_empty() {
        tracing::info!("{} warnings", warnings.len());
    }
    if let Some(path) = &cli.report {
        let input = cli.input.display().to_string();
        let report = Report {
            input: &input,
            format,
            warnings: &warnings,
        };
        let json = serde_json::to_string_pretty(&report).map_err(std::io::Error::other)?;
        std::fs::write(path, json)?;
    }
    Ok(())
}
