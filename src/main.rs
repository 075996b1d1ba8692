//! PDF Redaction CLI Application.
//!
//! Scans documents for sensitive terms, writes the matches as JSON and
//! burns them into a redacted copy of the document.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use redactkit::render::PageRenderer;
use redactkit::{
    redact_pdf, scan_pdf, EngineConfig, Match, MuPdfRenderer, ScanMode, ScanReport,
    TesseractConfig,
};

/// PDF Redaction Tool
///
/// Finds sensitive text (named patterns such as email, phone, date, iban,
/// bsn, credit_card, or any regular expression) and destroys it.
/// By default scans and redacts in one go; see the subcommands for the
/// two-step workflow.
#[derive(Parser)]
#[command(name = "redactkit")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Input PDF file path
    #[arg(short, long, value_name = "FILE")]
    input: Option<PathBuf>,

    /// Output PDF file path
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Terms to redact: a pattern name or a regular expression (repeatable)
    #[arg(short, long, value_name = "TERM")]
    term: Vec<String>,

    /// Only use the document's text layer, never OCR
    #[arg(long, global = true)]
    no_ocr: bool,

    /// JSON engine configuration file
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Tesseract executable
    #[arg(long, value_name = "PATH", global = true)]
    tesseract: Option<PathBuf>,

    /// OCR language
    #[arg(long, value_name = "LANG", global = true, default_value = "eng")]
    lang: String,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Find matches and print them as JSON
    Scan {
        /// Input PDF file path
        #[arg(short, long, value_name = "FILE")]
        input: PathBuf,

        /// Terms to find (repeatable)
        #[arg(short, long, value_name = "TERM", required = true)]
        term: Vec<String>,

        /// Output JSON file (optional, defaults to stdout)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Redact the matches of a previous scan
    Redact {
        /// Input PDF file path
        #[arg(short, long, value_name = "FILE")]
        input: PathBuf,

        /// Scan report or match list in JSON
        #[arg(short, long, value_name = "FILE")]
        matches: PathBuf,

        /// Output PDF file path
        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,
    },

    /// Print the text layer of a PDF (for debugging and verification)
    Extract {
        /// Input PDF file path
        #[arg(short, long, value_name = "FILE")]
        input: PathBuf,

        /// Output text file (optional, defaults to stdout)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
}

/// Command handler holding the resolved configuration.
struct CommandHandler {
    config: EngineConfig,
    tesseract: TesseractConfig,
    verbose: bool,
}

impl CommandHandler {
    fn from_cli(cli: &Cli) -> Result<Self> {
        let mut config = match &cli.config {
            Some(path) => EngineConfig::from_json_file(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => EngineConfig::default(),
        };
        if cli.no_ocr {
            config = config.with_scan_mode(ScanMode::Native);
        }
        let tesseract = TesseractConfig {
            binary_path: cli.tesseract.clone(),
            lang: cli.lang.clone(),
            ..TesseractConfig::default()
        };
        Ok(Self {
            config,
            tesseract,
            verbose: cli.verbose,
        })
    }

    fn read_input(input: &Path) -> Result<Vec<u8>> {
        if !input.exists() {
            anyhow::bail!("Input file does not exist: {}", input.display());
        }
        std::fs::read(input).with_context(|| format!("Failed to read {}", input.display()))
    }

    fn scan(&self, input: &Path, terms: &[String]) -> Result<ScanReport> {
        if terms.iter().all(|t| t.trim().is_empty()) {
            anyhow::bail!("No terms specified. Use --term with a pattern name or regex.");
        }
        let bytes = Self::read_input(input)?;
        let report = scan_pdf(&bytes, terms, &self.config, &self.tesseract)
            .with_context(|| "Scan failed")?;
        if self.verbose {
            eprintln!("Input:   {}", input.display());
            eprintln!("Pages:   {}", report.pages.len());
            eprintln!("Matches: {}", report.matches.len());
        }
        Ok(report)
    }

    fn scan_to(&self, input: &Path, terms: &[String], output: Option<&Path>) -> Result<()> {
        let report = self.scan(input, terms)?;
        let json = serde_json::to_string_pretty(&report)?;
        match output {
            Some(path) => {
                std::fs::write(path, json)
                    .with_context(|| format!("Failed to write to {}", path.display()))?;
                println!(
                    "✓ Found {} match(es) → {}",
                    report.matches.len(),
                    path.display()
                );
            }
            None => println!("{}", json),
        }
        Ok(())
    }

    fn redact(&self, input: &Path, output: &Path, report: &ScanReport) -> Result<()> {
        let bytes = Self::read_input(input)?;
        let redacted = redact_pdf(&bytes, &report.matches, &report.rotations(), &self.config)
            .with_context(|| "Redaction failed")?;
        std::fs::write(output, &redacted.bytes)
            .with_context(|| format!("Failed to write to {}", output.display()))?;

        let result = &redacted.result;
        if self.verbose {
            println!("\nRedaction Summary:");
            println!("  Pages processed:    {}", result.pages_processed);
            println!("  Pages rasterized:   {}", result.pages_rasterized);
            println!("  Pages copied:       {}", result.pages_copied);
            println!("  Copy fallbacks:     {}", result.copy_fallbacks);
            println!("  Pages blanked:      {}", result.pages_blanked);
            println!("  Instances redacted: {}", result.instances_redacted);
        }

        if result.has_redactions() {
            println!(
                "✓ Successfully redacted {} instance(s) → {}",
                result.instances_redacted,
                output.display()
            );
        } else {
            println!("⚠ No instances found to redact → {}", output.display());
        }
        Ok(())
    }

    fn redact_from_file(&self, input: &Path, matches: &Path, output: &Path) -> Result<()> {
        let raw = std::fs::read_to_string(matches)
            .with_context(|| format!("Failed to read {}", matches.display()))?;
        let report = parse_matches(&raw)
            .with_context(|| format!("Invalid match file {}", matches.display()))?;
        self.redact(input, output, &report)
    }

    fn extract(&self, input: &Path, output: Option<&Path>) -> Result<()> {
        let renderer = MuPdfRenderer::from_bytes(&Self::read_input(input)?)
            .with_context(|| "Failed to open document")?;

        let mut text = String::new();
        for page in 0..renderer.page_count() {
            let blocks = renderer
                .extract_structured_text(page)
                .with_context(|| format!("Text extraction failed on page {}", page + 1))?;
            text.push_str(&format!("--- page {} ---\n", page + 1));
            for block in blocks {
                text.push_str(&block.text);
                text.push('\n');
            }
        }

        if let Some(output_path) = output {
            std::fs::write(output_path, &text)
                .with_context(|| format!("Failed to write to {}", output_path.display()))?;
            println!(
                "✓ Extracted {} characters → {}",
                text.len(),
                output_path.display()
            );
        } else {
            print!("{}", text);
        }
        Ok(())
    }
}

/// Accepts a full scan report or a bare match list.
fn parse_matches(raw: &str) -> Result<ScanReport> {
    if let Ok(report) = serde_json::from_str::<ScanReport>(raw) {
        return Ok(report);
    }
    let matches: Vec<Match> = serde_json::from_str(raw)?;
    Ok(ScanReport {
        pages: Vec::new(),
        matches,
    })
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(if cli.verbose { "debug" } else { "warn" }),
    )
    .init();
    let handler = CommandHandler::from_cli(&cli)?;

    match &cli.command {
        Some(Commands::Scan {
            input,
            term,
            output,
        }) => {
            handler.scan_to(input, term, output.as_deref())?;
        }
        Some(Commands::Redact {
            input,
            matches,
            output,
        }) => {
            handler.redact_from_file(input, matches, output)?;
        }
        Some(Commands::Extract { input, output }) => {
            handler.extract(input, output.as_deref())?;
        }
        None => {
            // Default: scan and redact in one go
            let input = cli
                .input
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("--input is required"))?;
            let output = cli
                .output
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("--output is required"))?;
            let report = handler.scan(input, &cli.term)?;
            handler.redact(input, output, &report)?;
        }
    }

    Ok(())
}
