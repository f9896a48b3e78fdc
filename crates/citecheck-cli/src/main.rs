use std::io::{self, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use owo_colors::{OwoColorize, Style};

use citecheck_core::{Analysis, check_document};
use citecheck_reporting::{ExportFormat, Report, export_results};

mod config;

use config::{CliOverrides, Settings};

/// Citation Checker - Convert a Word document to Markdown and verify that every
/// inline citation has an entry in its reference list
#[derive(Parser, Debug)]
#[command(name = "citecheck", version, about, long_about = None)]
struct Args {
    /// Path to the document to check (.docx, or .md/.markdown/.txt)
    input: PathBuf,

    /// Where to write the converted Markdown (default: input with a .md extension)
    output: Option<PathBuf>,

    /// Print rule hit counts, sample citations and reference entries
    #[arg(short, long)]
    verbose: bool,

    /// Path to the validation report (default: <input-stem>.validation_report.txt)
    #[arg(long)]
    report: Option<PathBuf>,

    /// Also write the results as JSON to this path
    #[arg(long)]
    json: Option<PathBuf>,

    /// Extra reference-section heading (repeatable)
    #[arg(long = "heading", value_name = "TITLE")]
    headings: Vec<String>,

    /// Also look for inline citations inside the reference section
    #[arg(long)]
    scan_reference_section: bool,

    /// Path to a TOML config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,

    /// Do not print the report to stdout
    #[arg(short, long)]
    quiet: bool,
}

/// Console printer that only emits ANSI styles when enabled.
struct Console<W: Write> {
    out: W,
    color: bool,
}

impl<W: Write> Console<W> {
    fn paint(&self, text: &str, style: Style) -> String {
        if self.color {
            text.style(style).to_string()
        } else {
            text.to_string()
        }
    }

    fn step(&mut self, msg: &str) -> io::Result<()> {
        let line = self.paint(msg, Style::new().bold());
        writeln!(self.out, "{line}")
    }

    fn ok(&mut self, msg: &str) -> io::Result<()> {
        let mark = self.paint("✓", Style::new().green().bold());
        writeln!(self.out, "{mark} {msg}")
    }

    fn warn(&mut self, msg: &str) -> io::Result<()> {
        let mark = self.paint("⚠", Style::new().yellow().bold());
        writeln!(self.out, "{mark} {msg}")
    }

    fn fail(&mut self, msg: &str) -> io::Result<()> {
        let mark = self.paint("✗", Style::new().red().bold());
        writeln!(self.out, "{mark} {msg}")
    }

    fn detail(&mut self, msg: &str) -> io::Result<()> {
        let line = self.paint(msg, Style::new().dimmed());
        writeln!(self.out, "{line}")
    }
}

fn default_markup_path(input: &Path) -> PathBuf {
    input.with_extension("md")
}

fn default_report_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "document".to_string());
    input.with_file_name(format!("{stem}.validation_report.txt"))
}

fn print_diagnostics<W: Write>(
    console: &mut Console<W>,
    analysis: &Analysis,
    settings: &Settings,
) -> io::Result<()> {
    let limit = settings.sample_limit;

    for hits in analysis.rule_hits.iter().filter(|h| h.count > 0) {
        console.detail(&format!("  Rule {} matched: {} citations", hits.rule, hits.count))?;
    }
    if !analysis.citations.is_empty() {
        console.detail("  Sample inline citations detected:")?;
        for c in analysis.citations.iter().take(limit) {
            console.detail(&format!("    - {} ({}, line {})", c.display, c.raw, c.line))?;
        }
    }

    match &analysis.section {
        Some(section) => {
            console.detail(&format!(
                "  Found reference section at line {}: '{}'",
                section.heading_line, section.heading
            ))?;
            if !section.entries.is_empty() {
                console.detail("  Sample reference list entries:")?;
                for e in section.entries.iter().take(limit) {
                    console.detail(&format!("    - {}", e.raw))?;
                }
            }
        }
        None => {
            console.detail(&format!(
                "  Looked for headings: {}",
                analysis.searched_headings.join(", ")
            ))?;
            let headings = analysis.headings();
            if headings.is_empty() {
                console.detail("  The document contains no headings")?;
            } else {
                console.detail("  Headings in the document:")?;
                for h in headings {
                    console.detail(&format!(
                        "    Line {}: {} {}",
                        h.line,
                        "#".repeat(h.level),
                        h.title
                    ))?;
                }
            }
        }
    }
    Ok(())
}

/// Check one document, write its artifacts and return the process exit code.
fn run<W: Write>(args: Args, settings: Settings, console: &mut Console<W>) -> anyhow::Result<u8> {
    let document = args.input.display().to_string();

    console.step(&format!("Converting {document} to Markdown..."))?;
    let analysis = check_document(&args.input, &settings.core)
        .with_context(|| format!("Failed to process {document}"))?;
    if !analysis.conversion_warnings.is_empty() {
        console.warn("Conversion warnings:")?;
        for warning in &analysis.conversion_warnings {
            console.detail(&format!("  - {warning}"))?;
        }
    }
    console.ok("Conversion completed")?;

    console.ok(&format!(
        "Found {} unique inline citations",
        analysis.citations.len()
    ))?;
    match &analysis.section {
        Some(section) => console.ok(&format!(
            "Found {} entries in reference list",
            section.entries.len()
        ))?,
        None => console.warn("Could not find reference section")?,
    }
    if settings.verbose {
        print_diagnostics(console, &analysis, &settings)?;
    }

    let report = export_results(&document, &analysis, ExportFormat::Text)?;
    if !args.quiet {
        writeln!(console.out)?;
        write!(console.out, "{report}")?;
    }

    let markup_path = args
        .output
        .clone()
        .unwrap_or_else(|| default_markup_path(&args.input));
    if markup_path != args.input {
        std::fs::write(&markup_path, &analysis.markdown)
            .with_context(|| format!("Failed to write {}", markup_path.display()))?;
        console.ok(&format!("Markdown saved to {}", markup_path.display()))?;
    }

    let report_path = args
        .report
        .clone()
        .unwrap_or_else(|| default_report_path(&args.input));
    std::fs::write(&report_path, &report)
        .with_context(|| format!("Failed to write {}", report_path.display()))?;
    console.ok(&format!("Report saved to {}", report_path.display()))?;

    if let Some(json_path) = &args.json {
        let json = export_results(&document, &analysis, ExportFormat::Json)?;
        std::fs::write(json_path, json)
            .with_context(|| format!("Failed to write {}", json_path.display()))?;
        console.ok(&format!("JSON saved to {}", json_path.display()))?;
    }

    let outcome = Report::new(&document, &analysis);
    if outcome.passed {
        console.ok("All inline citations are accounted for")?;
    } else {
        console.fail(&format!(
            "{} inline citation(s) missing from the reference list",
            outcome.stats.missing
        ))?;
    }
    Ok(outcome.exit_code())
}

fn main() -> anyhow::Result<ExitCode> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let overrides = CliOverrides {
        config: args.config.clone(),
        headings: args.headings.clone(),
        scan_reference_section: args.scan_reference_section,
        verbose: args.verbose,
        no_color: args.no_color,
    };
    let settings = Settings::resolve(overrides, |key| std::env::var(key).ok())?;

    let level = if settings.verbose { "info" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .target(env_logger::Target::Stderr)
        .init();

    let stdout = io::stdout();
    let color = settings.color && stdout.is_terminal();
    let mut console = Console {
        out: stdout.lock(),
        color,
    };
    let code = run(args, settings, &mut console)?;
    Ok(ExitCode::from(code))
}
