use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use quid_core::{PeriodHint, ProgressUpdate};
use quid_ingest::{DocumentKind, RawDocument, StatementParser, tabular};
use std::path::PathBuf;

mod config;

#[derive(Parser, Debug)]
#[command(name = "quid", version, about = "Parse bank and creditor statements into transactions")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Parse a statement file and print the extracted transactions
    Parse {
        file: PathBuf,

        /// Print the full outcome as JSON instead of a table
        #[arg(long)]
        json: bool,

        /// Statement period end year, for statements with year-less dates
        #[arg(long)]
        year: Option<i32>,

        /// Statement period end month (1-12), used with --year
        #[arg(long, default_value_t = 12)]
        month: u32,
    },

    /// Suggest a column mapping for a tabular statement without importing
    Detect {
        file: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Parse { file, json, year, month } => parse_statement(file, json, year, month),
        Command::Detect { file } => detect_mapping(file),
    }
}

fn read_document(file: &PathBuf) -> Result<RawDocument> {
    if !file.exists() {
        bail!("file not found: {}", file.display());
    }
    let bytes = std::fs::read(file).with_context(|| format!("read {}", file.display()))?;
    let filename = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(RawDocument::new(bytes, filename))
}

fn parse_statement(file: PathBuf, json: bool, year: Option<i32>, month: u32) -> Result<()> {
    let cfg = config::load_config()?;
    let doc = read_document(&file)?;

    let mut parser = StatementParser::new().with_ocr_engine(Box::new(cfg.ocr_engine()));
    if let Some(year) = year {
        if !(1..=12).contains(&month) {
            bail!("--month must be 1-12, got {month}");
        }
        parser = parser.with_period_hint(PeriodHint::new(year, month));
    }

    let sink = quid_core::FnSink(|update: ProgressUpdate| {
        eprintln!("[{:>3}%] {}", update.percent, update.message);
    });
    let outcome = parser
        .parse(&doc, &sink)
        .with_context(|| format!("parsing {}", file.display()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }

    println!(
        "Parsed {} transaction(s) from {} (quality {}/100)",
        outcome.transactions.len(),
        file.display(),
        outcome.quality.score
    );
    if let Some(bank) = &outcome.bank {
        println!("Provider: {bank} ({})", outcome.account_kind.label());
    }
    if let Some(balance) = outcome.starting_balance {
        println!("Starting balance: {balance:.2}");
    }
    if let Some(rate) = outcome.interest_rate {
        println!("Interest rate: {rate}%");
    }
    println!();
    for t in &outcome.transactions {
        let balance = t
            .balance
            .map(|b| format!("{b:>12.2}"))
            .unwrap_or_else(|| " ".repeat(12));
        println!("{}  {:>10.2}  {}  {}", t.date, t.amount, balance, t.description);
    }
    Ok(())
}

fn detect_mapping(file: PathBuf) -> Result<()> {
    let doc = read_document(&file)?;
    let kind = DocumentKind::from_filename(&doc.filename)
        .filter(|k| matches!(k, DocumentKind::Csv | DocumentKind::Xls | DocumentKind::Xlsx));
    let Some(kind) = kind else {
        bail!("detect works on tabular files (csv/xls/xlsx): {}", file.display());
    };

    let parsed = tabular::parse_tabular(kind, &doc.bytes, PeriodHint::current())
        .with_context(|| format!("reading {}", file.display()))?;

    println!("Suggested mapping for {}:", file.display());
    for a in &parsed.mapping.assignments {
        // Confidences are [0,1] internally; print as percentages.
        println!("  {:<12} -> {:<24} ({:.0}%)", format!("{:?}", a.role), a.header, a.confidence * 100.0);
    }
    if parsed.mapping.missing_mandatory.is_empty() {
        println!("All mandatory roles covered.");
    } else {
        for role in &parsed.mapping.missing_mandatory {
            println!("  missing mandatory role: {role:?}");
        }
    }
    Ok(())
}
