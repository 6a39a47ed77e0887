//! # segperm CLI
//!
//! Loads an address list, attaches segment ids from a crosswalk and numeric
//! variables (from a file, or synthetic standard-normal values), then runs the
//! within-block permutation test and prints averaged p-values per segment.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use segperm::csv::read_csv;
use segperm::report::{render_preview, render_pvalues, write_pvalues_csv, write_pvalues_json};
use segperm::synth::{add_synthetic_variables, DEFAULT_SYNTHETIC_SEED};
use segperm::{find_pvalues, Frame, HouseholdTable, Schema};

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum OutputFormat {
    Table,
    Csv,
    Json,
}

/// Command-line interface definition.
#[derive(Parser, Debug)]
#[command(
    name = "segperm",
    version,
    about = "Tests whether household values cluster by street segment within blocks."
)]
struct Args {
    /// Address list (CSV) with household and block keys
    #[arg(long)]
    addresses: PathBuf,

    /// Household-to-segment crosswalk (CSV), joined on the household key
    #[arg(long)]
    crosswalk: Option<PathBuf>,

    /// Segment column in the crosswalk, renamed to the segment key after the join
    #[arg(long = "crosswalk-segment-column", default_value = "TLID_match")]
    crosswalk_segment_column: String,

    /// Numeric variables (CSV) keyed by household; synthetic values are used if absent
    #[arg(long)]
    data: Option<PathBuf>,

    /// Seed for synthetic variables
    #[arg(long = "synthetic-seed", default_value_t = DEFAULT_SYNTHETIC_SEED)]
    synthetic_seed: u64,

    /// Tracked variables (comma-separated)
    #[arg(long, value_delimiter = ',', default_value = "A,B,C,D,E")]
    variables: Vec<String>,

    #[arg(long = "household-column", default_value = "MAFID")]
    household_column: String,

    #[arg(long = "block-column", default_value = "BLKID")]
    block_column: String,

    #[arg(long = "segment-column", default_value = "TLID")]
    segment_column: String,

    /// Number of within-block shuffles
    #[arg(long, default_value_t = 10)]
    iterations: usize,

    /// Worker threads for the shuffles (defaults to all cores)
    #[arg(long)]
    threads: Option<usize>,

    /// Decimal places in the terminal table
    #[arg(long, default_value_t = 3)]
    round: usize,

    /// Mark averaged p-values at or below this cutoff with `*`
    #[arg(long)]
    alpha: Option<f64>,

    /// Write the report here instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    format: OutputFormat,

    /// Rows of the merged input to log before running
    #[arg(long, default_value_t = 5)]
    preview: usize,
}

impl Args {
    fn schema(&self) -> Schema {
        Schema {
            household: self.household_column.clone(),
            block: self.block_column.clone(),
            segment: self.segment_column.clone(),
            variables: self.variables.clone(),
        }
    }
}

fn main() {
    init_tracing();

    if let Err(err) = run() {
        error!(error = %err, "run failed");
        for cause in err.chain().skip(1) {
            error!(cause = %cause, "caused by");
        }
        std::process::exit(1);
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/* ---------------------------------------------------------------------------
 *  Input assembly
 * ---------------------------------------------------------------------------
 * addresses ⋈ crosswalk (household key) → rename crosswalk segment column →
 * ⋈ variables (household key), or synthetic variables when no file is given.
 */
fn load_input(args: &Args, schema: &Schema) -> Result<Frame> {
    let mut merged = read_csv(&args.addresses)
        .with_context(|| format!("failed to read addresses: {}", args.addresses.display()))?;

    if let Some(path) = &args.crosswalk {
        let xwalk = read_csv(path)
            .with_context(|| format!("failed to read crosswalk: {}", path.display()))?;
        merged = merged
            .inner_join(&xwalk, &schema.household)
            .context("failed to join crosswalk onto addresses")?;
        merged
            .rename_column(&args.crosswalk_segment_column, &schema.segment)
            .context("failed to rename crosswalk segment column")?;
    }

    match &args.data {
        Some(path) => {
            let data = read_csv(path)
                .with_context(|| format!("failed to read variables: {}", path.display()))?;
            merged = merged
                .inner_join(&data, &schema.household)
                .context("failed to join variables")?;
        }
        None => add_synthetic_variables(&mut merged, &schema.variables, args.synthetic_seed)
            .context("failed to generate synthetic variables")?,
    }

    Ok(merged)
}

fn run() -> Result<()> {
    let args = Args::parse();
    if args.iterations == 0 {
        bail!("--iterations must be at least 1");
    }
    if let Some(threads) = args.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("failed to configure worker threads")?;
    }

    let schema = args.schema();
    let merged = load_input(&args, &schema)?;
    info!(rows = merged.len(), "merged input\n{}", render_preview(&merged, args.preview));

    let mut table = HouseholdTable::from_frame(&merged, schema)
        .context("merged input does not match the column schema")?;
    let pvals = find_pvalues(&mut table, args.iterations)?;

    let mut out: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path)
                .with_context(|| format!("failed to create output: {}", path.display()))?,
        )),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    };
    match args.format {
        OutputFormat::Table => writeln!(out, "{}", render_pvalues(&pvals, args.round, args.alpha))?,
        OutputFormat::Csv => write_pvalues_csv(&mut out, &pvals)?,
        OutputFormat::Json => write_pvalues_json(&mut out, &pvals)?,
    }
    out.flush()?;

    info!(segments = pvals.len(), "done");
    Ok(())
}
