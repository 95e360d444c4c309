mod datalist;

use std::io::{stderr, stdout, Write};
use std::path::{Path, PathBuf};
use std::process::exit;

use anyhow::{anyhow, Context, Result};
use clap::{ArgAction, Parser};
use swathinfo::{
    summarize_batch, CancelToken, FormatHint, LonFlip, Options, Registry, Report, Run, Style,
};
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

/// Exit code for invocations without an input.
const EXIT_USAGE: i32 = 3;

#[derive(Debug, Clone)]
enum Format {
    Json,
    Text,
}

impl clap::ValueEnum for Format {
    fn value_variants<'a>() -> &'a [Self] {
        &[Self::Json, Self::Text]
    }

    fn to_possible_value(&self) -> Option<clap::builder::PossibleValue> {
        match self {
            Self::Json => Some(clap::builder::PossibleValue::new("json").alias("1")),
            Self::Text => Some(clap::builder::PossibleValue::new("text").alias("0")),
        }
    }
}

impl From<&Format> for Style {
    fn from(format: &Format) -> Self {
        match format {
            Format::Json => Style::Json,
            Format::Text => Style::Text,
        }
    }
}

/// Lists basic statistics of swath sonar data files.
///
/// Reports beam and pixel quality counts, navigation totals, the first and last ping, and
/// the limits of position, depth and amplitude.
#[derive(Parser)]
#[command(name = "swathinfo")]
struct Cli {
    /// Swath data file, or a datalist when the format is -1.
    #[arg(short = 'I', long, value_name = "path")]
    input: Option<PathBuf>,

    /// Format id; 0 detects the format and -1 reads a datalist.
    #[arg(short = 'F', long, default_value_t = 0, allow_hyphen_values = true)]
    format: i32,

    /// Output style.
    #[arg(short = 'X', long, default_value = "text")]
    style: Format,

    /// Longitude convention: -1 for [-360, 0), 0 for [-180, 180], 1 for [0, 360).
    #[arg(
        short = 'L',
        long,
        default_value_t = 0,
        allow_hyphen_values = true,
        value_parser = clap::value_parser!(i32).range(-1..=1)
    )]
    lonflip: i32,

    /// Increase log verbosity; may be repeated. Ignored if SWATHINFO_LOG is set.
    #[arg(short = 'V', long = "verbose", action = ArgAction::Count)]
    verbose: u8,

    /// Worker threads used for datalists.
    #[arg(long)]
    threads: Option<usize>,
}

fn log_level(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Exit code for a failure, taken from the library error kind when there is one.
fn exit_code(err: &anyhow::Error) -> i32 {
    err.downcast_ref::<swathinfo::Error>()
        .map_or(1, |err| err.kind().exit_code())
}

fn write_output(doc: &str) -> Result<()> {
    let mut out = stdout().lock();
    out.write_all(doc.as_bytes()).context("writing to stdout")?;
    out.flush().context("writing to stdout")
}

fn summarize_one(
    registry: &Registry,
    input: &Path,
    hint: FormatHint,
    options: &Options,
) -> Result<i32> {
    let mut run = Run::new(registry, options).with_cancel(CancelToken::new());
    let (file, summary) = run.summarize(input, hint)?;
    let doc = run.render(&file, &summary)?;
    debug!(state = ?run.state(), "run complete");
    write_output(&doc)?;
    Ok(0)
}

fn summarize_datalist(registry: &Registry, input: &Path, options: &Options) -> Result<i32> {
    let entries = datalist::read(input)
        .with_context(|| format!("Unable to open data list file: {}", input.display()))?;
    info!(entries = entries.len(), "read datalist");

    let batch = summarize_batch(registry, entries, options, &CancelToken::new());
    for (entry, err) in batch.failures() {
        error!(path = ?entry.path, "{err}");
    }
    if let Some((file, summary)) = batch.merged() {
        let doc = Report::new(&file, &summary).render(options.style)?;
        write_output(&doc)?;
    }
    Ok(batch.exit_code())
}

fn run(cli: &Cli) -> Result<i32> {
    let Some(input) = &cli.input else {
        println!("initialization failed");
        return Ok(EXIT_USAGE);
    };
    let lonflip = LonFlip::try_from(cli.lonflip).map_err(|e| anyhow!(e))?;
    let mut options = Options::builder()
        .lonflip(lonflip)
        .style(Style::from(&cli.style))
        .build();
    options.threads = cli.threads;
    let registry = Registry::default();

    match FormatHint::from(cli.format) {
        FormatHint::Datalist => summarize_datalist(&registry, input, &options),
        hint => summarize_one(&registry, input, hint, &options),
    }
}

fn main() {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_target(false)
        .with_writer(stderr)
        .with_ansi(false)
        .without_time()
        .with_env_filter(
            EnvFilter::try_from_env("SWATHINFO_LOG")
                .unwrap_or_else(|_| EnvFilter::new(log_level(cli.verbose))),
        )
        .init();

    debug!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));

    match run(&cli) {
        Ok(code) => exit(code),
        Err(err) => {
            eprintln!("{err:#}");
            exit(exit_code(&err));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_swath_tool_flags() {
        let cli = Cli::try_parse_from([
            "swathinfo",
            "-X1",
            "-F-1",
            "-L",
            "-1",
            "-VV",
            "-Ilist.mb-1",
        ])
        .unwrap();
        assert!(matches!(cli.style, Format::Json));
        assert_eq!(cli.format, -1);
        assert_eq!(cli.lonflip, -1);
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.input, Some(PathBuf::from("list.mb-1")));
    }

    #[test]
    fn lonflip_out_of_range() {
        assert!(Cli::try_parse_from(["swathinfo", "-L", "2"]).is_err());
    }

    #[test]
    fn levels() {
        assert_eq!(log_level(0), "warn");
        assert_eq!(log_level(2), "debug");
        assert_eq!(log_level(9), "trace");
    }

    #[test]
    fn missing_input() {
        let cli = Cli::try_parse_from(["swathinfo"]).unwrap();
        assert_eq!(run(&cli).unwrap(), EXIT_USAGE);
    }

    #[test]
    fn missing_datalist_exit_code() {
        let cli = Cli::try_parse_from(["swathinfo", "-F-1", "-Idatalist.mb-1"]).unwrap();
        let err = run(&cli).unwrap_err();
        assert_eq!(exit_code(&err), 2);
        assert!(format!("{err:#}").contains("Unable to open data list file: datalist.mb-1"));
    }

    #[test]
    fn unknown_format_exit_code() {
        let cli = Cli::try_parse_from(["swathinfo", "-F", "9999", "-Ifile.mb9999"]).unwrap();
        let err = run(&cli).unwrap_err();
        assert_eq!(exit_code(&err), 3);
    }
}
