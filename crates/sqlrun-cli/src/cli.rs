//! Command-line arguments

use clap::Parser;
use sqlrun_core::ConnectionConfig;
use sqlrun_runner::{BatchMode, RunConfig};

const AFTER_HELP: &str = "\
Notes:
  Line numbers start from 1 (not 0).
  Each line is treated as a separate statement. Statement terminators are optional.
  Results are written to stdout (redirect with >results.log).
  Progress and errors are written to stderr (redirect with 2>output.log).
  On failure, rerun with --start <line> to resume after the last committed line.";

/// Run a file of SQL statements, one per line, against a database
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(name = "sqlrun")]
#[command(version)]
#[command(about = "Line-by-line SQL batch runner with resumable transactions")]
#[command(after_help = AFTER_HELP)]
#[command(args_override_self = true)]
pub struct Cli {
    /// Database driver, e.g. sqlite or postgres
    pub driver: String,

    /// Driver-specific connection string, e.g. a file path or postgres://host/db
    pub connection_string: String,

    /// Database user name (may be empty)
    pub user: String,

    /// Database password (may be empty)
    pub password: String,

    /// File of SQL statements, one per line
    pub input: String,

    /// Line number to start from, for resuming after errors
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u64).range(1..))]
    pub start: u64,

    /// Number of lines to process from the start line. Default is all lines
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub lines: Option<u64>,

    /// Statements per transaction, or `all` to wrap the whole file in one
    #[arg(long, value_name = "N|all", value_parser = parse_batch, default_value = "0")]
    pub batch: BatchMode,

    /// Do not log "no data" responses (e.g. from INSERT statements)
    #[arg(long = "ignore-nodata")]
    pub ignore_nodata: bool,

    /// Include each statement in the output
    #[arg(long = "log-queries")]
    pub log_queries: bool,

    /// Diagnostic log filter (overrides RUST_LOG), e.g. debug or sqlrun_runner=trace
    #[arg(long, value_name = "FILTER")]
    pub log_level: Option<String>,

    /// Enable debug logging for all sqlrun components
    #[arg(short, long)]
    pub verbose: bool,
}

/// Parse `--batch`: `all` for one transaction, a number for fixed batches, `0` for none
pub fn parse_batch(value: &str) -> Result<BatchMode, String> {
    if value.eq_ignore_ascii_case("all") {
        return Ok(BatchMode::WholeFile);
    }
    value
        .parse::<usize>()
        .map(BatchMode::from_size)
        .map_err(|_| format!("batch size must be all or numeric: {}", value))
}

impl Cli {
    /// Input path with Windows separators replaced by `/`
    pub fn input_path(&self) -> String {
        self.input.replace('\\', "/")
    }

    pub fn run_config(&self) -> RunConfig {
        RunConfig::new(self.input_path())
            .with_start_line(self.start)
            .with_line_count(self.lines)
            .with_batch_mode(self.batch)
            .with_ignore_no_data(self.ignore_nodata)
            .with_log_queries(self.log_queries)
    }

    pub fn connection_config(&self) -> ConnectionConfig {
        ConnectionConfig::new(&self.driver, &self.connection_string)
            .with_credentials(&self.user, &self.password)
    }
}
