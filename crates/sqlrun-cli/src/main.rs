//! sqlrun - line-by-line SQL batch runner
//!
//! Connects to a database, runs each line of an input file as a statement
//! and reports results on stdout. Progress and errors go to stderr.
//!
//! ```bash
//! # Run a script against SQLite, 500 statements per transaction
//! sqlrun sqlite data.db "" "" load.sql --batch 500
//!
//! # Resume after a failure reported at line 1201
//! sqlrun postgres postgres://localhost/app admin secret load.sql --batch 500 --start 1201
//! ```

mod cli;
mod error;
mod logging;

use clap::Parser;
use sqlrun_drivers::DriverRegistry;
use sqlrun_runner::{DIAGNOSTIC_PREFIX, ReaderLineSource, RunOutcome, Runner};
use std::fs::File;
use std::io::{self, BufReader, BufWriter};
use std::process::ExitCode;

use cli::Cli;
use error::CliError;
use logging::LoggingConfig;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // --help and --version are not failures
            let code = if e.use_stderr() { ExitCode::FAILURE } else { ExitCode::SUCCESS };
            let _ = e.print();
            return code;
        }
    };

    let logging = if cli.verbose {
        LoggingConfig::verbose()
    } else {
        LoggingConfig::from_cli(cli.log_level.as_deref())
    };
    if let Err(e) = logging::init(&logging) {
        eprintln!("{} WARNING: logging disabled: {:#}", DIAGNOSTIC_PREFIX, e);
    }

    match run(&cli).await {
        Ok(outcome) => ExitCode::from(outcome.exit_code() as u8),
        Err(e) => {
            tracing::error!(error = %e, "run aborted before execution");
            eprintln!("{} ERROR: {}", DIAGNOSTIC_PREFIX, e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli) -> Result<RunOutcome, CliError> {
    let config = cli.run_config();
    config.validate()?;

    let path = cli.input_path();
    let file = File::open(&path).map_err(|e| CliError::open_input(&path, e))?;

    let registry = DriverRegistry::with_defaults();
    let connection = registry
        .connect(&cli.connection_config())
        .await
        .map_err(CliError::Connection)?;

    let mut source = ReaderLineSource::new(BufReader::new(file));
    let mut runner = Runner::new(config, connection, BufWriter::new(io::stdout()), io::stderr())?;
    Ok(runner.run(&mut source).await?)
}
