use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, warn};

use juliatsa::cli::{self, Cli, Command};
use juliatsa::engine;
use juliatsa::error::EngineError;
use juliatsa::logging;
use juliatsa::raw_codec;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_path = PathBuf::from("juliatsacoredyn.log.txt");
    let _guard = match logging::init(&log_path) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("warning: could not open {}: {e}", log_path.display());
            None
        }
    };

    match run(&cli) {
        Ok(()) => ExitCode::from(0),
        Err(e) => {
            error!(error = %e, "fatal error");
            ExitCode::from(e.exit_code() as u8)
        }
    }
}

fn run(cli: &Cli) -> Result<(), EngineError> {
    let (config, warning) = cli::parse_tokens(&cli.tokens)?;
    if let Some(message) = warning {
        warn!("{message}");
    }

    if config.command == Command::Convert {
        let dir = std::env::current_dir().map_err(|e| EngineError::Io {
            path: PathBuf::from("."),
            source: e,
        })?;
        let out_path = PathBuf::from("_2d.raw");
        return raw_codec::convert_legacy(&dir, &out_path);
    }

    engine::run(&config)
}
