use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::error;

use tsvdb::config::ServerConfig;
use tsvdb::engine::Engine;
use tsvdb::{logging, server};

/// File-backed relational store driven by a small SQL-like language.
#[derive(Parser, Debug)]
#[command(name = "tsvdb")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Directory holding one sub-directory per database (default: ./databases)
    #[arg(long = "root")]
    root: Option<PathBuf>,

    /// Address to accept statement connections on (default: 127.0.0.1:8888)
    #[arg(long = "listen")]
    listen: Option<SocketAddr>,

    /// Log filter directive, overridden by RUST_LOG (default: info)
    #[arg(long = "log-level")]
    log_level: Option<String>,

    /// Read statements from stdin instead of listening
    #[arg(long = "repl")]
    repl: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = ServerConfig::default().with_overrides(cli.root, cli.listen, cli.log_level);

    if let Err(e) = logging::init(&config.log_level) {
        eprintln!("failed to initialise logging: {e}");
        return ExitCode::FAILURE;
    }

    let engine = match Engine::open(&config.root) {
        Ok(engine) => Arc::new(engine),
        Err(e) => {
            error!(error = %e, "cannot open database root");
            return ExitCode::FAILURE;
        }
    };

    let result = if cli.repl {
        server::run_repl(&engine)
    } else {
        server::run_server(engine, config.listen)
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "server stopped");
            ExitCode::FAILURE
        }
    }
}
