//! Coedit CLI
//!
//! Binary name: `coedit`

use std::process;

use coedit::cli::{build_cli, handlers::dispatch};
use coedit::error::{exit_code, format_error};

#[tokio::main]
async fn main() {
    let matches = build_cli().get_matches();

    let level = if matches.get_flag("verbose") {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = dispatch(&matches).await {
        #[allow(clippy::print_stderr)]
        {
            eprintln!("Error: {}", format_error(&err));
        }

        #[allow(clippy::exit)]
        process::exit(exit_code(&err));
    }
}
