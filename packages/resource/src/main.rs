//! Entry point for the certchain resource binary
//!
//! `/opt/resource/{check,in,out}` invoke this with `--kind` (or
//! `CERTCHAIN_KIND`) and the verb; protocol JSON flows over stdin/stdout and
//! everything else goes to stderr.

use std::process::ExitCode;

use certchain_common::LoggingTransformer;
use certchain_resource::cli::{self, Cli};
use clap::Parser;

fn main() -> ExitCode {
    LoggingTransformer::init();
    let cli = Cli::parse();

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("error: cannot start runtime: {err}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(cli::run(&cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            if err.is_retryable() {
                eprintln!("(transient failure; retrying may succeed)");
            }
            ExitCode::FAILURE
        }
    }
}
