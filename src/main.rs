//! Runs the tagged drain workload against one shared concurrent stack.
//!
//! Usage: `tagstack [settings.toml]`. Environment variables such as
//! `TAGSTACK_STRESS__THREADS=4` override the file.

use std::path::PathBuf;
use std::process::ExitCode;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use tagstack::settings::Settings;
use tagstack::workload::run_tagged_drain;
use tagstack::ConcurrentTagStack;

fn main() -> ExitCode {
    let path = std::env::args().nth(1).map(PathBuf::from);
    let settings = match Settings::load(path.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.log_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let stack = ConcurrentTagStack::from_settings(&settings);
    let outcome = run_tagged_drain(&stack, &settings.stress);
    let closed = stack.close();
    match outcome.and_then(|report| closed.map(|()| report)) {
        Ok(report) => {
            info!(
                threads = report.threads,
                items = report.items_per_thread,
                ms = report.elapsed.as_secs_f64() * 1000.0,
                "workload passed"
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "workload failed");
            ExitCode::FAILURE
        }
    }
}
