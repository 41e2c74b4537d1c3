//! Logger initialization.
//!
//! Log records always go to a file next to the binary; the console layer
//! is added only when the user asked for verbose output. If the log file
//! cannot be created, console logging is the fallback so records are
//! never dropped silently.

use std::fs::File;
use std::sync::Arc;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// File that receives log records.
const LOG_FILE: &str = "mailhaul.log";

/// Installs the global tracing subscriber.
pub fn init(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "mailhaul=debug,mailhaul_mrp=debug".into());
    let registry = tracing_subscriber::registry().with(filter);

    match File::create(LOG_FILE) {
        Ok(file) => {
            let file_layer = fmt::layer().with_ansi(false).with_writer(Arc::new(file));
            if verbose {
                registry.with(file_layer).with(fmt::layer()).init();
            } else {
                registry.with(file_layer).init();
            }
        }
        Err(error) => {
            println!("Log file unavailable ({error}), logging to the console instead.");
            registry.with(fmt::layer()).init();
        }
    }
}
