//! Health-aggregation agent entry point (SPEC_FULL.md §6, "Aggregator CLI").
//!
//! `qngin -c <config.yaml> -d <database-file> [-v]`. Exits 0 on clean
//! shutdown; a startup error is logged and the process also exits 0,
//! matching the source's "any startup error prints a message and exits 0"
//! contract rather than a non-zero code a supervisor might misread as a
//! crash loop trigger.

use clap::Parser;

use callq::aggregator::supervisor;
use callq::config::{self, AggregatorArgs};

#[tokio::main]
async fn main() {
    let args = AggregatorArgs::parse();
    config::init_tracing(args.verbose);

    if let Err(e) = supervisor::run(&args.config, &args.database).await {
        tracing::error!(error = %e, "qngin exiting after startup failure");
        return;
    }

    tracing::info!("qngin shutdown complete");
}
