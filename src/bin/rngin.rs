//! SIP policy routing engine entry point (SPEC_FULL.md §6, "Rule engine
//! CLI"/"HTTP").
//!
//! `rngin -i <addr> -p <port> -f <rules.yaml> -d <db> [-v]`.

use std::sync::Arc;

use clap::Parser;

use callq::config::{self, RuleEngineArgs};
use callq::db;
use callq::http::{self, HttpState};

#[tokio::main]
async fn main() {
    let args = RuleEngineArgs::parse();
    config::init_tracing(args.verbose);

    if let Err(e) = probe_rule_file(&args.rules) {
        tracing::error!(error = %e, path = %args.rules.display(), "rule file is not readable");
        return;
    }

    let pool = match db::create_read_only_pool(&args.database).await {
        Ok(pool) => pool,
        Err(e) => {
            tracing::error!(error = %e, "failed to open database");
            return;
        }
    };

    if let Err(e) = db::health_check(&pool).await {
        tracing::error!(error = %e, "database health check failed");
        return;
    }

    let state = Arc::new(HttpState {
        pool,
        rules_path: args.rules.clone(),
        cache: None,
    });

    let app = http::router(state);
    let addr = args.bind_addr();

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!(error = %e, %addr, "failed to bind listener");
            return;
        }
    };

    tracing::info!(%addr, "rngin listening");

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!(error = %e, "rngin server error");
    }
}

/// Opens and immediately closes the rule file before doing anything else,
/// mirroring the source's startup readability probe (SPEC_FULL.md §10).
fn probe_rule_file(path: &std::path::Path) -> std::io::Result<()> {
    std::fs::File::open(path).map(drop)
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigint = signal(SignalKind::interrupt()).expect("failed to register SIGINT handler");
        let mut sigterm = signal(SignalKind::terminate()).expect("failed to register SIGTERM handler");
        tokio::select! {
            _ = sigint.recv() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
    tracing::info!("shutdown signal received, draining in-flight requests");
}
