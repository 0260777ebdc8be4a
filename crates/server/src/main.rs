mod api;
mod cli;
mod elasticsearch;
mod router;
mod startup;
mod state;

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};

use riskgate_core::Config;
use riskgate_rules::loader::RuleSet;

use crate::cli::{CheckRulesArgs, Cli, Command};

async fn serve(config: Config) -> anyhow::Result<()> {
    config.log_summary();
    let state = startup::build_app_state(config).await?;
    let app = router::build_router(state.clone());

    let addr = format!("{}:{}", state.config.server.host, state.config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("riskgate listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    state.service.shutdown();
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received, draining connections");
}

/// Strict load of a rules file, printed as the chain will run.
fn check_rules(path: PathBuf, strict: bool) -> anyhow::Result<()> {
    let set = RuleSet::from_file(&path)
        .with_context(|| format!("failed to load {}", path.display()))?;

    println!("{}", path.display());
    println!("  score_reject_threshold: {}", set.score_reject_threshold());
    println!("  rules: {} ({} enabled)", set.rules().len(), set.enabled_count());
    println!();
    println!(
        "  {:>5}  {:<32} {:<16} {:<7} {:<8} {:<7} {:>6}",
        "prio", "name", "type", "action", "enabled", "code", "score"
    );
    for rule in set.summaries() {
        println!(
            "  {:>5}  {:<32} {:<16} {:<7} {:<8} {:<7} {:>6.1}",
            rule.priority,
            rule.name,
            rule.rule_type.as_str(),
            rule.action.as_str(),
            rule.enabled,
            rule.error_code.as_deref().unwrap_or("-"),
            rule.risk_score_add,
        );
    }

    if !set.warnings().is_empty() {
        println!();
        println!("  warnings:");
        for warning in set.warnings() {
            println!("    - {}", warning);
        }
        if strict {
            anyhow::bail!("{} load warning(s) in {}", set.warnings().len(), path.display());
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_level(true)
        .init();

    // .env must be loaded before clap reads env fallbacks.
    riskgate_core::config::load_dotenv();
    let cli = Cli::parse();
    let mut config = Config::from_env();

    match cli.command {
        Some(Command::CheckRules(CheckRulesArgs { path, strict })) => {
            let path = path.or(cli.serve.rules).unwrap_or(config.rules.path);
            check_rules(path, strict)
        }
        Some(Command::Serve) | None => {
            cli.serve.apply(&mut config);
            serve(config).await
        }
    }
}
