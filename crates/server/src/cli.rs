use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use riskgate_core::Config;

/// Transaction risk gate: rule chain evaluation over an analytical store.
#[derive(Parser, Debug)]
#[command(name = "riskgate", version, about = "Transaction risk gate")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    #[command(flatten)]
    pub serve: ServeArgs,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the HTTP server (the default when no subcommand is given)
    Serve,

    /// Load a rules file and print the resulting chain
    CheckRules(CheckRulesArgs),
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Rules file, overrides RULES_CONFIG_PATH
    #[arg(long, global = true, env = "RISKGATE_RULES")]
    pub rules: Option<PathBuf>,

    /// Listen port, overrides PORT
    #[arg(long, global = true, env = "RISKGATE_PORT")]
    pub port: Option<u16>,

    /// Listen address, overrides HOST
    #[arg(long, global = true, env = "RISKGATE_HOST")]
    pub host: Option<String>,

    /// Reload on filesystem notifications as well as on polling
    #[arg(long, global = true)]
    pub watch: bool,
}

impl ServeArgs {
    /// Flags win over the environment-derived config.
    pub fn apply(&self, config: &mut Config) {
        if let Some(rules) = &self.rules {
            config.rules.path = rules.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(host) = &self.host {
            config.server.host = host.clone();
        }
        if self.watch {
            config.rules.watch = true;
        }
    }
}

#[derive(Args, Debug)]
pub struct CheckRulesArgs {
    /// Rules file (defaults to the configured RULES_CONFIG_PATH)
    pub path: Option<PathBuf>,

    /// Exit with an error when the file loads with warnings
    #[arg(long)]
    pub strict: bool,
}
