use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use arrecadacao_graph::config::{Config, ScopeSelection, WeightSource};
use arrecadacao_graph::pipeline::{self, Outcome};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::FmtSubscriber;

#[derive(Debug, Parser)]
#[command(name = "arrecadacao-graph", about = "Graph analytics over state tax revenue")]
struct Cli {
    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Input CSV, overrides `input.path`
    #[arg(long)]
    input: Option<PathBuf>,

    /// Output directory, overrides `output.dir`
    #[arg(long)]
    output: Option<PathBuf>,

    #[arg(long, value_enum)]
    scope: Option<ScopeSelection>,

    /// Use a single column as edge weight
    #[arg(long)]
    weight_column: Option<String>,

    /// Process scopes on a thread pool
    #[arg(long)]
    parallel: bool,

    /// Skip the DOT diagrams
    #[arg(long)]
    no_diagrams: bool,

    /// Set the logging level
    #[arg(long, default_value = "info")]
    log_level: tracing::Level,
}

impl Cli {
    fn into_config(self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::from_file(path)?,
            None => Config::default(),
        };
        if let Some(input) = self.input {
            config.input.path = input;
        }
        if let Some(output) = self.output {
            config.output.dir = output;
        }
        if let Some(scope) = self.scope {
            config.run.scopes = scope;
        }
        if let Some(column) = self.weight_column {
            config.graph.weight = WeightSource::Column { column };
        }
        config.run.parallel |= self.parallel;
        config.output.diagrams &= !self.no_diagrams;
        config.validate()?;
        Ok(config)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(cli.log_level)
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = cli.into_config()?;
    let summary = pipeline::run(&config)?;

    info!(
        "Finished: {} scope(s), {} report(s) written, {} skipped, {} failed, {} scope(s) not built, {} record(s) rejected",
        summary.scopes.len(),
        summary.count(|o| matches!(o, Outcome::Ok { .. })),
        summary.count(|o| matches!(o, Outcome::Skipped { .. })),
        summary.count(|o| matches!(o, Outcome::Failed { .. })),
        summary.failed_scopes(),
        summary.records_rejected.len()
    );
    Ok(())
}
