use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};

use ant::config::AntConfig;
use ant::export::{ConsoleSink, CsvSummarySink, ExportSink, JsonLinesSink};
use ant::import::{CsvImportSource, ImportSource, ManualImportSource};
use ant::model::{render_fields, TestKind};
use ant::probes::Collaborators;
use ant::EngineOptions;

#[derive(Parser)]
#[command(
    name = "ant",
    about = "Automated network tests: batch ping and traceroute diagnostics",
    version,
    long_about = None
)]
struct Cli {
    /// Configuration file (defaults: $ANT_CONFIG, then ./ant.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a batch of tests and export the results
    Run {
        /// CSV file of test definitions
        #[arg(long, conflicts_with = "manual")]
        csv: Option<PathBuf>,

        /// Run a single ping to this destination instead of a file
        #[arg(long)]
        manual: Option<String>,

        /// Where results go
        #[arg(long, value_enum, default_value = "console")]
        output: Output,

        /// Output file for the jsonl and csv outputs
        #[arg(long)]
        out_file: Option<PathBuf>,

        /// Tests in flight at once (overrides the config file)
        #[arg(long)]
        workers: Option<usize>,
    },

    /// Import a CSV file and list its tests without running them
    Validate {
        #[arg(long)]
        csv: PathBuf,
    },

    /// List the test kinds and the fields each one reads
    Kinds,
}

#[derive(Clone, Copy, ValueEnum)]
enum Output {
    Console,
    Jsonl,
    Csv,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = AntConfig::resolve(cli.config.as_deref())?;
    ant::logging::init(&config.logging)?;

    match cli.command {
        Commands::Run {
            csv,
            manual,
            output,
            out_file,
            workers,
        } => {
            let source: Box<dyn ImportSource> = match (csv, manual) {
                (Some(path), _) => Box::new(CsvImportSource::new(path)),
                (None, Some(destination)) => Box::new(ManualImportSource::ping(&destination)?),
                (None, None) => Box::new(ManualImportSource::ping("8.8.8.8")?),
            };

            let sink: Box<dyn ExportSink> = match output {
                Output::Console => Box::new(ConsoleSink::stdout()),
                Output::Jsonl => {
                    let path = out_file.unwrap_or_else(|| PathBuf::from("results.jsonl"));
                    Box::new(JsonLinesSink::open(path)?)
                }
                Output::Csv => {
                    let path = out_file.unwrap_or_else(|| PathBuf::from("results.csv"));
                    Box::new(CsvSummarySink::create(path)?)
                }
            };

            let options = EngineOptions {
                workers: workers.unwrap_or(config.engine.workers),
            };
            tracing::info!(workers = options.workers, "starting test run");

            let tools = Collaborators::system(&config.tools);
            let summary = ant::run_batch(source, sink, tools, options)
                .await
                .context("test run aborted")?;
            tracing::info!(executed = summary.executed, "test run finished");
        }
        Commands::Validate { csv } => {
            let mut source = CsvImportSource::new(&csv);
            source
                .initialise()
                .await
                .with_context(|| format!("invalid test file: {}", csv.display()))?;

            let mut count = 0;
            while let Some(test) = source.next_test().await? {
                println!("{:<12} {}", test.kind(), render_fields(&test.describe()));
                count += 1;
            }
            println!("{} test(s) OK", count);
        }
        Commands::Kinds => {
            println!("{:<14} | {:<40} | Fields", "Kind", "Aliases");
            println!("{:-<14}-|-{:-<40}-|-{:-<40}", "", "", "");
            for kind in TestKind::ALL {
                println!(
                    "{:<14} | {:<40} | {}",
                    kind.name(),
                    kind.aliases().join(", "),
                    kind.fields().join(", ")
                );
            }
        }
    }

    Ok(())
}
