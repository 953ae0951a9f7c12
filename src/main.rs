use clap::{Parser, Subcommand};
use sei_pipeline::config::Config;
use sei_pipeline::logging;
use sei_pipeline::manifest;
use sei_pipeline::netfile::client::NetfileClient;
use sei_pipeline::netfile::store::Store;
use sei_pipeline::storage::{BlobStorage, FsStorage};
use sei_pipeline::tasks::{self, QueueDispatcher, Task};
use sei_pipeline::warehouse::LocalWarehouse;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "sei_pipeline")]
#[command(about = "Form 700 financial-disclosure ETL pipeline")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List filings, write the run manifest, and download everything
    Download {
        /// Reuse an existing run id instead of starting a new run
        #[arg(long)]
        run_id: Option<String>,
    },
    /// Parse a downloaded run and load the warehouse
    Process {
        /// Run id to process
        #[arg(long)]
        run_id: String,
    },
    /// Run the whole pipeline end to end
    Run,
}

async fn drain_downloads(
    client: &NetfileClient,
    storage: &dyn BlobStorage,
    dispatcher: &QueueDispatcher,
    receiver: &mut tokio::sync::mpsc::UnboundedReceiver<Task>,
) -> Option<String> {
    let mut transform_run = None;
    while let Ok(task) = receiver.try_recv() {
        match task {
            Task::Download { run_id, filing_id } => {
                if let Err(e) =
                    tasks::handle_download(client, storage, dispatcher, &run_id, &filing_id).await
                {
                    error!(filing_id, error = %e, "download failed");
                }
            }
            Task::Transform { run_id } => {
                transform_run = Some(run_id);
            }
        }
    }
    transform_run
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init_logging();

    let cli = Cli::parse();
    let config = Config::load()?;

    let client = NetfileClient::new(config.netfile);
    let storage = FsStorage::new(&config.pipeline.data_root);
    let warehouse = LocalWarehouse::new(&config.pipeline.warehouse_root);
    let mut store = Store::new(&config.pipeline.database_path);

    match cli.command {
        Commands::Download { run_id } => {
            let run_id = run_id.unwrap_or_else(tasks::new_run_id);
            let (dispatcher, mut receiver) = QueueDispatcher::new();
            let count = tasks::enumerate_run(&client, &storage, &dispatcher, &run_id).await?;
            info!(run_id, count, "enumerated run");

            drain_downloads(&client, &storage, &dispatcher, &mut receiver).await;
            println!("Downloaded run {run_id} ({count} filings listed)");
        }
        Commands::Process { run_id } => {
            if manifest::read_manifest(&storage, &run_id).await?.is_none() {
                anyhow::bail!("run {run_id} has no manifest");
            }
            let summary = tasks::process_run(&storage, &warehouse, &mut store, &run_id).await?;
            println!(
                "Processed run {run_id}: {} filings parsed, {} failed, {} tables loaded, {} failed",
                summary.parsed,
                summary.failed_filings,
                summary.exported_tables,
                summary.failed_tables
            );
        }
        Commands::Run => {
            let run_id = tasks::new_run_id();
            let (dispatcher, mut receiver) = QueueDispatcher::new();
            tasks::enumerate_run(&client, &storage, &dispatcher, &run_id).await?;

            let transform =
                drain_downloads(&client, &storage, &dispatcher, &mut receiver).await;
            match transform {
                Some(run_id) => {
                    let summary =
                        tasks::process_run(&storage, &warehouse, &mut store, &run_id).await?;
                    println!(
                        "Run {run_id} done: {} filings parsed, {} failed, {} tables loaded, {} failed",
                        summary.parsed,
                        summary.failed_filings,
                        summary.exported_tables,
                        summary.failed_tables
                    );
                }
                None => {
                    error!(run_id, "run never completed; some downloads failed");
                    anyhow::bail!("run {run_id} is incomplete");
                }
            }
        }
    }

    Ok(())
}
