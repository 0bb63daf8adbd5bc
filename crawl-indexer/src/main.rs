use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crawl_indexer::{Dependencies, IndexingError, LogFormat, Settings};

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();

    let settings = Settings::from_env();
    let log_format = settings
        .as_ref()
        .map(|s| s.log_format)
        .unwrap_or_default();
    init_tracing(log_format);

    let result = match settings {
        Ok(settings) => run(settings).await,
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        error!(error = %e, "Crawl indexer failed");
        std::process::exit(1);
    }
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}

async fn run(settings: Settings) -> Result<(), IndexingError> {
    let Dependencies {
        orchestrator,
        consumer,
        mut status_rx,
    } = Dependencies::new(&settings).await?;

    // Status events go to stdout, one JSON object per line.
    let status_printer = tokio::spawn(async move {
        while let Some(event) = status_rx.recv().await {
            match serde_json::to_string(&event) {
                Ok(line) => println!("{}", line),
                Err(e) => warn!(error = %e, url = %event.url, "Failed to serialize status event"),
            }
        }
    });

    let summary = orchestrator.run(consumer).await?;
    let _ = status_printer.await;

    info!(
        received = summary.received,
        acked = summary.acked,
        failed = summary.failed,
        unresolved = summary.unresolved(),
        "Crawl indexer finished"
    );
    Ok(())
}
