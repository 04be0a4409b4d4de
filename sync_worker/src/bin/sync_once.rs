//! Triggers a sync outside the queue: one source when an id is given as the
//! first argument, every known source otherwise.

use tracing::{error, info};
use uuid::Uuid;

use common::telemetry::{get_tracing_subscriber, init_tracing_subscriber};
use sync_worker::{configuration::get_configuration, startup::build_sync_engine};

#[tokio::main]
async fn main() -> std::io::Result<()> {
    let tracing_subscriber =
        get_tracing_subscriber("sync_once".into(), "info".into(), std::io::stdout);
    init_tracing_subscriber(tracing_subscriber);

    let configuration = get_configuration().expect("Failed to read configuration.");
    let sync_engine = match build_sync_engine(&configuration).await {
        Ok(sync_engine) => sync_engine,
        Err(error) => panic!("Failed to build the sync engine: {:?}", error),
    };

    match std::env::args().nth(1) {
        Some(raw_source_id) => {
            let source_id =
                Uuid::parse_str(&raw_source_id).expect("The source id must be a valid UUID");
            info!("🎯 Syncing source {}", source_id);

            match sync_engine.sync(source_id).await {
                Ok(report) => info!(?report, "Sync done"),
                Err(error) => {
                    error!(?error, "Sync failed");
                    std::process::exit(1);
                }
            }
        }
        None => {
            info!("🔄 Syncing every source the provider exposes");

            match sync_engine.sync_all().await {
                Ok(reports) => info!("Synced {} sources", reports.len()),
                Err(error) => {
                    error!(?error, "Sync failed");
                    std::process::exit(1);
                }
            }
        }
    }

    Ok(())
}
