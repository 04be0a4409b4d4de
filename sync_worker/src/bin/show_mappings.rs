//! Dumps the source→collection mapping store, for debugging

use common::core::mapping_sqlite_repository::{get_mapping_pool, MappingSqliteRepository};
use sync_worker::configuration::get_configuration;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    let configuration = get_configuration().expect("Failed to read configuration.");

    let mapping_pool = get_mapping_pool(&configuration.mapping.db_path)
        .await
        .expect("Failed to open the mapping database");
    let mapping_repository = MappingSqliteRepository::new(mapping_pool);
    mapping_repository
        .init()
        .await
        .expect("Failed to initialize the mapping store");

    let entries = mapping_repository
        .list()
        .await
        .expect("Failed to read the mapping store");

    println!("{} mapping entries:", entries.len());
    for (source_id, collection_name) in entries {
        println!("- source_id  : {}", source_id);
        println!("  collection : {}", collection_name);
    }

    Ok(())
}
