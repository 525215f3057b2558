use tracing::info;

use ragstore_core::config::{StoreBackendKind, StoreSettings};
use ragstore_core::error::Result;
use ragstore_core::store::{DocumentStore, FileBackend};
use ragstore_vector::LanceBackend;

/// Opens the Document Store backend named by `settings.backend`.
pub fn open_store(settings: &StoreSettings) -> Result<DocumentStore> {
    let store = match settings.backend {
        StoreBackendKind::Memory => DocumentStore::in_memory(),
        StoreBackendKind::File => DocumentStore::new(Box::new(FileBackend::open(settings.resolved_path())?)),
        StoreBackendKind::Lance => DocumentStore::new(Box::new(LanceBackend::open(
            &settings.resolved_path(),
            &settings.table,
            settings.timeout(),
        )?)),
    };
    info!(backend = store.backend_name(), path = %settings.path, "document store ready");
    Ok(store)
}
