use std::sync::Arc;

use tallybook_infra::{AccountRegistry, InMemoryLedgerStore, JournalService, ReportingEngine};

type Store = Arc<InMemoryLedgerStore>;

/// Service bundle shared by all handlers; the three services share one
/// store, so reports always see what posting committed.
pub struct AppServices {
    pub registry: AccountRegistry<Store>,
    pub journal: JournalService<Store>,
    pub reporting: ReportingEngine<Store>,
}

pub fn build_services() -> AppServices {
    let store: Store = Arc::new(InMemoryLedgerStore::new());
    AppServices {
        registry: AccountRegistry::new(store.clone()),
        journal: JournalService::new(store.clone()),
        reporting: ReportingEngine::new(store),
    }
}
