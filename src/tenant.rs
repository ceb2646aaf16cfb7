use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;

use crate::compactor;
use crate::engine::{Engine, ReservationService};
use crate::limits::*;

/// One tenant's durable store and the reservation rules wired over it.
pub struct Tenant {
    pub engine: Arc<Engine>,
    pub reservations: ReservationService,
}

impl Tenant {
    fn open(wal_path: PathBuf) -> std::io::Result<Self> {
        let engine = Arc::new(Engine::new(wal_path)?);
        let reservations = ReservationService::new(engine.clone(), engine.clone());
        Ok(Self {
            engine,
            reservations,
        })
    }
}

/// Manages per-tenant engines. Each tenant gets its own Engine + WAL + compactor.
/// Tenant = database name from the pgwire connection.
pub struct TenantManager {
    tenants: DashMap<String, Arc<Tenant>>,
    data_dir: PathBuf,
    compact_threshold: u64,
}

impl TenantManager {
    pub fn new(data_dir: PathBuf, compact_threshold: u64) -> Self {
        Self {
            tenants: DashMap::new(),
            data_dir,
            compact_threshold,
        }
    }

    /// Get or lazily open the tenant for the given database name.
    ///
    /// Tenants are keyed by their sanitized name, which is also the WAL file
    /// stem, so names that sanitize alike share one tenant.
    pub fn get_or_create(&self, tenant: &str) -> std::io::Result<Arc<Tenant>> {
        if tenant.len() > MAX_TENANT_NAME_LEN {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "tenant name too long",
            ));
        }
        let safe_name = sanitize(tenant);
        if safe_name.is_empty() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "empty tenant name",
            ));
        }
        if let Some(existing) = self.tenants.get(&safe_name) {
            return Ok(existing.value().clone());
        }
        if self.tenants.len() >= MAX_TENANTS {
            return Err(std::io::Error::other("too many tenants"));
        }

        // Opened under the entry lock so racing connections share one WAL writer.
        let entry = self.tenants.entry(safe_name.clone());
        if let dashmap::mapref::entry::Entry::Occupied(occupied) = &entry {
            return Ok(occupied.get().clone());
        }
        let wal_path = self.data_dir.join(format!("{safe_name}.wal"));
        let opened = Arc::new(Tenant::open(wal_path)?);

        let compactor_engine = opened.engine.clone();
        let threshold = self.compact_threshold;
        tokio::spawn(async move {
            compactor::run_compactor(compactor_engine, threshold).await;
        });

        entry.or_insert(opened.clone());
        metrics::gauge!(crate::observability::TENANTS_ACTIVE).set(self.tenants.len() as f64);
        tracing::info!("opened tenant {safe_name}");
        Ok(opened)
    }
}

/// Keep tenant names inside data_dir.
fn sanitize(tenant: &str) -> String {
    tenant
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || *c == '-')
        .collect()
}
