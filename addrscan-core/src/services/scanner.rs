//! Scan service - catalog, per-asset address lookups, join
//!
//! One unit of work per asset. Units run on a small scoped worker pool; the
//! catalog index is shared read-only and the rate limiter inside the client is
//! the only thing workers contend on. A failed asset becomes an
//! `AssetFailure` and the scan carries on.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::domain::result::{Error, Result};
use crate::domain::{AddressRecord, AssetFailure, JoinedRecord, ScanOutcome};
use crate::services::catalog::{CatalogIndex, ResourceCatalog};
use crate::services::resolver::AddressResolver;

pub const MAX_WORKERS: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanOptions {
    /// Keep addresses whose network has deposits disabled
    pub include_disabled: bool,
    /// Concurrent asset lookups, clamped to 1..=MAX_WORKERS
    pub workers: usize,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            include_disabled: false,
            workers: 1,
        }
    }
}

/// Progress events emitted while scanning
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanProgress {
    CatalogLoaded {
        assets: usize,
        networks: usize,
    },
    AssetFinished {
        asset: String,
        completed: usize,
        total: usize,
        failed: bool,
    },
}

/// Stops dispatching new assets; finished work is kept
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

pub struct ScanService {
    catalog: ResourceCatalog,
    resolver: AddressResolver,
    cancel: CancelToken,
}

impl ScanService {
    pub fn new(catalog: ResourceCatalog, resolver: AddressResolver) -> Self {
        Self {
            catalog,
            resolver,
            cancel: CancelToken::new(),
        }
    }

    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn scan(&self, opts: &ScanOptions) -> Result<ScanOutcome> {
        self.scan_with_progress(opts, &|_| {})
    }

    /// Run a full scan
    ///
    /// Fails only when the catalog cannot be loaded or an asset hits an
    /// error that would repeat for every asset (configuration, signing).
    pub fn scan_with_progress(
        &self,
        opts: &ScanOptions,
        progress: &(dyn Fn(ScanProgress) + Sync),
    ) -> Result<ScanOutcome> {
        let index = self.catalog.fetch_all()?;
        let assets = index.assets();
        let total = assets.len();

        progress(ScanProgress::CatalogLoaded {
            assets: total,
            networks: index.len(),
        });

        let workers = opts.workers.clamp(1, MAX_WORKERS).min(total.max(1));
        tracing::info!(assets = total, workers, "Scanning deposit addresses");

        let next = AtomicUsize::new(0);
        let abort = AtomicBool::new(false);
        let completed = AtomicUsize::new(0);
        let fatal: Mutex<Option<Error>> = Mutex::new(None);
        let results: Mutex<Vec<(usize, Result<Vec<AddressRecord>>)>> =
            Mutex::new(Vec::with_capacity(total));

        std::thread::scope(|scope| {
            for _ in 0..workers {
                scope.spawn(|| loop {
                    if self.cancel.is_cancelled() || abort.load(Ordering::SeqCst) {
                        break;
                    }
                    let i = next.fetch_add(1, Ordering::SeqCst);
                    let Some(asset) = assets.get(i) else {
                        break;
                    };

                    let networks = index.networks(asset, opts.include_disabled);
                    let result = match self.resolver.fetch_addresses(asset, &networks) {
                        Err(e) if e.is_fatal() => {
                            abort.store(true, Ordering::SeqCst);
                            fatal
                                .lock()
                                .unwrap_or_else(|p| p.into_inner())
                                .get_or_insert(e);
                            break;
                        }
                        other => other,
                    };
                    let failed = result.is_err();

                    results
                        .lock()
                        .unwrap_or_else(|p| p.into_inner())
                        .push((i, result));

                    let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                    progress(ScanProgress::AssetFinished {
                        asset: asset.clone(),
                        completed: done,
                        total,
                        failed,
                    });
                });
            }
        });

        if let Some(err) = fatal.into_inner().unwrap_or_else(|p| p.into_inner()) {
            return Err(err);
        }

        let mut results = results.into_inner().unwrap_or_else(|p| p.into_inner());
        results.sort_by_key(|(i, _)| *i);
        let finished = results.len();

        let mut records = Vec::new();
        let mut failures = Vec::new();

        for (i, result) in results {
            let asset = &assets[i];
            match result {
                Ok(found) => records.extend(join_records(&index, found, opts.include_disabled)),
                Err(e) => {
                    tracing::warn!(asset = %asset, error = %e, "Asset failed");
                    failures.push(AssetFailure {
                        asset: asset.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        records.sort_by(|a, b| {
            (&a.asset, &a.network, &a.address).cmp(&(&b.asset, &b.network, &b.address))
        });
        failures.sort_by(|a, b| a.asset.cmp(&b.asset));

        let unmatched = records.iter().filter(|r| !r.has_metadata()).count();
        let unscanned = total - finished;
        let cancelled = unscanned > 0;

        tracing::info!(
            records = records.len(),
            failures = failures.len(),
            unmatched,
            unscanned,
            cancelled,
            "Scan finished"
        );

        Ok(ScanOutcome {
            records,
            failures,
            unmatched,
            assets_total: total,
            unscanned,
            cancelled,
        })
    }
}

/// Join address records against the catalog
///
/// Records on a network with deposits disabled are dropped unless
/// `include_disabled`. Records with no catalog entry are kept with empty
/// metadata.
pub fn join_records(
    index: &CatalogIndex,
    records: Vec<AddressRecord>,
    include_disabled: bool,
) -> Vec<JoinedRecord> {
    records
        .into_iter()
        .filter_map(|record| {
            let config = index.get(&record.asset, &record.network);
            if let Some(config) = config {
                if !config.deposit_enabled && !include_disabled {
                    return None;
                }
            }
            Some(JoinedRecord::join(record, config))
        })
        .collect()
}
