//! Publishing a package's modules and symbol files to a content store.
//!
//! Each module is handled by its own task: read, fingerprint, resolve its
//! symbol-server path, then write it and its paired symbol file if the store
//! does not already hold them. A file that cannot be read or parsed is
//! skipped and reported; a store failure aborts the whole call so the caller
//! can retry the package.

pub mod report;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::config::SymbolsConfig;
use crate::error::{Result, SymbolsError};
use crate::package::{PackageEntry, PackageIdentity};
use crate::store::ContentStore;
use crate::symbols::path::file_name;
use crate::symbols::{
    find_symbol, HeaderSignatureExtractor, Signature, SignatureExtractor, SymbolServerPath,
};
use crate::timeout::{with_timeout, TimeoutConfig};

pub use report::{EntryKind, EntryOutcome, EntryState, IngestReport};

/// A per-package service driven by a package feed
#[async_trait]
pub trait FeedService: Send + Sync {
    fn name(&self) -> &str;

    async fn add_package(&self, entries: &[Arc<dyn PackageEntry>]) -> Result<IngestReport>;

    /// Returns whether anything was removed
    async fn remove_package(&self, package: &PackageIdentity) -> Result<bool>;
}

/// Publishes modules and their symbol files under symbol-server paths
pub struct SymbolIngestor {
    store: Arc<dyn ContentStore>,
    extractor: Arc<dyn SignatureExtractor>,
    config: Arc<SymbolsConfig>,
    cancel: CancellationToken,
}

impl SymbolIngestor {
    pub fn new(store: Arc<dyn ContentStore>, config: SymbolsConfig) -> Result<Self> {
        config.validate()?;
        let extractor = Arc::new(HeaderSignatureExtractor::new(
            config.signatures.clone(),
            config.limits.clone(),
        ));
        Ok(Self {
            store,
            extractor,
            config: Arc::new(config),
            cancel: CancellationToken::new(),
        })
    }

    /// Replace the header-reading extractor
    pub fn with_extractor(mut self, extractor: Arc<dyn SignatureExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    /// Tie ingestion to an externally owned token
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn config(&self) -> &SymbolsConfig {
        &self.config
    }

    /// Publish every module in `entries` together with its paired symbol file.
    ///
    /// The report lists modules in package order, each followed by its
    /// symbol file when one was paired.
    pub async fn add_package(&self, entries: &[Arc<dyn PackageEntry>]) -> Result<IngestReport> {
        let span = info_span!("add_package", entries = entries.len());
        self.ingest(entries).instrument(span).await
    }

    /// Published symbols are never retracted.
    pub async fn remove_package(&self, package: &PackageIdentity) -> Result<bool> {
        debug!(package = %package, "Ignoring package removal");
        Ok(false)
    }

    async fn ingest(&self, entries: &[Arc<dyn PackageEntry>]) -> Result<IngestReport> {
        if self.cancel.is_cancelled() {
            return Err(SymbolsError::Cancelled);
        }

        let filters = &self.config.ingest;
        let mut modules = Vec::new();
        let mut symbols = Vec::new();
        for entry in entries {
            if filters.is_module(entry.name()) {
                modules.push(Arc::clone(entry));
            } else if filters.is_symbol(entry.name()) {
                symbols.push(Arc::clone(entry));
            }
        }
        info!(
            modules = modules.len(),
            symbols = symbols.len(),
            "Ingesting package"
        );

        let cancel = self.cancel.child_token();
        let worker = Worker {
            store: Arc::clone(&self.store),
            extractor: Arc::clone(&self.extractor),
            config: Arc::clone(&self.config),
            cancel: cancel.clone(),
        };
        let permits = Arc::new(Semaphore::new(filters.max_concurrency));

        let mut tasks = JoinSet::new();
        for (position, module) in modules.into_iter().enumerate() {
            let symbol = find_symbol(module.name(), &symbols).cloned();
            let worker = worker.clone();
            let permits = Arc::clone(&permits);
            let span = info_span!("module", name = %module.name());
            tasks.spawn(
                async move {
                    let _permit = permits
                        .acquire_owned()
                        .await
                        .map_err(|e| SymbolsError::Internal(e.to_string()))?;
                    let outcomes = worker.publish_module(module, symbol).await?;
                    Ok::<_, SymbolsError>((position, outcomes))
                }
                .instrument(span),
            );
        }

        let mut collected = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            let result = joined
                .map_err(|e| SymbolsError::Internal(format!("ingestion task failed: {}", e)))
                .and_then(|r| r);
            match result {
                Ok(item) => collected.push(item),
                Err(err) => {
                    cancel.cancel();
                    tasks.abort_all();
                    if !matches!(err, SymbolsError::Cancelled) {
                        error!(error = %err, "Aborting package ingestion");
                    }
                    return Err(err);
                }
            }
        }

        if self.cancel.is_cancelled() {
            return Err(SymbolsError::Cancelled);
        }

        collected.sort_by_key(|(position, _)| *position);
        let report = IngestReport {
            outcomes: collected.into_iter().flat_map(|(_, o)| o).collect(),
        };
        info!(
            written = report.written(),
            already_present = report.already_present(),
            skipped = report.skipped(),
            "Package ingested"
        );
        Ok(report)
    }
}

#[async_trait]
impl FeedService for SymbolIngestor {
    fn name(&self) -> &str {
        "symbols"
    }

    async fn add_package(&self, entries: &[Arc<dyn PackageEntry>]) -> Result<IngestReport> {
        SymbolIngestor::add_package(self, entries).await
    }

    async fn remove_package(&self, package: &PackageIdentity) -> Result<bool> {
        SymbolIngestor::remove_package(self, package).await
    }
}

/// State shared by the tasks of one `add_package` call
#[derive(Clone)]
struct Worker {
    store: Arc<dyn ContentStore>,
    extractor: Arc<dyn SignatureExtractor>,
    config: Arc<SymbolsConfig>,
    cancel: CancellationToken,
}

/// A file that was read and fingerprinted and is ready to be stored
struct Prepared {
    key: String,
    signature: Signature,
    data: Bytes,
}

impl Worker {
    async fn publish_module(
        &self,
        module: Arc<dyn PackageEntry>,
        symbol: Option<Arc<dyn PackageEntry>>,
    ) -> Result<Vec<EntryOutcome>> {
        let prepared = match self.prepare(module.as_ref(), EntryKind::Module).await? {
            Ok(prepared) => prepared,
            Err(skipped) => return Ok(vec![skipped]),
        };

        let module_write = self.store_prepared(module.name(), EntryKind::Module, prepared);
        let symbol_write = async {
            match symbol {
                Some(symbol) => self.publish_symbol(symbol.as_ref()).await.map(Some),
                None => Ok(None),
            }
        };
        let (module_outcome, symbol_outcome) = tokio::join!(module_write, symbol_write);

        let mut outcomes = vec![module_outcome?];
        outcomes.extend(symbol_outcome?);
        Ok(outcomes)
    }

    async fn publish_symbol(&self, symbol: &dyn PackageEntry) -> Result<EntryOutcome> {
        match self.prepare(symbol, EntryKind::Symbol).await? {
            Ok(prepared) => {
                self.store_prepared(symbol.name(), EntryKind::Symbol, prepared)
                    .await
            }
            Err(skipped) => Ok(skipped),
        }
    }

    /// Read and fingerprint one entry.
    ///
    /// The inner `Err` carries the outcome of an entry that was skipped; the
    /// outer one is a failure that ends the ingestion, including an invalid
    /// path argument.
    async fn prepare(
        &self,
        entry: &dyn PackageEntry,
        kind: EntryKind,
    ) -> Result<std::result::Result<Prepared, EntryOutcome>> {
        let name = entry.name();
        let skipped = |err: SymbolsError| {
            warn!(entry = name, kind = ?kind, error = %err, "Skipping entry");
            EntryOutcome {
                name: name.to_string(),
                kind,
                signature: None,
                state: EntryState::Skipped {
                    reason: err.to_string(),
                },
            }
        };

        let data = match entry.open().await {
            Ok(data) => data,
            Err(err) if err.is_entry_local() => return Ok(Err(skipped(err))),
            Err(err) => return Err(err),
        };

        let signature = match kind {
            EntryKind::Module => self.extractor.module_signature(&data),
            EntryKind::Symbol => self.extractor.symbol_signature(&data),
        };
        let signature = match signature {
            Ok(signature) => signature,
            Err(err) => return Ok(Err(skipped(err.into()))),
        };
        debug!(
            entry = name,
            signature = %signature,
            kind = %signature.kind(),
            "Fingerprinted entry"
        );

        // A signature the path layout refuses is a bug in the extractor, not
        // a bad file.
        let path = SymbolServerPath::for_signature(file_name(name), &signature)?;

        Ok(Ok(Prepared {
            key: path.store_key(&self.config.ingest.path_prefix),
            signature,
            data,
        }))
    }

    async fn store_prepared(
        &self,
        name: &str,
        kind: EntryKind,
        prepared: Prepared,
    ) -> Result<EntryOutcome> {
        let state = self.put_if_absent(&prepared.key, prepared.data).await?;
        Ok(EntryOutcome {
            name: name.to_string(),
            kind,
            signature: Some(prepared.signature),
            state,
        })
    }

    /// Existence check then write. Not atomic: two racing calls may both
    /// write, which is harmless because the key identifies the content.
    async fn put_if_absent(&self, key: &str, data: Bytes) -> Result<EntryState> {
        let size = data.len();
        if self.store_op("store exists", self.store.exists(key)).await? {
            debug!(key, "Object already present");
            return Ok(EntryState::AlreadyPresent {
                key: key.to_string(),
            });
        }

        self.store_op("store write", self.store.write(key, data))
            .await?;
        info!(key, size, "Published object");
        Ok(EntryState::Written {
            key: key.to_string(),
        })
    }

    async fn store_op<T, F>(&self, operation: &str, op: F) -> Result<T>
    where
        F: std::future::Future<Output = Result<T>>,
    {
        if self.cancel.is_cancelled() {
            return Err(SymbolsError::Cancelled);
        }
        let timeout = TimeoutConfig::from_duration(
            Duration::from_secs(self.config.store.op_timeout_secs),
            operation,
        );
        tokio::select! {
            _ = self.cancel.cancelled() => Err(SymbolsError::Cancelled),
            result = with_timeout(timeout, op) => result,
        }
    }
}
