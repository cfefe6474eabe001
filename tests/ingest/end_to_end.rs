use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use crate::common::{
    entry, msf_pdb, msf_pdb_with_dbi, portable_pdb, PeBuilder, ScriptedExtractor, GUID, GUID_HEX,
};
use symfeed::ingest::{EntryKind, EntryState};
use symfeed::{
    ContentStore, FeedService, MemoryStore, PackageIdentity, SymbolIngestor, SymbolsConfig,
};

fn sym_config() -> SymbolsConfig {
    let mut config = SymbolsConfig::default();
    config.ingest.symbol_extensions = vec![".sym".to_string()];
    config
}

fn scripted() -> Arc<ScriptedExtractor> {
    Arc::new(
        ScriptedExtractor::new()
            .module(b"module A", "aaaa1111")
            .symbol(b"symbols A", "bbbb2222"),
    )
}

fn package() -> Vec<Arc<dyn symfeed::PackageEntry>> {
    vec![
        entry("A.dll", &b"module A"[..]),
        entry("A.sym", &b"symbols A"[..]),
        entry("B.dll", &b"module B"[..]),
    ]
}

#[tokio::test]
async fn test_module_symbol_and_unparseable_module() {
    let store = Arc::new(MemoryStore::new());
    let ingestor = SymbolIngestor::new(store.clone(), sym_config())
        .unwrap()
        .with_extractor(scripted());

    let report = ingestor.add_package(&package()).await.unwrap();

    assert_eq!(
        store.keys(),
        vec![
            "symbols/A.dll/aaaa1111/A.dll",
            "symbols/A.sym/bbbb2222/A.sym",
        ]
    );
    assert_eq!(
        store.get("symbols/A.dll/aaaa1111/A.dll"),
        Some(Bytes::from_static(b"module A"))
    );
    assert_eq!(
        store.get("symbols/A.sym/bbbb2222/A.sym"),
        Some(Bytes::from_static(b"symbols A"))
    );

    assert_eq!(report.written(), 2);
    assert_eq!(report.skipped(), 1);
    let b = report.outcome("B.dll").unwrap();
    assert_eq!(b.kind, EntryKind::Module);
    assert!(b.signature.is_none());
    assert!(matches!(b.state, EntryState::Skipped { .. }));
}

#[tokio::test]
async fn test_second_ingestion_writes_nothing() {
    let store = Arc::new(MemoryStore::new());
    let ingestor = SymbolIngestor::new(store.clone(), sym_config())
        .unwrap()
        .with_extractor(scripted());

    ingestor.add_package(&package()).await.unwrap();
    let writes = store.write_count();
    let keys = store.keys();

    let report = ingestor.add_package(&package()).await.unwrap();
    assert_eq!(store.write_count(), writes);
    assert_eq!(store.keys(), keys);
    assert_eq!(report.written(), 0);
    assert_eq!(report.already_present(), 2);
}

#[tokio::test]
async fn test_real_headers_msf() {
    let store = Arc::new(MemoryStore::new());
    let ingestor = SymbolIngestor::new(store.clone(), SymbolsConfig::default()).unwrap();

    let entries = vec![
        entry("lib/net45/Foo.dll", PeBuilder::new().codeview(GUID, 1, "Foo.pdb").build()),
        entry("lib/net45/Foo.pdb", msf_pdb(GUID, 1)),
        entry("lib/net45/Foo.xml", &b"<doc/>"[..]),
    ];
    let report = ingestor.add_package(&entries).await.unwrap();

    assert_eq!(
        store.keys(),
        vec![
            format!("symbols/Foo.dll/{}1/Foo.dll", GUID_HEX),
            format!("symbols/Foo.pdb/{}1/Foo.pdb", GUID_HEX),
        ]
    );
    assert_eq!(report.outcomes.len(), 2);
}

#[tokio::test]
async fn test_rewritten_pdb_keyed_by_module_age() {
    let store = Arc::new(MemoryStore::new());
    let ingestor = SymbolIngestor::new(store.clone(), SymbolsConfig::default()).unwrap();

    let entries = vec![
        entry("Foo.dll", PeBuilder::new().codeview(GUID, 3, "Foo.pdb").build()),
        entry("Foo.pdb", msf_pdb_with_dbi(GUID, 5, 3)),
    ];
    ingestor.add_package(&entries).await.unwrap();

    assert_eq!(
        store.keys(),
        vec![
            format!("symbols/Foo.dll/{}3/Foo.dll", GUID_HEX),
            format!("symbols/Foo.pdb/{}3/Foo.pdb", GUID_HEX),
        ]
    );
}

#[tokio::test]
async fn test_real_headers_portable() {
    let store = Arc::new(MemoryStore::new());
    let ingestor = SymbolIngestor::new(store.clone(), SymbolsConfig::default()).unwrap();

    let entries = vec![
        entry(
            "lib/netstandard2.0/Bar.dll",
            PeBuilder::new().codeview(GUID, 1, "Bar.pdb").portable().build(),
        ),
        entry("lib/netstandard2.0/Bar.pdb", portable_pdb(GUID, 0x1234)),
    ];
    ingestor.add_package(&entries).await.unwrap();

    assert_eq!(
        store.keys(),
        vec![
            format!("symbols/Bar.dll/{}1/Bar.dll", GUID_HEX),
            format!("symbols/Bar.pdb/{}ffffffff/Bar.pdb", GUID_HEX),
        ]
    );
}

#[tokio::test]
async fn test_pairing_is_case_insensitive_and_directory_scoped() {
    let store = Arc::new(MemoryStore::new());
    let ingestor = SymbolIngestor::new(store.clone(), SymbolsConfig::default()).unwrap();

    let entries = vec![
        entry("lib/net40/Foo.pdb", msf_pdb(GUID, 9)),
        entry("lib/net45/Foo.dll", PeBuilder::new().build()),
        entry("lib/net45/FOO.PDB", msf_pdb(GUID, 1)),
    ];
    let report = ingestor.add_package(&entries).await.unwrap();

    // The net40 symbol file has no module beside it and is not published.
    assert!(report.outcome("lib/net40/Foo.pdb").is_none());
    assert_eq!(
        store.keys(),
        vec![
            format!("symbols/FOO.PDB/{}1/FOO.PDB", GUID_HEX),
            format!("symbols/Foo.dll/{}1/Foo.dll", GUID_HEX),
        ]
    );
}

#[tokio::test]
async fn test_timestamp_priority_from_config() {
    let store = Arc::new(MemoryStore::new());
    let config = SymbolsConfig::from_json_str(
        r#"{ "signatures": { "priority": ["timestamp", "codeview"] } }"#,
    )
    .unwrap();
    let ingestor = SymbolIngestor::new(store.clone(), config).unwrap();

    let module = PeBuilder::new().timestamp(0x5F5E_1000, 0x3000).build();
    ingestor
        .add_package(&[entry("Foo.dll", module)])
        .await
        .unwrap();

    assert_eq!(store.keys(), vec!["symbols/Foo.dll/5f5e10003000/Foo.dll"]);
}

#[tokio::test]
async fn test_custom_prefix() {
    let store = Arc::new(MemoryStore::new());
    let mut config = SymbolsConfig::default();
    config.ingest.path_prefix = "feeds/main/symbols/".into();
    let ingestor = SymbolIngestor::new(store.clone(), config).unwrap();

    ingestor
        .add_package(&[entry("Foo.dll", PeBuilder::new().build())])
        .await
        .unwrap();

    assert_eq!(
        store.keys(),
        vec![format!("feeds/main/symbols/Foo.dll/{}1/Foo.dll", GUID_HEX)]
    );
}

#[tokio::test]
async fn test_empty_package() {
    let store = Arc::new(MemoryStore::new());
    let ingestor = SymbolIngestor::new(store.clone(), SymbolsConfig::default()).unwrap();

    let report = ingestor.add_package(&[]).await.unwrap();
    assert!(report.outcomes.is_empty());
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_feed_service_surface() {
    let store = Arc::new(MemoryStore::new());
    let service: Box<dyn FeedService> = Box::new(
        SymbolIngestor::new(store.clone(), sym_config())
            .unwrap()
            .with_extractor(scripted()),
    );

    service.add_package(&package()).await.unwrap();
    let writes = store.write_count();

    let removed = service
        .remove_package(&PackageIdentity::new("A", "1.0.0"))
        .await
        .unwrap();
    assert!(!removed);
    assert_eq!(store.write_count(), writes);
    assert_eq!(store.len(), 2);
}

/// Tracks how many store calls are in flight at once
#[derive(Default)]
struct PeakTrackingStore {
    inner: MemoryStore,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

#[async_trait]
impl ContentStore for PeakTrackingStore {
    async fn exists(&self, key: &str) -> symfeed::Result<bool> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.inner.exists(key).await
    }

    async fn write(&self, key: &str, data: Bytes) -> symfeed::Result<()> {
        self.inner.write(key, data).await
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrency_is_bounded() {
    let store = Arc::new(PeakTrackingStore::default());
    let mut config = SymbolsConfig::default();
    config.ingest.max_concurrency = 2;
    let ingestor = SymbolIngestor::new(store.clone(), config).unwrap();

    let entries: Vec<_> = (0..8u32)
        .map(|i| {
            let module = PeBuilder::new().codeview(GUID, i + 1, "M.pdb").build();
            entry(&format!("M{}.dll", i), module)
        })
        .collect();
    let report = ingestor.add_package(&entries).await.unwrap();

    assert_eq!(report.written(), 8);
    assert_eq!(store.inner.len(), 8);
    assert!(store.peak.load(Ordering::SeqCst) <= 2);
    assert!(store.peak.load(Ordering::SeqCst) >= 1);
}
