use calltime::storage::{SortKey, query_drain_count, query_top_calls};
use calltime::{ElfCatalog, Storage, TrackingConfig};
use calltime_probe::{CallSiteBinder, FunctionCatalog, StaticCatalog, TargetId, Tracker};
use rusqlite::Connection;
use std::sync::Arc;
use std::thread;

#[inline(never)]
pub fn busy_work(n: u64) -> u64 {
    (0..n).fold(0u64, |acc, x| acc.wrapping_add(std::hint::black_box(x)))
}

fn catalog() -> StaticCatalog {
    StaticCatalog::builder()
        .function("app.cache", "Lru", "get", &[] as &[&str])
        .function("app.cache", "Lru", "insert", &[] as &[&str])
        .build()
}

#[test]
fn drains_are_recorded_in_sqlite() {
    let dir = tempfile::tempdir().unwrap();
    let path = Storage::default_path(dir.path(), "integration");

    let config = TrackingConfig::from_toml_str(
        r#"
        [[track]]
        prefix = "Lru."
        names = "get,insert"
        "#,
    )
    .unwrap();

    let tracker = Arc::new(Tracker::new(catalog(), CallSiteBinder::new()));
    let report = tracker.register_requests(&config.requests());
    assert!(report.is_clean(), "{:?}", report.warnings);

    tracker.set_sink(Box::new(Storage::new(&path, "integration").unwrap()));
    tracker.start();

    let workers: Vec<_> = (0..4)
        .map(|_| {
            let tracker = tracker.clone();
            thread::spawn(move || {
                for i in 0..250 {
                    tracker.binder().call(TargetId(1), || busy_work(100));
                    if i % 5 == 0 {
                        tracker.binder().call(TargetId(2), || busy_work(10));
                    }
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    // mid-run drain, then the final one on stop
    tracker.drain();
    tracker.binder().call(TargetId(1), || busy_work(1));
    assert!(tracker.stop());

    let conn = Connection::open(&path).unwrap();
    assert_eq!(query_drain_count(&conn).unwrap(), 2);

    let top = query_top_calls(&conn, 10, SortKey::Calls).unwrap();
    assert_eq!(top.len(), 2);
    assert_eq!((top[0].name.as_str(), top[0].calls), ("Lru.get", 1001));
    assert_eq!((top[1].name.as_str(), top[1].calls), ("Lru.insert", 200));
    assert!(top[0].max_ns <= top[0].total_ns);
}

#[test]
fn faults_are_recorded() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("calltime.faults.db");

    let tracker = Tracker::new(catalog(), CallSiteBinder::new());
    tracker.register(["Lru.get"]);
    tracker.start();

    for i in 0..10 {
        let _: Result<(), &str> = tracker
            .binder()
            .call_fallible(TargetId(1), || if i < 3 { Err("miss") } else { Ok(()) });
    }

    let mut storage = Storage::new(&path, "faults").unwrap();
    storage.write_snapshot(&tracker.drain()).unwrap();

    let top = query_top_calls(storage.connection(), 10, SortKey::Exceptions).unwrap();
    assert_eq!((top[0].calls, top[0].exceptions), (10, 3));
}

#[test]
fn own_executable_resolves() {
    let exe = std::env::current_exe().unwrap();
    let catalog = ElfCatalog::load(&exe).unwrap();
    assert!(!catalog.is_empty());
    assert_eq!(busy_work(3), 3);

    let tracker = Tracker::new(catalog, CallSiteBinder::new());
    let report = tracker.register(["recording.busy_work"]);
    assert!(report.is_clean(), "{:?}", report.warnings);
    assert_eq!(report.tracked.len(), 1);
    assert_eq!(report.tracked[0].0, "recording.busy_work");
}
