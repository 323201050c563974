// tests/check_cycle.rs
// End-to-end cycle tests over a scripted source and a recording platform.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};

use listing_watcher::error::{WatchError, WatchResult};
use listing_watcher::model::{Item, WatcherConfig};
use listing_watcher::notify::{NotificationPlatform, Payload, PayloadKind};
use listing_watcher::registry::Registry;
use listing_watcher::sources::{DataSource, Formatter};
use listing_watcher::store::JsonStore;
use listing_watcher::watcher::{CheckOutcome, Watcher};

fn item(title: &str, price: &str) -> Item {
    match json!({ "title": title, "price": price }) {
        Value::Object(map) => Item(map),
        _ => unreachable!(),
    }
}

type FetchScript = Arc<Mutex<Vec<Result<Vec<Item>, String>>>>;

/// Source that replays a queue of scripted fetch results.
struct ScriptedSource {
    store: Arc<JsonStore>,
    fetches: FetchScript,
}

#[async_trait]
impl DataSource for ScriptedSource {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn parameter_schema(&self) -> Value {
        json!({ "type": "object" })
    }

    fn set_params(&mut self, _raw: &Value) -> WatchResult<()> {
        Ok(())
    }

    async fn fetch_items(&self) -> WatchResult<Vec<Item>> {
        let mut queue = self.fetches.lock().unwrap();
        if queue.is_empty() {
            return Err(WatchError::Fetch("fetch script exhausted".into()));
        }
        queue.remove(0).map_err(WatchError::Fetch)
    }

    fn get_stored_items(&self, watcher_name: &str) -> WatchResult<Vec<Item>> {
        self.store.get_items(watcher_name)
    }

    fn get_formatter(&self, formatter_name: &str) -> WatchResult<Box<dyn Formatter>> {
        match formatter_name {
            "plain" => Ok(Box::new(PlainFormatter)),
            other => Err(WatchError::NotFound(format!("formatter '{other}'"))),
        }
    }
}

struct PlainFormatter;

impl Formatter for PlainFormatter {
    fn format_items(&self, items: &[Item]) -> WatchResult<Payload> {
        let titles: Vec<&str> = items
            .iter()
            .map(|i| i.0.get("title").and_then(Value::as_str).unwrap_or("?"))
            .collect();
        Ok(Payload {
            subject: format!("{} new items", items.len()),
            body: titles.join("\n"),
            kind: PayloadKind::Plain,
        })
    }
}

struct RecordingPlatform {
    sent: Arc<Mutex<Vec<Payload>>>,
    fail: bool,
}

#[async_trait]
impl NotificationPlatform for RecordingPlatform {
    fn name(&self) -> &'static str {
        "recording"
    }

    fn parameter_schema(&self) -> Value {
        json!({ "type": "object" })
    }

    fn set_params(&mut self, _raw: &Value) -> WatchResult<()> {
        Ok(())
    }

    async fn notify(&self, payload: &Payload) -> WatchResult<()> {
        if self.fail {
            return Err(WatchError::Delivery("transport refused".into()));
        }
        self.sent.lock().unwrap().push(payload.clone());
        Ok(())
    }
}

struct Harness {
    _dir: tempfile::TempDir,
    store: Arc<JsonStore>,
    watcher: Watcher,
    fetches: FetchScript,
    sent: Arc<Mutex<Vec<Payload>>>,
}

impl Harness {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(JsonStore::open(dir.path().join("db.json")));
        let fetches: FetchScript = Arc::new(Mutex::new(Vec::new()));
        let sent = Arc::new(Mutex::new(Vec::new()));

        let mut sources: Registry<dyn DataSource> = Registry::new("data source");
        {
            let store = Arc::clone(&store);
            let fetches = Arc::clone(&fetches);
            sources
                .register("scripted", move || {
                    Box::new(ScriptedSource {
                        store: Arc::clone(&store),
                        fetches: Arc::clone(&fetches),
                    })
                })
                .unwrap();
        }

        let mut platforms: Registry<dyn NotificationPlatform> =
            Registry::new("notification platform");
        {
            let sent = Arc::clone(&sent);
            platforms
                .register("recording", move || {
                    Box::new(RecordingPlatform {
                        sent: Arc::clone(&sent),
                        fail: false,
                    })
                })
                .unwrap();
        }
        platforms
            .register("failing", || {
                Box::new(RecordingPlatform {
                    sent: Arc::new(Mutex::new(Vec::new())),
                    fail: true,
                })
            })
            .unwrap();

        let watcher = Watcher::new(Arc::clone(&store), sources, platforms);
        Harness {
            _dir: dir,
            store,
            watcher,
            fetches,
            sent,
        }
    }

    fn config(&self, name: &str) -> WatcherConfig {
        self.config_on_platform(name, "recording")
    }

    fn config_on_platform(&self, name: &str, platform: &str) -> WatcherConfig {
        serde_json::from_value(json!({
            "name": name,
            "data_source": {
                "name": "scripted",
                "formatter": "plain",
                "parameters": {}
            },
            "notification_platform": {
                "name": platform,
                "parameters": {}
            }
        }))
        .unwrap()
    }

    fn push_fetch(&self, items: Vec<Item>) {
        self.fetches.lock().unwrap().push(Ok(items));
    }

    fn push_fetch_error(&self, message: &str) {
        self.fetches.lock().unwrap().push(Err(message.to_string()));
    }

    fn sent(&self) -> Vec<Payload> {
        self.sent.lock().unwrap().clone()
    }
}

#[tokio::test]
async fn first_run_initializes_without_notifying() {
    let h = Harness::new();
    h.watcher.create(&h.config("w1")).unwrap();
    h.push_fetch(vec![item("A", "10"), item("B", "20")]);

    let outcome = h.watcher.check("w1").await.unwrap();

    assert_eq!(outcome, CheckOutcome::Initialized { item_count: 2 });
    assert!(h.sent().is_empty());
    assert_eq!(
        h.store.get_items("w1").unwrap(),
        vec![item("A", "10"), item("B", "20")]
    );
}

#[tokio::test]
async fn unchanged_fetch_sends_nothing_and_leaves_baseline_bytes_alone() {
    let h = Harness::new();
    h.watcher.create(&h.config("w1")).unwrap();
    h.push_fetch(vec![item("A", "10")]);
    h.watcher.check("w1").await.unwrap();

    let before = std::fs::read(h.store.path()).unwrap();

    h.push_fetch(vec![item("A", "10")]);
    let outcome = h.watcher.check("w1").await.unwrap();

    assert_eq!(outcome, CheckOutcome::Unchanged);
    assert!(h.sent().is_empty());
    let after = std::fs::read(h.store.path()).unwrap();
    assert_eq!(before, after);
}

#[tokio::test]
async fn new_item_notifies_once_and_persists_the_full_set() {
    let h = Harness::new();
    h.watcher.create(&h.config("w1")).unwrap();
    h.push_fetch(vec![item("A", "10")]);
    h.watcher.check("w1").await.unwrap();

    h.push_fetch(vec![item("A", "10"), item("B", "20")]);
    let outcome = h.watcher.check("w1").await.unwrap();

    assert_eq!(outcome, CheckOutcome::Notified { new_items: 1 });

    let sent = h.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].subject, "1 new items");
    assert_eq!(sent[0].body, "B");

    assert_eq!(
        h.store.get_items("w1").unwrap(),
        vec![item("A", "10"), item("B", "20")]
    );
}

#[tokio::test]
async fn reordered_fetch_with_same_membership_is_unchanged() {
    let h = Harness::new();
    h.watcher.create(&h.config("w1")).unwrap();
    h.push_fetch(vec![item("A", "10"), item("B", "20")]);
    h.watcher.check("w1").await.unwrap();

    h.push_fetch(vec![item("B", "20"), item("A", "10")]);
    let outcome = h.watcher.check("w1").await.unwrap();

    assert_eq!(outcome, CheckOutcome::Unchanged);
    assert!(h.sent().is_empty());
}

#[tokio::test]
async fn new_items_preserve_fetch_order() {
    let h = Harness::new();
    h.watcher.create(&h.config("w1")).unwrap();
    h.push_fetch(vec![item("A", "10")]);
    h.watcher.check("w1").await.unwrap();

    h.push_fetch(vec![
        item("C", "30"),
        item("A", "10"),
        item("B", "20"),
    ]);
    let outcome = h.watcher.check("w1").await.unwrap();

    assert_eq!(outcome, CheckOutcome::Notified { new_items: 2 });
    assert_eq!(h.sent()[0].body, "C\nB");
}

#[tokio::test]
async fn unknown_watcher_fails_without_store_mutation() {
    let h = Harness::new();

    let err = h.watcher.check("w2").await.unwrap_err();

    assert!(matches!(err, WatchError::NotFound(_)));
    assert!(!h.store.path().exists());
}

#[tokio::test]
async fn delivery_failure_aborts_before_the_baseline_is_rewritten() {
    let h = Harness::new();
    h.watcher
        .create(&h.config_on_platform("w1", "failing"))
        .unwrap();
    h.push_fetch(vec![item("A", "10")]);
    h.watcher.check("w1").await.unwrap();

    h.push_fetch(vec![item("A", "10"), item("B", "20")]);
    let err = h.watcher.check("w1").await.unwrap_err();

    assert!(matches!(err, WatchError::Delivery(_)));
    assert_eq!(h.store.get_items("w1").unwrap(), vec![item("A", "10")]);
}

#[tokio::test]
async fn batch_isolates_per_watcher_failures() {
    let h = Harness::new();
    h.watcher.create(&h.config("w1")).unwrap();
    h.watcher.create(&h.config("w2")).unwrap();

    h.push_fetch_error("feed unreachable");
    h.push_fetch(vec![item("A", "10")]);

    let reports = h.watcher.check_all().await.unwrap();

    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0].watcher, "w1");
    assert!(matches!(
        reports[0].outcome,
        Err(WatchError::Fetch(_))
    ));
    assert_eq!(reports[1].watcher, "w2");
    assert!(matches!(
        reports[1].outcome,
        Ok(CheckOutcome::Initialized { item_count: 1 })
    ));
}

#[tokio::test]
async fn create_rejects_duplicates_and_unknown_capabilities() {
    let h = Harness::new();
    h.watcher.create(&h.config("w1")).unwrap();

    let err = h.watcher.create(&h.config("w1")).unwrap_err();
    assert!(matches!(err, WatchError::Integrity(_)));

    let mut config = h.config("w2");
    config.data_source.name = "nope".into();
    let err = h.watcher.create(&config).unwrap_err();
    assert!(matches!(err, WatchError::NotFound(_)));

    let mut config = h.config("w2");
    config.data_source.formatter = "nope".into();
    let err = h.watcher.create(&config).unwrap_err();
    assert!(matches!(err, WatchError::NotFound(_)));

    let mut config = h.config("w2");
    config.notification_platform.name = "nope".into();
    let err = h.watcher.create(&config).unwrap_err();
    assert!(matches!(err, WatchError::NotFound(_)));

    assert_eq!(h.watcher.list().unwrap(), vec!["w1".to_string()]);
}

#[tokio::test]
async fn delete_removes_the_watcher_and_its_baseline() {
    let h = Harness::new();
    h.watcher.create(&h.config("w1")).unwrap();
    h.push_fetch(vec![item("A", "10")]);
    h.watcher.check("w1").await.unwrap();

    h.watcher.delete("w1").unwrap();

    assert!(h.watcher.list().unwrap().is_empty());
    assert!(h.store.get_items("w1").unwrap().is_empty());

    let err = h.watcher.delete("w1").unwrap_err();
    assert!(matches!(err, WatchError::NotFound(_)));
}

#[tokio::test]
async fn baseline_plus_one_end_to_end() {
    let h = Harness::new();
    h.watcher.create(&h.config("w1")).unwrap();

    h.push_fetch(vec![item("A", "10")]);
    assert_eq!(
        h.watcher.check("w1").await.unwrap(),
        CheckOutcome::Initialized { item_count: 1 }
    );

    h.push_fetch(vec![item("A", "10"), item("B", "20")]);
    assert_eq!(
        h.watcher.check("w1").await.unwrap(),
        CheckOutcome::Notified { new_items: 1 }
    );

    let sent = h.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].body, "B");
    assert_eq!(h.store.get_items("w1").unwrap().len(), 2);
}
