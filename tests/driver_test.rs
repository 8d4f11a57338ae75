use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{Result, bail};
use async_trait::async_trait;
use serde_json::json;

use message_mind::driver::Driver;
use message_mind::engine::classify::ClassifyEngine;
use message_mind::engine::{Engine, EngineConfig, Run, WorkflowError, WorkflowResult};
use message_mind::history::ConversationHistory;
use message_mind::item::{CategorySet, Item, ItemUpdate, NewItem};
use message_mind::notify::{LogNotifier, Notifier};
use message_mind::oracle::OracleResponse;
use message_mind::oracle::mock::MockOracle;
use message_mind::store::sqlite::SqliteStore;
use message_mind::store::{Inserted, Store};
use message_mind::tools::ToolRegistry;

fn extraction(category: &str) -> OracleResponse {
    OracleResponse::text(
        json!({"reasoning": "r", "summary": format!("about {}", category), "category": category})
            .to_string(),
    )
    .with_usage(1_000, 100)
}

fn classify_engine(oracle: Arc<MockOracle>) -> Arc<ClassifyEngine> {
    Arc::new(ClassifyEngine::new(
        oracle,
        Arc::new(ToolRegistry::new()),
        EngineConfig::default(),
    ))
}

async fn store_with(items: Vec<NewItem>) -> (Arc<SqliteStore>, Vec<i64>) {
    let store = Arc::new(SqliteStore::in_memory().unwrap());
    let mut ids = Vec::new();
    for item in items {
        match store.insert(item).await.unwrap() {
            Inserted::New(id) => ids.push(id),
            Inserted::Duplicate => panic!("unexpected duplicate"),
        }
    }
    (store, ids)
}

#[derive(Default)]
struct CountingNotifier {
    sent: AtomicUsize,
}

#[async_trait]
impl Notifier for CountingNotifier {
    async fn notify(&self, _item: &Item, _result: &WorkflowResult) -> Result<()> {
        self.sent.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct FailingNotifier;

#[async_trait]
impl Notifier for FailingNotifier {
    async fn notify(&self, _item: &Item, _result: &WorkflowResult) -> Result<()> {
        bail!("telegram is down")
    }
}

#[tokio::test]
async fn sweep_classifies_and_normalizes() {
    let (store, ids) = store_with(vec![NewItem::new("https://a.example"), NewItem::new("fn main")]).await;
    let oracle = Arc::new(MockOracle::new(vec![
        OracleResponse::text("a course on neural nets").with_usage(2_000, 200),
        extraction("Machine-Learning"),
        OracleResponse::text("a code snippet"),
        extraction("Rust"),
    ]));
    let notifier = Arc::new(CountingNotifier::default());
    let driver = Driver::new(classify_engine(oracle), store.clone(), notifier.clone());

    let report = driver.sweep().await.unwrap();

    assert_eq!(report.succeeded.len(), 2);
    assert!(report.failed.is_empty());
    assert_eq!(report.succeeded[0].item_id, ids[0]);
    assert_eq!(report.succeeded[0].update.category, "machine learning");
    assert_eq!(report.succeeded[0].result.category, "Machine-Learning");
    assert_eq!(report.succeeded[1].update.category, "rust");
    assert_eq!(report.succeeded[0].usage.input_tokens, 3_000);
    assert_eq!(notifier.sent.load(Ordering::SeqCst), 2);

    assert!(store.fetch_pending().await.unwrap().is_empty());
    let categories = store.fetch_categories().await.unwrap();
    assert!(categories.contains("machine learning"));
    assert!(categories.contains("rust"));

    let total = report.total_cost();
    let sum: f64 = report.succeeded.iter().map(|c| c.update.cost).sum();
    assert!(total > 0.0);
    assert!((total - sum).abs() < 1e-12);
}

#[tokio::test]
async fn media_items_are_rejected_without_calling_the_oracle() {
    let mut photo = NewItem::new("look at this");
    photo.has_media = true;
    let (store, ids) = store_with(vec![photo]).await;
    let oracle = Arc::new(MockOracle::new(vec![]));
    let driver = Driver::new(classify_engine(oracle.clone()), store.clone(), Arc::new(LogNotifier));

    let report = driver.sweep().await.unwrap();

    assert!(report.succeeded.is_empty());
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].item_id, ids[0]);
    assert!(matches!(report.failed[0].error, WorkflowError::Rejected(_)));
    assert_eq!(oracle.calls(), 0);
    assert_eq!(store.fetch_pending().await.unwrap().len(), 1);
}

#[tokio::test]
async fn one_failing_item_does_not_stop_the_sweep() {
    let (store, ids) = store_with(vec![NewItem::new("first"), NewItem::new("second")]).await;
    let oracle = Arc::new(MockOracle::scripted(vec![
        Err("rate limited".to_string()),
        Ok(OracleResponse::text("a note")),
        Ok(extraction("notes")),
    ]));
    let driver = Driver::new(classify_engine(oracle), store.clone(), Arc::new(LogNotifier));

    let report = driver.sweep().await.unwrap();

    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].item_id, ids[0]);
    assert!(matches!(report.failed[0].error, WorkflowError::Oracle { .. }));
    assert_eq!(report.succeeded.len(), 1);
    assert_eq!(report.succeeded[0].item_id, ids[1]);

    // The failed item is picked up again next sweep.
    let pending = store.fetch_pending().await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, ids[0]);
}

#[tokio::test]
async fn notification_failure_keeps_the_result() {
    let (store, _) = store_with(vec![NewItem::new("hello")]).await;
    let oracle = Arc::new(MockOracle::new(vec![
        OracleResponse::text("greeting"),
        extraction("misc"),
    ]));
    let driver = Driver::new(classify_engine(oracle), store.clone(), Arc::new(FailingNotifier));

    let report = driver.sweep().await.unwrap();

    assert_eq!(report.succeeded.len(), 1);
    assert!(report.failed.is_empty());
    assert!(store.fetch_pending().await.unwrap().is_empty());
}

#[tokio::test]
async fn empty_store_is_a_quiet_sweep() {
    let (store, _) = store_with(vec![]).await;
    let oracle = Arc::new(MockOracle::new(vec![]));
    let driver = Driver::new(classify_engine(oracle.clone()), store, Arc::new(LogNotifier));

    let report = driver.sweep().await.unwrap();

    assert!(report.succeeded.is_empty());
    assert_eq!(oracle.calls(), 0);
    assert!(report.to_string().starts_with("classified 0 item(s), 0 failed"));
}

/// Files everything under one label and remembers the categories it was shown.
struct FixedEngine {
    seen_categories: std::sync::Mutex<Vec<CategorySet>>,
}

#[async_trait]
impl Engine for FixedEngine {
    async fn run(&self, item: &Item, categories: &CategorySet) -> Result<Run, WorkflowError> {
        self.seen_categories.lock().unwrap().push(categories.clone());
        tokio::time::sleep(std::time::Duration::from_millis(10 * (item.id as u64 % 3))).await;
        Ok(Run {
            result: WorkflowResult {
                category: "Inbox".to_string(),
                summary: item.details.clone(),
                reasoning: String::new(),
                cost: 0.0,
            },
            history: ConversationHistory::new(),
        })
    }
}

#[tokio::test]
async fn concurrent_sweep_reports_in_id_order() {
    let items = (0..6).map(|i| NewItem::new(format!("item {}", i))).collect();
    let (store, ids) = store_with(items).await;
    let seeded = store.insert(NewItem::new("old")).await.unwrap();
    let Inserted::New(old_id) = seeded else {
        panic!("unexpected duplicate");
    };
    store
        .update(
            old_id,
            &ItemUpdate {
                category: "archive".to_string(),
                summary: "old".to_string(),
                reasoning: String::new(),
                cost: 0.0,
                completed: false,
            },
        )
        .await
        .unwrap();

    let engine = Arc::new(FixedEngine {
        seen_categories: std::sync::Mutex::new(Vec::new()),
    });
    let driver = Driver::new(engine.clone(), store.clone(), Arc::new(LogNotifier)).with_concurrency(3);

    let report = driver.sweep().await.unwrap();

    let reported: Vec<i64> = report.succeeded.iter().map(|c| c.item_id).collect();
    assert_eq!(reported, ids);
    assert!(report.succeeded.iter().all(|c| c.update.category == "inbox"));

    // Every run saw the same snapshot taken at the start of the sweep.
    let seen = engine.seen_categories.lock().unwrap();
    assert_eq!(seen.len(), 6);
    assert!(seen.iter().all(|c| c.len() == 1 && c.contains("archive")));
}

struct BrokenStore;

#[async_trait]
impl Store for BrokenStore {
    async fn insert(&self, _item: NewItem) -> Result<Inserted> {
        bail!("read-only")
    }
    async fn get(&self, _id: i64) -> Result<Option<Item>> {
        Ok(None)
    }
    async fn fetch_pending(&self) -> Result<Vec<Item>> {
        bail!("disk I/O error")
    }
    async fn fetch_categories(&self) -> Result<CategorySet> {
        Ok(CategorySet::new())
    }
    async fn update(&self, _id: i64, _update: &ItemUpdate) -> Result<()> {
        bail!("read-only")
    }
}

#[tokio::test]
async fn unreadable_store_fails_the_sweep() {
    let oracle = Arc::new(MockOracle::new(vec![]));
    let driver = Driver::new(classify_engine(oracle), Arc::new(BrokenStore), Arc::new(LogNotifier));

    let err = driver.sweep().await.unwrap_err();
    assert!(format!("{:#}", err).contains("disk I/O error"));
}

struct HangingNotifier;

#[async_trait]
impl Notifier for HangingNotifier {
    async fn notify(&self, _item: &Item, _result: &WorkflowResult) -> Result<()> {
        std::future::pending::<()>().await;
        Ok(())
    }
}

#[tokio::test]
async fn hanging_notifier_does_not_stall_the_sweep() {
    let (store, ids) = store_with(vec![NewItem::new("first"), NewItem::new("second")]).await;
    let oracle = Arc::new(MockOracle::new(vec![
        OracleResponse::text("a note"),
        extraction("notes"),
        OracleResponse::text("another note"),
        extraction("notes"),
    ]));
    let driver = Driver::new(classify_engine(oracle), store.clone(), Arc::new(HangingNotifier))
        .with_notify_timeout(std::time::Duration::from_millis(50));

    let report = tokio::time::timeout(std::time::Duration::from_secs(5), driver.sweep())
        .await
        .expect("sweep should finish despite the notifier")
        .unwrap();

    let done: Vec<i64> = report.succeeded.iter().map(|c| c.item_id).collect();
    assert_eq!(done, ids);
    assert!(report.failed.is_empty());
    assert!(store.fetch_pending().await.unwrap().is_empty());
}

/// Reads from a real store but refuses to write results.
struct ReadOnlyStore {
    inner: SqliteStore,
}

#[async_trait]
impl Store for ReadOnlyStore {
    async fn insert(&self, item: NewItem) -> Result<Inserted> {
        self.inner.insert(item).await
    }
    async fn get(&self, id: i64) -> Result<Option<Item>> {
        self.inner.get(id).await
    }
    async fn fetch_pending(&self) -> Result<Vec<Item>> {
        self.inner.fetch_pending().await
    }
    async fn fetch_categories(&self) -> Result<CategorySet> {
        self.inner.fetch_categories().await
    }
    async fn update(&self, _id: i64, _update: &ItemUpdate) -> Result<()> {
        bail!("attempt to write a readonly database")
    }
}

#[tokio::test]
async fn failed_result_write_is_an_item_failure() {
    let store = Arc::new(ReadOnlyStore {
        inner: SqliteStore::in_memory().unwrap(),
    });
    let Inserted::New(id) = store.insert(NewItem::new("hello")).await.unwrap() else {
        panic!("unexpected duplicate");
    };
    let oracle = Arc::new(MockOracle::new(vec![
        OracleResponse::text("greeting"),
        extraction("misc"),
    ]));
    let notifier = Arc::new(CountingNotifier::default());
    let driver = Driver::new(classify_engine(oracle), store.clone(), notifier.clone());

    let report = driver.sweep().await.unwrap();

    assert!(report.succeeded.is_empty());
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].item_id, id);
    match &report.failed[0].error {
        WorkflowError::Store(message) => assert!(message.contains("readonly")),
        other => panic!("expected store error, got {:?}", other),
    }
    assert_eq!(notifier.sent.load(Ordering::SeqCst), 0);
    assert_eq!(store.fetch_pending().await.unwrap().len(), 1);
}
