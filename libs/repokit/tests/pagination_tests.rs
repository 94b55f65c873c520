mod common;

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use common::*;
use query_core::PageRequest;
use repokit::{paginate, CancellationToken, QuerySpec, Queryable, RepoError, StoreError, Window};

/// Backend with only `count` and `fetch`, to exercise the default
/// `count_and_window`.
struct Numbers {
    rows: Vec<Customer>,
    counts: AtomicUsize,
    fetches: AtomicUsize,
}

impl Numbers {
    fn new(n: i64) -> Self {
        Self {
            rows: (1..=n).map(|i| customer(i, "N", "N", i)).collect(),
            counts: AtomicUsize::new(0),
            fetches: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Queryable<Customer> for Numbers {
    async fn count(&self, _query: &QuerySpec) -> Result<u64, StoreError> {
        self.counts.fetch_add(1, Ordering::SeqCst);
        Ok(self.rows.len() as u64)
    }

    async fn fetch(
        &self,
        _query: &QuerySpec,
        window: Option<Window>,
    ) -> Result<Vec<Customer>, StoreError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let rows = self.rows.iter().cloned();
        Ok(match window {
            Some(w) => rows.skip(w.offset as usize).take(w.limit as usize).collect(),
            None => rows.collect(),
        })
    }
}

#[tokio::test]
async fn twenty_five_rows_in_pages_of_ten() {
    let source = Numbers::new(25);
    let cancel = CancellationToken::new();

    let first = paginate::<Customer, _>(&source, &QuerySpec::default(), PageRequest::new(0, 10).unwrap(), &cancel)
        .await
        .unwrap();
    assert_eq!(first.items.len(), 10);
    assert_eq!(first.total_count(), 25);
    assert_eq!(first.total_pages(), 3);
    assert!(!first.has_previous_page());
    assert!(first.has_next_page());

    let last = paginate::<Customer, _>(&source, &QuerySpec::default(), PageRequest::new(2, 10).unwrap(), &cancel)
        .await
        .unwrap();
    assert_eq!(last.items.iter().map(|c| c.id).collect::<Vec<_>>(), (21..=25).collect::<Vec<_>>());
    assert!(last.has_previous_page());
    assert!(!last.has_next_page());

    assert_eq!(source.counts.load(Ordering::SeqCst), 2);
    assert_eq!(source.fetches.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn page_past_the_end_is_empty_but_keeps_the_total() {
    let source = Numbers::new(5);
    let page = paginate::<Customer, _>(
        &source,
        &QuerySpec::default(),
        PageRequest::new(3, 10).unwrap(),
        &CancellationToken::new(),
    )
    .await
    .unwrap();

    assert!(page.items.is_empty());
    assert_eq!(page.total_count(), 5);
    assert_eq!(page.total_pages(), 1);
    assert!(page.has_previous_page());
    assert!(!page.has_next_page());
}

#[tokio::test]
async fn empty_source() {
    let source = Numbers::new(0);
    let page = paginate::<Customer, _>(&source, &QuerySpec::default(), PageRequest::default(), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(page.total_pages(), 0);
    assert!(!page.has_next_page());
    assert!(!page.has_previous_page());
}

#[tokio::test]
async fn cancelled_before_reading() {
    let source = Numbers::new(3);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = paginate::<Customer, _>(&source, &QuerySpec::default(), PageRequest::default(), &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, RepoError::Cancelled));
    assert_eq!(source.counts.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn memory_store_pages_are_serializable() {
    let fx = fixture();
    let cancel = CancellationToken::new();
    fx.customers.add_range(people(), &cancel).await.unwrap();

    let page = fx
        .customers
        .get_list(None, &[], &Default::default(), PageRequest::new(1, 4).unwrap(), &cancel)
        .await
        .unwrap()
        .map_items(|c| c.id);

    let json = serde_json::to_value(&page).unwrap();
    assert_eq!(
        json,
        serde_json::json!({
            "items": [5, 6],
            "index": 1,
            "size": 4,
            "totalCount": 6,
            "totalPages": 2,
            "hasPreviousPage": true,
            "hasNextPage": false
        })
    );
}
