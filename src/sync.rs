//! The Collection Synchronizer drains the cursor-paginated expense listing into memory.

use crate::api::{ApiError, Service};
use crate::model::Expense;
use tracing::{debug, trace};
use url::Url;

/// The drain loop failed. Whatever was fetched before the failure has been discarded.
#[derive(Debug, thiserror::Error)]
#[error("Failed to load expenses")]
pub struct LoadError {
    #[source]
    source: ApiError,
}

impl LoadError {
    pub fn api_error(&self) -> &ApiError {
        &self.source
    }
}

/// Follows `next` links from the first page until a page has none, and returns every item in the
/// order the server sent them.
///
/// Pages are fetched one after another since each cursor comes from the previous response. A
/// server whose cursors never run out keeps this looping.
pub async fn drain(service: &Service) -> Result<Vec<Expense>, LoadError> {
    let base = service.transport().base().clone();
    let mut cursor = service.first_page().to_string();
    let mut collection = Vec::new();
    let mut pages = 0usize;

    loop {
        trace!("Fetching expenses page at {cursor}");
        let page = service
            .expenses_page(&cursor)
            .await
            .map_err(|source| LoadError { source })?;
        pages += 1;
        collection.extend(page.results);
        match page.next {
            Some(next) => cursor = normalize_cursor(&base, &next),
            None => break,
        }
    }

    debug!("Loaded {} expenses from {pages} pages", collection.len());
    Ok(collection)
}

/// Strips the base address from a `next` link the server echoed back. Links that do not start
/// with the base are returned unchanged.
pub fn normalize_cursor(base: &Url, next: &str) -> String {
    let prefix = base.as_str().trim_end_matches('/');
    match next.strip_prefix(prefix) {
        Some(rest) if rest.starts_with('/') => rest.to_string(),
        Some(rest) if rest.is_empty() || rest.starts_with('?') => format!("/{rest}"),
        _ => next.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ApiErrorKind, Http, HttpRequest, HttpResponse, Transport};
    use crate::credentials::CredentialStore;
    use crate::model::{Amount, Category, Page, PaymentMethod};
    use crate::nav::Navigator;
    use crate::session::SessionCell;
    use crate::test::TestEnv;
    use chrono::NaiveDate;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    const BASE: &str = "http://127.0.0.1:8000/";

    /// Replies with a fixed sequence of responses and records every URL it was asked for.
    #[derive(Default)]
    struct Scripted {
        replies: Mutex<VecDeque<Result<HttpResponse, ApiError>>>,
        urls: Mutex<Vec<String>>,
    }

    impl Scripted {
        fn page(self, ids: &[i64], next: Option<&str>) -> Self {
            let page = Page {
                results: ids.iter().map(|id| expense(*id)).collect(),
                next: next.map(str::to_string),
            };
            self.replies.lock().unwrap().push_back(Ok(HttpResponse {
                status: 200,
                body: serde_json::to_string(&page).unwrap(),
            }));
            self
        }

        fn fail(self, e: ApiError) -> Self {
            self.replies.lock().unwrap().push_back(Err(e));
            self
        }
    }

    #[async_trait::async_trait]
    impl Http for Scripted {
        async fn send(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
            self.urls.lock().unwrap().push(request.url.to_string());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(ApiError::unknown(None, "script exhausted")))
        }
    }

    fn expense(id: i64) -> Expense {
        Expense {
            id,
            amount: Amount::ZERO,
            category: Category::Other,
            payment_method: PaymentMethod::Cash,
            description: format!("expense {id}"),
            date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            created_at: None,
            updated_at: None,
        }
    }

    fn service(http: Arc<Scripted>) -> Service {
        Service::new(Transport::new(
            http,
            Url::parse(BASE).unwrap(),
            CredentialStore::in_memory(),
            SessionCell::new(),
            Navigator::default(),
        ))
    }

    fn ids(collection: &[Expense]) -> Vec<i64> {
        collection.iter().map(|e| e.id).collect()
    }

    #[tokio::test]
    async fn test_single_page_is_one_request() {
        let http = Arc::new(Scripted::default().page(&[3, 2, 1], None));
        let collection = drain(&service(http.clone())).await.unwrap();
        assert_eq!(ids(&collection), vec![3, 2, 1]);
        assert_eq!(http.urls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_pages_are_concatenated_in_server_order() {
        let http = Arc::new(
            Scripted::default()
                .page(&[9, 8], Some("http://127.0.0.1:8000/api/expenses/?cursor=b2"))
                .page(&[7], Some("/api/expenses/?cursor=c3"))
                .page(&[1, 5], None),
        );
        let collection = drain(&service(http.clone())).await.unwrap();
        assert_eq!(ids(&collection), vec![9, 8, 7, 1, 5]);
        assert_eq!(
            *http.urls.lock().unwrap(),
            vec![
                "http://127.0.0.1:8000/api/expenses/",
                "http://127.0.0.1:8000/api/expenses/?cursor=b2",
                "http://127.0.0.1:8000/api/expenses/?cursor=c3",
            ]
        );
    }

    #[tokio::test]
    async fn test_failure_discards_partial_collection() {
        let http = Arc::new(
            Scripted::default()
                .page(&[9, 8], Some("/api/expenses/?cursor=b2"))
                .fail(ApiError::network("connection reset")),
        );
        let e = drain(&service(http)).await.unwrap_err();
        assert_eq!(e.to_string(), "Failed to load expenses");
        assert_eq!(e.api_error().kind(), ApiErrorKind::NetworkUnreachable);
    }

    #[test]
    fn test_normalize_cursor() {
        let base = Url::parse(BASE).unwrap();
        assert_eq!(
            normalize_cursor(&base, "http://127.0.0.1:8000/api/expenses/?cursor=x"),
            "/api/expenses/?cursor=x"
        );
        assert_eq!(
            normalize_cursor(&base, "/api/expenses/?cursor=x"),
            "/api/expenses/?cursor=x"
        );
        let prefixed = Url::parse("https://host.test/v2/").unwrap();
        assert_eq!(
            normalize_cursor(&prefixed, "https://host.test/v2/api/expenses/?cursor=y"),
            "/api/expenses/?cursor=y"
        );
        // A different path that merely shares the prefix is left alone.
        assert_eq!(
            normalize_cursor(&prefixed, "https://host.test/v2x/api/"),
            "https://host.test/v2x/api/"
        );
    }

    #[tokio::test]
    async fn test_drain_test_server() {
        let env = TestEnv::new().await;
        let client = env.logged_in_client().await;
        env.server().set_page_size(10);
        let collection = drain(client.service()).await.unwrap();
        assert_eq!(collection.len(), 25);
        assert!(collection.windows(2).all(|w| w[0].date >= w[1].date));
        let pages = env
            .server()
            .requests()
            .iter()
            .filter(|r| r.starts_with("GET /api/expenses/"))
            .count();
        assert_eq!(pages, 3);
    }
}
