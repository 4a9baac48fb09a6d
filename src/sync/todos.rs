use std::future::Future;

use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::notify::Notifier;
use crate::core::task::Task;

pub const DEFAULT_API_LIMIT: u64 = 3;
pub const DEFAULT_API_SKIP: u64 = 0;

/// Pagination cursor and page size for one fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchParams {
    pub skip: u64,
    pub limit: u64,
}

impl Default for FetchParams {
    fn default() -> Self {
        Self {
            skip: DEFAULT_API_SKIP,
            limit: DEFAULT_API_LIMIT,
        }
    }
}

impl FetchParams {
    pub fn first_page(limit: u64) -> Self {
        Self { skip: 0, limit }
    }

    /// The page right after this one.
    pub fn next(&self) -> Self {
        Self {
            skip: self.skip + self.limit,
            limit: self.limit,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TodosResponse {
    todos: Vec<Task>,
}

/// Anything that can serve a page of to-dos.
pub trait TaskSource: Send + Sync {
    fn fetch_page(&self, params: FetchParams) -> impl Future<Output = Result<Vec<Task>, String>> + Send;
}

/// Client for the paginated `/todos` endpoint.
pub struct DummyJsonClient {
    base_url: String,
    http: Client,
}

impl DummyJsonClient {
    pub fn new(base_url: &str) -> Result<Self, String> {
        let http = Client::builder()
            .build()
            .map_err(|e| format!("Failed to build HTTP client: {}", e))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    pub fn page_url(&self, params: FetchParams) -> String {
        format!("{}?limit={}&skip={}", self.base_url, params.limit, params.skip)
    }
}

impl TaskSource for DummyJsonClient {
    async fn fetch_page(&self, params: FetchParams) -> Result<Vec<Task>, String> {
        let url = self.page_url(params);
        log::debug!("GET {}", url);
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| format!("request failed: {}", e))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(format!("API request failed with status {}", status.as_u16()));
        }

        let body: TodosResponse = resp
            .json()
            .await
            .map_err(|e| format!("invalid response body: {}", e))?;
        Ok(body.todos)
    }
}

/// Fetch one page. Failures are logged and reported through `notifier` and come
/// back as an empty list, so callers cannot tell "failed" from "no tasks".
pub async fn fetch_todos<T: TaskSource>(
    source: &T,
    params: FetchParams,
    notifier: &Notifier,
) -> Vec<Task> {
    match source.fetch_page(params).await {
        Ok(todos) if todos.is_empty() => {
            log::info!("No tasks fetched from the API (skip {}).", params.skip);
            notifier.info("No tasks fetched from the API.");
            todos
        }
        Ok(todos) => {
            log::info!("Fetched {} tasks from the API.", todos.len());
            todos
        }
        Err(e) => {
            log::error!("Error fetching todos: {}", e);
            notifier.error(format!("Error fetching tasks: {}", e));
            Vec::new()
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::ScriptedSource;
    use super::*;
    use crate::sync::notify::{self, NoticeKind};

    #[test]
    fn url_carries_limit_and_skip() {
        let client = DummyJsonClient::new("https://dummyjson.com/todos/").unwrap();
        assert_eq!(
            client.page_url(FetchParams { skip: 6, limit: 3 }),
            "https://dummyjson.com/todos?limit=3&skip=6"
        );
    }

    #[test]
    fn empty_response_body_parses() {
        let body: TodosResponse = serde_json::from_str(r#"{"todos": [], "total": 254}"#).unwrap();
        assert!(body.todos.is_empty());
    }

    #[tokio::test]
    async fn empty_page_yields_one_notification() {
        let notifier = Notifier::new();
        let mut rx = notifier.subscribe();
        let source = ScriptedSource::with_tasks(Vec::new());

        let tasks = fetch_todos(&source, FetchParams::default(), &notifier).await;
        assert!(tasks.is_empty());

        let seen = notify::drain(&mut rx);
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].kind, NoticeKind::Info);
    }

    #[tokio::test]
    async fn failure_is_swallowed_into_empty_list() {
        let notifier = Notifier::new();
        let mut rx = notifier.subscribe();
        let source = ScriptedSource::failing("API request failed with status 503");

        let tasks = fetch_todos(&source, FetchParams::default(), &notifier).await;
        assert!(tasks.is_empty());

        let seen = notify::drain(&mut rx);
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].kind, NoticeKind::Error);
        assert!(seen[0].text.contains("503"));
    }

    #[tokio::test]
    async fn pages_follow_the_cursor() {
        let notifier = Notifier::new();
        let all: Vec<Task> = (1..=5u64).map(|i| Task::new(i, format!("t{}", i))).collect();
        let source = ScriptedSource::with_tasks(all);

        let page = fetch_todos(&source, FetchParams { skip: 3, limit: 3 }, &notifier).await;
        let ids: Vec<&str> = page.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["4", "5"]);
    }
}
