//! HTTP client for a Google-Tasks-shaped REST service.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::{Deserialize, Serialize};

use super::{ListTasksQuery, RemoteError, RemoteResult, RemoteTask, RemoteTaskService};
use crate::error::{Error, Result};
use crate::models::{TaskFields, TaskStatus};
use crate::util::{error_excerpt, is_http_url, non_empty_trimmed};

/// Public Google Tasks v1 endpoint
pub const DEFAULT_API_BASE_URL: &str = "https://tasks.googleapis.com/tasks/v1";

const HTTP_TIMEOUT_SECS: u64 = 30;
const PAGE_SIZE: &str = "100";

/// Remote task service speaking the Google Tasks v1 wire format
#[derive(Clone)]
pub struct HttpTaskService {
    base_url: Url,
    access_token: String,
    client: Client,
}

impl fmt::Debug for HttpTaskService {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("HttpTaskService")
            .field("base_url", &self.base_url.as_str())
            .field("access_token", &"[REDACTED]")
            .finish()
    }
}

impl HttpTaskService {
    pub fn new(base_url: impl Into<String>, access_token: impl Into<String>) -> Result<Self> {
        let base_url = normalize_base_url(base_url.into())?;
        let access_token = non_empty_trimmed(Some(access_token.into())).ok_or_else(|| {
            Error::InvalidInput("access token must not be empty".to_string())
        })?;
        let client = Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()
            .map_err(|error| Error::InvalidInput(format!("failed to build HTTP client: {error}")))?;

        Ok(Self {
            base_url,
            access_token,
            client,
        })
    }

    fn url(&self, segments: &[&str]) -> RemoteResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| RemoteError::Validation("base URL cannot hold a path".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn send(&self, request: RequestBuilder) -> RemoteResult<Response> {
        let response = request
            .bearer_auth(&self.access_token)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(classify_status(status, &body))
    }

    async fn get_page<T: for<'de> Deserialize<'de>>(
        &self,
        url: Url,
        query: &[(&str, &str)],
        page_token: Option<&str>,
    ) -> RemoteResult<Page<T>> {
        let mut request = self.client.get(url).query(query);
        if let Some(token) = page_token {
            request = request.query(&[("pageToken", token)]);
        }
        self.send(request)
            .await?
            .json::<Page<T>>()
            .await
            .map_err(transport_error)
    }
}

impl RemoteTaskService for HttpTaskService {
    async fn list_task_lists(&self, account: &str) -> RemoteResult<Vec<String>> {
        let url = self.url(&["users", "@me", "lists"])?;
        let mut ids = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let page: Page<WireTaskList> = self
                .get_page(url.clone(), &[("maxResults", PAGE_SIZE)], page_token.as_deref())
                .await?;
            ids.extend(page.items.into_iter().map(|list| list.id));
            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        tracing::debug!("Account {account} has {} task lists", ids.len());
        Ok(ids)
    }

    async fn list_tasks(
        &self,
        list_id: &str,
        query: ListTasksQuery,
    ) -> RemoteResult<Vec<RemoteTask>> {
        let url = self.url(&["lists", list_id, "tasks"])?;
        let params = [
            ("maxResults", PAGE_SIZE),
            ("showCompleted", bool_param(query.include_completed)),
            ("showHidden", bool_param(query.include_hidden)),
            ("showDeleted", bool_param(query.include_deleted)),
        ];
        let mut tasks = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let page: Page<WireTask> = self
                .get_page(url.clone(), &params, page_token.as_deref())
                .await?;
            for wire in page.items {
                tasks.push(wire.into_remote(list_id)?);
            }
            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(tasks)
    }

    async fn create_task(&self, list_id: &str, fields: &TaskFields) -> RemoteResult<String> {
        let url = self.url(&["lists", list_id, "tasks"])?;
        let created: WireTask = self
            .send(self.client.post(url).json(&WirePayload::from(fields)))
            .await?
            .json()
            .await
            .map_err(transport_error)?;
        Ok(created.id)
    }

    async fn update_task(
        &self,
        list_id: &str,
        remote_id: &str,
        fields: &TaskFields,
    ) -> RemoteResult<()> {
        let url = self.url(&["lists", list_id, "tasks", remote_id])?;
        self.send(self.client.patch(url).json(&WirePayload::from(fields)))
            .await?;
        Ok(())
    }

    async fn delete_task(&self, list_id: &str, remote_id: &str) -> RemoteResult<()> {
        let url = self.url(&["lists", list_id, "tasks", remote_id])?;
        self.send(self.client.delete(url)).await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Wire format
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Page<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireTaskList {
    id: String,
}

#[derive(Debug, Deserialize)]
struct WireTask {
    id: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    notes: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    due: Option<String>,
    #[serde(default)]
    updated: Option<String>,
    #[serde(default)]
    deleted: bool,
    #[serde(default)]
    hidden: bool,
}

impl WireTask {
    fn into_remote(self, list_id: &str) -> RemoteResult<RemoteTask> {
        let status = if self.deleted {
            TaskStatus::Deleted
        } else if self.status.as_deref() == Some("completed") {
            TaskStatus::Completed
        } else {
            TaskStatus::Pending
        };

        let due = self
            .due
            .as_deref()
            .map(parse_due)
            .transpose()?;

        let modified_at = self
            .updated
            .as_deref()
            .map(|raw| {
                DateTime::parse_from_rfc3339(raw)
                    .map(|at| at.with_timezone(&Utc))
                    .map_err(|error| {
                        RemoteError::Validation(format!("invalid updated timestamp '{raw}': {error}"))
                    })
            })
            .transpose()?
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);

        Ok(RemoteTask {
            id: self.id,
            list_id: list_id.to_string(),
            fields: TaskFields {
                title: self.title.unwrap_or_default(),
                notes: self.notes.unwrap_or_default(),
                due,
                status,
                modified_at,
            },
            hidden: self.hidden,
        })
    }
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct WirePayload {
    title: String,
    notes: String,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    due: Option<String>,
    deleted: bool,
}

impl From<&TaskFields> for WirePayload {
    fn from(fields: &TaskFields) -> Self {
        let status = match fields.status {
            TaskStatus::Completed => "completed",
            TaskStatus::Pending | TaskStatus::Deleted => "needsAction",
        };
        Self {
            title: fields.title.clone(),
            notes: fields.notes.clone(),
            status,
            due: fields
                .due
                .map(|date| date.and_time(NaiveTime::MIN).and_utc().to_rfc3339()),
            deleted: fields.status == TaskStatus::Deleted,
        }
    }
}

/// The service stores due dates as midnight UTC timestamps; only the date counts.
fn parse_due(raw: &str) -> RemoteResult<NaiveDate> {
    DateTime::parse_from_rfc3339(raw)
        .map(|at| at.with_timezone(&Utc).date_naive())
        .or_else(|_| NaiveDate::parse_from_str(raw, "%Y-%m-%d"))
        .map_err(|error| RemoteError::Validation(format!("invalid due date '{raw}': {error}")))
}

const fn bool_param(value: bool) -> &'static str {
    if value {
        "true"
    } else {
        "false"
    }
}

fn transport_error(error: reqwest::Error) -> RemoteError {
    if error.is_decode() {
        RemoteError::Validation(format!("unexpected response body: {error}"))
    } else {
        RemoteError::Network(error.to_string())
    }
}

#[derive(Debug, Deserialize)]
struct WireErrorBody {
    error: Option<WireErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct WireErrorDetail {
    message: Option<String>,
}

fn classify_status(status: StatusCode, body: &str) -> RemoteError {
    let detail = serde_json::from_str::<WireErrorBody>(body)
        .ok()
        .and_then(|payload| payload.error)
        .and_then(|error| error.message)
        .unwrap_or_else(|| error_excerpt(body));
    let message = if detail.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", detail, status.as_u16())
    };

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => RemoteError::Authentication(message),
        StatusCode::TOO_MANY_REQUESTS | StatusCode::REQUEST_TIMEOUT => RemoteError::Network(message),
        status if status.is_server_error() => RemoteError::Network(message),
        _ => RemoteError::Validation(message),
    }
}

fn normalize_base_url(raw: String) -> Result<Url> {
    let value = non_empty_trimmed(Some(raw))
        .ok_or_else(|| Error::InvalidInput("API base URL must not be empty".to_string()))?;
    if !is_http_url(&value) {
        return Err(Error::InvalidInput(
            "API base URL must include http:// or https://".to_string(),
        ));
    }
    Url::parse(value.trim_end_matches('/'))
        .map_err(|error| Error::InvalidInput(format!("invalid API base URL: {error}")))
}
