//! PostgREST client for the hosted backend.

use color_eyre::{eyre::eyre, Result};
use futures::future::{BoxFuture, FutureExt};
use reqwest::{Method, RequestBuilder, Response};
use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

use crate::config::Config;

use super::query::{Column, Select};
use super::{Row, Store, StoreError, Table};

/// PostgreSQL unique-violation code, surfaced by PostgREST in the error body.
const UNIQUE_VIOLATION: &str = "23505";

/// Error body returned by PostgREST on failure.
#[derive(Debug, Deserialize)]
struct ApiError {
  #[serde(default)]
  code: Option<String>,
  #[serde(default)]
  message: String,
  #[serde(default)]
  details: Option<String>,
}

/// Store backed by a PostgREST endpoint (`<url>/rest/v1/<table>`).
#[derive(Clone)]
pub struct PostgrestStore {
  http: reqwest::Client,
  base: Url,
  api_key: String,
}

impl PostgrestStore {
  pub fn new(config: &Config) -> Result<Self> {
    let api_key = Config::get_api_key()?;
    Self::with_key(&config.store.url, api_key)
  }

  pub fn with_key(url: &str, api_key: String) -> Result<Self> {
    let mut base = Url::parse(url).map_err(|e| eyre!("Invalid store url {}: {}", url, e))?;
    if base.cannot_be_a_base() {
      return Err(eyre!("Invalid store url {}: not a base url", url));
    }
    if !base.path().ends_with('/') {
      let path = format!("{}/", base.path());
      base.set_path(&path);
    }
    let base = base
      .join("rest/v1/")
      .map_err(|e| eyre!("Invalid store url {}: {}", url, e))?;

    let http = reqwest::Client::builder()
      .build()
      .map_err(|e| eyre!("Failed to create http client: {}", e))?;

    Ok(Self {
      http,
      base,
      api_key,
    })
  }

  fn table_url(&self, table: Table) -> Url {
    let mut url = self.base.clone();
    if let Ok(mut segments) = url.path_segments_mut() {
      segments.pop_if_empty().push(table.name());
    }
    url
  }

  /// Full request url for a select.
  pub fn select_url(&self, query: &Select) -> Url {
    let mut url = self.table_url(query.table);
    {
      let mut pairs = url.query_pairs_mut();
      pairs.append_pair("select", &Column::render_list(&query.columns));
      for filter in &query.filters {
        pairs.append_pair(filter.column, &filter.render_condition());
      }
      if let Some(order) = query.order {
        let direction = if order.ascending { "asc" } else { "desc" };
        pairs.append_pair("order", &format!("{}.{}", order.column, direction));
      }
    }
    url
  }

  fn row_url(&self, table: Table, id: &str) -> Url {
    let mut url = self.table_url(table);
    url.query_pairs_mut().append_pair("id", &format!("eq.{}", id));
    url
  }

  fn request(&self, method: Method, url: Url) -> RequestBuilder {
    self
      .http
      .request(method, url)
      .header("apikey", &self.api_key)
      .bearer_auth(&self.api_key)
  }

  async fn send(&self, request: RequestBuilder) -> Result<Response, StoreError> {
    let response = request.send().await?;
    let status = response.status();
    if status.is_success() {
      return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let err = status_error(status.as_u16(), &body);
    warn!(status = status.as_u16(), error = %err, "store request failed");
    Err(err)
  }

  async fn rows(response: Response) -> Result<Vec<Row>, StoreError> {
    let bytes = response.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
  }
}

/// Map a non-success PostgREST response to a store error.
fn status_error(status: u16, body: &str) -> StoreError {
  match serde_json::from_str::<ApiError>(body) {
    Ok(api) if api.code.as_deref() == Some(UNIQUE_VIOLATION) => StoreError::Conflict(api.message),
    Ok(api) => {
      let message = match api.details {
        Some(details) if !details.is_empty() => format!("{} ({})", api.message, details),
        _ => api.message,
      };
      StoreError::Status { status, message }
    }
    Err(_) => StoreError::Status {
      status,
      message: body.trim().to_string(),
    },
  }
}

impl Store for PostgrestStore {
  fn select(&self, query: Select) -> BoxFuture<'_, Result<Vec<Row>, StoreError>> {
    async move {
      let url = self.select_url(&query);
      debug!(table = query.table.name(), %url, "select");
      let response = self.send(self.request(Method::GET, url)).await?;
      Self::rows(response).await
    }
    .boxed()
  }

  fn insert(&self, table: Table, rows: Vec<Row>) -> BoxFuture<'_, Result<Vec<Row>, StoreError>> {
    async move {
      debug!(table = table.name(), count = rows.len(), "insert");
      let request = self
        .request(Method::POST, self.table_url(table))
        .header("Prefer", "return=representation")
        .json(&rows);
      let response = self.send(request).await?;
      Self::rows(response).await
    }
    .boxed()
  }

  fn update<'a>(
    &'a self,
    table: Table,
    id: &'a str,
    patch: Row,
  ) -> BoxFuture<'a, Result<Row, StoreError>> {
    async move {
      debug!(table = table.name(), id, "update");
      let request = self
        .request(Method::PATCH, self.row_url(table, id))
        .header("Prefer", "return=representation")
        .json(&patch);
      let response = self.send(request).await?;
      Self::rows(response)
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| StoreError::NotFound {
          table: table.name(),
          id: id.to_string(),
        })
    }
    .boxed()
  }

  fn delete<'a>(&'a self, table: Table, id: &'a str) -> BoxFuture<'a, Result<(), StoreError>> {
    async move {
      debug!(table = table.name(), id, "delete");
      self
        .send(self.request(Method::DELETE, self.row_url(table, id)))
        .await?;
      Ok(())
    }
    .boxed()
  }
}
