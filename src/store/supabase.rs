//! Supabase (PostgREST) implementation of the record store

use super::{
    BookingRecord, BookingStore, Filter, NewBooking, RecordId, RecordPatch, RecordQuery,
    StoreError,
};
use super::types::Column;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Bookings table exposed through the Supabase REST API
#[derive(Clone)]
pub struct SupabaseStore {
    client: Client,
    endpoint: String,
    api_key: String,
}

impl SupabaseStore {
    pub fn new(project_url: &str, api_key: &str, table: &str) -> Result<Self, StoreError> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            endpoint: format!("{}/rest/v1/{table}", project_url.trim_end_matches('/')),
            api_key: api_key.to_string(),
        })
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    async fn checked(response: Response) -> Result<Response, StoreError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(StoreError::Status {
            status: status.as_u16(),
            body,
        })
    }

    async fn rows<T: DeserializeOwned>(response: Response) -> Result<Vec<T>, StoreError> {
        let body = Self::checked(response).await?.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}

/// Query-string pairs in PostgREST's filter syntax
fn query_params(query: &RecordQuery) -> Vec<(String, String)> {
    let mut params: Vec<(String, String)> = query
        .filters
        .iter()
        .map(|filter| match filter {
            Filter::Eq(column, value) => (column.as_str().to_string(), format!("eq.{value}")),
            Filter::In(column, values) => {
                let quoted: Vec<String> = values
                    .iter()
                    .map(|v| format!("\"{}\"", v.replace('"', "\\\"")))
                    .collect();
                (
                    column.as_str().to_string(),
                    format!("in.({})", quoted.join(",")),
                )
            }
            Filter::IsNull(column) => (column.as_str().to_string(), "is.null".to_string()),
            Filter::NotNull(column) => (column.as_str().to_string(), "not.is.null".to_string()),
        })
        .collect();

    if !query.order.is_empty() {
        let order: Vec<String> = query
            .order
            .iter()
            .map(|o| {
                let direction = if o.descending { "desc" } else { "asc" };
                format!("{}.{direction}", o.column.as_str())
            })
            .collect();
        params.push(("order".to_string(), order.join(",")));
    }
    if let Some(limit) = query.limit {
        params.push(("limit".to_string(), limit.to_string()));
    }
    params
}

fn id_filter(id: &RecordId) -> [(&'static str, String); 1] {
    [(Column::Id.as_str(), format!("eq.{id}"))]
}

/// Total from a `Content-Range` header such as `0-24/311` or `*/0`
fn parse_content_range_total(value: &str) -> Option<u64> {
    value.rsplit_once('/')?.1.trim().parse().ok()
}

#[async_trait]
impl BookingStore for SupabaseStore {
    async fn insert(&self, booking: &NewBooking) -> Result<BookingRecord, StoreError> {
        let response = self
            .authorized(self.client.post(&self.endpoint))
            .header("Prefer", "return=representation")
            .json(booking)
            .send()
            .await?;
        Self::rows(response)
            .await?
            .into_iter()
            .next()
            .ok_or(StoreError::EmptyInsert)
    }

    async fn query(&self, query: &RecordQuery) -> Result<Vec<BookingRecord>, StoreError> {
        let response = self
            .authorized(self.client.get(&self.endpoint))
            .query(&[("select", "*")])
            .query(&query_params(query))
            .send()
            .await?;
        Self::rows(response).await
    }

    async fn update(
        &self,
        id: &RecordId,
        patch: &RecordPatch,
    ) -> Result<Option<BookingRecord>, StoreError> {
        let response = self
            .authorized(self.client.patch(&self.endpoint))
            .header("Prefer", "return=representation")
            .query(&id_filter(id))
            .json(&patch.to_json())
            .send()
            .await?;
        Ok(Self::rows(response).await?.into_iter().next())
    }

    async fn delete(&self, id: &RecordId) -> Result<bool, StoreError> {
        let response = self
            .authorized(self.client.delete(&self.endpoint))
            .header("Prefer", "return=representation")
            .query(&id_filter(id))
            .send()
            .await?;
        let removed: Vec<serde_json::Value> = Self::rows(response).await?;
        Ok(!removed.is_empty())
    }

    async fn count(&self, query: &RecordQuery) -> Result<u64, StoreError> {
        let filters_only = RecordQuery {
            filters: query.filters.clone(),
            ..RecordQuery::default()
        };
        let response = self
            .authorized(self.client.head(&self.endpoint))
            .header("Prefer", "count=exact")
            .query(&[("select", "id")])
            .query(&query_params(&filters_only))
            .send()
            .await?;
        let response = Self::checked(response).await?;
        response
            .headers()
            .get("content-range")
            .and_then(|v| v.to_str().ok())
            .and_then(parse_content_range_total)
            .ok_or_else(|| StoreError::Decode("missing or malformed content-range".into()))
    }
}
