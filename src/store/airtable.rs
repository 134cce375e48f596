// src/store/airtable.rs
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::record::Fields;
use super::{Direction, Filter, Query, RemoteTable, StoredRecord};

const API_BASE: &str = "https://api.airtable.com/v0/";
const PAGE_SIZE: usize = 100;

/// Airtable REST table (`/v0/{base}/{table}`), bearer-token auth.
#[derive(Clone)]
pub struct AirtableTable {
    client: Client,
    endpoint: Url,
    api_key: String,
    table_name: String,
    timeout: Duration,
}

impl AirtableTable {
    pub fn new(api_key: &str, base_id: &str, table_name: &str) -> Result<Self> {
        if api_key.trim().is_empty() || base_id.trim().is_empty() {
            bail!("Airtable API key and base ID are required");
        }
        let mut endpoint = Url::parse(API_BASE).context("airtable base url")?;
        endpoint
            .path_segments_mut()
            .map_err(|_| anyhow!("airtable url cannot be a base"))?
            .pop_if_empty()
            .push(base_id)
            .push(table_name);

        Ok(Self {
            client: Client::new(),
            endpoint,
            api_key: api_key.to_string(),
            table_name: table_name.to_string(),
            timeout: Duration::from_secs(30),
        })
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    async fn list_page(&self, params: &[(String, String)]) -> Result<ListResponse> {
        let rsp = self
            .client
            .get(self.endpoint.clone())
            .bearer_auth(&self.api_key)
            .timeout(self.timeout)
            .query(params)
            .send()
            .await
            .context("airtable list request")?;
        let rsp = rsp.error_for_status().context("airtable list status")?;
        rsp.json::<ListResponse>()
            .await
            .context("airtable list body")
    }

    /// Follow `offset` pagination until exhausted or `max_records` reached.
    async fn list_all(
        &self,
        mut params: Vec<(String, String)>,
        max_records: Option<usize>,
    ) -> Result<Vec<StoredRecord>> {
        params.push(("pageSize".into(), PAGE_SIZE.to_string()));
        if let Some(max) = max_records {
            params.push(("maxRecords".into(), max.to_string()));
        }

        let mut out = Vec::new();
        let mut offset: Option<String> = None;
        loop {
            let mut page_params = params.clone();
            if let Some(o) = &offset {
                page_params.push(("offset".into(), o.clone()));
            }
            let page = self.list_page(&page_params).await?;
            out.extend(page.records.into_iter().map(|r| StoredRecord {
                id: r.id,
                fields: r.fields,
            }));

            let reached_max = max_records.is_some_and(|m| out.len() >= m);
            match page.offset {
                Some(next) if !reached_max => offset = Some(next),
                _ => break,
            }
        }
        if let Some(max) = max_records {
            out.truncate(max);
        }
        Ok(out)
    }
}

/// Quote a string for an Airtable formula.
fn formula_literal(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "\\'"))
}

pub(crate) fn filter_formula(filter: &Filter) -> String {
    match filter {
        Filter::OnOrAfter { field, date } => format!(
            "NOT(IS_BEFORE({{{}}}, {}))",
            field,
            formula_literal(&date.format("%Y-%m-%d").to_string())
        ),
    }
}

pub(crate) fn query_params(query: &Query) -> Vec<(String, String)> {
    let mut params = Vec::new();
    if let Some(f) = &query.filter {
        params.push(("filterByFormula".into(), filter_formula(f)));
    }
    if let Some(s) = &query.sort {
        params.push(("sort[0][field]".into(), s.field.clone()));
        let dir = match s.direction {
            Direction::Asc => "asc",
            Direction::Desc => "desc",
        };
        params.push(("sort[0][direction]".into(), dir.into()));
    }
    if let Some(cols) = &query.fields {
        for c in cols {
            params.push(("fields[]".into(), c.clone()));
        }
    }
    params
}

#[derive(Serialize)]
struct CreateRequest<'a> {
    fields: &'a Fields,
    typecast: bool,
}

#[derive(Deserialize)]
struct CreateResponse {
    id: String,
}

#[derive(Deserialize)]
struct ListResponse {
    #[serde(default)]
    records: Vec<ApiRecord>,
    #[serde(default)]
    offset: Option<String>,
}

#[derive(Deserialize)]
struct ApiRecord {
    id: String,
    #[serde(default)]
    fields: Fields,
}

#[async_trait]
impl RemoteTable for AirtableTable {
    async fn insert(&self, fields: Fields) -> Result<String> {
        let rsp = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(&self.api_key)
            .timeout(self.timeout)
            .json(&CreateRequest {
                fields: &fields,
                typecast: true,
            })
            .send()
            .await
            .context("airtable insert request")?;

        let status = rsp.status();
        if !status.is_success() {
            let body = rsp.text().await.unwrap_or_default();
            return Err(anyhow!("airtable insert HTTP {status}: {body}"));
        }
        let created: CreateResponse = rsp.json().await.context("airtable insert body")?;
        Ok(created.id)
    }

    async fn find_by_field(&self, field: &str, value: &str) -> Result<Vec<StoredRecord>> {
        let formula = format!("{{{}}} = {}", field, formula_literal(value));
        self.list_all(vec![("filterByFormula".into(), formula)], None)
            .await
    }

    async fn query(&self, query: Query) -> Result<Vec<StoredRecord>> {
        let params = query_params(&query);
        self.list_all(params, query.max_records).await
    }

    fn name(&self) -> &str {
        "airtable"
    }
}
