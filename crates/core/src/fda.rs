use crate::config::{non_blank, ServiceConfig};
use crate::models::{scalar_text, text_list};
use crate::traits::DrugDatabase;
use crate::{AnalysisError, MedicineRecord, RecordSource};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Label,
    Ndc,
    DrugsFda,
}

impl Endpoint {
    pub const ALL: [Endpoint; 3] = [Endpoint::Label, Endpoint::Ndc, Endpoint::DrugsFda];

    pub fn resource(&self) -> &'static str {
        match self {
            Self::Label => "label.json",
            Self::Ndc => "ndc.json",
            Self::DrugsFda => "drugsfda.json",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SearchField {
    BrandName,
    GenericName,
    SubstanceName,
}

impl SearchField {
    pub const ALL: [SearchField; 3] = [
        SearchField::BrandName,
        SearchField::GenericName,
        SearchField::SubstanceName,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            Self::BrandName => "openfda.brand_name",
            Self::GenericName => "openfda.generic_name",
            Self::SubstanceName => "openfda.substance_name",
        }
    }
}

/// One (endpoint, field, term) probe against openFDA.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FdaQuery {
    pub endpoint: Endpoint,
    pub field: SearchField,
    /// Already cleaned; never empty.
    pub term: String,
}

impl FdaQuery {
    pub fn search_expression(&self) -> String {
        format!("{}:\"{}\"", self.field.key(), self.term)
    }

    pub fn url(&self, base: &str, api_key: Option<&str>) -> Result<url::Url, url::ParseError> {
        let resource = format!("{}/{}", base.trim_end_matches('/'), self.endpoint.resource());
        let search = self.search_expression();
        let mut params = vec![("search", search.as_str()), ("limit", "1")];
        if let Some(key) = api_key {
            params.push(("api_key", key));
        }
        url::Url::parse_with_params(&resource, &params)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AttemptOutcome {
    Hit(Value),
    Miss,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum LookupOutcome {
    Found {
        record: MedicineRecord,
        query: FdaQuery,
        attempts: usize,
    },
    NotFound {
        attempts: usize,
    },
}

impl LookupOutcome {
    pub fn attempts(&self) -> usize {
        match self {
            Self::Found { attempts, .. } | Self::NotFound { attempts } => *attempts,
        }
    }
}

/// Keeps ASCII letters, digits and whitespace.
pub fn clean_term(term: &str) -> String {
    term.chars()
        .filter(|ch| ch.is_ascii_alphanumeric() || ch.is_whitespace())
        .collect::<String>()
        .trim()
        .to_string()
}

/// Lazily yields every probe in priority order: endpoint, then field, then term.
pub fn candidate_queries(terms: &[String]) -> impl Iterator<Item = FdaQuery> + '_ {
    Endpoint::ALL.into_iter().flat_map(move |endpoint| {
        SearchField::ALL.into_iter().flat_map(move |field| {
            terms.iter().filter_map(move |term| {
                let cleaned = clean_term(term);
                if cleaned.is_empty() {
                    None
                } else {
                    Some(FdaQuery {
                        endpoint,
                        field,
                        term: cleaned,
                    })
                }
            })
        })
    })
}

/// Probes the database one query at a time; the first hit wins.
pub async fn lookup<D>(database: &D, terms: &[String]) -> LookupOutcome
where
    D: DrugDatabase + ?Sized,
{
    let mut attempts = 0usize;

    for query in candidate_queries(terms) {
        attempts += 1;
        debug!(
            endpoint = query.endpoint.resource(),
            field = query.field.key(),
            term = %query.term,
            attempt = attempts,
            "fda lookup attempt"
        );

        match database.attempt(&query).await {
            AttemptOutcome::Hit(raw) => {
                info!(
                    endpoint = query.endpoint.resource(),
                    field = query.field.key(),
                    term = %query.term,
                    attempts,
                    "fda match found"
                );
                return LookupOutcome::Found {
                    record: format_fda_record(&raw),
                    query,
                    attempts,
                };
            }
            AttemptOutcome::Miss => {}
            AttemptOutcome::Failed(reason) => {
                warn!(term = %query.term, %reason, "FDA search failed");
            }
        }
    }

    LookupOutcome::NotFound { attempts }
}

/// Maps a raw openFDA result into a record tagged `fda`.
pub fn format_fda_record(raw: &Value) -> MedicineRecord {
    let openfda = raw.get("openfda").unwrap_or(&Value::Null);
    let first_of = |key: &str| openfda.get(key).and_then(first_or_scalar);

    MedicineRecord {
        brand_name: first_of("brand_name"),
        generic_name: first_of("generic_name"),
        manufacturer: first_of("manufacturer_name"),
        purpose: raw.get("purpose").and_then(first_or_scalar),
        dosage: raw.get("dosage_and_administration").and_then(first_or_scalar),
        form: first_of("product_type"),
        active_ingredients: openfda
            .get("substance_name")
            .map(text_list)
            .unwrap_or_default(),
        warnings: raw.get("warnings").map(text_list).unwrap_or_default(),
        source: RecordSource::Fda,
    }
}

fn first_or_scalar(value: &Value) -> Option<String> {
    match value {
        Value::Array(items) => items.first().and_then(scalar_text),
        other => scalar_text(other),
    }
}

/// Lookup client for the public openFDA drug endpoints.
pub struct OpenFdaClient {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
}

impl OpenFdaClient {
    pub fn new(config: &ServiceConfig) -> Result<Self, AnalysisError> {
        Ok(Self {
            client: config.http_client()?,
            endpoint: config.openfda_endpoint.clone(),
            api_key: non_blank(config.openfda_api_key.clone()),
        })
    }

    async fn fetch(&self, query: &FdaQuery) -> Result<Option<Value>, String> {
        let url = query
            .url(&self.endpoint, self.api_key.as_deref())
            .map_err(|error| error.to_string())?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|error| error.to_string())?;

        // openFDA answers 404 when the search matched nothing.
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(format!("openFDA returned {}", response.status()));
        }

        let parsed: Value = response.json().await.map_err(|error| error.to_string())?;
        Ok(parsed.pointer("/results/0").cloned())
    }
}

#[async_trait]
impl DrugDatabase for OpenFdaClient {
    async fn attempt(&self, query: &FdaQuery) -> AttemptOutcome {
        match self.fetch(query).await {
            Ok(Some(raw)) => AttemptOutcome::Hit(raw),
            Ok(None) => AttemptOutcome::Miss,
            Err(reason) => AttemptOutcome::Failed(reason),
        }
    }
}
