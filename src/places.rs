use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tracing::{info, trace, warn};

use crate::categories::Category;
use crate::config::AppConfig;
use crate::errors::{AppError, AppResult};
use crate::icons::Icon;
use crate::quality::QualityColor;

const MAX_REVIEWS: usize = 5;
const HTTP_TIMEOUT_SECS: u64 = 15;
const SEARCH_FIELD_MASK: &str = "places.id,places.displayName";
const DETAILS_FIELD_MASK: &str =
    "id,displayName,location,formattedAddress,rating,userRatingCount,reviews,types";

/// One place as it moves through the pipeline.
///
/// The loader fills `name` and `address`; enrichment replaces the record with
/// provider data; categorization and icon assignment add the last three fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlaceRecord {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_ratings_count: Option<u64>,
    #[serde(default)]
    pub reviews: Vec<String>,
    #[serde(default)]
    pub types: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub place_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality_color: Option<QualityColor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<Icon>,
}

impl PlaceRecord {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_address(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            address: Some(address.into()),
            ..Self::named(name)
        }
    }

    /// Free-text query sent to the search endpoint.
    pub fn search_text(&self) -> String {
        match self.address.as_deref().map(str::trim) {
            Some(address) if !address.is_empty() => format!("{} {}", self.name, address),
            _ => self.name.clone(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct EnrichmentReport {
    pub enriched: Vec<PlaceRecord>,
    pub failed: Vec<PlaceRecord>,
}

#[async_trait]
pub trait PlaceLookup: Send + Sync {
    /// Resolves a loaded place to its enriched record, `None` when not found.
    async fn lookup_place(&self, place: &PlaceRecord) -> AppResult<Option<PlaceRecord>>;
}

#[derive(Clone)]
pub struct PlacesService {
    inner: Arc<dyn PlaceLookup>,
}

impl PlacesService {
    pub fn from_config(config: &AppConfig) -> AppResult<Self> {
        let key = config.google_maps_api_key.clone().ok_or_else(|| {
            AppError::Config("GOOGLE_MAPS_API_KEY is required for enrichment".into())
        })?;
        let client = HttpPlacesClient::new(
            key,
            &config.places_api_base,
            config.places_request_delay,
        )?;
        Ok(Self {
            inner: Arc::new(client),
        })
    }

    pub fn from_lookup(lookup: Arc<dyn PlaceLookup>) -> Self {
        Self { inner: lookup }
    }

    pub async fn lookup_place(&self, place: &PlaceRecord) -> AppResult<Option<PlaceRecord>> {
        self.inner.lookup_place(place).await
    }

    /// Looks up every place in order. Lookup errors count as not found.
    pub async fn enrich(&self, places: &[PlaceRecord]) -> EnrichmentReport {
        let mut report = EnrichmentReport::default();
        let total = places.len();
        for (index, place) in places.iter().enumerate() {
            info!(
                "enriching {}/{}: {}",
                index + 1,
                total,
                place.name
            );
            match self.lookup_place(place).await {
                Ok(Some(details)) => report.enriched.push(details),
                Ok(None) => {
                    warn!(name = %place.name, "no details found");
                    report.failed.push(place.clone());
                }
                Err(err) => {
                    warn!(?err, name = %place.name, "places lookup failed");
                    report.failed.push(place.clone());
                }
            }
        }
        report
    }
}

/// Google Places (New) client: text search for an id, then a details fetch.
pub struct HttpPlacesClient {
    http: reqwest::Client,
    api_key: SecretString,
    api_base: String,
    request_delay: Duration,
}

impl HttpPlacesClient {
    pub fn new(api_key: SecretString, api_base: &str, request_delay: Duration) -> AppResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            http,
            api_key,
            api_base: api_base.trim_end_matches('/').to_string(),
            request_delay,
        })
    }

    async fn search_place_id(&self, text: &str) -> AppResult<Option<String>> {
        #[derive(Serialize)]
        struct RequestBody<'a> {
            #[serde(rename = "textQuery")]
            text_query: &'a str,
        }

        #[derive(Deserialize)]
        struct Response {
            places: Option<Vec<ResponsePlace>>,
        }

        #[derive(Deserialize)]
        struct ResponsePlace {
            id: Option<String>,
            name: Option<String>,
        }

        let response = self
            .http
            .post(format!("{}/places:searchText", self.api_base))
            .header("X-Goog-Api-Key", self.api_key.expose_secret())
            .header("X-Goog-FieldMask", SEARCH_FIELD_MASK)
            .json(&RequestBody { text_query: text })
            .send()
            .await?
            .error_for_status()?;

        let parsed: Response = response.json().await?;
        let Some(place) = parsed.places.and_then(|list| list.into_iter().next()) else {
            warn!(query = text, "no search results");
            return Ok(None);
        };

        if let Some(id) = place.id.filter(|id| !id.is_empty()) {
            return Ok(Some(resource_name(&id)));
        }
        Ok(place.name.filter(|name| name.starts_with("places/")))
    }

    async fn place_details(&self, resource: &str) -> AppResult<DetailsResponse> {
        let response = self
            .http
            .get(format!("{}/{}", self.api_base, resource_name(resource)))
            .header("X-Goog-Api-Key", self.api_key.expose_secret())
            .header("X-Goog-FieldMask", DETAILS_FIELD_MASK)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }
}

#[async_trait]
impl PlaceLookup for HttpPlacesClient {
    async fn lookup_place(&self, place: &PlaceRecord) -> AppResult<Option<PlaceRecord>> {
        let query = place.search_text();
        let Some(resource) = self.search_place_id(&query).await? else {
            return Ok(None);
        };
        sleep(self.request_delay).await;
        let details = self.place_details(&resource).await?;
        trace!(resource = %resource, "place details fetched");
        Ok(Some(details.into_record(place)))
    }
}

fn resource_name(id: &str) -> String {
    if id.starts_with("places/") {
        id.to_string()
    } else {
        format!("places/{id}")
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DetailsResponse {
    id: Option<String>,
    display_name: Option<TextValue>,
    location: Option<DetailsLocation>,
    formatted_address: Option<TextValue>,
    rating: Option<f64>,
    user_rating_count: Option<u64>,
    reviews: Option<Vec<DetailsReview>>,
    types: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct DetailsLocation {
    latitude: Option<f64>,
    longitude: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DetailsReview {
    text: Option<TextValue>,
    original_text: Option<TextValue>,
}

/// Places fields arrive either as plain strings or as `{ "text": ... }`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TextValue {
    Plain(String),
    Localized { text: Option<String> },
}

impl TextValue {
    fn into_text(self) -> Option<String> {
        match self {
            TextValue::Plain(text) => Some(text),
            TextValue::Localized { text } => text,
        }
    }
}

impl DetailsResponse {
    fn into_record(self, query: &PlaceRecord) -> PlaceRecord {
        let name = self
            .display_name
            .and_then(TextValue::into_text)
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| query.name.clone());

        let reviews = self
            .reviews
            .unwrap_or_default()
            .into_iter()
            .take(MAX_REVIEWS)
            .filter_map(|review| {
                review
                    .text
                    .and_then(TextValue::into_text)
                    .filter(|text| !text.is_empty())
                    .or_else(|| review.original_text.and_then(TextValue::into_text))
            })
            .filter(|text| !text.is_empty())
            .collect();

        let (latitude, longitude) = self
            .location
            .map(|loc| (loc.latitude, loc.longitude))
            .unwrap_or((None, None));

        PlaceRecord {
            name,
            address: self.formatted_address.and_then(TextValue::into_text),
            latitude,
            longitude,
            rating: self.rating,
            user_ratings_count: self.user_rating_count,
            reviews,
            types: self.types.unwrap_or_default(),
            place_id: self.id,
            ..PlaceRecord::default()
        }
    }
}
