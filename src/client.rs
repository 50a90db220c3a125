//! Client-side access to sales data and country geometry.

use crate::error::FetchError;
use crate::store::SalesStore;
use crate::types::SalesRecord;
use geojson::{FeatureCollection, GeoJson};
use serde::de::DeserializeOwned;
use std::future::Future;
use std::path::PathBuf;
use tracing::debug;

/// The two read operations of the sales API.
pub trait SalesApi {
    fn list_years(&self) -> impl Future<Output = Result<Vec<i32>, FetchError>> + Send;

    fn list_sales(
        &self,
        year: i32,
    ) -> impl Future<Output = Result<Vec<SalesRecord>, FetchError>> + Send;
}

/// Talks to a running `serve` instance.
#[derive(Debug, Clone)]
pub struct HttpSalesApi {
    base_url: String,
    client: reqwest::Client,
}

impl HttpSalesApi {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, reqwest::Client::new())
    }

    pub fn with_client(base_url: impl Into<String>, client: reqwest::Client) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { base_url, client }
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, FetchError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(%url, "fetching");
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|source| FetchError::Http {
                url: url.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status { url, status });
        }

        response
            .json::<T>()
            .await
            .map_err(|source| FetchError::Http { url, source })
    }
}

impl SalesApi for HttpSalesApi {
    async fn list_years(&self) -> Result<Vec<i32>, FetchError> {
        self.get_json("/years").await
    }

    async fn list_sales(&self, year: i32) -> Result<Vec<SalesRecord>, FetchError> {
        self.get_json(&format!("/sales/{}", year)).await
    }
}

/// Reads the store in-process, bypassing HTTP.
impl SalesApi for SalesStore {
    async fn list_years(&self) -> Result<Vec<i32>, FetchError> {
        Ok(SalesStore::list_years(self).await?)
    }

    async fn list_sales(&self, year: i32) -> Result<Vec<SalesRecord>, FetchError> {
        Ok(SalesStore::list_sales(self, year).await?)
    }
}

/// Where the country boundaries come from.
pub trait GeometrySource {
    fn load(&self) -> impl Future<Output = Result<FeatureCollection, FetchError>> + Send;
}

#[derive(Debug, Clone)]
pub enum GeometryLocation {
    File(PathBuf),
    Url(String),
}

impl GeometryLocation {
    /// http(s) locations are fetched, anything else is read from disk.
    pub fn parse(location: &str) -> Self {
        if location.starts_with("http://") || location.starts_with("https://") {
            GeometryLocation::Url(location.to_string())
        } else {
            GeometryLocation::File(PathBuf::from(location))
        }
    }

    fn origin(&self) -> String {
        match self {
            GeometryLocation::File(path) => path.display().to_string(),
            GeometryLocation::Url(url) => url.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GeoJsonSource {
    location: GeometryLocation,
    client: reqwest::Client,
}

impl GeoJsonSource {
    pub fn new(location: GeometryLocation) -> Self {
        Self {
            location,
            client: reqwest::Client::new(),
        }
    }

    async fn read_text(&self) -> Result<String, FetchError> {
        match &self.location {
            GeometryLocation::File(path) => {
                tokio::fs::read_to_string(path)
                    .await
                    .map_err(|source| FetchError::Io {
                        path: path.clone(),
                        source,
                    })
            }
            GeometryLocation::Url(url) => {
                let response = self
                    .client
                    .get(url)
                    .send()
                    .await
                    .map_err(|source| FetchError::Http {
                        url: url.clone(),
                        source,
                    })?;
                let status = response.status();
                if !status.is_success() {
                    return Err(FetchError::Status {
                        url: url.clone(),
                        status,
                    });
                }
                response.text().await.map_err(|source| FetchError::Http {
                    url: url.clone(),
                    source,
                })
            }
        }
    }
}

impl GeometrySource for GeoJsonSource {
    async fn load(&self) -> Result<FeatureCollection, FetchError> {
        let text = self.read_text().await?;
        parse_feature_collection(&text, &self.location.origin())
    }
}

pub fn parse_feature_collection(text: &str, origin: &str) -> Result<FeatureCollection, FetchError> {
    let geojson = text
        .parse::<GeoJson>()
        .map_err(|source| FetchError::GeoJson {
            origin: origin.to_string(),
            source,
        })?;
    match geojson {
        GeoJson::FeatureCollection(fc) => Ok(fc),
        _ => Err(FetchError::NotFeatureCollection(origin.to_string())),
    }
}
