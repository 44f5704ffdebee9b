//! The resource catalog collaborator.
//!
//! Rooms and tour departures are defined in a separate catalog service. This server only needs two
//! facts about a resource at reservation time: what one unit costs, and whether the resource is
//! accepting bookings at all. Nothing from the catalog is persisted here; the booking row carries
//! the priced amount and that is the end of the relationship.

use bkg_common::Money;
use log::*;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// What the catalog knows about a bookable resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceInfo {
    pub resource_id: String,
    /// Price of one unit: a room night for stays, a seat for departures.
    pub rate_per_unit: Money,
    pub under_maintenance: bool,
    /// Hard cap on participants, where the catalog defines one.
    #[serde(default)]
    pub max_participants: Option<i64>,
}

#[derive(Debug, Error)]
pub enum CatalogApiError {
    #[error("The catalog has no resource with id {0}.")]
    ResourceNotFound(String),
    #[error("Could not reach the catalog service. {0}")]
    Unreachable(String),
    #[error("The catalog sent a response we could not use. {0}")]
    InvalidResponse(String),
}

#[allow(async_fn_in_trait)]
pub trait CatalogApi {
    async fn resource_info(&self, resource_id: &str) -> Result<ResourceInfo, CatalogApiError>;
}

/// REST client for the catalog service.
#[derive(Clone)]
pub struct RestCatalogApi {
    base_url: String,
    client: Client,
}

impl RestCatalogApi {
    pub fn new(base_url: &str) -> Self {
        let base_url = base_url.trim_end_matches('/').to_string();
        Self { base_url, client: Client::new() }
    }
}

impl CatalogApi for RestCatalogApi {
    async fn resource_info(&self, resource_id: &str) -> Result<ResourceInfo, CatalogApiError> {
        let url = format!("{}/resources/{resource_id}", self.base_url);
        trace!("📇️ Fetching catalog record from {url}");
        let response = self.client.get(&url).send().await.map_err(|e| CatalogApiError::Unreachable(e.to_string()))?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(CatalogApiError::ResourceNotFound(resource_id.to_string()));
        }
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!("📇️ Catalog lookup for {resource_id} failed with {status}: {body}");
            return Err(CatalogApiError::InvalidResponse(format!("{status}: {body}")));
        }
        response.json::<ResourceInfo>().await.map_err(|e| CatalogApiError::InvalidResponse(e.to_string()))
    }
}
