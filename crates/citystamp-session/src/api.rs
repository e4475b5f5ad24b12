//! Backend seam: the operations the session needs from the collector API.

use std::collections::HashSet;

use async_trait::async_trait;
use citystamp_client::{ApiClient, ApiError};
use citystamp_core::Zone;

/// The backend operations the capture session depends on.
///
/// Implemented by [`ApiClient`] for production; tests substitute mocks.
#[async_trait]
pub trait VisitApi {
    async fn fetch_zones(&self) -> Result<Vec<Zone>, ApiError>;
    async fn fetch_my_visits(&self) -> Result<HashSet<String>, ApiError>;
    async fn create_visit(&self, poi_id: &str, image_data_url: &str) -> Result<String, ApiError>;
}

#[async_trait]
impl VisitApi for ApiClient {
    async fn fetch_zones(&self) -> Result<Vec<Zone>, ApiError> {
        ApiClient::fetch_zones(self).await
    }

    async fn fetch_my_visits(&self) -> Result<HashSet<String>, ApiError> {
        ApiClient::fetch_my_visits(self).await
    }

    async fn create_visit(&self, poi_id: &str, image_data_url: &str) -> Result<String, ApiError> {
        ApiClient::create_visit(self, poi_id, image_data_url).await
    }
}
