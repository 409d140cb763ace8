//! Buildings API (/api/v1/buildings)

use serde::{Deserialize, Serialize};

use super::common::CreateResponse;
use super::error::ApiError;
use crate::api::Client;

pub const BUILDINGS_PATH: &str = "/api/v1/buildings";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Building {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub street_address1: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub street_address2: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_province: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zip_postal_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
}

pub struct BuildingsApi<'a> {
    client: &'a Client,
}

impl<'a> BuildingsApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    pub async fn get(&self, id: &str) -> Result<Building, ApiError> {
        self.client.get(&format!("{}/{}", BUILDINGS_PATH, id)).await
    }

    pub async fn create(&self, building: &Building) -> Result<CreateResponse, ApiError> {
        self.client.post(BUILDINGS_PATH, building).await
    }

    pub async fn update(&self, id: &str, building: &Building) -> Result<Building, ApiError> {
        self.client
            .put(&format!("{}/{}", BUILDINGS_PATH, id), building)
            .await
    }

    pub async fn delete(&self, id: &str) -> Result<(), ApiError> {
        self.client.delete(&format!("{}/{}", BUILDINGS_PATH, id)).await
    }
}
