// src/stores/buildings.rs

use std::sync::{Arc, Mutex};

use serde::Deserialize;
use uuid::Uuid;

use crate::common::error::ApiError;
use crate::models::building::{Building, CreateBuildingPayload, UpdateBuildingPayload};
use crate::remote::ApiClient;
use crate::stores::EntityCache;

#[derive(Debug, Deserialize)]
struct BuildingListResponse {
    buildings: Vec<Building>,
}

// CRUD simples de edifícios: busca-e-cacheia, sem máquina de estados.
#[derive(Clone)]
pub struct BuildingStore {
    api: ApiClient,
    cache: Arc<Mutex<EntityCache<Building>>>,
}

impl BuildingStore {
    pub fn new(api: ApiClient) -> Self {
        Self {
            api,
            cache: Arc::new(Mutex::new(EntityCache::new())),
        }
    }

    pub fn buildings(&self) -> Vec<Building> {
        self.cache.lock().unwrap().list()
    }

    pub fn current_building(&self) -> Option<Building> {
        self.cache.lock().unwrap().current()
    }

    pub fn active_buildings(&self) -> Vec<Building> {
        self.buildings()
            .into_iter()
            .filter(|building| building.is_active)
            .collect()
    }

    pub async fn fetch_buildings(&self, company_id: Option<Uuid>) -> Result<Vec<Building>, ApiError> {
        let query = company_id
            .map(|id| vec![("companyId".to_owned(), id.to_string())])
            .unwrap_or_default();
        let response: BuildingListResponse = self.api.get_with("/buildings", query).await?;
        self.cache.lock().unwrap().replace_all(response.buildings.clone());
        Ok(response.buildings)
    }

    pub async fn fetch_building_by_id(&self, id: Uuid) -> Result<Building, ApiError> {
        let building: Building = self.api.get(&format!("/buildings/{}", id)).await?;
        self.cache.lock().unwrap().set_current(building.clone());
        Ok(building)
    }

    pub async fn create(&self, payload: &CreateBuildingPayload) -> Result<Building, ApiError> {
        let created: Building = self.api.post("/buildings", payload).await?;
        self.cache.lock().unwrap().upsert(created.clone());
        tracing::info!("Edifício {} criado", created.id);
        Ok(created)
    }

    pub async fn update(
        &self,
        id: Uuid,
        payload: &UpdateBuildingPayload,
    ) -> Result<Building, ApiError> {
        let updated: Building = self.api.patch(&format!("/buildings/{}", id), payload).await?;
        self.cache.lock().unwrap().upsert(updated.clone());
        Ok(updated)
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), ApiError> {
        self.api.delete(&format!("/buildings/{}", id)).await?;
        self.cache.lock().unwrap().remove(id);
        Ok(())
    }
}
