// src/stores/companies.rs

use std::sync::{Arc, Mutex};

use serde::Deserialize;
use uuid::Uuid;

use crate::common::error::ApiError;
use crate::models::company::{Company, CreateCompanyPayload, UpdateCompanyPayload};
use crate::remote::ApiClient;
use crate::stores::EntityCache;

#[derive(Debug, Deserialize)]
struct CompanyListResponse {
    companies: Vec<Company>,
}

// Gestão de empresas, tela exclusiva do super admin.
#[derive(Clone)]
pub struct CompanyStore {
    api: ApiClient,
    cache: Arc<Mutex<EntityCache<Company>>>,
}

impl CompanyStore {
    pub fn new(api: ApiClient) -> Self {
        Self {
            api,
            cache: Arc::new(Mutex::new(EntityCache::new())),
        }
    }

    pub fn companies(&self) -> Vec<Company> {
        self.cache.lock().unwrap().list()
    }

    pub fn current_company(&self) -> Option<Company> {
        self.cache.lock().unwrap().current()
    }

    pub async fn fetch_companies(&self) -> Result<Vec<Company>, ApiError> {
        let response: CompanyListResponse = self.api.get("/companies").await?;
        self.cache
            .lock()
            .unwrap()
            .replace_all(response.companies.clone());
        Ok(response.companies)
    }

    pub async fn fetch_company_by_id(&self, id: Uuid) -> Result<Company, ApiError> {
        let company: Company = self.api.get(&format!("/companies/{}", id)).await?;
        self.cache.lock().unwrap().set_current(company.clone());
        Ok(company)
    }

    pub async fn create(&self, payload: &CreateCompanyPayload) -> Result<Company, ApiError> {
        let created: Company = self.api.post("/companies", payload).await?;
        self.cache.lock().unwrap().upsert(created.clone());
        tracing::info!("Empresa {} criada", created.id);
        Ok(created)
    }

    pub async fn update(
        &self,
        id: Uuid,
        payload: &UpdateCompanyPayload,
    ) -> Result<Company, ApiError> {
        let updated: Company = self.api.patch(&format!("/companies/{}", id), payload).await?;
        self.cache.lock().unwrap().upsert(updated.clone());
        Ok(updated)
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), ApiError> {
        self.api.delete(&format!("/companies/{}", id)).await?;
        self.cache.lock().unwrap().remove(id);
        Ok(())
    }
}
