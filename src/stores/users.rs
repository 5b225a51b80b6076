// src/stores/users.rs

use std::sync::{Arc, Mutex};

use uuid::Uuid;

use crate::common::error::ApiError;
use crate::models::auth::{RegisterPayload, UpdateUserPayload, User};
use crate::remote::ApiClient;
use crate::stores::EntityCache;

// Administração de usuários. A criação passa pelo registro de autenticação
// e depois recarrega a lista, porque o endpoint de registro devolve o usuário
// sem os campos administrativos.
#[derive(Clone)]
pub struct UserStore {
    api: ApiClient,
    cache: Arc<Mutex<EntityCache<User>>>,
}

impl UserStore {
    pub fn new(api: ApiClient) -> Self {
        Self {
            api,
            cache: Arc::new(Mutex::new(EntityCache::new())),
        }
    }

    pub fn users(&self) -> Vec<User> {
        self.cache.lock().unwrap().list()
    }

    pub fn current_user(&self) -> Option<User> {
        self.cache.lock().unwrap().current()
    }

    pub fn active_users(&self) -> Vec<User> {
        self.users()
            .into_iter()
            .filter(|user| user.is_active)
            .collect()
    }

    pub async fn fetch_users(&self, company_id: Option<Uuid>) -> Result<Vec<User>, ApiError> {
        let query = company_id
            .map(|id| vec![("companyId".to_owned(), id.to_string())])
            .unwrap_or_default();
        // Diferente das outras listas, este endpoint devolve o array puro.
        let users: Vec<User> = self.api.get_with("/users", query).await?;
        self.cache.lock().unwrap().replace_all(users.clone());
        Ok(users)
    }

    pub async fn fetch_user_by_id(&self, id: Uuid) -> Result<User, ApiError> {
        let user: User = self.api.get(&format!("/users/{}", id)).await?;
        self.cache.lock().unwrap().set_current(user.clone());
        Ok(user)
    }

    pub async fn create(&self, payload: &RegisterPayload) -> Result<User, ApiError> {
        let created: User = self.api.post("/auth/register", payload).await?;
        self.fetch_users(None).await?;
        tracing::info!("Usuário {} criado", created.id);
        Ok(created)
    }

    pub async fn update(&self, id: Uuid, payload: &UpdateUserPayload) -> Result<User, ApiError> {
        let updated: User = self.api.patch(&format!("/users/{}", id), payload).await?;
        self.cache.lock().unwrap().upsert(updated.clone());
        Ok(updated)
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), ApiError> {
        self.api.delete(&format!("/users/{}", id)).await?;
        self.cache.lock().unwrap().remove(id);
        Ok(())
    }
}
