// src/stores/rooms.rs

use std::sync::{Arc, Mutex};

use serde::Deserialize;
use uuid::Uuid;

use crate::common::error::ApiError;
use crate::models::room::{CreateRoomPayload, Room, UpdateRoomPayload};
use crate::remote::ApiClient;
use crate::stores::EntityCache;

#[derive(Debug, Deserialize)]
struct RoomListResponse {
    rooms: Vec<Room>,
}

#[derive(Clone)]
pub struct RoomStore {
    api: ApiClient,
    cache: Arc<Mutex<EntityCache<Room>>>,
}

impl RoomStore {
    pub fn new(api: ApiClient) -> Self {
        Self {
            api,
            cache: Arc::new(Mutex::new(EntityCache::new())),
        }
    }

    pub fn rooms(&self) -> Vec<Room> {
        self.cache.lock().unwrap().list()
    }

    pub fn current_room(&self) -> Option<Room> {
        self.cache.lock().unwrap().current()
    }

    pub fn active_rooms(&self) -> Vec<Room> {
        self.rooms()
            .into_iter()
            .filter(|room| room.is_active)
            .collect()
    }

    pub async fn fetch_rooms(&self, building_id: Option<Uuid>) -> Result<Vec<Room>, ApiError> {
        let query = building_id
            .map(|id| vec![("buildingId".to_owned(), id.to_string())])
            .unwrap_or_default();
        let response: RoomListResponse = self.api.get_with("/rooms", query).await?;
        self.cache.lock().unwrap().replace_all(response.rooms.clone());
        Ok(response.rooms)
    }

    pub async fn fetch_room_by_id(&self, id: Uuid) -> Result<Room, ApiError> {
        let room: Room = self.api.get(&format!("/rooms/{}", id)).await?;
        self.cache.lock().unwrap().set_current(room.clone());
        Ok(room)
    }

    pub async fn create(&self, payload: &CreateRoomPayload) -> Result<Room, ApiError> {
        let created: Room = self.api.post("/rooms", payload).await?;
        self.cache.lock().unwrap().upsert(created.clone());
        tracing::info!("Habitação {} criada", created.id);
        Ok(created)
    }

    pub async fn update(&self, id: Uuid, payload: &UpdateRoomPayload) -> Result<Room, ApiError> {
        let updated: Room = self.api.patch(&format!("/rooms/{}", id), payload).await?;
        self.cache.lock().unwrap().upsert(updated.clone());
        Ok(updated)
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), ApiError> {
        self.api.delete(&format!("/rooms/{}", id)).await?;
        self.cache.lock().unwrap().remove(id);
        Ok(())
    }
}
