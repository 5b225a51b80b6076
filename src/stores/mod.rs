// src/stores/mod.rs

use uuid::Uuid;

pub mod auth;
pub mod buildings;
pub mod companies;
pub mod rooms;
pub mod tasks;
pub mod users;

pub use auth::AuthStore;
pub use buildings::BuildingStore;
pub use companies::CompanyStore;
pub use rooms::RoomStore;
pub use tasks::TaskStore;
pub use users::UserStore;

// Entidade cacheável: tudo que um store guarda é endereçado pelo id.
pub(crate) trait Entity {
    fn entity_id(&self) -> Uuid;
}

/// Cache local de um store: a lista (na ordem do servidor) mais o item em
/// foco. Regra única: escreve-se apenas a representação devolvida pelo
/// servidor, nunca o payload enviado. Lista e foco nunca divergem para
/// o mesmo id.
#[derive(Debug)]
pub(crate) struct EntityCache<T> {
    list: Vec<T>,
    current: Option<T>,
}

impl<T> Default for EntityCache<T> {
    fn default() -> Self {
        Self {
            list: Vec::new(),
            current: None,
        }
    }
}

impl<T: Entity + Clone> EntityCache<T> {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn list(&self) -> Vec<T> {
        self.list.clone()
    }

    pub(crate) fn current(&self) -> Option<T> {
        self.current.clone()
    }

    pub(crate) fn get(&self, id: Uuid) -> Option<&T> {
        self.list
            .iter()
            .find(|item| item.entity_id() == id)
            .or(self.current.as_ref().filter(|item| item.entity_id() == id))
    }

    pub(crate) fn replace_all(&mut self, items: Vec<T>) {
        self.list = items;
        // Se o item em foco voltou na lista nova, sincroniza as duas visões.
        if let Some(current) = &self.current {
            let id = current.entity_id();
            if let Some(fresh) = self.list.iter().find(|item| item.entity_id() == id) {
                self.current = Some(fresh.clone());
            }
        }
    }

    /// Substitui a entrada do mesmo id (ou acrescenta, se o servidor acabou
    /// de criá-la). No máximo uma entrada por id.
    pub(crate) fn upsert(&mut self, item: T) {
        let id = item.entity_id();
        match self.list.iter_mut().find(|entry| entry.entity_id() == id) {
            Some(entry) => *entry = item.clone(),
            None => self.list.push(item.clone()),
        }
        if let Some(current) = &self.current {
            if current.entity_id() == id {
                self.current = Some(item);
            }
        }
    }

    pub(crate) fn set_current(&mut self, item: T) {
        let id = item.entity_id();
        if let Some(entry) = self.list.iter_mut().find(|entry| entry.entity_id() == id) {
            *entry = item.clone();
        }
        self.current = Some(item);
    }

    pub(crate) fn remove(&mut self, id: Uuid) {
        self.list.retain(|item| item.entity_id() != id);
        if self
            .current
            .as_ref()
            .is_some_and(|current| current.entity_id() == id)
        {
            self.current = None;
        }
    }
}

impl Entity for crate::models::task::TaskWithDetails {
    fn entity_id(&self) -> Uuid {
        self.task.id
    }
}

impl Entity for crate::models::building::Building {
    fn entity_id(&self) -> Uuid {
        self.id
    }
}

impl Entity for crate::models::room::Room {
    fn entity_id(&self) -> Uuid {
        self.id
    }
}

impl Entity for crate::models::company::Company {
    fn entity_id(&self) -> Uuid {
        self.id
    }
}

impl Entity for crate::models::auth::User {
    fn entity_id(&self) -> Uuid {
        self.id
    }
}
