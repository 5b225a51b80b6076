// src/stores/tasks.rs

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use serde::Deserialize;
use uuid::Uuid;

use crate::common::error::ApiError;
use crate::models::auth::User;
use crate::models::task::{
    CompleteTaskPayload, CreateTaskPayload, TaskFilters, TaskStatus, TaskWithDetails,
    UpdateTaskPayload,
};
use crate::remote::ApiClient;
use crate::stores::EntityCache;

#[derive(Debug, Deserialize)]
struct TaskListResponse {
    tasks: Vec<TaskWithDetails>,
}

// O motor de ciclo de vida das tarefas. Toda transição é validada contra o
// status em cache ANTES de qualquer requisição: uma transição impossível é
// rejeitada localmente sem gastar uma viagem. O servidor continua sendo o
// árbitro final e ainda pode recusar a legítima.
#[derive(Clone)]
pub struct TaskStore {
    api: ApiClient,
    inner: Arc<TaskStoreInner>,
}

struct TaskStoreInner {
    cache: Mutex<EntityCache<TaskWithDetails>>,
    // Ids com mutação em voo: uma segunda mutação para o mesmo id é
    // rejeitada na hora com ConflictInFlight, mantendo um único escritor
    // por tarefa.
    in_flight: Mutex<HashSet<Uuid>>,
}

// Libera o id ao sair de escopo, com sucesso ou erro.
struct InFlightGuard {
    inner: Arc<TaskStoreInner>,
    id: Uuid,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.inner.in_flight.lock().unwrap().remove(&self.id);
    }
}

impl TaskStore {
    pub fn new(api: ApiClient) -> Self {
        Self {
            api,
            inner: Arc::new(TaskStoreInner {
                cache: Mutex::new(EntityCache::new()),
                in_flight: Mutex::new(HashSet::new()),
            }),
        }
    }

    // --- Leituras ---

    pub fn tasks(&self) -> Vec<TaskWithDetails> {
        self.inner.cache.lock().unwrap().list()
    }

    pub fn current_task(&self) -> Option<TaskWithDetails> {
        self.inner.cache.lock().unwrap().current()
    }

    /// Tarefas ainda não iniciadas (com ou sem urgência).
    pub fn pending_tasks(&self) -> Vec<TaskWithDetails> {
        self.tasks()
            .into_iter()
            .filter(|details| details.task.status.is_pending())
            .collect()
    }

    pub fn tasks_for(&self, user_id: Uuid) -> Vec<TaskWithDetails> {
        self.tasks()
            .into_iter()
            .filter(|details| details.task.assigned_to == Some(user_id))
            .collect()
    }

    pub async fn fetch_tasks(&self, filters: &TaskFilters) -> Result<Vec<TaskWithDetails>, ApiError> {
        let response: TaskListResponse = self.api.get_with("/tasks", filters.to_query()).await?;
        self.inner
            .cache
            .lock()
            .unwrap()
            .replace_all(response.tasks.clone());
        Ok(response.tasks)
    }

    pub async fn fetch_task_by_id(&self, id: Uuid) -> Result<TaskWithDetails, ApiError> {
        let details: TaskWithDetails = self.api.get(&format!("/tasks/{}", id)).await?;
        self.inner.cache.lock().unwrap().set_current(details.clone());
        Ok(details)
    }

    // --- Mutações ---

    pub async fn create(&self, payload: &CreateTaskPayload) -> Result<TaskWithDetails, ApiError> {
        let created: TaskWithDetails = self.api.post("/tasks", payload).await?;
        self.apply(created.clone());
        tracing::info!("Tarefa {} criada", created.task.id);
        Ok(created)
    }

    /// Atualização genérica de campos (reatribuição, reagendamento, edição
    /// de observações). Se o payload muda o status, a mudança passa pela
    /// mesma máquina de estados das operações dedicadas.
    pub async fn update(
        &self,
        id: Uuid,
        payload: &UpdateTaskPayload,
    ) -> Result<TaskWithDetails, ApiError> {
        if let Some(next) = payload.status {
            let (current, _) = self.cached_view(id)?;
            if next != current && !current.can_transition_to(next) {
                return Err(ApiError::PreconditionViolation {
                    action: "update",
                    detail: format!(
                        "transição de {} para {} não é permitida",
                        current.as_str(),
                        next.as_str()
                    ),
                });
            }
        }

        let _guard = self.begin_mutation(id)?;
        let updated: TaskWithDetails = self.api.patch(&format!("/tasks/{}", id), payload).await?;
        self.apply(updated.clone());
        Ok(updated)
    }

    /// Inicia uma tarefa. Exige status "a limpar" (urgente ou não), um
    /// responsável resolvido, e que o ator seja esse responsável ou um
    /// administrador.
    pub async fn start(&self, id: Uuid, actor: &User) -> Result<TaskWithDetails, ApiError> {
        let (status, assignee) = self.cached_view(id)?;
        if !status.is_pending() {
            return Err(ApiError::PreconditionViolation {
                action: "start",
                detail: format!("status atual é {}", status.as_str()),
            });
        }
        let assignee = assignee.ok_or(ApiError::PreconditionViolation {
            action: "start",
            detail: "a tarefa ainda não tem responsável".into(),
        })?;
        if assignee != actor.id && !actor.role.is_admin() {
            return Err(ApiError::PreconditionViolation {
                action: "start",
                detail: "apenas o responsável ou um administrador pode iniciar".into(),
            });
        }

        let _guard = self.begin_mutation(id)?;
        let updated: TaskWithDetails = self
            .api
            .patch_empty(&format!("/tasks/{}/start", id))
            .await?;
        self.apply(updated.clone());
        tracing::info!("Tarefa {} iniciada por {}", id, actor.name);
        Ok(updated)
    }

    /// Conclui uma tarefa em andamento. `completed_at` vem sempre do
    /// servidor, nunca do relógio local.
    pub async fn complete(
        &self,
        id: Uuid,
        observations: Option<String>,
        images: Option<Vec<String>>,
    ) -> Result<TaskWithDetails, ApiError> {
        let (status, _) = self.cached_view(id)?;
        if status != TaskStatus::InProgress {
            return Err(ApiError::PreconditionViolation {
                action: "complete",
                detail: format!("status atual é {}", status.as_str()),
            });
        }

        let payload = CompleteTaskPayload {
            observations: observations.unwrap_or_default(),
            images: images.unwrap_or_default(),
        };

        let _guard = self.begin_mutation(id)?;
        let updated: TaskWithDetails = self
            .api
            .patch(&format!("/tasks/{}/complete", id), &payload)
            .await?;
        self.apply(updated.clone());
        tracing::info!("Tarefa {} concluída", id);
        Ok(updated)
    }

    /// Marca uma tarefa concluída como verificada. Só administradores.
    pub async fn verify(&self, id: Uuid, actor: &User) -> Result<TaskWithDetails, ApiError> {
        let (status, _) = self.cached_view(id)?;
        if status != TaskStatus::Completed {
            return Err(ApiError::PreconditionViolation {
                action: "verify",
                detail: format!("status atual é {}", status.as_str()),
            });
        }
        if !actor.role.is_admin() {
            return Err(ApiError::PreconditionViolation {
                action: "verify",
                detail: "apenas administradores podem verificar".into(),
            });
        }

        let payload = UpdateTaskPayload {
            status: Some(TaskStatus::Verified),
            ..Default::default()
        };
        let _guard = self.begin_mutation(id)?;
        let updated: TaskWithDetails = self.api.patch(&format!("/tasks/{}", id), &payload).await?;
        self.apply(updated.clone());
        tracing::info!("Tarefa {} verificada por {}", id, actor.name);
        Ok(updated)
    }

    /// Remove uma tarefa. O cache só muda depois do sucesso remoto: nunca
    /// removemos de forma otimista para o item não "reaparecer" numa falha.
    pub async fn delete(&self, id: Uuid) -> Result<(), ApiError> {
        let _guard = self.begin_mutation(id)?;
        self.api.delete(&format!("/tasks/{}", id)).await?;
        self.inner.cache.lock().unwrap().remove(id);
        tracing::info!("Tarefa {} removida", id);
        Ok(())
    }

    // --- Internos ---

    // A visão local necessária para validar uma transição. Uma tarefa que o
    // cache não conhece não pode ser validada.
    fn cached_view(&self, id: Uuid) -> Result<(TaskStatus, Option<Uuid>), ApiError> {
        let cache = self.inner.cache.lock().unwrap();
        cache
            .get(id)
            .map(|details| (details.task.status, details.task.assigned_to))
            .ok_or(ApiError::NotFound)
    }

    fn begin_mutation(&self, id: Uuid) -> Result<InFlightGuard, ApiError> {
        let mut in_flight = self.inner.in_flight.lock().unwrap();
        if !in_flight.insert(id) {
            return Err(ApiError::ConflictInFlight);
        }
        Ok(InFlightGuard {
            inner: self.inner.clone(),
            id,
        })
    }

    // Pós-sucesso: lista e item em foco passam a refletir exatamente a
    // representação devolvida pelo servidor.
    fn apply(&self, updated: TaskWithDetails) {
        self.inner.cache.lock().unwrap().upsert(updated);
    }

    #[cfg(test)]
    pub(crate) fn seed(&self, tasks: Vec<TaskWithDetails>) {
        self.inner.cache.lock().unwrap().replace_all(tasks);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::task::Task;
    use crate::remote::testing::ScriptedTransport;
    use crate::remote::Method;
    use crate::storage::InMemoryStorage;
    use crate::stores::auth::testing::user_with_role;
    use crate::stores::auth::SessionState;
    use crate::models::auth::Role;
    use chrono::{DateTime, TimeZone, Utc};
    use serde_json::json;
    use std::time::Duration;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, hour, 0, 0).unwrap()
    }

    fn details(status: TaskStatus, assigned_to: Option<Uuid>) -> TaskWithDetails {
        TaskWithDetails {
            task: Task {
                id: Uuid::new_v4(),
                room_id: Uuid::new_v4(),
                assigned_to,
                status,
                scheduled_date: at(9),
                completed_at: matches!(status, TaskStatus::Completed | TaskStatus::Verified)
                    .then(|| at(11)),
                verified_at: matches!(status, TaskStatus::Verified).then(|| at(12)),
                observations: None,
                images: None,
                created_at: at(8),
                updated_at: at(8),
            },
            room_name: "Habitación 101".into(),
            building_name: "Hotel Central".into(),
            assigned_to_name: assigned_to.map(|_| "Caro".into()),
        }
    }

    fn store_with(transport: Arc<ScriptedTransport>) -> TaskStore {
        let session = Arc::new(SessionState::new(Arc::new(InMemoryStorage::new())));
        let api = ApiClient::new(transport, session, Duration::from_secs(10));
        TaskStore::new(api)
    }

    #[tokio::test]
    async fn complete_on_a_not_started_task_is_rejected_without_any_request() {
        let transport = Arc::new(ScriptedTransport::new());
        let store = store_with(transport.clone());
        let pending = details(TaskStatus::ToClean, None);
        let id = pending.task.id;
        store.seed(vec![pending]);

        let result = store.complete(id, Some("limpio".into()), None).await;
        assert!(matches!(
            result,
            Err(ApiError::PreconditionViolation { action: "complete", .. })
        ));
        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn an_unknown_task_cannot_be_mutated() {
        let transport = Arc::new(ScriptedTransport::new());
        let store = store_with(transport.clone());
        let actor = user_with_role(Role::Admin);

        let result = store.start(Uuid::new_v4(), &actor).await;
        assert!(matches!(result, Err(ApiError::NotFound)));
        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn start_requires_a_resolved_assignee_even_for_admins() {
        let transport = Arc::new(ScriptedTransport::new());
        let store = store_with(transport.clone());
        let unassigned = details(TaskStatus::ToCleanUrgent, None);
        let id = unassigned.task.id;
        store.seed(vec![unassigned]);

        let admin = user_with_role(Role::SuperAdmin);
        let result = store.start(id, &admin).await;
        assert!(matches!(
            result,
            Err(ApiError::PreconditionViolation { action: "start", .. })
        ));
        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn start_rejects_a_cleaner_who_is_not_the_assignee() {
        let transport = Arc::new(ScriptedTransport::new());
        let store = store_with(transport.clone());
        let task = details(TaskStatus::ToClean, Some(Uuid::new_v4()));
        let id = task.task.id;
        store.seed(vec![task]);

        let other_cleaner = user_with_role(Role::Cleaner);
        let result = store.start(id, &other_cleaner).await;
        assert!(matches!(
            result,
            Err(ApiError::PreconditionViolation { action: "start", .. })
        ));
        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn start_applies_the_server_representation() {
        let transport = Arc::new(ScriptedTransport::new());
        let store = store_with(transport.clone());
        let cleaner = user_with_role(Role::Cleaner);
        let mut task = details(TaskStatus::ToClean, Some(cleaner.id));
        let id = task.task.id;
        store.seed(vec![task.clone()]);

        task.task.status = TaskStatus::InProgress;
        task.task.updated_at = at(10);
        transport.stub(
            Method::Patch,
            &format!("/tasks/{}/start", id),
            200,
            json!(task),
        );

        let updated = store.start(id, &cleaner).await.unwrap();
        assert_eq!(updated.task.status, TaskStatus::InProgress);
        let cached = store.tasks().into_iter().find(|t| t.task.id == id).unwrap();
        assert_eq!(cached.task.status, TaskStatus::InProgress);
        assert_eq!(cached.task.updated_at, at(10));
    }

    #[tokio::test]
    async fn complete_takes_the_server_timestamp_not_the_local_clock() {
        let transport = Arc::new(ScriptedTransport::new());
        let store = store_with(transport.clone());
        let cleaner = user_with_role(Role::Cleaner);
        let mut task = details(TaskStatus::InProgress, Some(cleaner.id));
        let id = task.task.id;
        store.seed(vec![task.clone()]);

        task.task.status = TaskStatus::Completed;
        task.task.completed_at = Some(at(14));
        task.task.observations = Some("clean".into());
        task.task.images = Some(vec![]);
        transport.stub(
            Method::Patch,
            &format!("/tasks/{}/complete", id),
            200,
            json!(task),
        );

        let updated = store.complete(id, Some("clean".into()), Some(vec![])).await.unwrap();
        assert_eq!(updated.task.status, TaskStatus::Completed);
        assert_eq!(updated.task.completed_at, Some(at(14)));

        let cached = store.tasks().into_iter().find(|t| t.task.id == id).unwrap();
        assert_eq!(cached.task.completed_at, Some(at(14)));
        assert_eq!(cached.task.observations.as_deref(), Some("clean"));
        assert!(cached.task.lifecycle_consistent());

        // O corpo enviado carrega os dois campos, com defaults preenchidos.
        let sent = &transport.calls()[0];
        assert_eq!(sent.body.as_ref().unwrap()["observations"], "clean");
    }

    #[tokio::test]
    async fn verify_is_admin_only_and_takes_the_server_timestamp() {
        let transport = Arc::new(ScriptedTransport::new());
        let store = store_with(transport.clone());
        let mut task = details(TaskStatus::Completed, Some(Uuid::new_v4()));
        let id = task.task.id;
        store.seed(vec![task.clone()]);

        let cleaner = user_with_role(Role::Cleaner);
        let result = store.verify(id, &cleaner).await;
        assert!(matches!(
            result,
            Err(ApiError::PreconditionViolation { action: "verify", .. })
        ));
        assert!(transport.calls().is_empty());

        task.task.status = TaskStatus::Verified;
        task.task.verified_at = Some(at(16));
        transport.stub(Method::Patch, &format!("/tasks/{}", id), 200, json!(task));

        let admin = user_with_role(Role::Admin);
        let updated = store.verify(id, &admin).await.unwrap();
        assert_eq!(updated.task.status, TaskStatus::Verified);
        assert_eq!(updated.task.verified_at, Some(at(16)));
        assert!(updated.task.lifecycle_consistent());
    }

    #[tokio::test]
    async fn a_second_mutation_in_flight_is_rejected_with_a_single_request() {
        let transport = Arc::new(ScriptedTransport::new());
        let store = store_with(transport.clone());
        let cleaner = user_with_role(Role::Cleaner);
        let mut task = details(TaskStatus::ToClean, Some(cleaner.id));
        let id = task.task.id;
        store.seed(vec![task.clone()]);

        task.task.status = TaskStatus::InProgress;
        let path = format!("/tasks/{}/start", id);
        let gate = transport.stub_gated(Method::Patch, &path, 200, json!(task));

        let first = tokio::spawn({
            let store = store.clone();
            let actor = cleaner.clone();
            async move { store.start(id, &actor).await }
        });

        // Espera a primeira chamada chegar ao transporte (e ficar presa no portão).
        while transport.call_count(Method::Patch, &path) == 0 {
            tokio::task::yield_now().await;
        }

        let second = store.start(id, &cleaner).await;
        assert!(matches!(second, Err(ApiError::ConflictInFlight)));

        gate.notify_one();
        let outcome = first.await.unwrap().unwrap();
        assert_eq!(outcome.task.status, TaskStatus::InProgress);

        // Só a primeira chamada chegou ao servidor.
        assert_eq!(transport.call_count(Method::Patch, &path), 1);
    }

    #[tokio::test]
    async fn delete_never_removes_optimistically() {
        let transport = Arc::new(ScriptedTransport::new());
        let store = store_with(transport.clone());
        let task = details(TaskStatus::ToClean, None);
        let id = task.task.id;
        store.seed(vec![task]);

        transport.stub(Method::Delete, &format!("/tasks/{}", id), 500, json!({}));
        let result = store.delete(id).await;
        assert!(matches!(result, Err(ApiError::ServerFault { .. })));
        // A falha não tocou no cache: o item continua visível.
        assert_eq!(store.tasks().len(), 1);

        transport.stub(Method::Delete, &format!("/tasks/{}", id), 204, json!(null));
        store.delete(id).await.unwrap();
        assert!(store.tasks().is_empty());
    }

    #[tokio::test]
    async fn update_rejects_an_illegal_status_jump() {
        let transport = Arc::new(ScriptedTransport::new());
        let store = store_with(transport.clone());
        let task = details(TaskStatus::ToClean, None);
        let id = task.task.id;
        store.seed(vec![task]);

        let payload = UpdateTaskPayload {
            status: Some(TaskStatus::Verified),
            ..Default::default()
        };
        let result = store.update(id, &payload).await;
        assert!(matches!(
            result,
            Err(ApiError::PreconditionViolation { action: "update", .. })
        ));
        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn update_without_status_change_is_plain_glue() {
        let transport = Arc::new(ScriptedTransport::new());
        let store = store_with(transport.clone());
        let mut task = details(TaskStatus::ToClean, None);
        let id = task.task.id;
        store.seed(vec![task.clone()]);

        let new_assignee = Uuid::new_v4();
        task.task.assigned_to = Some(new_assignee);
        task.assigned_to_name = Some("Caro".into());
        transport.stub(Method::Patch, &format!("/tasks/{}", id), 200, json!(task));

        let payload = UpdateTaskPayload {
            assigned_to: Some(new_assignee),
            ..Default::default()
        };
        let updated = store.update(id, &payload).await.unwrap();
        assert_eq!(updated.task.assigned_to, Some(new_assignee));
        // O nome desnormalizado veio do servidor, não do payload.
        assert_eq!(updated.assigned_to_name.as_deref(), Some("Caro"));
    }

    #[tokio::test]
    async fn cache_keeps_list_and_focus_in_sync() {
        let transport = Arc::new(ScriptedTransport::new());
        let store = store_with(transport.clone());
        let cleaner = user_with_role(Role::Cleaner);
        let mut task = details(TaskStatus::ToClean, Some(cleaner.id));
        let id = task.task.id;

        transport.stub(Method::Get, &format!("/tasks/{}", id), 200, json!(task));
        store.seed(vec![task.clone()]);
        store.fetch_task_by_id(id).await.unwrap();
        assert_eq!(store.current_task().unwrap().task.id, id);

        task.task.status = TaskStatus::InProgress;
        transport.stub(
            Method::Patch,
            &format!("/tasks/{}/start", id),
            200,
            json!(task),
        );
        store.start(id, &cleaner).await.unwrap();

        // Lista e foco refletem a mesma representação do servidor.
        assert_eq!(
            store.current_task().unwrap().task.status,
            TaskStatus::InProgress
        );
        assert_eq!(
            store.tasks()[0].task.status,
            TaskStatus::InProgress
        );
    }

    #[tokio::test]
    async fn selectors_filter_the_cached_list() {
        let transport = Arc::new(ScriptedTransport::new());
        let store = store_with(transport);
        let cleaner = user_with_role(Role::Cleaner);
        let mine = details(TaskStatus::ToClean, Some(cleaner.id));
        let urgent = details(TaskStatus::ToCleanUrgent, None);
        let done = details(TaskStatus::Verified, Some(cleaner.id));
        store.seed(vec![mine.clone(), urgent.clone(), done]);

        let pending = store.pending_tasks();
        assert_eq!(pending.len(), 2);
        assert!(pending.iter().all(|t| t.task.status.is_pending()));

        let mine_again = store.tasks_for(cleaner.id);
        assert_eq!(mine_again.len(), 2);
    }

    #[tokio::test]
    async fn create_appends_only_the_server_representation() {
        let transport = Arc::new(ScriptedTransport::new());
        let store = store_with(transport.clone());
        let created = details(TaskStatus::ToClean, None);
        transport.stub(Method::Post, "/tasks", 200, json!(created));

        let payload = CreateTaskPayload {
            room_id: created.task.room_id,
            assigned_to: None,
            scheduled_date: at(9),
            observations: None,
        };
        store.create(&payload).await.unwrap();
        assert_eq!(store.tasks().len(), 1);
        assert_eq!(store.tasks()[0].task.id, created.task.id);
    }
}
