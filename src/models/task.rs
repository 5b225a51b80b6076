// src/models/task.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// --- Enums ---

// O ciclo de vida de uma tarefa de limpeza. A urgência é só uma dica de
// prioridade: ambos os status iniciais transicionam apenas para InProgress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    ToClean,
    ToCleanUrgent,
    InProgress,
    Completed,
    Verified,
}

pub const ALL_STATUSES: [TaskStatus; 5] = [
    TaskStatus::ToClean,
    TaskStatus::ToCleanUrgent,
    TaskStatus::InProgress,
    TaskStatus::Completed,
    TaskStatus::Verified,
];

/// Par de classes de estilo para o badge de status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusBadge {
    pub bg: &'static str,
    pub text: &'static str,
}

impl TaskStatus {
    /// As únicas transições legais da máquina de estados.
    /// Verified é terminal; tudo que não está aqui é rejeitado localmente.
    pub fn can_transition_to(self, next: TaskStatus) -> bool {
        use TaskStatus::*;
        matches!(
            (self, next),
            (ToClean, InProgress)
                | (ToCleanUrgent, InProgress)
                | (InProgress, Completed)
                | (Completed, Verified)
        )
    }

    /// Ainda não iniciada (com ou sem urgência).
    pub fn is_pending(self) -> bool {
        matches!(self, TaskStatus::ToClean | TaskStatus::ToCleanUrgent)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Verified)
    }

    pub fn display_name(self) -> &'static str {
        match self {
            TaskStatus::ToClean => "A Limpiar",
            TaskStatus::ToCleanUrgent => "A Limpiar Urgente",
            TaskStatus::InProgress => "En Progreso",
            TaskStatus::Completed => "Completada",
            TaskStatus::Verified => "Verificada",
        }
    }

    pub fn badge(self) -> StatusBadge {
        match self {
            TaskStatus::ToClean => StatusBadge { bg: "bg-yellow-100", text: "text-yellow-800" },
            TaskStatus::ToCleanUrgent => StatusBadge { bg: "bg-red-100", text: "text-red-800" },
            TaskStatus::InProgress => StatusBadge { bg: "bg-blue-100", text: "text-blue-800" },
            TaskStatus::Completed => StatusBadge { bg: "bg-green-100", text: "text-green-800" },
            TaskStatus::Verified => StatusBadge { bg: "bg-purple-100", text: "text-purple-800" },
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::ToClean => "to_clean",
            TaskStatus::ToCleanUrgent => "to_clean_urgent",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
            TaskStatus::Verified => "verified",
        }
    }
}

// --- Structs ---

// Uma tarefa como o servidor a devolve. O cliente guarda uma cópia
// possivelmente desatualizada; o servidor é sempre a fonte da verdade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: Uuid,
    pub room_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<Uuid>,
    pub status: TaskStatus,
    pub scheduled_date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verified_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observations: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<String>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Os carimbos de tempo acompanham o status:
    /// `completed_at` ⇔ Completed/Verified, `verified_at` ⇔ Verified.
    pub fn lifecycle_consistent(&self) -> bool {
        let completed = matches!(self.status, TaskStatus::Completed | TaskStatus::Verified);
        let verified = matches!(self.status, TaskStatus::Verified);
        self.completed_at.is_some() == completed && self.verified_at.is_some() == verified
    }
}

// Projeção enriquecida de leitura: os nomes desnormalizados vêm prontos do
// servidor, o cliente nunca os calcula.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskWithDetails {
    #[serde(flatten)]
    pub task: Task,
    pub room_name: String,
    pub building_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_to_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskPayload {
    pub room_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<Uuid>,
    pub scheduled_date: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observations: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTaskPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduled_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observations: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<String>>,
}

// Corpo do PATCH /tasks/:id/complete. Observações e imagens são opcionais
// para o chamador, mas o servidor recebe sempre os dois campos.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompleteTaskPayload {
    pub observations: String,
    pub images: Vec<String>,
}

// Filtros do GET /tasks, serializados como query string.
#[derive(Debug, Clone, Default)]
pub struct TaskFilters {
    pub room_id: Option<Uuid>,
    pub building_id: Option<Uuid>,
    pub assigned_to: Option<Uuid>,
    pub status: Option<TaskStatus>,
}

impl TaskFilters {
    pub fn to_query(&self) -> Vec<(String, String)> {
        let mut query = Vec::new();
        if let Some(room_id) = self.room_id {
            query.push(("roomId".to_owned(), room_id.to_string()));
        }
        if let Some(building_id) = self.building_id {
            query.push(("buildingId".to_owned(), building_id.to_string()));
        }
        if let Some(assigned_to) = self.assigned_to {
            query.push(("assignedTo".to_owned(), assigned_to.to_string()));
        }
        if let Some(status) = self.status {
            query.push(("status".to_owned(), status.as_str().to_owned()));
        }
        query
    }
}
