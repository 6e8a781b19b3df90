use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

/// Metadata for one uploaded document.
///
/// Written once at upload time, immutable afterwards, and removed only
/// together with the owning task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub original_name: String,
    /// Generated unique name the file is stored under.
    pub stored_name: String,
    pub path: String,
    pub mime_type: String,
    pub size_bytes: u64,
}

/// A task as stored in the database and returned by the API.
#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct Task {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    /// Free-form status label; the API filters on it by equality only.
    pub status: String,
    /// Free-form priority label.
    pub priority: Option<String>,
    /// Sortable date string (ISO style, e.g. "2026-08-06"). Compared
    /// lexically by filters and sorts, never parsed.
    pub due_date: Option<String>,
    /// Ordered attachment metadata, embedded as JSON.
    pub attachments: Json<Vec<Attachment>>,
    /// Creator reference.
    pub user_id: i32,
    /// Assignee reference, if any.
    pub assigned_to: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn default_status() -> String {
    "todo".to_string()
}

/// Input for creating a task.
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct TaskInput {
    #[validate(length(min = 1, max = 200))]
    pub title: String,

    #[validate(length(max = 1000))]
    pub description: Option<String>,

    #[serde(default = "default_status")]
    pub status: String,

    pub priority: Option<String>,

    pub due_date: Option<String>,

    pub assigned_to: Option<i32>,
}

/// Partial update payload for a task. Absent fields are left untouched.
#[derive(Debug, Deserialize, Validate)]
pub struct TaskUpdate {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,

    #[validate(length(max = 1000))]
    pub description: Option<String>,

    pub status: Option<String>,

    pub priority: Option<String>,

    pub due_date: Option<String>,

    pub assigned_to: Option<i32>,
}

impl TaskUpdate {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.status.is_none()
            && self.priority.is_none()
            && self.due_date.is_none()
            && self.assigned_to.is_none()
    }
}

impl Task {
    /// Creates a new `Task` from input, the creator's id, and the metadata
    /// of any attachments already persisted for it.
    pub fn new(input: TaskInput, user_id: i32, attachments: Vec<Attachment>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            title: input.title,
            description: input.description,
            status: input.status,
            priority: input.priority,
            due_date: input.due_date,
            attachments: Json(attachments),
            user_id,
            assigned_to: input.assigned_to,
            created_at: now,
            updated_at: now,
        }
    }
}
