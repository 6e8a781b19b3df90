//! Task endpoints: FSP listing, creation with attachments, retrieval,
//! update, deletion, and attachment download.
//!
//! Listing translates the pure query descriptor from `fsp` into dynamically
//! assembled SQL with numbered parameters. Sort fields are mapped onto a
//! column whitelist here; an unknown field is dropped rather than
//! interpolated into the statement.

use std::collections::HashMap;

use crate::{
    auth::AuthenticatedUser,
    config::Config,
    error::AppError,
    files::{self, UploadedFile},
    fsp::{parse_task_query, SortDirection},
    models::{Attachment, Role, Task, TaskInput, TaskUpdate},
};
use actix_files::NamedFile;
use actix_multipart::Multipart;
use actix_web::{delete, get, post, put, web, HttpResponse, Responder};
use futures::TryStreamExt;
use serde_json::json;
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

const TASK_COLUMNS: &str = "id, title, description, status, priority, due_date, attachments, \
     user_id, assigned_to, created_at, updated_at";

const SORT_COLUMNS: &[&str] = &[
    "due_date",
    "status",
    "priority",
    "title",
    "created_at",
    "updated_at",
];

/// A malformed identifier is a 400, distinct from the 404 of a well-formed
/// reference to a missing record.
fn parse_task_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| AppError::BadRequest("Invalid task ID format".into()))
}

fn order_by_clause(sort: &[(String, SortDirection)]) -> String {
    let keys: Vec<String> = sort
        .iter()
        .filter(|(field, _)| SORT_COLUMNS.contains(&field.as_str()))
        .map(|(field, direction)| {
            let direction = match direction {
                SortDirection::Asc => "ASC",
                SortDirection::Desc => "DESC",
            };
            format!("{} {}", field, direction)
        })
        .collect();

    if keys.is_empty() {
        "due_date DESC".to_string()
    } else {
        keys.join(", ")
    }
}

/// Lists tasks with filtering, sorting, and pagination.
///
/// Accepts `status`, `priority`, `due_date_max`, `assigned_to`, `sort`,
/// `page`, and `limit` query parameters; see the `fsp` module for the
/// parsing rules and their deliberate leniencies. The response wraps the
/// page of tasks together with a pagination envelope.
#[get("")]
pub async fn list_tasks(
    pool: web::Data<PgPool>,
    config: web::Data<Config>,
    params: web::Query<HashMap<String, String>>,
    _user: AuthenticatedUser,
) -> Result<impl Responder, AppError> {
    let query = parse_task_query(&params, config.default_page_size);

    let mut conditions: Vec<String> = Vec::new();
    let mut param_count = 1;

    if query.filter.status.is_some() {
        conditions.push(format!("status = ${}", param_count));
        param_count += 1;
    }
    if query.filter.priority.is_some() {
        conditions.push(format!("priority = ${}", param_count));
        param_count += 1;
    }
    if query.filter.due_date_max.is_some() {
        // Lexical comparison on the stored date string.
        conditions.push(format!("due_date <= ${}", param_count));
        param_count += 1;
    }
    if query.filter.assigned_to.is_some() {
        conditions.push(format!("assigned_to = ${}", param_count));
        param_count += 1;
    }

    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", conditions.join(" AND "))
    };

    let count_sql = format!("SELECT COUNT(*) FROM tasks{}", where_clause);
    let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
    if let Some(status) = &query.filter.status {
        count_query = count_query.bind(status);
    }
    if let Some(priority) = &query.filter.priority {
        count_query = count_query.bind(priority);
    }
    if let Some(due_date_max) = &query.filter.due_date_max {
        count_query = count_query.bind(due_date_max);
    }
    if let Some(assigned_to) = query.filter.assigned_to {
        count_query = count_query.bind(assigned_to);
    }
    let total = count_query.fetch_one(&**pool).await?;

    let sql = format!(
        "SELECT {} FROM tasks{} ORDER BY {} OFFSET ${} LIMIT ${}",
        TASK_COLUMNS,
        where_clause,
        order_by_clause(&query.sort),
        param_count,
        param_count + 1
    );

    let mut rows = sqlx::query_as::<_, Task>(&sql);
    if let Some(status) = &query.filter.status {
        rows = rows.bind(status);
    }
    if let Some(priority) = &query.filter.priority {
        rows = rows.bind(priority);
    }
    if let Some(due_date_max) = &query.filter.due_date_max {
        rows = rows.bind(due_date_max);
    }
    if let Some(assigned_to) = query.filter.assigned_to {
        rows = rows.bind(assigned_to);
    }
    let tasks = rows
        .bind(query.skip)
        .bind(query.limit)
        .fetch_all(&**pool)
        .await?;

    let pages = (total + query.limit - 1) / query.limit;

    Ok(HttpResponse::Ok().json(json!({
        "tasks": tasks,
        "pagination": {
            "page": query.page(),
            "limit": query.limit,
            "total": total,
            "pages": pages,
        }
    })))
}

/// Creates a task from a multipart payload: text fields for the task data
/// plus up to the configured number of document attachments.
///
/// The attachment batch is validated (count first, then per-file extension)
/// and persisted before the task row is written, so a rejected batch leaves
/// no task behind.
#[post("")]
pub async fn create_task(
    pool: web::Data<PgPool>,
    config: web::Data<Config>,
    mut payload: Multipart,
    user: AuthenticatedUser,
) -> Result<impl Responder, AppError> {
    let mut fields: HashMap<String, String> = HashMap::new();
    let mut uploads: Vec<UploadedFile> = Vec::new();

    while let Some(mut field) = payload.try_next().await? {
        let name = field.name().to_string();
        let filename = field
            .content_disposition()
            .get_filename()
            .map(|f| f.to_string());
        let content_type = field
            .content_type()
            .map(|mime| mime.to_string())
            .unwrap_or_else(|| "application/octet-stream".to_string());

        let mut data = Vec::new();
        while let Some(chunk) = field.try_next().await? {
            data.extend_from_slice(&chunk);
        }

        match filename {
            Some(filename) if !filename.is_empty() => {
                uploads.push(UploadedFile {
                    original_name: filename,
                    content_type,
                    data,
                });
            }
            _ => {
                let value = String::from_utf8(data).map_err(|_| {
                    AppError::BadRequest(format!("Field '{}' is not valid UTF-8", name))
                })?;
                fields.insert(name, value);
            }
        }
    }

    let input = TaskInput {
        title: fields.remove("title").unwrap_or_default(),
        description: fields.remove("description"),
        status: fields.remove("status").unwrap_or_else(|| "todo".to_string()),
        priority: fields.remove("priority"),
        due_date: fields.remove("due_date"),
        assigned_to: fields.get("assigned_to").and_then(|v| v.parse().ok()),
    };
    input.validate()?;

    // save_uploads checks the batch size before writing anything; it runs on
    // the blocking pool because it does filesystem I/O.
    let upload_dir = config.upload_dir.clone();
    let allowed_extensions = config.allowed_extensions.clone();
    let max_count = config.max_file_uploads;
    let attachments = web::block(move || {
        files::save_uploads(&uploads, &upload_dir, &allowed_extensions, max_count)
    })
    .await??;

    let task = Task::new(input, user.id(), attachments);

    let sql = format!(
        "INSERT INTO tasks (id, title, description, status, priority, due_date, attachments, \
         user_id, assigned_to, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
         RETURNING {}",
        TASK_COLUMNS
    );
    let created = sqlx::query_as::<_, Task>(&sql)
        .bind(task.id)
        .bind(task.title)
        .bind(task.description)
        .bind(task.status)
        .bind(task.priority)
        .bind(task.due_date)
        .bind(task.attachments)
        .bind(task.user_id)
        .bind(task.assigned_to)
        .bind(task.created_at)
        .bind(task.updated_at)
        .fetch_one(&**pool)
        .await?;

    Ok(HttpResponse::Created().json(created))
}

/// Retrieves a single task by id.
#[get("/{id}")]
pub async fn get_task(
    pool: web::Data<PgPool>,
    task_id: web::Path<String>,
    _user: AuthenticatedUser,
) -> Result<impl Responder, AppError> {
    let task_uuid = parse_task_id(&task_id)?;

    let sql = format!("SELECT {} FROM tasks WHERE id = $1", TASK_COLUMNS);
    let task = sqlx::query_as::<_, Task>(&sql)
        .bind(task_uuid)
        .fetch_optional(&**pool)
        .await?;

    match task {
        Some(task) => Ok(HttpResponse::Ok().json(task)),
        None => Err(AppError::NotFound("Task not found".into())),
    }
}

/// Updates task metadata. Only the creator, the assignee, or an admin may
/// modify a task.
#[put("/{id}")]
pub async fn update_task(
    pool: web::Data<PgPool>,
    task_id: web::Path<String>,
    update: web::Json<TaskUpdate>,
    user: AuthenticatedUser,
) -> Result<impl Responder, AppError> {
    let task_uuid = parse_task_id(&task_id)?;
    update.validate()?;
    let update = update.into_inner();

    if update.is_empty() {
        return Err(AppError::BadRequest("No fields provided for update".into()));
    }

    let ownership =
        sqlx::query_as::<_, (i32, Option<i32>)>("SELECT user_id, assigned_to FROM tasks WHERE id = $1")
            .bind(task_uuid)
            .fetch_optional(&**pool)
            .await?;
    let (creator, assignee) = ownership.ok_or_else(|| AppError::NotFound("Task not found".into()))?;

    if user.role() != Role::Admin && user.id() != creator && Some(user.id()) != assignee {
        return Err(AppError::Forbidden("Not allowed to modify this task".into()));
    }

    let mut assignments: Vec<String> = Vec::new();
    let mut param_count = 1;

    if update.title.is_some() {
        assignments.push(format!("title = ${}", param_count));
        param_count += 1;
    }
    if update.description.is_some() {
        assignments.push(format!("description = ${}", param_count));
        param_count += 1;
    }
    if update.status.is_some() {
        assignments.push(format!("status = ${}", param_count));
        param_count += 1;
    }
    if update.priority.is_some() {
        assignments.push(format!("priority = ${}", param_count));
        param_count += 1;
    }
    if update.due_date.is_some() {
        assignments.push(format!("due_date = ${}", param_count));
        param_count += 1;
    }
    if update.assigned_to.is_some() {
        assignments.push(format!("assigned_to = ${}", param_count));
        param_count += 1;
    }
    assignments.push("updated_at = now()".to_string());

    let sql = format!(
        "UPDATE tasks SET {} WHERE id = ${} RETURNING {}",
        assignments.join(", "),
        param_count,
        TASK_COLUMNS
    );

    let mut query = sqlx::query_as::<_, Task>(&sql);
    if let Some(title) = &update.title {
        query = query.bind(title);
    }
    if let Some(description) = &update.description {
        query = query.bind(description);
    }
    if let Some(status) = &update.status {
        query = query.bind(status);
    }
    if let Some(priority) = &update.priority {
        query = query.bind(priority);
    }
    if let Some(due_date) = &update.due_date {
        query = query.bind(due_date);
    }
    if let Some(assigned_to) = update.assigned_to {
        query = query.bind(assigned_to);
    }
    query = query.bind(task_uuid);

    let updated = query.fetch_one(&**pool).await?;

    Ok(HttpResponse::Ok().json(updated))
}

/// Deletes a task. Only the creator or an admin may delete it.
#[delete("/{id}")]
pub async fn delete_task(
    pool: web::Data<PgPool>,
    task_id: web::Path<String>,
    user: AuthenticatedUser,
) -> Result<impl Responder, AppError> {
    let task_uuid = parse_task_id(&task_id)?;

    let creator = sqlx::query_scalar::<_, i32>("SELECT user_id FROM tasks WHERE id = $1")
        .bind(task_uuid)
        .fetch_optional(&**pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Task not found".into()))?;

    if user.role() != Role::Admin && user.id() != creator {
        return Err(AppError::Forbidden("Not allowed to delete this task".into()));
    }

    sqlx::query("DELETE FROM tasks WHERE id = $1")
        .bind(task_uuid)
        .execute(&**pool)
        .await?;

    Ok(HttpResponse::NoContent().finish())
}

/// Serves a stored attachment of a task.
///
/// Only names recorded in the task's attachment metadata are served; the
/// request never reaches the filesystem with a caller-supplied path.
#[get("/{id}/documents/{stored_name}")]
pub async fn download_document(
    pool: web::Data<PgPool>,
    path: web::Path<(String, String)>,
    _user: AuthenticatedUser,
) -> Result<NamedFile, AppError> {
    let (task_id, stored_name) = path.into_inner();
    let task_id = parse_task_id(&task_id)?;

    let attachments =
        sqlx::query_scalar::<_, Json<Vec<Attachment>>>("SELECT attachments FROM tasks WHERE id = $1")
            .bind(task_id)
            .fetch_optional(&**pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Task not found".into()))?;

    let attachment = attachments
        .0
        .into_iter()
        .find(|attachment| attachment.stored_name == stored_name)
        .ok_or_else(|| AppError::NotFound("Document not found".into()))?;

    NamedFile::open_async(&attachment.path).await.map_err(|e| {
        AppError::InternalServerError(format!(
            "Failed to open stored document {}: {}",
            attachment.stored_name, e
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sort(keys: &[(&str, SortDirection)]) -> Vec<(String, SortDirection)> {
        keys.iter().map(|(f, d)| (f.to_string(), *d)).collect()
    }

    #[test]
    fn test_order_by_clause_maps_directions() {
        let clause = order_by_clause(&sort(&[
            ("due_date", SortDirection::Desc),
            ("status", SortDirection::Asc),
        ]));
        assert_eq!(clause, "due_date DESC, status ASC");
    }

    #[test]
    fn test_order_by_clause_drops_unknown_fields() {
        // A field outside the whitelist never reaches the statement.
        let clause = order_by_clause(&sort(&[
            ("password_hash; DROP TABLE users", SortDirection::Asc),
            ("priority", SortDirection::Desc),
        ]));
        assert_eq!(clause, "priority DESC");
    }

    #[test]
    fn test_order_by_clause_falls_back_to_default() {
        let clause = order_by_clause(&sort(&[("bogus", SortDirection::Asc)]));
        assert_eq!(clause, "due_date DESC");

        let clause = order_by_clause(&[]);
        assert_eq!(clause, "due_date DESC");
    }

    #[test]
    fn test_parse_task_id() {
        let id = Uuid::new_v4();
        assert_eq!(parse_task_id(&id.to_string()).unwrap(), id);

        match parse_task_id("not-a-uuid") {
            Err(AppError::BadRequest(msg)) => assert!(msg.contains("Invalid task ID")),
            other => panic!("Expected BadRequest, got {:?}", other),
        }
    }
}
