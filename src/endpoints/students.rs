use axum::{
    extract::{Path, Query, State},
    routing::{delete, get},
    Json, Router,
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, QuerySelect, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::middleware::permissions::{StudentsManage, StudentsView};
use crate::middleware::Authorized;
use crate::models::audit_log::{AuditAction, ResourceType};
use crate::models::prelude::*;
use crate::models::{email, role, user, user_role};
use crate::services::activation::STUDENT_ROLE;
use crate::services::{address, hash_password};
use crate::state::AppState;

/// Create admin student management routes
pub fn students_routes(state: AppState) -> Router {
    Router::new()
        .route("/", get(list_students).post(create_student))
        .route("/{user_id}", delete(remove_student))
        .with_state(state)
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ListStudentsParams {
    pub skip: Option<u64>,
    pub limit: Option<u64>,
    pub search: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateStudentRequest {
    pub username: String,
    pub password: String,
    pub email_local_part: String,
}

#[derive(Debug, Serialize)]
pub struct StudentResponse {
    pub id: i64,
    pub username: String,
    pub enabled: bool,
    pub permanent_email: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

// ============================================================================
// Helper Functions
// ============================================================================

async fn find_student_role(state: &AppState) -> Result<Option<role::Model>> {
    Ok(Role::find()
        .filter(role::Column::Name.eq(STUDENT_ROLE))
        .one(&state.db)
        .await?)
}

async fn student_response(state: &AppState, u: user::Model) -> Result<StudentResponse> {
    let permanent_email = Email::find()
        .filter(email::Column::UserId.eq(u.id))
        .filter(email::Column::IsPermanent.eq(true))
        .one(&state.db)
        .await?
        .map(|e| e.address);

    Ok(StudentResponse {
        id: u.id,
        username: u.username,
        enabled: u.enabled,
        permanent_email,
        created_at: u.created_at,
    })
}

// ============================================================================
// Endpoint Handlers
// ============================================================================

/// List users holding the student role (requires students.view permission)
async fn list_students(
    State(state): State<AppState>,
    Query(params): Query<ListStudentsParams>,
    _authorized: Authorized<StudentsView>,
) -> Result<Json<Vec<StudentResponse>>> {
    let skip = params.skip.unwrap_or(0);
    let limit = params.limit.unwrap_or(100).min(500);

    let student_role = match find_student_role(&state).await? {
        Some(r) => r,
        None => return Ok(Json(vec![])),
    };

    let student_ids: Vec<i64> = UserRole::find()
        .filter(user_role::Column::RoleId.eq(student_role.id))
        .all(&state.db)
        .await?
        .into_iter()
        .map(|ur| ur.user_id)
        .collect();

    if student_ids.is_empty() {
        return Ok(Json(vec![]));
    }

    let mut query = User::find()
        .filter(user::Column::Id.is_in(student_ids))
        .order_by_asc(user::Column::Id);

    if let Some(ref search) = params.search {
        query = query.filter(user::Column::Username.contains(search));
    }

    let students = query.offset(skip).limit(limit).all(&state.db).await?;

    let mut responses = Vec::new();
    for u in students {
        responses.push(student_response(&state, u).await?);
    }

    Ok(Json(responses))
}

/// Create a student account with its permanent email in one transaction
/// (requires students.manage permission)
async fn create_student(
    State(state): State<AppState>,
    authorized: Authorized<StudentsManage>,
    Json(data): Json<CreateStudentRequest>,
) -> Result<Json<StudentResponse>> {
    if data.username.len() < 3 || data.username.len() > 32 {
        return Err(AppError::BadRequest(
            "Username must be 3-32 characters".to_string(),
        ));
    }
    if data.password.len() < 8 {
        return Err(AppError::BadRequest(
            "Password must be at least 8 characters".to_string(),
        ));
    }

    let existing = User::find()
        .filter(user::Column::Username.eq(&data.username))
        .one(&state.db)
        .await?;
    if existing.is_some() {
        return Err(AppError::Conflict("Username already exists".to_string()));
    }

    address::validate_local_part(&data.email_local_part)?;
    let full_address = address::compose_address(&data.email_local_part);

    let taken = Email::find()
        .filter(email::Column::Address.eq(&full_address))
        .one(&state.db)
        .await?
        .is_some();
    if taken {
        return Err(AppError::Conflict(
            "Email address already exists".to_string(),
        ));
    }

    let hashed = hash_password(&data.password)?;
    let now = Utc::now();

    let txn = state.db.begin().await?;

    let new_user = user::ActiveModel {
        username: Set(data.username),
        password_hash: Set(Some(hashed)),
        enabled: Set(true),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };
    let created_user = new_user.insert(&txn).await?;

    let student_role = match Role::find()
        .filter(role::Column::Name.eq(STUDENT_ROLE))
        .one(&txn)
        .await?
    {
        Some(r) => r,
        None => {
            let new_role = role::ActiveModel {
                name: Set(STUDENT_ROLE.to_string()),
                description: Set(Some("Permanent mailbox holder".to_string())),
                is_system: Set(true),
                created_at: Set(now),
                ..Default::default()
            };
            new_role.insert(&txn).await?
        }
    };

    let assignment = user_role::ActiveModel {
        user_id: Set(created_user.id),
        role_id: Set(student_role.id),
    };
    assignment.insert(&txn).await?;

    let new_email = email::ActiveModel {
        user_id: Set(created_user.id),
        address: Set(full_address),
        is_permanent: Set(true),
        created_at: Set(now),
        expires_at: Set(address::permanent_expiry()),
        ..Default::default()
    };
    new_email.insert(&txn).await?;

    txn.commit().await?;

    state
        .audit
        .log_success(
            AuditAction::StudentCreated,
            ResourceType::User,
            Some(created_user.id.to_string()),
            Some(authorized.user()),
            Some(serde_json::json!({ "username": created_user.username })),
        )
        .await;

    let response = student_response(&state, created_user).await?;
    Ok(Json(response))
}

/// Remove the student role from a user (requires students.manage permission).
/// The account and its emails stay; only the role assignment goes.
async fn remove_student(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    authorized: Authorized<StudentsManage>,
) -> Result<Json<serde_json::Value>> {
    let student_role = find_student_role(&state)
        .await?
        .ok_or_else(|| AppError::NotFound("Student role not found".to_string()))?;

    let assignment = UserRole::find()
        .filter(user_role::Column::UserId.eq(user_id))
        .filter(user_role::Column::RoleId.eq(student_role.id))
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("User is not a student".to_string()))?;

    UserRole::delete_many()
        .filter(user_role::Column::UserId.eq(assignment.user_id))
        .filter(user_role::Column::RoleId.eq(assignment.role_id))
        .exec(&state.db)
        .await?;

    state
        .audit
        .log_success(
            AuditAction::StudentRemoved,
            ResourceType::User,
            Some(user_id.to_string()),
            Some(authorized.user()),
            None,
        )
        .await;

    Ok(Json(serde_json::json!({"message": "Student role removed"})))
}
