//! Activation-code redemption.
//!
//! Redeeming a code provisions a new student account and its permanent email
//! in a single all-or-nothing transaction.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set, TransactionTrait,
};

use crate::error::{AppError, Result};
use crate::models::activation_code::CodeStatus;
use crate::models::prelude::*;
use crate::models::{activation_code, email, role, user, user_role};
use crate::services::address;
use crate::services::security::hash_password;
use crate::state::DbConn;

pub const STUDENT_ROLE: &str = "student";

/// Outcome of a successful redemption
pub struct Redemption {
    pub user: user::Model,
    pub email: email::Model,
}

/// Redeem an activation code, creating the user, the student role assignment
/// and a permanent email atomically. The code is marked `used` with the new
/// user's id inside the same transaction.
pub async fn redeem_code(
    db: &DbConn,
    code: &str,
    username: &str,
    password: &str,
    email_local_part: &str,
) -> Result<Redemption> {
    let now = Utc::now();

    // Resolve and gate the code before opening the transaction. An expiry
    // discovered here is persisted even though the redemption fails.
    let code_row = ActivationCode::find()
        .filter(activation_code::Column::Code.eq(code))
        .one(db)
        .await?
        .ok_or_else(|| AppError::BadRequest("Invalid activation code".to_string()))?;

    let status = CodeStatus::parse(&code_row.status)
        .ok_or_else(|| AppError::Internal(format!("Corrupt code status: {}", code_row.status)))?;

    match status {
        CodeStatus::Unused => {
            if let Some(expires_at) = code_row.expires_at {
                if expires_at <= now {
                    let mut stale: activation_code::ActiveModel = code_row.into();
                    stale.status = Set(CodeStatus::Expired.as_str().to_string());
                    stale.update(db).await?;
                    return Err(AppError::BadRequest(
                        "Activation code has expired".to_string(),
                    ));
                }
            }
        }
        CodeStatus::Used => {
            return Err(AppError::BadRequest(
                "Activation code has already been used".to_string(),
            ));
        }
        CodeStatus::Expired => {
            return Err(AppError::BadRequest(
                "Activation code has expired".to_string(),
            ));
        }
        CodeStatus::Disabled => {
            return Err(AppError::BadRequest(
                "Activation code has been disabled".to_string(),
            ));
        }
    }

    // Uniqueness checks
    let username_taken = User::find()
        .filter(user::Column::Username.eq(username))
        .one(db)
        .await?
        .is_some();
    if username_taken {
        return Err(AppError::Conflict("Username already exists".to_string()));
    }

    address::validate_local_part(email_local_part)?;
    let full_address = address::compose_address(email_local_part);

    let address_taken = Email::find()
        .filter(email::Column::Address.eq(&full_address))
        .one(db)
        .await?
        .is_some();
    if address_taken {
        return Err(AppError::Conflict(
            "Email address already exists".to_string(),
        ));
    }

    let password_hash = hash_password(password)?;

    // All-or-nothing: user, role assignment, permanent email, code consumption.
    // A concurrent redemption of the same code or address fails on the unique
    // constraints and rolls the whole transaction back.
    let txn = db.begin().await?;

    let new_user = user::ActiveModel {
        username: Set(username.to_string()),
        password_hash: Set(Some(password_hash)),
        enabled: Set(true),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };
    let created_user = new_user.insert(&txn).await?;

    // The student role is seeded, but tolerate a pruned roles table
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
    let created_email = new_email.insert(&txn).await?;

    let mut consumed: activation_code::ActiveModel = ActivationCode::find_by_id(code_row.id)
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::Internal("Activation code vanished".to_string()))?
        .into();
    consumed.status = Set(CodeStatus::Used.as_str().to_string());
    consumed.used_by_id = Set(Some(created_user.id));
    consumed.used_at = Set(Some(now));
    consumed.update(&txn).await?;

    txn.commit().await?;

    tracing::info!(
        user_id = created_user.id,
        username = %created_user.username,
        "Activation code redeemed"
    );

    Ok(Redemption {
        user: created_user,
        email: created_email,
    })
}
