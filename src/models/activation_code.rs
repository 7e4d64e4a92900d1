use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "activation_codes")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    #[sea_orm(unique)]
    pub code: String,
    /// One of [`CodeStatus`]; stored as its string form.
    pub status: String,
    /// Admin who created the batch. Null after that account is deleted.
    pub created_by_id: Option<i64>,
    /// Redeeming user. Set exactly once, by the redemption transaction.
    pub used_by_id: Option<i64>,
    pub expires_at: Option<DateTimeUtc>,
    pub created_at: DateTimeUtc,
    pub used_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::CreatedById",
        to = "super::user::Column::Id"
    )]
    CreatedBy,
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UsedById",
        to = "super::user::Column::Id"
    )]
    UsedBy,
}

impl ActiveModelBehavior for ActiveModel {}

/// Activation code lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodeStatus {
    Unused,
    Used,
    Expired,
    Disabled,
}

impl CodeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CodeStatus::Unused => "unused",
            CodeStatus::Used => "used",
            CodeStatus::Expired => "expired",
            CodeStatus::Disabled => "disabled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "unused" => Some(CodeStatus::Unused),
            "used" => Some(CodeStatus::Used),
            "expired" => Some(CodeStatus::Expired),
            "disabled" => Some(CodeStatus::Disabled),
            _ => None,
        }
    }

    /// Whether an admin may move a code from `self` to `target`.
    /// A used code only ever becomes disabled; an expired one likewise.
    pub fn can_transition_to(&self, target: CodeStatus) -> bool {
        match self {
            CodeStatus::Unused => matches!(target, CodeStatus::Disabled),
            CodeStatus::Used => matches!(target, CodeStatus::Disabled),
            CodeStatus::Expired => matches!(target, CodeStatus::Disabled),
            CodeStatus::Disabled => false,
        }
    }
}

impl std::fmt::Display for CodeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
