use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

/// Fixed at account creation. There is no operation that changes it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Researcher,
    Participant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Researcher => "researcher",
            Self::Participant => "participant",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "admin" => Some(Self::Admin),
            "researcher" => Some(Self::Researcher),
            "participant" => Some(Self::Participant),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUserInput {
    pub username: String,
    pub email: String,
    pub role: Role,
}

/// A user together with the profile its role implies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    #[serde(flatten)]
    pub user: User,
    pub researcher_id: Option<Uuid>,
    pub participant_id: Option<Uuid>,
}

/// The authenticated caller of a core operation.
///
/// Built from an [`Account`] handed over by the identity provider; the core
/// trusts the role and the profile link it carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Principal {
    pub user_id: Uuid,
    pub role: Role,
    pub researcher_id: Option<Uuid>,
    pub participant_id: Option<Uuid>,
}

impl Principal {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// The caller's researcher profile, or `Forbidden` for any other role.
    pub fn researcher(&self) -> CoreResult<Uuid> {
        match (self.role, self.researcher_id) {
            (Role::Researcher, Some(id)) => Ok(id),
            _ => Err(CoreError::forbidden("only researchers may do this")),
        }
    }

    /// The caller's participant profile, or `Forbidden` for any other role.
    pub fn participant(&self) -> CoreResult<Uuid> {
        match (self.role, self.participant_id) {
            (Role::Participant, Some(id)) => Ok(id),
            _ => Err(CoreError::forbidden("only participants may do this")),
        }
    }
}

impl From<&Account> for Principal {
    fn from(account: &Account) -> Self {
        Self {
            user_id: account.user.id,
            role: account.user.role,
            researcher_id: account.researcher_id,
            participant_id: account.participant_id,
        }
    }
}
