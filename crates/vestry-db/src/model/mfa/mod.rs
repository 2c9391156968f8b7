use chrono::{DateTime, Utc};
use diesel::{pg::Pg, prelude::*};

use crate::db::schema;

/// Per-user TOTP enrollment state.
///
/// `secret` is unpadded base32 and empty until first provisioned.
#[derive(Debug, Clone, PartialEq, Eq, Identifiable, Queryable, Selectable)]
#[diesel(table_name = schema::user_mfa)]
#[diesel(check_for_backend(Pg))]
pub struct UserMfa {
    pub id: uuid::Uuid,
    pub user_id: uuid::Uuid,
    pub username: String,
    pub secret: String,
    pub is_enrolled: bool,
    pub enrolled_at: Option<DateTime<Utc>>,
    pub last_verified_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserMfa {
    #[must_use]
    pub fn has_secret(&self) -> bool {
        !self.secret.is_empty()
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = schema::user_mfa)]
pub struct NewUserMfa<'a> {
    pub user_id: uuid::Uuid,
    pub username: &'a str,
}
