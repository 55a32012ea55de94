use crate::db::schema::refresh_tokens;
use chrono::{DateTime, Utc};
use diesel::{Insertable, Queryable, Selectable};
use uuid::Uuid;

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = refresh_tokens)]
pub struct NewRefreshToken {
    pub user_id: Uuid,
    pub secret: String,
    pub expires_at: DateTime<Utc>,
    pub created_by_ip: Option<String>,
}

/// Session credential. The secret is immutable once issued; the row only
/// ever mutates to record revocation (`revoked*`, `replaced_by_secret`).
#[derive(Queryable, Selectable, Debug, Clone)]
#[diesel(table_name = refresh_tokens)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct RefreshToken {
    pub id: Uuid,
    pub user_id: Uuid,
    pub secret: String,
    pub expires_at: DateTime<Utc>,
    pub revoked: bool,
    pub created_at: DateTime<Utc>,
    pub created_by_ip: Option<String>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub revoked_by_ip: Option<String>,
    /// Secret of the token that superseded this one via rotation.
    pub replaced_by_secret: Option<String>,
}

impl RefreshToken {
    /// Active ⇔ not revoked and not yet expired.
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        !self.revoked && now < self.expires_at
    }

    pub fn is_active(&self) -> bool {
        self.is_active_at(Utc::now())
    }
}
