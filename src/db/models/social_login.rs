use crate::db::schema::social_logins;
use chrono::{DateTime, Utc};
use diesel::{Insertable, Queryable, Selectable};
use uuid::Uuid;

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = social_logins)]
pub struct NewSocialLogin {
    pub user_id: Uuid,
    pub provider: String,
    pub provider_key: String,
    pub provider_data: Option<String>,
}

/// Links one external OAuth identity to one local user.
/// (provider, provider_key) is unique across all users.
#[derive(Queryable, Selectable, Debug, Clone)]
#[diesel(table_name = social_logins)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct SocialLogin {
    pub id: Uuid,
    pub user_id: Uuid,
    pub provider: String,
    pub provider_key: String,
    pub provider_data: Option<String>,
    pub created_at: DateTime<Utc>,
}
