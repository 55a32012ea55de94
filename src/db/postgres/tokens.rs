use chrono::Utc;
use diesel::prelude::*;
use uuid::Uuid;

use super::unit_of_work::PgUnitOfWork;
use crate::db::error::StoreError;
use crate::db::models::refresh_token::{NewRefreshToken, RefreshToken};
use crate::db::models::user::User;
use crate::db::schema::{refresh_tokens, users};
use crate::db::store::RefreshTokenRepository;

impl RefreshTokenRepository for PgUnitOfWork {
    fn create(&mut self, new_token: &NewRefreshToken) -> Result<RefreshToken, StoreError> {
        diesel::insert_into(refresh_tokens::table)
            .values(new_token)
            .get_result::<RefreshToken>(self.conn())
            .map_err(Into::into)
    }

    fn find_by_secret(&mut self, secret: &str) -> Result<Option<RefreshToken>, StoreError> {
        refresh_tokens::table
            .filter(refresh_tokens::secret.eq(secret))
            .first::<RefreshToken>(self.conn())
            .optional()
            .map_err(Into::into)
    }

    fn find_by_secret_with_user(
        &mut self,
        secret: &str,
    ) -> Result<Option<(RefreshToken, User)>, StoreError> {
        refresh_tokens::table
            .inner_join(users::table)
            .filter(refresh_tokens::secret.eq(secret))
            .select((RefreshToken::as_select(), User::as_select()))
            .first::<(RefreshToken, User)>(self.conn())
            .optional()
            .map_err(Into::into)
    }

    fn active_for_user(&mut self, user_id: Uuid) -> Result<Vec<RefreshToken>, StoreError> {
        refresh_tokens::table
            .filter(refresh_tokens::user_id.eq(user_id))
            .filter(refresh_tokens::revoked.eq(false))
            .filter(refresh_tokens::expires_at.gt(Utc::now()))
            .load::<RefreshToken>(self.conn())
            .map_err(Into::into)
    }

    fn mark_rotated(
        &mut self,
        id: Uuid,
        replaced_by_secret: &str,
        ip: Option<&str>,
    ) -> Result<bool, StoreError> {
        let now = Utc::now();
        // Conditional on the row still being active: of two concurrent
        // rotations of one secret, exactly one UPDATE matches.
        let affected = diesel::update(
            refresh_tokens::table
                .filter(refresh_tokens::id.eq(id))
                .filter(refresh_tokens::revoked.eq(false))
                .filter(refresh_tokens::expires_at.gt(now)),
        )
        .set((
            refresh_tokens::revoked.eq(true),
            refresh_tokens::revoked_at.eq(Some(now)),
            refresh_tokens::revoked_by_ip.eq(ip),
            refresh_tokens::replaced_by_secret.eq(Some(replaced_by_secret)),
        ))
        .execute(self.conn())?;
        Ok(affected > 0)
    }

    fn revoke(&mut self, id: Uuid, ip: Option<&str>) -> Result<bool, StoreError> {
        let now = Utc::now();
        let affected = diesel::update(
            refresh_tokens::table
                .filter(refresh_tokens::id.eq(id))
                .filter(refresh_tokens::revoked.eq(false))
                .filter(refresh_tokens::expires_at.gt(now)),
        )
        .set((
            refresh_tokens::revoked.eq(true),
            refresh_tokens::revoked_at.eq(Some(now)),
            refresh_tokens::revoked_by_ip.eq(ip),
        ))
        .execute(self.conn())?;
        Ok(affected > 0)
    }

    fn revoke_all_for_user(
        &mut self,
        user_id: Uuid,
        ip: Option<&str>,
    ) -> Result<usize, StoreError> {
        let now = Utc::now();
        diesel::update(
            refresh_tokens::table
                .filter(refresh_tokens::user_id.eq(user_id))
                .filter(refresh_tokens::revoked.eq(false))
                .filter(refresh_tokens::expires_at.gt(now)),
        )
        .set((
            refresh_tokens::revoked.eq(true),
            refresh_tokens::revoked_at.eq(Some(now)),
            refresh_tokens::revoked_by_ip.eq(ip),
        ))
        .execute(self.conn())
        .map_err(Into::into)
    }

    fn delete_expired(&mut self) -> Result<usize, StoreError> {
        diesel::delete(refresh_tokens::table.filter(refresh_tokens::expires_at.le(Utc::now())))
            .execute(self.conn())
            .map_err(Into::into)
    }
}
