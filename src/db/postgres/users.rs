use diesel::prelude::*;
use uuid::Uuid;

use super::unit_of_work::PgUnitOfWork;
use crate::db::error::StoreError;
use crate::db::models::social_login::{NewSocialLogin, SocialLogin};
use crate::db::models::user::{NewUser, UpdateUser, User};
use crate::db::schema::{refresh_tokens, social_logins, users};
use crate::db::store::UserRepository;

impl UserRepository for PgUnitOfWork {
    fn create(&mut self, new_user: &NewUser) -> Result<User, StoreError> {
        diesel::insert_into(users::table)
            .values(new_user)
            .get_result::<User>(self.conn())
            .map_err(Into::into)
    }

    fn find_by_id(&mut self, id: Uuid) -> Result<Option<User>, StoreError> {
        users::table
            .filter(users::id.eq(id))
            .first::<User>(self.conn())
            .optional()
            .map_err(Into::into)
    }

    fn find_by_email(&mut self, email: &str) -> Result<Option<User>, StoreError> {
        users::table
            .filter(users::email.eq(email))
            .first::<User>(self.conn())
            .optional()
            .map_err(Into::into)
    }

    fn is_username_taken(&mut self, username: &str) -> Result<bool, StoreError> {
        diesel::select(diesel::dsl::exists(
            users::table.filter(users::username.eq(username)),
        ))
        .get_result::<bool>(self.conn())
        .map_err(Into::into)
    }

    fn find_by_social_identity(
        &mut self,
        provider: &str,
        provider_key: &str,
    ) -> Result<Option<User>, StoreError> {
        social_logins::table
            .inner_join(users::table)
            .filter(social_logins::provider.eq(provider))
            .filter(social_logins::provider_key.eq(provider_key))
            .select(User::as_select())
            .first::<User>(self.conn())
            .optional()
            .map_err(Into::into)
    }

    fn link_social_identity(&mut self, link: &NewSocialLogin) -> Result<SocialLogin, StoreError> {
        diesel::insert_into(social_logins::table)
            .values(link)
            .get_result::<SocialLogin>(self.conn())
            .map_err(Into::into)
    }

    fn social_identities(&mut self, user_id: Uuid) -> Result<Vec<SocialLogin>, StoreError> {
        social_logins::table
            .filter(social_logins::user_id.eq(user_id))
            .order(social_logins::created_at.asc())
            .load::<SocialLogin>(self.conn())
            .map_err(Into::into)
    }

    fn update(&mut self, id: Uuid, changes: &UpdateUser) -> Result<User, StoreError> {
        diesel::update(users::table.filter(users::id.eq(id)))
            .set(changes)
            .get_result::<User>(self.conn())
            .map_err(Into::into)
    }

    fn update_password(&mut self, id: Uuid, password_hash: &str) -> Result<(), StoreError> {
        diesel::update(users::table.filter(users::id.eq(id)))
            .set(users::password_hash.eq(password_hash))
            .execute(self.conn())?;
        Ok(())
    }

    fn list(&mut self, page: i64, per_page: i64) -> Result<(Vec<User>, i64), StoreError> {
        let page = page.max(1);
        let per_page = if per_page < 1 { 10 } else { per_page };

        let total = users::table.count().get_result::<i64>(self.conn())?;
        let items = users::table
            .order((users::created_at.asc(), users::id.asc()))
            .offset((page - 1) * per_page)
            .limit(per_page)
            .load::<User>(self.conn())?;
        Ok((items, total))
    }

    fn delete(&mut self, id: Uuid) -> Result<(), StoreError> {
        // Cascade inside the unit's transaction, independent of whether the
        // schema declares ON DELETE CASCADE.
        diesel::delete(refresh_tokens::table.filter(refresh_tokens::user_id.eq(id)))
            .execute(self.conn())?;
        diesel::delete(social_logins::table.filter(social_logins::user_id.eq(id)))
            .execute(self.conn())?;
        let deleted =
            diesel::delete(users::table.filter(users::id.eq(id))).execute(self.conn())?;
        if deleted == 0 {
            return Err(StoreError::NotFound(format!("user {id}")));
        }
        Ok(())
    }
}
