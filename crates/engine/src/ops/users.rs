use sea_orm::{ActiveValue, QueryFilter, TransactionTrait, prelude::*};

use crate::{EngineError, ResultEngine, users};

use super::{Engine, normalize_required_name, with_tx};

impl Engine {
    /// Registers an account. Usernames are unique.
    pub async fn create_user(
        &self,
        username: &str,
        telegram_id: Option<i64>,
    ) -> ResultEngine<users::Model> {
        let username = normalize_required_name(username, "user")?;
        let user = with_tx!(self, |db_tx| {
            let existing = users::Entity::find()
                .filter(users::Column::Username.eq(username.clone()))
                .one(&db_tx)
                .await?;
            if existing.is_some() {
                return Err(EngineError::ExistingKey(username));
            }

            users::ActiveModel {
                id: ActiveValue::NotSet,
                username: ActiveValue::Set(username.clone()),
                telegram_id: ActiveValue::Set(telegram_id),
            }
            .insert(&db_tx)
            .await
            .map_err(EngineError::from)
        })?;

        tracing::info!(user_id = user.id, username = %user.username, "user created");
        Ok(user)
    }

    pub async fn user_by_username(&self, username: &str) -> ResultEngine<users::Model> {
        users::Entity::find()
            .filter(users::Column::Username.eq(username.trim()))
            .one(&self.database)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("user not exists".to_string()))
    }
}
