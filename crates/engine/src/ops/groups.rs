use sea_orm::{ActiveValue, QueryFilter, QueryOrder, TransactionTrait, prelude::*};

use crate::{EngineError, ResultEngine, group_memberships, groups};

use super::{Engine, access::MembershipRole, normalize_required_name, with_tx};

const DEFAULT_GROUP_KIND: &str = "family";

impl Engine {
    /// Creates an empty group. `kind` defaults to `family`.
    pub async fn create_group(&self, name: &str, kind: Option<&str>) -> ResultEngine<groups::Model> {
        let name = normalize_required_name(name, "group")?;
        let kind = kind
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .unwrap_or(DEFAULT_GROUP_KIND)
            .to_string();

        let group = groups::ActiveModel {
            id: ActiveValue::NotSet,
            name: ActiveValue::Set(name),
            kind: ActiveValue::Set(kind),
        }
        .insert(&self.database)
        .await?;

        tracing::info!(group_id = group.id, name = %group.name, "group created");
        Ok(group)
    }

    /// Adds `user_id` to `group_id` or changes their role.
    ///
    /// The member's cached pages are dropped since what they may see changed.
    pub async fn upsert_group_member(
        &self,
        group_id: i64,
        user_id: i64,
        role: &str,
    ) -> ResultEngine<()> {
        let role = MembershipRole::try_from(role.trim())?;
        with_tx!(self, |db_tx| {
            self.require_group_exists(&db_tx, group_id).await?;
            self.require_user_exists(&db_tx, user_id).await?;

            let active = group_memberships::ActiveModel {
                group_id: ActiveValue::Set(group_id),
                user_id: ActiveValue::Set(user_id),
                role: ActiveValue::Set(role.as_str().to_string()),
            };

            // Upsert: insert if missing, otherwise update role.
            match self.group_membership_role(&db_tx, group_id, user_id).await? {
                Some(_) => {
                    active.update(&db_tx).await?;
                }
                None => {
                    active.insert(&db_tx).await?;
                }
            }
            Ok::<(), EngineError>(())
        })?;

        self.invalidate_viewer(user_id);
        tracing::info!(group_id, user_id, role = role.as_str(), "group member upserted");
        Ok(())
    }

    /// Removes `user_id` from `group_id`.
    pub async fn remove_group_member(&self, group_id: i64, user_id: i64) -> ResultEngine<()> {
        let result = group_memberships::Entity::delete_by_id((group_id, user_id))
            .exec(&self.database)
            .await?;
        if result.rows_affected == 0 {
            return Err(EngineError::KeyNotFound(
                "group member not exists".to_string(),
            ));
        }

        self.invalidate_viewer(user_id);
        tracing::info!(group_id, user_id, "group member removed");
        Ok(())
    }

    /// Lists `(user_id, role)` of every member of `group_id`.
    pub async fn list_group_members(&self, group_id: i64) -> ResultEngine<Vec<(i64, String)>> {
        self.require_group_exists(&self.database, group_id).await?;
        let rows = group_memberships::Entity::find()
            .filter(group_memberships::Column::GroupId.eq(group_id))
            .order_by_asc(group_memberships::Column::UserId)
            .all(&self.database)
            .await?;
        Ok(rows.into_iter().map(|m| (m.user_id, m.role)).collect())
    }
}
