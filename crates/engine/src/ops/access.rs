use sea_orm::{ConnectionTrait, QueryFilter, QuerySelect, prelude::*};

use crate::{
    EngineError, ResultEngine, Scope, Visibility, categories, group_memberships, groups,
    subcategories, users,
};

use super::Engine;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MembershipRole {
    Owner,
    Member,
}

impl MembershipRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Owner => "owner",
            Self::Member => "member",
        }
    }
}

impl TryFrom<&str> for MembershipRole {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "owner" => Ok(Self::Owner),
            "member" => Ok(Self::Member),
            other => Err(EngineError::InvalidRole(format!(
                "invalid membership role: {other}"
            ))),
        }
    }
}

/// Generates a `require_*_exists` check for an entity keyed by `i64`.
macro_rules! impl_require_exists {
    ($require_fn:ident, $entity:path, $err_msg:literal) => {
        pub(super) async fn $require_fn<C: ConnectionTrait>(
            &self,
            db: &C,
            id: i64,
        ) -> ResultEngine<()> {
            let found = <$entity>::find_by_id(id).one(db).await?;
            if found.is_none() {
                return Err(EngineError::KeyNotFound($err_msg.to_string()));
            }
            Ok(())
        }
    };
}

impl Engine {
    impl_require_exists!(require_user_exists, users::Entity, "user not exists");
    impl_require_exists!(require_group_exists, groups::Entity, "group not exists");

    pub(super) async fn require_category<C: ConnectionTrait>(
        &self,
        db: &C,
        category_id: i64,
    ) -> ResultEngine<categories::Model> {
        categories::Entity::find_by_id(category_id)
            .one(db)
            .await?
            .ok_or_else(|| EngineError::InvalidCategory("category not exists".to_string()))
    }

    pub(super) async fn require_subcategory<C: ConnectionTrait>(
        &self,
        db: &C,
        subcategory_id: i64,
    ) -> ResultEngine<subcategories::Model> {
        subcategories::Entity::find_by_id(subcategory_id)
            .one(db)
            .await?
            .ok_or_else(|| EngineError::InvalidCategory("subcategory not exists".to_string()))
    }

    /// Checks the optional category pair of a record and returns the pair to
    /// store. A subcategory alone implies its parent category.
    pub(super) async fn resolve_category_pair<C: ConnectionTrait>(
        &self,
        db: &C,
        category_id: Option<i64>,
        subcategory_id: Option<i64>,
    ) -> ResultEngine<(Option<i64>, Option<i64>)> {
        if let Some(category_id) = category_id {
            self.require_category(db, category_id).await?;
        }
        let Some(subcategory_id) = subcategory_id else {
            return Ok((category_id, None));
        };
        let subcategory = self.require_subcategory(db, subcategory_id).await?;
        match category_id {
            Some(category_id) if category_id != subcategory.category_id => Err(
                EngineError::InvalidCategory(format!(
                    "subcategory {subcategory_id} does not belong to category {category_id}"
                )),
            ),
            _ => Ok((Some(subcategory.category_id), Some(subcategory_id))),
        }
    }

    pub(super) async fn group_membership_role<C: ConnectionTrait>(
        &self,
        db: &C,
        group_id: i64,
        user_id: i64,
    ) -> ResultEngine<Option<MembershipRole>> {
        let row = group_memberships::Entity::find_by_id((group_id, user_id))
            .one(db)
            .await?;
        row.as_ref()
            .map(|m| MembershipRole::try_from(m.role.as_str()))
            .transpose()
    }

    /// Fails with `KeyNotFound` unless `user_id` belongs to `group_id`, so
    /// outsiders cannot probe which groups exist.
    pub(super) async fn require_group_member<C: ConnectionTrait>(
        &self,
        db: &C,
        group_id: i64,
        user_id: i64,
    ) -> ResultEngine<MembershipRole> {
        self.group_membership_role(db, group_id, user_id)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("group not exists".to_string()))
    }

    /// Ids of every group `viewer_id` belongs to.
    pub(super) async fn viewer_group_ids<C: ConnectionTrait>(
        &self,
        db: &C,
        viewer_id: i64,
    ) -> ResultEngine<Vec<i64>> {
        group_memberships::Entity::find()
            .select_only()
            .column(group_memberships::Column::GroupId)
            .filter(group_memberships::Column::UserId.eq(viewer_id))
            .into_tuple::<i64>()
            .all(db)
            .await
            .map_err(Into::into)
    }

    /// Resolves what `viewer_id` may see under `scope`.
    ///
    /// Never fails: when memberships cannot be loaded the viewer is narrowed
    /// to their own records and the result is flagged as degraded.
    pub async fn resolve_visibility(&self, viewer_id: i64, scope: Scope) -> Visibility {
        match self.viewer_group_ids(&self.database, viewer_id).await {
            Ok(group_ids) => Visibility::new(viewer_id, scope, group_ids),
            Err(err) => {
                tracing::warn!(
                    viewer_id,
                    scope = scope.as_str(),
                    error = %err,
                    "group membership lookup failed, narrowing visibility to own records"
                );
                Visibility::degraded(viewer_id, scope)
            }
        }
    }
}
