use sea_orm::{ActiveValue, QueryFilter, TransactionTrait, prelude::*};

use crate::{EngineError, ResultEngine, categories, subcategories};

use super::{Engine, normalize_required_name, with_tx};

impl Engine {
    /// Creates a category. Names are unique.
    pub async fn create_category(&self, name: &str) -> ResultEngine<categories::Model> {
        let name = normalize_required_name(name, "category")?;
        let category = with_tx!(self, |db_tx| {
            let existing = categories::Entity::find()
                .filter(categories::Column::Name.eq(name.clone()))
                .one(&db_tx)
                .await?;
            if existing.is_some() {
                return Err(EngineError::ExistingKey(name));
            }

            categories::ActiveModel {
                id: ActiveValue::NotSet,
                name: ActiveValue::Set(name.clone()),
            }
            .insert(&db_tx)
            .await
            .map_err(EngineError::from)
        })?;

        tracing::info!(category_id = category.id, name = %category.name, "category created");
        Ok(category)
    }

    /// Creates a subcategory of `category_id`. Names are unique per category.
    pub async fn create_subcategory(
        &self,
        category_id: i64,
        name: &str,
    ) -> ResultEngine<subcategories::Model> {
        let name = normalize_required_name(name, "subcategory")?;
        let subcategory = with_tx!(self, |db_tx| {
            self.require_category(&db_tx, category_id).await?;
            let existing = subcategories::Entity::find()
                .filter(subcategories::Column::CategoryId.eq(category_id))
                .filter(subcategories::Column::Name.eq(name.clone()))
                .one(&db_tx)
                .await?;
            if existing.is_some() {
                return Err(EngineError::ExistingKey(name));
            }

            subcategories::ActiveModel {
                id: ActiveValue::NotSet,
                category_id: ActiveValue::Set(category_id),
                name: ActiveValue::Set(name.clone()),
            }
            .insert(&db_tx)
            .await
            .map_err(EngineError::from)
        })?;

        tracing::info!(
            category_id,
            subcategory_id = subcategory.id,
            name = %subcategory.name,
            "subcategory created"
        );
        Ok(subcategory)
    }
}
