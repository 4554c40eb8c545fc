use chrono::Utc;

use crate::controller::BaseError;
use crate::database::{get_connection, DbResult};
use crate::{db_entity, db_run};

db_entity! {
    #[derive(Queryable, Selectable, Identifiable)]
    #[diesel(table_name = model_with_providers)]
    pub struct ModelWithProvider {
        pub id: i64,
        pub model_id: i64,
        pub provider_id: i64,
        pub provider_model: String,
        pub weight: i32,
        pub tool_call: Option<bool>,
        pub structured_output: Option<bool>,
        pub image: Option<bool>,
        pub created_at: i64,
        pub updated_at: i64,
        pub deleted_at: Option<i64>,
    }

    #[derive(Insertable)]
    #[diesel(table_name = model_with_providers)]
    pub struct NewModelWithProvider {
        pub model_id: i64,
        pub provider_id: i64,
        pub provider_model: String,
        pub weight: i32,
        pub tool_call: Option<bool>,
        pub structured_output: Option<bool>,
        pub image: Option<bool>,
        pub created_at: i64,
        pub updated_at: i64,
    }

    #[derive(AsChangeset)]
    #[diesel(table_name = model_with_providers)]
    pub struct UpdateModelWithProviderData {
        pub provider_model: Option<String>,
        pub weight: Option<i32>,
        pub tool_call: Option<Option<bool>>,
        pub structured_output: Option<Option<bool>>,
        pub image: Option<Option<bool>>,
    }
}

impl ModelWithProvider {
    pub fn create(new_mapping: &NewModelWithProvider) -> DbResult<ModelWithProvider> {
        let conn = &mut get_connection();
        db_run!(conn, {
            let row = diesel::insert_into(model_with_providers::table)
                .values(NewModelWithProviderRow::from_domain(new_mapping))
                .returning(ModelWithProviderRow::as_returning())
                .get_result::<ModelWithProviderRow>(conn)
                .map_err(|e| {
                    BaseError::DatabaseFatal(Some(format!("failed to insert mapping: {}", e)))
                })?;
            Ok(row.into_domain())
        })
    }

    pub fn update(id: i64, update_data: &UpdateModelWithProviderData) -> DbResult<ModelWithProvider> {
        let conn = &mut get_connection();
        let now = Utc::now().timestamp_millis();
        db_run!(conn, {
            let row = diesel::update(model_with_providers::table.find(id))
                .set((
                    UpdateModelWithProviderDataRow::from_domain(update_data),
                    model_with_providers::dsl::updated_at.eq(now),
                ))
                .returning(ModelWithProviderRow::as_returning())
                .get_result::<ModelWithProviderRow>(conn)
                .map_err(|e| {
                    BaseError::DatabaseFatal(Some(format!("failed to update mapping {}: {}", id, e)))
                })?;
            Ok(row.into_domain())
        })
    }

    pub fn delete(id: i64) -> DbResult<usize> {
        let conn = &mut get_connection();
        let now = Utc::now().timestamp_millis();
        db_run!(conn, {
            diesel::update(model_with_providers::table.find(id))
                .set((
                    model_with_providers::dsl::deleted_at.eq(now),
                    model_with_providers::dsl::updated_at.eq(now),
                ))
                .execute(conn)
                .map_err(|e| {
                    BaseError::DatabaseFatal(Some(format!("failed to delete mapping {}: {}", id, e)))
                })
        })
    }

    pub fn list_all() -> DbResult<Vec<ModelWithProvider>> {
        let conn = &mut get_connection();
        db_run!(conn, {
            let rows = model_with_providers::table
                .filter(model_with_providers::dsl::deleted_at.is_null())
                .order(model_with_providers::dsl::created_at.desc())
                .select(ModelWithProviderRow::as_select())
                .load::<ModelWithProviderRow>(conn)
                .map_err(|e| {
                    BaseError::DatabaseFatal(Some(format!("failed to list mappings: {}", e)))
                })?;
            Ok(rows.into_iter().map(|r| r.into_domain()).collect())
        })
    }

    /// All live bindings for one logical model. The dispatch pool is built
    /// from this snapshot.
    pub fn find_by_model_id(model_id: i64) -> DbResult<Vec<ModelWithProvider>> {
        let conn = &mut get_connection();
        db_run!(conn, {
            let rows = model_with_providers::table
                .filter(
                    model_with_providers::dsl::model_id
                        .eq(model_id)
                        .and(model_with_providers::dsl::deleted_at.is_null()),
                )
                .select(ModelWithProviderRow::as_select())
                .load::<ModelWithProviderRow>(conn)
                .map_err(|e| {
                    BaseError::DatabaseFatal(Some(format!(
                        "failed to load mappings for model {}: {}",
                        model_id, e
                    )))
                })?;
            Ok(rows.into_iter().map(|r| r.into_domain()).collect())
        })
    }
}
