use chrono::Utc;

use crate::controller::BaseError;
use crate::database::{get_connection, DbResult};
use crate::{db_entity, db_run};

db_entity! {
    #[derive(Queryable, Selectable, Identifiable)]
    #[diesel(table_name = models)]
    pub struct Model {
        pub id: i64,
        pub name: String,
        pub description: Option<String>,
        pub max_retry: i32,
        pub timeout_seconds: i32,
        pub created_at: i64,
        pub updated_at: i64,
        pub deleted_at: Option<i64>,
    }

    #[derive(Insertable)]
    #[diesel(table_name = models)]
    pub struct NewModel {
        pub name: String,
        pub description: Option<String>,
        pub max_retry: i32,
        pub timeout_seconds: i32,
        pub created_at: i64,
        pub updated_at: i64,
    }

    #[derive(AsChangeset)]
    #[diesel(table_name = models)]
    pub struct UpdateModelData {
        pub name: Option<String>,
        pub description: Option<Option<String>>,
        pub max_retry: Option<i32>,
        pub timeout_seconds: Option<i32>,
    }
}

impl Model {
    pub fn create(new_model: &NewModel) -> DbResult<Model> {
        let conn = &mut get_connection();
        db_run!(conn, {
            let row = diesel::insert_into(models::table)
                .values(NewModelRow::from_domain(new_model))
                .returning(ModelRow::as_returning())
                .get_result::<ModelRow>(conn)
                .map_err(|e| {
                    BaseError::DatabaseFatal(Some(format!("failed to insert model: {}", e)))
                })?;
            Ok(row.into_domain())
        })
    }

    pub fn update(id: i64, update_data: &UpdateModelData) -> DbResult<Model> {
        let conn = &mut get_connection();
        let now = Utc::now().timestamp_millis();
        db_run!(conn, {
            let row = diesel::update(models::table.find(id))
                .set((
                    UpdateModelDataRow::from_domain(update_data),
                    models::dsl::updated_at.eq(now),
                ))
                .returning(ModelRow::as_returning())
                .get_result::<ModelRow>(conn)
                .map_err(|e| {
                    BaseError::DatabaseFatal(Some(format!("failed to update model {}: {}", id, e)))
                })?;
            Ok(row.into_domain())
        })
    }

    pub fn delete(id: i64) -> DbResult<usize> {
        let conn = &mut get_connection();
        let now = Utc::now().timestamp_millis();
        db_run!(conn, {
            diesel::update(models::table.find(id))
                .set((
                    models::dsl::deleted_at.eq(now),
                    models::dsl::updated_at.eq(now),
                ))
                .execute(conn)
                .map_err(|e| {
                    BaseError::DatabaseFatal(Some(format!("failed to delete model {}: {}", id, e)))
                })
        })
    }

    pub fn get_by_id(id: i64) -> DbResult<Model> {
        let conn = &mut get_connection();
        db_run!(conn, {
            let row = models::table
                .filter(models::dsl::id.eq(id).and(models::dsl::deleted_at.is_null()))
                .select(ModelRow::as_select())
                .first::<ModelRow>(conn)
                .map_err(|e| {
                    if matches!(e, diesel::result::Error::NotFound) {
                        BaseError::NotFound(Some(format!("model {} not found", id)))
                    } else {
                        BaseError::DatabaseFatal(Some(format!("error fetching model {}: {}", id, e)))
                    }
                })?;
            Ok(row.into_domain())
        })
    }

    pub fn list_all() -> DbResult<Vec<Model>> {
        let conn = &mut get_connection();
        db_run!(conn, {
            let rows = models::table
                .filter(models::dsl::deleted_at.is_null())
                .order(models::dsl::created_at.desc())
                .select(ModelRow::as_select())
                .load::<ModelRow>(conn)
                .map_err(|e| BaseError::DatabaseFatal(Some(format!("failed to list models: {}", e))))?;
            Ok(rows.into_iter().map(|r| r.into_domain()).collect())
        })
    }

    /// Looks up a live model by its client-facing name.
    pub fn find_by_name(name: &str) -> DbResult<Option<Model>> {
        let conn = &mut get_connection();
        db_run!(conn, {
            let row = models::table
                .filter(models::dsl::name.eq(name).and(models::dsl::deleted_at.is_null()))
                .select(ModelRow::as_select())
                .first::<ModelRow>(conn)
                .optional()
                .map_err(|e| {
                    BaseError::DatabaseFatal(Some(format!("error fetching model '{}': {}", name, e)))
                })?;
            Ok(row.map(|r| r.into_domain()))
        })
    }
}
