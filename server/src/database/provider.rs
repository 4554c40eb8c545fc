use chrono::Utc;

use crate::controller::BaseError;
use crate::database::{get_connection, DbResult};
use crate::schema::enum_def::ProviderType;
use crate::{db_entity, db_run};

db_entity! {
    #[derive(Queryable, Selectable, Identifiable)]
    #[diesel(table_name = providers)]
    pub struct Provider {
        pub id: i64,
        pub name: String,
        pub provider_type: ProviderType,
        pub config: String,
        pub created_at: i64,
        pub updated_at: i64,
        pub deleted_at: Option<i64>,
    }

    #[derive(Insertable)]
    #[diesel(table_name = providers)]
    pub struct NewProvider {
        pub name: String,
        pub provider_type: ProviderType,
        pub config: String,
        pub created_at: i64,
        pub updated_at: i64,
    }

    #[derive(AsChangeset)]
    #[diesel(table_name = providers)]
    pub struct UpdateProviderData {
        pub name: Option<String>,
        pub provider_type: Option<ProviderType>,
        pub config: Option<String>,
    }
}

impl Provider {
    pub fn create(new_provider: &NewProvider) -> DbResult<Provider> {
        let conn = &mut get_connection();
        db_run!(conn, {
            let row = diesel::insert_into(providers::table)
                .values(NewProviderRow::from_domain(new_provider))
                .returning(ProviderRow::as_returning())
                .get_result::<ProviderRow>(conn)
                .map_err(|e| {
                    BaseError::DatabaseFatal(Some(format!("failed to insert provider: {}", e)))
                })?;
            Ok(row.into_domain())
        })
    }

    pub fn update(id: i64, update_data: &UpdateProviderData) -> DbResult<Provider> {
        let conn = &mut get_connection();
        let now = Utc::now().timestamp_millis();
        db_run!(conn, {
            let row = diesel::update(providers::table.find(id))
                .set((
                    UpdateProviderDataRow::from_domain(update_data),
                    providers::dsl::updated_at.eq(now),
                ))
                .returning(ProviderRow::as_returning())
                .get_result::<ProviderRow>(conn)
                .map_err(|e| {
                    BaseError::DatabaseFatal(Some(format!("failed to update provider {}: {}", id, e)))
                })?;
            Ok(row.into_domain())
        })
    }

    /// Soft delete: live queries filter on `deleted_at IS NULL`.
    pub fn delete(id: i64) -> DbResult<usize> {
        let conn = &mut get_connection();
        let now = Utc::now().timestamp_millis();
        db_run!(conn, {
            diesel::update(providers::table.find(id))
                .set((
                    providers::dsl::deleted_at.eq(now),
                    providers::dsl::updated_at.eq(now),
                ))
                .execute(conn)
                .map_err(|e| {
                    BaseError::DatabaseFatal(Some(format!("failed to delete provider {}: {}", id, e)))
                })
        })
    }

    pub fn get_by_id(id: i64) -> DbResult<Provider> {
        let conn = &mut get_connection();
        db_run!(conn, {
            let row = providers::table
                .filter(providers::dsl::id.eq(id).and(providers::dsl::deleted_at.is_null()))
                .select(ProviderRow::as_select())
                .first::<ProviderRow>(conn)
                .map_err(|e| {
                    if matches!(e, diesel::result::Error::NotFound) {
                        BaseError::NotFound(Some(format!("provider {} not found", id)))
                    } else {
                        BaseError::DatabaseFatal(Some(format!("error fetching provider {}: {}", id, e)))
                    }
                })?;
            Ok(row.into_domain())
        })
    }

    pub fn list_all() -> DbResult<Vec<Provider>> {
        let conn = &mut get_connection();
        db_run!(conn, {
            let rows = providers::table
                .filter(providers::dsl::deleted_at.is_null())
                .order(providers::dsl::created_at.desc())
                .select(ProviderRow::as_select())
                .load::<ProviderRow>(conn)
                .map_err(|e| {
                    BaseError::DatabaseFatal(Some(format!("failed to list providers: {}", e)))
                })?;
            Ok(rows.into_iter().map(|r| r.into_domain()).collect())
        })
    }

    /// Live providers among `ids` speaking the given dialect. This is the
    /// pool resolver's provider lookup.
    pub fn find_by_ids_and_type(ids: &[i64], provider_type: ProviderType) -> DbResult<Vec<Provider>> {
        let conn = &mut get_connection();
        db_run!(conn, {
            let rows = providers::table
                .filter(
                    providers::dsl::id
                        .eq_any(ids.iter().copied())
                        .and(providers::dsl::provider_type.eq(provider_type))
                        .and(providers::dsl::deleted_at.is_null()),
                )
                .select(ProviderRow::as_select())
                .load::<ProviderRow>(conn)
                .map_err(|e| {
                    BaseError::DatabaseFatal(Some(format!("failed to load providers by type: {}", e)))
                })?;
            Ok(rows.into_iter().map(|r| r.into_domain()).collect())
        })
    }
}
