use diesel::{
    r2d2::{ConnectionManager, Pool, PooledConnection},
    Connection, PgConnection, SqliteConnection,
};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use once_cell::sync::Lazy;
use serde::Serialize;
use std::fs::File;
use std::path::Path;

use crate::config::CONFIG;
use crate::controller::BaseError;

pub mod chat_log;
pub mod model;
pub mod model_provider;
pub mod provider;

pub enum DbPool {
    Postgres(Pool<ConnectionManager<PgConnection>>),
    Sqlite(Pool<ConnectionManager<SqliteConnection>>),
}

pub enum DbConnection {
    Postgres(PooledConnection<ConnectionManager<PgConnection>>),
    Sqlite(PooledConnection<ConnectionManager<SqliteConnection>>),
}

pub fn get_connection() -> DbConnection {
    match &*DB_POOL {
        DbPool::Postgres(pool) => DbConnection::Postgres(pool.get().unwrap()),
        DbPool::Sqlite(pool) => DbConnection::Sqlite(pool.get().unwrap()),
    }
}

impl DbPool {
    pub fn establish() -> Self {
        let db_url = &CONFIG.db_url;
        if db_url.starts_with("postgres") {
            DbPool::Postgres(init_pg_pool(db_url))
        } else {
            DbPool::Sqlite(init_sqlite_pool(db_url))
        }
    }
}

#[path = "../schema/sqlite.rs"]
pub mod _sqlite_schema;

#[path = "../schema/postgres.rs"]
pub mod _postgres_schema;

/// Declares a domain struct once and generates the per-backend diesel row
/// structs (`<Name>Row`) alongside it. The diesel attributes in the
/// invocation apply to the generated rows, which are expanded inside a
/// module where the matching backend schema is in scope.
#[macro_export]
macro_rules! db_entity {
    (
        $(
            $( #[$attr:meta] )*
            pub struct $name:ident {
                $( $( #[$field_attr:meta] )* $vis:vis $field:ident : $typ:ty ),+
                $(,)?
            }
        )+
    ) => {
        $(
            #[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
            pub struct $name { $( $vis $field : $typ, )+ }
        )+

        pub mod _postgres_rows {
            $( $crate::db_entity! { @backend postgres | $( #[$attr] )* | $name | $( $( #[$field_attr] )* $vis $field : $typ ),+ } )+
        }
        pub mod _sqlite_rows {
            $( $crate::db_entity! { @backend sqlite | $( #[$attr] )* | $name | $( $( #[$field_attr] )* $vis $field : $typ ),+ } )+
        }
    };
    ( @backend $db:ident | $( #[$attr:meta] )* | $name:ident | $( $( #[$field_attr:meta] )* $vis:vis $field:ident : $typ:ty ),+ ) => {
        paste::paste! {
            #[allow(unused_imports)] use super::*;
            #[allow(unused_imports)] use $crate::database::[<_ $db _schema>]::*;
            #[allow(unused_imports)] use diesel::prelude::*;

            $( #[$attr] )*
            pub struct [<$name Row>] { $( $( #[$field_attr] )* $vis $field : $typ, )+ }

            impl [<$name Row>] {
                #[inline(always)]
                pub fn into_domain(self) -> super::$name {
                    super::$name { $( $field: self.$field, )+ }
                }

                #[inline(always)]
                pub fn from_domain(x: &super::$name) -> Self {
                    Self { $( $field: x.$field.clone(), )+ }
                }
            }
        }
    };
}

/// Runs a diesel block against whichever backend the pooled connection
/// belongs to, with the matching schema and row structs in scope.
#[macro_export]
macro_rules! db_run {
    ($conn:ident, $block:block) => {
        match $conn {
            $crate::database::DbConnection::Postgres($conn) => {
                use $crate::database::_postgres_schema::*;
                #[allow(unused_imports)]
                use _postgres_rows::*;
                #[allow(unused_imports)]
                use diesel::prelude::*;

                $block
            }
            $crate::database::DbConnection::Sqlite($conn) => {
                use $crate::database::_sqlite_schema::*;
                #[allow(unused_imports)]
                use _sqlite_rows::*;
                #[allow(unused_imports)]
                use diesel::prelude::*;

                $block
            }
        }
    };
}

static DB_POOL: Lazy<DbPool> = Lazy::new(DbPool::establish);
const SQLITE_MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations/sqlite");
const POSTGRES_MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations/postgres");

fn init_sqlite_pool(db_url: &str) -> Pool<ConnectionManager<SqliteConnection>> {
    let db_path = Path::new(db_url);
    if !db_path.exists() {
        if let Some(parent_dir) = db_path.parent() {
            if !parent_dir.exists() {
                std::fs::create_dir_all(parent_dir).expect("failed to create database directory");
            }
        }
        File::create(db_path).expect("failed to create database file");
    }

    let mut connection =
        SqliteConnection::establish(db_url).expect("failed to establish migration connection");
    connection
        .run_pending_migrations(SQLITE_MIGRATIONS)
        .expect("failed to run migrations");

    let manager = ConnectionManager::<SqliteConnection>::new(db_url);
    Pool::builder()
        .test_on_check_out(true)
        .max_size(5)
        .build(manager)
        .expect("failed to create database pool")
}

fn init_pg_pool(db_url: &str) -> Pool<ConnectionManager<PgConnection>> {
    let mut connection =
        PgConnection::establish(db_url).expect("failed to establish migration connection");
    connection
        .run_pending_migrations(POSTGRES_MIGRATIONS)
        .expect("failed to run migrations");

    let manager = ConnectionManager::<PgConnection>::new(db_url);
    Pool::builder()
        .max_size(5)
        .build(manager)
        .expect("failed to create database pool")
}

pub type DbResult<T> = Result<T, BaseError>;

#[derive(Serialize)]
pub struct ListResult<T> {
    total: i64,
    page: i64,
    page_size: i64,
    list: Vec<T>,
}
