// Backend table definitions (postgres.rs / sqlite.rs) are pulled in by
// `crate::database` under per-backend module names, not declared here.
pub mod enum_def;
