//! SeaORM entity for the `waitlist_entries` table

use sea_orm::ActiveValue::Set;
use sea_orm::DbBackend;
use sea_orm::entity::prelude::*;

use crate::models::WaitlistEntry;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "waitlist_entries")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub email: String,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for WaitlistEntry {
    fn from(model: Model) -> Self {
        WaitlistEntry::new(model.email, model.created_at)
    }
}

impl From<&WaitlistEntry> for ActiveModel {
    fn from(entry: &WaitlistEntry) -> Self {
        ActiveModel {
            email: Set(entry.email.clone()),
            created_at: Set(entry.created_at),
        }
    }
}

/// Table DDL per backend, applied on connect
pub(crate) fn create_table_sql(backend: DbBackend) -> &'static str {
    match backend {
        DbBackend::Postgres => {
            "CREATE TABLE IF NOT EXISTS waitlist_entries (\
             email TEXT PRIMARY KEY, \
             created_at TIMESTAMPTZ NOT NULL)"
        }
        _ => {
            "CREATE TABLE IF NOT EXISTS waitlist_entries (\
             email TEXT NOT NULL PRIMARY KEY, \
             created_at TEXT NOT NULL)"
        }
    }
}
