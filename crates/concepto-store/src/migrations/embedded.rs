//! Migrations are embedded at compile time using include_str!

/// Migration metadata
#[derive(Debug, Clone, Copy)]
pub struct Migration {
    pub id: &'static str,
    pub sql: &'static str,
}

/// All embedded migrations in application order
pub fn get_migrations() -> Vec<Migration> {
    vec![
        Migration {
            id: "001_cache_items",
            sql: include_str!("../../migrations/001_cache_items.sql"),
        },
        Migration {
            id: "002_cache_items_updated_index",
            sql: include_str!("../../migrations/002_cache_items_updated_index.sql"),
        },
    ]
}
