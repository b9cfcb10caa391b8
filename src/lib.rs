use diesel_migrations::{EmbeddedMigrations, embed_migrations};

pub mod api;
pub mod config;
pub mod error;
pub mod schema;
pub mod state;
#[cfg(test)]
mod test;
pub mod tournaments;
pub mod util_resp;
pub mod validation;
pub mod workloads;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!();
