//! Store implementations owned by the server

pub mod postgres;

pub use postgres::PostgresOrganizationStore;
