#[path = "integration/fixtures/mod.rs"]
mod fixtures;

#[path = "integration/migrate/mod.rs"]
mod migrate;
