pub mod app_config;
pub mod database;
pub mod events;
pub mod ledger_repo;
pub mod redis_inventory;

pub use app_config::Config;
pub use database::DbClient;
pub use events::KafkaRelay;
pub use ledger_repo::PgLedger;
pub use redis_inventory::RedisInventory;
