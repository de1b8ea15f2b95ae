//! Repository module - cached data access layer.

mod group_config_repository;

pub use group_config_repository::GroupConfigRepository;
