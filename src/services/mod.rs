//! Business logic services

pub mod availability;
pub mod catalog;
pub mod exchange;
pub mod trust;
pub mod turf;
pub mod users;

use crate::{config::AppConfig, repository::Repository};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub users: users::UsersService,
    pub catalog: catalog::CatalogService,
    pub exchange: exchange::ExchangeService,
    pub turf: turf::TurfService,
}

impl Services {
    /// Create all services over the given repository
    pub fn new(repository: Repository, config: &AppConfig) -> Self {
        Self {
            users: users::UsersService::new(repository.clone()),
            catalog: catalog::CatalogService::new(repository.clone()),
            exchange: exchange::ExchangeService::new(repository.clone(), &config.exchange),
            turf: turf::TurfService::new(repository, &config.turf),
        }
    }
}
