//! Business logic services

pub mod lending;
pub mod members;
pub mod notifications;
pub mod reports;
pub mod reservations;
pub mod status;

use crate::{config::ReportsConfig, error::AppResult, repository::Repository};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    repository: Repository,
    pub lending: lending::LendingService,
    pub members: members::MembersService,
    pub reservations: reservations::ReservationsService,
    pub status: status::StatusService,
    pub notifications: notifications::NotificationService,
    pub reports: reports::ReportService,
}

impl Services {
    /// Create all services with the given repository
    pub fn new(repository: Repository, reports_config: &ReportsConfig) -> AppResult<Self> {
        let store = reports::ReportStore::new(&reports_config.directory)?;
        Ok(Self {
            lending: lending::LendingService::new(repository.clone()),
            members: members::MembersService::new(repository.clone()),
            reservations: reservations::ReservationsService::new(repository.clone()),
            status: status::StatusService::new(repository.clone()),
            notifications: notifications::NotificationService::new(repository.clone()),
            reports: reports::ReportService::new(
                repository.clone(),
                store,
                reports_config.lookback_days,
            ),
            repository,
        })
    }

    /// Direct store access for the read-only catalog queries.
    pub fn repository(&self) -> &Repository {
        &self.repository
    }
}
