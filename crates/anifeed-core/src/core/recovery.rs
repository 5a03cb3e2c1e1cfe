//! Recovery service: backfill and log replay.

use crate::recovery::{backfill, rebuild_from_log, BackfillReport};

use super::{CoreResult, FeedServices};

pub struct RecoveryService<'a> {
    services: &'a FeedServices,
}

impl<'a> RecoveryService<'a> {
    pub(crate) const fn new(services: &'a FeedServices) -> Self {
        Self { services }
    }

    /// Bring derived state back in line with the source tables. Safe to run
    /// on every startup.
    #[tracing::instrument(skip(self))]
    pub fn backfill(&self) -> CoreResult<BackfillReport> {
        backfill(self.services.db(), &self.services.catalog)
    }

    /// Rebuild every non-catalog table from the event log.
    #[tracing::instrument(skip(self))]
    pub fn rebuild_from_log(&self) -> CoreResult<usize> {
        rebuild_from_log(self.services.db(), &self.services.catalog)
    }
}
