use std::sync::Arc;

use reel_sources::{AcquisitionService, SourceError};
use tracing::{info, warn};

use crate::membership::MembershipCache;
use crate::resolver::IdentityResolver;

/// What happened to one title handed to the acquisition service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchAction {
    /// Already tracked but unmonitored; switched to monitored
    Promoted,
    AlreadyMonitored,
    Submitted,
}

/// Hands titles missing from the library to the acquisition service
pub struct AcquisitionDispatcher {
    resolver: Arc<IdentityResolver>,
    acquisition: Arc<dyn AcquisitionService>,
    membership: Arc<MembershipCache>,
    root_folder: String,
    quality_profile: String,
}

impl AcquisitionDispatcher {
    pub fn new(
        resolver: Arc<IdentityResolver>,
        acquisition: Arc<dyn AcquisitionService>,
        membership: Arc<MembershipCache>,
        root_folder: impl Into<String>,
        quality_profile: impl Into<String>,
    ) -> Self {
        Self {
            resolver,
            acquisition,
            membership,
            root_folder: root_folder.into(),
            quality_profile: quality_profile.into(),
        }
    }

    /// Titles that were successfully handed off, in input order.
    /// Failures are logged per title and never stop the batch.
    pub async fn dispatch(&self, titles: &[String]) -> Vec<String> {
        let mut dispatched = Vec::new();

        for title in titles {
            let Some(external_id) = self.resolver.resolve(title).await else {
                warn!(title = %title, "Couldn't resolve an identifier, not dispatching");
                continue;
            };

            match self.dispatch_one(&external_id).await {
                Ok(action) => {
                    info!(
                        title = %title,
                        external_id = %external_id,
                        action = ?action,
                        "Dispatched to {}",
                        self.acquisition.service_name()
                    );
                    self.membership.invalidate(title, &external_id);
                    dispatched.push(title.clone());
                }
                Err(e) => {
                    warn!(
                        title = %title,
                        external_id = %external_id,
                        error = %e,
                        "Dispatch failed"
                    );
                }
            }
        }

        dispatched
    }

    async fn dispatch_one(&self, external_id: &str) -> Result<DispatchAction, SourceError> {
        match self.acquisition.find_by_external_id(external_id).await? {
            Some(record) if record.monitored => Ok(DispatchAction::AlreadyMonitored),
            Some(record) => {
                self.acquisition.set_monitored(&record).await?;
                Ok(DispatchAction::Promoted)
            }
            None => {
                self.acquisition
                    .submit(external_id, &self.root_folder, &self.quality_profile)
                    .await?;
                Ok(DispatchAction::Submitted)
            }
        }
    }
}
