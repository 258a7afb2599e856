pub mod candidates;
pub mod dispatch;
pub mod error;
pub mod lookup;
pub mod membership;
pub mod registry;
pub mod resolver;
pub mod scheduler;
pub mod service;

#[cfg(test)]
mod testing;

pub use candidates::{Candidate, CandidateMode, CandidateVerifier};
pub use dispatch::{AcquisitionDispatcher, DispatchAction};
pub use error::{CuratorError, Result};
pub use lookup::LibraryLookup;
pub use membership::MembershipCache;
pub use registry::CollectionRegistry;
pub use resolver::IdentityResolver;
pub use scheduler::{
    CheckOutcome, JobKind, ReconciliationScheduler, ResyncOutcome, SchedulerServices,
    SchedulerSettings,
};
pub use service::{BuildOutcome, CollectionService, ListPreview, MaterializeOutcome};
