use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use reel_models::MovieReference;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::membership::MembershipCache;
use crate::resolver::IdentityResolver;

/// Which candidates survive verification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CandidateMode {
    /// Only titles already in the library
    Library,
    /// Everything, annotated with library presence
    Mixed,
    /// Everything, without touching the library
    Discovery,
}

impl FromStr for CandidateMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "library" => Ok(CandidateMode::Library),
            "mixed" => Ok(CandidateMode::Mixed),
            "discovery" => Ok(CandidateMode::Discovery),
            other => Err(format!(
                "unknown candidate mode '{}' (expected library, mixed or discovery)",
                other
            )),
        }
    }
}

impl fmt::Display for CandidateMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CandidateMode::Library => "library",
            CandidateMode::Mixed => "mixed",
            CandidateMode::Discovery => "discovery",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Candidate {
    pub title: String,
    pub reference: MovieReference,
    pub external_id: Option<String>,
    pub in_library: bool,
}

/// Resolves and checks candidate titles with a bounded number of workers
pub struct CandidateVerifier {
    resolver: Arc<IdentityResolver>,
    membership: Arc<MembershipCache>,
    workers: usize,
}

impl CandidateVerifier {
    pub fn new(resolver: Arc<IdentityResolver>, membership: Arc<MembershipCache>, workers: usize) -> Self {
        Self {
            resolver,
            membership,
            workers: workers.max(1),
        }
    }

    /// Results keep the input order; `limit` caps the surviving candidates
    pub async fn verify(
        &self,
        titles: &[String],
        mode: CandidateMode,
        limit: Option<usize>,
    ) -> Vec<Candidate> {
        let checked: Vec<Candidate> = stream::iter(titles.iter().cloned())
            .map(|title| self.check(title, mode))
            .buffered(self.workers)
            .collect()
            .await;

        let mut candidates: Vec<Candidate> = checked
            .into_iter()
            .filter(|c| mode != CandidateMode::Library || c.in_library)
            .collect();
        if let Some(limit) = limit {
            candidates.truncate(limit);
        }

        debug!(
            mode = %mode,
            requested = titles.len(),
            kept = candidates.len(),
            "Verified candidates"
        );
        candidates
    }

    async fn check(&self, title: String, mode: CandidateMode) -> Candidate {
        let identity = self
            .resolver
            .resolve_reference(&MovieReference::parse(&title))
            .await;
        let in_library = match mode {
            CandidateMode::Discovery => false,
            CandidateMode::Library | CandidateMode::Mixed => {
                self.membership
                    .is_present(&title, identity.external_id.as_deref())
                    .await
            }
        };
        Candidate {
            title,
            reference: identity.reference,
            external_id: identity.external_id,
            in_library,
        }
    }
}
