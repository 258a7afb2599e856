use std::sync::Arc;
use std::time::Duration;

use governor::clock::DefaultClock;
use governor::state::direct::NotKeyed;
use governor::state::InMemoryState;
use governor::{Quota, RateLimiter};
use reel_models::{MovieReference, ResolvedIdentity};
use reel_sources::ReferenceIndex;
use tracing::{debug, warn};

type DirectLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Maps free-text titles to external identifiers through the reference index
///
/// Calls are paced by one shared limiter, so concurrent callers queue up
/// instead of multiplying the request rate.
pub struct IdentityResolver {
    index: Arc<dyn ReferenceIndex>,
    limiter: Option<DirectLimiter>,
}

impl IdentityResolver {
    /// `min_delay` of zero disables pacing
    pub fn new(index: Arc<dyn ReferenceIndex>, min_delay: Duration) -> Self {
        Self {
            index,
            limiter: Quota::with_period(min_delay).map(RateLimiter::direct),
        }
    }

    /// External id of the first feature-film hit, in index order
    pub async fn resolve(&self, title: &str) -> Option<String> {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }

        let hits = match self.index.search(title).await {
            Ok(hits) => hits,
            Err(e) => {
                warn!(title = title, error = %e, "Identity lookup failed");
                return None;
            }
        };

        if hits.is_empty() {
            warn!(title = title, "No results in {}", self.index.index_name());
            return None;
        }

        match hits.into_iter().find(|hit| hit.kind.is_feature_film()) {
            Some(hit) => {
                debug!(title = title, external_id = %hit.id, "Resolved feature film");
                Some(hit.id)
            }
            None => {
                warn!(title = title, "No feature film among the results");
                None
            }
        }
    }

    /// Resolve the canonical `"Title (Year)"` form of a reference
    pub async fn resolve_reference(&self, reference: &MovieReference) -> ResolvedIdentity {
        let external_id = self.resolve(&reference.to_string()).await;
        ResolvedIdentity {
            reference: reference.clone(),
            external_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{hit, FakeIndex};
    use reel_models::TitleKind;
    use std::time::Instant;

    #[tokio::test]
    async fn test_first_feature_film_wins() {
        let index = Arc::new(FakeIndex::default());
        index.add(
            "Dune (2021)",
            vec![
                hit("tt10466872", TitleKind::TvSeries),
                hit("tt1160419", TitleKind::FeatureFilm),
                hit("tt0087182", TitleKind::FeatureFilm),
            ],
        );
        let resolver = IdentityResolver::new(index, Duration::ZERO);

        assert_eq!(resolver.resolve("Dune (2021)").await.as_deref(), Some("tt1160419"));
    }

    #[tokio::test]
    async fn test_no_feature_film_or_no_hits() {
        let index = Arc::new(FakeIndex::default());
        index.add("Chernobyl", vec![hit("tt7366338", TitleKind::TvSeries)]);
        let resolver = IdentityResolver::new(index, Duration::ZERO);

        assert_eq!(resolver.resolve("Chernobyl").await, None);
        assert_eq!(resolver.resolve("Nothing Matches").await, None);
    }

    #[tokio::test]
    async fn test_index_errors_degrade_to_none() {
        let index = Arc::new(FakeIndex::default());
        index.add("Heat (1995)", vec![hit("tt0113277", TitleKind::FeatureFilm)]);
        index.fail_all();
        let resolver = IdentityResolver::new(index, Duration::ZERO);

        assert_eq!(resolver.resolve("Heat (1995)").await, None);
    }

    #[tokio::test]
    async fn test_calls_are_paced() {
        let index = Arc::new(FakeIndex::default());
        let resolver = IdentityResolver::new(index.clone(), Duration::from_millis(50));

        let started = Instant::now();
        for _ in 0..3 {
            resolver.resolve("Anything").await;
        }
        // First call passes immediately, the next two wait one period each
        assert!(started.elapsed() >= Duration::from_millis(90));
        assert_eq!(index.calls(), 3);
    }

    #[tokio::test]
    async fn test_resolve_reference_keeps_reference() {
        let index = Arc::new(FakeIndex::default());
        index.add("Arrival (2016)", vec![hit("tt2543164", TitleKind::FeatureFilm)]);
        let resolver = IdentityResolver::new(index, Duration::ZERO);

        let identity = resolver
            .resolve_reference(&MovieReference::new("Arrival", Some(2016)))
            .await;
        assert!(identity.is_resolved());
        assert_eq!(identity.reference.year, Some(2016));
    }
}
