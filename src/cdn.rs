//! Abstraction over the CDN backend.
//!
//! Mirrors the object-store seam: an async trait with simplified domain
//! types, mockable for tests, with the vendor SDK confined to the concrete
//! implementation.

use async_trait::async_trait;

#[cfg(any(test, feature = "test-export-mocks"))]
use mockall::automock;

#[derive(Debug, thiserror::Error)]
pub enum CdnError {
    #[error("failed to list distributions: {source}")]
    ListDistributions {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("failed to create distribution for origin {origin_domain}: {source}")]
    CreateDistribution {
        origin_domain: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("failed to get distribution {id}: {source}")]
    GetDistribution {
        id: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("failed to update distribution {id}: {source}")]
    UpdateDistribution {
        id: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("failed to create invalidation for distribution {id}: {source}")]
    CreateInvalidation {
        id: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// What the reconciler needs to know about an existing distribution.
#[derive(Debug, Clone)]
pub struct DistributionSummary {
    pub id: String,
    /// The distribution's own hostname (`dXXXX.cloudfront.net`).
    pub domain_name: String,
    /// Domain names of all configured origins; the match key against the
    /// bucket's website endpoint.
    pub origin_domains: Vec<String>,
    pub aliases: Vec<String>,
}

impl DistributionSummary {
    pub fn fronts(&self, origin_domain: &str) -> bool {
        self.origin_domains.iter().any(|d| d == origin_domain)
    }
}

/// Settings used when creating a distribution.
#[derive(Debug, Clone)]
pub struct NewDistribution {
    /// Unique idempotency token for the create request.
    pub caller_reference: String,
    pub origin_id: String,
    pub origin_domain: String,
    /// Leading slash, no trailing slash; empty when no prefix is configured.
    pub origin_path: String,
    pub comment: String,
    pub enabled: bool,
    pub default_root_object: Option<String>,
    pub price_class: Option<String>,
    pub aliases: Vec<String>,
}

/// Live distribution state relevant to the default-root-object follow-up.
#[derive(Debug, Clone)]
pub struct DistributionDetail {
    pub id: String,
    /// Opaque concurrency token from the fetch; the update is rejected when
    /// the live state changed in between.
    pub etag: String,
    pub default_root_object: Option<String>,
    /// Origin path of the first origin.
    pub origin_path: String,
}

/// Patch applied by the compare-and-swap update.
#[derive(Debug, Clone)]
pub struct RootObjectUpdate {
    pub default_root_object: String,
    pub origin_path: String,
}

/// Outcome of a cache invalidation request.
#[derive(Debug, Clone)]
pub struct Invalidation {
    pub id: String,
    pub status: String,
    pub create_time: Option<String>,
}

#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait Cdn: Send + Sync {
    async fn list_distributions(&self) -> Result<Vec<DistributionSummary>, CdnError>;

    async fn create_distribution(
        &self,
        settings: NewDistribution,
    ) -> Result<DistributionSummary, CdnError>;

    async fn get_distribution(&self, id: &str) -> Result<DistributionDetail, CdnError>;

    /// Compare-and-swap update of the default root object and origin path,
    /// keyed on the `if_match` token from a prior fetch.
    async fn update_root_object(
        &self,
        id: &str,
        if_match: &str,
        update: RootObjectUpdate,
    ) -> Result<(), CdnError>;

    /// Request a cache purge for the given path patterns.
    async fn create_invalidation(
        &self,
        id: &str,
        caller_reference: &str,
        paths: Vec<String>,
    ) -> Result<Invalidation, CdnError>;
}
