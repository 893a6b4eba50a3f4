//! Coordinating module for the deploy pipeline.
//!
//! One run is strictly sequential: ensure bucket → ensure website →
//! ensure distribution → upload → mirror delete → ensure default root
//! object → invalidate → report. Stages gate on configuration flags; any
//! failure stops the run with no retry and no rollback.

use tracing::info;

use crate::cdn::{Cdn, CdnError, DistributionSummary, Invalidation};
use crate::cloudfront::CloudFrontCdn;
use crate::config::{DeployConfig, WebsiteSettings};
use crate::reconcile;
use crate::s3::{self, S3Store};
use crate::store::{ObjectStore, StoreError};
use crate::upload::{self, UploadError};

#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Cdn(#[from] CdnError),

    #[error(transparent)]
    Upload(#[from] UploadError),
}

/// Summary of one completed deploy run.
#[derive(Debug)]
pub struct DeployReport {
    pub bucket: String,
    pub website_endpoint: Option<String>,
    pub website: Option<WebsiteSettings>,
    pub distribution: Option<DistributionSummary>,
    pub uploaded: Vec<String>,
    pub deleted: Vec<String>,
    pub invalidation: Option<Invalidation>,
}

/// Run the full pipeline against concrete AWS clients.
pub async fn deploy(config: &DeployConfig) -> Result<DeployReport, DeployError> {
    let sdk_config = s3::load_sdk_config(&config.s3).await;
    let store = S3Store::new(&sdk_config, config.s3.region.clone());
    let cdn = CloudFrontCdn::new(&sdk_config);
    deploy_with(&store, &cdn, config).await
}

/// Run the full pipeline against any store/CDN implementation. Split from
/// [`deploy`] so the sequencing is testable with mocks.
pub async fn deploy_with<S, C>(
    store: &S,
    cdn: &C,
    config: &DeployConfig,
) -> Result<DeployReport, DeployError>
where
    S: ObjectStore + ?Sized,
    C: Cdn + ?Sized,
{
    info!(bucket = %config.s3.bucket, "Starting deploy");

    reconcile::ensure_bucket(store, config).await?;

    let website = if config.ensure_bucket_website {
        Some(reconcile::ensure_website(store, config).await?)
    } else {
        None
    };

    let distribution = if config.ensure_distribution {
        Some(reconcile::ensure_distribution(cdn, config).await?)
    } else {
        None
    };

    if config.no_upload {
        info!("Upload disabled, reconcile-only run");
        return Ok(DeployReport {
            bucket: config.s3.bucket.clone(),
            website_endpoint: website_endpoint_for(config),
            website,
            distribution,
            uploaded: Vec::new(),
            deleted: Vec::new(),
            invalidation: None,
        });
    }

    let planned = upload::scan_local_dir(config)?;
    let uploaded = upload::upload_all(store, config, planned).await?;

    let deleted = if config.delete_removed {
        upload::delete_removed(store, config, &uploaded).await?
    } else {
        Vec::new()
    };

    if config.ensure_distribution_default_root_object {
        if let Some(distribution) = &distribution {
            reconcile::ensure_default_root_object(cdn, config, &distribution.id).await?;
        }
    }

    let invalidation = match &distribution {
        Some(distribution) => Some(reconcile::invalidate_all(cdn, &distribution.id).await?),
        None => None,
    };

    if let Some(distribution) = &distribution {
        let aliases = if distribution.aliases.is_empty() {
            "n/a".to_string()
        } else {
            distribution.aliases.join(", ")
        };
        info!(
            endpoint = %config.website_endpoint(),
            id = %distribution.id,
            domain = %distribution.domain_name,
            aliases = %aliases,
            "Distribution summary"
        );
    }

    info!(
        uploaded = uploaded.len(),
        deleted = deleted.len(),
        "Deploy finished"
    );

    Ok(DeployReport {
        bucket: config.s3.bucket.clone(),
        website_endpoint: website_endpoint_for(config),
        website,
        distribution,
        uploaded,
        deleted,
        invalidation,
    })
}

/// The endpoint is only meaningful when website hosting is part of the run.
fn website_endpoint_for(config: &DeployConfig) -> Option<String> {
    (config.ensure_bucket_website || config.ensure_distribution)
        .then(|| config.website_endpoint())
}
