//! Idempotent reconciliation of bucket, website and distribution state.
//!
//! Each function compares desired against actual remote state and applies
//! the minimal change to converge. None of them roll back on later failure;
//! the pipeline is strictly sequential.

use tracing::{debug, info};
use uuid::Uuid;

use crate::cdn::{Cdn, CdnError, DistributionSummary, NewDistribution, RootObjectUpdate};
use crate::config::{DeployConfig, WebsiteSettings};
use crate::keys;
use crate::store::{ObjectStore, StoreError};

/// Ensure the bucket exists with the configured ACL, creating it if the
/// bucket listing does not contain it. Optionally applies CORS rules after
/// creation.
pub async fn ensure_bucket<S: ObjectStore + ?Sized>(
    store: &S,
    config: &DeployConfig,
) -> Result<(), StoreError> {
    let bucket = &config.s3.bucket;
    let buckets = store.list_buckets().await?;
    debug!(count = buckets.len(), "Listed buckets");

    if buckets.iter().any(|name| name == bucket) {
        info!(bucket = %bucket, "Bucket already exists");
        return Ok(());
    }

    info!(bucket = %bucket, acl = %config.s3.acl, "Bucket does not exist, creating it");
    store.create_bucket(bucket, &config.s3.acl).await?;

    if config.enable_bucket_cors {
        info!(bucket = %bucket, "Applying CORS rules to new bucket");
        store.put_bucket_cors(bucket).await?;
    }

    Ok(())
}

/// Merge desired website settings over the current remote state. Desired
/// values win per field; desired routing rules replace the current set when
/// non-empty. A configured default root object overrides both the index
/// suffix and the error key. A missing redirect host on the first rule is
/// back-filled with the website endpoint.
pub fn merge_website(
    current: WebsiteSettings,
    desired: &WebsiteSettings,
    default_root_object: Option<&str>,
    endpoint: &str,
) -> WebsiteSettings {
    let mut merged = WebsiteSettings {
        index_suffix: desired.index_suffix.clone().or(current.index_suffix),
        error_key: desired.error_key.clone().or(current.error_key),
        routing_rules: if desired.routing_rules.is_empty() {
            current.routing_rules
        } else {
            desired.routing_rules.clone()
        },
    };

    if let Some(root) = default_root_object {
        merged.index_suffix = Some(root.to_string());
        merged.error_key = Some(root.to_string());
    }

    if let Some(rule) = merged.routing_rules.first_mut() {
        if rule.redirect.host_name.is_none() {
            rule.redirect.host_name = Some(endpoint.to_string());
        }
    }

    merged
}

/// Fetch, merge and write back the bucket website configuration. A missing
/// remote configuration is an empty starting state, not an error.
/// Idempotent: a second run with the same desired settings writes the same
/// state.
pub async fn ensure_website<S: ObjectStore + ?Sized>(
    store: &S,
    config: &DeployConfig,
) -> Result<WebsiteSettings, StoreError> {
    let bucket = &config.s3.bucket;
    let current = match store.get_website(bucket).await? {
        Some(settings) => {
            debug!(bucket = %bucket, ?settings, "Fetched current website configuration");
            settings
        }
        None => {
            info!(bucket = %bucket, "No current website configuration, starting empty");
            WebsiteSettings::default()
        }
    };

    let desired = config.bucket_website.clone().unwrap_or_default();
    let merged = merge_website(
        current,
        &desired,
        config.default_root_object.as_deref(),
        &config.website_endpoint(),
    );

    info!(bucket = %bucket, ?merged, "Putting merged website configuration");
    store.put_website(bucket, &merged).await?;
    Ok(merged)
}

/// Ensure a distribution fronts the website endpoint. The first existing
/// distribution with a matching origin domain is reused unconditionally;
/// otherwise one is created from the configured template.
pub async fn ensure_distribution<C: Cdn + ?Sized>(
    cdn: &C,
    config: &DeployConfig,
) -> Result<DistributionSummary, CdnError> {
    let endpoint = config.website_endpoint();
    let existing = cdn.list_distributions().await?;

    if let Some(found) = existing.into_iter().find(|d| d.fronts(&endpoint)) {
        info!(
            id = %found.id,
            domain = %found.domain_name,
            origin = %endpoint,
            "Distribution found, reusing it"
        );
        return Ok(found);
    }

    let template = config.distribution.clone().unwrap_or_default();
    let settings = NewDistribution {
        caller_reference: Uuid::new_v4().to_string(),
        origin_id: keys::origin_id(&endpoint),
        origin_domain: endpoint.clone(),
        origin_path: keys::origin_path(&config.s3.prefix),
        comment: template
            .comment
            .unwrap_or_else(|| format!("site-deploy: {}", config.s3.bucket)),
        enabled: template.enabled,
        default_root_object: config.default_root_object.clone(),
        price_class: template.price_class,
        aliases: template.aliases,
    };

    info!(origin = %endpoint, "No matching distribution, creating one");
    let created = cdn.create_distribution(settings).await?;
    info!(
        id = %created.id,
        domain = %created.domain_name,
        "Distribution created"
    );
    Ok(created)
}

/// Converge the live distribution's default root object and origin path onto
/// the desired values. Issues an update only when they differ, using the
/// etag from the fetch as the concurrency token.
pub async fn ensure_default_root_object<C: Cdn + ?Sized>(
    cdn: &C,
    config: &DeployConfig,
    distribution_id: &str,
) -> Result<(), CdnError> {
    let desired_root = match config.default_root_object.as_deref() {
        Some(root) => root.to_string(),
        None => return Ok(()),
    };
    let desired_path = keys::origin_path(&config.s3.prefix);

    let detail = cdn.get_distribution(distribution_id).await?;
    if detail.default_root_object.as_deref() == Some(desired_root.as_str())
        && detail.origin_path == desired_path
    {
        info!(
            id = %distribution_id,
            root = %desired_root,
            "Distribution default root object unchanged, no update needed"
        );
        return Ok(());
    }

    info!(
        id = %distribution_id,
        root = %desired_root,
        origin_path = %desired_path,
        "Updating distribution default root object"
    );
    cdn.update_root_object(
        distribution_id,
        &detail.etag,
        RootObjectUpdate {
            default_root_object: desired_root,
            origin_path: desired_path,
        },
    )
    .await
}

/// Request a full-path cache purge on the distribution.
pub async fn invalidate_all<C: Cdn + ?Sized>(
    cdn: &C,
    distribution_id: &str,
) -> Result<crate::cdn::Invalidation, CdnError> {
    let reference = Uuid::new_v4().to_string();
    let invalidation = cdn
        .create_invalidation(distribution_id, &reference, vec!["/*".to_string()])
        .await?;
    info!(
        id = %invalidation.id,
        status = %invalidation.status,
        created = invalidation.create_time.as_deref().unwrap_or("n/a"),
        "Invalidation created"
    );
    Ok(invalidation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Redirect, RoutingCondition, RoutingRule};

    const ENDPOINT: &str = "mybucket.s3-website-us-east-1.amazonaws.com";

    fn desired_with_rules() -> WebsiteSettings {
        WebsiteSettings {
            index_suffix: Some("index.html".to_string()),
            error_key: Some("index.html".to_string()),
            routing_rules: vec![RoutingRule {
                condition: Some(RoutingCondition {
                    http_error_code: Some("404".to_string()),
                    key_prefix: None,
                }),
                redirect: Redirect {
                    host_name: None,
                    replace_key_prefix_with: Some("#!/".to_string()),
                },
            }],
        }
    }

    #[test]
    fn merge_over_empty_takes_desired_values() {
        let merged = merge_website(
            WebsiteSettings::default(),
            &desired_with_rules(),
            None,
            ENDPOINT,
        );
        assert_eq!(merged.index_suffix.as_deref(), Some("index.html"));
        assert_eq!(merged.error_key.as_deref(), Some("index.html"));
    }

    #[test]
    fn merge_backfills_redirect_host_with_endpoint() {
        let merged = merge_website(
            WebsiteSettings::default(),
            &desired_with_rules(),
            None,
            ENDPOINT,
        );
        assert_eq!(
            merged.routing_rules[0].redirect.host_name.as_deref(),
            Some(ENDPOINT)
        );
    }

    #[test]
    fn merge_keeps_explicit_redirect_host() {
        let mut desired = desired_with_rules();
        desired.routing_rules[0].redirect.host_name = Some("my.domain.com".to_string());
        let merged = merge_website(WebsiteSettings::default(), &desired, None, ENDPOINT);
        assert_eq!(
            merged.routing_rules[0].redirect.host_name.as_deref(),
            Some("my.domain.com")
        );
    }

    #[test]
    fn merge_desired_wins_over_current() {
        let current = WebsiteSettings {
            index_suffix: Some("old.html".to_string()),
            error_key: Some("old-error.html".to_string()),
            routing_rules: vec![],
        };
        let merged = merge_website(current, &desired_with_rules(), None, ENDPOINT);
        assert_eq!(merged.index_suffix.as_deref(), Some("index.html"));
    }

    #[test]
    fn merge_keeps_current_fields_desired_leaves_unset() {
        let current = WebsiteSettings {
            index_suffix: Some("current.html".to_string()),
            error_key: None,
            routing_rules: vec![],
        };
        let desired = WebsiteSettings::default();
        let merged = merge_website(current, &desired, None, ENDPOINT);
        assert_eq!(merged.index_suffix.as_deref(), Some("current.html"));
    }

    #[test]
    fn merge_default_root_object_overrides_both_documents() {
        let merged = merge_website(
            WebsiteSettings::default(),
            &desired_with_rules(),
            Some("home.html"),
            ENDPOINT,
        );
        assert_eq!(merged.index_suffix.as_deref(), Some("home.html"));
        assert_eq!(merged.error_key.as_deref(), Some("home.html"));
    }

    #[test]
    fn merge_is_idempotent() {
        let desired = desired_with_rules();
        let once = merge_website(WebsiteSettings::default(), &desired, None, ENDPOINT);
        let twice = merge_website(once.clone(), &desired, None, ENDPOINT);
        assert_eq!(once, twice);
    }

    #[test]
    fn summary_matches_on_origin_domain() {
        let summary = DistributionSummary {
            id: "E123".to_string(),
            domain_name: "d111.cloudfront.net".to_string(),
            origin_domains: vec![ENDPOINT.to_string()],
            aliases: vec![],
        };
        assert!(summary.fronts(ENDPOINT));
        assert!(!summary.fronts("other.example.com"));
    }
}
