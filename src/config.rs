//! Deploy configuration types.
//!
//! These are explicit, validated structs rather than a pass-through of the
//! vendor wire schema: only the fields the pipeline acts on are kept.

use serde::Deserialize;
use std::path::PathBuf;
use tracing::info;

fn default_acl() -> String {
    "public-read".to_string()
}

fn default_concurrency() -> usize {
    8
}

fn default_enabled() -> bool {
    true
}

/// The full configuration for one deploy run. Immutable after resolution.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeployConfig {
    /// Local directory whose files are uploaded.
    pub local_dir: PathBuf,

    /// Mirror sync: delete remote objects under the prefix that have no
    /// local counterpart, after a fully successful upload batch.
    #[serde(default)]
    pub delete_removed: bool,

    /// Skip the upload stage entirely (reconcile-only run).
    #[serde(default)]
    pub no_upload: bool,

    /// Apply permissive CORS rules to the bucket after creating it.
    #[serde(default)]
    pub enable_bucket_cors: bool,

    /// Reconcile the bucket's static-website configuration.
    #[serde(default)]
    pub ensure_bucket_website: bool,

    /// Desired website configuration, merged over the remote state.
    #[serde(default)]
    pub bucket_website: Option<WebsiteSettings>,

    /// Ensure a CDN distribution fronts the bucket's website endpoint.
    #[serde(default)]
    pub ensure_distribution: bool,

    /// Template for creating a distribution when none matches.
    #[serde(default)]
    pub distribution: Option<DistributionTemplate>,

    /// After upload, converge the live distribution's default root object
    /// and origin path onto the desired values.
    #[serde(default)]
    pub ensure_distribution_default_root_object: bool,

    /// Overrides both the website index suffix and error key, and is the
    /// desired distribution default root object.
    #[serde(default)]
    pub default_root_object: Option<String>,

    pub s3: S3Options,
}

/// Object-storage options.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct S3Options {
    pub bucket: String,
    pub region: String,

    /// Key prefix prepended to every uploaded key.
    #[serde(default)]
    pub prefix: String,

    /// Canned ACL applied to the bucket and each uploaded object.
    #[serde(default = "default_acl")]
    pub acl: String,

    /// Maximum number of concurrent uploads. Never unlimited.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Explicit credentials. When absent the AWS default provider chain
    /// (environment, profile, instance role) is used.
    #[serde(default)]
    pub access_key_id: Option<String>,
    #[serde(default)]
    pub secret_access_key: Option<String>,
}

/// Desired static-website configuration for the bucket.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WebsiteSettings {
    /// Suffix appended to directory requests, e.g. `index.html`.
    #[serde(default)]
    pub index_suffix: Option<String>,
    /// Key served on errors.
    #[serde(default)]
    pub error_key: Option<String>,
    #[serde(default)]
    pub routing_rules: Vec<RoutingRule>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RoutingRule {
    #[serde(default)]
    pub condition: Option<RoutingCondition>,
    pub redirect: Redirect,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RoutingCondition {
    /// HTTP error code that triggers the rule, e.g. `404`.
    #[serde(default)]
    pub http_error_code: Option<String>,
    /// Key prefix that triggers the rule.
    #[serde(default)]
    pub key_prefix: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Redirect {
    /// Host to redirect to. Back-filled with the bucket's website endpoint
    /// when absent.
    #[serde(default)]
    pub host_name: Option<String>,
    #[serde(default)]
    pub replace_key_prefix_with: Option<String>,
}

/// Template for a freshly created distribution. Caller reference and origin
/// fields are generated at creation time, not configured.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DistributionTemplate {
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// CloudFront price class, e.g. `PriceClass_100`.
    #[serde(default)]
    pub price_class: Option<String>,
    /// CNAME aliases.
    #[serde(default)]
    pub aliases: Vec<String>,
}

impl Default for DistributionTemplate {
    fn default() -> Self {
        Self {
            comment: None,
            enabled: true,
            price_class: None,
            aliases: Vec::new(),
        }
    }
}

impl DeployConfig {
    /// Checks invariants that serde defaults cannot express. Called once at
    /// load time, before any remote call.
    pub fn validate(&self) -> Result<(), String> {
        if self.s3.bucket.is_empty() {
            return Err("s3.bucket must not be empty".to_string());
        }
        if self.s3.region.is_empty() {
            return Err("s3.region must not be empty".to_string());
        }
        if self.s3.concurrency == 0 {
            return Err("s3.concurrency must be at least 1".to_string());
        }
        if self.s3.access_key_id.is_some() != self.s3.secret_access_key.is_some() {
            return Err(
                "s3.access_key_id and s3.secret_access_key must be set together".to_string(),
            );
        }
        Ok(())
    }

    /// The bucket's website endpoint, the join key between storage and CDN.
    pub fn website_endpoint(&self) -> String {
        crate::keys::website_endpoint(&self.s3.bucket, &self.s3.region)
    }

    pub fn trace_loaded(&self) {
        info!(
            local_dir = %self.local_dir.display(),
            bucket = %self.s3.bucket,
            region = %self.s3.region,
            prefix = %self.s3.prefix,
            concurrency = self.s3.concurrency,
            ensure_bucket_website = self.ensure_bucket_website,
            ensure_distribution = self.ensure_distribution,
            delete_removed = self.delete_removed,
            "Loaded DeployConfig"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal() -> DeployConfig {
        DeployConfig {
            local_dir: PathBuf::from("./public"),
            delete_removed: false,
            no_upload: false,
            enable_bucket_cors: false,
            ensure_bucket_website: false,
            bucket_website: None,
            ensure_distribution: false,
            distribution: None,
            ensure_distribution_default_root_object: false,
            default_root_object: None,
            s3: S3Options {
                bucket: "mybucket".to_string(),
                region: "us-east-1".to_string(),
                prefix: String::new(),
                acl: "public-read".to_string(),
                concurrency: 8,
                access_key_id: None,
                secret_access_key: None,
            },
        }
    }

    #[test]
    fn validate_accepts_minimal_config() {
        assert!(minimal().validate().is_ok());
    }

    #[test]
    fn validate_rejects_zero_concurrency() {
        let mut config = minimal();
        config.s3.concurrency = 0;
        assert!(config.validate().unwrap_err().contains("concurrency"));
    }

    #[test]
    fn validate_rejects_half_configured_credentials() {
        let mut config = minimal();
        config.s3.access_key_id = Some("AKIA".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn website_endpoint_uses_bucket_and_region() {
        assert_eq!(
            minimal().website_endpoint(),
            "mybucket.s3-website-us-east-1.amazonaws.com"
        );
    }
}
