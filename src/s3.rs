//! S3 implementation of the [`ObjectStore`] seam.
//!
//! The client is constructed explicitly from an immutable region plus
//! optional static credentials; no process-wide SDK configuration is
//! mutated. Credential resolution otherwise follows the AWS default
//! provider chain.

use async_trait::async_trait;
use aws_config::{Region, SdkConfig};
use aws_sdk_s3::config::Credentials;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{
    BucketCannedAcl, BucketLocationConstraint, Condition, CorsConfiguration, CorsRule,
    CreateBucketConfiguration, ErrorDocument, IndexDocument, ObjectCannedAcl, Redirect,
    RoutingRule, WebsiteConfiguration,
};
use tracing::debug;

use crate::config::{self, S3Options, WebsiteSettings};
use crate::store::{ObjectStore, PutObject, StoreError};

/// CORS rules applied to freshly created buckets when enabled: wide open,
/// matching what a public static-site bucket needs for pre-signed uploads.
const CORS_ALLOWED_METHODS: [&str; 4] = ["GET", "PUT", "DELETE", "POST"];
const CORS_MAX_AGE_SECONDS: i32 = 30000;

fn boxed<E>(err: E) -> Box<dyn std::error::Error + Send + Sync>
where
    E: std::error::Error + Send + Sync + 'static,
{
    Box::new(err)
}

/// Resolve the shared AWS configuration for one deploy run.
pub async fn load_sdk_config(options: &S3Options) -> SdkConfig {
    let mut loader =
        aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new(options.region.clone()));

    if let (Some(key), Some(secret)) = (&options.access_key_id, &options.secret_access_key) {
        loader = loader.credentials_provider(Credentials::new(
            key.clone(),
            secret.clone(),
            None,
            None,
            "site-deploy-config",
        ));
    }

    loader.load().await
}

pub struct S3Store {
    client: aws_sdk_s3::Client,
    region: String,
}

impl S3Store {
    pub fn new(sdk_config: &SdkConfig, region: impl Into<String>) -> Self {
        Self {
            client: aws_sdk_s3::Client::new(sdk_config),
            region: region.into(),
        }
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn list_buckets(&self) -> Result<Vec<String>, StoreError> {
        let out = self
            .client
            .list_buckets()
            .send()
            .await
            .map_err(|e| StoreError::ListBuckets { source: boxed(e) })?;
        Ok(out
            .buckets()
            .iter()
            .filter_map(|b| b.name().map(str::to_string))
            .collect())
    }

    async fn create_bucket(&self, bucket: &str, acl: &str) -> Result<(), StoreError> {
        let mut request = self
            .client
            .create_bucket()
            .bucket(bucket)
            .acl(BucketCannedAcl::from(acl));

        // us-east-1 is the default location and rejects an explicit
        // constraint.
        if self.region != "us-east-1" {
            request = request.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(BucketLocationConstraint::from(self.region.as_str()))
                    .build(),
            );
        }

        match request.send().await {
            Ok(_) => Ok(()),
            Err(err) => {
                if let Some(service) = err.as_service_error() {
                    if service.is_bucket_already_owned_by_you()
                        || service.is_bucket_already_exists()
                    {
                        debug!(bucket = %bucket, "Bucket already exists, treating as success");
                        return Ok(());
                    }
                }
                Err(StoreError::CreateBucket {
                    bucket: bucket.to_string(),
                    source: boxed(err),
                })
            }
        }
    }

    async fn put_bucket_cors(&self, bucket: &str) -> Result<(), StoreError> {
        let map_err = |source| StoreError::PutCors {
            bucket: bucket.to_string(),
            source,
        };

        let mut rule = CorsRule::builder()
            .allowed_origins("*")
            .allowed_headers("*")
            .max_age_seconds(CORS_MAX_AGE_SECONDS);
        for method in CORS_ALLOWED_METHODS {
            rule = rule.allowed_methods(method);
        }
        let rules = CorsConfiguration::builder()
            .cors_rules(rule.build().map_err(|e| map_err(boxed(e)))?)
            .build()
            .map_err(|e| map_err(boxed(e)))?;

        self.client
            .put_bucket_cors()
            .bucket(bucket)
            .cors_configuration(rules)
            .send()
            .await
            .map_err(|e| map_err(boxed(e)))?;
        Ok(())
    }

    async fn get_website(&self, bucket: &str) -> Result<Option<WebsiteSettings>, StoreError> {
        match self.client.get_bucket_website().bucket(bucket).send().await {
            Ok(out) => {
                let settings = WebsiteSettings {
                    index_suffix: out
                        .index_document()
                        .map(|d| d.suffix().to_string()),
                    error_key: out.error_document().map(|d| d.key().to_string()),
                    routing_rules: out
                        .routing_rules()
                        .iter()
                        .map(routing_rule_from_sdk)
                        .collect(),
                };
                Ok(Some(settings))
            }
            Err(err) => {
                // A bucket without website hosting is an empty starting
                // state, not a failure.
                if err
                    .as_service_error()
                    .and_then(|e| e.meta().code())
                    .is_some_and(|code| code == "NoSuchWebsiteConfiguration")
                {
                    return Ok(None);
                }
                Err(StoreError::GetWebsite {
                    bucket: bucket.to_string(),
                    source: boxed(err),
                })
            }
        }
    }

    async fn put_website(
        &self,
        bucket: &str,
        settings: &WebsiteSettings,
    ) -> Result<(), StoreError> {
        let map_err = |source| StoreError::PutWebsite {
            bucket: bucket.to_string(),
            source,
        };

        let mut builder = WebsiteConfiguration::builder();
        if let Some(suffix) = &settings.index_suffix {
            builder = builder.index_document(
                IndexDocument::builder()
                    .suffix(suffix)
                    .build()
                    .map_err(|e| map_err(boxed(e)))?,
            );
        }
        if let Some(key) = &settings.error_key {
            builder = builder.error_document(
                ErrorDocument::builder()
                    .key(key)
                    .build()
                    .map_err(|e| map_err(boxed(e)))?,
            );
        }
        for rule in &settings.routing_rules {
            builder = builder.routing_rules(routing_rule_to_sdk(rule));
        }

        self.client
            .put_bucket_website()
            .bucket(bucket)
            .website_configuration(builder.build())
            .send()
            .await
            .map_err(|e| map_err(boxed(e)))?;
        Ok(())
    }

    async fn put_object(&self, bucket: &str, object: PutObject) -> Result<(), StoreError> {
        self.client
            .put_object()
            .bucket(bucket)
            .key(&object.key)
            .body(ByteStream::from(object.body))
            .content_type(&object.content_type)
            .acl(ObjectCannedAcl::from(object.acl.as_str()))
            .send()
            .await
            .map_err(|e| StoreError::PutObject {
                bucket: bucket.to_string(),
                key: object.key.clone(),
                source: boxed(e),
            })?;
        Ok(())
    }

    async fn list_keys(&self, bucket: &str, prefix: &str) -> Result<Vec<String>, StoreError> {
        let mut keys = Vec::new();
        let mut pages = self
            .client
            .list_objects_v2()
            .bucket(bucket)
            .prefix(prefix)
            .into_paginator()
            .send();

        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| StoreError::ListKeys {
                bucket: bucket.to_string(),
                prefix: prefix.to_string(),
                source: boxed(e),
            })?;
            keys.extend(
                page.contents()
                    .iter()
                    .filter_map(|obj| obj.key().map(str::to_string)),
            );
        }
        Ok(keys)
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<(), StoreError> {
        self.client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| StoreError::DeleteObject {
                bucket: bucket.to_string(),
                key: key.to_string(),
                source: boxed(e),
            })?;
        Ok(())
    }
}

fn routing_rule_from_sdk(rule: &RoutingRule) -> config::RoutingRule {
    config::RoutingRule {
        condition: rule.condition().map(|c| config::RoutingCondition {
            http_error_code: c.http_error_code_returned_equals().map(str::to_string),
            key_prefix: c.key_prefix_equals().map(str::to_string),
        }),
        redirect: config::Redirect {
            host_name: rule
                .redirect()
                .and_then(|r| r.host_name())
                .map(str::to_string),
            replace_key_prefix_with: rule
                .redirect()
                .and_then(|r| r.replace_key_prefix_with())
                .map(str::to_string),
        },
    }
}

fn routing_rule_to_sdk(rule: &config::RoutingRule) -> RoutingRule {
    let mut redirect = Redirect::builder();
    if let Some(host) = &rule.redirect.host_name {
        redirect = redirect.host_name(host);
    }
    if let Some(replace) = &rule.redirect.replace_key_prefix_with {
        redirect = redirect.replace_key_prefix_with(replace);
    }

    let mut builder = RoutingRule::builder().redirect(redirect.build());
    if let Some(condition) = &rule.condition {
        let mut sdk_condition = Condition::builder();
        if let Some(code) = &condition.http_error_code {
            sdk_condition = sdk_condition.http_error_code_returned_equals(code);
        }
        if let Some(prefix) = &condition.key_prefix {
            sdk_condition = sdk_condition.key_prefix_equals(prefix);
        }
        builder = builder.condition(sdk_condition.build());
    }
    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routing_rule_round_trips_through_sdk_types() {
        let rule = config::RoutingRule {
            condition: Some(config::RoutingCondition {
                http_error_code: Some("404".to_string()),
                key_prefix: None,
            }),
            redirect: config::Redirect {
                host_name: Some("mybucket.s3-website-us-east-1.amazonaws.com".to_string()),
                replace_key_prefix_with: Some("#!/".to_string()),
            },
        };
        let back = routing_rule_from_sdk(&routing_rule_to_sdk(&rule));
        assert_eq!(back, rule);
    }

    #[test]
    fn sdk_rule_without_redirect_maps_to_empty_redirect() {
        let rule = routing_rule_from_sdk(&RoutingRule::builder().build());
        assert!(rule.redirect.host_name.is_none());
        assert!(rule.redirect.replace_key_prefix_with.is_none());
        assert!(rule.condition.is_none());
    }
}
