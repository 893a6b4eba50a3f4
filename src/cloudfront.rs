//! CloudFront implementation of the [`Cdn`] seam.

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_cloudfront::primitives::{DateTime, DateTimeFormat};
use aws_sdk_cloudfront::types::{
    Aliases, CustomOriginConfig, DefaultCacheBehavior, DistributionConfig, InvalidationBatch,
    Origin, OriginProtocolPolicy, Origins, Paths, PriceClass, ViewerProtocolPolicy,
};
use tracing::debug;

use crate::cdn::{
    Cdn, CdnError, DistributionDetail, DistributionSummary, Invalidation, NewDistribution,
    RootObjectUpdate,
};

/// Managed "CachingOptimized" cache policy. Created distributions use it
/// instead of the legacy forwarded-values configuration.
const CACHING_OPTIMIZED_POLICY_ID: &str = "658327ea-f89d-4fab-a63d-7e88639e58f6";

fn boxed<E>(err: E) -> Box<dyn std::error::Error + Send + Sync>
where
    E: std::error::Error + Send + Sync + 'static,
{
    Box::new(err)
}

pub struct CloudFrontCdn {
    client: aws_sdk_cloudfront::Client,
}

impl CloudFrontCdn {
    pub fn new(sdk_config: &SdkConfig) -> Self {
        Self {
            client: aws_sdk_cloudfront::Client::new(sdk_config),
        }
    }
}

/// Website endpoints are plain HTTP hosts, so the origin speaks HTTP only.
fn build_config(settings: &NewDistribution) -> Result<DistributionConfig, CdnError> {
    let map_err = |source| CdnError::CreateDistribution {
        origin_domain: settings.origin_domain.clone(),
        source,
    };

    let custom_origin = CustomOriginConfig::builder()
        .http_port(80)
        .https_port(443)
        .origin_protocol_policy(OriginProtocolPolicy::HttpOnly)
        .build()
        .map_err(|e| map_err(boxed(e)))?;

    let origin = Origin::builder()
        .id(&settings.origin_id)
        .domain_name(&settings.origin_domain)
        .origin_path(&settings.origin_path)
        .custom_origin_config(custom_origin)
        .build()
        .map_err(|e| map_err(boxed(e)))?;

    let behavior = DefaultCacheBehavior::builder()
        .target_origin_id(&settings.origin_id)
        .viewer_protocol_policy(ViewerProtocolPolicy::RedirectToHttps)
        .cache_policy_id(CACHING_OPTIMIZED_POLICY_ID)
        .build()
        .map_err(|e| map_err(boxed(e)))?;

    let mut builder = DistributionConfig::builder()
        .caller_reference(&settings.caller_reference)
        .comment(&settings.comment)
        .enabled(settings.enabled)
        .origins(
            Origins::builder()
                .quantity(1)
                .items(origin)
                .build()
                .map_err(|e| map_err(boxed(e)))?,
        )
        .default_cache_behavior(behavior);

    if let Some(root) = &settings.default_root_object {
        builder = builder.default_root_object(root);
    }
    if let Some(price_class) = &settings.price_class {
        builder = builder.price_class(PriceClass::from(price_class.as_str()));
    }
    if !settings.aliases.is_empty() {
        builder = builder.aliases(
            Aliases::builder()
                .quantity(settings.aliases.len() as i32)
                .set_items(Some(settings.aliases.clone()))
                .build()
                .map_err(|e| map_err(boxed(e)))?,
        );
    }

    builder.build().map_err(|e| map_err(boxed(e)))
}

/// RFC 3339 rendering of an invalidation timestamp for the report.
fn format_create_time(time: &DateTime) -> Option<String> {
    time.fmt(DateTimeFormat::DateTime).ok()
}

fn summary_from_distribution(
    distribution: &aws_sdk_cloudfront::types::Distribution,
) -> DistributionSummary {
    let config = distribution.distribution_config.as_ref();
    DistributionSummary {
        id: distribution.id.clone(),
        domain_name: distribution.domain_name.clone(),
        origin_domains: config
            .and_then(|c| c.origins.as_ref())
            .map(|o| o.items.iter().map(|i| i.domain_name.clone()).collect())
            .unwrap_or_default(),
        aliases: config
            .and_then(|c| c.aliases.as_ref())
            .and_then(|a| a.items.clone())
            .unwrap_or_default(),
    }
}

#[async_trait]
impl Cdn for CloudFrontCdn {
    async fn list_distributions(&self) -> Result<Vec<DistributionSummary>, CdnError> {
        let mut summaries = Vec::new();
        let mut marker: Option<String> = None;

        loop {
            let mut request = self.client.list_distributions();
            if let Some(marker) = &marker {
                request = request.marker(marker);
            }
            let out = request
                .send()
                .await
                .map_err(|e| CdnError::ListDistributions { source: boxed(e) })?;

            let Some(list) = out.distribution_list else {
                break;
            };
            for item in list.items() {
                summaries.push(DistributionSummary {
                    id: item.id.clone(),
                    domain_name: item.domain_name.clone(),
                    origin_domains: item
                        .origins
                        .as_ref()
                        .map(|o| o.items.iter().map(|i| i.domain_name.clone()).collect())
                        .unwrap_or_default(),
                    aliases: item
                        .aliases
                        .as_ref()
                        .and_then(|a| a.items.clone())
                        .unwrap_or_default(),
                });
            }

            if list.is_truncated {
                marker = list.next_marker;
            } else {
                break;
            }
        }

        debug!(count = summaries.len(), "Listed distributions");
        Ok(summaries)
    }

    async fn create_distribution(
        &self,
        settings: NewDistribution,
    ) -> Result<DistributionSummary, CdnError> {
        let config = build_config(&settings)?;
        let out = self
            .client
            .create_distribution()
            .distribution_config(config)
            .send()
            .await
            .map_err(|e| CdnError::CreateDistribution {
                origin_domain: settings.origin_domain.clone(),
                source: boxed(e),
            })?;

        let distribution = out.distribution.ok_or_else(|| CdnError::CreateDistribution {
            origin_domain: settings.origin_domain.clone(),
            source: "create response carried no distribution".into(),
        })?;
        Ok(summary_from_distribution(&distribution))
    }

    async fn get_distribution(&self, id: &str) -> Result<DistributionDetail, CdnError> {
        let map_err = |source| CdnError::GetDistribution {
            id: id.to_string(),
            source,
        };

        let out = self
            .client
            .get_distribution()
            .id(id)
            .send()
            .await
            .map_err(|e| map_err(boxed(e)))?;

        let etag = out.e_tag.unwrap_or_default();
        let distribution = out
            .distribution
            .ok_or_else(|| map_err("get response carried no distribution".into()))?;
        let config = distribution.distribution_config.as_ref();

        Ok(DistributionDetail {
            id: distribution.id.clone(),
            etag,
            default_root_object: config
                .and_then(|c| c.default_root_object.clone())
                .filter(|root| !root.is_empty()),
            origin_path: config
                .and_then(|c| c.origins.as_ref())
                .and_then(|o| o.items.first())
                .and_then(|i| i.origin_path.clone())
                .unwrap_or_default(),
        })
    }

    async fn update_root_object(
        &self,
        id: &str,
        if_match: &str,
        update: RootObjectUpdate,
    ) -> Result<(), CdnError> {
        let map_err = |source| CdnError::UpdateDistribution {
            id: id.to_string(),
            source,
        };

        // Fetch the live config and patch only the fields this run owns.
        // The caller's if_match token makes this a compare-and-swap: the
        // service rejects the update when the state moved underneath us.
        let out = self
            .client
            .get_distribution_config()
            .id(id)
            .send()
            .await
            .map_err(|e| map_err(boxed(e)))?;
        let mut config = out
            .distribution_config
            .ok_or_else(|| map_err("get-config response carried no configuration".into()))?;

        config.default_root_object = Some(update.default_root_object);
        if let Some(first) = config
            .origins
            .as_mut()
            .and_then(|o| o.items.first_mut())
        {
            first.origin_path = Some(update.origin_path);
        }

        self.client
            .update_distribution()
            .id(id)
            .if_match(if_match)
            .distribution_config(config)
            .send()
            .await
            .map_err(|e| map_err(boxed(e)))?;
        Ok(())
    }

    async fn create_invalidation(
        &self,
        id: &str,
        caller_reference: &str,
        paths: Vec<String>,
    ) -> Result<Invalidation, CdnError> {
        let map_err = |source| CdnError::CreateInvalidation {
            id: id.to_string(),
            source,
        };

        let batch = InvalidationBatch::builder()
            .caller_reference(caller_reference)
            .paths(
                Paths::builder()
                    .quantity(paths.len() as i32)
                    .set_items(Some(paths))
                    .build()
                    .map_err(|e| map_err(boxed(e)))?,
            )
            .build()
            .map_err(|e| map_err(boxed(e)))?;

        let out = self
            .client
            .create_invalidation()
            .distribution_id(id)
            .invalidation_batch(batch)
            .send()
            .await
            .map_err(|e| map_err(boxed(e)))?;

        let invalidation = out
            .invalidation
            .ok_or_else(|| map_err("create response carried no invalidation".into()))?;
        Ok(Invalidation {
            id: invalidation.id.clone(),
            status: invalidation.status.clone(),
            create_time: format_create_time(&invalidation.create_time),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_cloudfront::types::Distribution;

    const ENDPOINT: &str = "mybucket.s3-website-us-east-1.amazonaws.com";

    fn sample_distribution() -> Distribution {
        let origin = Origin::builder()
            .id(format!("Custom-{ENDPOINT}"))
            .domain_name(ENDPOINT)
            .build()
            .unwrap();
        let behavior = DefaultCacheBehavior::builder()
            .target_origin_id(format!("Custom-{ENDPOINT}"))
            .viewer_protocol_policy(ViewerProtocolPolicy::RedirectToHttps)
            .build()
            .unwrap();
        let config = DistributionConfig::builder()
            .caller_reference("ref-1")
            .comment("")
            .enabled(true)
            .origins(
                Origins::builder()
                    .quantity(1)
                    .items(origin)
                    .build()
                    .unwrap(),
            )
            .default_cache_behavior(behavior)
            .aliases(
                Aliases::builder()
                    .quantity(1)
                    .items("www.example.com")
                    .build()
                    .unwrap(),
            )
            .build()
            .unwrap();
        Distribution::builder()
            .id("EDIST123")
            .arn("arn:aws:cloudfront::123456789012:distribution/EDIST123")
            .status("Deployed")
            .last_modified_time(DateTime::from_secs(0))
            .in_progress_invalidation_batches(0)
            .domain_name("d111abc.cloudfront.net")
            .distribution_config(config)
            .build()
            .unwrap()
    }

    #[test]
    fn summary_reads_origins_and_aliases_from_nested_config() {
        let summary = summary_from_distribution(&sample_distribution());
        assert_eq!(summary.id, "EDIST123");
        assert_eq!(summary.domain_name, "d111abc.cloudfront.net");
        assert_eq!(summary.origin_domains, vec![ENDPOINT.to_string()]);
        assert_eq!(summary.aliases, vec!["www.example.com".to_string()]);
        assert!(summary.fronts(ENDPOINT));
    }

    #[test]
    fn create_time_renders_as_rfc3339() {
        assert_eq!(
            format_create_time(&DateTime::from_secs(0)).as_deref(),
            Some("1970-01-01T00:00:00Z")
        );
    }
}
