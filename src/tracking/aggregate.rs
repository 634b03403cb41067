//! Experiment variant metric aggregation

use crate::error::{Error, Result};
use crate::meta::{totals_by_content, MetaDb, MetricsStore};
use crate::models::{engagement_rate, VariantAggregate};
use tracing::{debug, warn};

/// Recompute and store an experiment variant's aggregates from its live
/// tracked content. Items whose content or metrics cannot be read are
/// logged and left out.
pub async fn recompute_variant_metrics(
    db: &MetaDb,
    experiment_variant_id: &str,
) -> Result<VariantAggregate> {
    if db.get_experiment_variant(experiment_variant_id).await?.is_none() {
        return Err(Error::VariantNotFound(experiment_variant_id.to_string()));
    }

    let tracked = db.list_tracked_content(experiment_variant_id).await?;

    let mut aggregate = VariantAggregate::default();
    let mut rate_sum = 0.0;

    for row in &tracked {
        let item = match db.get_content_item(&row.content_id).await {
            Ok(Some(item)) => item,
            Ok(None) => {
                warn!(content_id = %row.content_id, "Tracked content is missing, skipping");
                continue;
            }
            Err(e) => {
                warn!(content_id = %row.content_id, "Failed to load tracked content: {}", e);
                continue;
            }
        };

        let ids = [item.id.clone()];
        let metrics = match db.fetch_daily_metrics(&item.org_id, &ids, None).await {
            Ok(metrics) => metrics,
            Err(e) => {
                warn!(content_id = %item.id, "Failed to load metrics: {}", e);
                continue;
            }
        };

        let totals = totals_by_content(&metrics)
            .remove(&item.id)
            .unwrap_or_default();
        let reach = totals.best_known_reach();
        let engagement = totals.engagement();

        aggregate.content_count += 1;
        aggregate.total_reach += reach;
        aggregate.total_engagement += engagement;
        rate_sum += engagement_rate(engagement, reach).unwrap_or(0.0);
    }

    if aggregate.content_count > 0 {
        aggregate.avg_engagement_rate = rate_sum / aggregate.content_count as f64;
    }

    db.update_variant_aggregate(experiment_variant_id, &aggregate)
        .await?;
    debug!(
        experiment_variant_id,
        content_count = aggregate.content_count,
        total_reach = aggregate.total_reach,
        avg_engagement_rate = aggregate.avg_engagement_rate,
        "Recomputed variant metrics"
    );

    Ok(aggregate)
}
