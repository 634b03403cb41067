//! Experiment lifecycle
//!
//! Experiments compare 2-3 variants of one playbook and move strictly
//! through `draft -> active -> completed`. Transitions are compare-and-set
//! on the stored status, so a concurrent transition surfaces as a state
//! conflict rather than a lost update.

use crate::error::{Error, Result};
use crate::meta::{Experiment, ExperimentVariant, MetaDb, PlaybookVariant};
use crate::models::{ExperimentStatus, SuccessMetric};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::info;

pub const MIN_EXPERIMENT_VARIANTS: usize = 2;
pub const MAX_EXPERIMENT_VARIANTS: usize = 3;

/// Input for a new experiment
#[derive(Debug, Clone)]
pub struct CreateExperiment {
    pub org_id: String,
    pub playbook_id: String,
    pub name: String,
    pub description: Option<String>,
    pub success_metric: SuccessMetric,
    /// Playbook variant ids to compare
    pub variant_ids: Vec<String>,
}

/// An experiment variant link with the playbook variant it points at
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentVariantDetail {
    #[serde(flatten)]
    pub link: ExperimentVariant,
    pub variant: PlaybookVariant,
    pub pooled_engagement_rate: f64,
}

/// An experiment with its nested variants
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentDetail {
    #[serde(flatten)]
    pub experiment: Experiment,
    pub variants: Vec<ExperimentVariantDetail>,
}

/// Create a draft experiment over live variants of one playbook
pub async fn create_experiment(db: &MetaDb, request: &CreateExperiment) -> Result<ExperimentDetail> {
    let count = request.variant_ids.len();
    if !(MIN_EXPERIMENT_VARIANTS..=MAX_EXPERIMENT_VARIANTS).contains(&count) {
        return Err(Error::Validation(format!(
            "An experiment needs {} to {} variants, got {}",
            MIN_EXPERIMENT_VARIANTS, MAX_EXPERIMENT_VARIANTS, count
        )));
    }
    if request.name.trim().is_empty() {
        return Err(Error::Validation("Experiment name must not be empty".to_string()));
    }
    let unique: HashSet<&String> = request.variant_ids.iter().collect();
    if unique.len() != count {
        return Err(Error::Validation(
            "Experiment variants must be distinct".to_string(),
        ));
    }

    let playbook = db
        .get_playbook(&request.playbook_id)
        .await?
        .filter(|p| p.org_id == request.org_id)
        .ok_or_else(|| Error::PlaybookNotFound(request.playbook_id.clone()))?;

    let live = db.list_live_variants(&playbook.id).await?;
    let missing: Vec<&str> = request
        .variant_ids
        .iter()
        .filter(|id| !live.iter().any(|v| &v.id == *id))
        .map(String::as_str)
        .collect();
    if !missing.is_empty() {
        return Err(Error::Validation(format!(
            "Variants not found on playbook {}: {}",
            playbook.id,
            missing.join(", ")
        )));
    }

    let experiment = Experiment::new(
        request.org_id.clone(),
        playbook.id.clone(),
        request.name.trim().to_string(),
        request.description.clone(),
        request.success_metric,
    );
    let links: Vec<ExperimentVariant> = request
        .variant_ids
        .iter()
        .enumerate()
        .map(|(position, id)| ExperimentVariant::new(experiment.id.clone(), id.clone(), position as i64))
        .collect();

    db.insert_experiment(&experiment, &links).await?;
    info!(
        experiment_id = %experiment.id,
        playbook_id = %playbook.id,
        variants = links.len(),
        "Created experiment"
    );

    get_experiment_detail(db, &experiment.id).await
}

/// Load a live experiment with its variants
pub async fn get_experiment_detail(db: &MetaDb, id: &str) -> Result<ExperimentDetail> {
    let experiment = load_experiment(db, id).await?;

    let mut variants = Vec::new();
    for link in db.list_experiment_variants(&experiment.id).await? {
        let variant = db
            .get_variant(&link.playbook_variant_id)
            .await?
            .ok_or_else(|| Error::VariantNotFound(link.playbook_variant_id.clone()))?;
        let pooled_engagement_rate = link.aggregate().pooled_engagement_rate();
        variants.push(ExperimentVariantDetail {
            link,
            variant,
            pooled_engagement_rate,
        });
    }

    Ok(ExperimentDetail {
        experiment,
        variants,
    })
}

/// An organization's live experiments
pub async fn list_experiments(db: &MetaDb, org_id: &str) -> Result<Vec<Experiment>> {
    db.list_experiments(org_id).await
}

/// draft -> active
pub async fn start_experiment(db: &MetaDb, id: &str) -> Result<Experiment> {
    transition(db, id, ExperimentStatus::Draft, ExperimentStatus::Active, "start").await
}

/// active -> completed
pub async fn complete_experiment(db: &MetaDb, id: &str) -> Result<Experiment> {
    transition(db, id, ExperimentStatus::Active, ExperimentStatus::Completed, "complete").await
}

/// Soft-delete an experiment in any status
pub async fn delete_experiment(db: &MetaDb, id: &str) -> Result<()> {
    if !db.soft_delete_experiment(id).await? {
        return Err(Error::ExperimentNotFound(id.to_string()));
    }
    info!(experiment_id = id, "Deleted experiment");
    Ok(())
}

/// Record the operator's chosen winning variant
pub async fn declare_winner(
    db: &MetaDb,
    id: &str,
    experiment_variant_id: &str,
) -> Result<Experiment> {
    let experiment = load_experiment(db, id).await?;

    let links = db.list_experiment_variants(&experiment.id).await?;
    if !links.iter().any(|l| l.id == experiment_variant_id) {
        return Err(Error::Validation(format!(
            "Variant {} is not part of experiment {}",
            experiment_variant_id, experiment.id
        )));
    }

    if !db
        .set_experiment_winner(&experiment.id, Some(experiment_variant_id))
        .await?
    {
        return Err(Error::ExperimentNotFound(id.to_string()));
    }
    info!(experiment_id = id, winner = experiment_variant_id, "Declared winner");

    load_experiment(db, id).await
}

async fn transition(
    db: &MetaDb,
    id: &str,
    from: ExperimentStatus,
    to: ExperimentStatus,
    action: &str,
) -> Result<Experiment> {
    let now = Utc::now();
    let (start_date, end_date) = match to {
        ExperimentStatus::Active => (Some(now), None),
        ExperimentStatus::Completed => (None, Some(now)),
        ExperimentStatus::Draft => (None, None),
    };

    if !db
        .transition_experiment(id, from, to, start_date, end_date)
        .await?
    {
        let current = load_experiment(db, id).await?;
        return Err(Error::StateConflict {
            id: id.to_string(),
            status: current.status,
            action: action.to_string(),
        });
    }

    info!(experiment_id = id, from = %from, to = %to, "Experiment transitioned");
    load_experiment(db, id).await
}

async fn load_experiment(db: &MetaDb, id: &str) -> Result<Experiment> {
    db.get_experiment(id)
        .await?
        .ok_or_else(|| Error::ExperimentNotFound(id.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::test_support::*;
    use crate::meta::Playbook;
    use crate::models::{ContentFormat, Evidence, Recipe};
    use crate::variant::regenerate_variants;

    async fn seed_playbook(db: &MetaDb, org: &str) -> (String, Vec<PlaybookVariant>) {
        let playbook = Playbook::new(
            org.to_string(),
            None,
            ContentFormat::Reel,
            &Recipe::default(),
            &Evidence::default(),
            0.0,
        )
        .unwrap();
        db.insert_playbook(&playbook, &[]).await.unwrap();
        let variants = regenerate_variants(db, &playbook.id).await.unwrap();
        (playbook.id, variants)
    }

    fn request(playbook_id: &str, variants: &[PlaybookVariant], n: usize) -> CreateExperiment {
        CreateExperiment {
            org_id: "org".to_string(),
            playbook_id: playbook_id.to_string(),
            name: "Hooks test".to_string(),
            description: None,
            success_metric: SuccessMetric::Engagement,
            variant_ids: variants.iter().take(n).map(|v| v.id.clone()).collect(),
        }
    }

    #[tokio::test]
    async fn test_create_returns_nested_detail() {
        let (db, _tmp) = setup_test_db().await;
        let (playbook_id, variants) = seed_playbook(&db, "org").await;

        let detail = create_experiment(&db, &request(&playbook_id, &variants, 3))
            .await
            .unwrap();
        assert_eq!(detail.experiment.get_status().unwrap(), ExperimentStatus::Draft);
        assert_eq!(detail.variants.len(), 3);
        assert_eq!(detail.variants[0].variant.name, "Direct Hooks");
        assert_eq!(detail.variants[2].variant.id, variants[2].id);
    }

    #[tokio::test]
    async fn test_create_rejects_variant_count() {
        let (db, _tmp) = setup_test_db().await;
        let (playbook_id, variants) = seed_playbook(&db, "org").await;

        for n in [1, 4] {
            let err = create_experiment(&db, &request(&playbook_id, &variants, n))
                .await
                .unwrap_err();
            assert!(matches!(err, Error::Validation(_)), "n={n}: {err:?}");
        }
        assert!(db.list_experiments("org").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_requires_own_playbook() {
        let (db, _tmp) = setup_test_db().await;
        let (playbook_id, variants) = seed_playbook(&db, "other-org").await;

        let err = create_experiment(&db, &request(&playbook_id, &variants, 2))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::PlaybookNotFound(_)));

        let err = create_experiment(&db, &request("missing", &variants, 2))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::PlaybookNotFound(_)));
    }

    #[tokio::test]
    async fn test_create_names_missing_variants() {
        let (db, _tmp) = setup_test_db().await;
        let (playbook_id, variants) = seed_playbook(&db, "org").await;
        // Regeneration invalidates the first set
        regenerate_variants(&db, &playbook_id).await.unwrap();

        let err = create_experiment(&db, &request(&playbook_id, &variants, 2))
            .await
            .unwrap_err();
        match err {
            Error::Validation(msg) => {
                assert!(msg.contains(&variants[0].id));
                assert!(msg.contains(&variants[1].id));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_lifecycle_transitions() {
        let (db, _tmp) = setup_test_db().await;
        let (playbook_id, variants) = seed_playbook(&db, "org").await;
        let id = create_experiment(&db, &request(&playbook_id, &variants, 2))
            .await
            .unwrap()
            .experiment
            .id;

        let err = complete_experiment(&db, &id).await.unwrap_err();
        assert!(matches!(err, Error::StateConflict { ref status, .. } if status == "draft"));

        let started = start_experiment(&db, &id).await.unwrap();
        assert_eq!(started.get_status().unwrap(), ExperimentStatus::Active);
        assert!(started.start_date.is_some());

        let err = start_experiment(&db, &id).await.unwrap_err();
        assert!(matches!(err, Error::StateConflict { .. }));

        let completed = complete_experiment(&db, &id).await.unwrap();
        assert_eq!(completed.get_status().unwrap(), ExperimentStatus::Completed);
        assert!(completed.end_date.is_some());
        assert_eq!(completed.start_date, started.start_date);

        assert!(matches!(
            start_experiment(&db, &id).await.unwrap_err(),
            Error::StateConflict { .. }
        ));
    }

    #[tokio::test]
    async fn test_delete_hides_experiment() {
        let (db, _tmp) = setup_test_db().await;
        let (playbook_id, variants) = seed_playbook(&db, "org").await;
        let id = create_experiment(&db, &request(&playbook_id, &variants, 2))
            .await
            .unwrap()
            .experiment
            .id;

        delete_experiment(&db, &id).await.unwrap();
        assert!(matches!(
            get_experiment_detail(&db, &id).await.unwrap_err(),
            Error::ExperimentNotFound(_)
        ));
        assert!(matches!(
            start_experiment(&db, &id).await.unwrap_err(),
            Error::ExperimentNotFound(_)
        ));
        assert!(matches!(
            delete_experiment(&db, &id).await.unwrap_err(),
            Error::ExperimentNotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_declare_winner() {
        let (db, _tmp) = setup_test_db().await;
        let (playbook_id, variants) = seed_playbook(&db, "org").await;
        let detail = create_experiment(&db, &request(&playbook_id, &variants, 2))
            .await
            .unwrap();
        let id = detail.experiment.id.clone();

        let err = declare_winner(&db, &id, "not-a-link").await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        let winner = &detail.variants[1].link.id;
        let updated = declare_winner(&db, &id, winner).await.unwrap();
        assert_eq!(updated.winner_id.as_deref(), Some(winner.as_str()));
    }
}
