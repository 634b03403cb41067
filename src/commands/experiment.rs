//! Experiment commands

use crate::error::Result;
use crate::experiment::{
    complete_experiment, create_experiment, declare_winner, delete_experiment,
    get_experiment_detail, list_experiments, start_experiment, CreateExperiment, ExperimentDetail,
};
use crate::meta::{Experiment, MetaDb};
use crate::models::SuccessMetric;

/// Create a draft experiment
pub async fn cmd_create_experiment(
    db: &MetaDb,
    org_id: &str,
    playbook_id: &str,
    name: &str,
    description: Option<String>,
    success_metric: SuccessMetric,
    variant_ids: Vec<String>,
) -> Result<ExperimentDetail> {
    let request = CreateExperiment {
        org_id: org_id.to_string(),
        playbook_id: playbook_id.to_string(),
        name: name.to_string(),
        description,
        success_metric,
        variant_ids,
    };
    create_experiment(db, &request).await
}

pub async fn cmd_show_experiment(db: &MetaDb, id: &str) -> Result<ExperimentDetail> {
    get_experiment_detail(db, id).await
}

pub async fn cmd_list_experiments(db: &MetaDb, org_id: &str) -> Result<Vec<Experiment>> {
    list_experiments(db, org_id).await
}

pub async fn cmd_start_experiment(db: &MetaDb, id: &str) -> Result<ExperimentDetail> {
    start_experiment(db, id).await?;
    get_experiment_detail(db, id).await
}

pub async fn cmd_complete_experiment(db: &MetaDb, id: &str) -> Result<ExperimentDetail> {
    complete_experiment(db, id).await?;
    get_experiment_detail(db, id).await
}

pub async fn cmd_delete_experiment(db: &MetaDb, id: &str) -> Result<()> {
    delete_experiment(db, id).await
}

pub async fn cmd_declare_winner(
    db: &MetaDb,
    id: &str,
    experiment_variant_id: &str,
) -> Result<ExperimentDetail> {
    declare_winner(db, id, experiment_variant_id).await?;
    get_experiment_detail(db, id).await
}

/// Print experiments list to console
pub fn print_experiments(experiments: &[Experiment]) {
    println!("\n🔬 Experiments\n");

    if experiments.is_empty() {
        println!("No experiments. Use 'playbooks experiment create' to start one.");
        return;
    }

    for experiment in experiments {
        println!("• {} [{}]", experiment.name, experiment.status);
        println!("  ID: {}", experiment.id);
        println!("  Playbook: {}", experiment.playbook_id);
        println!("  Metric: {}", experiment.success_metric);
        println!();
    }
}

/// Print experiment detail to console
pub fn print_experiment_detail(detail: &ExperimentDetail) {
    let experiment = &detail.experiment;
    println!("\n🔬 {} [{}]\n", experiment.name, experiment.status);
    println!("ID: {}", experiment.id);
    if let Some(description) = &experiment.description {
        println!("Description: {}", description);
    }
    println!("Playbook: {}", experiment.playbook_id);
    println!("Success metric: {}", experiment.success_metric);
    if let Some(start) = &experiment.start_date {
        println!("Started: {}", start);
    }
    if let Some(end) = &experiment.end_date {
        println!("Completed: {}", end);
    }

    println!("\nVariants:");
    for v in &detail.variants {
        let marker = if experiment.winner_id.as_deref() == Some(v.link.id.as_str()) {
            " 🏆"
        } else {
            ""
        };
        println!("  • {} [{}]{}", v.variant.name, v.variant.variant_type, marker);
        println!("    Link ID: {}", v.link.id);
        println!(
            "    Content: {}, Reach: {}, Engagement: {}",
            v.link.content_count, v.link.total_reach, v.link.total_engagement
        );
        println!(
            "    Avg engagement rate: {:.2}%, Pooled: {:.2}%",
            v.link.avg_engagement_rate, v.pooled_engagement_rate
        );
    }
}
