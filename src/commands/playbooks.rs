//! Playbook listing, inspection and deletion

use crate::error::{Error, Result};
use crate::meta::{MetaDb, Playbook, PlaybookVariant};
use crate::models::{Evidence, Recipe};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Playbook with decoded recipe and evidence
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybookInfo {
    pub id: String,
    pub org_id: String,
    pub group_id: Option<String>,
    pub format: String,
    pub recipe: Recipe,
    pub evidence: Evidence,
    pub consistency_score: f64,
    pub created_at: String,
}

impl PlaybookInfo {
    fn from_row(playbook: Playbook) -> Result<Self> {
        Ok(Self {
            recipe: playbook.recipe()?,
            evidence: playbook.evidence()?,
            id: playbook.id,
            org_id: playbook.org_id,
            group_id: playbook.group_id,
            format: playbook.format,
            consistency_score: playbook.consistency_score,
            created_at: playbook.created_at,
        })
    }
}

/// A playbook with its sources and live variants
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybookDetail {
    #[serde(flatten)]
    pub playbook: PlaybookInfo,
    pub source_content_ids: Vec<String>,
    pub variants: Vec<PlaybookVariant>,
}

/// List an organization's live playbooks
pub async fn cmd_list_playbooks(db: &MetaDb, org_id: &str) -> Result<Vec<PlaybookInfo>> {
    info!(org_id, "Listing playbooks");
    db.list_playbooks(org_id)
        .await?
        .into_iter()
        .map(PlaybookInfo::from_row)
        .collect()
}

/// Show one playbook
pub async fn cmd_show_playbook(db: &MetaDb, id: &str) -> Result<PlaybookDetail> {
    let playbook = db
        .get_playbook(id)
        .await?
        .ok_or_else(|| Error::PlaybookNotFound(id.to_string()))?;

    let source_content_ids = db.list_playbook_sources(&playbook.id).await?;
    let variants = db.list_live_variants(&playbook.id).await?;

    Ok(PlaybookDetail {
        playbook: PlaybookInfo::from_row(playbook)?,
        source_content_ids,
        variants,
    })
}

/// Soft-delete a playbook
pub async fn cmd_delete_playbook(db: &MetaDb, id: &str) -> Result<()> {
    if !db.soft_delete_playbook(id).await? {
        return Err(Error::PlaybookNotFound(id.to_string()));
    }
    info!(playbook_id = id, "Deleted playbook");
    Ok(())
}

/// Print playbooks list to console
pub fn print_playbooks(playbooks: &[PlaybookInfo]) {
    println!("\n📘 Playbooks\n");

    if playbooks.is_empty() {
        println!("No playbooks yet. Use 'playbooks generate' to create some.");
        return;
    }

    for playbook in playbooks {
        println!("• {} [{}]", playbook.id, playbook.format);
        println!(
            "  Winners: {}, Median reach: {:.0}, Engagement rate: {:.2}%",
            playbook.evidence.content_count,
            playbook.evidence.median_reach,
            playbook.evidence.engagement_rate
        );
        println!("  Consistency: {:.2}", playbook.consistency_score);
        println!("  Created: {}", playbook.created_at);
        println!();
    }
}

fn print_list(label: &str, values: &[String]) {
    if values.is_empty() {
        println!("  {}: -", label);
    } else {
        println!("  {}: {}", label, values.join(", "));
    }
}

/// Print a recipe, indented
pub fn print_recipe(recipe: &Recipe) {
    print_list("Hooks", &recipe.hooks);
    print_list("CTAs", &recipe.cta_patterns);
    print_list(
        "Hashtags",
        &recipe
            .hashtag_bucket
            .iter()
            .map(|t| format!("#{}", t))
            .collect::<Vec<_>>(),
    );
    print_list(
        "Best hours",
        &recipe.best_hours.iter().map(|h| format!("{:02}:00", h)).collect::<Vec<_>>(),
    );
    print_list(
        "Best days",
        &recipe.best_days.iter().map(|d| weekday_name(*d).to_string()).collect::<Vec<_>>(),
    );
}

fn weekday_name(day: u32) -> &'static str {
    match day {
        0 => "Sun",
        1 => "Mon",
        2 => "Tue",
        3 => "Wed",
        4 => "Thu",
        5 => "Fri",
        6 => "Sat",
        _ => "?",
    }
}

/// Print playbook detail to console
pub fn print_playbook_detail(detail: &PlaybookDetail) {
    let playbook = &detail.playbook;
    println!("\n📘 Playbook {}\n", playbook.id);
    println!("Format: {}", playbook.format);
    if let Some(group) = &playbook.group_id {
        println!("Group: {}", group);
    }
    println!("Created: {}", playbook.created_at);

    println!("\nRecipe:");
    print_recipe(&playbook.recipe);

    println!("\nEvidence:");
    println!("  Winners: {}", playbook.evidence.content_count);
    println!("  Median reach: {:.1}", playbook.evidence.median_reach);
    println!("  Median engagement: {:.1}", playbook.evidence.median_engagement);
    println!("  Engagement rate: {:.2}%", playbook.evidence.engagement_rate);
    println!("  Consistency: {:.2}", playbook.consistency_score);

    println!("\nSources: {}", detail.source_content_ids.join(", "));

    if detail.variants.is_empty() {
        println!("\nNo variants. Use 'playbooks variants generate {}'.", playbook.id);
    } else {
        println!("\nVariants:");
        for variant in &detail.variants {
            println!("  • {} [{}] {}", variant.name, variant.variant_type, variant.id);
        }
    }
}
