//! Generate command implementation

use crate::config::Config;
use crate::error::Result;
use crate::meta::MetaDb;
use crate::playbook::{generate_playbooks, GenerateRequest};
use crate::variant::regenerate_variants;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Generation statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerateStats {
    pub playbook_ids: Vec<String>,
    pub variants_created: usize,
}

/// Generate playbooks, optionally with a variant set for each
pub async fn cmd_generate(
    config: &Config,
    db: &MetaDb,
    request: &GenerateRequest,
    with_variants: bool,
) -> Result<GenerateStats> {
    info!(org_id = %request.org_id, "Generating playbooks");

    let playbook_ids = generate_playbooks(db, config, request).await?;

    let mut variants_created = 0;
    if with_variants {
        for id in &playbook_ids {
            variants_created += regenerate_variants(db, id).await?.len();
        }
    }

    Ok(GenerateStats {
        playbook_ids,
        variants_created,
    })
}

/// Print generation statistics
pub fn print_generate_stats(stats: &GenerateStats) {
    if stats.playbook_ids.is_empty() {
        println!("No playbooks generated: not enough qualifying content in the window.");
        return;
    }

    println!("\n✨ Generated {} playbook(s)\n", stats.playbook_ids.len());
    for id in &stats.playbook_ids {
        println!("  • {}", id);
    }
    if stats.variants_created > 0 {
        println!("\n  Variants created: {}", stats.variants_created);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::test_support::*;
    use crate::models::ContentFormat;

    #[tokio::test]
    async fn test_generate_with_variants() {
        let (db, _tmp) = setup_test_db().await;
        for (i, reach) in [1000, 1200, 900].iter().enumerate() {
            seed_content(&db, &format!("c{i}"), "org", ContentFormat::Post, None, &[], at(2024, 3, 5 + i as u32, 9), Some(*reach), 50).await;
        }

        let mut request = GenerateRequest::new("org");
        request.now = at(2024, 3, 31, 12);

        let stats = cmd_generate(&Config::default(), &db, &request, true).await.unwrap();
        assert_eq!(stats.playbook_ids.len(), 1);
        assert_eq!(stats.variants_created, 5);
    }
}
