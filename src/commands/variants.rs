//! Variant commands

use crate::commands::print_recipe;
use crate::error::{Error, Result};
use crate::meta::{MetaDb, PlaybookVariant};
use crate::variant::regenerate_variants;

/// Replace a playbook's variants with a fresh set
pub async fn cmd_generate_variants(db: &MetaDb, playbook_id: &str) -> Result<Vec<PlaybookVariant>> {
    regenerate_variants(db, playbook_id).await
}

/// Live variants of a playbook
pub async fn cmd_list_variants(db: &MetaDb, playbook_id: &str) -> Result<Vec<PlaybookVariant>> {
    if db.get_playbook(playbook_id).await?.is_none() {
        return Err(Error::PlaybookNotFound(playbook_id.to_string()));
    }
    db.list_live_variants(playbook_id).await
}

/// Print variants to console
pub fn print_variants(variants: &[PlaybookVariant]) {
    println!("\n🧪 Variants\n");

    if variants.is_empty() {
        println!("No live variants.");
        return;
    }

    for variant in variants {
        println!("• {} [{}]", variant.name, variant.variant_type);
        println!("  ID: {}", variant.id);
        println!("  {}", variant.description);
        match variant.recipe() {
            Ok(recipe) => print_recipe(&recipe),
            Err(e) => println!("  Recipe unreadable: {}", e),
        }
        println!();
    }
}
