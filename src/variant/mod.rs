//! Deterministic variant generation
//!
//! Every playbook gets exactly five variants, each changing one dimension of
//! the base recipe: two hook styles, two posting windows and a trimmed
//! hashtag set.

use crate::error::{Error, Result};
use crate::meta::{MetaDb, PlaybookVariant};
use crate::models::{Recipe, VariantType};
use tracing::info;

/// Leading words dropped when turning a question into a statement
const INTERROGATIVES: [&str; 6] = ["how", "what", "why", "when", "where", "who"];

const MORNING_HOURS: [u32; 5] = [6, 7, 8, 9, 10];
const EVENING_HOURS: [u32; 5] = [18, 19, 20, 21, 22];
const TIME_SLOTS: usize = 3;
const MAX_HIGH_VOLUME_HASHTAGS: usize = 8;

/// A variant before it is attached to a playbook
#[derive(Debug, Clone, PartialEq)]
pub struct VariantDraft {
    pub name: String,
    pub variant_type: VariantType,
    pub recipe: Recipe,
    pub description: String,
}

/// The five variants of a base recipe, in a fixed order
pub fn generate_variants(base: &Recipe) -> Vec<VariantDraft> {
    let direct_hooks = dedup(base.hooks.iter().map(|h| to_direct_hook(h)));
    let question_hooks = dedup(base.hooks.iter().map(|h| to_question_hook(h)));

    let keep = base.hashtag_bucket.len().div_ceil(2).min(MAX_HIGH_VOLUME_HASHTAGS);
    let high_volume: Vec<String> = base.hashtag_bucket.iter().take(keep).cloned().collect();

    vec![
        VariantDraft {
            name: "Direct Hooks".to_string(),
            variant_type: VariantType::Hook,
            recipe: Recipe {
                hooks: direct_hooks,
                ..base.clone()
            },
            description: "Opens with direct statements instead of questions".to_string(),
        },
        VariantDraft {
            name: "Question Hooks".to_string(),
            variant_type: VariantType::Hook,
            recipe: Recipe {
                hooks: question_hooks,
                ..base.clone()
            },
            description: "Opens with a question to invite a response".to_string(),
        },
        VariantDraft {
            name: "Morning Posting".to_string(),
            variant_type: VariantType::Time,
            recipe: Recipe {
                best_hours: MORNING_HOURS[..TIME_SLOTS].to_vec(),
                ..base.clone()
            },
            description: "Publishes in the early morning window".to_string(),
        },
        VariantDraft {
            name: "Evening Posting".to_string(),
            variant_type: VariantType::Time,
            recipe: Recipe {
                best_hours: EVENING_HOURS[..TIME_SLOTS].to_vec(),
                ..base.clone()
            },
            description: "Publishes in the evening window".to_string(),
        },
        VariantDraft {
            name: "High-Volume Hashtags".to_string(),
            variant_type: VariantType::Hashtag,
            recipe: Recipe {
                hashtag_bucket: high_volume,
                ..base.clone()
            },
            description: "Uses only the most frequent hashtags of the playbook".to_string(),
        },
    ]
}

/// Replace a playbook's live variant set with a freshly generated one
pub async fn regenerate_variants(db: &MetaDb, playbook_id: &str) -> Result<Vec<PlaybookVariant>> {
    let playbook = db
        .get_playbook(playbook_id)
        .await?
        .ok_or_else(|| Error::PlaybookNotFound(playbook_id.to_string()))?;
    let base = playbook.recipe()?;

    let variants = generate_variants(&base)
        .into_iter()
        .enumerate()
        .map(|(position, draft)| {
            PlaybookVariant::new(
                playbook.id.clone(),
                draft.name,
                draft.variant_type,
                &draft.recipe,
                draft.description,
                position as i64,
            )
        })
        .collect::<Result<Vec<_>>>()?;

    let invalidated = db.replace_variants(&playbook.id, &variants).await?;
    info!(
        playbook_id = %playbook.id,
        created = variants.len(),
        invalidated,
        "Generated variants"
    );

    Ok(variants)
}

/// "Why do most diets fail?" -> "Do most diets fail",
/// "How do you stay fit?" -> "You stay fit"
fn to_direct_hook(hook: &str) -> String {
    let mut text = hook.trim().trim_end_matches('?').trim_end();

    if let Some((first, rest)) = text.split_once(char::is_whitespace) {
        if INTERROGATIVES.contains(&first.to_lowercase().as_str()) {
            text = rest.trim_start();
        }
    }

    let rewritten = if starts_with_ignore_case(text, "do you ") {
        format!("You {}", &text[7..])
    } else if starts_with_ignore_case(text, "are you ") {
        format!("You are {}", &text[8..])
    } else {
        text.to_string()
    };

    capitalize(&rewritten)
}

/// "Stop scrolling now!" -> "How can stop scrolling now?"
fn to_question_hook(hook: &str) -> String {
    let text = hook.trim();
    if text.contains('?') {
        return text.to_string();
    }
    let stem = text.trim_end_matches(['.', '!']).trim_end();
    format!("How can {}?", stem.to_lowercase())
}

fn starts_with_ignore_case(text: &str, prefix: &str) -> bool {
    text.get(..prefix.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn dedup(hooks: impl Iterator<Item = String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for hook in hooks {
        if !hook.is_empty() && !out.contains(&hook) {
            out.push(hook);
        }
    }
    out
}
