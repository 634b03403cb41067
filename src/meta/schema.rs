//! SQLite schema definition

/// SQL schema for the playbooks database
pub const SCHEMA_SQL: &str = r#"
-- Content items: published pieces of content (owned by ingestion)
CREATE TABLE IF NOT EXISTS content_items (
    id TEXT PRIMARY KEY,
    org_id TEXT NOT NULL,
    integration_id TEXT NOT NULL,
    format TEXT NOT NULL,
    caption TEXT,
    hashtags_json TEXT,
    published_at TEXT NOT NULL,
    created_at TEXT NOT NULL
);

-- Daily metrics: one row per content item per day, every counter nullable
CREATE TABLE IF NOT EXISTS daily_metrics (
    content_id TEXT NOT NULL REFERENCES content_items(id),
    metric_date TEXT NOT NULL,
    impressions INTEGER,
    reach INTEGER,
    reactions INTEGER,
    comments INTEGER,
    shares INTEGER,
    video_views INTEGER,
    clicks INTEGER,
    PRIMARY KEY(content_id, metric_date)
);

-- Group membership: which integrations make up a group
CREATE TABLE IF NOT EXISTS group_integrations (
    org_id TEXT NOT NULL,
    group_id TEXT NOT NULL,
    integration_id TEXT NOT NULL,
    PRIMARY KEY(group_id, integration_id)
);

-- Playbooks: winning formulas per format group
CREATE TABLE IF NOT EXISTS playbooks (
    id TEXT PRIMARY KEY,
    org_id TEXT NOT NULL,
    group_id TEXT,
    format TEXT NOT NULL,
    recipe_json TEXT NOT NULL,
    evidence_json TEXT NOT NULL,
    consistency_score REAL NOT NULL,
    created_at TEXT NOT NULL,
    deleted_at TEXT
);

-- Playbook sources: ordered winner set used to build a playbook
CREATE TABLE IF NOT EXISTS playbook_sources (
    playbook_id TEXT NOT NULL REFERENCES playbooks(id),
    content_id TEXT NOT NULL REFERENCES content_items(id),
    position INTEGER NOT NULL,
    PRIMARY KEY(playbook_id, content_id)
);

-- Playbook variants: derived recipes, one live set per playbook
CREATE TABLE IF NOT EXISTS playbook_variants (
    id TEXT PRIMARY KEY,
    playbook_id TEXT NOT NULL REFERENCES playbooks(id),
    name TEXT NOT NULL,
    variant_type TEXT NOT NULL,
    recipe_json TEXT NOT NULL,
    description TEXT NOT NULL,
    position INTEGER NOT NULL,
    created_at TEXT NOT NULL,
    deleted_at TEXT
);

-- Experiments: A/B/C tests bound to a playbook
CREATE TABLE IF NOT EXISTS experiments (
    id TEXT PRIMARY KEY,
    org_id TEXT NOT NULL,
    playbook_id TEXT NOT NULL REFERENCES playbooks(id),
    name TEXT NOT NULL,
    description TEXT,
    success_metric TEXT NOT NULL,
    status TEXT NOT NULL,
    start_date TEXT,
    end_date TEXT,
    winner_id TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    deleted_at TEXT
);

-- Experiment variants: experiment <-> playbook variant with rolling aggregates
CREATE TABLE IF NOT EXISTS experiment_variants (
    id TEXT PRIMARY KEY,
    experiment_id TEXT NOT NULL REFERENCES experiments(id),
    playbook_variant_id TEXT NOT NULL REFERENCES playbook_variants(id),
    position INTEGER NOT NULL,
    total_reach INTEGER NOT NULL DEFAULT 0,
    total_engagement INTEGER NOT NULL DEFAULT 0,
    content_count INTEGER NOT NULL DEFAULT 0,
    avg_engagement_rate REAL NOT NULL DEFAULT 0,
    updated_at TEXT NOT NULL,
    UNIQUE(experiment_id, playbook_variant_id)
);

-- Tracked content: content attributed to an experiment variant
CREATE TABLE IF NOT EXISTS experiment_tracked_content (
    id TEXT PRIMARY KEY,
    experiment_variant_id TEXT NOT NULL REFERENCES experiment_variants(id),
    content_id TEXT NOT NULL REFERENCES content_items(id),
    match_score REAL NOT NULL,
    tracked_at TEXT NOT NULL,
    deleted_at TEXT,
    UNIQUE(experiment_variant_id, content_id)
);

-- Indexes for performance
CREATE INDEX IF NOT EXISTS idx_content_org_published ON content_items(org_id, published_at);
CREATE INDEX IF NOT EXISTS idx_metrics_date ON daily_metrics(metric_date);
CREATE INDEX IF NOT EXISTS idx_playbooks_org ON playbooks(org_id);
CREATE INDEX IF NOT EXISTS idx_variants_playbook ON playbook_variants(playbook_id);
CREATE INDEX IF NOT EXISTS idx_experiments_org ON experiments(org_id);
CREATE INDEX IF NOT EXISTS idx_experiment_variants_exp ON experiment_variants(experiment_id);
CREATE INDEX IF NOT EXISTS idx_tracked_content ON experiment_tracked_content(content_id);
"#;
