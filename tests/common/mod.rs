#![allow(dead_code)]

use translator_search::config::SearchConfig;
use translator_search::state::SearchState;

pub const SEED_SQL: &str = "
INSERT INTO projects (id, name) VALUES ('p1', 'Warhammer Units'), ('p2', 'Three Kingdoms');
INSERT INTO languages (id, code, name) VALUES ('l1', 'de', 'German'), ('l2', 'fr', 'French');

INSERT INTO translation_units (id, project_id, key, source_text, source_file, is_obsolete, created_at, updated_at) VALUES
    ('u1', 'p1', 'unit_emperor_title', 'The Emperor commands the legions', 'units.loc', 0, 1700000000000, 1700000000000),
    ('u2', 'p1', 'unit_cavalry_desc', 'Heavy cavalry riding into battle', 'units.loc', 0, 1700000000000, 1700000000000),
    ('u3', 'p1', 'unit_horse_cavalry', 'Cavalry on horse with lances', 'units.loc', 0, 1700000000000, 1700000000000),
    ('u4', 'p1', 'unit_old_emperor', 'Obsolete emperor line', 'old.loc', 1, 1700000000000, 1700000000000),
    ('u5', 'p2', 'emperor_guard', 'Guard of the emperor, emperor of emperors, the emperor himself', 'guard.loc', 0, 1700000000000, 1700000000000);

INSERT INTO translation_versions (id, unit_id, language_id, translated_text, status, created_at, updated_at) VALUES
    ('v1', 'u1', 'l1', 'Der Kaiser befiehlt den Legionen', 'translated', 1700000000000, 1700000000000),
    ('v2', 'u2', 'l2', 'Cavalerie lourde chargeant', 'reviewed', 1700000000000, 1700000000000),
    ('v3', 'u3', 'l1', 'Kavallerie zu Pferd', 'pending', 1700000000000, 1700000000000);

INSERT INTO translation_memory (id, source_text, target_text, source_language_id, target_language_id, quality_score, usage_count, created_at, updated_at) VALUES
    ('m1', 'The Emperor protects', 'Der Kaiser beschützt', NULL, 'l1', 0.9, 3, 1700000000000, 1700000000000),
    ('m2', 'Cavalry charge', 'Charge de cavalerie', NULL, 'l2', 0.8, 1, 1700000000000, 1700000000000);

INSERT INTO glossary_entries (id, term, translation, notes, category, language_code, created_at, updated_at) VALUES
    ('g1', 'Emperor', 'Kaiser', 'Title of the ruler', 'titles', 'de', 1700000000000, 1700000000000),
    ('g2', 'Cavalry', 'Kavallerie', NULL, 'units', 'de', 1700000000000, 1700000000000);
";

pub fn seeded_state(config: SearchConfig) -> SearchState {
    let state = SearchState::in_memory(config).unwrap();
    state
        .storage
        .with_connection(|conn| conn.execute_batch(SEED_SQL))
        .unwrap();
    state
}
