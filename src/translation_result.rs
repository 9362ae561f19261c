//! Translation result / batch: the per-entity and per-run outcome records
//! consumable by any front end (base spec §3).

use crate::entity::Entity;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone)]
pub struct TranslationResult {
    pub original: Entity,
    pub rewritten: Entity,
    pub mapping_used: HashMap<String, String>,
    pub missing_properties: HashSet<String>,
    pub missing_items: HashSet<String>,
    pub created_entity: Option<Entity>,
    pub errors: Vec<String>,
    /// Set when translation hit a failure base spec §4.3/§7 treats as fatal
    /// for this entity (unsupported lexeme, sitelink back-reference on a
    /// kind without sitelinks). A fatal result is never written.
    pub fatal: bool,
}

impl TranslationResult {
    #[must_use]
    pub fn new(original: Entity, rewritten: Entity) -> Self {
        Self {
            original,
            rewritten,
            mapping_used: HashMap::new(),
            missing_properties: HashSet::new(),
            missing_items: HashSet::new(),
            created_entity: None,
            errors: Vec::new(),
            fatal: false,
        }
    }

    pub fn record_mapping(&mut self, source: impl Into<String>, target: impl Into<String>) {
        self.mapping_used.insert(source.into(), target.into());
    }

    pub fn record_missing_property(&mut self, pid: impl Into<String>) {
        self.missing_properties.insert(pid.into());
    }

    pub fn record_missing_item(&mut self, qid: impl Into<String>) {
        self.missing_items.insert(qid.into());
    }

    /// Appends a documentary note: every casting decision is recorded here,
    /// success or refusal, not just failures (base spec §4.3).
    pub fn note(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    /// Records a fatal, entity-aborting failure (base spec §7's
    /// [`crate::error::MigrationError`] variants surfaced per-entity rather
    /// than propagated out of the whole batch).
    pub fn fail_fatal(&mut self, err: crate::error::MigrationError) {
        self.errors.push(err.to_string());
        self.fatal = true;
    }

    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// An aggregated run: source-ID → [`TranslationResult`] with query helpers
/// for the union of mappings used, missing ids, and id lists (base spec §3).
#[derive(Debug, Clone, Default)]
pub struct TranslationBatch {
    pub results: HashMap<String, TranslationResult>,
}

impl TranslationBatch {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, source_id: impl Into<String>, result: TranslationResult) {
        self.results.insert(source_id.into(), result);
    }

    #[must_use]
    pub fn union_mappings_used(&self) -> HashMap<String, String> {
        let mut out = HashMap::new();
        for result in self.results.values() {
            out.extend(result.mapping_used.clone());
        }
        out
    }

    #[must_use]
    pub fn all_missing_properties(&self) -> HashSet<String> {
        self.results
            .values()
            .flat_map(|r| r.missing_properties.iter().cloned())
            .collect()
    }

    #[must_use]
    pub fn all_missing_items(&self) -> HashSet<String> {
        self.results
            .values()
            .flat_map(|r| r.missing_items.iter().cloned())
            .collect()
    }

    #[must_use]
    pub fn source_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.results.keys().cloned().collect();
        ids.sort();
        ids
    }

    #[must_use]
    pub fn target_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .results
            .values()
            .filter_map(|r| r.created_entity.as_ref().map(|e| e.id.clone()))
            .collect();
        ids.sort();
        ids
    }

    #[must_use]
    pub fn failed_source_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .results
            .iter()
            .filter(|(_, r)| (r.has_errors() || r.fatal) && r.created_entity.is_none())
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityKind;

    #[test]
    fn union_mappings_used_combines_every_result() {
        let mut batch = TranslationBatch::new();
        let mut r1 = TranslationResult::new(
            Entity::new("Q1", EntityKind::Item),
            Entity::new("", EntityKind::Item),
        );
        r1.record_mapping("P31", "P279");
        batch.insert("Q1", r1);

        let mut r2 = TranslationResult::new(
            Entity::new("Q2", EntityKind::Item),
            Entity::new("", EntityKind::Item),
        );
        r2.record_mapping("P21", "P777");
        batch.insert("Q2", r2);

        let union = batch.union_mappings_used();
        assert_eq!(union.get("P31"), Some(&"P279".to_string()));
        assert_eq!(union.get("P21"), Some(&"P777".to_string()));
    }

    #[test]
    fn failed_source_ids_excludes_successful_writes() {
        let mut batch = TranslationBatch::new();
        let mut ok = TranslationResult::new(
            Entity::new("Q1", EntityKind::Item),
            Entity::new("", EntityKind::Item),
        );
        ok.created_entity = Some(Entity::new("Q100", EntityKind::Item));
        batch.insert("Q1", ok);

        let mut failed = TranslationResult::new(
            Entity::new("Q2", EntityKind::Item),
            Entity::new("", EntityKind::Item),
        );
        failed.note("wbeditentity failed: permission denied");
        batch.insert("Q2", failed);

        assert_eq!(batch.failed_source_ids(), vec!["Q2".to_string()]);
    }
}
