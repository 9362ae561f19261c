//! Mapping cache / resolver: source-id → target-id, primed lazily via SPARQL
//! (base spec §4.2). The cache is the only component touched by multiple
//! workers; writes are funnelled through `&mut self` (a single owner task),
//! reads are plain shared lookups once primed.

use crate::datatype::DataType;
use crate::gateway::Gateway;
use crate::profile::MigrationProfile;
use dashmap::DashMap;

#[derive(Debug, Default)]
pub struct MappingCache {
    /// Absent = never queried. Present with `None` = queried, no target found.
    mappings: DashMap<String, Option<String>>,
    source_property_types: DashMap<String, DataType>,
    target_property_types: DashMap<String, DataType>,
}

impl MappingCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// `prepare(ids)` (base spec §4.2): idempotent, splits by prefix, queries
    /// the profile's mapping templates on the mapping-host endpoint.
    pub async fn prepare(&self, ids: &[String], profile: &MigrationProfile, mapping_gateway: &Gateway) {
        let uncached: Vec<String> = ids
            .iter()
            .filter(|id| !self.mappings.contains_key(id.as_str()))
            .cloned()
            .collect();
        if uncached.is_empty() {
            return;
        }
        // Insert every uncached id as unmapped up front, so a concurrent
        // `resolve` on the same id never triggers a second `prepare`.
        for id in &uncached {
            self.mappings.entry(id.clone()).or_insert(None);
        }

        let (properties, items): (Vec<String>, Vec<String>) =
            uncached.into_iter().partition(|id| id.starts_with('P'));

        if !properties.is_empty() {
            let rows = mapping_gateway
                .execute_values_in_chunks(
                    &profile.mapping.property_mapping_query,
                    "$values",
                    &properties,
                    Some(profile.mapping.chunk_size),
                )
                .await;
            self.apply_property_rows(rows);
        }
        if !items.is_empty() {
            let rows = mapping_gateway
                .execute_values_in_chunks(
                    &profile.mapping.item_mapping_query,
                    "$values",
                    &items,
                    Some(profile.mapping.chunk_size),
                )
                .await;
            self.apply_item_rows(rows);
        }
    }

    fn apply_item_rows(&self, rows: Vec<crate::gateway::Row>) {
        let grouped = group_raw_pairs(rows);
        for (source, targets) in grouped {
            let chosen = resolve_conflict_item(&targets);
            self.mappings.insert(source, chosen);
        }
    }

    fn apply_property_rows(&self, rows: Vec<crate::gateway::Row>) {
        let grouped = group_raw_pairs(rows);
        for (source, targets) in grouped {
            let source_type = self.source_property_types.get(&source).map(|r| *r);
            let chosen = resolve_conflict_property(&targets, source_type, |pid| {
                self.target_property_types.get(pid).map(|r| *r)
            });
            self.mappings.insert(source, chosen);
        }
    }

    /// `resolve(id)` (base spec §4.2). This is a pure, synchronous cache
    /// read — it does **not** self-prime on a miss. The caller must have
    /// already called [`Self::prepare`] with `id` (directly, or as part of
    /// the [`crate::translator::harvest_ids`] traversal `orchestrator.rs`
    /// primes with up front); an unprimed `id` returns `None` rather than
    /// triggering a lazy lookup.
    #[must_use]
    pub fn resolve(&self, id: &str) -> Option<String> {
        self.mappings.get(id).and_then(|v| v.clone())
    }

    /// Whether `id` has ever been queried (present in the cache at all,
    /// mapped or not) — used by tests of the monotone-caching invariant.
    #[must_use]
    pub fn is_cached(&self, id: &str) -> bool {
        self.mappings.contains_key(id)
    }

    /// Seeds a mapping directly, bypassing `prepare`. Test-only: exercising
    /// the translator/merger against a cache doesn't need a live gateway.
    #[cfg(test)]
    pub fn mappings_test_insert(&self, id: &str, target: Option<String>) {
        self.mappings.insert(id.to_string(), target);
    }

    pub fn set_property_type(&self, side: Side, pid: &str, datatype: DataType) {
        match side {
            Side::Source => self.source_property_types.insert(pid.to_string(), datatype),
            Side::Target => self.target_property_types.insert(pid.to_string(), datatype),
        };
    }

    #[must_use]
    pub fn property_type(&self, side: Side, pid: &str) -> Option<DataType> {
        match side {
            Side::Source => self.source_property_types.get(pid).map(|r| *r),
            Side::Target => self.target_property_types.get(pid).map(|r| *r),
        }
    }

    /// Runs `?p wikibase:propertyType ?type` introspection for every
    /// property touched so far, on both sides in parallel (base spec §4.2, §5).
    pub async fn warm_property_types(
        &self,
        source_gateway: &Gateway,
        target_gateway: &Gateway,
    ) {
        let property_ids: Vec<String> = self
            .mappings
            .iter()
            .map(|entry| entry.key().clone())
            .filter(|id| id.starts_with('P'))
            .collect();
        if property_ids.is_empty() {
            return;
        }
        let query = "SELECT ?source_item ?type WHERE { VALUES ?source_item { $values } ?source_item wikibase:propertyType ?type . }";
        let (source_rows, target_rows) = tokio::join!(
            source_gateway.execute_values_in_chunks(query, "$values", &property_ids, None),
            target_gateway.execute_values_in_chunks(query, "$values", &property_ids, None),
        );
        self.store_property_types(Side::Source, source_rows);
        self.store_property_types(Side::Target, target_rows);
    }

    fn store_property_types(&self, side: Side, rows: Vec<crate::gateway::Row>) {
        for row in rows {
            let (Some(pid), Some(type_uri)) = (row.get("source_item"), row.get("type")) else {
                continue;
            };
            let pid = trailing_id(pid);
            if let Some(datatype) = datatype_from_type_uri(type_uri) {
                self.set_property_type(side, &pid, datatype);
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Source,
    Target,
}

/// Collapses raw `(source, target)` pairs into `source → [targets]`, sorted
/// so "first encountered" is reproducible (base spec §4.2, §9 open question).
fn group_raw_pairs(rows: Vec<crate::gateway::Row>) -> Vec<(String, Vec<String>)> {
    use std::collections::BTreeMap;
    let mut grouped: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for row in rows {
        let (Some(source), Some(target)) = (row.get("source_item"), row.get("target_item")) else {
            continue;
        };
        let source = trailing_id(source);
        let target = trailing_id(target);
        let entry = grouped.entry(source).or_default();
        if !entry.contains(&target) {
            entry.push(target);
        }
    }
    for targets in grouped.values_mut() {
        targets.sort();
    }
    grouped.into_iter().collect()
}

/// Extracts the prefixed ID from either a bare ID or a full entity IRI.
fn trailing_id(value: &str) -> String {
    value.rsplit(['/', '#']).next().unwrap_or(value).to_string()
}

fn datatype_from_type_uri(uri: &str) -> Option<DataType> {
    let tag = uri.rsplit(['/', '#']).next()?;
    DataType::from_wikibase_str(tag).or_else(|| match tag {
        "WikibaseItem" => Some(DataType::WikibaseItem),
        "String" => Some(DataType::String),
        "ExternalId" => Some(DataType::ExternalId),
        "Url" => Some(DataType::Url),
        "CommonsMedia" => Some(DataType::CommonsMedia),
        "Time" => Some(DataType::Time),
        "Quantity" => Some(DataType::Quantity),
        "Monolingualtext" => Some(DataType::MonolingualText),
        "GlobeCoordinate" => Some(DataType::GlobeCoordinate),
        _ => None,
    })
}

/// Conflict resolution for an item with multiple targets (base spec §4.2,
/// rule 3): deterministic lexicographically-smallest tie-break.
fn resolve_conflict_item(targets: &[String]) -> Option<String> {
    targets.first().cloned()
}

/// Conflict resolution for a property with multiple targets (base spec
/// §4.2, rule 2): prefer a datatype match, else the lexicographically
/// smallest target.
fn resolve_conflict_property(
    targets: &[String],
    source_type: Option<DataType>,
    target_type_of: impl Fn(&str) -> Option<DataType>,
) -> Option<String> {
    if targets.len() <= 1 {
        return targets.first().cloned();
    }
    if let Some(source_type) = source_type {
        if let Some(matching) = targets.iter().find(|t| target_type_of(t) == Some(source_type)) {
            return Some(matching.clone());
        }
    }
    targets.first().cloned()
}
