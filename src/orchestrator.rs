//! Migration orchestrator: drives batches of source IDs through
//! fetch → cache-prime → translate → merge → write (base spec §4.5).

use crate::entity::Entity;
use crate::gateway::Gateway;
use crate::mapping_cache::MappingCache;
use crate::merger::{self, SitelinkPolicy};
use crate::profile::MigrationProfile;
use crate::translation_result::{TranslationBatch, TranslationResult};
use crate::translator;
use futures::stream::{self, StreamExt};
use std::sync::Arc;

const ENTITY_READ_BATCH_SIZE: usize = 50;
const MAX_IN_FLIGHT: usize = 10;

pub type DoneCallback = Arc<dyn Fn(&str, &TranslationResult) + Send + Sync>;

pub struct MigrationOrchestrator {
    pub profile: MigrationProfile,
    pub source_gateway: Gateway,
    pub target_gateway: Gateway,
    pub cache: MappingCache,
    pub merge_existing: bool,
    pub summary: Option<String>,
    pub tags: Vec<String>,
    pub on_done: Option<DoneCallback>,
}

impl std::fmt::Debug for MigrationOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MigrationOrchestrator")
            .field("merge_existing", &self.merge_existing)
            .field("summary", &self.summary)
            .finish_non_exhaustive()
    }
}

impl MigrationOrchestrator {
    pub async fn new(profile: MigrationProfile) -> anyhow::Result<Self> {
        profile.validate()?;
        let source_gateway = Gateway::new(&profile.source).await?;
        let target_gateway = Gateway::new(&profile.target).await?;
        Ok(Self {
            profile,
            source_gateway,
            target_gateway,
            cache: MappingCache::new(),
            merge_existing: true,
            summary: None,
            tags: Vec::new(),
            on_done: None,
        })
    }

    /// Runs the full pipeline over `ids` (base spec §4.5, steps 1–6).
    pub async fn run(&self, ids: &[String]) -> TranslationBatch {
        let sources = self.fetch_source_entities(ids).await;

        let mapping_gateway = if std::ptr::eq(self.profile.mapping_host(), &self.profile.source) {
            &self.source_gateway
        } else {
            &self.target_gateway
        };

        let harvested: Vec<String> = {
            let mut ids: Vec<String> = sources.iter().flat_map(translator::harvest_ids).collect();
            ids.sort();
            ids.dedup();
            ids
        };
        self.cache.prepare(&harvested, &self.profile, mapping_gateway).await;
        self.cache
            .warm_property_types(&self.source_gateway, &self.target_gateway)
            .await;

        let kept: Vec<Entity> = sources
            .into_iter()
            .filter(|source| self.merge_existing || self.cache.resolve(&source.id).is_none())
            .collect();

        let target_supported = self.target_gateway.get_supported_languages().await.unwrap_or_default();

        let mut results: Vec<(String, TranslationResult)> = kept
            .iter()
            .map(|source| {
                let result = translator::translate(
                    source,
                    &self.profile,
                    &self.cache,
                    &target_supported,
                    true,
                );
                (source.id.clone(), result)
            })
            .collect();

        self.merge_existing_targets(&mut results).await;
        self.write_all(&mut results).await;

        let mut batch = TranslationBatch::new();
        for (id, result) in results {
            if let Some(cb) = &self.on_done {
                cb(&id, &result);
            }
            batch.insert(id, result);
        }
        batch
    }

    /// Step 1: fetch source entities in parallel batches of up to 50 IDs,
    /// up to 10 calls in flight (base spec §4.5, §5).
    async fn fetch_source_entities(&self, ids: &[String]) -> Vec<Entity> {
        let chunks: Vec<Vec<String>> = ids.chunks(ENTITY_READ_BATCH_SIZE).map(<[String]>::to_vec).collect();
        stream::iter(chunks)
            .map(|chunk| async move { self.source_gateway.get_entities_batch(&chunk).await })
            .buffer_unordered(MAX_IN_FLIGHT)
            .collect::<Vec<_>>()
            .await
            .into_iter()
            .flatten()
            .collect()
    }

    /// Step 5: for kept entities whose own ID already maps to a target
    /// entity, fetch and merge. Merger exceptions are recorded but never abort.
    async fn merge_existing_targets(&self, results: &mut [(String, TranslationResult)]) {
        let target_ids: Vec<String> = results
            .iter()
            .filter_map(|(source_id, _)| self.cache.resolve(source_id))
            .collect();
        if target_ids.is_empty() {
            return;
        }
        let existing = self.fetch_target_entities(&target_ids).await;

        for (_, result) in results.iter_mut() {
            let Some(target_id) = self.cache.resolve(&result.original.id) else { continue };
            let Some(existing_target) = existing.iter().find(|e| e.id == target_id) else { continue };
            let mut merged = existing_target.clone();
            merger::merge(&result.rewritten, &mut merged, SitelinkPolicy::Keep);
            result.rewritten = merged;
        }
    }

    async fn fetch_target_entities(&self, ids: &[String]) -> Vec<Entity> {
        let chunks: Vec<Vec<String>> = ids.chunks(ENTITY_READ_BATCH_SIZE).map(<[String]>::to_vec).collect();
        stream::iter(chunks)
            .map(|chunk| async move { self.target_gateway.get_entities_batch(&chunk).await })
            .buffer_unordered(MAX_IN_FLIGHT)
            .collect::<Vec<_>>()
            .await
            .into_iter()
            .flatten()
            .collect()
    }

    /// Step 6: writes each translation's entity concurrently, bounded to 10
    /// in flight (base spec §4.5, §5).
    async fn write_all(&self, results: &mut [(String, TranslationResult)]) {
        let summary = self.summary.as_deref();
        let outcomes = stream::iter(results.iter().enumerate())
            .filter(|(_, (_, result))| futures::future::ready(!result.fatal))
            .map(|(idx, (_, result))| async move {
                let written = self
                    .target_gateway
                    .write_entity(&result.rewritten, summary, &self.tags)
                    .await;
                (idx, written)
            })
            .buffer_unordered(MAX_IN_FLIGHT)
            .collect::<Vec<_>>()
            .await;

        for (idx, outcome) in outcomes {
            match outcome {
                Ok(created) => results[idx].1.created_entity = Some(created),
                Err(e) => results[idx].1.note(e.to_string()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn done_callback_type_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<DoneCallback>();
    }
}
