//! Entity merger: unions a rewritten entity into an existing target entity
//! using content-addressed deduplication (base spec §4.4).

use crate::claim::{Claim, main_snak_hash};
use crate::entity::Entity;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SitelinkPolicy {
    #[default]
    Keep,
    ReplaceAll,
}

/// `merge(source-rewritten, target-existing)` (base spec §4.4): mutates
/// `target` in place. Labels/descriptions/sitelinks default to `KEEP`
/// (target wins); aliases always union (`APPEND_OR_REPLACE`); statements
/// merge by content hash.
pub fn merge(source: &Entity, target: &mut Entity, sitelink_policy: SitelinkPolicy) {
    merge_labels_and_descriptions(&source.labels, &mut target.labels);
    merge_labels_and_descriptions(&source.descriptions, &mut target.descriptions);
    merge_aliases(source, target);
    merge_sitelinks(source, target, sitelink_policy);
    merge_statements(&source.claims, &mut target.claims);
}

fn merge_labels_and_descriptions(
    source: &crate::entity::LangStringMap,
    target: &mut crate::entity::LangStringMap,
) {
    for (lang, text) in source {
        target.entry(lang.clone()).or_insert_with(|| text.clone());
    }
}

fn merge_aliases(source: &Entity, target: &mut Entity) {
    for (lang, values) in &source.aliases {
        let entry = target.aliases.entry(lang.clone()).or_default();
        for value in values {
            if !entry.contains(value) {
                entry.push(value.clone());
            }
        }
    }
}

fn merge_sitelinks(source: &Entity, target: &mut Entity, policy: SitelinkPolicy) {
    for (site, link) in &source.sitelinks {
        match policy {
            SitelinkPolicy::Keep => {
                target.sitelinks.entry(site.clone()).or_insert_with(|| link.clone());
            }
            SitelinkPolicy::ReplaceAll => {
                target.sitelinks.insert(site.clone(), link.clone());
            }
        }
    }
}

/// Statement merging (base spec §4.4, step 1): a source claim merges into a
/// target claim on the *same property* with the same main-snak content hash,
/// and only when at least one side has no qualifiers (the asymmetry
/// documented in base spec §9); otherwise it's appended with
/// `MERGE_REFS_OR_APPEND`.
fn merge_statements(source_claims: &[Claim], target_claims: &mut Vec<Claim>) {
    for source_claim in source_claims {
        let Some(source_hash) = main_snak_hash(source_claim) else { continue };
        let source_property = source_claim.property();
        let mergeable = target_claims.iter_mut().find(|target_claim| {
            target_claim.property() == source_property
                && main_snak_hash(target_claim) == Some(source_hash)
                && (source_claim.qualifiers.is_empty() || target_claim.qualifiers.is_empty())
        });
        match mergeable {
            Some(target_claim) => merge_into(source_claim, target_claim),
            None => target_claims.push(source_claim.clone()),
        }
    }
    for claim in target_claims.iter_mut() {
        claim.qualifiers.recompute_order();
    }
}

/// Merges qualifiers and references of `source` into `target` (base spec §4.4).
fn merge_into(source: &Claim, target: &mut Claim) {
    for (_, snaks) in &source.qualifiers.by_property {
        for snak in snaks {
            let hash = snak.datavalue_hash();
            let already_present = target
                .qualifiers
                .get(&snak.property)
                .iter()
                .any(|existing| existing.datavalue_hash() == hash);
            if !already_present {
                target.qualifiers.add(snak.clone());
            }
        }
    }
    for group in &source.references {
        if !target.has_equivalent_reference(group) {
            target.references.push(group.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datatype::{DataType, DataValue, ItemValue};
    use crate::entity::EntityKind;
    use crate::snak::Snak;

    fn item_snak(prop: &str, qid: &str) -> Snak {
        Snak::known_value(prop, DataType::WikibaseItem, DataValue::Item(ItemValue { id: qid.into() }))
    }

    #[test]
    fn statement_merge_deduplication_scenario() {
        let mut target = Entity::new("Q100", EntityKind::Item);
        target.claims.push(Claim::new(item_snak("P31", "Q5")));

        let mut source = Entity::new("", EntityKind::Item);
        let mut source_claim = Claim::new(item_snak("P31", "Q5"));
        let mut group = crate::claim::ReferenceGroup::default();
        group.snaks.push(item_snak("P248", "Q200"));
        source_claim.references.push(group);
        source.claims.push(source_claim);

        merge(&source, &mut target, SitelinkPolicy::Keep);

        assert_eq!(target.claims.len(), 1);
        assert_eq!(target.claims[0].references.len(), 1);
    }

    #[test]
    fn claims_on_different_properties_with_equal_main_snak_are_not_collapsed() {
        let mut target = Entity::new("Q100", EntityKind::Item);

        let mut source = Entity::new("", EntityKind::Item);
        let mut country_claim = Claim::new(item_snak("P17", "Q30"));
        country_claim.qualifiers.add(item_snak("P580", "Q1"));
        source.claims.push(country_claim);
        let mut nationality_claim = Claim::new(item_snak("P27", "Q30"));
        nationality_claim.qualifiers.add(item_snak("P582", "Q2"));
        source.claims.push(nationality_claim);

        merge(&source, &mut target, SitelinkPolicy::Keep);

        assert_eq!(target.claims.len(), 2);
        let p17 = target.claims.iter().find(|c| c.property() == Some("P17")).unwrap();
        let p27 = target.claims.iter().find(|c| c.property() == Some("P27")).unwrap();
        assert!(!p17.qualifiers.get("P580").is_empty());
        assert!(!p27.qualifiers.get("P582").is_empty());
    }

    #[test]
    fn qualified_statements_are_not_collapsed_when_both_sides_qualify() {
        let mut target = Entity::new("Q100", EntityKind::Item);
        let mut target_claim = Claim::new(item_snak("P31", "Q5"));
        target_claim.qualifiers.add(item_snak("P580", "Q1"));
        target.claims.push(target_claim);

        let mut source = Entity::new("", EntityKind::Item);
        let mut source_claim = Claim::new(item_snak("P31", "Q5"));
        source_claim.qualifiers.add(item_snak("P582", "Q2"));
        source.claims.push(source_claim);

        merge(&source, &mut target, SitelinkPolicy::Keep);

        assert_eq!(target.claims.len(), 2);
    }

    #[test]
    fn merge_is_idempotent_for_unique_main_snak_hashes() {
        let mut target = Entity::new("Q100", EntityKind::Item);
        target.claims.push(Claim::new(item_snak("P31", "Q5")));
        target.labels.insert("en".into(), "Example".into());

        let snapshot = target.clone();
        merge(&snapshot, &mut target, SitelinkPolicy::Keep);

        assert_eq!(target.claims.len(), 1);
        assert_eq!(target.claims[0].references.len(), 0);
    }

    #[test]
    fn aliases_always_union() {
        let mut target = Entity::new("Q1", EntityKind::Item);
        target.aliases.insert("en".into(), vec!["Foo".into()]);
        let mut source = Entity::new("", EntityKind::Item);
        source.aliases.insert("en".into(), vec!["Bar".into(), "Foo".into()]);

        merge(&source, &mut target, SitelinkPolicy::Keep);
        assert_eq!(target.aliases["en"], vec!["Foo".to_string(), "Bar".to_string()]);
    }

    #[test]
    fn labels_keep_target_on_conflict() {
        let mut target = Entity::new("Q1", EntityKind::Item);
        target.labels.insert("en".into(), "Target label".into());
        let mut source = Entity::new("", EntityKind::Item);
        source.labels.insert("en".into(), "Source label".into());

        merge(&source, &mut target, SitelinkPolicy::Keep);
        assert_eq!(target.labels["en"], "Target label");
    }
}
