//! Entity translator: rewrites a source entity into target-space (base spec §4.3).

use crate::claim::{Claim, ReferenceGroup};
use crate::datatype::{DataType, DataValue, ItemValue, MonolingualTextValue, QuantityValue};
use crate::entity::{Entity, EntityKind};
use crate::mapping_cache::{MappingCache, Side};
use crate::profile::{BackReferenceType, MigrationProfile};
use crate::snak::{Snak, SnakType};
use crate::translation_result::TranslationResult;

/// `translate(source, allowed-languages?, allowed-sitelinks?, with-back-reference)`
/// (base spec §4.3). Preconditions: `cache` has been primed with every ID
/// reachable from `source` (see [`harvest_ids`]).
pub fn translate(
    source: &Entity,
    profile: &MigrationProfile,
    cache: &MappingCache,
    target_supported_languages: &[String],
    with_back_reference: bool,
) -> TranslationResult {
    let mut rewritten = Entity::new(
        cache.resolve(&source.id).unwrap_or_default(),
        source.kind,
    );
    let mut result = TranslationResult::new(source.clone(), rewritten.clone());

    // Lemma/forms/senses translation is unimplemented (base spec §9); refuse
    // rather than silently emit a partial, lossy lexeme.
    if source.kind == EntityKind::Lexeme {
        result.fail_fatal(crate::error::MigrationError::LexemeUnsupported);
        return result;
    }

    translate_labels(source, profile, target_supported_languages, &mut rewritten);
    translate_descriptions(source, profile, target_supported_languages, &mut rewritten);
    translate_aliases(source, profile, target_supported_languages, &mut rewritten);
    translate_sitelinks(source, profile, &mut rewritten);

    for claim in &source.claims {
        translate_claim(claim, profile, cache, &mut rewritten, &mut result);
    }

    if with_back_reference {
        apply_back_reference(source, profile, &mut rewritten, &mut result);
    }

    result.rewritten = rewritten;
    result
}

fn translate_labels(
    source: &Entity,
    profile: &MigrationProfile,
    target_supported: &[String],
    target: &mut Entity,
) {
    for (lang, text) in &source.labels {
        if profile.mapping.language_allowed(lang, target_supported) {
            target.labels.insert(lang.clone(), text.clone());
        }
    }
}

/// Descriptions copy like labels, except a description equal to the label in
/// the same language is dropped (base spec §4.3: Wikibase validation workaround).
fn translate_descriptions(
    source: &Entity,
    profile: &MigrationProfile,
    target_supported: &[String],
    target: &mut Entity,
) {
    for (lang, text) in &source.descriptions {
        if !profile.mapping.language_allowed(lang, target_supported) {
            continue;
        }
        if source.labels.get(lang) == Some(text) {
            continue;
        }
        target.descriptions.insert(lang.clone(), text.clone());
    }
}

fn translate_aliases(
    source: &Entity,
    profile: &MigrationProfile,
    target_supported: &[String],
    target: &mut Entity,
) {
    for (lang, values) in &source.aliases {
        if profile.mapping.language_allowed(lang, target_supported) {
            target.aliases.insert(lang.clone(), values.clone());
        }
    }
}

fn translate_sitelinks(source: &Entity, profile: &MigrationProfile, target: &mut Entity) {
    if !target.kind.supports_sitelinks() {
        return;
    }
    for (site, link) in &source.sitelinks {
        if profile.mapping.sitelink_allowed(site) {
            target.sitelinks.insert(
                site.clone(),
                crate::sitelink::Sitelink {
                    site: link.site.clone(),
                    title: link.title.clone(),
                    badges: Vec::new(),
                },
            );
        }
    }
}

/// Translates one claim and merges it into `target` with `MERGE_REFS_OR_APPEND`:
/// an existing target claim on the same property with an equal main-snak
/// content hash absorbs the new references; anything else becomes its own
/// claim (base spec §4.3, §4.4).
fn translate_claim(
    claim: &Claim,
    profile: &MigrationProfile,
    cache: &MappingCache,
    target: &mut Entity,
    result: &mut TranslationResult,
) {
    let Some(source_main) = &claim.main_snak else { return };
    let Some(new_main) = translate_snak(source_main, profile, cache, result) else { return };

    let mut new_qualifiers = crate::claim::Qualifiers::default();
    for (_, snaks) in &claim.qualifiers.by_property {
        for snak in snaks {
            if let Some(new_snak) = translate_snak(snak, profile, cache, result) {
                new_qualifiers.add(new_snak);
            }
        }
    }
    new_qualifiers.recompute_order();

    let mut new_references = Vec::new();
    for group in &claim.references {
        let snaks: Vec<Snak> = group
            .snaks
            .iter()
            .filter_map(|s| translate_snak(s, profile, cache, result))
            .collect();
        if !snaks.is_empty() {
            new_references.push(ReferenceGroup { snaks });
        }
    }

    let new_hash = new_main.datavalue_hash();
    let new_property = &new_main.property;
    if let Some(existing) = target.claims.iter_mut().find(|c| {
        c.property() == Some(new_property.as_str())
            && c.main_snak.as_ref().map(Snak::datavalue_hash) == Some(new_hash)
    }) {
        for group in new_references {
            if !existing.has_equivalent_reference(&group) {
                existing.references.push(group);
            }
        }
        return;
    }

    let mut new_claim = Claim::new(new_main);
    new_claim.qualifiers = new_qualifiers;
    new_claim.references = new_references;
    new_claim.rank = claim.rank;
    target.claims.push(new_claim);
}

/// Snak translation, steps 1–6 of base spec §4.3.
fn translate_snak(
    snak: &Snak,
    profile: &MigrationProfile,
    cache: &MappingCache,
    result: &mut TranslationResult,
) -> Option<Snak> {
    if snak.snaktype == SnakType::UnknownValue && profile.mapping.ignore_unknown_values {
        return None;
    }
    if snak.snaktype == SnakType::NoValue && profile.mapping.ignore_no_values {
        return None;
    }

    let Some(new_property) = cache.resolve(&snak.property) else {
        result.record_missing_property(snak.property.clone());
        return None;
    };
    result.record_mapping(snak.property.clone(), new_property.clone());

    if snak.snaktype != SnakType::KnownValue {
        let target_type = cache
            .property_type(Side::Target, &new_property)
            .unwrap_or(snak.datatype);
        return Some(Snak::without_value(new_property, target_type, snak.snaktype));
    }

    let source_type = cache.property_type(Side::Source, &snak.property).unwrap_or(snak.datatype);
    let target_type = cache.property_type(Side::Target, &new_property).unwrap_or(source_type);

    if source_type != target_type {
        return cast_snak(snak, new_property, source_type, target_type, profile, result);
    }

    copy_snak(snak, new_property, target_type, cache, profile, result)
}

/// Copies a snak's payload verbatim (modulo item/unit re-mapping), once the
/// source and target property datatypes agree.
fn copy_snak(
    snak: &Snak,
    new_property: String,
    datatype: DataType,
    cache: &MappingCache,
    profile: &MigrationProfile,
    result: &mut TranslationResult,
) -> Option<Snak> {
    let Some(value) = &snak.datavalue else { return None };
    let new_value = match (datatype, value) {
        (DataType::WikibaseItem, DataValue::Item(v)) => {
            let Some(target_id) = cache.resolve(&v.id) else {
                result.record_missing_item(v.id.clone());
                return None;
            };
            result.record_mapping(v.id.clone(), target_id.clone());
            DataValue::Item(ItemValue { id: target_id })
        }
        (DataType::Quantity, DataValue::Quantity(q)) => translate_quantity(q, cache, profile, result)?,
        (_, other) => other.clone(),
    };
    Some(Snak::known_value(new_property, datatype, new_value))
}

/// `Quantity` unit remapping (base spec §4.3): `unit="1"` passes through
/// unchanged; an entity-URI unit is resolved and re-composed under the
/// target's entity prefix.
fn translate_quantity(
    q: &QuantityValue,
    cache: &MappingCache,
    profile: &MigrationProfile,
    result: &mut TranslationResult,
) -> Option<DataValue> {
    if q.is_unitless() {
        return Some(DataValue::Quantity(q.clone()));
    }
    let unit_id = q.unit.rsplit(['/', '#']).next()?;
    let Some(target_id) = cache.resolve(unit_id) else {
        result.record_missing_item(unit_id.to_string());
        return None;
    };
    result.record_mapping(unit_id.to_string(), target_id.clone());
    let new_unit = format!("{}{}", profile.target.item_prefix, target_id);
    Some(DataValue::Quantity(QuantityValue {
        amount: q.amount.clone(),
        unit: new_unit,
        upper_bound: q.upper_bound.clone(),
        lower_bound: q.lower_bound.clone(),
    }))
}

/// Type-mismatch caster (base spec §4.3): every decision, success or
/// refusal, is recorded as a documentary note on `result.errors`.
fn cast_snak(
    snak: &Snak,
    new_property: String,
    from: DataType,
    to: DataType,
    profile: &MigrationProfile,
    result: &mut TranslationResult,
) -> Option<Snak> {
    if !profile.type_casts.enabled {
        result.note(format!(
            "type mismatch on {}: {from} -> {to}, casting disabled, snak dropped",
            snak.property
        ));
        return None;
    }
    let Some(value) = &snak.datavalue else { return None };

    let cast = match (from, to, value) {
        (DataType::String, DataType::Quantity, DataValue::Text(s)) => s.parse::<i64>().ok().map(|n| {
            DataValue::Quantity(QuantityValue {
                amount: format!("{n:+}"),
                unit: QuantityValue::UNITLESS.to_string(),
                upper_bound: None,
                lower_bound: None,
            })
        }),
        (DataType::String, DataType::MonolingualText, DataValue::Text(s)) => {
            Some(DataValue::MonolingualText(MonolingualTextValue {
                text: s.clone(),
                language: profile.type_casts.fallback_language.clone(),
            }))
        }
        (DataType::String, DataType::ExternalId, DataValue::Text(s)) => Some(DataValue::Text(s.clone())),
        (DataType::MonolingualText, DataType::String, DataValue::MonolingualText(v)) => {
            Some(DataValue::Text(v.text.clone()))
        }
        _ => None,
    };

    match cast {
        Some(value) => {
            result.note(format!("cast {}: {from} -> {to} succeeded", snak.property));
            Some(Snak::known_value(new_property, to, value))
        }
        None => {
            result.note(format!(
                "cast {}: {from} -> {to} unsupported or failed, snak dropped",
                snak.property
            ));
            None
        }
    }
}

/// ID harvest (base spec §4.3): every ID reachable from `entity`, used to
/// prime the mapping cache before translation.
#[must_use]
pub fn harvest_ids(entity: &Entity) -> Vec<String> {
    let mut ids = vec![entity.id.clone()];
    ids.extend(entity.referenced_properties());
    ids.extend(entity.referenced_entity_ids());
    for claim in &entity.claims {
        for snak in all_snaks(claim) {
            if snak.datatype == DataType::Quantity {
                if let Some(DataValue::Quantity(q)) = &snak.datavalue {
                    if !q.is_unitless() {
                        if let Some(unit_id) = q.unit.rsplit(['/', '#']).next() {
                            if matches!(unit_id.chars().next(), Some('Q' | 'P' | 'L')) {
                                ids.push(unit_id.to_string());
                            }
                        }
                    }
                }
            }
        }
    }
    ids.sort();
    ids.dedup();
    ids
}

fn all_snaks(claim: &Claim) -> Vec<&Snak> {
    let mut out = Vec::new();
    if let Some(s) = &claim.main_snak {
        out.push(s);
    }
    for (_, snaks) in &claim.qualifiers.by_property {
        out.extend(snaks);
    }
    for group in &claim.references {
        out.extend(&group.snaks);
    }
    out
}

/// Back-reference (base spec §4.3): provenance written after content translation.
fn apply_back_reference(
    source: &Entity,
    profile: &MigrationProfile,
    target: &mut Entity,
    result: &mut TranslationResult,
) {
    let Some(back_ref) = profile.back_reference.for_kind(source.kind) else { return };
    match back_ref.kind {
        BackReferenceType::Sitelink => {
            if !target.kind.supports_sitelinks() {
                result.fail_fatal(crate::error::MigrationError::SitelinksUnsupported(format!(
                    "{:?}",
                    target.kind
                )));
                return;
            }
            target.sitelinks.insert(
                back_ref.id.clone(),
                crate::sitelink::Sitelink {
                    site: back_ref.id.clone(),
                    title: source.id.clone(),
                    badges: Vec::new(),
                },
            );
        }
        BackReferenceType::Property => {
            let snak = Snak::known_value(
                back_ref.id.clone(),
                DataType::ExternalId,
                DataValue::Text(source.id.clone()),
            );
            target.claims.push(Claim::new(snak));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::{BackReference, BackReferenceConfig, MappingConfig, MappingLocation, TypeCastConfig, WikibaseEndpoint};

    fn endpoint(name: &str, prefix: &str) -> WikibaseEndpoint {
        WikibaseEndpoint {
            name: name.to_string(),
            sparql_url: format!("https://{name}/sparql"),
            mediawiki_api_url: format!("https://{name}/w/api.php"),
            mediawiki_rest_url: format!("https://{name}/w/rest.php"),
            website: None,
            item_prefix: prefix.to_string(),
            quickstatement_url: None,
            user: None,
            password: None,
            bot_password: None,
            consumer_key: None,
            consumer_secret: None,
            tag: None,
            requires_login: false,
        }
    }

    fn profile_with_back_reference() -> MigrationProfile {
        MigrationProfile {
            source: endpoint("source", "http://source/entity/"),
            target: endpoint("target", "http://target/entity/"),
            mapping: MappingConfig {
                location_of_mapping: MappingLocation::Target,
                item_mapping_query: "$values".to_string(),
                property_mapping_query: "$values".to_string(),
                languages: Some(vec!["en".to_string()]),
                sitelinks: Some(vec!["enwiki".to_string()]),
                ignore_unknown_values: false,
                ignore_no_values: false,
                chunk_size: 1000,
            },
            back_reference: BackReferenceConfig {
                item: Some(BackReference { kind: BackReferenceType::Sitelink, id: "source_wiki".to_string() }),
                property: None,
            },
            type_casts: TypeCastConfig::default(),
        }
    }

    #[test]
    fn back_reference_sitelink_scenario() {
        let profile = profile_with_back_reference();
        let cache = MappingCache::new();
        let source = Entity::new("Q80", EntityKind::Item);

        let result = translate(&source, &profile, &cache, &[], true);
        let sitelink = result.rewritten.sitelinks.get("source_wiki").unwrap();
        assert_eq!(sitelink.title, "Q80");
    }

    #[test]
    fn missing_property_is_recorded_and_claim_dropped() {
        let profile = profile_with_back_reference();
        let cache = MappingCache::new();
        let mut source = Entity::new("Q1", EntityKind::Item);
        source.claims.push(Claim::new(Snak::known_value(
            "P999",
            DataType::WikibaseItem,
            DataValue::Item(ItemValue { id: "Q2".to_string() }),
        )));

        let result = translate(&source, &profile, &cache, &[], false);
        assert!(result.rewritten.claims.is_empty());
        assert_eq!(result.missing_properties, std::iter::once("P999".to_string()).collect());
        assert!(result.missing_items.is_empty());
    }

    #[test]
    fn unit_remapping_scenario() {
        let profile = profile_with_back_reference();
        let cache = MappingCache::new();
        cache.set_property_type(Side::Source, "P1", DataType::Quantity);
        cache.set_property_type(Side::Target, "P2", DataType::Quantity);
        cache.mappings_test_insert("P1", Some("P2".to_string()));
        cache.mappings_test_insert("Q11573", Some("Q102132".to_string()));

        let mut source = Entity::new("Q1", EntityKind::Item);
        source.claims.push(Claim::new(Snak::known_value(
            "P1",
            DataType::Quantity,
            DataValue::Quantity(QuantityValue {
                amount: "+5".to_string(),
                unit: "http://source/entity/Q11573".to_string(),
                upper_bound: None,
                lower_bound: None,
            }),
        )));

        let result = translate(&source, &profile, &cache, &[], false);
        let claim = &result.rewritten.claims[0];
        let DataValue::Quantity(q) = claim.main_snak.as_ref().unwrap().datavalue.as_ref().unwrap() else {
            panic!("expected quantity")
        };
        assert_eq!(q.amount, "+5");
        assert_eq!(q.unit, "http://target/entity/Q102132");
    }

    #[test]
    fn string_to_quantity_cast_scenario() {
        let mut profile = profile_with_back_reference();
        profile.type_casts.enabled = true;
        let cache = MappingCache::new();
        cache.set_property_type(Side::Source, "P1", DataType::String);
        cache.set_property_type(Side::Target, "P2", DataType::Quantity);
        cache.mappings_test_insert("P1", Some("P2".to_string()));

        let mut source = Entity::new("Q1", EntityKind::Item);
        source.claims.push(Claim::new(Snak::known_value(
            "P1",
            DataType::String,
            DataValue::Text("1".to_string()),
        )));

        let result = translate(&source, &profile, &cache, &[], false);
        let claim = &result.rewritten.claims[0];
        let DataValue::Quantity(q) = claim.main_snak.as_ref().unwrap().datavalue.as_ref().unwrap() else {
            panic!("expected quantity")
        };
        assert_eq!(q.amount, "+1");
        assert!(result.errors.iter().any(|e| e.contains("cast")));
    }

    #[test]
    fn lexeme_translation_is_refused() {
        let profile = profile_with_back_reference();
        let cache = MappingCache::new();
        let source = Entity::new("L1", EntityKind::Lexeme);

        let result = translate(&source, &profile, &cache, &[], true);
        assert!(result.fatal);
        assert!(result.rewritten.labels.is_empty());
    }

    #[test]
    fn sitelink_back_reference_on_unsupported_kind_is_fatal() {
        let mut profile = profile_with_back_reference();
        // A sitelink back-reference assigned to properties, which never support sitelinks.
        profile.back_reference = crate::profile::BackReferenceConfig {
            item: None,
            property: Some(BackReference { kind: BackReferenceType::Sitelink, id: "source_wiki".to_string() }),
        };
        let cache = MappingCache::new();
        let source = Entity::new("P1", EntityKind::Property);

        let result = translate(&source, &profile, &cache, &[], true);
        assert!(result.fatal);
        assert!(result.errors.iter().any(|e| e.contains("sitelink")));
    }

    #[test]
    fn claims_on_different_properties_sharing_a_main_snak_value_stay_separate() {
        let profile = profile_with_back_reference();
        let cache = MappingCache::new();
        cache.mappings_test_insert("P17", Some("P17".to_string()));
        cache.mappings_test_insert("P27", Some("P27".to_string()));
        cache.mappings_test_insert("Q30", Some("Q30".to_string()));

        let mut source = Entity::new("Q1", EntityKind::Item);
        let mut country_claim = Claim::new(Snak::known_value(
            "P17",
            DataType::WikibaseItem,
            DataValue::Item(ItemValue { id: "Q30".to_string() }),
        ));
        country_claim.qualifiers.add(Snak::known_value(
            "P580",
            DataType::WikibaseItem,
            DataValue::Item(ItemValue { id: "Q30".to_string() }),
        ));
        source.claims.push(country_claim);

        let mut nationality_claim = Claim::new(Snak::known_value(
            "P27",
            DataType::WikibaseItem,
            DataValue::Item(ItemValue { id: "Q30".to_string() }),
        ));
        nationality_claim.qualifiers.add(Snak::known_value(
            "P582",
            DataType::WikibaseItem,
            DataValue::Item(ItemValue { id: "Q30".to_string() }),
        ));
        source.claims.push(nationality_claim);

        let result = translate(&source, &profile, &cache, &[], false);

        assert_eq!(result.rewritten.claims.len(), 2);
        let p17 = result.rewritten.claims.iter().find(|c| c.property() == Some("P17")).unwrap();
        let p27 = result.rewritten.claims.iter().find(|c| c.property() == Some("P27")).unwrap();
        assert!(!p17.qualifiers.get("P580").is_empty());
        assert!(!p27.qualifiers.get("P582").is_empty());
    }

    #[test]
    fn harvest_is_superset_of_translator_lookups() {
        let mut source = Entity::new("Q1", EntityKind::Item);
        source.claims.push(Claim::new(Snak::known_value(
            "P31",
            DataType::WikibaseItem,
            DataValue::Item(ItemValue { id: "Q5".to_string() }),
        )));
        let ids = harvest_ids(&source);
        assert!(ids.contains(&"Q1".to_string()));
        assert!(ids.contains(&"P31".to_string()));
        assert!(ids.contains(&"Q5".to_string()));
    }
}
