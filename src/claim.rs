//! Claim/Statement: a main snak plus qualifiers and reference groups (base spec §3).

use crate::snak::{Snak, fnv1a};
use serde_json::{Value as Json, json};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatementRank {
    Preferred,
    #[default]
    Normal,
    Deprecated,
}

impl StatementRank {
    #[must_use]
    pub const fn as_wikibase_str(self) -> &'static str {
        match self {
            Self::Preferred => "preferred",
            Self::Normal => "normal",
            Self::Deprecated => "deprecated",
        }
    }

    #[must_use]
    pub fn from_wikibase_str(s: &str) -> Self {
        match s {
            "preferred" => Self::Preferred,
            "deprecated" => Self::Deprecated,
            _ => Self::Normal,
        }
    }
}

/// A reference group: an ordered list of snaks cited as a single source.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReferenceGroup {
    pub snaks: Vec<Snak>,
}

impl ReferenceGroup {
    /// Commutative content hash (base spec §4.4): the sum of each snak's
    /// datavalue hash, so reference groups compare equal regardless of
    /// snak order.
    #[must_use]
    pub fn content_hash(&self) -> u64 {
        self.snaks
            .iter()
            .fold(0u64, |acc, s| acc.wrapping_add(s.datavalue_hash()))
    }

    #[must_use]
    pub fn to_wikibase_json(&self) -> Json {
        json!({ "snaks-order": self.property_order(), "snaks": self.snaks_by_property() })
    }

    fn property_order(&self) -> Vec<String> {
        let mut seen = Vec::new();
        for s in &self.snaks {
            if !seen.contains(&s.property) {
                seen.push(s.property.clone());
            }
        }
        seen
    }

    fn snaks_by_property(&self) -> Json {
        let mut obj = serde_json::Map::new();
        for pid in self.property_order() {
            let group: Vec<Json> = self
                .snaks
                .iter()
                .filter(|s| s.property == pid)
                .map(Snak::to_wikibase_json)
                .collect();
            obj.insert(pid, Json::Array(group));
        }
        Json::Object(obj)
    }

    pub fn from_wikibase_json(j: &Json) -> Option<Self> {
        let order = j["snaks-order"].as_array()?;
        let snaks_obj = j["snaks"].as_object()?;
        let mut snaks = Vec::new();
        for pid in order {
            let pid = pid.as_str()?;
            for snak_json in snaks_obj.get(pid)?.as_array()? {
                snaks.push(Snak::from_wikibase_json(snak_json)?);
            }
        }
        Some(Self { snaks })
    }
}

/// A property-grouped list of qualifier snaks, with a separate ordering of
/// the property groups themselves (base spec §3).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Qualifiers {
    pub by_property: Vec<(String, Vec<Snak>)>,
    pub order: Vec<String>,
}

impl Qualifiers {
    pub fn add(&mut self, snak: Snak) {
        if !self.order.contains(&snak.property) {
            self.order.push(snak.property.clone());
        }
        match self.by_property.iter_mut().find(|(p, _)| *p == snak.property) {
            Some((_, snaks)) => snaks.push(snak),
            None => self.by_property.push((snak.property.clone(), vec![snak])),
        }
    }

    #[must_use]
    pub fn get(&self, property: &str) -> &[Snak] {
        self.by_property
            .iter()
            .find(|(p, _)| p == property)
            .map_or(&[], |(_, snaks)| snaks.as_slice())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_property.iter().all(|(_, snaks)| snaks.is_empty())
    }

    /// Recomputes `order` so it includes every property group currently
    /// present, appending newly introduced groups at the end (base spec §4.4).
    pub fn recompute_order(&mut self) {
        let used: Vec<String> = self.by_property.iter().map(|(p, _)| p.clone()).collect();
        self.order.retain(|p| used.contains(p));
        for p in used {
            if !self.order.contains(&p) {
                self.order.push(p);
            }
        }
    }

    #[must_use]
    pub fn to_wikibase_json(&self) -> Json {
        let mut obj = serde_json::Map::new();
        for (pid, snaks) in &self.by_property {
            obj.insert(
                pid.clone(),
                Json::Array(snaks.iter().map(Snak::to_wikibase_json).collect()),
            );
        }
        Json::Object(obj)
    }

    pub fn from_wikibase_json(qualifiers: &Json, order: &Json) -> Option<Self> {
        let order: Vec<String> = order
            .as_array()
            .map(|a| a.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
            .unwrap_or_default();
        let mut by_property = Vec::new();
        if let Some(obj) = qualifiers.as_object() {
            for pid in &order {
                if let Some(arr) = obj.get(pid).and_then(Json::as_array) {
                    let snaks: Vec<Snak> = arr.iter().filter_map(Snak::from_wikibase_json).collect();
                    by_property.push((pid.clone(), snaks));
                }
            }
        }
        Some(Self { by_property, order })
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Claim {
    pub main_snak: Option<Snak>,
    pub qualifiers: Qualifiers,
    pub references: Vec<ReferenceGroup>,
    pub rank: StatementRank,
}

impl Claim {
    #[must_use]
    pub fn new(main_snak: Snak) -> Self {
        Self {
            main_snak: Some(main_snak),
            qualifiers: Qualifiers::default(),
            references: Vec::new(),
            rank: StatementRank::Normal,
        }
    }

    #[must_use]
    pub fn property(&self) -> Option<&str> {
        self.main_snak.as_ref().map(|s| s.property.as_str())
    }

    /// Whether a reference group with the same content hash as `group`
    /// already exists on this claim (base spec §4.4).
    #[must_use]
    pub fn has_equivalent_reference(&self, group: &ReferenceGroup) -> bool {
        let hash = group.content_hash();
        self.references.iter().any(|r| r.content_hash() == hash)
    }

    #[must_use]
    pub fn to_wikibase_json(&self) -> Json {
        let mut obj = serde_json::Map::new();
        obj.insert("type".into(), json!("statement"));
        obj.insert("rank".into(), json!(self.rank.as_wikibase_str()));
        if let Some(snak) = &self.main_snak {
            obj.insert("mainsnak".into(), snak.to_wikibase_json());
        }
        obj.insert("qualifiers".into(), self.qualifiers.to_wikibase_json());
        obj.insert("qualifiers-order".into(), json!(self.qualifiers.order));
        obj.insert(
            "references".into(),
            Json::Array(self.references.iter().map(ReferenceGroup::to_wikibase_json).collect()),
        );
        Json::Object(obj)
    }

    pub fn from_wikibase_json(j: &Json) -> Option<Self> {
        let main_snak = Snak::from_wikibase_json(&j["mainsnak"]);
        let qualifiers = Qualifiers::from_wikibase_json(&j["qualifiers"], &j["qualifiers-order"])
            .unwrap_or_default();
        let references = j["references"]
            .as_array()
            .map(|arr| arr.iter().filter_map(ReferenceGroup::from_wikibase_json).collect())
            .unwrap_or_default();
        let rank = j["rank"].as_str().map(StatementRank::from_wikibase_str).unwrap_or_default();
        Some(Self {
            main_snak,
            qualifiers,
            references,
            rank,
        })
    }
}

/// Content hash of a claim's main-snak datavalue (base spec §4.4's "content
/// hash" for deduplication); deliberately ignores qualifiers/references/rank.
#[must_use]
pub fn main_snak_hash(claim: &Claim) -> Option<u64> {
    claim.main_snak.as_ref().map(Snak::datavalue_hash)
}

#[must_use]
pub fn combine(a: u64, b: u64) -> u64 {
    fnv1a(format!("{a}:{b}").as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datatype::{DataType, DataValue, ItemValue};

    fn item_snak(prop: &str, qid: &str) -> Snak {
        Snak::known_value(prop, DataType::WikibaseItem, DataValue::Item(ItemValue { id: qid.into() }))
    }

    #[test]
    fn reference_group_hash_is_order_independent() {
        let mut a = ReferenceGroup::default();
        a.snaks.push(item_snak("P248", "Q1"));
        a.snaks.push(item_snak("P143", "Q2"));

        let mut b = ReferenceGroup::default();
        b.snaks.push(item_snak("P143", "Q2"));
        b.snaks.push(item_snak("P248", "Q1"));

        assert_eq!(a.content_hash(), b.content_hash());
    }

    #[test]
    fn qualifiers_order_includes_new_groups() {
        let mut q = Qualifiers::default();
        q.add(item_snak("P580", "Q1"));
        q.by_property.push(("P582".to_string(), vec![item_snak("P582", "Q2")]));
        q.recompute_order();
        assert!(q.order.contains(&"P582".to_string()));
    }

    #[test]
    fn claim_round_trips_through_json() {
        let mut claim = Claim::new(item_snak("P31", "Q5"));
        claim.qualifiers.add(item_snak("P580", "Q1"));
        claim.qualifiers.recompute_order();
        let mut group = ReferenceGroup::default();
        group.snaks.push(item_snak("P248", "Q100"));
        claim.references.push(group);

        let json = claim.to_wikibase_json();
        let parsed = Claim::from_wikibase_json(&json).unwrap();
        assert_eq!(claim, parsed);
    }
}
