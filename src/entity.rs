//! Entity: the tagged union of Item/Property/Lexeme/MediaInfo records (base spec §3).

use crate::claim::Claim;
use crate::datatype::DataType;
use crate::error::MigrationError;
use crate::sitelink::Sitelink;
use serde_json::{Value as Json, json};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Item,
    Property,
    Lexeme,
    MediaInfo,
}

impl EntityKind {
    #[must_use]
    pub const fn prefix(self) -> char {
        match self {
            Self::Item => 'Q',
            Self::Property => 'P',
            Self::Lexeme => 'L',
            Self::MediaInfo => 'M',
        }
    }

    /// Dispatches on the one-letter prefix of an entity ID (base spec §5.2).
    pub fn from_id(id: &str) -> Result<Self, MigrationError> {
        match id.chars().next() {
            Some('Q') => Ok(Self::Item),
            Some('P') => Ok(Self::Property),
            Some('L') => Ok(Self::Lexeme),
            Some('M') => Ok(Self::MediaInfo),
            _ => Err(MigrationError::UnknownEntityType(id.to_string())),
        }
    }

    #[must_use]
    pub const fn wikibase_type(self) -> &'static str {
        match self {
            Self::Item => "item",
            Self::Property => "property",
            Self::Lexeme => "lexeme",
            Self::MediaInfo => "mediainfo",
        }
    }

    #[must_use]
    pub fn supports_sitelinks(self) -> bool {
        matches!(self, Self::Item)
    }
}

/// A language-keyed map of single strings, used for labels and descriptions.
pub type LangStringMap = HashMap<String, String>;
/// A language-keyed map of ordered string lists, used for aliases.
pub type AliasMap = HashMap<String, Vec<String>>;

#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    pub id: String,
    pub kind: EntityKind,
    pub labels: LangStringMap,
    pub descriptions: LangStringMap,
    pub aliases: AliasMap,
    pub claims: Vec<Claim>,
    pub sitelinks: HashMap<String, Sitelink>,
    /// Only meaningful for `EntityKind::Property`.
    pub datatype: Option<DataType>,
}

impl Entity {
    #[must_use]
    pub fn new(id: impl Into<String>, kind: EntityKind) -> Self {
        Self {
            id: id.into(),
            kind,
            labels: LangStringMap::new(),
            descriptions: LangStringMap::new(),
            aliases: AliasMap::new(),
            claims: Vec::new(),
            sitelinks: HashMap::new(),
            datatype: None,
        }
    }

    #[must_use]
    pub fn is_new(&self) -> bool {
        self.id.is_empty()
    }

    /// Every property ID referenced anywhere on this entity: main snaks,
    /// qualifiers, and references (base spec §4.1, mapping-cache priming).
    #[must_use]
    pub fn referenced_properties(&self) -> Vec<String> {
        let mut out = Vec::new();
        for claim in &self.claims {
            if let Some(p) = claim.property() {
                push_unique(&mut out, p);
            }
            for (p, _) in &claim.qualifiers.by_property {
                push_unique(&mut out, p);
            }
            for group in &claim.references {
                for snak in &group.snaks {
                    push_unique(&mut out, &snak.property);
                }
            }
        }
        out
    }

    /// Every item/property/lexeme/mediainfo ID referenced as a *value*
    /// anywhere on this entity (base spec §4.1) — these, not the entity's
    /// own ID, are what the mapping cache needs to resolve.
    #[must_use]
    pub fn referenced_entity_ids(&self) -> Vec<String> {
        use crate::datatype::DataValue;
        let mut out = Vec::new();
        let mut visit_snak = |snak: &crate::snak::Snak| {
            if let Some(DataValue::Item(v)) = &snak.datavalue {
                push_unique(&mut out, &v.id);
            }
        };
        for claim in &self.claims {
            if let Some(s) = &claim.main_snak {
                visit_snak(s);
            }
            for (_, snaks) in &claim.qualifiers.by_property {
                for s in snaks {
                    visit_snak(s);
                }
            }
            for group in &claim.references {
                for s in &group.snaks {
                    visit_snak(s);
                }
            }
        }
        out
    }

    #[must_use]
    pub fn to_wikibase_json(&self) -> Json {
        let mut obj = serde_json::Map::new();
        if !self.id.is_empty() {
            obj.insert("id".into(), json!(self.id));
        }
        obj.insert("type".into(), json!(self.kind.wikibase_type()));
        obj.insert("labels".into(), lang_map_json(&self.labels));
        obj.insert("descriptions".into(), lang_map_json(&self.descriptions));
        obj.insert("aliases".into(), alias_map_json(&self.aliases));
        obj.insert(
            "claims".into(),
            claims_by_property_json(&self.claims),
        );
        if self.kind.supports_sitelinks() {
            let mut links = serde_json::Map::new();
            for (site, link) in &self.sitelinks {
                links.insert(site.clone(), link.to_wikibase_json());
            }
            obj.insert("sitelinks".into(), Json::Object(links));
        }
        if let Some(dt) = self.datatype {
            obj.insert("datatype".into(), json!(dt.as_wikibase_str()));
        }
        Json::Object(obj)
    }

    pub fn from_wikibase_json(j: &Json) -> Option<Self> {
        let id = j["id"].as_str().unwrap_or_default().to_string();
        let kind = match j["type"].as_str()? {
            "item" => EntityKind::Item,
            "property" => EntityKind::Property,
            "lexeme" => EntityKind::Lexeme,
            "mediainfo" => EntityKind::MediaInfo,
            _ => return None,
        };
        let labels = lang_map_from_json(&j["labels"]);
        let descriptions = lang_map_from_json(&j["descriptions"]);
        let aliases = alias_map_from_json(&j["aliases"]);
        let claims = claims_from_json(&j["claims"]);
        let mut sitelinks = HashMap::new();
        if let Some(obj) = j["sitelinks"].as_object() {
            for (site, v) in obj {
                if let Some(link) = Sitelink::from_wikibase_json(site, v) {
                    sitelinks.insert(site.clone(), link);
                }
            }
        }
        let datatype = j["datatype"].as_str().and_then(DataType::from_wikibase_str);
        Some(Self {
            id,
            kind,
            labels,
            descriptions,
            aliases,
            claims,
            sitelinks,
            datatype,
        })
    }
}

fn push_unique(out: &mut Vec<String>, id: &str) {
    if !out.iter().any(|x| x == id) {
        out.push(id.to_string());
    }
}

fn lang_map_json(map: &LangStringMap) -> Json {
    let mut obj = serde_json::Map::new();
    for (lang, value) in map {
        obj.insert(lang.clone(), json!({ "language": lang, "value": value }));
    }
    Json::Object(obj)
}

fn lang_map_from_json(j: &Json) -> LangStringMap {
    let mut map = LangStringMap::new();
    if let Some(obj) = j.as_object() {
        for (lang, v) in obj {
            if let Some(value) = v["value"].as_str() {
                map.insert(lang.clone(), value.to_string());
            }
        }
    }
    map
}

fn alias_map_json(map: &AliasMap) -> Json {
    let mut obj = serde_json::Map::new();
    for (lang, values) in map {
        let arr: Vec<Json> = values
            .iter()
            .map(|v| json!({ "language": lang, "value": v }))
            .collect();
        obj.insert(lang.clone(), Json::Array(arr));
    }
    Json::Object(obj)
}

fn alias_map_from_json(j: &Json) -> AliasMap {
    let mut map = AliasMap::new();
    if let Some(obj) = j.as_object() {
        for (lang, arr) in obj {
            let values: Vec<String> = arr
                .as_array()
                .map(|a| a.iter().filter_map(|v| v["value"].as_str().map(str::to_string)).collect())
                .unwrap_or_default();
            map.insert(lang.clone(), values);
        }
    }
    map
}

fn claims_by_property_json(claims: &[Claim]) -> Json {
    let mut obj = serde_json::Map::new();
    for claim in claims {
        let Some(pid) = claim.property() else { continue };
        obj.entry(pid.to_string())
            .or_insert_with(|| Json::Array(Vec::new()))
            .as_array_mut()
            .expect("entry seeded as array above")
            .push(claim.to_wikibase_json());
    }
    Json::Object(obj)
}

fn claims_from_json(j: &Json) -> Vec<Claim> {
    let mut out = Vec::new();
    if let Some(obj) = j.as_object() {
        for arr in obj.values() {
            if let Some(arr) = arr.as_array() {
                out.extend(arr.iter().filter_map(Claim::from_wikibase_json));
            }
        }
    }
    out
}
