//! Snak: a property-value cell (base spec §3).

use crate::datatype::{DataType, DataValue};
use serde_json::{Value as Json, json};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SnakType {
    KnownValue,
    UnknownValue,
    NoValue,
}

impl SnakType {
    #[must_use]
    pub const fn as_wikibase_str(self) -> &'static str {
        match self {
            Self::KnownValue => "value",
            Self::UnknownValue => "somevalue",
            Self::NoValue => "novalue",
        }
    }

    #[must_use]
    pub fn from_wikibase_str(s: &str) -> Option<Self> {
        Some(match s {
            "value" => Self::KnownValue,
            "somevalue" => Self::UnknownValue,
            "novalue" => Self::NoValue,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Snak {
    pub property: String,
    pub datatype: DataType,
    pub snaktype: SnakType,
    pub datavalue: Option<DataValue>,
}

impl Snak {
    #[must_use]
    pub fn known_value(property: impl Into<String>, datatype: DataType, value: DataValue) -> Self {
        Self {
            property: property.into(),
            datatype,
            snaktype: SnakType::KnownValue,
            datavalue: Some(value),
        }
    }

    #[must_use]
    pub fn without_value(property: impl Into<String>, datatype: DataType, snaktype: SnakType) -> Self {
        debug_assert!(snaktype != SnakType::KnownValue);
        Self {
            property: property.into(),
            datatype,
            snaktype,
            datavalue: None,
        }
    }

    #[must_use]
    pub fn to_wikibase_json(&self) -> Json {
        let mut obj = serde_json::Map::new();
        obj.insert("snaktype".into(), json!(self.snaktype.as_wikibase_str()));
        obj.insert("property".into(), json!(self.property));
        obj.insert("datatype".into(), json!(self.datatype.as_wikibase_str()));
        if let Some(v) = &self.datavalue {
            obj.insert(
                "datavalue".into(),
                json!({
                    "value": v.to_wikibase_json(),
                    "type": datavalue_type_tag(self.datatype),
                }),
            );
        }
        Json::Object(obj)
    }

    pub fn from_wikibase_json(j: &Json) -> Option<Self> {
        let property = j["property"].as_str()?.to_string();
        let datatype = DataType::from_wikibase_str(j["datatype"].as_str()?)?;
        let snaktype = SnakType::from_wikibase_str(j["snaktype"].as_str()?)?;
        let datavalue = match snaktype {
            SnakType::KnownValue => {
                Some(DataValue::from_wikibase_json(datatype, &j["datavalue"]["value"])?)
            }
            _ => None,
        };
        Some(Self {
            property,
            datatype,
            snaktype,
            datavalue,
        })
    }

    /// Content hash used by the merger (base spec §4.4): a stable
    /// serialization of the datavalue with sorted keys. Snaks without a
    /// value (`somevalue`/`novalue`) hash on their snaktype instead, so two
    /// "unknown value" snaks on the same property are still considered
    /// equivalent.
    #[must_use]
    pub fn datavalue_hash(&self) -> u64 {
        let basis = match &self.datavalue {
            Some(v) => v.canonical_json(),
            None => format!("__novalue__:{}", self.snaktype.as_wikibase_str()),
        };
        fnv1a(basis.as_bytes())
    }
}

/// The `datavalue.type` discriminator Wikibase uses on the wire, which is
/// coarser than our `DataType` (several text-like datatypes share `string`,
/// and `wikibase-item` values are tagged `wikibase-entityid`).
fn datavalue_type_tag(datatype: DataType) -> &'static str {
    match datatype {
        DataType::WikibaseItem => "wikibase-entityid",
        DataType::Time => "time",
        DataType::Quantity => "quantity",
        DataType::MonolingualText => "monolingualtext",
        DataType::GlobeCoordinate => "globecoordinate",
        dt if dt.is_text_like() => "string",
        _ => "string",
    }
}

/// Small non-cryptographic hash (FNV-1a) for content-addressed dedup. The
/// merger only needs equality comparison between in-process values, not
/// collision resistance against adversarial input.
#[must_use]
pub fn fnv1a(bytes: &[u8]) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    let mut hash = OFFSET;
    for &b in bytes {
        hash ^= u64::from(b);
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datatype::ItemValue;

    #[test]
    fn known_value_round_trips() {
        let snak = Snak::known_value(
            "P31",
            DataType::WikibaseItem,
            DataValue::Item(ItemValue { id: "Q5".to_string() }),
        );
        let json = snak.to_wikibase_json();
        let parsed = Snak::from_wikibase_json(&json).unwrap();
        assert_eq!(snak, parsed);
    }

    #[test]
    fn no_value_snak_has_no_datavalue_field() {
        let snak = Snak::without_value("P31", DataType::WikibaseItem, SnakType::NoValue);
        let json = snak.to_wikibase_json();
        assert!(json.get("datavalue").is_none());
        let parsed = Snak::from_wikibase_json(&json).unwrap();
        assert_eq!(parsed.snaktype, SnakType::NoValue);
        assert!(parsed.datavalue.is_none());
    }

    #[test]
    fn equal_datavalues_hash_equal() {
        let a = Snak::known_value("P31", DataType::WikibaseItem, DataValue::Item(ItemValue { id: "Q5".into() }));
        let b = Snak::known_value("P31", DataType::WikibaseItem, DataValue::Item(ItemValue { id: "Q5".into() }));
        assert_eq!(a.datavalue_hash(), b.datavalue_hash());
    }

    #[test]
    fn different_datavalues_hash_differently() {
        let a = Snak::known_value("P31", DataType::WikibaseItem, DataValue::Item(ItemValue { id: "Q5".into() }));
        let b = Snak::known_value("P31", DataType::WikibaseItem, DataValue::Item(ItemValue { id: "Q6".into() }));
        assert_ne!(a.datavalue_hash(), b.datavalue_hash());
    }
}
