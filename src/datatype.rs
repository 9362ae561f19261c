//! Closed sum type over Wikibase property datatypes (base spec §3, Design Notes).
//!
//! The source tool dispatches on a free-form datatype string; this type
//! makes that dispatch exhaustive so a new variant is a compile error at
//! every match site instead of a silent no-op fallthrough.

use serde::{Deserialize, Serialize};
use serde_json::{Value as Json, json};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DataType {
    String,
    ExternalId,
    Url,
    CommonsMedia,
    GeoShape,
    TabularData,
    EntitySchema,
    Property,
    WikibaseItem,
    Time,
    Quantity,
    MonolingualText,
    GlobeCoordinate,
}

impl DataType {
    #[must_use]
    pub const fn as_wikibase_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::ExternalId => "external-id",
            Self::Url => "url",
            Self::CommonsMedia => "commonsMedia",
            Self::GeoShape => "geo-shape",
            Self::TabularData => "tabular-data",
            Self::EntitySchema => "entity-schema",
            Self::Property => "property",
            Self::WikibaseItem => "wikibase-item",
            Self::Time => "time",
            Self::Quantity => "quantity",
            Self::MonolingualText => "monolingualtext",
            Self::GlobeCoordinate => "globecoordinate",
        }
    }

    #[must_use]
    pub fn from_wikibase_str(s: &str) -> Option<Self> {
        Some(match s {
            "string" => Self::String,
            "external-id" => Self::ExternalId,
            "url" => Self::Url,
            "commonsMedia" => Self::CommonsMedia,
            "geo-shape" => Self::GeoShape,
            "tabular-data" => Self::TabularData,
            "entity-schema" => Self::EntitySchema,
            "property" => Self::Property,
            "wikibase-item" => Self::WikibaseItem,
            "time" => Self::Time,
            "quantity" => Self::Quantity,
            "monolingualtext" => Self::MonolingualText,
            "globecoordinate" => Self::GlobeCoordinate,
            _ => return None,
        })
    }

    /// Whether this datatype's payload is a bare text value (several
    /// datatypes share the same `Text` `DataValue` variant; see §3).
    #[must_use]
    pub const fn is_text_like(self) -> bool {
        matches!(
            self,
            Self::String
                | Self::ExternalId
                | Self::Url
                | Self::CommonsMedia
                | Self::GeoShape
                | Self::TabularData
                | Self::EntitySchema
                | Self::Property
        )
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_wikibase_str())
    }
}

/// A datavalue payload, one variant per §3's datatype table.
///
/// Several `DataType`s (`String`, `ExternalId`, `Url`, `CommonsMedia`,
/// `GeoShape`, `TabularData`, `EntitySchema`, `Property`) share the `Text`
/// payload; `datatype` on the owning snak is what subclassifies them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DataValue {
    Text(String),
    Item(ItemValue),
    Time(TimeValue),
    Quantity(QuantityValue),
    MonolingualText(MonolingualTextValue),
    GlobeCoordinate(GlobeCoordinateValue),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemValue {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeValue {
    pub time: String,
    pub precision: u8,
    pub before: i64,
    pub after: i64,
    pub timezone: i64,
    pub calendarmodel: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuantityValue {
    pub amount: String,
    pub unit: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upper_bound: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lower_bound: Option<String>,
}

impl QuantityValue {
    pub const UNITLESS: &'static str = "1";

    #[must_use]
    pub fn is_unitless(&self) -> bool {
        self.unit == Self::UNITLESS
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonolingualTextValue {
    pub text: String,
    pub language: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobeCoordinateValue {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub altitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub precision: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub globe: Option<String>,
}

impl DataValue {
    /// Serializes to the shape `wbgetentities`/`wbeditentity` use for a
    /// snak's `datavalue.value` field (the `datavalue.type` wrapper is
    /// written by the caller, which knows the owning `DataType`).
    #[must_use]
    pub fn to_wikibase_json(&self) -> Json {
        match self {
            Self::Text(s) => json!(s),
            Self::Item(v) => json!({
                "entity-type": entity_type_for_id(&v.id),
                "id": v.id,
            }),
            Self::Time(v) => json!({
                "time": v.time,
                "precision": v.precision,
                "before": v.before,
                "after": v.after,
                "timezone": v.timezone,
                "calendarmodel": v.calendarmodel,
            }),
            Self::Quantity(v) => {
                let mut obj = serde_json::Map::new();
                obj.insert("amount".into(), json!(v.amount));
                obj.insert("unit".into(), json!(v.unit));
                if let Some(u) = &v.upper_bound {
                    obj.insert("upperBound".into(), json!(u));
                }
                if let Some(l) = &v.lower_bound {
                    obj.insert("lowerBound".into(), json!(l));
                }
                Json::Object(obj)
            }
            Self::MonolingualText(v) => json!({
                "text": v.text,
                "language": v.language,
            }),
            Self::GlobeCoordinate(v) => json!({
                "latitude": v.latitude,
                "longitude": v.longitude,
                "altitude": v.altitude,
                "precision": v.precision,
                "globe": v.globe,
            }),
        }
    }

    /// Parses a `datavalue.value` payload given the snak's `DataType`.
    #[must_use]
    pub fn from_wikibase_json(datatype: DataType, value: &Json) -> Option<Self> {
        if datatype.is_text_like() {
            return Some(Self::Text(value.as_str()?.to_string()));
        }
        match datatype {
            DataType::WikibaseItem => Some(Self::Item(ItemValue {
                id: value["id"].as_str()?.to_string(),
            })),
            DataType::Time => Some(Self::Time(TimeValue {
                time: value["time"].as_str()?.to_string(),
                precision: value["precision"].as_u64()? as u8,
                before: value["before"].as_i64().unwrap_or(0),
                after: value["after"].as_i64().unwrap_or(0),
                timezone: value["timezone"].as_i64().unwrap_or(0),
                calendarmodel: value["calendarmodel"]
                    .as_str()
                    .unwrap_or("http://www.wikidata.org/entity/Q1985727")
                    .to_string(),
            })),
            DataType::Quantity => Some(Self::Quantity(QuantityValue {
                amount: value["amount"].as_str()?.to_string(),
                unit: value["unit"].as_str().unwrap_or("1").to_string(),
                upper_bound: value["upperBound"].as_str().map(str::to_string),
                lower_bound: value["lowerBound"].as_str().map(str::to_string),
            })),
            DataType::MonolingualText => Some(Self::MonolingualText(MonolingualTextValue {
                text: value["text"].as_str()?.to_string(),
                language: value["language"].as_str()?.to_string(),
            })),
            DataType::GlobeCoordinate => Some(Self::GlobeCoordinate(GlobeCoordinateValue {
                latitude: value["latitude"].as_f64()?,
                longitude: value["longitude"].as_f64()?,
                altitude: value["altitude"].as_f64(),
                precision: value["precision"].as_f64(),
                globe: value["globe"].as_str().map(str::to_string),
            })),
            _ => unreachable!("text-like datatypes handled above"),
        }
    }

    /// Stable, sorted-key JSON string used as the basis of the merger's
    /// content hash (base spec §4.4).
    #[must_use]
    pub fn canonical_json(&self) -> String {
        canonical_json_string(&self.to_wikibase_json())
    }
}

fn entity_type_for_id(id: &str) -> &'static str {
    match id.chars().next() {
        Some('P') => "property",
        Some('L') => "lexeme",
        Some('M') => "mediainfo",
        _ => "item",
    }
}

/// Serializes a JSON value with object keys sorted, recursively, so equal
/// values always produce an identical string regardless of field order.
fn canonical_json_string(value: &Json) -> String {
    match value {
        Json::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut out = String::from("{");
            for (i, k) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&serde_json::to_string(k).unwrap_or_default());
                out.push(':');
                out.push_str(&canonical_json_string(&map[*k]));
            }
            out.push('}');
            out
        }
        Json::Array(items) => {
            let mut out = String::from("[");
            for (i, v) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&canonical_json_string(v));
            }
            out.push(']');
            out
        }
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_every_wikibase_string() {
        let all = [
            DataType::String,
            DataType::ExternalId,
            DataType::Url,
            DataType::CommonsMedia,
            DataType::GeoShape,
            DataType::TabularData,
            DataType::EntitySchema,
            DataType::Property,
            DataType::WikibaseItem,
            DataType::Time,
            DataType::Quantity,
            DataType::MonolingualText,
            DataType::GlobeCoordinate,
        ];
        for dt in all {
            let s = dt.as_wikibase_str();
            assert_eq!(DataType::from_wikibase_str(s), Some(dt));
        }
    }

    #[test]
    fn unitless_quantity_is_detected() {
        let q = QuantityValue {
            amount: "+5".to_string(),
            unit: "1".to_string(),
            upper_bound: None,
            lower_bound: None,
        };
        assert!(q.is_unitless());
    }

    #[test]
    fn quantity_round_trips_through_wire_json() {
        let v = DataValue::Quantity(QuantityValue {
            amount: "+5".to_string(),
            unit: "http://www.wikidata.org/entity/Q11573".to_string(),
            upper_bound: None,
            lower_bound: None,
        });
        let json = v.to_wikibase_json();
        let parsed = DataValue::from_wikibase_json(DataType::Quantity, &json).unwrap();
        assert_eq!(v, parsed);
    }

    #[test]
    fn canonical_json_is_order_independent() {
        let a = json!({"b": 1, "a": 2});
        let b = json!({"a": 2, "b": 1});
        assert_eq!(canonical_json_string(&a), canonical_json_string(&b));
    }
}
