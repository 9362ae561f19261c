//! Sitelink: an item's link to a page on a member site (base spec §3).

use serde_json::{Value as Json, json};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sitelink {
    pub site: String,
    pub title: String,
    pub badges: Vec<String>,
}

impl Sitelink {
    #[must_use]
    pub fn to_wikibase_json(&self) -> Json {
        json!({
            "site": self.site,
            "title": self.title,
            "badges": self.badges,
        })
    }

    pub fn from_wikibase_json(site: &str, j: &Json) -> Option<Self> {
        Some(Self {
            site: site.to_string(),
            title: j["title"].as_str()?.to_string(),
            badges: j["badges"]
                .as_array()
                .map(|a| a.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
                .unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_with_badges() {
        let link = Sitelink {
            site: "enwiki".to_string(),
            title: "Douglas Adams".to_string(),
            badges: vec!["Q17437798".to_string()],
        };
        let json = link.to_wikibase_json();
        let parsed = Sitelink::from_wikibase_json("enwiki", &json).unwrap();
        assert_eq!(link, parsed);
    }
}
