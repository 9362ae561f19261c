//! SPARQL / REST gateway: the only network-facing component (base spec §4.1).
//!
//! Everything else in this crate operates on in-memory `Entity`/`Claim`/`Snak`
//! values; this module is where bytes actually go over HTTP.

use crate::entity::{Entity, EntityKind};
use crate::error::MigrationError;
use crate::profile::WikibaseEndpoint;
use anyhow::{Context, Result, anyhow};
use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{RwLock, Semaphore};
use wikimisc::mediawiki::api::Api;

pub const USER_AGENT: &str =
    "User-Agent: wikibase-migrator/0.1.0 (https://github.com/wmde/WikibaseMigrator) reqwest/0.13";

const ENTITY_READ_BATCH_SIZE: usize = 50;
const VALUES_CHUNK_SIZE: usize = 1000;
const MAX_IN_FLIGHT: usize = 10;

/// One SPARQL result row: variable name → bound value's lexical form.
pub type Row = HashMap<String, String>;

#[derive(Debug)]
pub struct Gateway {
    api: Arc<RwLock<Api>>,
    sparql_url: String,
    debug_dir: Option<Arc<tempfile::TempDir>>,
}

impl Gateway {
    pub async fn new(endpoint: &WikibaseEndpoint) -> Result<Self> {
        let builder = wikimisc::mediawiki::reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .gzip(true)
            .deflate(true)
            .brotli(true);
        let mut api = Api::new_from_builder(&endpoint.mediawiki_api_url, builder).await?;
        Self::login(&mut api, endpoint).await?;
        Ok(Self {
            api: Arc::new(RwLock::new(api)),
            sparql_url: endpoint.sparql_url.clone(),
            debug_dir: None,
        })
    }

    /// Builds a gateway pointed at explicit URLs without attempting login;
    /// used by wiremock-backed tests.
    #[cfg(test)]
    async fn new_for_test(api_url: &str, sparql_url: &str) -> Result<Self> {
        let api = Api::new(api_url).await?;
        Ok(Self {
            api: Arc::new(RwLock::new(api)),
            sparql_url: sparql_url.to_string(),
            debug_dir: None,
        })
    }

    /// Enables debug persistence of outbound queries and their raw bindings
    /// (base spec §4.1's diagnostic tracing aid).
    #[must_use]
    pub fn with_debug_dir(mut self, dir: Arc<tempfile::TempDir>) -> Self {
        self.debug_dir = Some(dir);
        self
    }

    async fn login(api: &mut Api, endpoint: &WikibaseEndpoint) -> Result<()> {
        if !endpoint.requires_login {
            return Ok(());
        }
        if endpoint.login_is_incomplete() {
            return Err(MigrationError::LoginRequired(endpoint.name.clone()).into());
        }
        if let Some(token) = &endpoint.consumer_key {
            api.set_oauth2(token);
            return Ok(());
        }
        let user = endpoint.user.as_deref().unwrap_or_default();
        let pass = endpoint
            .bot_password
            .as_deref()
            .or(endpoint.password.as_deref())
            .unwrap_or_default();
        api.login(user, pass).await.context("wikibase login failed")?;
        Ok(())
    }

    /// `execute_select(endpoint, query)` (base spec §4.1). Failures are
    /// logged and surfaced as an empty result; retries are the caller's job.
    pub async fn execute_select(&self, query: &str) -> Vec<Row> {
        match self.run_sparql(query).await {
            Ok(json) => {
                self.persist_debug(query, &json);
                parse_select_bindings(&json)
            }
            Err(e) => {
                log::warn!(target: "gateway", "execute_select failed: {e}");
                Vec::new()
            }
        }
    }

    /// `ask_alive(endpoint)` (base spec §4.1): `ASK { ?s ?p ?o }`, false on any error.
    pub async fn ask_alive(&self) -> bool {
        match self.run_sparql("ASK { ?s ?p ?o }").await {
            Ok(json) => json["boolean"].as_bool().unwrap_or(false),
            Err(_) => false,
        }
    }

    async fn run_sparql(&self, query: &str) -> Result<serde_json::Value> {
        let api = self.api.read().await;
        let params = [("query", query), ("format", "json")];
        let response = api
            .client()
            .post(&self.sparql_url)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .form(&params)
            .send()
            .await?;
        Ok(response.json::<serde_json::Value>().await?)
    }

    /// `execute_values_in_chunks` (base spec §4.1): fans `values` out over
    /// chunks of `chunk_size` substituted into `template` at `$placeholder`,
    /// at most [`MAX_IN_FLIGHT`] chunks in flight; result order is arbitrary.
    pub async fn execute_values_in_chunks(
        &self,
        template: &str,
        placeholder: &str,
        values: &[String],
        chunk_size: Option<usize>,
    ) -> Vec<Row> {
        let chunk_size = chunk_size.unwrap_or(VALUES_CHUNK_SIZE).max(1);
        let semaphore = Arc::new(Semaphore::new(MAX_IN_FLIGHT));
        let chunks: Vec<Vec<String>> = values.chunks(chunk_size).map(<[String]>::to_vec).collect();

        stream::iter(chunks)
            .map(|chunk| {
                let semaphore = semaphore.clone();
                let query = template.replace(placeholder, &chunk.join(" "));
                async move {
                    let _permit = semaphore.acquire().await.expect("semaphore never closed");
                    self.execute_select(&query).await
                }
            })
            .buffer_unordered(MAX_IN_FLIGHT)
            .collect::<Vec<_>>()
            .await
            .into_iter()
            .flatten()
            .collect()
    }

    fn persist_debug(&self, query: &str, json: &serde_json::Value) {
        let Some(dir) = &self.debug_dir else { return };
        let digest = format!("{:x}", md5::compute(query.as_bytes()));
        let query_path = dir.path().join(format!("{digest}.rq"));
        let result_path = dir.path().join(format!("{digest}.json"));
        let _ = std::fs::write(query_path, query);
        let _ = std::fs::write(result_path, json.to_string());
    }

    /// `get_entities_batch` (base spec §4.1): up to 50 pipe-joined IDs per
    /// `wbgetentities` call. The caller issues multiple batches concurrently;
    /// this method performs exactly one call.
    pub async fn get_entities_batch(&self, ids: &[String]) -> Vec<Entity> {
        if ids.is_empty() {
            return Vec::new();
        }
        debug_assert!(ids.len() <= ENTITY_READ_BATCH_SIZE);
        let params: HashMap<String, String> = [
            ("action", "wbgetentities"),
            ("ids", &ids.join("|")),
            ("format", "json"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let api = self.api.read().await;
        let json = match api.get_query_api_json(&params).await {
            Ok(j) => j,
            Err(e) => {
                log::warn!(target: "gateway", "wbgetentities batch failed: {e}");
                return Vec::new();
            }
        };
        if let Some(warnings) = json.get("warnings") {
            log::warn!(target: "gateway", "wbgetentities warnings: {warnings}");
        }
        let Some(entities) = json["entities"].as_object() else {
            return Vec::new();
        };
        entities
            .values()
            .filter(|v| v.get("missing").is_none() && v.get("invalid").is_none())
            .filter_map(Entity::from_wikibase_json)
            .collect()
    }

    /// `get_single_entity` (base spec §4.1): dispatches on the one-letter ID
    /// prefix; returns `None` on `NonExistent`/`Missing`.
    pub async fn get_single_entity(&self, id: &str) -> Result<Option<Entity>> {
        EntityKind::from_id(id)?;
        Ok(self.get_entities_batch(std::slice::from_ref(&id.to_string())).await.into_iter().next())
    }

    /// `write_entity` (base spec §4.1): writes via `wbeditentity` and
    /// returns the server-assigned entity.
    pub async fn write_entity(
        &self,
        entity: &Entity,
        summary: Option<&str>,
        tags: &[String],
    ) -> Result<Entity> {
        let mut api = self.api.write().await;
        let token = api.get_edit_token().await.context("fetching edit token")?;
        let data = entity.to_wikibase_json().to_string();

        let mut params: HashMap<String, String> = HashMap::new();
        params.insert("action".into(), "wbeditentity".into());
        params.insert("data".into(), data);
        params.insert("token".into(), token);
        params.insert("format".into(), "json".into());
        params.insert("bot".into(), "1".into());
        if entity.is_new() {
            params.insert("new".into(), entity.kind.wikibase_type().into());
        } else {
            params.insert("id".into(), entity.id.clone());
        }
        if let Some(summary) = summary {
            params.insert("summary".into(), summary.to_string());
        }
        if !tags.is_empty() {
            params.insert("tags".into(), tags.join("|"));
        }

        let json = api.post_query_api_json(&params).await?;
        if let Some(error) = json.get("error") {
            let info = error["info"].as_str().unwrap_or("unknown wbeditentity error");
            let messages = error["messages"].clone();
            return Err(anyhow!("wbeditentity failed: {info} ({messages})"));
        }
        Entity::from_wikibase_json(&json["entity"]).ok_or_else(|| anyhow!("malformed wbeditentity response"))
    }

    /// `get_supported_languages` (base spec §4.1).
    pub async fn get_supported_languages(&self) -> Result<Vec<String>> {
        let params: HashMap<String, String> = [
            ("action", "query"),
            ("meta", "siteinfo"),
            ("siprop", "languages"),
            ("format", "json"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        let api = self.api.read().await;
        let json = api.get_query_api_json(&params).await?;
        let langs = json["query"]["languages"]
            .as_array()
            .map(|arr| arr.iter().filter_map(|l| l["code"].as_str().map(str::to_string)).collect())
            .unwrap_or_default();
        Ok(langs)
    }
}

fn parse_select_bindings(json: &serde_json::Value) -> Vec<Row> {
    let Some(bindings) = json["results"]["bindings"].as_array() else {
        return Vec::new();
    };
    bindings
        .iter()
        .filter_map(|binding| {
            let obj = binding.as_object()?;
            let row: Row = obj
                .iter()
                .filter_map(|(var, v)| v["value"].as_str().map(|s| (var.clone(), s.to_string())))
                .collect();
            Some(row)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_select_bindings() {
        let json = json!({
            "results": {
                "bindings": [
                    { "source_item": { "value": "http://example/Q1" }, "target_item": { "value": "http://example/Q2" } }
                ]
            }
        });
        let rows = parse_select_bindings(&json);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["source_item"], "http://example/Q1");
    }

    #[test]
    fn missing_bindings_yield_empty() {
        let json = json!({});
        assert!(parse_select_bindings(&json).is_empty());
    }

    #[tokio::test]
    async fn execute_select_against_mock_sparql_endpoint() {
        let mock_server = wiremock::MockServer::start().await;
        let api_url = format!("{}/w/api.php", mock_server.uri());
        let sparql_url = format!("{}/sparql", mock_server.uri());

        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .and(wiremock::matchers::path("/sparql"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_json(json!({
                "head": { "vars": ["source_item", "target_item"] },
                "results": {
                    "bindings": [
                        { "source_item": { "value": "http://source/entity/Q1" }, "target_item": { "value": "http://target/entity/Q2" } }
                    ]
                }
            })))
            .mount(&mock_server)
            .await;

        let gateway = Gateway::new_for_test(&api_url, &sparql_url).await.unwrap();
        let rows = gateway.execute_select("SELECT ?source_item ?target_item WHERE {}").await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["target_item"], "http://target/entity/Q2");
    }

    #[tokio::test]
    async fn get_entities_batch_skips_missing_entries() {
        let mock_server = wiremock::MockServer::start().await;
        let api_url = format!("{}/w/api.php", mock_server.uri());
        let sparql_url = format!("{}/sparql", mock_server.uri());

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/w/api.php"))
            .and(wiremock::matchers::query_param("action", "wbgetentities"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_json(json!({
                "entities": {
                    "Q1": { "id": "Q1", "type": "item", "labels": {}, "descriptions": {}, "aliases": {}, "claims": {}, "sitelinks": {} },
                    "Q404": { "id": "Q404", "missing": "" }
                }
            })))
            .mount(&mock_server)
            .await;

        let gateway = Gateway::new_for_test(&api_url, &sparql_url).await.unwrap();
        let entities = gateway.get_entities_batch(&["Q1".to_string(), "Q404".to_string()]).await;
        assert_eq!(entities.len(), 1);
        assert_eq!(entities[0].id, "Q1");
    }

    #[tokio::test]
    async fn write_entity_surfaces_api_errors() {
        let mock_server = wiremock::MockServer::start().await;
        let api_url = format!("{}/w/api.php", mock_server.uri());
        let sparql_url = format!("{}/sparql", mock_server.uri());

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::query_param("meta", "tokens"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_json(json!({
                "query": { "tokens": { "csrftoken": "token+\\" } }
            })))
            .mount(&mock_server)
            .await;

        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .and(wiremock::matchers::body_string_contains("action=wbeditentity"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_json(json!({
                "error": { "code": "permissiondenied", "info": "permission denied", "messages": [] }
            })))
            .mount(&mock_server)
            .await;

        let gateway = Gateway::new_for_test(&api_url, &sparql_url).await.unwrap();
        let entity = Entity::new("Q1", EntityKind::Item);
        let result = gateway.write_entity(&entity, None, &[]).await;
        assert!(result.is_err());
    }
}
