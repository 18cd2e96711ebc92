use log::debug;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::http::Api;

const WIKIDATA_API: &str = "https://www.wikidata.org/w/api.php";

/// Entity search and entity fetch against a linked-data knowledge base.
pub trait KnowledgeBase {
    /// Identifiers matching `term` in `language`, in the service's relevance
    /// order. Empty when nothing matches.
    fn search_by_label(&self, term: &str, language: &str, limit: usize) -> Result<Vec<String>>;

    fn fetch_entity(&self, id: &str) -> Result<Candidate>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClaimValue {
    Entity(String),
    Text(String),
    Other,
}

/// A knowledge-base entity considered for a subject.
#[derive(Debug, Clone, Default)]
pub struct Candidate {
    pub id: String,
    pub labels: HashMap<String, String>,
    pub descriptions: HashMap<String, String>,
    pub claims: HashMap<String, Vec<ClaimValue>>,
    pub sitelinks: usize,
}

impl Candidate {
    pub fn has_claim(&self, property: &str) -> bool {
        self.claims
            .get(property)
            .map_or(false, |values| !values.is_empty())
    }

    pub fn has_entity_value(&self, property: &str, id: &str) -> bool {
        self.claims.get(property).map_or(false, |values| {
            values
                .iter()
                .any(|value| matches!(value, ClaimValue::Entity(v) if v == id))
        })
    }

    /// First plain string value of `property`, e.g. a Commons file name.
    pub fn first_text(&self, property: &str) -> Option<&str> {
        self.claims.get(property)?.iter().find_map(|value| match value {
            ClaimValue::Text(text) if !text.trim().is_empty() => Some(text.as_str()),
            _ => None,
        })
    }
}

#[derive(Deserialize)]
struct SearchHit {
    id: String,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    search: Vec<SearchHit>,
}

#[derive(Deserialize)]
struct Label {
    value: String,
}

#[derive(Deserialize)]
struct Snak {
    datavalue: Option<DataValue>,
}

#[derive(Deserialize)]
struct Claim {
    mainsnak: Snak,
}

#[derive(Deserialize)]
struct DataValue {
    #[serde(rename = "type")]
    value_type: String,
    value: Value,
}

#[derive(Deserialize)]
struct EntityData {
    id: Option<String>,
    missing: Option<Value>,
    #[serde(default)]
    labels: HashMap<String, Label>,
    #[serde(default)]
    descriptions: HashMap<String, Label>,
    #[serde(default)]
    claims: HashMap<String, Vec<Claim>>,
    #[serde(default)]
    sitelinks: HashMap<String, Value>,
}

#[derive(Deserialize)]
struct EntitiesResponse {
    #[serde(default)]
    entities: HashMap<String, EntityData>,
}

fn claim_value(datavalue: &DataValue) -> ClaimValue {
    match datavalue.value_type.as_str() {
        "string" => match datavalue.value.as_str() {
            Some(text) => ClaimValue::Text(text.to_string()),
            None => ClaimValue::Other,
        },
        "wikibase-entityid" => {
            if let Some(id) = datavalue.value["id"].as_str() {
                return ClaimValue::Entity(id.to_string());
            }
            // Older payloads only carry the numeric part.
            match datavalue.value["numeric-id"].as_u64() {
                Some(numeric) => ClaimValue::Entity(format!("Q{}", numeric)),
                None => ClaimValue::Other,
            }
        }
        _ => ClaimValue::Other,
    }
}

fn into_candidate(id: &str, entity: EntityData) -> Candidate {
    let claims = entity
        .claims
        .into_iter()
        .map(|(property, claims)| {
            let values = claims
                .iter()
                .filter_map(|claim| claim.mainsnak.datavalue.as_ref())
                .map(claim_value)
                .collect();
            (property, values)
        })
        .collect();

    Candidate {
        id: entity.id.unwrap_or_else(|| id.to_string()),
        labels: entity
            .labels
            .into_iter()
            .map(|(lang, label)| (lang, label.value))
            .collect(),
        descriptions: entity
            .descriptions
            .into_iter()
            .map(|(lang, label)| (lang, label.value))
            .collect(),
        claims,
        sitelinks: entity.sitelinks.len(),
    }
}

fn search_ids(res: SearchResponse) -> Vec<String> {
    res.search.into_iter().map(|hit| hit.id).collect()
}

/// Picks `id` out of a `wbgetentities` payload. A redirected identifier comes
/// back under its target's key, so a lone entity is accepted as well.
fn pick_entity(id: &str, mut res: EntitiesResponse) -> Result<Candidate> {
    let entity = match res.entities.remove(id) {
        Some(entity) => Some(entity),
        None if res.entities.len() == 1 => res.entities.into_iter().next().map(|(_, e)| e),
        None => None,
    };

    match entity {
        Some(entity) if entity.missing.is_none() => Ok(into_candidate(id, entity)),
        _ => Err(Error::NotFound(format!("entity {}", id))),
    }
}

pub struct WikidataClient<'a> {
    api: &'a Api,
    /// Languages requested for labels and descriptions.
    languages: String,
}

impl<'a> WikidataClient<'a> {
    pub fn new(api: &'a Api, languages: &[String]) -> Self {
        WikidataClient {
            api,
            languages: languages.join("|"),
        }
    }
}

impl KnowledgeBase for WikidataClient<'_> {
    fn search_by_label(&self, term: &str, language: &str, limit: usize) -> Result<Vec<String>> {
        let limit = limit.to_string();
        let res: SearchResponse = self.api.get_json(
            "wikidata",
            WIKIDATA_API,
            &[
                ("action", "wbsearchentities"),
                ("search", term),
                ("language", language),
                ("uselang", language),
                ("type", "item"),
                ("limit", limit.as_str()),
                ("format", "json"),
            ],
        )?;

        let ids = search_ids(res);
        debug!("Search {:?} ({}) gave {:?}", term, language, ids);
        Ok(ids)
    }

    fn fetch_entity(&self, id: &str) -> Result<Candidate> {
        let res: EntitiesResponse = self.api.get_json(
            "wikidata",
            WIKIDATA_API,
            &[
                ("action", "wbgetentities"),
                ("ids", id),
                ("props", "labels|descriptions|claims|sitelinks"),
                ("languages", self.languages.as_str()),
                ("format", "json"),
            ],
        )?;

        pick_entity(id, res)
    }
}
