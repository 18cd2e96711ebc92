use log::debug;
use serde::Deserialize;
use std::path::Path;

use crate::error::{Error, Result};
use crate::wikidata::Candidate;

/// Wikidata "image" property.
pub const PROP_IMAGE: &str = "P18";
/// Wikidata "country" property.
pub const PROP_COUNTRY: &str = "P17";
/// Wikidata "heritage designation" property.
pub const PROP_HERITAGE: &str = "P1435";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Weights {
    pub anchor: i64,
    pub notability: i64,
    pub image: i64,
    pub label_match: i64,
    /// Sitelink bands as (minimum count, weight), highest band first. Only the
    /// first band reached counts.
    pub sitelink_bands: Vec<(usize, i64)>,
    pub disallowed_description: i64,
}

impl Default for Weights {
    fn default() -> Self {
        Weights {
            anchor: 5,
            notability: 4,
            image: 3,
            label_match: 2,
            sitelink_bands: vec![(20, 3), (10, 2), (5, 1)],
            disallowed_description: -10,
        }
    }
}

/// A claim the scorer looks for, e.g. country = Sweden.
#[derive(Debug, Clone, Deserialize)]
pub struct Anchor {
    pub property: String,
    pub value: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScoringRules {
    pub anchor: Option<Anchor>,
    pub notability_property: Option<String>,
    pub image_property: String,
    /// Description languages concatenated before the disallow check.
    pub description_languages: Vec<String>,
    /// Lower-case substrings marking an unwanted kind of entity.
    pub disallowed_descriptions: Vec<String>,
    pub weights: Weights,
}

impl Default for ScoringRules {
    fn default() -> Self {
        ScoringRules {
            anchor: Some(Anchor {
                property: PROP_COUNTRY.to_string(),
                value: "Q34".to_string(),
            }),
            notability_property: Some(PROP_HERITAGE.to_string()),
            image_property: PROP_IMAGE.to_string(),
            description_languages: vec!["en".to_string(), "sv".to_string()],
            disallowed_descriptions: [
                "street",
                "road in",
                "gata i",
                "väg i",
                "residential building",
                "apartment building",
                "bostadshus",
                "flerbostadshus",
                "disambiguation page",
                "wikimedia-förgreningssida",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            weights: Weights::default(),
        }
    }
}

impl ScoringRules {
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        serde_json::from_str(&text)
            .map_err(|err| Error::Config(format!("bad scoring rules in {}: {}", path.display(), err)))
    }
}

#[derive(Debug, Clone, Default)]
pub struct Scorer {
    pub rules: ScoringRules,
}

impl Scorer {
    pub fn new(rules: ScoringRules) -> Self {
        Scorer { rules }
    }

    /// Confidence that `candidate` is the entity a catalog entry is about.
    /// Pure and deterministic.
    pub fn score(&self, candidate: &Candidate, subject: Option<&str>) -> i64 {
        let rules = &self.rules;
        let weights = &rules.weights;
        let mut score = 0;

        if let Some(anchor) = &rules.anchor {
            if candidate.has_entity_value(&anchor.property, &anchor.value) {
                score += weights.anchor;
            }
        }

        if let Some(property) = &rules.notability_property {
            if candidate.has_claim(property) {
                score += weights.notability;
            }
        }

        if candidate.has_claim(&rules.image_property) {
            score += weights.image;
        }

        if let Some(subject) = subject {
            let subject = subject.trim().to_lowercase();
            if candidate
                .labels
                .values()
                .any(|label| label.trim().to_lowercase() == subject)
            {
                score += weights.label_match;
            }
        }

        if let Some((_, weight)) = weights
            .sitelink_bands
            .iter()
            .find(|(min, _)| candidate.sitelinks >= *min)
        {
            score += weight;
        }

        if let Some(hit) = self.disallowed_description(candidate) {
            debug!("{} description matches {:?}", candidate.id, hit);
            score += weights.disallowed_description;
        }

        score
    }

    fn disallowed_description(&self, candidate: &Candidate) -> Option<&str> {
        let descriptions = self
            .rules
            .description_languages
            .iter()
            .filter_map(|lang| candidate.descriptions.get(lang))
            .map(|d| d.to_lowercase())
            .collect::<Vec<String>>()
            .join(" ");

        self.rules
            .disallowed_descriptions
            .iter()
            .map(|s| s.as_str())
            .find(|s| descriptions.contains(&s.to_lowercase()))
    }
}
