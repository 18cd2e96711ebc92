use log::{debug, info, warn};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

use super::score::Scorer;
use crate::error::{Error, Result};
use crate::wikidata::{Candidate, KnowledgeBase};

/// Subjects whose entity is known up front. Consulted before any search.
#[derive(Debug, Clone, Deserialize)]
#[serde(transparent)]
pub struct OverrideTable(HashMap<String, String>);

impl Default for OverrideTable {
    fn default() -> Self {
        let overrides: HashMap<String, String> = [
            ("Kinesiska muren", "Q12501"),
            ("Eiffeltornet", "Q243"),
            ("Colosseum", "Q10285"),
            ("Stonehenge", "Q39671"),
            ("Taj Mahal", "Q9141"),
        ]
        .iter()
        .map(|(subject, id)| (subject.to_string(), id.to_string()))
        .collect();

        OverrideTable(overrides)
    }
}

impl OverrideTable {
    pub fn get(&self, subject: &str) -> Option<&str> {
        self.0.get(subject).map(|id| id.as_str())
    }

    /// Entries from `other` replace entries for the same subject.
    pub fn merge(&mut self, other: OverrideTable) {
        self.0.extend(other.0);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        serde_json::from_str(&text)
            .map_err(|err| Error::Config(format!("bad override table in {}: {}", path.display(), err)))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MatchKind {
    Override,
    Scored(i64),
}

/// Entity chosen for a subject. `candidate` is already fetched when the match
/// came out of scoring.
#[derive(Debug, Clone)]
pub struct Match {
    pub id: String,
    pub kind: MatchKind,
    pub candidate: Option<Candidate>,
}

pub struct Resolver {
    pub overrides: OverrideTable,
    pub scorer: Scorer,
    pub languages: Vec<String>,
    /// Search hits requested per language.
    pub search_limit: usize,
    /// Cap on entity fetches per subject.
    pub max_candidates: usize,
}

impl Default for Resolver {
    fn default() -> Self {
        Resolver {
            overrides: OverrideTable::default(),
            scorer: Scorer::default(),
            languages: vec!["en".to_string(), "sv".to_string()],
            search_limit: 7,
            max_candidates: 12,
        }
    }
}

impl Resolver {
    /// Search every configured language and merge the hits, first-seen order,
    /// without duplicates.
    fn candidate_ids(&self, kb: &dyn KnowledgeBase, term: &str) -> Result<Vec<String>> {
        let mut ids: Vec<String> = vec![];

        for language in &self.languages {
            for id in kb.search_by_label(term, language, self.search_limit)? {
                if !ids.contains(&id) {
                    ids.push(id);
                }
            }
        }

        Ok(ids)
    }

    /// Best entity for `subject`. `term` is what gets searched, which may be
    /// the subject with a hint appended.
    pub fn resolve(
        &self,
        kb: &dyn KnowledgeBase,
        subject: &str,
        term: &str,
    ) -> Result<Option<Match>> {
        if let Some(id) = self.overrides.get(subject) {
            info!("Using override {} for {:?}", id, subject);
            return Ok(Some(Match {
                id: id.to_string(),
                kind: MatchKind::Override,
                candidate: None,
            }));
        }

        let ids = self.candidate_ids(kb, term)?;

        if ids.is_empty() {
            debug!("No search hits for {:?}", term);
            return Ok(None);
        }

        let mut best: Option<(i64, Candidate)> = None;

        for id in ids.iter().take(self.max_candidates) {
            let candidate = match kb.fetch_entity(id) {
                Ok(candidate) => candidate,
                Err(err) => {
                    warn!("Skipping candidate {}: {}", id, err);
                    continue;
                }
            };

            let score = self.scorer.score(&candidate, Some(subject));
            debug!("{} {:?} scored {}", candidate.id, subject, score);

            // Strictly greater, so ties keep the earlier search hit.
            if best.as_ref().map_or(true, |(top, _)| score > *top) {
                best = Some((score, candidate));
            }
        }

        Ok(best.map(|(score, candidate)| Match {
            id: candidate.id.clone(),
            kind: MatchKind::Scored(score),
            candidate: Some(candidate),
        }))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::wikidata::ClaimValue;
    use std::cell::RefCell;

    /// In-memory knowledge base recording every call made to it.
    #[derive(Default)]
    pub(crate) struct StubKnowledgeBase {
        pub search: HashMap<(String, String), Vec<String>>,
        pub entities: HashMap<String, Candidate>,
        pub searches: RefCell<Vec<(String, String)>>,
        pub fetches: RefCell<Vec<String>>,
    }

    impl StubKnowledgeBase {
        pub fn with_hits(mut self, term: &str, language: &str, ids: &[&str]) -> Self {
            self.search.insert(
                (term.to_string(), language.to_string()),
                ids.iter().map(|id| id.to_string()).collect(),
            );
            self
        }

        pub fn with_entity(mut self, candidate: Candidate) -> Self {
            self.entities.insert(candidate.id.clone(), candidate);
            self
        }
    }

    impl KnowledgeBase for StubKnowledgeBase {
        fn search_by_label(&self, term: &str, language: &str, limit: usize) -> Result<Vec<String>> {
            self.searches
                .borrow_mut()
                .push((term.to_string(), language.to_string()));
            let mut ids = self
                .search
                .get(&(term.to_string(), language.to_string()))
                .cloned()
                .unwrap_or_default();
            ids.truncate(limit);
            Ok(ids)
        }

        fn fetch_entity(&self, id: &str) -> Result<Candidate> {
            self.fetches.borrow_mut().push(id.to_string());
            self.entities
                .get(id)
                .cloned()
                .ok_or_else(|| Error::Network(format!("timed out fetching {}", id)))
        }
    }

    pub(crate) fn entity(id: &str, sitelinks: usize, image: Option<&str>) -> Candidate {
        let mut candidate = Candidate {
            id: id.to_string(),
            sitelinks,
            ..Candidate::default()
        };
        if let Some(image) = image {
            candidate
                .claims
                .insert("P18".to_string(), vec![ClaimValue::Text(image.to_string())]);
        }
        candidate
    }

    #[test]
    fn override_wins_over_search() {
        let kb = StubKnowledgeBase::default()
            .with_hits("Kinesiska muren", "en", &["Q1", "Q2"])
            .with_entity(entity("Q1", 100, Some("Other.jpg")));
        let resolver = Resolver::default();

        let found = resolver
            .resolve(&kb, "Kinesiska muren", "Kinesiska muren")
            .unwrap()
            .unwrap();

        assert_eq!(found.id, "Q12501");
        assert_eq!(found.kind, MatchKind::Override);
        assert!(kb.searches.borrow().is_empty());
        assert!(kb.fetches.borrow().is_empty());
    }

    #[test]
    fn override_needs_exact_subject() {
        let kb = StubKnowledgeBase::default();
        let resolver = Resolver::default();

        assert!(resolver
            .resolve(&kb, "kinesiska muren", "kinesiska muren")
            .unwrap()
            .is_none());
        assert_eq!(kb.searches.borrow().len(), 2);
    }

    #[test]
    fn merges_languages_without_duplicates() {
        let kb = StubKnowledgeBase::default()
            .with_hits("Vasa", "en", &["Q3", "Q1"])
            .with_hits("Vasa", "sv", &["Q1", "Q2"]);
        let resolver = Resolver {
            overrides: serde_json::from_str("{}").unwrap(),
            ..Resolver::default()
        };

        assert_eq!(resolver.candidate_ids(&kb, "Vasa").unwrap(), vec!["Q3", "Q1", "Q2"]);
    }

    #[test]
    fn picks_highest_score() {
        let kb = StubKnowledgeBase::default()
            .with_hits("Vasa", "en", &["Q1", "Q2"])
            .with_hits("Vasa", "sv", &["Q3"])
            .with_entity(entity("Q1", 3, None))
            .with_entity(entity("Q2", 40, Some("Vasa.jpg")))
            .with_entity(entity("Q3", 12, Some("Vasa2.jpg")));
        let resolver = Resolver::default();

        let found = resolver.resolve(&kb, "Vasa", "Vasa").unwrap().unwrap();
        assert_eq!(found.id, "Q2");
        assert_eq!(found.kind, MatchKind::Scored(6));
        assert_eq!(found.candidate.unwrap().id, "Q2");
    }

    #[test]
    fn ties_keep_first_seen() {
        let kb = StubKnowledgeBase::default()
            .with_hits("Vasa", "en", &["Q7", "Q8"])
            .with_entity(entity("Q7", 10, None))
            .with_entity(entity("Q8", 10, None));
        let resolver = Resolver::default();

        assert_eq!(resolver.resolve(&kb, "Vasa", "Vasa").unwrap().unwrap().id, "Q7");
    }

    #[test]
    fn fetch_failures_are_skipped() {
        let kb = StubKnowledgeBase::default()
            .with_hits("Vasa", "en", &["Q404", "Q2"])
            .with_entity(entity("Q2", 0, None));
        let resolver = Resolver::default();

        assert_eq!(resolver.resolve(&kb, "Vasa", "Vasa").unwrap().unwrap().id, "Q2");
    }

    #[test]
    fn all_fetches_failing_gives_none() {
        let kb = StubKnowledgeBase::default().with_hits("Vasa", "sv", &["Q404", "Q405"]);
        let resolver = Resolver::default();

        assert!(resolver.resolve(&kb, "Vasa", "Vasa").unwrap().is_none());
        assert_eq!(kb.fetches.borrow().len(), 2);
    }

    #[test]
    fn fetches_are_bounded() {
        let ids: Vec<String> = (1..=20).map(|n| format!("Q{}", n)).collect();
        let ids: Vec<&str> = ids.iter().map(|id| id.as_str()).collect();
        let kb = StubKnowledgeBase::default().with_hits("Vasa", "en", &ids);
        let resolver = Resolver {
            search_limit: 50,
            max_candidates: 4,
            ..Resolver::default()
        };

        assert!(resolver.resolve(&kb, "Vasa", "Vasa").unwrap().is_none());
        assert_eq!(*kb.fetches.borrow(), vec!["Q1", "Q2", "Q3", "Q4"]);
    }

    #[test]
    fn searches_with_hinted_term() {
        let kb = StubKnowledgeBase::default()
            .with_hits("Vasa 1600-talet", "en", &["Q2"])
            .with_entity(entity("Q2", 0, None));
        let resolver = Resolver::default();

        let found = resolver.resolve(&kb, "Vasa", "Vasa 1600-talet").unwrap().unwrap();
        assert_eq!(found.id, "Q2");
    }

    #[test]
    fn override_table_loads_from_json() {
        let mut table = OverrideTable::default();
        let extra: OverrideTable =
            serde_json::from_str(r#"{"Vasaskeppet": "Q214", "Colosseum": "Q1"}"#).unwrap();
        table.merge(extra);

        assert_eq!(table.get("Vasaskeppet"), Some("Q214"));
        assert_eq!(table.get("Colosseum"), Some("Q1"));
        assert_eq!(table.get("Kinesiska muren"), Some("Q12501"));
    }
}
