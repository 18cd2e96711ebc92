use serde::de::{self, Deserializer};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;

use crate::error::Result;

/// Legacy placeholder meaning "no image yet".
pub const IMAGE_PLACEHOLDER: &str = "TBD";

const REQUIRED_FIELDS: [&str; 2] = ["answer", "question"];

/// One quiz item. Fields are kept in file order, unknown fields included.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CatalogEntry(Map<String, Value>);

impl CatalogEntry {
    pub fn text(&self, field: &str) -> Option<&str> {
        self.0.get(field)?.as_str()
    }

    pub fn answer(&self) -> Option<&str> {
        self.text("answer")
    }

    pub fn image_url(&self) -> Option<&str> {
        self.text("imageUrl")
    }

    /// Scalar field rendered for use in a search term, `None` when blank.
    pub fn hint(&self, field: &str) -> Option<String> {
        let hint = match self.0.get(field)? {
            Value::String(s) => s.trim().to_string(),
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            _ => return None,
        };

        if hint.is_empty() {
            None
        } else {
            Some(hint)
        }
    }

    /// True when `imageUrl` is absent, blank or the legacy placeholder.
    pub fn needs_image(&self) -> bool {
        match self.image_url().map(str::trim) {
            None | Some("") => true,
            Some(url) => url.eq_ignore_ascii_case(IMAGE_PLACEHOLDER),
        }
    }

    /// Image and attribution always change together.
    pub fn set_image(&mut self, url: &str, attribution: &str) {
        self.0
            .insert("imageUrl".to_string(), Value::String(url.to_string()));
        self.0.insert(
            "attribution".to_string(),
            Value::String(attribution.to_string()),
        );
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Catalog {
    pub questions: Vec<CatalogEntry>,
    /// Other top-level keys, written back untouched.
    rest: Map<String, Value>,
    /// Number of `rest` keys that came before `questions` in the file.
    questions_at: usize,
}

impl<'de> Deserialize<'de> for Catalog {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let map = Map::<String, Value>::deserialize(deserializer)?;
        let mut questions = None;
        let mut rest = Map::new();
        let mut questions_at = 0;

        for (key, value) in map {
            if key == "questions" {
                questions_at = rest.len();
                let entries = Vec::<CatalogEntry>::deserialize(value).map_err(<D::Error as de::Error>::custom)?;
                questions = Some(entries);
            } else {
                rest.insert(key, value);
            }
        }

        Ok(Catalog {
            questions: questions.ok_or_else(|| <D::Error as de::Error>::missing_field("questions"))?,
            rest,
            questions_at,
        })
    }
}

impl Serialize for Catalog {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.rest.len() + 1))?;

        for (i, (key, value)) in self.rest.iter().enumerate() {
            if i == self.questions_at {
                map.serialize_entry("questions", &self.questions)?;
            }
            map.serialize_entry(key, value)?;
        }
        if self.questions_at >= self.rest.len() {
            map.serialize_entry("questions", &self.questions)?;
        }

        map.end()
    }
}

impl Catalog {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Catalog::from_json(&text)
    }

    /// Two-space indented JSON with non-ASCII left unescaped.
    pub fn to_json(&self) -> Result<String> {
        let mut json = serde_json::to_string_pretty(self)?;
        json.push('\n');
        Ok(json)
    }

    /// Writes through a sibling temporary file so a failed write leaves the
    /// previous catalog in place.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = self.to_json()?;
        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");

        fs::write(&tmp, json)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Human readable problems: entries missing a required string field.
    pub fn validate(&self) -> Vec<String> {
        let mut problems = vec![];

        for (i, entry) in self.questions.iter().enumerate() {
            for field in REQUIRED_FIELDS.iter() {
                if entry.text(field).is_none() {
                    problems.push(format!("Question {} missing required field '{}'", i, field));
                }
            }
        }

        problems
    }

    pub fn needing_images(&self) -> usize {
        self.questions.iter().filter(|q| q.needs_image()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: &str = r#"{
  "questions": [
    {
      "question": "Vilket byggnadsverk syns här?",
      "answer": "Kinesiska muren",
      "century": "200-talet f.Kr.",
      "imageUrl": "TBD"
    },
    {
      "id": 2,
      "question": "Vilket skepp sjönk 1628?",
      "answer": "Vasaskeppet",
      "imageUrl": "https://upload.wikimedia.org/Vasa.jpg",
      "attribution": "Anna — CC BY 4.0 (via Wikimedia Commons)"
    }
  ],
  "version": 3
}
"#;

    fn entry(json: &str) -> CatalogEntry {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn round_trip_keeps_text() {
        let catalog = Catalog::from_json(CATALOG).unwrap();
        assert_eq!(catalog.to_json().unwrap(), CATALOG);
    }

    #[test]
    fn round_trip_keeps_top_level_key_order() {
        let json = "{\n  \"version\": 3,\n  \"questions\": [],\n  \"locale\": \"sv\"\n}\n";
        let catalog = Catalog::from_json(json).unwrap();
        assert_eq!(catalog.to_json().unwrap(), json);

        let last = "{\n  \"version\": 3,\n  \"questions\": []\n}\n";
        assert_eq!(Catalog::from_json(last).unwrap().to_json().unwrap(), last);
    }

    #[test]
    fn questions_must_be_an_array() {
        assert!(Catalog::from_json(r#"{"questions": {"answer": "A"}}"#).is_err());
        assert!(Catalog::from_json(r#"["questions"]"#).is_err());
    }

    #[test]
    fn non_ascii_is_not_escaped() {
        let catalog = Catalog::from_json(CATALOG).unwrap();
        let json = catalog.to_json().unwrap();
        assert!(json.contains("Vilket byggnadsverk syns här?"));
        assert!(!json.contains("\\u00e4"));
    }

    #[test]
    fn unresolved_images() {
        assert!(entry(r#"{"answer": "A"}"#).needs_image());
        assert!(entry(r#"{"answer": "A", "imageUrl": ""}"#).needs_image());
        assert!(entry(r#"{"answer": "A", "imageUrl": "  "}"#).needs_image());
        assert!(entry(r#"{"answer": "A", "imageUrl": "TBD"}"#).needs_image());
        assert!(entry(r#"{"answer": "A", "imageUrl": "tbd"}"#).needs_image());
        assert!(!entry(r#"{"answer": "A", "imageUrl": "https://x/a.jpg"}"#).needs_image());
    }

    #[test]
    fn set_image_writes_both_fields() {
        let mut e = entry(r#"{"answer": "A", "question": "Q?", "imageUrl": "TBD"}"#);
        e.set_image("https://x/a.jpg", "B — CC0 (via Wikimedia Commons)");

        assert_eq!(e.image_url(), Some("https://x/a.jpg"));
        assert_eq!(e.text("attribution"), Some("B — CC0 (via Wikimedia Commons)"));
        assert!(!e.needs_image());
        assert_eq!(
            serde_json::to_string(&e).unwrap(),
            r#"{"answer":"A","question":"Q?","imageUrl":"https://x/a.jpg","attribution":"B — CC0 (via Wikimedia Commons)"}"#
        );
    }

    #[test]
    fn hints_from_scalar_fields() {
        let e = entry(r#"{"answer": "A", "century": "1600-talet", "year": 1628, "tags": ["x"], "blank": " "}"#);
        assert_eq!(e.hint("century").as_deref(), Some("1600-talet"));
        assert_eq!(e.hint("year").as_deref(), Some("1628"));
        assert_eq!(e.hint("tags"), None);
        assert_eq!(e.hint("blank"), None);
        assert_eq!(e.hint("missing"), None);
    }

    #[test]
    fn validation_reports_missing_fields() {
        let catalog =
            Catalog::from_json(r#"{"questions": [{"answer": "A", "question": "Q"}, {"answer": 4}]}"#).unwrap();
        assert_eq!(
            catalog.validate(),
            vec![
                "Question 1 missing required field 'answer'".to_string(),
                "Question 1 missing required field 'question'".to_string(),
            ]
        );
        assert_eq!(catalog.needing_images(), 2);
    }

    #[test]
    fn rejects_catalog_without_questions() {
        assert!(Catalog::from_json(r#"{"items": []}"#).is_err());
        assert!(Catalog::from_json("{").is_err());
    }

    #[test]
    fn save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("questions.json");

        let mut catalog = Catalog::from_json(CATALOG).unwrap();
        catalog.questions[0].set_image("https://x/wall.jpg", "C — CC0 (via Wikimedia Commons)");
        catalog.save(&path).unwrap();

        let loaded = Catalog::load(&path).unwrap();
        assert_eq!(loaded, catalog);
        assert!(!dir.path().join("questions.json.tmp").exists());
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Catalog::load(&dir.path().join("nope.json")).is_err());
    }
}
