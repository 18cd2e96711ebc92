use log::debug;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::OnceLock;

use crate::error::Result;
use crate::http::Api;

const COMMONS_API: &str = "https://commons.wikimedia.org/w/api.php";

/// Width cap for the thumbnail URL requested from Commons.
pub const THUMB_WIDTH: u32 = 1280;

/// File metadata lookups against a media repository.
pub trait MediaRepository {
    /// Metadata for one file, `None` when the repository has no such file.
    fn image_info(&self, filename: &str) -> Result<Option<FileRecord>>;

    /// Files matching a free-text term, in relevance order.
    fn search_files(&self, term: &str, limit: usize) -> Result<Vec<FileRecord>>;
}

#[derive(Debug, Clone, Default)]
pub struct FileRecord {
    pub title: String,
    pub url: String,
    pub thumb_url: Option<String>,
    pub description_url: Option<String>,
    /// `extmetadata` values keyed by field name (Artist, LicenseShortName...).
    pub metadata: HashMap<String, String>,
}

impl FileRecord {
    /// Width-capped thumbnail when available, otherwise the original.
    pub fn display_url(&self) -> &str {
        match &self.thumb_url {
            Some(thumb) if !thumb.is_empty() => thumb,
            _ => &self.url,
        }
    }

    /// Trimmed metadata value, `None` when absent or blank.
    pub fn meta(&self, key: &str) -> Option<&str> {
        let value = self.metadata.get(key)?.trim();
        if value.is_empty() {
            None
        } else {
            Some(value)
        }
    }

    pub fn page_url(&self) -> String {
        match &self.description_url {
            Some(url) => url.clone(),
            None => format!(
                "https://commons.wikimedia.org/wiki/{}",
                urlencoding::encode(&self.title.replace(' ', "_"))
            ),
        }
    }
}

/// Removes markup from Commons free-text metadata.
pub fn strip_html(s: &str) -> String {
    static TAG: OnceLock<Regex> = OnceLock::new();
    static SPACE: OnceLock<Regex> = OnceLock::new();

    let tag = TAG.get_or_init(|| Regex::new(r"<[^>]*>").unwrap());
    let space = SPACE.get_or_init(|| Regex::new(r"\s+").unwrap());

    let text = tag.replace_all(s, "");
    let text = text
        .replace("&nbsp;", " ")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&");

    space.replace_all(text.trim(), " ").to_string()
}

/// `File:` prefixed page title for a bare file name.
pub fn file_title(filename: &str) -> String {
    let filename = filename.trim();
    if filename.starts_with("File:") {
        filename.to_string()
    } else {
        format!("File:{}", filename)
    }
}

#[derive(Deserialize)]
struct MetadataField {
    value: Value,
}

#[derive(Deserialize)]
struct ImageInfo {
    url: Option<String>,
    thumburl: Option<String>,
    descriptionurl: Option<String>,
    #[serde(default)]
    extmetadata: HashMap<String, MetadataField>,
}

#[derive(Deserialize)]
struct Page {
    title: String,
    #[serde(default)]
    missing: bool,
    index: Option<usize>,
    #[serde(default)]
    imageinfo: Vec<ImageInfo>,
}

#[derive(Deserialize, Default)]
struct Query {
    #[serde(default)]
    pages: Vec<Page>,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    query: Query,
}

fn into_record(page: Page) -> Option<FileRecord> {
    if page.missing {
        return None;
    }

    let info = page.imageinfo.into_iter().next()?;
    let url = info.url?;

    let metadata = info
        .extmetadata
        .into_iter()
        .map(|(key, field)| {
            let value = match field.value {
                Value::String(s) => s,
                Value::Null => String::new(),
                other => other.to_string(),
            };
            (key, value)
        })
        .collect();

    Some(FileRecord {
        title: page.title,
        url,
        thumb_url: info.thumburl,
        description_url: info.descriptionurl,
        metadata,
    })
}

fn first_record(res: QueryResponse) -> Option<FileRecord> {
    res.query.pages.into_iter().find_map(into_record)
}

/// Generator results come back unordered; `index` carries the search rank.
fn ranked_records(res: QueryResponse) -> Vec<FileRecord> {
    let mut pages = res.query.pages;
    pages.sort_by_key(|page| page.index.unwrap_or(usize::MAX));
    pages.into_iter().filter_map(into_record).collect()
}

pub struct CommonsClient<'a> {
    api: &'a Api,
    language: String,
}

impl<'a> CommonsClient<'a> {
    pub fn new(api: &'a Api, language: &str) -> Self {
        CommonsClient {
            api,
            language: language.to_string(),
        }
    }
}

impl MediaRepository for CommonsClient<'_> {
    fn image_info(&self, filename: &str) -> Result<Option<FileRecord>> {
        let title = file_title(filename);
        let width = THUMB_WIDTH.to_string();
        let res: QueryResponse = self.api.get_json(
            "commons",
            COMMONS_API,
            &[
                ("action", "query"),
                ("format", "json"),
                ("formatversion", "2"),
                ("prop", "imageinfo"),
                ("titles", title.as_str()),
                ("iiprop", "url|extmetadata"),
                ("iiurlwidth", width.as_str()),
                ("uselang", self.language.as_str()),
            ],
        )?;

        let record = first_record(res);
        debug!("Image info for {}: {:?}", title, record.as_ref().map(|r| &r.url));
        Ok(record)
    }

    fn search_files(&self, term: &str, limit: usize) -> Result<Vec<FileRecord>> {
        let limit = limit.to_string();
        let width = THUMB_WIDTH.to_string();
        let res: QueryResponse = self.api.get_json(
            "commons",
            COMMONS_API,
            &[
                ("action", "query"),
                ("format", "json"),
                ("formatversion", "2"),
                ("generator", "search"),
                ("gsrsearch", term),
                ("gsrnamespace", "6"),
                ("gsrlimit", limit.as_str()),
                ("prop", "imageinfo"),
                ("iiprop", "url|extmetadata"),
                ("iiurlwidth", width.as_str()),
                ("uselang", self.language.as_str()),
            ],
        )?;

        Ok(ranked_records(res))
    }
}
