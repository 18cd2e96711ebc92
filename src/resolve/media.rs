use log::{debug, warn};

use super::license::{build_attribution, LicenseGate};
use crate::commons::{strip_html, FileRecord, MediaRepository};
use crate::error::{Error, Result};
use crate::wikidata::Candidate;

/// A licensed image ready to be written to the catalog.
#[derive(Debug, Clone)]
pub struct MediaAsset {
    pub url: String,
    pub page_url: String,
    pub artist: Option<String>,
    pub license: String,
    pub license_url: Option<String>,
    pub credit: Option<String>,
}

impl MediaAsset {
    pub fn attribution(&self, unknown_artist: &str) -> String {
        build_attribution(self.artist.as_deref(), &self.license, unknown_artist)
    }
}

/// Commons file name of the entity's representative image.
pub fn image_filename<'a>(candidate: &'a Candidate, image_property: &str) -> Option<&'a str> {
    candidate.first_text(image_property).map(str::trim)
}

fn cleaned(record: &FileRecord, key: &str) -> Option<String> {
    record
        .meta(key)
        .map(strip_html)
        .filter(|value| !value.is_empty())
}

fn license_name(record: &FileRecord) -> Option<String> {
    record
        .meta("LicenseShortName")
        .or_else(|| record.meta("License"))
        .map(strip_html)
        .filter(|value| !value.is_empty())
}

/// Turns a file record into an asset, refusing licenses the gate rejects.
pub fn to_asset(record: &FileRecord, gate: &dyn LicenseGate) -> Result<MediaAsset> {
    let license = license_name(record).unwrap_or_default();

    if !gate.is_acceptable(&license) {
        return Err(Error::LicenseRejected(format!(
            "{} is licensed {:?}",
            record.title, license
        )));
    }

    Ok(MediaAsset {
        url: record.display_url().to_string(),
        page_url: record.page_url(),
        artist: cleaned(record, "Artist"),
        license,
        license_url: record.meta("LicenseUrl").map(str::to_string),
        credit: cleaned(record, "Credit"),
    })
}

pub fn fetch_asset(
    media: &dyn MediaRepository,
    filename: &str,
    gate: &dyn LicenseGate,
) -> Result<MediaAsset> {
    let record = media
        .image_info(filename)?
        .ok_or_else(|| Error::NotFound(format!("file {}", filename)))?;

    to_asset(&record, gate)
}

fn search_score(record: &FileRecord) -> i64 {
    let url = record.url.to_lowercase();
    let mut score = 0;

    if record.meta("LicenseShortName").is_some() {
        score += 2;
    }
    if url.ends_with(".jpg") || url.ends_with(".jpeg") || url.ends_with(".png") {
        score += 2;
    }
    if record.title.to_lowercase().contains("logo") {
        score -= 3;
    }

    score
}

/// Best licensed file from a free-text search of the media repository.
pub fn search_asset(
    media: &dyn MediaRepository,
    term: &str,
    limit: usize,
    gate: &dyn LicenseGate,
) -> Result<MediaAsset> {
    let records = media.search_files(term, limit)?;

    if records.is_empty() {
        return Err(Error::NoCandidate(term.to_string()));
    }

    let mut best: Option<(i64, MediaAsset)> = None;

    for record in &records {
        let asset = match to_asset(record, gate) {
            Ok(asset) => asset,
            Err(err) => {
                debug!("Skipping {}: {}", record.title, err);
                continue;
            }
        };

        let score = search_score(record);
        if best.as_ref().map_or(true, |(top, _)| score > *top) {
            best = Some((score, asset));
        }
    }

    match best {
        Some((_, asset)) => Ok(asset),
        None => {
            warn!("None of {} files for {:?} has an acceptable license", records.len(), term);
            Err(Error::LicenseRejected(format!("all results for {:?}", term)))
        }
    }
}
