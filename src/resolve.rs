use log::{debug, info, warn};
use std::{thread, time::Duration};

use crate::catalog::{Catalog, CatalogEntry};
use crate::commons::MediaRepository;
use crate::error::{Error, Result};
use crate::wikidata::KnowledgeBase;

use self::disambiguate::Resolver;
use self::license::{LicenseGate, UNKNOWN_ARTIST};
use self::media::{fetch_asset, image_filename, search_asset, MediaAsset};

pub mod disambiguate;
pub mod license;
pub mod media;
pub mod score;

/// Files requested from a direct media-repository search.
pub const MEDIA_SEARCH_LIMIT: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Strategy {
    Answer,
    Question,
}

impl Strategy {
    fn field(self) -> &'static str {
        match self {
            Strategy::Answer => "answer",
            Strategy::Question => "question",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Source {
    /// Knowledge-base entity, then its representative image.
    Wikidata,
    /// Free-text search of the media repository.
    CommonsSearch,
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub strategy: Strategy,
    /// Entry field appended to the search term.
    pub hint_field: Option<String>,
    /// Only the first `limit` entries are considered.
    pub limit: Option<usize>,
    /// Re-resolve entries that already carry an image.
    pub force: bool,
    pub source: Source,
    /// Pause after each attempted entry that has a subject. Skipped and
    /// subject-less entries make no remote calls and are not paused on.
    pub entry_delay: Duration,
    pub unknown_artist: String,
}

impl Default for RunOptions {
    fn default() -> Self {
        RunOptions {
            strategy: Strategy::Answer,
            hint_field: None,
            limit: None,
            force: false,
            source: Source::Wikidata,
            entry_delay: Duration::from_millis(300),
            unknown_artist: UNKNOWN_ARTIST.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub total: usize,
    pub considered: usize,
    pub updated: usize,
    pub already_resolved: usize,
    pub failed: usize,
}

pub struct Pipeline<'a> {
    pub kb: &'a dyn KnowledgeBase,
    pub media: &'a dyn MediaRepository,
    pub gate: &'a dyn LicenseGate,
    pub resolver: Resolver,
    pub options: RunOptions,
}

impl Pipeline<'_> {
    fn subject<'e>(&self, entry: &'e CatalogEntry) -> Option<&'e str> {
        entry
            .text(self.options.strategy.field())
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    fn search_term(&self, entry: &CatalogEntry, subject: &str) -> String {
        let hint = self
            .options
            .hint_field
            .as_deref()
            .and_then(|field| entry.hint(field));

        match hint {
            Some(hint) => format!("{} {}", subject, hint),
            None => subject.to_string(),
        }
    }

    fn wikidata_asset(&self, subject: &str, term: &str) -> Result<MediaAsset> {
        let found = self
            .resolver
            .resolve(self.kb, subject, term)?
            .ok_or_else(|| Error::NoCandidate(subject.to_string()))?;

        debug!("{:?} matched {} via {:?}", subject, found.id, found.kind);

        let candidate = match found.candidate {
            Some(candidate) => candidate,
            None => self.kb.fetch_entity(&found.id)?,
        };

        let image_property = &self.resolver.scorer.rules.image_property;
        let filename = image_filename(&candidate, image_property)
            .ok_or_else(|| Error::NoImageClaim(candidate.id.clone()))?;

        debug!("{} {:?} image {}", candidate.id, subject, filename);
        fetch_asset(self.media, filename, self.gate)
    }

    /// Image URL and credit line for one entry. Errors are entry-local.
    pub fn resolve_entry(&self, entry: &CatalogEntry) -> Result<(String, String)> {
        let subject = self
            .subject(entry)
            .ok_or_else(|| Error::NoCandidate("entry without subject".to_string()))?;
        let term = self.search_term(entry, subject);

        let asset = match self.options.source {
            Source::Wikidata => self.wikidata_asset(subject, &term)?,
            Source::CommonsSearch => {
                search_asset(self.media, &term, MEDIA_SEARCH_LIMIT, self.gate)?
            }
        };

        let attribution = asset.attribution(&self.options.unknown_artist);
        if asset.url.is_empty() || attribution.is_empty() {
            return Err(Error::NotFound(format!("usable image for {:?}", subject)));
        }

        info!("{:?} -> {} ({})", subject, asset.url, asset.page_url);
        debug!(
            "license {} {:?}, credit {:?}",
            asset.license, asset.license_url, asset.credit
        );
        Ok((asset.url, attribution))
    }

    /// Resolves every entry in turn, mutating the catalog in place. Only
    /// run-fatal errors are returned; the catalog is left as far as it got.
    pub fn run(&self, catalog: &mut Catalog) -> Result<RunSummary> {
        let total = catalog.questions.len();
        let considered = self.options.limit.map_or(total, |limit| limit.min(total));
        let mut summary = RunSummary {
            total,
            considered,
            ..RunSummary::default()
        };

        for (i, entry) in catalog.questions.iter_mut().take(considered).enumerate() {
            if !self.options.force && !entry.needs_image() {
                summary.already_resolved += 1;
                continue;
            }

            let remote = self.subject(entry).is_some();

            match self.resolve_entry(entry) {
                Ok((url, attribution)) => {
                    entry.set_image(&url, &attribution);
                    summary.updated += 1;
                }
                Err(err) if err.is_entry_local() => {
                    warn!("[{}/{}] {:?}: {}", i + 1, considered, entry.answer(), err);
                    summary.failed += 1;
                }
                Err(err) => return Err(err),
            }

            info!(
                "[{}/{}] updated={} failed={}",
                i + 1,
                considered,
                summary.updated,
                summary.failed
            );

            if remote && !self.options.entry_delay.is_zero() {
                thread::sleep(self.options.entry_delay);
            }
        }

        Ok(summary)
    }
}
