use clap::{Parser, ValueEnum};
use log::{error, info, warn};
use std::path::PathBuf;
use std::process;
use std::time::Duration;

extern crate log;
extern crate pretty_env_logger;

mod catalog;
mod commons;
mod error;
mod http;
mod resolve;
mod wikidata;

use catalog::Catalog;
use commons::CommonsClient;
use error::Result;
use http::{Api, HttpSettings, DEFAULT_USER_AGENT};
use resolve::disambiguate::{OverrideTable, Resolver};
use resolve::license::{AllowList, UNKNOWN_ARTIST};
use resolve::score::{ScoringRules, Scorer};
use resolve::{Pipeline, RunOptions, Source, Strategy};
use wikidata::WikidataClient;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum StrategyArg {
    Answer,
    Question,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SourceArg {
    Wikidata,
    CommonsSearch,
}

/// Fills in imageUrl and attribution for quiz entries from Wikidata and
/// Wikimedia Commons.
#[derive(Debug, Parser)]
#[command(version)]
struct Args {
    /// Catalog to read
    #[arg(long = "in", value_name = "PATH", default_value = "assets/data/questions.json")]
    input: PathBuf,

    /// Where to write the result (defaults to rewriting the input)
    #[arg(long = "out", value_name = "PATH")]
    output: Option<PathBuf>,

    /// Entry field used as the search subject
    #[arg(long, value_enum, default_value = "answer")]
    strategy: StrategyArg,

    /// Entry field appended to the search term, e.g. 'century'
    #[arg(long, value_name = "NAME")]
    field: Option<String>,

    /// Only consider the first N entries (at least 1)
    #[arg(long, value_name = "N", value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    limit: Option<usize>,

    /// Re-resolve entries that already have an image
    #[arg(long)]
    force: bool,

    #[arg(long, value_enum, default_value = "wikidata")]
    source: SourceArg,

    /// JSON object mapping exact subjects to Wikidata ids
    #[arg(long, value_name = "PATH")]
    overrides: Option<PathBuf>,

    /// JSON scoring rules replacing the built-in ones
    #[arg(long, value_name = "PATH")]
    rules: Option<PathBuf>,

    /// Pause before every request, in milliseconds
    #[arg(long, default_value_t = 300)]
    delay_ms: u64,

    /// Pause between entries, in milliseconds
    #[arg(long, default_value_t = 300)]
    entry_delay_ms: u64,

    #[arg(long, default_value_t = 30)]
    timeout_secs: u64,

    #[arg(long, env = "HERITAGE_USER_AGENT", default_value = DEFAULT_USER_AGENT)]
    user_agent: String,

    /// Artist shown when Commons has none, e.g. 'Okänd'
    #[arg(long, default_value = UNKNOWN_ARTIST)]
    unknown_artist: String,

    /// Validate the catalog and exit
    #[arg(long)]
    check: bool,
}

fn check(catalog: &Catalog) -> bool {
    let problems = catalog.validate();
    for problem in &problems {
        error!("{}", problem);
    }

    println!(
        "{} questions, {} problems, {} without image",
        catalog.questions.len(),
        problems.len(),
        catalog.needing_images()
    );

    problems.is_empty()
}

fn resolver(args: &Args) -> Result<Resolver> {
    let mut overrides = OverrideTable::default();
    if let Some(path) = &args.overrides {
        overrides.merge(OverrideTable::from_file(path)?);
    }
    info!("{} subject overrides", overrides.len());

    let rules = match &args.rules {
        Some(path) => ScoringRules::from_file(path)?,
        None => ScoringRules::default(),
    };

    Ok(Resolver {
        overrides,
        scorer: Scorer::new(rules),
        ..Resolver::default()
    })
}

fn run(args: Args) -> Result<bool> {
    // Configuration and catalog problems abort before any entry is touched.
    let mut catalog = Catalog::load(&args.input)?;

    if args.check {
        return Ok(check(&catalog));
    }

    let resolver = resolver(&args)?;

    let api = Api::new(HttpSettings {
        user_agent: args.user_agent.clone(),
        timeout: Duration::from_secs(args.timeout_secs),
        delay: Duration::from_millis(args.delay_ms),
        ..HttpSettings::default()
    })?;
    let kb = WikidataClient::new(&api, &resolver.languages);
    let media = CommonsClient::new(&api, "en");
    let gate = AllowList::default();

    let options = RunOptions {
        strategy: match args.strategy {
            StrategyArg::Answer => Strategy::Answer,
            StrategyArg::Question => Strategy::Question,
        },
        hint_field: args.field.clone(),
        limit: args.limit,
        force: args.force,
        source: match args.source {
            SourceArg::Wikidata => Source::Wikidata,
            SourceArg::CommonsSearch => Source::CommonsSearch,
        },
        entry_delay: Duration::from_millis(args.entry_delay_ms),
        unknown_artist: args.unknown_artist.clone(),
    };

    let pipeline = Pipeline {
        kb: &kb,
        media: &media,
        gate: &gate,
        resolver,
        options,
    };

    let summary = pipeline.run(&mut catalog)?;

    let output = args.output.as_ref().unwrap_or(&args.input);
    catalog.save(output)?;

    if summary.failed > 0 {
        warn!("{} entries left unresolved", summary.failed);
    }
    info!("{:?}", summary);
    println!(
        "Updated {} of {} questions. Output: {}",
        summary.updated,
        summary.total,
        output.display()
    );

    Ok(true)
}

fn main() {
    pretty_env_logger::init();

    let args = Args::parse();

    match run(args) {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(err) => {
            error!("{}", err);
            eprintln!("{}", err);
            process::exit(1);
        }
    }
}
