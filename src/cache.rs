// Generation-guarded shape registry and the async loader that feeds it.
// A new source list clears the registry; results from a superseded load are dropped on arrival.

use std::collections::BTreeMap;

use futures::future::LocalBoxFuture;
use futures::stream::FuturesUnordered;
use futures::StreamExt;
use log::{debug, warn};

use crate::error::EngineError;
use crate::shape::parse_shape;
use crate::types::{Shape, ShapeSource};

/// Fetches the raw markup behind a URL.
pub trait ShapeFetcher {
    fn fetch<'a>(&'a self, url: &'a str) -> LocalBoxFuture<'a, Result<String, EngineError>>;
}

/// Identifies the load a result belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadTicket {
    generation: u64,
}

/// The outcome of loading one source.
#[derive(Debug)]
pub struct LoadOutcome {
    pub source: ShapeSource,
    pub result: Result<Shape, EngineError>,
}

/// Shapes available for the current source list.
#[derive(Debug, Default)]
pub struct ShapeCache {
    generation: u64,
    sources: Vec<ShapeSource>,
    shapes: BTreeMap<String, Shape>,
}

impl ShapeCache {
    pub fn new() -> Self {
        ShapeCache::default()
    }

    /// Start over with a new source list. Everything loaded so far is discarded.
    pub fn begin_load(&mut self, sources: Vec<ShapeSource>) -> LoadTicket {
        self.generation += 1;
        self.sources = sources;
        self.shapes.clear();
        debug!(
            "shape load #{} started with {} sources",
            self.generation,
            self.sources.len()
        );
        LoadTicket {
            generation: self.generation,
        }
    }

    /// Invalidate any in-flight load without starting a new one (teardown).
    /// The source list is forgotten too, so configuring the same list again reloads it.
    pub fn cancel(&mut self) {
        self.generation += 1;
        self.sources.clear();
        self.shapes.clear();
    }

    pub fn is_current(&self, ticket: LoadTicket) -> bool {
        ticket.generation == self.generation
    }

    /// Merge one load result. Returns the shape id if it entered the registry.
    /// Stale tickets and failures are logged and otherwise ignored.
    pub fn accept(&mut self, ticket: LoadTicket, outcome: LoadOutcome) -> Option<String> {
        if !self.is_current(ticket) {
            debug!(
                "dropping stale result for '{}' from load #{}",
                outcome.source.id, ticket.generation
            );
            return None;
        }
        match outcome.result {
            Ok(shape) => {
                let id = shape.id.clone();
                debug!("shape '{}' ready with {} dots", id, shape.dots.len());
                self.shapes.insert(id.clone(), shape);
                Some(id)
            }
            Err(err) => {
                warn!("shape '{}' unavailable: {}", outcome.source.id, err);
                None
            }
        }
    }

    /// Parse markup for a source and merge it.
    pub fn accept_markup(
        &mut self,
        ticket: LoadTicket,
        source: ShapeSource,
        markup: Result<String, EngineError>,
    ) -> Option<String> {
        let result = markup.and_then(|text| parse_into(&source, &text));
        self.accept(ticket, LoadOutcome { source, result })
    }

    pub fn get(&self, id: &str) -> Option<&Shape> {
        self.shapes.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.shapes.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    pub fn sources(&self) -> &[ShapeSource] {
        &self.sources
    }

    pub fn shapes(&self) -> impl Iterator<Item = &Shape> {
        self.shapes.values()
    }

    /// Size of the dot pool: the largest dot count among loaded shapes.
    pub fn master_count(&self) -> usize {
        self.shapes.values().map(|s| s.dots.len()).max().unwrap_or(0)
    }
}

fn parse_into(source: &ShapeSource, text: &str) -> Result<Shape, EngineError> {
    parse_shape(&source.id, text).map_err(|e| EngineError::Parse {
        id: source.id.clone(),
        source: e,
    })
}

/// Fetch and parse every source concurrently. Items arrive in completion order.
pub fn load_shapes<'a, F: ShapeFetcher + ?Sized>(
    fetcher: &'a F,
    sources: &'a [ShapeSource],
) -> FuturesUnordered<LocalBoxFuture<'a, LoadOutcome>> {
    sources
        .iter()
        .map(|source| -> LocalBoxFuture<'a, LoadOutcome> {
            Box::pin(async move {
                let result = match fetcher.fetch(&source.url).await {
                    Ok(text) => parse_into(source, &text),
                    Err(err) => Err(err),
                };
                LoadOutcome {
                    source: source.clone(),
                    result,
                }
            })
        })
        .collect()
}

/// Drive a full load into `cache`, merging results as they complete.
pub async fn load_into<F: ShapeFetcher + ?Sized>(
    cache: &mut ShapeCache,
    fetcher: &F,
    sources: Vec<ShapeSource>,
) -> usize {
    let ticket = cache.begin_load(sources.clone());
    let mut pending = load_shapes(fetcher, &sources);
    let mut loaded = 0;
    while let Some(outcome) = pending.next().await {
        if cache.accept(ticket, outcome).is_some() {
            loaded += 1;
        }
    }
    loaded
}
