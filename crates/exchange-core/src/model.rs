//! Lookup-table data model published by the cache.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A publisher, owned by the [`App`] that references it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Publisher {
    pub id: i64,
    pub name: String,
}

/// An app eligible to receive bids, as published in a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct App {
    pub id: i64,
    pub name: String,
    pub publisher: Publisher,
}

/// A downstream bidder queried for every ad request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dsp {
    pub id: i64,
    pub name: String,
    pub endpoint: String,
    /// Duration string (e.g. `"200ms"`) appended as `?latency=<value>` to simulate
    /// bidder slowness. Empty/absent means no directive.
    #[serde(default)]
    pub latency: String,
}

impl Dsp {
    pub fn has_latency_directive(&self) -> bool {
        !self.latency.is_empty()
    }
}

/// Immutable mapping from app id to [`App`], built in one pass from a JSON
/// array source and never mutated after publication.
#[derive(Debug, Clone, Default)]
pub struct AppsSnapshot {
    by_id: HashMap<i64, App>,
}

impl AppsSnapshot {
    pub fn from_apps(apps: Vec<App>) -> Self {
        let by_id = apps.into_iter().map(|app| (app.id, app)).collect();
        Self { by_id }
    }

    pub fn get(&self, id: i64) -> Option<&App> {
        self.by_id.get(&id)
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

/// Ordered, fan-out-order list of DSPs. Stable within a snapshot.
#[derive(Debug, Clone, Default)]
pub struct DspRoster {
    dsps: Vec<Dsp>,
}

impl DspRoster {
    pub fn from_dsps(dsps: Vec<Dsp>) -> Self {
        Self { dsps }
    }

    pub fn len(&self) -> usize {
        self.dsps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dsps.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Dsp> {
        self.dsps.iter()
    }
}
