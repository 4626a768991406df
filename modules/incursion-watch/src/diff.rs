//! Poll-to-poll change detection for incursions.
//!
//! Identity is the staging system id. An incursion whose staging system
//! moves shows up as one dead plus one new record, never as a move.

use esi_client::EsiIncursion;
use tracing::{debug, info};

use crate::render::{Renderer, Template};
use crate::snapshot::Snapshot;

/// Records classified by one comparison, each in snapshot order.
#[derive(Debug, Default, Clone)]
pub struct Reconciliation {
    pub changed: Vec<EsiIncursion>,
    pub new: Vec<EsiIncursion>,
    pub dead: Vec<EsiIncursion>,
}

impl Reconciliation {
    pub fn is_empty(&self) -> bool {
        self.changed.is_empty() && self.new.is_empty() && self.dead.is_empty()
    }
}

pub fn classify(previous: &[EsiIncursion], current: &[EsiIncursion]) -> Reconciliation {
    let mut result = Reconciliation::default();

    for incursion in current {
        match find(previous, incursion.staging_solar_system_id) {
            None => result.new.push(incursion.clone()),
            Some(existing) if existing.state != incursion.state => {
                result.changed.push(incursion.clone())
            }
            Some(_) => {}
        }
    }

    for existing in previous {
        if find(current, existing.staging_solar_system_id).is_none() {
            result.dead.push(existing.clone());
        }
    }

    result
}

fn find(incursions: &[EsiIncursion], staging_system_id: i64) -> Option<&EsiIncursion> {
    incursions
        .iter()
        .find(|i| i.staging_solar_system_id == staging_system_id)
}

/// Holds the last compared snapshot and turns each refresh into one message.
pub struct DiffEngine {
    previous: Vec<EsiIncursion>,
    renderer: Renderer,
}

impl DiffEngine {
    pub fn new(renderer: Renderer) -> Self {
        Self {
            previous: Vec::new(),
            renderer,
        }
    }

    pub fn previous(&self) -> &[EsiIncursion] {
        &self.previous
    }

    /// Replace `previous` wholesale, e.g. with the list restored at startup.
    pub fn seed(&mut self, incursions: Vec<EsiIncursion>) {
        self.previous = incursions;
    }

    /// Compare a snapshot against `previous` and render the notification.
    ///
    /// Cached snapshots are ignored entirely. The first refreshed snapshot
    /// after a cold start only primes `previous`. Otherwise lines are emitted
    /// changed, then new, then dead, and `previous` always advances.
    pub fn reconcile(&mut self, snapshot: &Snapshot) -> Option<String> {
        if !snapshot.refreshed {
            return None;
        }

        if self.previous.is_empty() {
            debug!(count = snapshot.incursions.len(), "Priming previous incursions");
            self.previous = snapshot.incursions.clone();
            return None;
        }

        let reconciliation = classify(&self.previous, &snapshot.incursions);
        self.previous = snapshot.incursions.clone();

        if reconciliation.is_empty() {
            info!("All remains quiet");
            return None;
        }

        info!(
            changed = reconciliation.changed.len(),
            new = reconciliation.new.len(),
            dead = reconciliation.dead.len(),
            "Incursion changes detected"
        );

        let message = self.render(&reconciliation);
        if message.is_empty() {
            debug!("All changes filtered by security threshold");
            return None;
        }
        Some(message)
    }

    pub fn render(&self, reconciliation: &Reconciliation) -> String {
        let mut out = String::new();
        let groups = [
            (Template::Changed, &reconciliation.changed),
            (Template::New, &reconciliation.new),
            (Template::Dead, &reconciliation.dead),
        ];
        for (template, incursions) in groups {
            for incursion in incursions {
                self.renderer.line(template, incursion, &mut out);
            }
        }
        out
    }
}
