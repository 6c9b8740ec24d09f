//! Resource limits for a single build.
//!
//! A builder fed from an untrusted stream can be asked to nest arbitrarily deep, define
//! millions of markers or accumulate huge array payloads. The [`BudgetEnforcer`] counts these
//! as events arrive and stops the build at the first breach.

use serde::{Deserialize, Serialize};

/// Limits for one build.
///
/// Example: tighten the depth limit for a build.
///
/// ```rust
/// use concise_builder::{build_from_events_with_options, Event, TypeDescriptor};
///
/// let options = concise_builder::options! {
///     budget: Some(concise_builder::budget! { max_depth: 2 }),
/// };
/// let events = [Event::List, Event::List, Event::List, Event::End, Event::End, Event::End];
/// let err = build_from_events_with_options(&TypeDescriptor::any(), &events, options);
/// assert!(err.is_err());
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Budget {
    /// Maximum total events (counting every event).
    ///
    /// Default: 10,000,000
    pub max_events: usize,
    /// Maximum container nesting depth.
    ///
    /// Default: 1,000
    pub max_depth: usize,
    /// Maximum number of markers defined.
    ///
    /// Default: 100,000
    pub max_markers: usize,
    /// Maximum number of reference events.
    ///
    /// Default: 1,000,000
    pub max_references: usize,
    /// Maximum byte size of a single array payload (chunked arrays count their total).
    ///
    /// Default: 67,108,864 (64 MiB)
    pub max_array_bytes: usize,
    /// Maximum byte size of all array payloads in the document.
    ///
    /// Default: 268,435,456 (256 MiB)
    pub max_total_array_bytes: usize,
}

impl Default for Budget {
    fn default() -> Self {
        Self {
            max_events: 10_000_000,
            max_depth: 1_000,
            max_markers: 100_000,
            max_references: 1_000_000,
            max_array_bytes: 64 * 1024 * 1024,
            max_total_array_bytes: 256 * 1024 * 1024,
        }
    }
}

/// What tripped the budget.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BudgetBreach {
    /// The total number of events exceeded [`Budget::max_events`].
    Events { events: usize },
    /// Container nesting exceeded [`Budget::max_depth`].
    Depth { depth: usize },
    /// The number of markers exceeded [`Budget::max_markers`].
    Markers { markers: usize },
    /// The number of references exceeded [`Budget::max_references`].
    References { references: usize },
    /// One array payload exceeded [`Budget::max_array_bytes`].
    ArrayBytes { bytes: usize },
    /// All array payloads together exceeded [`Budget::max_total_array_bytes`].
    TotalArrayBytes { total_array_bytes: usize },
}

/// Counters collected during a build (even if no breach).
#[derive(Clone, Debug, Default)]
pub struct BudgetReport {
    /// `Some(..)` if a limit was exceeded.
    pub breached: Option<BudgetBreach>,
    pub events: usize,
    /// Deepest container nesting reached.
    pub max_depth: usize,
    pub markers: usize,
    pub references: usize,
    /// Sum of all array payload sizes, saturating on overflow.
    pub total_array_bytes: usize,
}

/// Stateful helper that enforces a [`Budget`] while a build consumes events.
#[derive(Debug)]
pub struct BudgetEnforcer {
    budget: Budget,
    report: BudgetReport,
}

impl BudgetEnforcer {
    pub fn new(budget: Budget) -> Self {
        Self {
            budget,
            report: BudgetReport::default(),
        }
    }

    fn breach(&mut self, breach: BudgetBreach) -> Result<(), BudgetBreach> {
        self.report.breached = Some(breach.clone());
        Err(breach)
    }

    /// Count one event of any kind.
    pub fn observe_event(&mut self) -> Result<(), BudgetBreach> {
        self.report.events += 1;
        if self.report.events > self.budget.max_events {
            let events = self.report.events;
            return self.breach(BudgetBreach::Events { events });
        }
        Ok(())
    }

    /// Record the nesting depth after a container was opened.
    pub fn observe_depth(&mut self, depth: usize) -> Result<(), BudgetBreach> {
        if depth > self.report.max_depth {
            self.report.max_depth = depth;
        }
        if depth > self.budget.max_depth {
            return self.breach(BudgetBreach::Depth { depth });
        }
        Ok(())
    }

    pub fn observe_marker(&mut self) -> Result<(), BudgetBreach> {
        self.report.markers += 1;
        if self.report.markers > self.budget.max_markers {
            let markers = self.report.markers;
            return self.breach(BudgetBreach::Markers { markers });
        }
        Ok(())
    }

    pub fn observe_reference(&mut self) -> Result<(), BudgetBreach> {
        self.report.references += 1;
        if self.report.references > self.budget.max_references {
            let references = self.report.references;
            return self.breach(BudgetBreach::References { references });
        }
        Ok(())
    }

    /// Account for an array payload. `array_bytes` is the running size of the array the bytes
    /// belong to, `added` the bytes that just arrived.
    pub fn observe_array_bytes(&mut self, array_bytes: usize, added: usize) -> Result<(), BudgetBreach> {
        if array_bytes > self.budget.max_array_bytes {
            return self.breach(BudgetBreach::ArrayBytes { bytes: array_bytes });
        }
        self.report.total_array_bytes = self.report.total_array_bytes.saturating_add(added);
        if self.report.total_array_bytes > self.budget.max_total_array_bytes {
            let total_array_bytes = self.report.total_array_bytes;
            return self.breach(BudgetBreach::TotalArrayBytes { total_array_bytes });
        }
        Ok(())
    }

    pub fn report(&self) -> &BudgetReport {
        &self.report
    }

    pub fn into_report(self) -> BudgetReport {
        self.report
    }
}
