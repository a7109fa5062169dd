//! Hierarchical quotes returned by a quoting engine.
//!
//! A [`Quote`] is always an *accepted* quote; rejection is carried by
//! [`QuoteOutcome::Rejected`] so that a rejected quote can never be mistaken
//! for a plan. The way a sequence is obtained is the [`QuoteSource`] sum type;
//! consumers match on it instead of comparing supplier names.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AssemblyChemistry {
    Gibson,
    GoldenGate { enzyme: String },
}

impl AssemblyChemistry {
    pub fn is_golden_gate(&self) -> bool {
        matches!(self, AssemblyChemistry::GoldenGate { .. })
    }
}

/// One fragment of an assembly: the span `[start, end)` of the assembled
/// sequence it stands for, and how the fragment itself is obtained.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssemblySegment {
    pub start: usize,
    pub end: usize,
    pub quote: Quote,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum QuoteSource {
    /// Taken for free from a library of already available sequences.
    Library { library: String, part_name: String },
    /// Bought from a commercial supplier (oligos).
    CommercialOffer { supplier: String },
    /// Amplified from a catalog part with two primers.
    Pcr {
        station: String,
        template: String,
        primers: Vec<Quote>,
    },
    /// Assembled from fragments.
    Assembly {
        station: String,
        chemistry: AssemblyChemistry,
        segments: Vec<AssemblySegment>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub id: Option<String>,
    pub sequence: String,
    pub price: f64,
    pub source: QuoteSource,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum QuoteOutcome {
    Accepted(Quote),
    Rejected { supplier: String, reason: String },
}

impl QuoteOutcome {
    pub fn rejected(supplier: &str, reason: impl Into<String>) -> Self {
        QuoteOutcome::Rejected {
            supplier: supplier.to_string(),
            reason: reason.into(),
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, QuoteOutcome::Accepted(_))
    }

    pub fn accepted(self) -> Option<Quote> {
        match self {
            QuoteOutcome::Accepted(quote) => Some(quote),
            QuoteOutcome::Rejected { .. } => None,
        }
    }

    pub fn price(&self) -> Option<f64> {
        match self {
            QuoteOutcome::Accepted(quote) => Some(quote.price),
            QuoteOutcome::Rejected { .. } => None,
        }
    }

    pub fn message(&self) -> String {
        match self {
            QuoteOutcome::Accepted(quote) => format!("accepted at {}", quote.price),
            QuoteOutcome::Rejected { supplier, reason } => format!("{supplier}: {reason}"),
        }
    }
}

impl Quote {
    pub fn new(sequence: &[u8], price: f64, source: QuoteSource) -> Self {
        Self {
            id: None,
            sequence: String::from_utf8_lossy(sequence).to_string(),
            price,
            source,
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: &str, value: impl Into<String>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    pub fn supplier_name(&self) -> &str {
        match &self.source {
            QuoteSource::Library { library, .. } => library,
            QuoteSource::CommercialOffer { supplier } => supplier,
            QuoteSource::Pcr { station, .. } => station,
            QuoteSource::Assembly { station, .. } => station,
        }
    }

    pub fn is_reused(&self) -> bool {
        matches!(self.source, QuoteSource::Library { .. })
    }

    /// Direct sub-quotes, in plan order.
    pub fn children(&self) -> Vec<&Quote> {
        match &self.source {
            QuoteSource::Library { .. } | QuoteSource::CommercialOffer { .. } => vec![],
            QuoteSource::Pcr { primers, .. } => primers.iter().collect(),
            QuoteSource::Assembly { segments, .. } => segments.iter().map(|s| &s.quote).collect(),
        }
    }

    fn children_mut(&mut self) -> Vec<&mut Quote> {
        match &mut self.source {
            QuoteSource::Library { .. } | QuoteSource::CommercialOffer { .. } => vec![],
            QuoteSource::Pcr { primers, .. } => primers.iter_mut().collect(),
            QuoteSource::Assembly { segments, .. } => {
                segments.iter_mut().map(|s| &mut s.quote).collect()
            }
        }
    }

    /// The quote and all its sub-quotes, depth first, parents before children.
    pub fn tree_as_list(&self) -> Vec<&Quote> {
        let mut ret = vec![self];
        for child in self.children() {
            ret.extend(child.tree_as_list());
        }
        ret
    }

    /// Assigns identifiers to the whole tree. The root becomes `id_prefix`,
    /// every newly made sub-quote `"{id_prefix}_{n}"` with `n` counting from 1
    /// in [`Quote::tree_as_list`] order, zero-padded to `id_digits`. Reused
    /// sub-quotes keep the name they have in their library.
    pub fn compute_full_assembly_plan(&mut self, id_prefix: &str, id_digits: usize) {
        self.id = Some(id_prefix.to_string());
        let mut counter = 0usize;
        for child in self.children_mut() {
            child.assign_ids(id_prefix, id_digits, &mut counter);
        }
    }

    fn assign_ids(&mut self, id_prefix: &str, id_digits: usize, counter: &mut usize) {
        match &self.source {
            QuoteSource::Library { part_name, .. } => {
                self.id = Some(part_name.clone());
            }
            _ => {
                *counter += 1;
                self.id = Some(format!("{id_prefix}_{:0width$}", *counter, width = id_digits));
            }
        }
        for child in self.children_mut() {
            child.assign_ids(id_prefix, id_digits, counter);
        }
    }

    /// Identifiers of the direct components: fragments of an assembly or
    /// primers of a PCR. Reused components are reported by their library name.
    pub fn components_ids(&self) -> Vec<String> {
        self.children()
            .into_iter()
            .map(|child| match &child.source {
                QuoteSource::Library { part_name, .. } => part_name.clone(),
                _ => child.id.clone().unwrap_or_default(),
            })
            .collect()
    }
}
