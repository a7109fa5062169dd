//! Quoting engines: price a sequence against a supply network.

use crate::{
    dna_sequence::DNAsequence,
    error::{ErrorCode, QuoteError},
    quote::{Quote, QuoteOutcome, QuoteSource},
    topology::{CommercialOffer, LibrarySupplier, SelectionPolicy, SupplierComparator, SupplyNode},
};
use tracing::trace;

/// Prices one sequence against a supply network.
///
/// `Ok(QuoteOutcome::Rejected)` is an ordinary answer ("cannot be made
/// here"); `Err` is a fault of the engine itself. Engines are shared between
/// threads when independent batches are planned in parallel.
pub trait QuoteEngine: Sync {
    fn get_quote(
        &self,
        network: &SupplyNode<'_>,
        sequence: &DNAsequence,
    ) -> Result<QuoteOutcome, QuoteError>;
}

/// Deterministic engine interpreting every kind of [`SupplyNode`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ReferenceEngine;

impl ReferenceEngine {
    pub fn new() -> Self {
        Self
    }
}

impl QuoteEngine for ReferenceEngine {
    fn get_quote(
        &self,
        network: &SupplyNode<'_>,
        sequence: &DNAsequence,
    ) -> Result<QuoteOutcome, QuoteError> {
        if sequence.is_empty() {
            return Err(QuoteError::new(
                ErrorCode::InvalidInput,
                format!("{}: cannot quote an empty sequence", network.name()),
            ));
        }
        let outcome = match network {
            SupplyNode::Library(library) => quote_library(library, sequence),
            SupplyNode::CommercialOffer(offer) => quote_commercial_offer(offer, sequence),
            SupplyNode::Comparator(comparator) => quote_comparator(self, comparator, sequence)?,
            SupplyNode::PcrExtraction(station) => station.get_quote(self, sequence)?,
            SupplyNode::Assembly(station) => station.get_quote(self, sequence)?,
        };
        trace!(
            supplier = network.name(),
            length = sequence.len(),
            price = outcome.price(),
            "quote"
        );
        Ok(outcome)
    }
}

fn quote_library(library: &LibrarySupplier<'_>, sequence: &DNAsequence) -> QuoteOutcome {
    let sequence_string = sequence.get_forward_string();
    match library.find(&sequence_string) {
        Some(part_name) => QuoteOutcome::Accepted(Quote::new(
            sequence.forward(),
            0.0,
            QuoteSource::Library {
                library: library.name.clone(),
                part_name: part_name.to_string(),
            },
        )),
        None => QuoteOutcome::rejected(&library.name, "sequence not in library"),
    }
}

fn quote_commercial_offer(offer: &CommercialOffer, sequence: &DNAsequence) -> QuoteOutcome {
    if sequence.len() > offer.max_length {
        return QuoteOutcome::rejected(
            &offer.name,
            format!(
                "sequence is {} bp, longer than the {} bp limit",
                sequence.len(),
                offer.max_length
            ),
        );
    }
    if DNAsequence::validate_dna_sequence(sequence.forward()).is_err() {
        return QuoteOutcome::rejected(&offer.name, "sequence has non-ACGT letters");
    }
    QuoteOutcome::Accepted(Quote::new(
        sequence.forward(),
        offer.price,
        QuoteSource::CommercialOffer {
            supplier: offer.name.clone(),
        },
    ))
}

pub(crate) fn quote_comparator<E: QuoteEngine + ?Sized>(
    engine: &E,
    comparator: &SupplierComparator<'_>,
    sequence: &DNAsequence,
) -> Result<QuoteOutcome, QuoteError> {
    let mut best: Option<Quote> = None;
    let mut reasons = vec![];
    for supplier in &comparator.suppliers {
        match engine.get_quote(supplier, sequence)? {
            QuoteOutcome::Accepted(quote) => match comparator.policy {
                SelectionPolicy::FirstAccepted => return Ok(QuoteOutcome::Accepted(quote)),
                SelectionPolicy::Cheapest => {
                    if best.as_ref().is_none_or(|b| quote.price < b.price) {
                        best = Some(quote);
                    }
                }
            },
            rejected => reasons.push(rejected.message()),
        }
    }
    Ok(match best {
        Some(quote) => QuoteOutcome::Accepted(quote),
        None => QuoteOutcome::rejected(
            &comparator.name,
            format!("no supplier accepted ({})", reasons.join("; ")),
        ),
    })
}
