//! Batch orchestration: plans constructs one after the other, so that every
//! construct can reuse the primers and fragments made for the ones before it.

use crate::{
    dna_sequence::DNAsequence,
    engine::QuoteEngine,
    error::{PlannerError, QuoteError},
    quote::{Quote, QuoteOutcome, QuoteSource},
    topology::{AssemblyMethod, PartCatalog, SupplyNode, SupplyParameters, build_supply_network},
};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Rotation attempts per construct never exceed this, whatever the
/// configured `max_rotations`.
pub const MAX_ROTATIONS: usize = 5;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstructTopology {
    #[default]
    Circular,
    Linear,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Construct {
    pub name: String,
    pub sequence: String,
    #[serde(default)]
    pub topology: ConstructTopology,
}

impl Construct {
    pub fn new(name: &str, sequence: &str) -> Self {
        Self {
            name: name.to_string(),
            sequence: sequence.to_string(),
            topology: ConstructTopology::Circular,
        }
    }
}

/// Primers and fragments made for earlier constructs of the batch. Both
/// collections only ever grow.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReusePools {
    ordered_primers: BTreeMap<String, String>,
    amplified_fragments: BTreeMap<String, String>,
}

impl ReusePools {
    pub fn ordered_primers(&self) -> &BTreeMap<String, String> {
        &self.ordered_primers
    }

    pub fn amplified_fragments(&self) -> &BTreeMap<String, String> {
        &self.amplified_fragments
    }

    pub fn add_primer(&mut self, id: &str, sequence: &str) {
        self.ordered_primers
            .insert(id.to_string(), sequence.to_string());
    }

    pub fn add_fragment(&mut self, id: &str, sequence: &str) {
        self.amplified_fragments
            .insert(id.to_string(), sequence.to_string());
    }
}

/// Outcome of a batch. The maps are keyed and sorted by name; `processed`
/// keeps the order in which constructs were planned.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchResult {
    /// Names of the planned and failed constructs, in processing order.
    pub processed: Vec<String>,
    /// Accepted plan per construct.
    pub quotes: BTreeMap<String, Quote>,
    /// Every primer ordered for the batch, by id.
    pub ordered_primers: BTreeMap<String, String>,
    /// Every fragment amplified for the batch, by id, with its PCR plan.
    pub fragment_quotes: BTreeMap<String, Quote>,
    /// Why a construct could not be planned.
    pub errors: BTreeMap<String, String>,
}

/// Result of one attempt at one rotation.
#[derive(Debug, Clone)]
pub enum RotationOutcome {
    Accepted { offset: usize, quote: Quote },
    Rejected { offset: usize, reason: String },
    Faulted { offset: usize, error: QuoteError },
}

#[derive(Debug, Clone)]
pub enum ConstructOutcome {
    Planned { offset: usize, quote: Quote },
    Exhausted { message: String },
}

fn attempt_rotation<E: QuoteEngine + ?Sized>(
    engine: &E,
    network: &SupplyNode<'_>,
    sequence: &DNAsequence,
    offset: usize,
) -> RotationOutcome {
    match engine.get_quote(network, &sequence.rotated(offset)) {
        Ok(QuoteOutcome::Accepted(quote)) => RotationOutcome::Accepted { offset, quote },
        Ok(rejected) => RotationOutcome::Rejected {
            offset,
            reason: rejected.message(),
        },
        Err(error) => RotationOutcome::Faulted { offset, error },
    }
}

/// Quotes `sequence` starting at offsets `0..max_rotations` and stops at the
/// first accepted quote. Only the last attempt decides the error message.
/// `max_rotations` is clamped to `1..=MAX_ROTATIONS`.
pub fn plan_rotations<E: QuoteEngine + ?Sized>(
    engine: &E,
    network: &SupplyNode<'_>,
    sequence: &DNAsequence,
    max_rotations: usize,
) -> ConstructOutcome {
    let attempts = max_rotations.clamp(1, MAX_ROTATIONS);
    if attempts != max_rotations {
        debug!(max_rotations, attempts, "Rotation count clamped");
    }
    let mut last = None;
    for offset in 0..attempts {
        let outcome = attempt_rotation(engine, network, sequence, offset);
        match &outcome {
            RotationOutcome::Accepted { .. } => {}
            RotationOutcome::Rejected { offset, reason } => {
                debug!(offset, reason = %reason, "Rotation rejected")
            }
            RotationOutcome::Faulted { offset, error } => {
                debug!(offset, error = %error, "Rotation faulted")
            }
        }
        if let RotationOutcome::Accepted { offset, quote } = outcome {
            return ConstructOutcome::Planned { offset, quote };
        }
        last = Some(outcome);
    }
    let message = match last {
        Some(RotationOutcome::Faulted { error, .. }) => error.message,
        Some(RotationOutcome::Rejected { reason, .. }) => {
            format!("No assembly plan found: {reason}")
        }
        Some(RotationOutcome::Accepted { .. }) | None => {
            "No assembly plan found: no rotation was attempted".to_string()
        }
    };
    ConstructOutcome::Exhausted { message }
}

/// Adds what an accepted plan makes to the pools: PCR products to the
/// fragments (and to `fragment_quotes`), bought oligos to the primers.
/// Reused material keeps its library name and is not added again.
pub fn flatten_quote(
    quote: &Quote,
    pools: &mut ReusePools,
    fragment_quotes: &mut BTreeMap<String, Quote>,
) {
    for sub_quote in quote.tree_as_list() {
        let Some(id) = &sub_quote.id else {
            continue;
        };
        match &sub_quote.source {
            QuoteSource::Pcr { .. } => {
                pools.add_fragment(id, &sub_quote.sequence);
                fragment_quotes.insert(id.to_string(), sub_quote.clone());
            }
            QuoteSource::CommercialOffer { .. } => {
                pools.add_primer(id, &sub_quote.sequence);
            }
            QuoteSource::Library { .. } | QuoteSource::Assembly { .. } => {}
        }
    }
}

/// Plans the first `max_constructs` constructs (all when `None`) in the
/// given order.
///
/// Every construct gets a fresh supply network over the pools grown by the
/// constructs before it. Failures of a construct, an invalid sequence
/// included, are recorded in [`BatchResult::errors`]; only a broken
/// configuration (an unknown enzyme) fails the whole call.
pub fn compute_all_construct_quotes<E: QuoteEngine + ?Sized>(
    engine: &E,
    constructs: &[Construct],
    parts: &PartCatalog,
    method: AssemblyMethod,
    max_constructs: Option<usize>,
    params: &SupplyParameters,
) -> Result<BatchResult, PlannerError> {
    let mut pools = ReusePools::default();
    let mut result = BatchResult::default();
    let count = max_constructs.unwrap_or(constructs.len()).min(constructs.len());

    for (index, construct) in constructs.iter().take(count).enumerate() {
        if construct.topology == ConstructTopology::Linear {
            debug!(construct = %construct.name, "Linear construct planned as circular");
        }
        result.processed.push(construct.name.clone());
        let sequence = match DNAsequence::circular_from_sequence(&construct.sequence) {
            Ok(sequence) => sequence,
            Err(e) => {
                warn!(
                    construct = %construct.name,
                    "Construct not planned ({}/{}): {e}",
                    index + 1,
                    count
                );
                result.errors.insert(construct.name.clone(), e.to_string());
                continue;
            }
        };
        let outcome = {
            let network = build_supply_network(parts, &pools, method, params)?;
            plan_rotations(engine, &network, &sequence, params.max_rotations)
        };
        match outcome {
            ConstructOutcome::Planned { offset, mut quote } => {
                quote.compute_full_assembly_plan(&format!("ID_{}", index + 1), params.id_digits);
                quote
                    .metadata
                    .insert("rotation".to_string(), offset.to_string());
                flatten_quote(&quote, &mut pools, &mut result.fragment_quotes);
                info!(
                    construct = %construct.name,
                    price = quote.price,
                    rotation = offset,
                    "Construct planned ({}/{})",
                    index + 1,
                    count
                );
                result.quotes.insert(construct.name.clone(), quote);
            }
            ConstructOutcome::Exhausted { message } => {
                warn!(
                    construct = %construct.name,
                    "Construct not planned ({}/{}): {message}",
                    index + 1,
                    count
                );
                result.errors.insert(construct.name.clone(), message);
            }
        }
    }

    result.ordered_primers = pools.ordered_primers;
    Ok(result)
}

/// A named, independent list of constructs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Batch {
    pub name: String,
    pub constructs: Vec<Construct>,
}

/// Plans independent batches in parallel. Each batch has its own pools, so
/// nothing is reused across batches.
pub fn plan_batches<E: QuoteEngine + ?Sized>(
    engine: &E,
    batches: &[Batch],
    parts: &PartCatalog,
    method: AssemblyMethod,
    params: &SupplyParameters,
) -> Vec<(String, Result<BatchResult, PlannerError>)> {
    batches
        .par_iter()
        .map(|batch| {
            let result =
                compute_all_construct_quotes(engine, &batch.constructs, parts, method, None, params);
            (batch.name.clone(), result)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        engine::ReferenceEngine,
        error::ErrorCode,
        test_support::{SequenceGenerator, catalog_of},
    };
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn abc_parts(seed: u64) -> PartCatalog {
        let mut generator = SequenceGenerator::new(seed);
        catalog_of(&[
            ("A", generator.sequence(250)),
            ("B", generator.sequence(250)),
            ("C", generator.sequence(250)),
            ("D", generator.sequence(250)),
        ])
    }

    fn construct(name: &str, parts: &PartCatalog, names: &[&str]) -> Construct {
        let sequence: String = names.iter().map(|n| parts[*n].as_str()).collect();
        Construct::new(name, &sequence)
    }

    fn plan(
        constructs: &[Construct],
        parts: &PartCatalog,
        method: AssemblyMethod,
        max_constructs: Option<usize>,
    ) -> BatchResult {
        compute_all_construct_quotes(
            &ReferenceEngine,
            constructs,
            parts,
            method,
            max_constructs,
            &SupplyParameters::default(),
        )
        .unwrap()
    }

    /// Counts attempts and accepts only from a given rotation on.
    struct RotationGate {
        accept_from: usize,
        attempts: AtomicUsize,
    }

    impl QuoteEngine for RotationGate {
        fn get_quote(
            &self,
            network: &SupplyNode<'_>,
            sequence: &DNAsequence,
        ) -> Result<QuoteOutcome, QuoteError> {
            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
            if attempt < self.accept_from {
                return Ok(QuoteOutcome::rejected(network.name(), "gate closed"));
            }
            ReferenceEngine.get_quote(network, sequence)
        }
    }

    /// Faults on every sequence containing `marker`, in any rotation.
    struct FaultOn {
        marker: String,
    }

    impl QuoteEngine for FaultOn {
        fn get_quote(
            &self,
            network: &SupplyNode<'_>,
            sequence: &DNAsequence,
        ) -> Result<QuoteOutcome, QuoteError> {
            if sequence.get_forward_string().contains(&self.marker) {
                return Err(QuoteError::new(ErrorCode::Internal, "engine crashed"));
            }
            ReferenceEngine.get_quote(network, sequence)
        }
    }

    #[test]
    fn test_abc_any_method() {
        let parts = abc_parts(31);
        let constructs = vec![construct("ABC", &parts, &["A", "B", "C"])];
        let result = plan(&constructs, &parts, AssemblyMethod::AnyMethod, None);
        assert!(result.errors.is_empty());
        let quote = &result.quotes["ABC"];
        assert_eq!(quote.id.as_deref(), Some("ID_1"));
        assert!(quote.supplier_name().starts_with("golden_gate_assembly_"));
        assert_eq!(quote.metadata["rotation"], "0");
        assert_eq!(result.fragment_quotes.len(), 3);
        assert_eq!(result.ordered_primers.len(), 6);
        assert!(result.ordered_primers.keys().all(|k| k.starts_with("ID_1_")));
        for fragment in result.fragment_quotes.values() {
            assert!(matches!(fragment.source, QuoteSource::Pcr { .. }));
            assert!(parts.contains_key(&fragment.metadata["subject"]));
        }
    }

    #[test]
    fn test_method_restriction() {
        let parts = abc_parts(32);
        let constructs = vec![construct("ABC", &parts, &["A", "B", "C"])];
        let gibson = plan(&constructs, &parts, AssemblyMethod::Gibson, None);
        assert_eq!(gibson.quotes["ABC"].supplier_name(), "gibson_assembly");
        let golden_gate = plan(&constructs, &parts, AssemblyMethod::GoldenGate, None);
        assert_eq!(
            golden_gate.quotes["ABC"].supplier_name(),
            "golden_gate_assembly_BsmBI"
        );
    }

    #[test]
    fn test_rotation_retry_on_palindromic_origin() {
        let mut generator = SequenceGenerator::new(33);
        let parts = catalog_of(&[
            ("A", format!("TC{}", generator.sequence(248))),
            ("B", generator.sequence(250)),
            ("C", format!("{}TGTGGA", generator.sequence(244))),
        ]);
        let constructs = vec![construct("ABC", &parts, &["A", "B", "C"])];
        let result = plan(&constructs, &parts, AssemblyMethod::GoldenGate, None);
        assert!(result.errors.is_empty());
        let quote = &result.quotes["ABC"];
        assert_eq!(quote.metadata["rotation"], "1");
        assert!(quote.sequence.starts_with(&constructs[0].sequence[1..]));
    }

    #[test]
    fn test_rotation_bound() {
        let parts = abc_parts(34);
        let constructs = vec![construct("ABC", &parts, &["A", "B", "C"])];

        let engine = RotationGate {
            accept_from: usize::MAX,
            attempts: AtomicUsize::new(0),
        };
        let result = compute_all_construct_quotes(
            &engine,
            &constructs,
            &parts,
            AssemblyMethod::Gibson,
            None,
            &SupplyParameters::default(),
        )
        .unwrap();
        assert_eq!(engine.attempts.load(Ordering::SeqCst), 5);
        assert_eq!(result.errors["ABC"], "No assembly plan found: main: gate closed");

        let engine = RotationGate {
            accept_from: 3,
            attempts: AtomicUsize::new(0),
        };
        let result = compute_all_construct_quotes(
            &engine,
            &constructs,
            &parts,
            AssemblyMethod::Gibson,
            None,
            &SupplyParameters::default(),
        )
        .unwrap();
        assert!(result.errors.is_empty());
        assert_eq!(result.quotes["ABC"].metadata["rotation"], "3");
    }

    #[test]
    fn test_rotation_count_is_clamped() {
        let parts = abc_parts(34);
        let constructs = vec![construct("ABC", &parts, &["A", "B", "C"])];
        for (configured, expected) in [(50, MAX_ROTATIONS), (0, 1)] {
            let engine = RotationGate {
                accept_from: usize::MAX,
                attempts: AtomicUsize::new(0),
            };
            let params = SupplyParameters {
                max_rotations: configured,
                ..SupplyParameters::default()
            };
            let result = compute_all_construct_quotes(
                &engine,
                &constructs,
                &parts,
                AssemblyMethod::Gibson,
                None,
                &params,
            )
            .unwrap();
            assert_eq!(engine.attempts.load(Ordering::SeqCst), expected);
            assert_eq!(result.errors["ABC"], "No assembly plan found: main: gate closed");
        }
    }

    #[test]
    fn test_batch_isolation() {
        let parts = abc_parts(35);
        let marker = parts["D"][100..140].to_string();
        let constructs = vec![
            construct("ABC", &parts, &["A", "B", "C"]),
            construct("ABD", &parts, &["A", "B", "D"]),
            construct("BCA", &parts, &["B", "C", "A"]),
        ];
        let engine = FaultOn { marker };
        let result = compute_all_construct_quotes(
            &engine,
            &constructs,
            &parts,
            AssemblyMethod::Gibson,
            None,
            &SupplyParameters::default(),
        )
        .unwrap();
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors["ABD"], "engine crashed");
        assert!(result.quotes.contains_key("ABC"));
        assert!(result.quotes.contains_key("BCA"));
        assert_eq!(result.quotes["BCA"].id.as_deref(), Some("ID_3"));
    }

    #[test]
    fn test_cap_enforcement() {
        let parts = abc_parts(36);
        let constructs = vec![
            construct("ABC", &parts, &["A", "B", "C"]),
            construct("ABD", &parts, &["A", "B", "D"]),
            construct("DCB", &parts, &["D", "C", "B"]),
        ];
        let result = plan(&constructs, &parts, AssemblyMethod::Gibson, Some(2));
        assert_eq!(result.quotes.len(), 2);
        assert!(!result.quotes.contains_key("DCB"));
        assert!(!result.errors.contains_key("DCB"));
        let all_ids = result
            .ordered_primers
            .keys()
            .chain(result.fragment_quotes.keys());
        for id in all_ids {
            assert!(!id.starts_with("ID_3"));
        }
    }

    #[test]
    fn test_determinism() {
        let parts = abc_parts(37);
        let constructs = vec![
            construct("ABC", &parts, &["A", "B", "C"]),
            construct("ABD", &parts, &["A", "B", "D"]),
        ];
        let first = plan(&constructs, &parts, AssemblyMethod::AnyMethod, None);
        let second = plan(&constructs, &parts, AssemblyMethod::AnyMethod, None);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn test_monotonic_pool_growth() {
        let parts = abc_parts(38);
        let constructs = vec![
            construct("ABC", &parts, &["A", "B", "C"]),
            construct("ABD", &parts, &["A", "B", "D"]),
            construct("CDA", &parts, &["C", "D", "A"]),
        ];
        let mut previous = BatchResult::default();
        for cap in 1..=3 {
            let result = plan(&constructs, &parts, AssemblyMethod::Gibson, Some(cap));
            for (id, sequence) in &previous.ordered_primers {
                assert_eq!(result.ordered_primers.get(id), Some(sequence));
            }
            for id in previous.fragment_quotes.keys() {
                assert!(result.fragment_quotes.contains_key(id));
            }
            assert!(result.ordered_primers.len() >= previous.ordered_primers.len());
            previous = result;
        }
    }

    #[test]
    fn test_order_sensitivity_from_reuse() {
        let parts = abc_parts(39);
        let x = construct("X", &parts, &["A", "B", "C"]);
        let y = construct("Y", &parts, &["A", "B", "D"]);

        let alone = plan(&[y.clone()], &parts, AssemblyMethod::Gibson, None);
        let after = plan(&[x, y], &parts, AssemblyMethod::Gibson, None);
        assert!(after.quotes["Y"].price < alone.quotes["Y"].price);
        let reused_primer = after.quotes["Y"].tree_as_list().into_iter().any(|q| {
            matches!(
                &q.source,
                QuoteSource::Library { library, .. } if library == "already_ordered_primers"
            )
        });
        assert!(reused_primer);
        // Reused primers are not ordered twice
        let mut sequences: Vec<&String> = after.ordered_primers.values().collect();
        let total = sequences.len();
        sequences.sort();
        sequences.dedup();
        assert_eq!(sequences.len(), total);
    }

    #[test]
    fn test_zero_successes_is_ok() {
        let parts = abc_parts(40);
        let mut generator = SequenceGenerator::new(99);
        let constructs = vec![Construct::new("unrelated", &generator.sequence(300))];
        let result = plan(&constructs, &parts, AssemblyMethod::AnyMethod, None);
        assert!(result.quotes.is_empty());
        assert!(result.errors["unrelated"].starts_with("No assembly plan found: "));
    }

    #[test]
    fn test_invalid_construct_sequence_is_recorded() {
        let parts = abc_parts(41);
        let invalid = format!("{}N{}", parts["A"], parts["B"]);
        let constructs = vec![
            construct("ABC", &parts, &["A", "B", "C"]),
            Construct::new("ANB", &invalid),
            construct("ABD", &parts, &["A", "B", "D"]),
        ];
        let result = plan(&constructs, &parts, AssemblyMethod::Gibson, None);
        assert!(result.quotes.contains_key("ABC"));
        assert!(result.quotes.contains_key("ABD"));
        assert_eq!(result.quotes["ABD"].id.as_deref(), Some("ID_3"));
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors["ANB"].contains("'N' at position 250"));
        assert_eq!(result.processed, vec!["ABC", "ANB", "ABD"]);
    }

    #[test]
    fn test_processing_order_is_kept() {
        let parts = abc_parts(43);
        let constructs = vec![
            construct("Z", &parts, &["A", "B", "C"]),
            construct("M", &parts, &["A", "B", "D"]),
            construct("A", &parts, &["C", "D", "A"]),
        ];
        let result = plan(&constructs, &parts, AssemblyMethod::Gibson, Some(2));
        assert_eq!(result.processed, vec!["Z", "M"]);
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["processed"], serde_json::json!(["Z", "M"]));
    }

    #[test]
    fn test_free_pools_win_price_ties() {
        let parts = abc_parts(44);
        let constructs = vec![
            construct("X", &parts, &["A", "B", "C"]),
            construct("Y", &parts, &["A", "B", "D"]),
        ];
        let params = SupplyParameters {
            primer_cost: 0.0,
            pcr_extra_cost: 0.0,
            ..SupplyParameters::default()
        };
        let result = compute_all_construct_quotes(
            &ReferenceEngine,
            &constructs,
            &parts,
            AssemblyMethod::Gibson,
            None,
            &params,
        )
        .unwrap();
        assert!(result.errors.is_empty());
        let reused = result.quotes["Y"]
            .tree_as_list()
            .into_iter()
            .filter(|q| q.is_reused())
            .count();
        assert!(reused > 0);
        let mut sequences: Vec<&String> = result.ordered_primers.values().collect();
        let total = sequences.len();
        sequences.sort();
        sequences.dedup();
        assert_eq!(sequences.len(), total);
        let mut fragments: Vec<&String> =
            result.fragment_quotes.values().map(|q| &q.sequence).collect();
        let total = fragments.len();
        fragments.sort();
        fragments.dedup();
        assert_eq!(fragments.len(), total);
    }

    #[test]
    fn test_plan_batches_keeps_batches_apart() {
        let parts = abc_parts(42);
        let batches = vec![
            Batch {
                name: "first".to_string(),
                constructs: vec![construct("ABC", &parts, &["A", "B", "C"])],
            },
            Batch {
                name: "second".to_string(),
                constructs: vec![
                    construct("ABC", &parts, &["A", "B", "C"]),
                    construct("ABD", &parts, &["A", "B", "D"]),
                ],
            },
        ];
        let results = plan_batches(
            &ReferenceEngine,
            &batches,
            &parts,
            AssemblyMethod::Gibson,
            &SupplyParameters::default(),
        );
        assert_eq!(results.len(), 2);
        let first = results[0].1.as_ref().unwrap();
        let second = results[1].1.as_ref().unwrap();
        assert_eq!(results[0].0, "first");
        // Same first construct, same plan: nothing leaked between batches
        assert_eq!(first.quotes["ABC"], second.quotes["ABC"]);
        assert_eq!(second.quotes.len(), 2);
    }
}
