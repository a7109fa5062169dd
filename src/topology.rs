//! Supply topology: the declarative tree of suppliers a quoting engine walks
//! to price a sequence.
//!
//! A topology borrows the parts catalog and the reuse pools of the current
//! batch; it is rebuilt for every construct and dropped once the construct
//! is resolved, so it never outlives a pool mutation.

use crate::{
    error::PlannerError, planner::ReusePools, restriction_enzyme::RestrictionEnzyme, ENZYMES,
};
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, HashMap},
    fmt,
    str::FromStr,
    sync::Arc,
};

pub type PartCatalog = BTreeMap<String, String>;

pub const ORDERED_PRIMERS_LIBRARY: &str = "already_ordered_primers";
pub const AMPLIFIED_FRAGMENTS_LIBRARY: &str = "already_amplified_fragments";
pub const OLIGO_SUPPLIER: &str = "oligo_supplier";
pub const PRIMERS_COMPARATOR: &str = "primers_comparator";
pub const PCR_STATION: &str = "pcr_part_extension_station";
pub const FRAGMENTS_COMPARATOR: &str = "fragments_comparator";
pub const GIBSON_STATION: &str = "gibson_assembly";
pub const GOLDEN_GATE_COMPARATOR: &str = "golden_gate_comparator";
pub const MAIN_COMPARATOR: &str = "main";

/// Which chemistries a construct may be assembled with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssemblyMethod {
    Gibson,
    GoldenGate,
    AnyMethod,
}

impl FromStr for AssemblyMethod {
    type Err = PlannerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "gibson" => Ok(AssemblyMethod::Gibson),
            "golden_gate" => Ok(AssemblyMethod::GoldenGate),
            "any_method" => Ok(AssemblyMethod::AnyMethod),
            other => Err(PlannerError::InvalidMethod(other.to_string())),
        }
    }
}

impl fmt::Display for AssemblyMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AssemblyMethod::Gibson => "gibson",
            AssemblyMethod::GoldenGate => "golden_gate",
            AssemblyMethod::AnyMethod => "any_method",
        };
        write!(f, "{s}")
    }
}

/// Weight of the remaining-cost estimate in the assembly cut search.
/// `Auto` keeps the estimate admissible (weight 1), so the cheapest
/// segmentation is found; larger weights trade optimality for speed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchWeight {
    Auto,
    Factor(f64),
}

impl SearchWeight {
    pub fn factor(&self) -> f64 {
        match self {
            SearchWeight::Auto => 1.0,
            SearchWeight::Factor(f) => f.max(0.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SupplyParameters {
    pub primer_cost: f64,
    pub primer_max_length: usize,
    pub max_overhang_length: usize,
    pub pcr_extra_cost: f64,
    pub homology_min_size: usize,
    pub homology_max_size: usize,
    pub homology_min_tm: f64,
    pub homology_max_tm: f64,
    pub gibson_overlap: usize,
    pub gibson_cost: f64,
    pub golden_gate_cost: f64,
    pub golden_gate_enzymes: Vec<String>,
    pub cut_spread_radius: usize,
    pub coarse_grain: usize,
    pub fine_grain: Option<usize>,
    pub search_weight: SearchWeight,
    pub max_rotations: usize,
    pub id_digits: usize,
}

impl Default for SupplyParameters {
    fn default() -> Self {
        Self {
            primer_cost: 1.0,
            primer_max_length: 100,
            max_overhang_length: 30,
            pcr_extra_cost: 2.0,
            homology_min_size: 19,
            homology_max_size: 25,
            homology_min_tm: 50.0,
            homology_max_tm: 70.0,
            gibson_overlap: 40,
            gibson_cost: 50.0,
            golden_gate_cost: 0.0,
            golden_gate_enzymes: vec!["BsmBI".to_string(), "BsaI".to_string(), "BbsI".to_string()],
            cut_spread_radius: 2,
            coarse_grain: 600,
            fine_grain: None,
            search_weight: SearchWeight::Auto,
            max_rotations: 5,
            id_digits: 3,
        }
    }
}

impl SupplyParameters {
    pub fn load_from_path(path: &str) -> Result<Self, PlannerError> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn save_to_path(&self, path: &str) -> Result<(), PlannerError> {
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path, text)?;
        Ok(())
    }
}

/// Free sequences, looked up by exact sequence.
#[derive(Debug, Clone)]
pub struct LibrarySupplier<'a> {
    pub name: String,
    by_sequence: HashMap<&'a str, &'a str>,
}

impl<'a> LibrarySupplier<'a> {
    pub fn new(name: &str, parts: &'a BTreeMap<String, String>) -> Self {
        let mut by_sequence = HashMap::with_capacity(parts.len());
        // First name wins when two entries share a sequence
        for (part_name, sequence) in parts {
            by_sequence
                .entry(sequence.as_str())
                .or_insert(part_name.as_str());
        }
        Self {
            name: name.to_string(),
            by_sequence,
        }
    }

    pub fn find(&self, sequence: &str) -> Option<&'a str> {
        self.by_sequence.get(sequence).copied()
    }

    pub fn sequences(&self) -> impl Iterator<Item = &'a str> + '_ {
        self.by_sequence.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.by_sequence.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_sequence.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct CommercialOffer {
    pub name: String,
    pub price: f64,
    pub max_length: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionPolicy {
    /// Cheapest accepted offer; ties go to the supplier listed first.
    Cheapest,
    /// First supplier, in listed order, whose offer is accepted.
    FirstAccepted,
}

#[derive(Debug, Clone)]
pub struct SupplierComparator<'a> {
    pub name: String,
    pub policy: SelectionPolicy,
    pub suppliers: Vec<Arc<SupplyNode<'a>>>,
}

/// Picks primer-binding regions by size and melting temperature.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TmSegmentSelector {
    pub min_size: usize,
    pub max_size: usize,
    pub min_tm: f64,
    pub max_tm: f64,
}

#[derive(Debug, Clone)]
pub struct PcrExtractionStation<'a> {
    pub name: String,
    pub templates: &'a PartCatalog,
    pub primers: Arc<SupplyNode<'a>>,
    pub max_overhang_length: usize,
    pub extra_cost: f64,
    pub homology_selector: TmSegmentSelector,
}

#[derive(Debug, Clone)]
pub enum AssemblyStationMethod {
    Gibson {
        overlap: usize,
        cost: f64,
    },
    GoldenGate {
        enzyme: RestrictionEnzyme,
        cost: f64,
        cut_spread_radius: usize,
    },
}

impl AssemblyStationMethod {
    pub fn cost(&self) -> f64 {
        match self {
            AssemblyStationMethod::Gibson { cost, .. } => *cost,
            AssemblyStationMethod::GoldenGate { cost, .. } => *cost,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AssemblyStation<'a> {
    pub name: String,
    pub fragments: Arc<SupplyNode<'a>>,
    pub method: AssemblyStationMethod,
    pub coarse_grain: usize,
    pub fine_grain: Option<usize>,
    pub search_weight: SearchWeight,
}

#[derive(Debug, Clone)]
pub enum SupplyNode<'a> {
    Library(LibrarySupplier<'a>),
    CommercialOffer(CommercialOffer),
    Comparator(SupplierComparator<'a>),
    PcrExtraction(PcrExtractionStation<'a>),
    Assembly(AssemblyStation<'a>),
}

impl SupplyNode<'_> {
    pub fn name(&self) -> &str {
        match self {
            SupplyNode::Library(s) => &s.name,
            SupplyNode::CommercialOffer(s) => &s.name,
            SupplyNode::Comparator(s) => &s.name,
            SupplyNode::PcrExtraction(s) => &s.name,
            SupplyNode::Assembly(s) => &s.name,
        }
    }

    /// Names of this node and everything below it, depth first. Shared
    /// sub-suppliers are listed once per parent.
    pub fn supplier_names(&self) -> Vec<String> {
        let mut ret = vec![self.name().to_string()];
        let children: Vec<&Arc<SupplyNode<'_>>> = match self {
            SupplyNode::Library(_) | SupplyNode::CommercialOffer(_) => vec![],
            SupplyNode::Comparator(c) => c.suppliers.iter().collect(),
            SupplyNode::PcrExtraction(p) => vec![&p.primers],
            SupplyNode::Assembly(a) => vec![&a.fragments],
        };
        for child in children {
            ret.extend(child.supplier_names());
        }
        ret
    }
}

/// Builds the supply network for one construct over the current pools.
///
/// The returned main comparator offers, depending on `method`, the Golden
/// Gate stations (first accepted enzyme wins, in `golden_gate_enzymes`
/// order), the Gibson station, or both with Golden Gate preferred.
pub fn build_supply_network<'a>(
    parts: &'a PartCatalog,
    pools: &'a ReusePools,
    method: AssemblyMethod,
    params: &SupplyParameters,
) -> Result<SupplyNode<'a>, PlannerError> {
    // PRIMERS SUPPLIERS

    let already_ordered_primers = SupplyNode::Library(LibrarySupplier::new(
        ORDERED_PRIMERS_LIBRARY,
        pools.ordered_primers(),
    ));
    let primers_company = SupplyNode::CommercialOffer(CommercialOffer {
        name: OLIGO_SUPPLIER.to_string(),
        price: params.primer_cost,
        max_length: params.primer_max_length,
    });
    let primers_comparator = Arc::new(SupplyNode::Comparator(SupplierComparator {
        name: PRIMERS_COMPARATOR.to_string(),
        policy: SelectionPolicy::Cheapest,
        // Libraries first: on a price tie the free pool wins
        suppliers: vec![Arc::new(already_ordered_primers), Arc::new(primers_company)],
    }));

    // PARTS EXTENSION VIA PCR

    let parts_pcr_station = SupplyNode::PcrExtraction(PcrExtractionStation {
        name: PCR_STATION.to_string(),
        templates: parts,
        primers: primers_comparator,
        max_overhang_length: params.max_overhang_length,
        extra_cost: params.pcr_extra_cost,
        homology_selector: TmSegmentSelector {
            min_size: params.homology_min_size,
            max_size: params.homology_max_size,
            min_tm: params.homology_min_tm,
            max_tm: params.homology_max_tm,
        },
    });
    let already_amplified_fragments = SupplyNode::Library(LibrarySupplier::new(
        AMPLIFIED_FRAGMENTS_LIBRARY,
        pools.amplified_fragments(),
    ));
    let fragments_comparator = Arc::new(SupplyNode::Comparator(SupplierComparator {
        name: FRAGMENTS_COMPARATOR.to_string(),
        policy: SelectionPolicy::Cheapest,
        suppliers: vec![
            Arc::new(already_amplified_fragments),
            Arc::new(parts_pcr_station),
        ],
    }));

    // ASSEMBLY STATIONS

    let mut suppliers = vec![];
    if matches!(method, AssemblyMethod::GoldenGate | AssemblyMethod::AnyMethod) {
        let mut stations = vec![];
        for enzyme_name in &params.golden_gate_enzymes {
            let enzyme = ENZYMES.by_name(enzyme_name)?.clone();
            stations.push(Arc::new(SupplyNode::Assembly(AssemblyStation {
                name: format!("golden_gate_assembly_{}", enzyme.name),
                fragments: fragments_comparator.clone(),
                method: AssemblyStationMethod::GoldenGate {
                    enzyme,
                    cost: params.golden_gate_cost,
                    cut_spread_radius: params.cut_spread_radius,
                },
                coarse_grain: params.coarse_grain,
                fine_grain: params.fine_grain,
                search_weight: params.search_weight,
            })));
        }
        suppliers.push(Arc::new(SupplyNode::Comparator(SupplierComparator {
            name: GOLDEN_GATE_COMPARATOR.to_string(),
            policy: SelectionPolicy::FirstAccepted,
            suppliers: stations,
        })));
    }
    if matches!(method, AssemblyMethod::Gibson | AssemblyMethod::AnyMethod) {
        suppliers.push(Arc::new(SupplyNode::Assembly(AssemblyStation {
            name: GIBSON_STATION.to_string(),
            fragments: fragments_comparator.clone(),
            method: AssemblyStationMethod::Gibson {
                overlap: params.gibson_overlap,
                cost: params.gibson_cost,
            },
            coarse_grain: params.coarse_grain,
            fine_grain: params.fine_grain,
            search_weight: params.search_weight,
        })));
    }

    // Golden Gate goes first, so first-accepted gives it priority
    let policy = match method {
        AssemblyMethod::AnyMethod => SelectionPolicy::FirstAccepted,
        AssemblyMethod::Gibson | AssemblyMethod::GoldenGate => SelectionPolicy::Cheapest,
    };
    Ok(SupplyNode::Comparator(SupplierComparator {
        name: MAIN_COMPARATOR.to_string(),
        policy,
        suppliers,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> PartCatalog {
        let mut parts = PartCatalog::new();
        parts.insert("A".to_string(), "ATGCATGCATGC".to_string());
        parts
    }

    #[test]
    fn test_assembly_method_from_str() {
        assert_eq!("gibson".parse::<AssemblyMethod>().unwrap(), AssemblyMethod::Gibson);
        assert_eq!(
            "golden_gate".parse::<AssemblyMethod>().unwrap(),
            AssemblyMethod::GoldenGate
        );
        assert_eq!(
            "any_method".parse::<AssemblyMethod>().unwrap(),
            AssemblyMethod::AnyMethod
        );
        let err = "gateway".parse::<AssemblyMethod>().unwrap_err();
        assert!(matches!(err, PlannerError::InvalidMethod(m) if m == "gateway"));
        assert_eq!(AssemblyMethod::GoldenGate.to_string(), "golden_gate");
    }

    #[test]
    fn test_gibson_network_has_no_golden_gate_station() {
        let parts = catalog();
        let pools = ReusePools::default();
        let params = SupplyParameters::default();
        let main = build_supply_network(&parts, &pools, AssemblyMethod::Gibson, &params).unwrap();
        let names = main.supplier_names();
        assert!(names.contains(&GIBSON_STATION.to_string()));
        assert!(!names.iter().any(|n| n.starts_with("golden_gate")));
    }

    #[test]
    fn test_golden_gate_network_is_fast_accept_in_enzyme_order() {
        let parts = catalog();
        let pools = ReusePools::default();
        let params = SupplyParameters::default();
        let main =
            build_supply_network(&parts, &pools, AssemblyMethod::GoldenGate, &params).unwrap();
        let SupplyNode::Comparator(main) = main else {
            panic!("main supplier must be a comparator");
        };
        assert_eq!(main.suppliers.len(), 1);
        let SupplyNode::Comparator(gg) = main.suppliers[0].as_ref() else {
            panic!("golden gate stations must sit behind a comparator");
        };
        assert_eq!(gg.policy, SelectionPolicy::FirstAccepted);
        let names: Vec<&str> = gg.suppliers.iter().map(|s| s.name()).collect();
        assert_eq!(
            names,
            vec![
                "golden_gate_assembly_BsmBI",
                "golden_gate_assembly_BsaI",
                "golden_gate_assembly_BbsI"
            ]
        );
    }

    #[test]
    fn test_any_method_prefers_golden_gate() {
        let parts = catalog();
        let pools = ReusePools::default();
        let params = SupplyParameters::default();
        let main =
            build_supply_network(&parts, &pools, AssemblyMethod::AnyMethod, &params).unwrap();
        let SupplyNode::Comparator(main) = main else {
            panic!("main supplier must be a comparator");
        };
        assert_eq!(main.policy, SelectionPolicy::FirstAccepted);
        let names: Vec<&str> = main.suppliers.iter().map(|s| s.name()).collect();
        assert_eq!(names, vec![GOLDEN_GATE_COMPARATOR, GIBSON_STATION]);
    }

    #[test]
    fn test_network_reflects_current_pools() {
        let parts = catalog();
        let mut pools = ReusePools::default();
        pools.add_primer("ID_1_002", "ACGTACGTACGTACGTACGT");
        let params = SupplyParameters::default();
        let main = build_supply_network(&parts, &pools, AssemblyMethod::Gibson, &params).unwrap();
        let SupplyNode::Comparator(main) = main else {
            panic!("main supplier must be a comparator");
        };
        let SupplyNode::Assembly(gibson) = main.suppliers[0].as_ref() else {
            panic!("expected the gibson station");
        };
        let SupplyNode::Comparator(fragments) = gibson.fragments.as_ref() else {
            panic!("expected the fragments comparator");
        };
        let SupplyNode::PcrExtraction(pcr) = fragments.suppliers[1].as_ref() else {
            panic!("expected the PCR station");
        };
        let SupplyNode::Comparator(primers) = pcr.primers.as_ref() else {
            panic!("expected the primers comparator");
        };
        let SupplyNode::Library(library) = primers.suppliers[0].as_ref() else {
            panic!("expected the primers library");
        };
        assert_eq!(library.find("ACGTACGTACGTACGTACGT"), Some("ID_1_002"));
        assert_eq!(library.len(), 1);
    }

    #[test]
    fn test_unknown_enzyme_is_a_hard_error() {
        let parts = catalog();
        let pools = ReusePools::default();
        let params = SupplyParameters {
            golden_gate_enzymes: vec!["NotAnEnzyme".to_string()],
            ..SupplyParameters::default()
        };
        let err = build_supply_network(&parts, &pools, AssemblyMethod::GoldenGate, &params)
            .unwrap_err();
        assert!(matches!(err, PlannerError::UnknownEnzyme(_)));
    }

    #[test]
    fn test_parameters_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("params.json");
        let path = path.to_str().unwrap();
        let params = SupplyParameters {
            gibson_overlap: 30,
            fine_grain: Some(10),
            search_weight: SearchWeight::Factor(2.0),
            ..SupplyParameters::default()
        };
        params.save_to_path(path).unwrap();
        assert_eq!(SupplyParameters::load_from_path(path).unwrap(), params);
    }

    #[test]
    fn test_parameters_defaults_fill_missing_fields() {
        let params: SupplyParameters = serde_json::from_str(r#"{"gibson_cost": 10.0}"#).unwrap();
        assert_eq!(params.gibson_cost, 10.0);
        assert_eq!(params.max_rotations, 5);
        assert_eq!(params.golden_gate_enzymes.len(), 3);
    }
}
