//! Assembly stations: cut a circular sequence into fragments the fragment
//! supplier can provide, and price the cheapest segmentation.

use crate::{
    dna_sequence::DNAsequence,
    engine::QuoteEngine,
    error::QuoteError,
    quote::{AssemblyChemistry, AssemblySegment, Quote, QuoteOutcome, QuoteSource},
    topology::{AssemblyStation, AssemblyStationMethod, SupplyNode},
};
use std::{
    cmp::Ordering,
    collections::{BTreeSet, BinaryHeap, HashMap},
};
use tracing::trace;

#[derive(Debug, Clone, Copy)]
struct Frontier {
    estimate: f64,
    node: usize,
}

impl PartialEq for Frontier {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Frontier {}

impl Ord for Frontier {
    // Reversed, BinaryHeap pops the lowest estimate first
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .estimate
            .total_cmp(&self.estimate)
            .then_with(|| other.node.cmp(&self.node))
    }
}

impl PartialOrd for Frontier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Order in which cut shifts are tried: 0, -1, 1, -2, 2, ...
fn shift_order(radius: usize) -> Vec<isize> {
    let mut ret = vec![0];
    for r in 1..=radius as isize {
        ret.push(-r);
        ret.push(r);
    }
    ret
}

fn is_palindromic(seq: &[u8]) -> bool {
    seq == DNAsequence::reverse_complement(seq).as_slice()
}

/// Start positions of `needle` in the circular `target`.
fn circular_occurrences(target: &DNAsequence, needle: &[u8]) -> Vec<usize> {
    let n = target.len();
    if needle.is_empty() || needle.len() > n {
        return vec![];
    }
    let haystack = target.circular_window(0, n + needle.len() - 1);
    haystack
        .windows(needle.len())
        .enumerate()
        .filter(|(_, w)| *w == needle)
        .map(|(i, _)| i)
        .collect()
}

impl AssemblyStation<'_> {
    fn chemistry(&self) -> AssemblyChemistry {
        match &self.method {
            AssemblyStationMethod::Gibson { .. } => AssemblyChemistry::Gibson,
            AssemblyStationMethod::GoldenGate { enzyme, .. } => AssemblyChemistry::GoldenGate {
                enzyme: enzyme.name.clone(),
            },
        }
    }

    /// Bases a fragment extends past its left and right cut.
    fn extensions(&self) -> (usize, usize) {
        let total = match &self.method {
            AssemblyStationMethod::Gibson { overlap, .. } => *overlap,
            AssemblyStationMethod::GoldenGate { enzyme, .. } => enzyme.overhang_length(),
        };
        (total / 2, total - total / 2)
    }

    fn flanks(&self) -> (Vec<u8>, Vec<u8>) {
        match &self.method {
            AssemblyStationMethod::Gibson { .. } => (vec![], vec![]),
            AssemblyStationMethod::GoldenGate { enzyme, .. } => enzyme.golden_gate_flanks(),
        }
    }

    /// The fragment covering the segment between cuts `start` and `end`.
    fn fragment(&self, target: &DNAsequence, start: isize, end: isize) -> Vec<u8> {
        let (left_ext, right_ext) = self.extensions();
        let from = start - left_ext as isize;
        let len = (end + right_ext as isize - from).max(0) as usize;
        let (left_flank, right_flank) = self.flanks();
        let mut ret = left_flank;
        ret.extend(target.circular_window(from, len));
        ret.extend(right_flank);
        ret
    }

    fn overhang(&self, target: &DNAsequence, cut: isize) -> Vec<u8> {
        let (left_ext, right_ext) = self.extensions();
        target.circular_window(cut - left_ext as isize, left_ext + right_ext)
    }

    /// Cut positions worth trying: the origin, boundaries of sequences the
    /// fragment supplier already knows, and the coarse and fine grids.
    fn candidate_cuts(&self, target: &DNAsequence) -> Vec<usize> {
        let n = target.len();
        let mut cuts = BTreeSet::from([0]);
        let (left_ext, right_ext) = self.extensions();
        let (left_flank, right_flank) = self.flanks();
        let mut known = vec![];
        known_sequences(&self.fragments, &mut known);
        for (sequence, is_template) in known {
            let (core, skip_left, skip_right) = if is_template {
                (sequence, 0, 0)
            } else {
                // Earlier fragments carry flanks and extensions around their cuts
                let Some(core) = sequence
                    .strip_prefix(left_flank.as_slice())
                    .and_then(|s| s.strip_suffix(right_flank.as_slice()))
                else {
                    continue;
                };
                if core.len() <= left_ext + right_ext {
                    continue;
                }
                (core, left_ext, right_ext)
            };
            for start in circular_occurrences(target, core) {
                cuts.insert((start + skip_left) % n);
                cuts.insert((start + core.len() - skip_right) % n);
            }
        }
        for grain in [Some(self.coarse_grain), self.fine_grain].into_iter().flatten() {
            if grain > 0 {
                cuts.extend((grain..n).step_by(grain));
            }
        }
        cuts.into_iter().filter(|c| *c < n).collect()
    }

    pub fn get_quote<E: QuoteEngine + ?Sized>(
        &self,
        engine: &E,
        sequence: &DNAsequence,
    ) -> Result<QuoteOutcome, QuoteError> {
        let mut target = sequence.clone();
        target.set_circular(true);
        let n = target.len();

        if let AssemblyStationMethod::GoldenGate { enzyme, .. } = &self.method {
            if let Some(site) = enzyme.get_sites(&target).first() {
                return Ok(QuoteOutcome::rejected(
                    &self.name,
                    format!("sequence contains a {} site at {}", enzyme.name, site.offset),
                ));
            }
            let origin = self.overhang(&target, 0);
            if is_palindromic(&origin) {
                return Ok(QuoteOutcome::rejected(
                    &self.name,
                    format!(
                        "overhang {} at the origin is palindromic",
                        String::from_utf8_lossy(&origin)
                    ),
                ));
            }
        }

        let mut nodes = self.candidate_cuts(&target);
        nodes.push(n);

        let mut edges: HashMap<(usize, usize), Quote> = HashMap::new();
        let mut last_rejection = String::from("no fragment could be supplied");
        for i in 0..nodes.len() {
            for j in i + 1..nodes.len() {
                let fragment = self.fragment(&target, nodes[i] as isize, nodes[j] as isize);
                match engine.get_quote(&self.fragments, &DNAsequence::from_u8(&fragment))? {
                    QuoteOutcome::Accepted(quote) => {
                        edges.insert((i, j), quote);
                    }
                    rejected => last_rejection = rejected.message(),
                }
            }
        }
        trace!(
            station = %self.name,
            cuts = nodes.len(),
            edges = edges.len(),
            "fragments quoted"
        );

        let Some(path) = self.cheapest_path(&nodes, &edges) else {
            return Ok(QuoteOutcome::rejected(
                &self.name,
                format!("no segmentation into suppliable fragments ({last_rejection})"),
            ));
        };

        let mut segments = Vec::with_capacity(path.len() - 1);
        match &self.method {
            AssemblyStationMethod::Gibson { .. } => {
                for pair in path.windows(2) {
                    if let Some(quote) = edges.remove(&(pair[0], pair[1])) {
                        segments.push(AssemblySegment {
                            start: nodes[pair[0]],
                            end: nodes[pair[1]],
                            quote,
                        });
                    }
                }
            }
            AssemblyStationMethod::GoldenGate {
                cut_spread_radius, ..
            } => {
                let cuts: Vec<usize> = path[..path.len() - 1].iter().map(|i| nodes[*i]).collect();
                let shifts = match self.assign_overhangs(&target, &cuts, *cut_spread_radius) {
                    Ok(shifts) => shifts,
                    Err(reason) => return Ok(QuoteOutcome::rejected(&self.name, reason)),
                };
                for (k, pair) in path.windows(2).enumerate() {
                    let left_shift = shifts[k];
                    let right_shift = shifts.get(k + 1).copied().unwrap_or(0);
                    let start = nodes[pair[0]] as isize + left_shift;
                    let end = nodes[pair[1]] as isize + right_shift;
                    let quote = if left_shift == 0 && right_shift == 0 {
                        edges.remove(&(pair[0], pair[1]))
                    } else {
                        let fragment = self.fragment(&target, start, end);
                        engine
                            .get_quote(&self.fragments, &DNAsequence::from_u8(&fragment))?
                            .accepted()
                    };
                    let Some(quote) = quote else {
                        return Ok(QuoteOutcome::rejected(
                            &self.name,
                            format!("fragment {start}-{end} cannot be supplied after overhang shifts"),
                        ));
                    };
                    segments.push(AssemblySegment {
                        start: start.rem_euclid(n as isize) as usize,
                        end: end as usize,
                        quote,
                    });
                }
            }
        }

        let price = self.method.cost() + segments.iter().map(|s| s.quote.price).sum::<f64>();
        Ok(QuoteOutcome::Accepted(Quote::new(
            target.forward(),
            price,
            QuoteSource::Assembly {
                station: self.name.clone(),
                chemistry: self.chemistry(),
                segments,
            },
        )))
    }

    /// Best-first search from the origin to the end of the sequence. The
    /// remaining-cost estimate is the remaining length times the cheapest
    /// price per base seen on any fragment, scaled by the search weight.
    fn cheapest_path(
        &self,
        nodes: &[usize],
        edges: &HashMap<(usize, usize), Quote>,
    ) -> Option<Vec<usize>> {
        let goal = nodes.len() - 1;
        let n = nodes[goal] as f64;
        let min_price_per_base = edges
            .iter()
            .map(|((i, j), quote)| quote.price / (nodes[*j] - nodes[*i]) as f64)
            .fold(f64::INFINITY, f64::min);
        if !min_price_per_base.is_finite() {
            return None;
        }
        let weight = self.search_weight.factor();
        let estimate = |node: usize| weight * (n - nodes[node] as f64) * min_price_per_base;

        let mut best_cost = vec![f64::INFINITY; nodes.len()];
        let mut previous: Vec<Option<usize>> = vec![None; nodes.len()];
        let mut closed = vec![false; nodes.len()];
        let mut heap = BinaryHeap::new();
        best_cost[0] = 0.0;
        heap.push(Frontier {
            estimate: estimate(0),
            node: 0,
        });
        while let Some(Frontier { node, .. }) = heap.pop() {
            if node == goal {
                let mut path = vec![goal];
                let mut current = goal;
                while let Some(p) = previous[current] {
                    path.push(p);
                    current = p;
                }
                path.reverse();
                return Some(path);
            }
            if closed[node] {
                continue;
            }
            closed[node] = true;
            for next in node + 1..nodes.len() {
                let Some(quote) = edges.get(&(node, next)) else {
                    continue;
                };
                let cost = best_cost[node] + quote.price;
                if cost < best_cost[next] {
                    best_cost[next] = cost;
                    previous[next] = Some(node);
                    heap.push(Frontier {
                        estimate: cost + estimate(next),
                        node: next,
                    });
                }
            }
        }
        None
    }

    /// Chooses a shift for every cut so that all overhangs are
    /// non-palindromic and distinct from each other and from each other's
    /// reverse complements. The origin never shifts.
    fn assign_overhangs(
        &self,
        target: &DNAsequence,
        cuts: &[usize],
        radius: usize,
    ) -> Result<Vec<isize>, String> {
        let n = target.len() as isize;
        let mut used: Vec<Vec<u8>> = vec![];
        let mut shifts = Vec::with_capacity(cuts.len());
        let mut previous_cut: Option<isize> = None;
        for (index, cut) in cuts.iter().enumerate() {
            let candidates = if index == 0 {
                vec![0]
            } else {
                shift_order(radius)
            };
            let chosen = candidates.into_iter().find_map(|shift| {
                let position = *cut as isize + shift;
                // Shifted cuts stay strictly between the previous cut and the end
                if previous_cut.is_some_and(|p| position <= p) || position >= n {
                    return None;
                }
                let overhang = self.overhang(target, position);
                let overhang_rc = DNAsequence::reverse_complement(&overhang);
                let clash = is_palindromic(&overhang)
                    || used.iter().any(|o| *o == overhang || *o == overhang_rc);
                (!clash).then_some((shift, overhang))
            });
            let Some((shift, overhang)) = chosen else {
                return Err(format!(
                    "no unique non-palindromic overhang within {radius} bp of position {cut}"
                ));
            };
            previous_cut = Some(*cut as isize + shift);
            used.push(overhang);
            shifts.push(shift);
        }
        Ok(shifts)
    }
}

/// Sequences a fragment supplier can provide without new design work:
/// catalog parts (`true`) and earlier fragments (`false`).
fn known_sequences<'n>(node: &'n SupplyNode<'_>, out: &mut Vec<(&'n [u8], bool)>) {
    match node {
        SupplyNode::PcrExtraction(station) => {
            out.extend(station.templates.values().map(|part| (part.as_bytes(), true)));
        }
        SupplyNode::Library(library) => {
            out.extend(library.sequences().map(|sequence| (sequence.as_bytes(), false)));
        }
        SupplyNode::Comparator(comparator) => {
            for supplier in &comparator.suppliers {
                known_sequences(supplier, out);
            }
        }
        SupplyNode::CommercialOffer(_) | SupplyNode::Assembly(_) => {}
    }
}
