//! PCR extraction of a fragment from a catalog part.
//!
//! A fragment can be amplified when its middle is an exact substring of a
//! part and the bases outside that substring fit into the primer tails.

use crate::{
    dna_sequence::DNAsequence,
    engine::QuoteEngine,
    error::QuoteError,
    quote::{Quote, QuoteOutcome, QuoteSource},
    topology::{PartCatalog, PcrExtractionStation, TmSegmentSelector},
};

/// Melting temperature in degrees Celsius. Wallace rule for short oligos,
/// GC-content formula from 14 bases up.
pub fn melting_temperature(seq: &[u8]) -> f64 {
    let gc = seq.iter().filter(|c| matches!(c, b'G' | b'C')).count() as f64;
    let at = seq.len() as f64 - gc;
    if seq.len() < 14 {
        2.0 * at + 4.0 * gc
    } else {
        64.9 + 41.0 * (gc - 16.4) / seq.len() as f64
    }
}

impl TmSegmentSelector {
    pub fn accepts(&self, arm: &[u8]) -> bool {
        if arm.len() < self.min_size || arm.len() > self.max_size {
            return false;
        }
        let tm = melting_temperature(arm);
        tm >= self.min_tm && tm <= self.max_tm
    }

    /// Shortest valid homology arm at the start of `seq`.
    pub fn select_prefix<'s>(&self, seq: &'s [u8]) -> Option<&'s [u8]> {
        (self.min_size..=self.max_size.min(seq.len()))
            .map(|h| &seq[..h])
            .find(|arm| self.accepts(arm))
    }

    /// Shortest valid homology arm at the end of `seq`.
    pub fn select_suffix<'s>(&self, seq: &'s [u8]) -> Option<&'s [u8]> {
        (self.min_size..=self.max_size.min(seq.len()))
            .map(|h| &seq[seq.len() - h..])
            .find(|arm| self.accepts(arm))
    }
}

/// Where a target sits inside a part: `left` extra bases, then `core_len`
/// bases matching `template` from `part_start`, then the right tail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PcrCandidate<'a> {
    template: &'a str,
    part_start: usize,
    left: usize,
    core_len: usize,
}

fn common_prefix_len(a: &[u8], b: &[u8]) -> usize {
    a.iter().zip(b.iter()).take_while(|(x, y)| x == y).count()
}

impl<'a> PcrExtractionStation<'a> {
    fn candidates(&self, target: &[u8]) -> Vec<PcrCandidate<'a>> {
        let mut ret = vec![];
        let seed_len = self.homology_selector.min_size.max(1);
        let templates: &'a PartCatalog = self.templates;
        for left in 0..=self.max_overhang_length {
            if target.len() < left + seed_len {
                break;
            }
            let seed = &target[left..left + seed_len];
            for (name, part) in templates {
                let part = part.as_bytes();
                if part.len() < seed_len {
                    continue;
                }
                for (part_start, window) in part.windows(seed_len).enumerate() {
                    if window != seed {
                        continue;
                    }
                    // Only maximal matches; the shifted copies are the same PCR
                    if left > 0 && part_start > 0 && target[left - 1] == part[part_start - 1] {
                        continue;
                    }
                    let core_len = common_prefix_len(&target[left..], &part[part_start..]);
                    let right = target.len() - left - core_len;
                    if right > self.max_overhang_length {
                        continue;
                    }
                    ret.push(PcrCandidate {
                        template: name.as_str(),
                        part_start,
                        left,
                        core_len,
                    });
                }
            }
        }
        ret
    }

    pub fn get_quote<E: QuoteEngine + ?Sized>(
        &self,
        engine: &E,
        sequence: &DNAsequence,
    ) -> Result<QuoteOutcome, QuoteError> {
        let target = sequence.forward();
        let candidates = self.candidates(target);
        if candidates.is_empty() {
            return Ok(QuoteOutcome::rejected(
                &self.name,
                format!(
                    "no part contains the sequence with less than {} bp on each side",
                    self.max_overhang_length + 1
                ),
            ));
        }

        let mut best: Option<Quote> = None;
        let mut last_rejection = String::new();
        for candidate in candidates {
            match self.quote_candidate(engine, target, &candidate)? {
                QuoteOutcome::Accepted(quote) => {
                    if best.as_ref().is_none_or(|b| quote.price < b.price) {
                        best = Some(quote);
                    }
                }
                rejected => last_rejection = rejected.message(),
            }
        }
        Ok(match best {
            Some(quote) => QuoteOutcome::Accepted(quote),
            None => QuoteOutcome::rejected(&self.name, last_rejection),
        })
    }

    fn quote_candidate<E: QuoteEngine + ?Sized>(
        &self,
        engine: &E,
        target: &[u8],
        candidate: &PcrCandidate<'a>,
    ) -> Result<QuoteOutcome, QuoteError> {
        let core = &target[candidate.left..candidate.left + candidate.core_len];
        let (Some(forward_arm), Some(reverse_arm)) = (
            self.homology_selector.select_prefix(core),
            self.homology_selector.select_suffix(core),
        ) else {
            return Ok(QuoteOutcome::rejected(
                &self.name,
                format!(
                    "no primer homology with Tm in {}-{} in part {}",
                    self.homology_selector.min_tm, self.homology_selector.max_tm, candidate.template
                ),
            ));
        };

        let mut forward_primer = target[..candidate.left].to_vec();
        forward_primer.extend_from_slice(forward_arm);
        let mut reverse_template = reverse_arm.to_vec();
        reverse_template.extend_from_slice(&target[candidate.left + candidate.core_len..]);
        let reverse_primer = DNAsequence::reverse_complement(&reverse_template);

        let mut primers = Vec::with_capacity(2);
        for primer in [forward_primer, reverse_primer] {
            match engine.get_quote(&self.primers, &DNAsequence::from_u8(&primer))? {
                QuoteOutcome::Accepted(quote) => primers.push(quote),
                rejected => return Ok(rejected),
            }
        }

        let price = primers.iter().map(|p| p.price).sum::<f64>() + self.extra_cost;
        let location = format!(
            "{}-{}",
            candidate.part_start,
            candidate.part_start + candidate.core_len
        );
        let quote = Quote::new(
            target,
            price,
            QuoteSource::Pcr {
                station: self.name.clone(),
                template: candidate.template.to_string(),
                primers,
            },
        )
        .with_metadata("subject", candidate.template)
        .with_metadata("location", location);
        Ok(QuoteOutcome::Accepted(quote))
    }
}
