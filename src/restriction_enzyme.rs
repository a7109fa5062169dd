use serde::{Deserialize, Serialize};

use crate::dna_sequence::DNAsequence;

/// A Type IIS restriction enzyme as used for Golden Gate assembly.
///
/// `cut` is the distance from the first base of the recognition site to the
/// top-strand cut; `overlap` is the length of the sticky end it leaves.
/// For BsmBI (`CGTCTC(1/5)`) that is `cut = 7`, `overlap = 4`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RestrictionEnzyme {
    pub name: String,
    pub sequence: String,
    pub note: Option<String>,
    pub cut: isize,
    pub overlap: isize,
    #[serde(skip_serializing, default)]
    is_palindromic: bool,
}

#[derive(Clone, Debug)]
pub struct RestrictionEnzymeSite {
    pub offset: isize,
    pub enzyme: RestrictionEnzyme,
    pub forward_strand: bool,
}

impl RestrictionEnzyme {
    pub fn new(name: &str, sequence: &str, cut: isize, overlap: isize) -> Self {
        let mut ret = Self {
            name: name.to_string(),
            sequence: sequence.to_ascii_uppercase(),
            note: None,
            cut,
            overlap,
            is_palindromic: false,
        };
        ret.check_palindromic();
        ret
    }

    pub fn check_palindromic(&mut self) {
        self.is_palindromic = self.sequence == self.get_sequence_rc();
    }

    pub fn is_palindromic(&self) -> bool {
        self.is_palindromic
    }

    fn get_sequence_rc(&self) -> String {
        DNAsequence::reverse_complement_string(&self.sequence)
    }

    /// Bases between the end of the recognition site and the cut.
    pub fn spacer_length(&self) -> usize {
        (self.cut - self.sequence.len() as isize).max(0) as usize
    }

    pub fn overhang_length(&self) -> usize {
        self.overlap.unsigned_abs()
    }

    /// Flanks added around a fragment so that digestion exposes the fragment's
    /// own terminal bases as sticky ends: `site + spacer` on the left and its
    /// reverse complement on the right.
    pub fn golden_gate_flanks(&self) -> (Vec<u8>, Vec<u8>) {
        let mut left = self.sequence.as_bytes().to_vec();
        left.extend(std::iter::repeat_n(b'A', self.spacer_length()));
        let right = DNAsequence::reverse_complement(&left);
        (left, right)
    }

    pub fn get_sites(&self, seq: &DNAsequence) -> Vec<RestrictionEnzymeSite> {
        let mut ret = vec![];
        let recognition_len = self.sequence.len();
        if recognition_len == 0 || seq.len() < recognition_len {
            return ret;
        }
        let forward = if seq.is_circular() {
            seq.circular_window(0, seq.len() + recognition_len - 1)
        } else {
            seq.forward().to_vec()
        };
        let site = self.sequence.as_bytes();
        let site_rc = DNAsequence::reverse_complement(site);
        for (start, window) in forward.windows(recognition_len).enumerate() {
            if start >= seq.len() {
                break;
            }
            if window == site {
                ret.push(RestrictionEnzymeSite {
                    offset: start as isize,
                    enzyme: self.to_owned(),
                    forward_strand: true,
                });
            } else if !self.is_palindromic && window == site_rc.as_slice() {
                ret.push(RestrictionEnzymeSite {
                    offset: start as isize,
                    enzyme: self.to_owned(),
                    forward_strand: false,
                });
            }
        }
        ret
    }
}
