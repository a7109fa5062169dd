use crate::error::PlannerError;
use gb_io::seq::{Seq, Topology};
use serde::{Deserialize, Serialize};
use std::fmt;

type DNAstring = Vec<u8>;

/// A plain nucleotide sequence with a topology tag.
///
/// Only the unambiguous alphabet `ACGT` is accepted; everything a quoting
/// engine hands out (fragments, primers, overhangs) is derived from these.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DNAsequence {
    seq: Seq,
}

impl DNAsequence {
    pub fn from_sequence(sequence: &str) -> Result<DNAsequence, PlannerError> {
        let cleaned = Self::validate_dna_sequence(sequence.as_bytes())?;
        Ok(DNAsequence::from_u8(&cleaned))
    }

    pub fn circular_from_sequence(sequence: &str) -> Result<DNAsequence, PlannerError> {
        let mut ret = Self::from_sequence(sequence)?;
        ret.set_circular(true);
        Ok(ret)
    }

    pub fn from_genbank_seq(seq: Seq) -> Result<Self, PlannerError> {
        let cleaned = Self::validate_dna_sequence(&seq.seq)?;
        let mut ret = Self::from_u8(&cleaned);
        ret.seq.name = seq.name;
        ret.seq.topology = seq.topology;
        Ok(ret)
    }

    pub fn from_fasta_record(record: &bio::io::fasta::Record) -> Result<Self, PlannerError> {
        let cleaned = Self::validate_dna_sequence(record.seq())?;
        let mut ret = Self::from_u8(&cleaned);
        ret.seq.name = Some(record.id().to_string());
        Ok(ret)
    }

    pub(crate) fn from_u8(s: &[u8]) -> Self {
        let seq = Seq {
            name: None,
            topology: Topology::Linear,
            date: None,
            len: Some(s.len()),
            molecule_type: Some("DNA".to_string()),
            division: String::new(),
            definition: None,
            accession: None,
            version: None,
            source: None,
            dblink: None,
            keywords: None,
            references: vec![],
            comments: vec![],
            seq: s.to_vec(),
            contig: None,
            features: vec![],
        };
        Self { seq }
    }

    /// Uppercases, drops whitespace and rejects anything outside `ACGT`.
    pub fn validate_dna_sequence(v: &[u8]) -> Result<DNAstring, PlannerError> {
        let mut ret = Vec::with_capacity(v.len());
        for (pos, c) in v.iter().filter(|c| !c.is_ascii_whitespace()).enumerate() {
            let c = c.to_ascii_uppercase();
            if !matches!(c, b'A' | b'C' | b'G' | b'T') {
                return Err(PlannerError::InvalidSequence {
                    position: pos,
                    letter: c as char,
                });
            }
            ret.push(c);
        }
        Ok(ret)
    }

    #[inline(always)]
    pub fn forward(&self) -> &[u8] {
        &self.seq.seq
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.forward().len()
    }

    pub fn is_empty(&self) -> bool {
        self.forward().is_empty()
    }

    pub fn name(&self) -> &Option<String> {
        &self.seq.name
    }

    pub fn get_forward_string(&self) -> String {
        String::from_utf8_lossy(self.forward()).to_string()
    }

    pub fn is_circular(&self) -> bool {
        self.seq.topology == Topology::Circular
    }

    pub fn set_circular(&mut self, is_circular: bool) {
        self.seq.topology = match is_circular {
            true => Topology::Circular,
            false => Topology::Linear,
        };
    }

    /// Moves the logical start of the sequence `offset` bases to the right.
    /// The topology is kept, the biological sequence of a circular molecule is unchanged.
    pub fn rotated(&self, offset: usize) -> Self {
        if self.is_empty() {
            return self.clone();
        }
        let offset = offset % self.len();
        let forward = self.forward();
        let rotated: DNAstring = forward[offset..]
            .iter()
            .chain(forward[..offset].iter())
            .copied()
            .collect();
        let mut ret = Self::from_u8(&rotated);
        ret.seq.name = self.seq.name.clone();
        ret.seq.topology = self.seq.topology.clone();
        ret
    }

    /// `len` bases starting at `start`, which may be negative or run past the
    /// end. Wraps around the origin; only meaningful for circular sequences.
    pub fn circular_window(&self, start: isize, len: usize) -> DNAstring {
        let n = self.len() as isize;
        if n == 0 {
            return vec![];
        }
        (0..len as isize)
            .map(|i| self.forward()[(start + i).rem_euclid(n) as usize])
            .collect()
    }

    #[inline(always)]
    pub fn letter_complement(letter: u8) -> u8 {
        match letter {
            b'A' => b'T',
            b'T' => b'A',
            b'C' => b'G',
            b'G' => b'C',
            other => other,
        }
    }

    pub fn reverse_complement(seq: &[u8]) -> DNAstring {
        seq.iter().rev().map(|c| Self::letter_complement(*c)).collect()
    }

    pub fn reverse_complement_string(seq: &str) -> String {
        String::from_utf8_lossy(&Self::reverse_complement(seq.as_bytes())).to_string()
    }
}

impl fmt::Display for DNAsequence {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(self.forward()))
    }
}
