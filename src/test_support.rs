use crate::topology::PartCatalog;

/// Reproducible pseudo-random parts.
///
/// Bases alternate between weak (A/T, even positions) and strong (G/C, odd
/// positions). Such sequences contain no BsmBI, BsaI or BbsI site and no
/// palindromic 4-mer, and every 20 bp window has a primer-friendly Tm.
/// Keep part lengths even so that concatenations stay alternating.
pub(crate) struct SequenceGenerator {
    state: u64,
}

impl SequenceGenerator {
    pub(crate) fn new(seed: u64) -> Self {
        Self {
            state: seed.wrapping_mul(0x9E37_79B9_7F4A_7C15) | 1,
        }
    }

    fn next_bit(&mut self) -> bool {
        self.state = self
            .state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        (self.state >> 33) & 1 == 1
    }

    pub(crate) fn sequence(&mut self, len: usize) -> String {
        (0..len)
            .map(|i| match (i % 2 == 0, self.next_bit()) {
                (true, false) => 'A',
                (true, true) => 'T',
                (false, false) => 'G',
                (false, true) => 'C',
            })
            .collect()
    }
}

pub(crate) fn catalog_of(parts: &[(&str, String)]) -> PartCatalog {
    parts
        .iter()
        .map(|(name, sequence)| (name.to_string(), sequence.clone()))
        .collect()
}
