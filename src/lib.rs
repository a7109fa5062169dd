use enzymes::Enzymes;
use lazy_static::lazy_static;

pub mod about;
pub mod assembly;
pub mod design;
pub mod dna_sequence;
pub mod engine;
pub mod enzymes;
pub mod error;
pub mod pcr;
pub mod planner;
pub mod quote;
pub mod report;
pub mod restriction_enzyme;
pub mod topology;

#[cfg(test)]
pub(crate) mod test_support;

lazy_static! {
    // Golden Gate enzymes
    pub static ref ENZYMES: Enzymes = Enzymes::default();
}
