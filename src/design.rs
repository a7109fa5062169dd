//! Batch designs: the parts catalog and the ordered list of constructs.
//!
//! Parts come from a JSON design, a FASTA file or a GenBank file; construct
//! compositions come from the JSON design or a CSV file with the columns
//! `construct,parts` where parts are separated by `+`, e.g. `A + B + C`.

use crate::{
    dna_sequence::DNAsequence,
    error::PlannerError,
    planner::{Construct, ConstructTopology},
    topology::PartCatalog,
};
use bio::io::fasta;
use serde::{Deserialize, Serialize};
use std::{fs::File, path::Path};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstructDesign {
    pub name: String,
    pub parts: Vec<String>,
    #[serde(default)]
    pub topology: ConstructTopology,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Design {
    pub parts: PartCatalog,
    pub constructs: Vec<ConstructDesign>,
}

impl Design {
    /// Loads a design from `path`: a JSON design, or a FASTA/GenBank parts
    /// file combined with a compositions CSV.
    pub fn load(path: &str, compositions: Option<&str>) -> Result<Self, PlannerError> {
        let extension = Path::new(path)
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        let mut design = match extension.as_str() {
            "json" => Self::from_json_file(path)?,
            "fa" | "fasta" | "fna" => Self {
                parts: Self::parts_from_fasta_file(path)?,
                constructs: vec![],
            },
            "gb" | "gbk" | "genbank" => Self {
                parts: Self::parts_from_genbank_file(path)?,
                constructs: vec![],
            },
            other => {
                return Err(PlannerError::InvalidDesign(format!(
                    "unsupported design file type '{other}' for {path}"
                )));
            }
        };
        if let Some(compositions) = compositions {
            design.constructs = Self::constructs_from_csv_file(compositions)?;
        }
        design.normalize()?;
        Ok(design)
    }

    pub fn from_json_file(path: &str) -> Result<Self, PlannerError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_text(&text)
    }

    pub fn from_json_text(text: &str) -> Result<Self, PlannerError> {
        let mut design: Design = serde_json::from_str(text)?;
        design.normalize()?;
        Ok(design)
    }

    pub fn parts_from_fasta_file(path: &str) -> Result<PartCatalog, PlannerError> {
        let file = File::open(path)?;
        let mut parts = PartCatalog::new();
        for record in fasta::Reader::new(file).records() {
            let record = record?;
            let dna = DNAsequence::from_fasta_record(&record)?;
            parts.insert(record.id().to_string(), dna.get_forward_string());
        }
        Ok(parts)
    }

    pub fn parts_from_genbank_file(path: &str) -> Result<PartCatalog, PlannerError> {
        let records = gb_io::reader::parse_file(path)
            .map_err(|e| PlannerError::Parse(format!("{path}: {e}")))?;
        let mut parts = PartCatalog::new();
        for (index, seq) in records.into_iter().enumerate() {
            let dna = DNAsequence::from_genbank_seq(seq)?;
            let name = dna
                .name()
                .clone()
                .unwrap_or_else(|| format!("part_{}", index + 1));
            parts.insert(name, dna.get_forward_string());
        }
        Ok(parts)
    }

    pub fn constructs_from_csv_file(path: &str) -> Result<Vec<ConstructDesign>, PlannerError> {
        let reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_path(path)?;
        Self::constructs_from_csv(reader)
    }

    pub fn constructs_from_csv<R: std::io::Read>(
        mut reader: csv::Reader<R>,
    ) -> Result<Vec<ConstructDesign>, PlannerError> {
        let mut ret = vec![];
        for record in reader.records() {
            let record = record?;
            let name = record.get(0).unwrap_or_default().to_string();
            if name.is_empty() {
                continue;
            }
            let parts: Vec<String> = record
                .get(1)
                .unwrap_or_default()
                .split('+')
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty())
                .collect();
            let topology = match record.get(2).map(|t| t.to_ascii_lowercase()) {
                Some(t) if t == "linear" => ConstructTopology::Linear,
                _ => ConstructTopology::Circular,
            };
            ret.push(ConstructDesign {
                name,
                parts,
                topology,
            });
        }
        Ok(ret)
    }

    /// Uppercases part sequences and checks every construct against the
    /// catalog.
    fn normalize(&mut self) -> Result<(), PlannerError> {
        for sequence in self.parts.values_mut() {
            *sequence = DNAsequence::from_sequence(sequence)?.get_forward_string();
        }
        let mut seen = std::collections::HashSet::new();
        for construct in &self.constructs {
            if !seen.insert(construct.name.as_str()) {
                return Err(PlannerError::InvalidDesign(format!(
                    "construct '{}' appears twice",
                    construct.name
                )));
            }
            if construct.parts.is_empty() {
                return Err(PlannerError::InvalidDesign(format!(
                    "construct '{}' has no parts",
                    construct.name
                )));
            }
            for part in &construct.parts {
                if !self.parts.contains_key(part) {
                    return Err(PlannerError::MissingPart {
                        construct: construct.name.clone(),
                        part: part.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Constructs in design order, their sequence being the parts joined in
    /// order.
    pub fn constructs(&self) -> Result<Vec<Construct>, PlannerError> {
        self.constructs
            .iter()
            .map(|design| -> Result<Construct, PlannerError> {
                let mut sequence = String::new();
                for part in &design.parts {
                    let part_sequence = self.parts.get(part).ok_or_else(|| {
                        PlannerError::MissingPart {
                            construct: design.name.clone(),
                            part: part.clone(),
                        }
                    })?;
                    sequence.push_str(part_sequence);
                }
                Ok(Construct {
                    name: design.name.clone(),
                    sequence,
                    topology: design.topology,
                })
            })
            .collect()
    }

    pub fn construct_parts(&self, construct: &str) -> Option<&[String]> {
        self.constructs
            .iter()
            .find(|c| c.name == construct)
            .map(|c| c.parts.as_slice())
    }
}
