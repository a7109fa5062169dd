use crate::{error::PlannerError, restriction_enzyme::RestrictionEnzyme};
use anyhow::{Result, anyhow};

const BUILTIN_ENZYMES_JSON: &str = include_str!("../assets/golden_gate_enzymes.json");

/// The Golden Gate enzyme table. Only Type IIS (non-palindromic) enzymes are
/// accepted, since a palindromic site cannot be removed by digestion.
#[derive(Clone, Debug)]
pub struct Enzymes {
    restriction_enzymes: Vec<RestrictionEnzyme>,
    max_re_length: usize,
}

impl Enzymes {
    fn new(json_text: &str) -> Result<Self> {
        let mut ret = Self {
            restriction_enzymes: vec![],
            max_re_length: 0,
        };
        let res: serde_json::Value = serde_json::from_str(json_text)?;
        let arr = res
            .as_array()
            .ok_or(anyhow!("Enzymes file is not a JSON array"))?;
        for row in arr {
            match row.get("type").and_then(|t| t.as_str()) {
                Some("restriction") => {
                    let mut re: RestrictionEnzyme = serde_json::from_value(row.clone())
                        .map_err(|e| anyhow!("Bad restriction enzyme: {row}: {e}"))?;
                    re.sequence = re.sequence.to_ascii_uppercase();
                    re.check_palindromic();
                    if re.is_palindromic() {
                        return Err(anyhow!(
                            "Enzyme {} has a palindromic site and cannot be used for Golden Gate",
                            re.name
                        ));
                    }
                    ret.restriction_enzymes.push(re);
                }
                Some(other) => return Err(anyhow!("Unknown enzyme type '{other}' in {}", row)),
                None => return Err(anyhow!("Missing enzyme type for {}", row)),
            }
        }
        ret.max_re_length = ret
            .restriction_enzymes
            .iter()
            .map(|re| re.sequence.len())
            .max()
            .unwrap_or(0);
        Ok(ret)
    }

    pub fn from_json_text(json_text: &str) -> Result<Self> {
        Self::new(json_text)
    }

    pub fn restriction_enzymes(&self) -> &Vec<RestrictionEnzyme> {
        &self.restriction_enzymes
    }

    pub fn max_re_length(&self) -> usize {
        self.max_re_length
    }

    pub fn by_name(&self, name: &str) -> Result<&RestrictionEnzyme, PlannerError> {
        self.restriction_enzymes
            .iter()
            .find(|re| re.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| PlannerError::UnknownEnzyme(name.to_string()))
    }
}

impl Default for Enzymes {
    fn default() -> Self {
        Enzymes::new(BUILTIN_ENZYMES_JSON).unwrap_or(Self {
            restriction_enzymes: vec![],
            max_re_length: 0,
        })
    }
}
