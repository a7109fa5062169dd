//! Writes a planned batch as a set of CSV sheets plus a JSON dump.

use crate::{design::Design, error::PlannerError, planner::BatchResult};
use itertools::Itertools;
use std::path::{Path, PathBuf};

pub const RESULT_JSON: &str = "batch_result.json";

fn write_sheet(
    dir: &Path,
    name: &str,
    header: &[&str],
    rows: impl IntoIterator<Item = Vec<String>>,
) -> Result<PathBuf, PlannerError> {
    let path = dir.join(format!("{name}.csv"));
    let mut writer = csv::Writer::from_path(&path)?;
    writer.write_record(header)?;
    for row in rows {
        writer.write_record(&row)?;
    }
    writer.flush()?;
    Ok(path)
}

/// Writes all sheets into `dir`, creating it if needed, and returns the
/// written paths. Plans and errors are listed in processing order.
pub fn write_report(
    dir: &Path,
    design: &Design,
    result: &BatchResult,
) -> Result<Vec<PathBuf>, PlannerError> {
    std::fs::create_dir_all(dir)?;
    let constructs = design.constructs()?;
    let mut written = vec![];

    written.push(write_sheet(
        dir,
        "construct_parts",
        &["construct", "parts"],
        design
            .constructs
            .iter()
            .map(|c| vec![c.name.clone(), c.parts.iter().join(" + ")]),
    )?);

    written.push(write_sheet(
        dir,
        "construct_sequences",
        &["construct", "sequence"],
        constructs
            .iter()
            .map(|c| vec![c.name.clone(), c.sequence.clone()]),
    )?);

    written.push(write_sheet(
        dir,
        "primer_sequences",
        &["primer_id", "sequence"],
        result
            .ordered_primers
            .iter()
            .map(|(id, sequence)| vec![id.clone(), sequence.clone()]),
    )?);

    written.push(write_sheet(
        dir,
        "part_sequences",
        &["part", "sequence"],
        design
            .parts
            .iter()
            .map(|(name, sequence)| vec![name.clone(), sequence.clone()]),
    )?);

    written.push(write_sheet(
        dir,
        "fragment_extensions",
        &["fragment_id", "part", "primers", "sequence"],
        result.fragment_quotes.iter().map(|(id, quote)| {
            vec![
                id.clone(),
                quote.metadata.get("subject").cloned().unwrap_or_default(),
                quote.components_ids().iter().join(" + "),
                quote.sequence.clone(),
            ]
        }),
    )?);

    written.push(write_sheet(
        dir,
        "assembly_plan",
        &["construct", "method", "price", "fragments"],
        result.processed.iter().filter_map(|name| {
            let quote = result.quotes.get(name)?;
            Some(vec![
                name.clone(),
                quote.supplier_name().to_string(),
                format!("{:.2}", quote.price),
                quote.components_ids().iter().join(" + "),
            ])
        }),
    )?);

    written.push(write_sheet(
        dir,
        "errors",
        &["construct", "error"],
        result.processed.iter().filter_map(|name| {
            let message = result.errors.get(name)?;
            Some(vec![name.clone(), message.clone()])
        }),
    )?);

    let json_path = dir.join(RESULT_JSON);
    std::fs::write(&json_path, serde_json::to_string_pretty(result)?)?;
    written.push(json_path);

    Ok(written)
}
