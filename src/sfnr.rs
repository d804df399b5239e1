//! SFNR values from BXH/XCEDE QA `index.html` reports.
//!
//! With the mean/stdev/sfnr option enabled, the report renders three
//! `span.imgmax` values per run; the third of each triplet is the max SFNR.

use crate::error::{PrepError, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

static DECIMAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[0-9]+\.[0-9]+").expect("decimal pattern is valid"));

const TRIPLET: usize = 3;

/// Max SFNR values, as printed in the report, in document order.
pub fn extract_sfnr(html: &str) -> Result<Vec<String>> {
    let document = Html::parse_document(html);
    let selector = Selector::parse("span.imgmax").expect("imgmax selector is valid");
    let spans: Vec<String> = document
        .select(&selector)
        .map(|el| el.text().collect::<String>())
        .collect();
    if spans.is_empty() {
        return Err(PrepError::Parse(
            "no span.imgmax elements found; was the report generated with mean/stdev/sfnr enabled?"
                .to_string(),
        ));
    }
    debug!("Found {} imgmax spans", spans.len());

    Ok(spans
        .iter()
        .skip(TRIPLET - 1)
        .step_by(TRIPLET)
        .flat_map(|text| DECIMAL.find_iter(text).map(|m| m.as_str().to_string()))
        .collect())
}

pub fn run(report: &Path) -> Result<String> {
    let html = fs::read_to_string(report)?;
    let values = extract_sfnr(&html)?;
    info!("Extracted {} SFNR values from {}", values.len(), report.display());
    Ok(values.join(","))
}
