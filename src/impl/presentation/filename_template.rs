use std::{collections::HashMap, sync::LazyLock};

use chrono::{Datelike as _, NaiveDate};
use regex::Regex;

use crate::entities::Location;

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{(\w+)\}").expect("hardcoded regex should be valid"));

/// Expands a spreadsheet name template such as
/// `{location_name}_{year}_transactions`.
///
/// Supported keys: `location_name`, `location_slug`, `year`, `month`.
/// Unknown placeholders are kept verbatim.
pub(crate) fn spreadsheet_name(template: &str, location: &Location, date: NaiveDate) -> String {
    let values = HashMap::from([
        ("location_name", location.name.clone()),
        ("location_slug", location.slug.clone()),
        ("year", date.year().to_string()),
        ("month", format!("{:02}", date.month())),
    ]);
    let mut unknown_keys = Vec::new();
    let name = PLACEHOLDER
        .replace_all(template, |caps: &regex::Captures| {
            let key = &caps[1];
            match values.get(key) {
                Some(value) => value.clone(),
                None => {
                    unknown_keys.push(key.to_string());
                    caps[0].to_string()
                }
            }
        })
        .into_owned();
    if !unknown_keys.is_empty() {
        tracing::warn!(template, ?unknown_keys, "unknown placeholders in spreadsheet name");
    }
    name
}

/// Monthly transaction sheet, ex. `2025年06月`.
pub(crate) fn month_sheet_name(date: NaiveDate) -> String {
    date.format("%Y年%m月").to_string()
}

pub(crate) const SUMMARY_SHEET_NAME: &str = "每日摘要";
