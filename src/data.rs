//! Limit-curve data files.
//!
//! A file starts with optional `key: value` header lines that pre-set series
//! options, followed by two-column `(mass, cross-section)` rows. The column
//! delimiter is whatever non-numeric character first follows a number on the
//! first data row.

use crate::error::DataError;
use crate::geometry::Point;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;

static HEADER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*([A-Za-z_][A-Za-z0-9_ ]*?)\s*:\s*(.*?)\s*$").expect("header regex")
});

/// Styling and label options of a series. Every field may come from the
/// data-file header or from the scene manifest; the manifest wins.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SeriesOptions {
    pub label: Option<String>,
    pub color: Option<String>,
    pub style: Option<String>,
    pub source: Option<String>,
    pub year: Option<f64>,
    pub label_xpos: Option<f64>,
    pub label_ypos: Option<f64>,
    pub label_rotation: Option<f64>,
    pub label_color: Option<String>,
    pub linewidth: Option<f64>,
    pub fontsize: Option<f64>,
    pub alpha: Option<f64>,
}

impl SeriesOptions {
    /// Apply one header entry. Keys are matched case-insensitively.
    pub fn set(&mut self, key: &str, value: &str, origin: &str) -> Result<(), DataError> {
        let number = || {
            value.parse::<f64>().map_err(|_| DataError::BadValue {
                origin: origin.to_string(),
                key: key.to_string(),
                value: value.to_string(),
            })
        };
        match key.to_ascii_lowercase().as_str() {
            "label" => self.label = Some(value.replace("\\n", "\n")),
            "color" => self.color = Some(value.to_string()),
            "style" => self.style = Some(value.to_string()),
            "source" => self.source = Some(value.to_string()),
            "year" => self.year = Some(number()?),
            "label_xpos" => self.label_xpos = Some(number()?),
            "label_ypos" => self.label_ypos = Some(number()?),
            "label_rotation" => self.label_rotation = Some(number()?),
            "label_color" => self.label_color = Some(value.to_string()),
            "linewidth" => self.linewidth = Some(number()?),
            "fontsize" => self.fontsize = Some(number()?),
            "alpha" => self.alpha = Some(number()?),
            _ => {
                return Err(DataError::UnknownKey {
                    origin: origin.to_string(),
                    key: key.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Overlay every option set in `overrides`.
    pub fn merge(&mut self, overrides: &SeriesOptions) {
        fn take<T: Clone>(slot: &mut Option<T>, value: &Option<T>) {
            if value.is_some() {
                slot.clone_from(value);
            }
        }
        take(&mut self.label, &overrides.label);
        take(&mut self.color, &overrides.color);
        take(&mut self.style, &overrides.style);
        take(&mut self.source, &overrides.source);
        take(&mut self.year, &overrides.year);
        take(&mut self.label_xpos, &overrides.label_xpos);
        take(&mut self.label_ypos, &overrides.label_ypos);
        take(&mut self.label_rotation, &overrides.label_rotation);
        take(&mut self.label_color, &overrides.label_color);
        take(&mut self.linewidth, &overrides.linewidth);
        take(&mut self.fontsize, &overrides.fontsize);
        take(&mut self.alpha, &overrides.alpha);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SeriesFile {
    pub options: SeriesOptions,
    pub samples: Vec<Point>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Delimiter {
    Whitespace,
    Char(char),
}

impl Delimiter {
    fn detect(row: &str) -> Option<Self> {
        let mut prev_numeric = false;
        for ch in row.trim().chars() {
            let numeric = ch.is_ascii_digit()
                || ch == '.'
                || ch == '+'
                || ch == '-'
                || (prev_numeric && (ch == 'e' || ch == 'E'));
            if !numeric {
                return Some(if ch.is_whitespace() {
                    Self::Whitespace
                } else {
                    Self::Char(ch)
                });
            }
            prev_numeric = ch.is_ascii_digit() || ch == '.';
        }
        None
    }

    fn split<'a>(self, row: &'a str) -> Vec<&'a str> {
        match self {
            Self::Whitespace => row.split_whitespace().collect(),
            Self::Char(ch) => row
                .split(ch)
                .map(str::trim)
                .filter(|field| !field.is_empty())
                .collect(),
        }
    }
}

pub fn read_series(path: &Path) -> Result<SeriesFile, DataError> {
    let content = std::fs::read_to_string(path).map_err(|source| DataError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_series(&content, &path.display().to_string())
}

/// Parse a series document; `origin` names it in errors.
pub fn parse_series(content: &str, origin: &str) -> Result<SeriesFile, DataError> {
    let mut options = SeriesOptions::default();
    let mut samples = Vec::new();
    let mut delimiter = None;

    for (idx, raw) in content.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if samples.is_empty()
            && line.contains(':')
            && let Some(caps) = HEADER_RE.captures(line)
        {
            options.set(&caps[1], &caps[2], origin)?;
            continue;
        }

        let bad_row = || DataError::BadRow {
            origin: origin.to_string(),
            line: idx + 1,
            content: raw.to_string(),
        };
        let delim = match delimiter {
            Some(delim) => delim,
            None => {
                let detected = Delimiter::detect(line).ok_or_else(bad_row)?;
                delimiter = Some(detected);
                detected
            }
        };
        let fields = delim.split(line);
        let [x, y, ..] = fields.as_slice() else {
            return Err(bad_row());
        };
        let x: f64 = x.parse().map_err(|_| bad_row())?;
        let y: f64 = y.parse().map_err(|_| bad_row())?;
        samples.push((x, y));
    }

    if samples.is_empty() {
        return Err(DataError::Empty {
            origin: origin.to_string(),
        });
    }
    Ok(SeriesFile { options, samples })
}
