//! CSV answer import for bulk loading a questionnaire exported from a spreadsheet.
//!
//! Expected header: `control_code,submeasure_code,documentation_score,implementation_score,comments`.
//! Empty cells leave the corresponding field untouched.

use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Deserializer};

use super::answers::AnswerSubmission;
use super::catalog::Catalog;

#[derive(Debug)]
pub enum AnswerImportError {
    Io(std::io::Error),
    Csv(csv::Error),
    UnknownCode {
        line: u64,
        control_code: String,
        submeasure_code: String,
    },
}

impl std::fmt::Display for AnswerImportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnswerImportError::Io(err) => write!(f, "failed to read answer export: {}", err),
            AnswerImportError::Csv(err) => write!(f, "invalid answer CSV data: {}", err),
            AnswerImportError::UnknownCode {
                line,
                control_code,
                submeasure_code,
            } => write!(
                f,
                "line {}: control {} is not part of submeasure {} in this catalog",
                line, control_code, submeasure_code
            ),
        }
    }
}

impl std::error::Error for AnswerImportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AnswerImportError::Io(err) => Some(err),
            AnswerImportError::Csv(err) => Some(err),
            AnswerImportError::UnknownCode { .. } => None,
        }
    }
}

impl From<std::io::Error> for AnswerImportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<csv::Error> for AnswerImportError {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err)
    }
}

pub struct AnswerCsvImporter;

impl AnswerCsvImporter {
    pub fn from_path<P: AsRef<Path>>(
        path: P,
        catalog: &Catalog,
    ) -> Result<Vec<AnswerSubmission>, AnswerImportError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file, catalog)
    }

    /// Map each row's codes onto catalog relationship ids.
    ///
    /// Score ranges are not checked here; submissions still pass through the
    /// answer guard before they are stored.
    pub fn from_reader<R: Read>(
        reader: R,
        catalog: &Catalog,
    ) -> Result<Vec<AnswerSubmission>, AnswerImportError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        let headers = csv_reader.headers()?.clone();
        let mut submissions = Vec::new();

        for record in csv_reader.records() {
            let record = record?;
            // Physical line where the record starts; quoted cells may span lines.
            let line = record.position().map(csv::Position::line).unwrap_or_default();
            let row: AnswerRow = record.deserialize(Some(&headers))?;
            let key = catalog
                .find_by_codes(&row.control_code, &row.submeasure_code)
                .ok_or_else(|| AnswerImportError::UnknownCode {
                    line,
                    control_code: row.control_code.clone(),
                    submeasure_code: row.submeasure_code.clone(),
                })?;

            submissions.push(AnswerSubmission {
                control_id: key.control_id,
                submeasure_id: key.submeasure_id,
                documentation_score: row.documentation_score.map(Some),
                implementation_score: row.implementation_score.map(Some),
                comments: row.comments.map(Some),
                evidence: None,
            });
        }

        Ok(submissions)
    }
}

#[derive(Debug, Deserialize)]
struct AnswerRow {
    control_code: String,
    submeasure_code: String,
    #[serde(default, deserialize_with = "empty_string_as_none_score")]
    documentation_score: Option<i64>,
    #[serde(default, deserialize_with = "empty_string_as_none_score")]
    implementation_score: Option<i64>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    comments: Option<String>,
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.and_then(|raw| {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }))
}

fn empty_string_as_none_score<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    empty_string_as_none(deserializer)?
        .map(|raw| raw.parse::<i64>().map_err(serde::de::Error::custom))
        .transpose()
}
