use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::EvalResult;
use crate::model::QualityTier;
use crate::util::{create_parent_dirs, escape_csv_cell};

pub const EXPORT_COLUMNS: [&str; 8] = [
    "question_id",
    "question_title",
    "question_content",
    "original_answer",
    "llm_answer",
    "composite_score",
    "quality_tier",
    "access_count",
];

/// One flattened question record, in export column order.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportRow {
    pub question_id: String,
    pub question_title: String,
    pub question_content: Option<String>,
    pub original_answer: String,
    pub llm_answer: String,
    pub composite_score: f64,
    pub quality_tier: QualityTier,
    pub access_count: u64,
}

impl ExportRow {
    fn to_csv_line(&self) -> String {
        let composite_score = format!("{:.6}", self.composite_score);
        let access_count = self.access_count.to_string();
        let cells = [
            self.question_id.as_str(),
            self.question_title.as_str(),
            self.question_content.as_deref().unwrap_or(""),
            self.original_answer.as_str(),
            self.llm_answer.as_str(),
            composite_score.as_str(),
            self.quality_tier.as_str(),
            access_count.as_str(),
        ];

        cells
            .iter()
            .map(|cell| escape_csv_cell(cell))
            .collect::<Vec<String>>()
            .join(",")
    }
}

pub fn write_csv(destination: &Path, rows: &[ExportRow]) -> EvalResult<usize> {
    create_parent_dirs(destination)?;

    let mut output = BufWriter::new(File::create(destination)?);
    writeln!(output, "{}", EXPORT_COLUMNS.join(","))?;
    for row in rows {
        writeln!(output, "{}", row.to_csv_line())?;
    }
    output.flush()?;

    Ok(rows.len())
}
