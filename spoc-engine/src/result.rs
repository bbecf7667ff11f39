// Result Assembly
// Flattens pipeline outputs into one ordered record with reproducible column ids

use crate::error::PipelineError;
use crate::pipeline::{ComponentPipeline, PipelineId, PipelineSet};
use crate::registry::MAX_OUTPUT_WIDTH;

use serde::ser::{Serialize, SerializeMap, Serializer};
use std::fmt;
use std::ops::Range;

/// Raw values of one pipeline, or why it has none
pub type PipelineOutcome = Result<Vec<f64>, PipelineError>;

/// One column of the result record
#[derive(Debug, Clone, PartialEq)]
pub struct ResultEntry {
    pub column: String,
    /// NaN marks an unavailable value
    pub value: f64,
}

/// Columns owned by one pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSpan {
    pub id: PipelineId,
    pub columns: Range<usize>,
    pub error: Option<PipelineError>,
}

/// Availability of one pipeline's values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStatus {
    Successful,
    /// Ran, but some values are NaN
    PartiallyUnavailable,
    /// Failed, or every value is NaN
    Unavailable,
}

impl fmt::Display for PipelineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineStatus::Successful => "successful",
            PipelineStatus::PartiallyUnavailable => "partially unavailable",
            PipelineStatus::Unavailable => "unavailable",
        };
        f.write_str(name)
    }
}

/// Single ordered row of results for one dataset
#[derive(Debug, Clone, PartialEq)]
pub struct ResultRecord {
    dataset: String,
    entries: Vec<ResultEntry>,
    spans: Vec<PipelineSpan>,
}

impl ResultRecord {
    pub fn dataset(&self) -> &str {
        &self.dataset
    }

    pub fn entries(&self) -> &[ResultEntry] {
        &self.entries
    }

    pub fn spans(&self) -> &[PipelineSpan] {
        &self.spans
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, column: &str) -> Option<f64> {
        self.entries.iter().find(|e| e.column == column).map(|e| e.value)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.column.as_str())
    }

    pub fn values(&self) -> Vec<f64> {
        self.entries.iter().map(|e| e.value).collect()
    }

    /// Entries produced by one pipeline
    pub fn pipeline_entries(&self, id: &PipelineId) -> Option<&[ResultEntry]> {
        self.spans
            .iter()
            .find(|s| &s.id == id)
            .map(|s| &self.entries[s.columns.clone()])
    }

    /// Failed pipelines with their errors
    pub fn failures(&self) -> impl Iterator<Item = (&PipelineId, &PipelineError)> {
        self.spans
            .iter()
            .filter_map(|s| s.error.as_ref().map(|e| (&s.id, e)))
    }

    pub fn summary(&self) -> ComputationSummary {
        let statuses = self
            .spans
            .iter()
            .map(|span| {
                let entries = &self.entries[span.columns.clone()];
                let status = if span.error.is_some() || entries.iter().all(|e| e.value.is_nan()) {
                    PipelineStatus::Unavailable
                } else if entries.iter().any(|e| e.value.is_nan()) {
                    PipelineStatus::PartiallyUnavailable
                } else {
                    PipelineStatus::Successful
                };
                (span.id.clone(), status)
            })
            .collect();
        ComputationSummary { statuses }
    }
}

/// Serialized as an ordered map of column id to value
impl Serialize for ResultRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for entry in &self.entries {
            map.serialize_entry(&entry.column, &entry.value)?;
        }
        map.end()
    }
}

/// Per-pipeline availability report
#[derive(Debug, Clone, PartialEq)]
pub struct ComputationSummary {
    pub statuses: Vec<(PipelineId, PipelineStatus)>,
}

impl ComputationSummary {
    pub fn count(&self, status: PipelineStatus) -> usize {
        self.statuses.iter().filter(|(_, s)| *s == status).count()
    }

    pub fn status_of(&self, id: &PipelineId) -> Option<PipelineStatus> {
        self.statuses.iter().find(|(i, _)| i == id).map(|(_, s)| *s)
    }
}

impl fmt::Display for ComputationSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} successful, {} partially unavailable, {} unavailable",
            self.count(PipelineStatus::Successful),
            self.count(PipelineStatus::PartiallyUnavailable),
            self.count(PipelineStatus::Unavailable)
        )?;
        for (id, status) in &self.statuses {
            if *status != PipelineStatus::Successful {
                writeln!(f, "  {}: {}", id, status)?;
            }
        }
        Ok(())
    }
}

/// Concatenates pipeline outputs in pipeline order
pub struct ResultAssembler;

impl ResultAssembler {
    /// Build the record; `outcomes[i]` belongs to the i-th pipeline of the set.
    ///
    /// A missing outcome is reported as a panic of that pipeline. A failed
    /// pipeline is filled with NaN at its declared width. Pipelines with a
    /// `Dynamic` output arity have no declared width and take a single column
    /// when they fail, so their column set depends on the run.
    pub fn assemble(
        dataset: &str,
        pipelines: &PipelineSet,
        outcomes: Vec<Option<PipelineOutcome>>,
    ) -> ResultRecord {
        let mut entries = Vec::new();
        let mut spans = Vec::with_capacity(pipelines.len());
        let mut outcomes = outcomes.into_iter();

        for pipeline in pipelines.pipelines() {
            let id = pipeline.id();
            let base = id.to_string();
            let outcome = outcomes.next().flatten().unwrap_or_else(|| {
                Err(PipelineError::Panicked {
                    component: base.clone(),
                })
            });

            let (values, error) = match outcome {
                Ok(values) => (values, None),
                Err(error) => (vec![f64::NAN; failed_width(pipeline)], Some(error)),
            };

            let start = entries.len();
            entries.extend(
                Self::column_ids(&base, values.len())
                    .into_iter()
                    .zip(values)
                    .map(|(column, value)| ResultEntry { column, value }),
            );
            spans.push(PipelineSpan {
                id,
                columns: start..entries.len(),
                error,
            });
        }

        ResultRecord {
            dataset: dataset.to_string(),
            entries,
            spans,
        }
    }

    /// Column ids for a pipeline of the given width; 1-based suffix unless width is one
    pub fn column_ids(base: &str, width: usize) -> Vec<String> {
        if width == 1 {
            return vec![base.to_string()];
        }
        (1..=width).map(|i| format!("{}.{}", base, i)).collect()
    }
}

/// Width a failed pipeline occupies: its declared width, or one column when unknown
fn failed_width(pipeline: &ComponentPipeline) -> usize {
    pipeline.expected_width().unwrap_or(1).min(MAX_OUTPUT_WIDTH)
}
