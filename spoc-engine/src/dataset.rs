// Dataset
// Immutable n x p numeric array (observations x variables) with optional variable names

use crate::error::{EngineError, EngineResult};

use nalgebra::DMatrix;

/// Layout of row-oriented input data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DimOrder {
    /// Each row is an observation
    #[default]
    ObservationsByVariables,
    /// Each row is a variable
    VariablesByObservations,
}

/// Numeric input to a computation
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    name: String,
    data: DMatrix<f64>,
    var_names: Vec<String>,
}

impl Dataset {
    /// Build from rows of observations
    pub fn from_rows<R: AsRef<[f64]>>(rows: &[R]) -> EngineResult<Self> {
        Self::from_rows_with_order(rows, DimOrder::ObservationsByVariables)
    }

    /// Build from rows laid out in the given order
    pub fn from_rows_with_order<R: AsRef<[f64]>>(rows: &[R], order: DimOrder) -> EngineResult<Self> {
        let width = rows.first().map(|r| r.as_ref().len()).unwrap_or(0);
        if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.as_ref().len() != width) {
            return Err(EngineError::InvalidDataset(format!(
                "row {} has {} values, expected {}",
                i,
                row.as_ref().len(),
                width
            )));
        }

        let values: Vec<f64> = rows.iter().flat_map(|r| r.as_ref().iter().copied()).collect();
        let matrix = DMatrix::from_row_slice(rows.len(), width, &values);

        match order {
            DimOrder::ObservationsByVariables => Self::from_matrix(matrix),
            DimOrder::VariablesByObservations => Self::from_matrix(matrix.transpose()),
        }
    }

    /// Build from an n x p matrix
    pub fn from_matrix(data: DMatrix<f64>) -> EngineResult<Self> {
        if data.nrows() == 0 || data.ncols() == 0 {
            return Err(EngineError::InvalidDataset(format!(
                "dataset must be non-empty, got {} x {}",
                data.nrows(),
                data.ncols()
            )));
        }
        if let Some(idx) = data.iter().position(|x| !x.is_finite()) {
            // Column-major index
            let (row, col) = (idx % data.nrows(), idx / data.nrows());
            return Err(EngineError::InvalidDataset(format!(
                "non-finite value at observation {}, variable {}",
                row, col
            )));
        }

        let var_names = (0..data.ncols()).map(|i| format!("var-{}", i)).collect();
        Ok(Self {
            name: String::from("dataset"),
            data,
            var_names,
        })
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Label the variables; one name per column
    pub fn with_var_names<I, S>(mut self, names: I) -> EngineResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        if names.len() != self.data.ncols() {
            return Err(EngineError::InvalidDataset(format!(
                "{} variable names given for {} variables",
                names.len(),
                self.data.ncols()
            )));
        }
        self.var_names = names;
        Ok(self)
    }

    /// Keep at most the first `n` observations and `p` variables
    pub fn subsample(mut self, n: usize, p: usize) -> Self {
        let n = n.clamp(1, self.data.nrows());
        let p = p.clamp(1, self.data.ncols());
        self.data = self.data.view((0, 0), (n, p)).into_owned();
        self.var_names.truncate(p);
        self
    }

    /// Column-wise z-score with population standard deviation.
    ///
    /// Constant columns are only centred.
    pub fn normalised(mut self) -> Self {
        let n = self.data.nrows() as f64;
        for mut column in self.data.column_iter_mut() {
            let mean = column.sum() / n;
            let var = column.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
            let std = var.sqrt();
            for x in column.iter_mut() {
                *x -= mean;
                if std > f64::EPSILON {
                    *x /= std;
                }
            }
        }
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The n x p data matrix
    pub fn data(&self) -> &DMatrix<f64> {
        &self.data
    }

    pub fn var_names(&self) -> &[String] {
        &self.var_names
    }

    pub fn n_observations(&self) -> usize {
        self.data.nrows()
    }

    pub fn n_variables(&self) -> usize {
        self.data.ncols()
    }
}
