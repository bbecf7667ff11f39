// Component Definitions
// Kinds, shape capabilities, output arity and the callables behind each component

use super::schema::{ParamSchema, Params};

use nalgebra::DMatrix;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// Error type returned by component callables
pub type ComponentError = Box<dyn std::error::Error + Send + Sync>;

/// Result type returned by component callables
pub type ComponentResult<T> = Result<T, ComponentError>;

/// Dataset (n x p) to square matrix
pub type StatisticFn = Arc<dyn Fn(&DMatrix<f64>, &Params) -> ComponentResult<DMatrix<f64>> + Send + Sync>;

/// Pair of vectors to scalar
pub type PairwiseFn = Arc<dyn Fn(&[f64], &[f64], &Params) -> ComponentResult<f64> + Send + Sync>;

/// Square matrix to vector or scalar
pub type ReducerFn = Arc<dyn Fn(&DMatrix<f64>, &Params) -> ComponentResult<ComponentOutput> + Send + Sync>;

/// Dataset (n x p) to vector or scalar
pub type ReducedStatisticFn =
    Arc<dyn Fn(&DMatrix<f64>, &Params) -> ComponentResult<ComponentOutput> + Send + Sync>;

/// Raw value returned by a reducer or reduced statistic
#[derive(Debug, Clone, PartialEq)]
pub enum ComponentOutput {
    Scalar(f64),
    Vector(Vec<f64>),
    Matrix(DMatrix<f64>),
}

impl ComponentOutput {
    /// Number of scalar elements
    pub fn len(&self) -> usize {
        match self {
            ComponentOutput::Scalar(_) => 1,
            ComponentOutput::Vector(v) => v.len(),
            ComponentOutput::Matrix(m) => m.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Flatten to a 1-D sequence, matrices in row-major order
    pub fn flatten(self) -> Vec<f64> {
        match self {
            ComponentOutput::Scalar(x) => vec![x],
            ComponentOutput::Vector(v) => v,
            ComponentOutput::Matrix(m) => m.transpose().as_slice().to_vec(),
        }
    }
}

impl From<f64> for ComponentOutput {
    fn from(value: f64) -> Self {
        ComponentOutput::Scalar(value)
    }
}

impl From<Vec<f64>> for ComponentOutput {
    fn from(values: Vec<f64>) -> Self {
        ComponentOutput::Vector(values)
    }
}

/// Which vectors a pairwise statistic compares
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairwiseDim {
    /// Row vectors; output is n x n
    Observations,
    /// Column vectors; output is p x p
    Variables,
}

/// Iteration policy of a pairwise statistic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PairwiseSpec {
    pub dim: PairwiseDim,
    /// Sort each vector ascending before comparing
    pub ordered: bool,
    /// Evaluate i <= j only and mirror
    pub symmetric: bool,
}

impl PairwiseSpec {
    pub fn new(dim: PairwiseDim) -> Self {
        Self {
            dim,
            ordered: false,
            symmetric: true,
        }
    }

    pub fn ordered(mut self, ordered: bool) -> Self {
        self.ordered = ordered;
        self
    }

    pub fn symmetric(mut self, symmetric: bool) -> Self {
        self.symmetric = symmetric;
        self
    }
}

/// Tagged component kind; dispatch happens on the tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentKind {
    Statistic,
    PairwiseStatistic(PairwiseSpec),
    Reducer,
    ReducedStatistic,
}

impl ComponentKind {
    /// Output is a square matrix fed to reducers
    pub fn produces_matrix(&self) -> bool {
        matches!(self, ComponentKind::Statistic | ComponentKind::PairwiseStatistic(_))
    }

    /// Callable is invoked once per vector pair
    pub fn consumes_pair(&self) -> bool {
        matches!(self, ComponentKind::PairwiseStatistic(_))
    }

    /// Output is a final vector or scalar
    pub fn produces_reduced_vector(&self) -> bool {
        matches!(self, ComponentKind::Reducer | ComponentKind::ReducedStatistic)
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ComponentKind::Statistic => "statistic",
            ComponentKind::PairwiseStatistic(_) => "pairwise statistic",
            ComponentKind::Reducer => "reducer",
            ComponentKind::ReducedStatistic => "reduced statistic",
        };
        f.write_str(name)
    }
}

/// Upper bound on a declared output width
pub const MAX_OUTPUT_WIDTH: usize = 1 << 20;

/// Declared width of a reducer or reduced statistic output
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputArity {
    Scalar,
    Vector(usize),
    /// Integer value, or list length, of the named parameter
    FromParam(String),
    /// Unknown until the component runs
    Dynamic,
}

impl OutputArity {
    /// Expected number of output elements for resolved parameters
    pub fn resolve(&self, params: &Params) -> Option<usize> {
        match self {
            OutputArity::Scalar => Some(1),
            OutputArity::Vector(n) => Some(*n),
            OutputArity::FromParam(name) => {
                let value = params.get(name)?;
                value
                    .as_u64()
                    .and_then(|n| usize::try_from(n).ok())
                    .or_else(|| value.as_sequence().map(Vec::len))
            }
            OutputArity::Dynamic => None,
        }
    }
}

/// Immutable descriptor of a registered component
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentDefinition {
    pub name: String,
    pub identifier: String,
    pub labels: BTreeSet<String>,
    pub kind: ComponentKind,
    pub schema: ParamSchema,
    pub output: OutputArity,
}

impl ComponentDefinition {
    pub fn new(name: impl Into<String>, identifier: impl Into<String>, kind: ComponentKind) -> Self {
        Self {
            name: name.into(),
            identifier: identifier.into(),
            labels: BTreeSet::new(),
            kind,
            schema: ParamSchema::default(),
            output: OutputArity::Scalar,
        }
    }

    pub fn with_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.labels.extend(labels.into_iter().map(Into::into));
        self
    }

    pub fn with_schema(mut self, schema: ParamSchema) -> Self {
        self.schema = schema;
        self
    }

    pub fn with_output(mut self, output: OutputArity) -> Self {
        self.output = output;
        self
    }

    pub fn has_label(&self, label: &str) -> bool {
        self.labels.contains(label)
    }
}

/// Callable behind a component, one variant per callable shape
#[derive(Clone)]
pub enum Implementation {
    Statistic(StatisticFn),
    Pairwise(PairwiseFn),
    Reducer(ReducerFn),
    ReducedStatistic(ReducedStatisticFn),
}

impl Implementation {
    pub fn statistic<F>(f: F) -> Self
    where
        F: Fn(&DMatrix<f64>, &Params) -> ComponentResult<DMatrix<f64>> + Send + Sync + 'static,
    {
        Implementation::Statistic(Arc::new(f))
    }

    pub fn pairwise<F>(f: F) -> Self
    where
        F: Fn(&[f64], &[f64], &Params) -> ComponentResult<f64> + Send + Sync + 'static,
    {
        Implementation::Pairwise(Arc::new(f))
    }

    pub fn reducer<F>(f: F) -> Self
    where
        F: Fn(&DMatrix<f64>, &Params) -> ComponentResult<ComponentOutput> + Send + Sync + 'static,
    {
        Implementation::Reducer(Arc::new(f))
    }

    pub fn reduced_statistic<F>(f: F) -> Self
    where
        F: Fn(&DMatrix<f64>, &Params) -> ComponentResult<ComponentOutput> + Send + Sync + 'static,
    {
        Implementation::ReducedStatistic(Arc::new(f))
    }

    /// Whether this callable has the shape the kind requires
    pub fn matches(&self, kind: &ComponentKind) -> bool {
        matches!(
            (self, kind),
            (Implementation::Statistic(_), ComponentKind::Statistic)
                | (Implementation::Pairwise(_), ComponentKind::PairwiseStatistic(_))
                | (Implementation::Reducer(_), ComponentKind::Reducer)
                | (Implementation::ReducedStatistic(_), ComponentKind::ReducedStatistic)
        )
    }

    fn shape(&self) -> &'static str {
        match self {
            Implementation::Statistic(_) => "statistic",
            Implementation::Pairwise(_) => "pairwise",
            Implementation::Reducer(_) => "reducer",
            Implementation::ReducedStatistic(_) => "reduced statistic",
        }
    }
}

impl fmt::Debug for Implementation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Implementation::<{}>", self.shape())
    }
}
