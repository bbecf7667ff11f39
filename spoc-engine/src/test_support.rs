// Test Support
// Small registry of working components and a sample dataset shared by unit tests

use crate::dataset::Dataset;
use crate::registry::{
    ComponentDefinition, ComponentKind, ComponentOutput, ComponentResult, Implementation, OutputArity,
    PairwiseDim, PairwiseSpec, ParamSchema, ParamSpec, ParamType, Params, Registry,
};

use nalgebra::DMatrix;
use std::sync::Arc;

/// 4 observations x 3 variables
pub(crate) fn sample_dataset() -> Arc<Dataset> {
    let rows = [
        [1.0, 2.0, 0.5],
        [2.0, 1.0, 1.5],
        [4.0, 3.0, 1.0],
        [3.0, 5.0, 2.5],
    ];
    Arc::new(Dataset::from_rows(&rows).unwrap().with_name("sample"))
}

fn covariance(data: &DMatrix<f64>, _: &Params) -> ComponentResult<DMatrix<f64>> {
    let n = data.nrows();
    if n < 2 {
        return Err("covariance needs at least two observations".into());
    }
    let means = data.row_mean();
    let mut centred = data.clone();
    for (j, mut column) in centred.column_iter_mut().enumerate() {
        column.add_scalar_mut(-means[j]);
    }
    Ok(centred.transpose() * centred / (n as f64 - 1.0))
}

/// Register a sample-covariance statistic at `path`
pub(crate) fn register_covariance(registry: &mut Registry, path: &str) {
    let name = path.rsplit('.').next().unwrap_or(path);
    registry
        .register(
            path.parse().unwrap(),
            ComponentDefinition::new(name, name.to_lowercase(), ComponentKind::Statistic)
                .with_labels(["linear", "dependence"]),
            Implementation::statistic(covariance),
        )
        .unwrap();
}

/// Registry with one component of every kind
pub(crate) fn demo_registry() -> Registry {
    let mut registry = Registry::new();
    register_covariance(&mut registry, "stats.Cov");

    registry
        .register(
            "stats.Dist".parse().unwrap(),
            ComponentDefinition::new(
                "Distance",
                "dist",
                ComponentKind::PairwiseStatistic(PairwiseSpec::new(PairwiseDim::Observations)),
            )
            .with_labels(["distance"]),
            Implementation::pairwise(|a: &[f64], b: &[f64], _: &Params| {
                Ok(a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum::<f64>().sqrt())
            }),
        )
        .unwrap();

    registry
        .register(
            "red.Trace".parse().unwrap(),
            ComponentDefinition::new("Trace", "trace", ComponentKind::Reducer),
            Implementation::reducer(|m: &DMatrix<f64>, _: &Params| Ok(ComponentOutput::Scalar(m.trace()))),
        )
        .unwrap();

    registry
        .register(
            "red.Diag".parse().unwrap(),
            ComponentDefinition::new("Diagonal", "diag", ComponentKind::Reducer)
                .with_schema(ParamSchema::new().with(ParamSpec::optional("num_values", ParamType::Integer, 2)))
                .with_output(OutputArity::FromParam("num_values".to_string())),
            Implementation::reducer(|m: &DMatrix<f64>, params: &Params| {
                let k = params.get_usize("num_values").unwrap_or(2);
                if k > m.nrows() {
                    return Err(format!("asked for {} diagonal values of a {} x {} matrix", k, m.nrows(), m.ncols()).into());
                }
                Ok(ComponentOutput::Vector(m.diagonal().iter().take(k).copied().collect()))
            }),
        )
        .unwrap();

    registry
        .register(
            "rstats.Means".parse().unwrap(),
            ComponentDefinition::new("Means", "means", ComponentKind::ReducedStatistic)
                .with_output(OutputArity::Dynamic),
            Implementation::reduced_statistic(|data: &DMatrix<f64>, _: &Params| {
                Ok(ComponentOutput::Vector(data.row_mean().iter().copied().collect()))
            }),
        )
        .unwrap();

    registry
}
