// Shape Contracts
// Pairwise matrix assembly and output shape checks per component kind

use crate::address::SchemeAddress;
use crate::error::PipelineError;
use crate::registry::definition::PairwiseFn;
use crate::registry::{ComponentOutput, ComponentResult, PairwiseDim, PairwiseSpec, Params};

use nalgebra::DMatrix;

/// Assemble the square matrix of a pairwise statistic
pub fn pairwise_matrix(
    data: &DMatrix<f64>,
    spec: &PairwiseSpec,
    f: &PairwiseFn,
    params: &Params,
) -> ComponentResult<DMatrix<f64>> {
    let mut vectors: Vec<Vec<f64>> = match spec.dim {
        PairwiseDim::Observations => data.row_iter().map(|r| r.iter().copied().collect()).collect(),
        PairwiseDim::Variables => data.column_iter().map(|c| c.iter().copied().collect()).collect(),
    };
    if spec.ordered {
        for v in &mut vectors {
            v.sort_by(f64::total_cmp);
        }
    }

    let m = vectors.len();
    let mut out = DMatrix::zeros(m, m);
    for i in 0..m {
        let start = if spec.symmetric { i } else { 0 };
        for j in start..m {
            let value = f(&vectors[i], &vectors[j], params)?;
            out[(i, j)] = value;
            if spec.symmetric {
                out[(j, i)] = value;
            }
        }
    }
    Ok(out)
}

/// Statistic output must be a non-empty square matrix
pub fn check_statistic(component: &SchemeAddress, matrix: &DMatrix<f64>) -> Result<(), PipelineError> {
    if matrix.is_empty() || !matrix.is_square() {
        return Err(PipelineError::shape_mismatch(
            component,
            format!(
                "statistic must return a non-empty square matrix, got {} x {}",
                matrix.nrows(),
                matrix.ncols()
            ),
        ));
    }
    Ok(())
}

/// Reducer output must be a scalar or a vector smaller than its input
pub fn check_reduction(
    component: &SchemeAddress,
    input: &DMatrix<f64>,
    output: ComponentOutput,
) -> Result<Vec<f64>, PipelineError> {
    match &output {
        ComponentOutput::Matrix(m) => {
            return Err(PipelineError::shape_mismatch(
                component,
                format!("reducer returned a {} x {} matrix", m.nrows(), m.ncols()),
            ))
        }
        ComponentOutput::Vector(v) if v.is_empty() => {
            return Err(PipelineError::shape_mismatch(component, "reducer returned no values"))
        }
        ComponentOutput::Vector(v) if v.len() >= input.len() => {
            return Err(PipelineError::shape_mismatch(
                component,
                format!(
                    "reducer returned {} values for a {} x {} input",
                    v.len(),
                    input.nrows(),
                    input.ncols()
                ),
            ))
        }
        _ => {}
    }
    Ok(output.flatten())
}

/// Reduced statistic output, flattened row-major
pub fn check_reduced(component: &SchemeAddress, output: ComponentOutput) -> Result<Vec<f64>, PipelineError> {
    if output.is_empty() {
        return Err(PipelineError::shape_mismatch(component, "returned no values"));
    }
    Ok(output.flatten())
}

/// Values must match a declared output width
pub fn check_width(
    component: &SchemeAddress,
    expected: Option<usize>,
    values: Vec<f64>,
) -> Result<Vec<f64>, PipelineError> {
    match expected {
        Some(n) if n != values.len() => Err(PipelineError::shape_mismatch(
            component,
            format!("declared {} output values, returned {}", n, values.len()),
        )),
        _ => Ok(values),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn addr() -> SchemeAddress {
        "red.Test.x".parse().unwrap()
    }

    fn sample() -> DMatrix<f64> {
        DMatrix::from_row_slice(3, 2, &[3.0, 1.0, 1.0, 2.0, 2.0, 0.0])
    }

    #[test]
    fn test_pairwise_variables_symmetric() {
        let calls = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let dot: PairwiseFn = Arc::new(move |a: &[f64], b: &[f64], _: &Params| {
            counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(a.iter().zip(b).map(|(x, y)| x * y).sum())
        });

        let spec = PairwiseSpec::new(PairwiseDim::Variables);
        let m = pairwise_matrix(&sample(), &spec, &dot, &Params::new()).unwrap();

        assert_eq!(m.shape(), (2, 2));
        assert_eq!(m[(0, 1)], 5.0);
        assert_eq!(m[(1, 0)], 5.0);
        assert_eq!(m[(0, 0)], 14.0);
        // i <= j only
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 3);
    }

    #[test]
    fn test_pairwise_observations_ordered_asymmetric() {
        let first_gap: PairwiseFn = Arc::new(|a: &[f64], b: &[f64], _: &Params| Ok(b[0] - a[0]));
        let spec = PairwiseSpec::new(PairwiseDim::Observations)
            .ordered(true)
            .symmetric(false);
        let m = pairwise_matrix(&sample(), &spec, &first_gap, &Params::new()).unwrap();

        // Sorted rows: [1, 3], [1, 2], [0, 2]
        assert_eq!(m.shape(), (3, 3));
        assert_eq!(m[(0, 2)], -1.0);
        assert_eq!(m[(2, 0)], 1.0);
    }

    #[test]
    fn test_check_statistic() {
        assert!(check_statistic(&addr(), &DMatrix::zeros(2, 2)).is_ok());
        let err = check_statistic(&addr(), &DMatrix::zeros(2, 3)).unwrap_err();
        assert!(matches!(err, PipelineError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_check_reduction() {
        let input = DMatrix::<f64>::zeros(2, 2);
        assert_eq!(
            check_reduction(&addr(), &input, ComponentOutput::Scalar(1.0)).unwrap(),
            vec![1.0]
        );
        assert_eq!(
            check_reduction(&addr(), &input, ComponentOutput::Vector(vec![1.0, 2.0, 3.0])).unwrap(),
            vec![1.0, 2.0, 3.0]
        );
        assert!(check_reduction(&addr(), &input, ComponentOutput::Vector(vec![0.0; 4])).is_err());
        assert!(check_reduction(&addr(), &input, ComponentOutput::Vector(vec![])).is_err());
        assert!(check_reduction(&addr(), &input, ComponentOutput::Matrix(DMatrix::zeros(1, 1))).is_err());
    }

    #[test]
    fn test_check_width() {
        assert!(check_width(&addr(), Some(2), vec![1.0, 2.0]).is_ok());
        assert!(check_width(&addr(), None, vec![1.0, 2.0, 3.0]).is_ok());
        let err = check_width(&addr(), Some(1), vec![1.0, 2.0]).unwrap_err();
        assert!(err.to_string().contains("declared 1 output values, returned 2"));
    }
}
