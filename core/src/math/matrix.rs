use ndarray::{Array1, Array2, ArrayView1};

pub struct MatrixHelper;

impl MatrixHelper {
    /// Dense layer `weights · input + bias`.
    pub fn affine(weights: &Array2<f64>, input: ArrayView1<f64>, bias: &Array1<f64>) -> Array1<f64> {
        weights.dot(&input) + bias
    }

    pub fn relu(values: Array1<f64>) -> Array1<f64> {
        values.mapv(|v| v.max(0.0))
    }

    pub fn sigmoid(value: f64) -> f64 {
        1.0 / (1.0 + (-value).exp())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn affine_then_relu_zeroes_negative_units() {
        let weights = array![[1.0, 0.0], [0.0, -1.0]];
        let bias = array![0.5, 0.0];
        let input = array![2.0, 3.0];
        let out = MatrixHelper::relu(MatrixHelper::affine(&weights, input.view(), &bias));
        assert_eq!(out, array![2.5, 0.0]);
    }

    #[test]
    fn sigmoid_is_centered() {
        assert_eq!(MatrixHelper::sigmoid(0.0), 0.5);
        assert!(MatrixHelper::sigmoid(40.0) <= 1.0);
    }
}
