use ndarray::{Array2, array};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DatasetError {
    #[error("labels must be a [{rows} x 1] column, found {found:?}")]
    ShapeMismatch { rows: usize, found: (usize, usize) },

    #[error("a training batch needs at least one example")]
    Empty,
}

// A full batch of training examples. Each row of inputs is one example, and the matching row of
// labels is the single value the network should output for it.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingBatch {
    // [batch_size x feature_count]
    pub inputs: Array2<f64>,
    // [batch_size x 1]
    pub labels: Array2<f64>,
}

impl TrainingBatch {
    pub fn new(inputs: Array2<f64>, labels: Array2<f64>) -> Result<TrainingBatch, DatasetError> {
        if inputs.nrows() == 0 {
            return Err(DatasetError::Empty);
        }
        if labels.dim() != (inputs.nrows(), 1) {
            return Err(DatasetError::ShapeMismatch {
                rows: inputs.nrows(),
                found: labels.dim(),
            });
        }

        Ok(TrainingBatch { inputs, labels })
    }

    // The XOR of the first two features. The third feature is always 1.0 and stands in for the
    // bias the network does not otherwise have.
    pub fn xor() -> TrainingBatch {
        TrainingBatch {
            inputs: array![
                [0.0, 0.0, 1.0],
                [0.0, 1.0, 1.0],
                [1.0, 0.0, 1.0],
                [1.0, 1.0, 1.0]
            ],
            labels: array![[0.0], [1.0], [1.0], [0.0]],
        }
    }

    pub fn len(&self) -> usize {
        self.inputs.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.inputs.nrows() == 0
    }

    pub fn feature_count(&self) -> usize {
        self.inputs.ncols()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn xor_batch_has_four_examples_of_three_features() {
        let batch = TrainingBatch::xor();

        assert_eq!(batch.len(), 4);
        assert_eq!(batch.feature_count(), 3);
        assert!(!batch.is_empty());
        assert_eq!(TrainingBatch::new(batch.inputs.clone(), batch.labels.clone()), Ok(batch));
    }

    #[test]
    fn labels_must_be_one_column_per_example() {
        let inputs = Array2::zeros((4, 3));

        assert_eq!(
            TrainingBatch::new(inputs.clone(), Array2::zeros((3, 1))),
            Err(DatasetError::ShapeMismatch {
                rows: 4,
                found: (3, 1)
            })
        );
        assert_eq!(
            TrainingBatch::new(inputs, Array2::zeros((4, 2))),
            Err(DatasetError::ShapeMismatch {
                rows: 4,
                found: (4, 2)
            })
        );
        assert_eq!(
            TrainingBatch::new(Array2::zeros((0, 3)), Array2::zeros((0, 1))),
            Err(DatasetError::Empty)
        );
    }
}
