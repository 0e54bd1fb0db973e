use crate::dataset::TrainingBatch;
use ndarray::Array2;
use ndarray_rand::{
    RandomExt,
    rand::Rng,
    rand_distr::StandardNormal,
};
use thiserror::Error;
use tracing::{debug, info};

// How often (in epochs) the training loop reports the current loss at debug level.
const LOG_INTERVAL: usize = 100;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum NetworkError {
    #[error("shape mismatch in {operation}: expected {expected:?}, found {found:?}")]
    ShapeMismatch {
        operation: &'static str,
        expected: (usize, usize),
        found: (usize, usize),
    },

    #[error("batch passed to {0} has no rows")]
    EmptyBatch(&'static str),

    #[error("invalid architecture: input size {input_size}, hidden size {hidden_size}")]
    InvalidArchitecture {
        input_size: usize,
        hidden_size: usize,
    },

    #[error("learning rate must be finite and positive, got {0}")]
    InvalidLearningRate(f64),

    #[error("training needs at least one epoch")]
    NoEpochs,
}

// Everything a forward pass produces. The hidden activation is handed back to the caller
// instead of being cached on the network, so backpropagate can only ever see the activation
// belonging to the predictions it is given.
#[derive(Debug, Clone, PartialEq)]
pub struct ForwardPass {
    // [batch_size x hidden_size]
    pub hidden_activation: Array2<f64>,
    // [batch_size x 1]
    pub predictions: Array2<f64>,
}

// The outcome of a training run: the loss of every epoch in order, and the predictions the
// network made on the last epoch, before that epoch's weight update.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingReport {
    pub loss_history: Vec<f64>,
    // [batch_size x 1]
    pub final_predictions: Array2<f64>,
}

// A feed-forward network with a single hidden layer, sigmoid activations on both layers, no
// biases and a single output neuron, trained against the sum of squared errors.
#[derive(Debug, Clone)]
pub struct TwoLayerSigmoidNetwork {
    input_size: usize,
    hidden_size: usize,
    learning_rate: f64,
    // [input_size x hidden_size]
    w1: Array2<f64>,
    // [hidden_size x 1]
    w2: Array2<f64>,
}

impl TwoLayerSigmoidNetwork {
    pub const DEFAULT_LEARNING_RATE: f64 = 1.0;

    pub fn new<R: Rng + ?Sized>(
        input_size: usize,
        hidden_size: usize,
        rng: &mut R,
    ) -> Result<TwoLayerSigmoidNetwork, NetworkError> {
        if input_size == 0 || hidden_size == 0 {
            return Err(NetworkError::InvalidArchitecture {
                input_size,
                hidden_size,
            });
        }

        // Both weight matrices are drawn from a standard normal distribution (mean 0, standard
        // deviation 1). W1 is filled first, then W2, so a seeded generator always yields the
        // same network for the same architecture.
        let w1 = Array2::random_using((input_size, hidden_size), StandardNormal, rng);
        let w2 = Array2::random_using((hidden_size, 1), StandardNormal, rng);

        Ok(TwoLayerSigmoidNetwork {
            input_size,
            hidden_size,
            learning_rate: Self::DEFAULT_LEARNING_RATE,
            w1,
            w2,
        })
    }

    // Build a network around known weights. The architecture is read off the weight shapes, so
    // W1 must be [input_size x hidden_size] and W2 must be [hidden_size x 1].
    pub fn from_weights(
        w1: Array2<f64>,
        w2: Array2<f64>,
    ) -> Result<TwoLayerSigmoidNetwork, NetworkError> {
        let (input_size, hidden_size) = w1.dim();
        if input_size == 0 || hidden_size == 0 {
            return Err(NetworkError::InvalidArchitecture {
                input_size,
                hidden_size,
            });
        }
        expect_shape("from_weights (w2)", &w2, (hidden_size, 1))?;

        Ok(TwoLayerSigmoidNetwork {
            input_size,
            hidden_size,
            learning_rate: Self::DEFAULT_LEARNING_RATE,
            w1,
            w2,
        })
    }

    pub fn with_learning_rate(
        mut self,
        learning_rate: f64,
    ) -> Result<TwoLayerSigmoidNetwork, NetworkError> {
        if !learning_rate.is_finite() || learning_rate <= 0.0 {
            return Err(NetworkError::InvalidLearningRate(learning_rate));
        }
        self.learning_rate = learning_rate;
        Ok(self)
    }

    pub fn input_size(&self) -> usize {
        self.input_size
    }

    pub fn hidden_size(&self) -> usize {
        self.hidden_size
    }

    pub fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    pub fn w1(&self) -> &Array2<f64> {
        &self.w1
    }

    pub fn w2(&self) -> &Array2<f64> {
        &self.w2
    }

    // Calculates the output of the network for a [batch_size x input_size] input, one row per
    // example. The predictions always come back as [batch_size x 1].
    pub fn forward(&self, x: &Array2<f64>) -> Result<ForwardPass, NetworkError> {
        if x.nrows() == 0 {
            return Err(NetworkError::EmptyBatch("forward"));
        }
        expect_shape("forward (x)", x, (x.nrows(), self.input_size))?;

        // a1 = σ(x.W1), then a2 = σ(a1.W2).
        let mut hidden_activation = x.dot(&self.w1);
        hidden_activation.mapv_inplace(sigmoid);

        let mut predictions = hidden_activation.dot(&self.w2);
        predictions.mapv_inplace(sigmoid);

        Ok(ForwardPass {
            hidden_activation,
            predictions,
        })
    }

    // Take one full-batch gradient descent step. The pass must come from forward(x) with this
    // same x, as the input itself is not retained anywhere.
    //
    // With s = σ, z1 = x.W1, a1 = s(z1), z2 = a1.W2, a2 = s(z2) and L = Σ(a2 - y)², the chain
    // rule gives:
    //   dL/dW2 = a1^T . (dL/da2 ⊙ da2/dz2)
    //   dL/dW1 = x^T . ((dL/da2 ⊙ da2/dz2) . W2^T ⊙ da1/dz1)
    // and both sigmoid derivatives are taken from the sigmoid outputs already held in the pass.
    pub fn backpropagate(
        &mut self,
        x: &Array2<f64>,
        labels: &Array2<f64>,
        pass: &ForwardPass,
    ) -> Result<(), NetworkError> {
        let batch_size = pass.predictions.nrows();
        if batch_size == 0 {
            return Err(NetworkError::EmptyBatch("backpropagate"));
        }

        // Every shape is checked up front so that a failing call leaves the weights untouched.
        expect_shape("backpropagate (predictions)", &pass.predictions, (batch_size, 1))?;
        expect_shape("backpropagate (labels)", labels, (batch_size, 1))?;
        expect_shape("backpropagate (x)", x, (batch_size, self.input_size))?;
        expect_shape(
            "backpropagate (hidden activation)",
            &pass.hidden_activation,
            (batch_size, self.hidden_size),
        )?;

        let predictions = &pass.predictions;
        let hidden_activation = &pass.hidden_activation;

        let dl_da2 = (predictions - labels) * 2.0;
        let da2_dz2 = predictions.mapv(sigmoid_derivative_from_output);
        let dl_dz2 = dl_da2 * &da2_dz2;
        let grad_w2 = hidden_activation.t().dot(&dl_dz2);

        let propagated = dl_dz2.dot(&self.w2.t());
        let da1_dz1 = hidden_activation.mapv(sigmoid_derivative_from_output);
        let dl_dz1 = propagated * &da1_dz1;
        let grad_w1 = x.t().dot(&dl_dz1);

        self.w1.scaled_add(-self.learning_rate, &grad_w1);
        self.w2.scaled_add(-self.learning_rate, &grad_w2);

        Ok(())
    }

    // Runs forward then backpropagate on the whole batch for the given number of epochs. Each
    // recorded loss belongs to the predictions made before that epoch's weight update.
    pub fn train(
        &mut self,
        batch: &TrainingBatch,
        epochs: usize,
    ) -> Result<TrainingReport, NetworkError> {
        if epochs == 0 {
            return Err(NetworkError::NoEpochs);
        }

        let mut loss_history = Vec::with_capacity(epochs);
        let mut final_predictions = None;

        for epoch in 0..epochs {
            let pass = self.forward(&batch.inputs)?;
            self.backpropagate(&batch.inputs, &batch.labels, &pass)?;

            let loss = compute_loss(&batch.labels, &pass.predictions)?;
            if epoch % LOG_INTERVAL == 0 {
                debug!(epoch, loss, "training");
            }
            loss_history.push(loss);
            final_predictions = Some(pass.predictions);
        }

        let final_loss = loss_history[epochs - 1];
        info!(epochs, final_loss, "training finished");

        Ok(TrainingReport {
            loss_history,
            // At least one epoch ran, so this is always set.
            final_predictions: final_predictions.ok_or(NetworkError::NoEpochs)?,
        })
    }
}

// Sum of squared differences over every element. This is deliberately a sum and not a mean, so
// it grows with the batch size.
pub fn compute_loss(labels: &Array2<f64>, predictions: &Array2<f64>) -> Result<f64, NetworkError> {
    expect_shape("compute_loss (predictions)", predictions, labels.dim())?;

    Ok(predictions
        .iter()
        .zip(labels.iter())
        .map(|(prediction, label)| (prediction - label).powi(2))
        .sum())
}

pub fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + f64::exp(-z))
}

// The derivative of the sigmoid, expressed in terms of its own output a = σ(z): σ'(z) = a(1 - a).
pub fn sigmoid_derivative_from_output(a: f64) -> f64 {
    a * (1.0 - a)
}

fn expect_shape(
    operation: &'static str,
    matrix: &Array2<f64>,
    expected: (usize, usize),
) -> Result<(), NetworkError> {
    let found = matrix.dim();
    if found == expected {
        Ok(())
    } else {
        Err(NetworkError::ShapeMismatch {
            operation,
            expected,
            found,
        })
    }
}
