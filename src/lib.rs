// A two-layer sigmoid network trained with full-batch gradient descent on the sum of squared
// errors, plus the pieces needed to drive a training run: a fixed training batch and a loss
// curve chart.

pub mod dataset;
pub mod network;
pub mod plot;

pub use dataset::{DatasetError, TrainingBatch};
pub use network::{
    ForwardPass, NetworkError, TrainingReport, TwoLayerSigmoidNetwork, compute_loss,
};
pub use plot::{ChartConfig, LossChart, PlotError};
