//! Binary health classifier
//!
//! A small feed-forward network over the two health features, run as a
//! `burn` module on the ndarray backend. Weights are loaded from JSON:
//!
//! ```json
//! {"layers": [{"weights": [[0.1, 0.2]], "bias": [0.0], "activation": "sigmoid"}]}
//! ```
//!
//! `weights` holds one row per output neuron.

use crate::{HomeError, Result};
use burn::backend::ndarray::{NdArray, NdArrayDevice};
use burn::module::{Module, Param};
use burn::nn::{Linear, LinearConfig};
use burn::tensor::{activation, backend::Backend, Tensor, TensorData};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use tracing::{debug, info};

/// Scores at or above this value are abnormal
pub const ABNORMAL_THRESHOLD: f32 = 0.5;

/// Number of input features
pub const INPUT_DIM: usize = 2;

type Cpu = NdArray<f32>;

/// Classifier outcome
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HealthStatus {
    Normal,
    Abnormal,
}

impl HealthStatus {
    pub fn from_score(score: f32) -> Self {
        if score < ABNORMAL_THRESHOLD {
            HealthStatus::Normal
        } else {
            HealthStatus::Abnormal
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HealthStatus::Normal => f.write_str("Normal"),
            HealthStatus::Abnormal => f.write_str("Abnormal"),
        }
    }
}

/// Binary predictor over the health features
pub trait HealthClassifier {
    /// Probability in [0, 1] that the features are abnormal
    fn predict(&mut self, features: [f32; INPUT_DIM]) -> Result<f32>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    Relu,
    Sigmoid,
    Linear,
}

impl Activation {
    fn apply<B: Backend>(self, x: Tensor<B, 2>) -> Tensor<B, 2> {
        match self {
            Activation::Relu => activation::relu(x),
            Activation::Sigmoid => activation::sigmoid(x),
            Activation::Linear => x,
        }
    }
}

/// Fully connected layer as stored on disk
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DenseLayer {
    pub weights: Vec<Vec<f32>>,
    pub bias: Vec<f32>,
    pub activation: Activation,
}

impl DenseLayer {
    /// Copy the parameters into a `Linear` module
    fn to_linear<B: Backend>(&self, device: &B::Device) -> Linear<B> {
        let d_out = self.weights.len();
        let d_in = self.weights.first().map_or(0, Vec::len);

        // Rows are output neurons on disk; burn stores [d_in, d_out]
        let transposed: Vec<f32> = (0..d_in)
            .flat_map(|i| self.weights.iter().map(move |row| row[i]))
            .collect();

        let mut linear = LinearConfig::new(d_in, d_out).init(device);
        linear.weight = Param::from_tensor(Tensor::from_data(
            TensorData::new(transposed, [d_in, d_out]),
            device,
        ));
        linear.bias = Some(Param::from_tensor(Tensor::from_data(
            TensorData::new(self.bias.clone(), [d_out]),
            device,
        )));
        linear
    }
}

#[derive(Debug, Deserialize)]
struct NetworkFile {
    layers: Vec<DenseLayer>,
}

/// Stack of fully connected layers
#[derive(Module, Debug)]
pub struct DenseStack<B: Backend> {
    layers: Vec<Linear<B>>,
}

impl<B: Backend> DenseStack<B> {
    /// x: [batch, INPUT_DIM]
    pub fn forward(&self, x: Tensor<B, 2>, activations: &[Activation]) -> Tensor<B, 2> {
        self.layers
            .iter()
            .zip(activations)
            .fold(x, |h, (layer, act)| act.apply(layer.forward(h)))
    }
}

/// Health classifier running on the CPU backend
#[derive(Debug)]
pub struct DenseNetwork {
    model: DenseStack<Cpu>,
    activations: Vec<Activation>,
    shape: Vec<usize>,
    device: NdArrayDevice,
}

impl DenseNetwork {
    /// Build a network, checking that layer shapes chain from 2 inputs to 1 output
    pub fn from_layers(layers: Vec<DenseLayer>) -> Result<Self> {
        if layers.is_empty() {
            return Err(HomeError::ModelLoadError("Network has no layers".into()));
        }

        let mut input_dim = INPUT_DIM;
        let mut shape = vec![INPUT_DIM];
        for (index, layer) in layers.iter().enumerate() {
            if layer.weights.is_empty() {
                return Err(HomeError::ModelLoadError(format!(
                    "Layer {} has no neurons",
                    index
                )));
            }
            if layer.bias.len() != layer.weights.len() {
                return Err(HomeError::ModelLoadError(format!(
                    "Layer {} has {} neurons but {} biases",
                    index,
                    layer.weights.len(),
                    layer.bias.len()
                )));
            }
            if let Some(row) = layer.weights.iter().find(|row| row.len() != input_dim) {
                return Err(HomeError::ModelLoadError(format!(
                    "Layer {} expects {} inputs, found a row of {}",
                    index,
                    input_dim,
                    row.len()
                )));
            }
            let finite = layer
                .weights
                .iter()
                .flatten()
                .chain(&layer.bias)
                .all(|v| v.is_finite());
            if !finite {
                return Err(HomeError::ModelLoadError(format!(
                    "Layer {} contains non-finite parameters",
                    index
                )));
            }
            input_dim = layer.weights.len();
            shape.push(input_dim);
        }

        if input_dim != 1 {
            return Err(HomeError::ModelLoadError(format!(
                "Network must end in a single output, found {}",
                input_dim
            )));
        }

        let device = NdArrayDevice::default();
        let model = DenseStack {
            layers: layers.iter().map(|layer| layer.to_linear(&device)).collect(),
        };
        let activations = layers.iter().map(|layer| layer.activation).collect();

        Ok(Self {
            model,
            activations,
            shape,
            device,
        })
    }

    /// Load weights from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading health classifier from: {}", path.display());

        let content = std::fs::read_to_string(path).map_err(|e| {
            HomeError::ModelLoadError(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json(&content)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let file: NetworkFile = serde_json::from_str(json)
            .map_err(|e| HomeError::ModelLoadError(format!("Invalid classifier weights: {}", e)))?;
        let network = Self::from_layers(file.layers)?;
        debug!("Classifier layout: {:?}", network.shape());
        Ok(network)
    }

    /// Neuron count per layer, input dimension first
    pub fn shape(&self) -> Vec<usize> {
        self.shape.clone()
    }
}

impl HealthClassifier for DenseNetwork {
    fn predict(&mut self, features: [f32; INPUT_DIM]) -> Result<f32> {
        if features.iter().any(|f| !f.is_finite()) {
            return Err(HomeError::ClassifierError(format!(
                "Non-finite features: {:?}",
                features
            )));
        }

        let input = Tensor::<Cpu, 2>::from_data(
            TensorData::new(features.to_vec(), [1, INPUT_DIM]),
            &self.device,
        );
        let output = self
            .model
            .forward(input, &self.activations)
            .into_data()
            .to_vec::<f32>()
            .map_err(|e| HomeError::ClassifierError(format!("Unreadable output: {:?}", e)))?;

        match output.as_slice() {
            [score] if score.is_finite() && (0.0..=1.0).contains(score) => Ok(*score),
            other => Err(HomeError::ClassifierError(format!(
                "Score out of range: {:?}",
                other
            ))),
        }
    }
}
