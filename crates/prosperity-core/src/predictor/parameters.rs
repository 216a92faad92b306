//! Coefficients behind each prediction model
//!
//! Parameters sit behind [`ModelParameterStore`] so a training pipeline can supply
//! its own without touching the predictor.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ModelParameters {
    /// Intercept plus one weight per proxy, shared by linear and ensemble models
    Linear { intercept: f64, weights: Vec<f64> },
    /// One hidden unit per proxy: hidden_i = ReLU(input_weights_i · x_i)
    Network {
        input_weights: Vec<f64>,
        output_weights: Vec<f64>,
        output_bias: f64,
    },
}

impl ModelParameters {
    /// Number of proxy inputs these parameters expect
    pub fn arity(&self) -> Option<usize> {
        match self {
            ModelParameters::Linear { weights, .. } => Some(weights.len()),
            ModelParameters::Network {
                input_weights,
                output_weights,
                ..
            } => (input_weights.len() == output_weights.len()).then_some(input_weights.len()),
        }
    }
}

pub trait ModelParameterStore: Send + Sync {
    fn parameters(&self, indicator: &str) -> Option<ModelParameters>;
}

/// Fixed coefficients standing in for trained models
#[derive(Debug, Clone, Default)]
pub struct StaticParameterStore {
    parameters: HashMap<String, ModelParameters>,
}

impl StaticParameterStore {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn builtin() -> Self {
        let mut store = Self::empty();
        store.insert(
            "pm25_concentration",
            ModelParameters::Linear {
                intercept: 12.0,
                weights: vec![1.8, 0.000004, -0.9],
            },
        );
        store.insert(
            "green_area_per_capita",
            ModelParameters::Linear {
                intercept: 8.0,
                weights: vec![-0.001, 0.0003, 0.01],
            },
        );
        store.insert(
            "life_expectancy",
            ModelParameters::Network {
                input_weights: vec![0.0002, 0.15, 0.01, 0.08],
                output_weights: vec![1.0, 1.0, -1.0, 1.0],
                output_bias: 55.0,
            },
        );
        store.insert(
            "literacy_rate",
            ModelParameters::Linear {
                intercept: 40.0,
                weights: vec![3.5, 0.2, 0.0002],
            },
        );
        store.insert(
            "maternal_mortality",
            ModelParameters::Linear {
                intercept: 900.0,
                weights: vec![-8.0, -0.002, -2.0],
            },
        );
        store.insert(
            "unemployment_rate",
            ModelParameters::Linear {
                intercept: 18.0,
                weights: vec![-0.0001, -0.6],
            },
        );
        store
    }

    pub fn insert(&mut self, indicator: &str, parameters: ModelParameters) {
        self.parameters.insert(indicator.to_string(), parameters);
    }
}

impl ModelParameterStore for StaticParameterStore {
    fn parameters(&self, indicator: &str) -> Option<ModelParameters> {
        self.parameters.get(indicator).cloned()
    }
}
