//! # Regression Heads
//!
//! Fully connected heads fed with flattened feature maps.

use burn::{
    nn::{BatchNorm, BatchNormConfig, Linear, LinearConfig, Relu},
    prelude::*,
};

/// Configuration for the `RegressionHead` module.
///
/// The head is `Linear -> BN -> ReLU -> Linear -> BN -> ReLU -> Linear`.
#[derive(Config, Debug)]
pub struct RegressionHeadConfig {
    /// Flattened input features.
    pub input_dim: usize,
    /// Widths of the two hidden layers.
    pub hidden_dims: [usize; 2],
    /// Output features.
    pub output_dim: usize,
}

impl RegressionHeadConfig {
    /// Initializes a `RegressionHead` module.
    pub fn init<B: Backend>(&self, device: &Device<B>) -> RegressionHead<B> {
        let [hidden1, hidden2] = self.hidden_dims;

        RegressionHead {
            fc1: LinearConfig::new(self.input_dim, hidden1).init(device),
            bn1: BatchNormConfig::new(hidden1).init(device),
            fc2: LinearConfig::new(hidden1, hidden2).init(device),
            bn2: BatchNormConfig::new(hidden2).init(device),
            fc3: LinearConfig::new(hidden2, self.output_dim).init(device),
            relu: Relu::new(),
            input_dim: self.input_dim,
            output_dim: self.output_dim,
        }
    }
}

/// Two normalized hidden layers and a linear output.
#[derive(Module, Debug)]
pub struct RegressionHead<B: Backend> {
    fc1: Linear<B>,
    bn1: BatchNorm<B, 1>,
    fc2: Linear<B>,
    bn2: BatchNorm<B, 1>,
    fc3: Linear<B>,
    relu: Relu,
    input_dim: usize,
    output_dim: usize,
}

impl<B: Backend> RegressionHead<B> {
    /// Flattened feature count the head was built for.
    pub const fn input_dim(&self) -> usize {
        self.input_dim
    }

    /// Output features.
    pub const fn output_dim(&self) -> usize {
        self.output_dim
    }

    /// # Shapes
    ///
    /// - input: `[batch_size, input_dim]`
    /// - output: `[batch_size, output_dim]`
    pub fn forward(&self, x: Tensor<B, 2>) -> Tensor<B, 2> {
        let x = self.fc1.forward(x);
        let x = self.relu.forward(Self::normalize(&self.bn1, x));
        let x = self.fc2.forward(x);
        let x = self.relu.forward(Self::normalize(&self.bn2, x));
        self.fc3.forward(x)
    }

    // BatchNorm over features: [N, C] is viewed as [N, C, 1].
    fn normalize(bn: &BatchNorm<B, 1>, x: Tensor<B, 2>) -> Tensor<B, 2> {
        bn.forward(x.unsqueeze_dim::<3>(2)).squeeze::<2>(2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_regression_head_shapes() {
        let device = Default::default();
        let head = RegressionHeadConfig::new(48, [32, 16], 4).init::<TestBackend>(&device);

        assert_eq!(head.input_dim(), 48);
        assert_eq!(head.output_dim(), 4);

        let x = Tensor::<TestBackend, 2>::random(
            [3, 48],
            burn::tensor::Distribution::Normal(0.0, 1.0),
            &device,
        );
        assert_eq!(head.forward(x).dims(), [3, 4]);
    }
}
