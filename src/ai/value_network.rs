use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::nn::{Linear, LinearConfig, Relu};
use burn::prelude::*;

use crate::ai::state_encoding::ENCODING_CHANNELS;

/// Value network mapping a one-hot board encoding to one score per tilt
/// direction.
///
/// ```text
/// Input:  [batch, 18, 4, 4]
/// Conv1:  18 -> 64 channels, 2x2 kernel =>  [batch, 64, 3, 3]
/// ReLU
/// Conv2:  64 -> 64 channels, 2x2 kernel =>  [batch, 64, 2, 2]
/// ReLU
/// Flatten: 64*2*2 = 256
/// FC1:    256 -> 128, ReLU
/// FC2:    128 -> 4  (action values, one per direction)
/// ```
#[derive(Module, Debug)]
pub struct ValueNetwork<B: Backend> {
    conv1: Conv2d<B>,
    conv2: Conv2d<B>,
    fc1: Linear<B>,
    fc2: Linear<B>,
    relu: Relu,
}

#[derive(Config, Debug)]
pub struct ValueNetworkConfig {}

impl ValueNetworkConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> ValueNetwork<B> {
        ValueNetwork {
            conv1: Conv2dConfig::new([ENCODING_CHANNELS, 64], [2, 2]).init(device),
            conv2: Conv2dConfig::new([64, 64], [2, 2]).init(device),
            fc1: LinearConfig::new(256, 128).init(device),
            fc2: LinearConfig::new(128, 4).init(device),
            relu: Relu::new(),
        }
    }
}

impl<B: Backend> ValueNetwork<B> {
    /// Forward pass: input [batch, 18, 4, 4] -> output [batch, 4].
    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 2> {
        let batch_size = input.dims()[0];

        let x = self.relu.forward(self.conv1.forward(input));
        let x = self.relu.forward(self.conv2.forward(x));
        let x = x.reshape([batch_size as i32, 256]);
        let x = self.relu.forward(self.fc1.forward(x));
        self.fc2.forward(x)
    }
}
