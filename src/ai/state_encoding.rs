use burn::prelude::*;
use burn::tensor::TensorData;

use crate::game::{Board, CELL_COUNT, GRID_SIZE, MAX_EXPONENT};

/// One channel per tile exponent; channel 0 marks empty cells.
pub const ENCODING_CHANNELS: usize = MAX_EXPONENT as usize + 1;
/// Length of a flat board encoding.
pub const ENCODED_SIZE: usize = ENCODING_CHANNELS * CELL_COUNT;

/// Produce the flat one-hot encoding of a board: channel-major
/// `[channel][y][x]`, 1.0 in the channel matching each cell's exponent.
pub fn encode_board_flat(board: &Board) -> Vec<f32> {
    let mut data = vec![0.0f32; ENCODED_SIZE];
    let grid = board.value_grid();
    for y in 0..GRID_SIZE {
        for x in 0..GRID_SIZE {
            let value = grid[y][x];
            let channel = if value == 0 {
                0
            } else {
                value.trailing_zeros() as usize
            };
            data[channel * CELL_COUNT + y * GRID_SIZE + x] = 1.0;
        }
    }
    data
}

/// Encode a single board as a tensor of shape `[CHANNELS, 4, 4]`.
pub fn encode_board<B: Backend>(board: &Board, device: &B::Device) -> Tensor<B, 3> {
    let data = encode_board_flat(board);
    Tensor::<B, 1>::from_data(TensorData::from(data.as_slice()), device).reshape([
        ENCODING_CHANNELS as i32,
        GRID_SIZE as i32,
        GRID_SIZE as i32,
    ])
}

/// Assemble stored flat encodings into a batched tensor of shape
/// `[batch, CHANNELS, 4, 4]`.
pub fn encode_batch<B: Backend>(encodings: &[Vec<f32>], device: &B::Device) -> Tensor<B, 4> {
    let batch_size = encodings.len();
    let mut flat = Vec::with_capacity(batch_size * ENCODED_SIZE);
    for encoding in encodings {
        debug_assert_eq!(encoding.len(), ENCODED_SIZE);
        flat.extend_from_slice(encoding);
    }
    Tensor::<B, 1>::from_data(TensorData::from(flat.as_slice()), device).reshape([
        batch_size as i32,
        ENCODING_CHANNELS as i32,
        GRID_SIZE as i32,
        GRID_SIZE as i32,
    ])
}
