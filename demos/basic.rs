//! Basic usage of the recurrent layers
//!
//! Builds an RNN, an LSTM and a GRU, runs them over random sequences and
//! prints the resulting shapes and weight layout.

use burn::backend::NdArray;
use burn::tensor::{Distribution, Tensor};
use recurrent::prelude::*;

fn main() -> Result<(), RnnError> {
    println!("=== Recurrent Basic Example ===\n");

    type Backend = NdArray<f32>;
    let device = Default::default();

    // Example 1: two-layer tanh RNN, sequence-first
    println!("Example 1: Elman RNN");
    let rnn = RnnConfig::new(8, 16)
        .with_num_layers(2)
        .init::<Backend>(&device)?;
    println!("  {}", rnn.base().summary());

    // Input shape: [seq=10, batch=4, features=8]
    let input = Tensor::<Backend, 3>::random(
        [10, 4, 8],
        Distribution::Uniform(-1.0, 1.0),
        &device,
    );
    let (output, h_n) = rnn.forward(input, None)?;
    println!("  Output shape: {:?}", output.dims());
    println!("  h_n shape:    {:?}", h_n.dims());
    println!();

    // Example 2: bidirectional LSTM, batch-first, carrying state between chunks
    println!("Example 2: Bidirectional LSTM with carried state");
    let lstm = LstmConfig::new(8, 12)
        .with_bidirectional(true)
        .with_batch_first(true)
        .init::<Backend>(&device)?;
    println!("  {}", lstm.base().summary());

    let chunk = Tensor::<Backend, 3>::random([2, 5, 8], Distribution::Default, &device);
    let (output, state) = lstm.forward(chunk.clone(), None)?;
    let (_, (h_n, c_n)) = lstm.forward(chunk, Some(state))?;
    println!("  Output shape: {:?}", output.dims());
    println!("  h_n shape:    {:?}", h_n.dims());
    println!("  c_n shape:    {:?}", c_n.dims());
    println!();

    // Example 3: GRU weight layout
    println!("Example 3: GRU weights");
    let gru = GruConfig::new(8, 6)
        .with_num_layers(2)
        .init::<Backend>(&device)?;
    for (group, weights) in gru.base().all_weights().iter().enumerate() {
        println!("  group {group}:");
        for (name, weight) in weights {
            println!("    {name:<14} {:?}", weight.dims());
        }
    }

    Ok(())
}
