//! Variable-length batches with packed sequences
//!
//! Packs a padded batch of sequences with different lengths, runs a GRU over
//! the packed data and unpacks the result again.

use burn::backend::NdArray;
use burn::tensor::{Distribution, Tensor};
use recurrent::prelude::*;

fn main() -> Result<(), RnnError> {
    println!("=== Packed Sequence Example ===\n");

    type Backend = NdArray<f32>;
    let device = Default::default();

    let gru = GruConfig::new(4, 8)
        .with_batch_first(true)
        .init::<Backend>(&device)?;

    // Three sequences padded to length 6: [batch=3, seq=6, features=4]
    let lengths = [3, 6, 2];
    let padded = Tensor::<Backend, 3>::random([3, 6, 4], Distribution::Default, &device);

    let packed = pack_padded_sequence(padded, &lengths, true, false)?;
    println!("Lengths:      {lengths:?}");
    println!("Batch sizes:  {:?}", packed.batch_sizes());
    println!("Packed data:  {:?}", packed.data().dims());

    let (output, h_n) = gru.forward_packed(&packed, None)?;
    let (unpacked, out_lengths) = pad_packed_sequence(&output, true)?;

    println!();
    println!("Output data:  {:?}", output.data().dims());
    println!("Unpacked:     {:?}", unpacked.dims());
    println!("Out lengths:  {out_lengths:?}");
    // h_n is in the original batch order: row b is the state after lengths[b] steps
    println!("h_n shape:    {:?}", h_n.dims());

    Ok(())
}
