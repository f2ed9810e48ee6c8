use tch::{
    Device,
    Kind::{Bool, Float},
    Tensor,
    nn::{self, Linear, ModuleT},
};

use crate::{
    config::ModelConfig,
    error::ModelError,
    layers::{linear, linear_no_bias},
};

/// Lower-triangular `[block_size, block_size]` boolean mask: entry `(i, j)` is true when
/// position `i` may attend to position `j`, i.e. `j <= i`.
pub fn causal_mask(block_size: i64, device: Device) -> Tensor {
    Tensor::ones([block_size, block_size], (Bool, device)).tril(0)
}

/// Single-head causal self-attention.
/// Takes an input of shape [batch_size, seq_len, n_embd] and produces
/// an output of [batch_size, seq_len, head_size], where each position's output is a weighted
/// combination of the values at that position and the ones before it.
#[derive(Debug)]
pub struct Head {
    query: Linear, // Projects n_embd -> head_size
    key: Linear,   // Projects n_embd -> head_size
    value: Linear, // Projects n_embd -> head_size
    tril: Tensor,
    head_size: i64,
    dropout: f64,
}

impl Head {
    /// `tril` is the block-wide causal mask, shared read-only by every head of a block.
    pub fn new(vs: &nn::Path, n_embd: i64, head_size: i64, dropout: f64, tril: Tensor) -> Self {
        let query = linear_no_bias(vs / "query", n_embd, head_size);
        let key = linear_no_bias(vs / "key", n_embd, head_size);
        let value = linear_no_bias(vs / "value", n_embd, head_size);
        Head {
            query,
            key,
            value,
            tril,
            head_size,
            dropout,
        }
    }

    /// Attention weights of shape [batch, seq_len, seq_len]. Row `i` is a probability
    /// distribution over positions `0..=i`; entries above the diagonal are exactly zero.
    pub fn attention_weights(&self, xs: &Tensor, train: bool) -> Tensor {
        let seq_len = xs.size()[1];
        // [batch, seq_len, head_size]
        let q = xs.apply(&self.query);
        let k = xs.apply(&self.key);
        // [batch, seq_len, seq_len], scaled by 1/sqrt(head_size)
        let scores = q.matmul(&k.transpose(-2, -1)) / (self.head_size as f64).sqrt();
        // The stored mask spans block_size; only its leading seq_len x seq_len corner applies.
        let visible = self.tril.narrow(0, 0, seq_len).narrow(1, 0, seq_len);
        scores
            .masked_fill(&visible.logical_not(), f64::NEG_INFINITY)
            .softmax(-1, Float)
            .dropout(self.dropout, train)
    }
}

impl ModuleT for Head {
    fn forward_t(&self, xs: &Tensor, train: bool) -> Tensor {
        let v = xs.apply(&self.value);
        self.attention_weights(xs, train).matmul(&v)
    }
}

/// Several heads over the same input, concatenated back to `n_embd` and mixed by an
/// output projection.
#[derive(Debug)]
pub struct MultiHeadAttention {
    heads: Vec<Head>,
    output_projection: Linear,
    dropout: f64,
}

impl MultiHeadAttention {
    pub fn new(vs: &nn::Path, config: &ModelConfig) -> Result<Self, ModelError> {
        let head_size = config.head_size()?;
        let tril = causal_mask(config.block_size, vs.device());
        let heads_vs = vs / "heads";
        let heads = (0..config.n_head)
            .map(|i| {
                Head::new(
                    &(&heads_vs / i),
                    config.n_embd,
                    head_size,
                    config.dropout,
                    tril.shallow_clone(),
                )
            })
            .collect();
        let output_projection = linear(vs / "output", head_size * config.n_head, config.n_embd);
        Ok(MultiHeadAttention {
            heads,
            output_projection,
            dropout: config.dropout,
        })
    }

    pub fn heads(&self) -> &[Head] {
        &self.heads
    }
}

impl ModuleT for MultiHeadAttention {
    fn forward_t(&self, xs: &Tensor, train: bool) -> Tensor {
        // Vec of [batch, seq_len, head_size]
        let outputs: Vec<Tensor> = self
            .heads
            .iter()
            .map(|head| head.forward_t(xs, train))
            .collect();
        // [batch, seq_len, head_size * n_head]
        Tensor::cat(&outputs, -1)
            .apply(&self.output_projection)
            .dropout(self.dropout, train)
    }
}
