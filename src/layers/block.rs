use tch::{
    Tensor,
    nn::{self, LayerNorm, ModuleT},
};

use crate::{
    config::ModelConfig,
    error::ModelError,
    layers::{attention::MultiHeadAttention, feed_forward::FeedForward},
};

/// Pre-norm transformer block: attention then feed-forward, each wrapped as
/// `x + sublayer(layer_norm(x))`.
#[derive(Debug)]
pub struct Block {
    attention_norm: LayerNorm,
    attention: MultiHeadAttention,
    feed_forward_norm: LayerNorm,
    feed_forward: FeedForward,
}

impl Block {
    pub fn new(vs: &nn::Path, config: &ModelConfig) -> Result<Self, ModelError> {
        let n_embd = config.n_embd;
        Ok(Block {
            attention_norm: nn::layer_norm(vs / "ln_1", vec![n_embd], Default::default()),
            attention: MultiHeadAttention::new(&(vs / "attention"), config)?,
            feed_forward_norm: nn::layer_norm(vs / "ln_2", vec![n_embd], Default::default()),
            feed_forward: FeedForward::new(&(vs / "feed_forward"), n_embd, config.dropout),
        })
    }
}

impl ModuleT for Block {
    fn forward_t(&self, xs: &Tensor, train: bool) -> Tensor {
        let xs = xs + xs
            .apply(&self.attention_norm)
            .apply_t(&self.attention, train);
        &xs + xs
            .apply(&self.feed_forward_norm)
            .apply_t(&self.feed_forward, train)
    }
}
