use tch::{
    Kind, Tensor,
    nn::{self, Embedding, LayerNorm, Linear},
};

use crate::{
    config::ModelConfig,
    error::ModelError,
    layers::{block::Block, embedding, linear},
};

#[derive(Debug)]
struct Embeddings {
    token: Embedding,
    position: Embedding,
}

impl Embeddings {
    fn new(vs: &nn::Path, config: &ModelConfig) -> Self {
        Embeddings {
            token: embedding(vs / "token", config.vocab_size, config.n_embd),
            position: embedding(vs / "position", config.block_size, config.n_embd),
        }
    }

    /// Takes a tensor of token IDs with shape `[batch_size, seq_len]` and returns
    /// a tensor of shape `[batch_size, seq_len, n_embd]` where each token ID
    /// has been replaced by the sum of its token embedding and its position embedding.
    fn forward(&self, input: &Tensor) -> Tensor {
        let seq_len = input.size()[1];
        // [batch_size, seq_len, n_embd]
        let token_embeds = input.apply(&self.token);
        // [seq_len, n_embd], broadcast over the batch
        let position_embeds = Tensor::arange(seq_len, (Kind::Int64, input.device()))
            .apply(&self.position);
        token_embeds + position_embeds
    }
}

/// Decoder-only character language model: embeddings, a stack of transformer blocks, a
/// final layer norm and a linear head over the vocabulary.
#[derive(Debug)]
pub struct GptLanguageModel {
    embeddings: Embeddings,
    blocks: Vec<Block>,
    final_norm: LayerNorm,
    lm_head: Linear,
    config: ModelConfig,
}

impl GptLanguageModel {
    /// Registers every parameter under `vs`. Fails if the configuration is invalid.
    pub fn new(vs: &nn::Path, config: ModelConfig) -> Result<Self, ModelError> {
        config.validate()?;
        let embeddings = Embeddings::new(&(vs / "embeddings"), &config);
        let blocks_vs = vs / "blocks";
        let blocks = (0..config.n_layer)
            .map(|i| Block::new(&(&blocks_vs / i), &config))
            .collect::<Result<Vec<_>, _>>()?;
        let final_norm = nn::layer_norm(vs / "ln_f", vec![config.n_embd], Default::default());
        let lm_head = linear(vs / "lm_head", config.n_embd, config.vocab_size);
        Ok(GptLanguageModel {
            embeddings,
            blocks,
            final_norm,
            lm_head,
            config,
        })
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn block_size(&self) -> i64 {
        self.config.block_size
    }

    /// Runs the model over `tokens` of shape `[batch, seq_len]`.
    ///
    /// Returns logits of shape `[batch, seq_len, vocab_size]` and, when `targets` (same
    /// shape as `tokens`) are given, the mean cross-entropy over every position. Sequences
    /// longer than the block size are rejected, never truncated.
    pub fn forward(
        &self,
        tokens: &Tensor,
        targets: Option<&Tensor>,
        train: bool,
    ) -> Result<(Tensor, Option<Tensor>), ModelError> {
        let size = tokens.size();
        let &[batch, seq_len] = size.as_slice() else {
            return Err(ModelError::ShapeMismatch(format!(
                "tokens must be [batch, seq_len], got {:?}",
                size
            )));
        };
        if batch == 0 || seq_len == 0 {
            return Err(ModelError::ShapeMismatch(format!(
                "tokens must be non-empty, got {:?}",
                size
            )));
        }
        if seq_len > self.config.block_size {
            return Err(ModelError::ContextOverflow {
                length: seq_len,
                block_size: self.config.block_size,
            });
        }
        if let Some(targets) = targets {
            if targets.size() != size {
                return Err(ModelError::ShapeMismatch(format!(
                    "targets {:?} do not match tokens {:?}",
                    targets.size(),
                    size
                )));
            }
        }

        let mut xs = self.embeddings.forward(tokens);
        for block in &self.blocks {
            xs = xs.apply_t(block, train);
        }
        // [batch, seq_len, vocab_size]
        let logits = xs.apply(&self.final_norm).apply(&self.lm_head);

        let loss = targets.map(|targets| {
            logits
                .reshape([batch * seq_len, self.config.vocab_size])
                .cross_entropy_for_logits(&targets.reshape([batch * seq_len]))
        });
        Ok((logits, loss))
    }
}
