/// Number of independent sequences processed in parallel per training step.
pub const BATCH_SIZE: i64 = 64;
/// Maximum context length the model can condition on.
pub const BLOCK_SIZE: i64 = 256;
/// The number of dimensions in the embedding space.
pub const N_EMBD: i64 = 384;
/// The number of "heads" (attention passes) per block.
pub const N_HEAD: i64 = 6;
/// Number of stacked transformer blocks.
pub const N_LAYER: i64 = 6;
/// Dropout probability applied during training.
pub const DROPOUT: f64 = 0.2;
/// Expansion factor of the feed-forward hidden layer.
pub const FFN_MULTIPLIER: i64 = 4;
/// Standard deviation of the normal distribution used for linear and embedding weights.
pub const INIT_STD: f64 = 0.02;

pub const MAX_ITERS: usize = 5000;
pub const EVAL_INTERVAL: usize = 500;
/// Batches averaged per split when estimating loss.
pub const EVAL_ITERS: usize = 200;
pub const LEARNING_RATE: f64 = 3e-4;
pub const SEED: u64 = 1337;

/// The fraction of the corpus used for training; the rest is used for validation.
pub const TRAIN_SPLIT: f64 = 0.9;

/// Characters sampled after training.
pub const MAX_NEW_TOKENS: usize = 500;
pub const TEMPERATURE: f64 = 1.0;
