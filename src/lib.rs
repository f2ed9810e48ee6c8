//! chargpt: a character-level GPT on libtorch.
//!
//! - [`tokenizer`] maps characters to ids and back
//! - [`dataset`] holds the encoded corpus and samples training windows
//! - [`layers`] and [`model`] define the decoder-only transformer
//! - [`train`] runs AdamW over the model's parameters
//! - [`generate`] samples continuations token by token

pub mod config;
pub mod constants;
pub mod dataset;
pub mod error;
pub mod generate;
pub mod layers;
pub mod model;
pub mod tokenizer;
pub mod train;

pub use config::{Config, ModelConfig, TrainConfig};
pub use error::ModelError;
pub use generate::Generator;
pub use model::GptLanguageModel;
pub use tokenizer::CharTokenizer;
pub use train::Trainer;
