//! Hyperparameters, fixed once a model or trainer is built.
//!
//! [`Config`] is the optional JSON file layer: every field may be omitted and falls back
//! to the defaults in [`crate::constants`]. The vocabulary size is never read from the
//! file; it comes from the corpus via [`ModelConfig::with_vocab_size`].

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::{constants, error::ModelError};

/// Shape of the language model. Changing any value requires building a new model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    #[serde(skip)]
    pub vocab_size: i64,
    pub block_size: i64,
    pub n_embd: i64,
    pub n_head: i64,
    pub n_layer: i64,
    pub dropout: f64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        ModelConfig {
            vocab_size: 0,
            block_size: constants::BLOCK_SIZE,
            n_embd: constants::N_EMBD,
            n_head: constants::N_HEAD,
            n_layer: constants::N_LAYER,
            dropout: constants::DROPOUT,
        }
    }
}

impl ModelConfig {
    pub fn with_vocab_size(mut self, vocab_size: i64) -> Self {
        self.vocab_size = vocab_size;
        self
    }

    /// Checks every size is positive, dropout lies in `[0, 1)` and heads split the
    /// embedding exactly.
    pub fn validate(&self) -> Result<(), ModelError> {
        let sizes = [
            ("vocab_size", self.vocab_size),
            ("block_size", self.block_size),
            ("n_embd", self.n_embd),
            ("n_head", self.n_head),
            ("n_layer", self.n_layer),
        ];
        for (name, value) in sizes {
            if value <= 0 {
                return Err(ModelError::Configuration(format!(
                    "{name} must be positive, got {value}"
                )));
            }
        }
        if !(0.0..1.0).contains(&self.dropout) {
            return Err(ModelError::Configuration(format!(
                "dropout must be in [0, 1), got {}",
                self.dropout
            )));
        }
        self.head_size().map(|_| ())
    }

    /// Width of a single attention head, `n_embd / n_head`.
    pub fn head_size(&self) -> Result<i64, ModelError> {
        if self.n_head <= 0 || self.n_embd % self.n_head != 0 {
            return Err(ModelError::Configuration(format!(
                "n_embd ({}) must be divisible by n_head ({})",
                self.n_embd, self.n_head
            )));
        }
        Ok(self.n_embd / self.n_head)
    }
}

/// Optimisation schedule for [`crate::train::Trainer`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
    pub batch_size: i64,
    pub max_iters: usize,
    pub eval_interval: usize,
    pub eval_iters: usize,
    pub learning_rate: f64,
    pub seed: u64,
    pub train_split: f64,
}

impl Default for TrainConfig {
    fn default() -> Self {
        TrainConfig {
            batch_size: constants::BATCH_SIZE,
            max_iters: constants::MAX_ITERS,
            eval_interval: constants::EVAL_INTERVAL,
            eval_iters: constants::EVAL_ITERS,
            learning_rate: constants::LEARNING_RATE,
            seed: constants::SEED,
            train_split: constants::TRAIN_SPLIT,
        }
    }
}

impl TrainConfig {
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.batch_size <= 0 {
            return Err(ModelError::Configuration(format!(
                "batch_size must be positive, got {}",
                self.batch_size
            )));
        }
        if self.eval_interval == 0 || self.eval_iters == 0 {
            return Err(ModelError::Configuration(
                "eval_interval and eval_iters must be positive".to_string(),
            ));
        }
        if !(self.train_split > 0.0 && self.train_split < 1.0) {
            return Err(ModelError::Configuration(format!(
                "train_split must be in (0, 1), got {}",
                self.train_split
            )));
        }
        Ok(())
    }
}

/// Sampling settings used after training.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SampleConfig {
    pub max_new_tokens: usize,
    pub temperature: f64,
}

impl Default for SampleConfig {
    fn default() -> Self {
        SampleConfig {
            max_new_tokens: constants::MAX_NEW_TOKENS,
            temperature: constants::TEMPERATURE,
        }
    }
}

/// Everything a run needs, as read from an optional JSON file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub model: ModelConfig,
    pub train: TrainConfig,
    pub sample: SampleConfig,
}

impl Config {
    pub fn from_json_file(path: &Path) -> Result<Config> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("failed to parse config file {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn small_config() -> ModelConfig {
        ModelConfig {
            vocab_size: 10,
            block_size: 8,
            n_embd: 64,
            n_head: 4,
            n_layer: 2,
            dropout: 0.0,
        }
    }

    #[test]
    fn test_head_size() {
        assert_eq!(small_config().head_size().unwrap(), 16);
    }

    #[test]
    fn test_indivisible_heads_rejected() {
        let config = ModelConfig {
            n_embd: 65,
            ..small_config()
        };
        assert!(matches!(
            config.validate(),
            Err(ModelError::Configuration(_))
        ));
    }

    #[test]
    fn test_dropout_range() {
        let config = ModelConfig {
            dropout: 1.0,
            ..small_config()
        };
        assert!(config.validate().is_err());
        let config = ModelConfig {
            dropout: 0.0,
            ..small_config()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_vocab_size_rejected() {
        let config = ModelConfig::default();
        assert!(config.validate().is_err());
        assert!(config.with_vocab_size(65).validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{ "model": {{ "n_embd": 32, "n_head": 4, "vocab_size": 999 }}, "train": {{ "max_iters": 10 }} }}"#
        )
        .unwrap();
        let config = Config::from_json_file(file.path()).unwrap();
        assert_eq!(config.model.n_embd, 32);
        assert_eq!(config.model.n_head, 4);
        assert_eq!(config.model.vocab_size, 0, "vocab size comes from the corpus");
        assert_eq!(config.model.block_size, constants::BLOCK_SIZE);
        assert_eq!(config.train.max_iters, 10);
        assert_eq!(config.train.batch_size, constants::BATCH_SIZE);
        assert_eq!(config.sample, SampleConfig::default());
    }

    #[test]
    fn test_train_split_bounds() {
        let config = TrainConfig {
            train_split: 1.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
        assert!(TrainConfig::default().validate().is_ok());
    }
}
