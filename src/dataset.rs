use std::path::Path;

use anyhow::{Context, Result, bail};
use log::info;
use rand::Rng;
use tch::{Device, Tensor};

use crate::tokenizer::CharTokenizer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Split {
    Train,
    Validation,
}

/// An encoded corpus, split contiguously into a training prefix and a validation suffix.
#[derive(Debug, Clone)]
pub struct DataSet {
    tokenizer: CharTokenizer,
    training: Vec<i64>,
    validation: Vec<i64>,
}

impl DataSet {
    /// Loads a single text file, or every file below a directory in path order.
    pub fn load(path: &Path, train_split: f64) -> Result<Self> {
        let mut text = String::new();
        for file in Self::enumerate_files(path) {
            let contents = std::fs::read_to_string(&file)
                .with_context(|| format!("failed to read {}", file))?;
            text.push_str(&contents);
        }
        if text.is_empty() {
            bail!("no text found under {}", path.display());
        }
        let dataset = Self::from_text(&text, train_split)?;
        info!(
            "loaded {} characters from {} (vocab size {})",
            text.chars().count(),
            path.display(),
            dataset.tokenizer.vocab_size()
        );
        Ok(dataset)
    }

    fn enumerate_files(path: &Path) -> Vec<String> {
        walkdir::WalkDir::new(path)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.path().to_string_lossy().to_string())
            .collect()
    }

    pub fn from_text(text: &str, train_split: f64) -> Result<Self> {
        let tokenizer = CharTokenizer::from_text(text);
        let mut training = tokenizer.encode(text)?;
        let n = (train_split * training.len() as f64) as usize;
        let validation = training.split_off(n);
        Ok(DataSet {
            tokenizer,
            training,
            validation,
        })
    }

    pub fn tokenizer(&self) -> &CharTokenizer {
        &self.tokenizer
    }

    pub fn split(&self, split: Split) -> &[i64] {
        match split {
            Split::Train => &self.training,
            Split::Validation => &self.validation,
        }
    }
}

/// Inputs and next-token targets, both `[batch_size, block_size]`.
#[derive(Debug)]
pub struct Batch {
    pub inputs: Tensor,
    pub targets: Tensor,
}

/// Draws random contiguous windows from a token sequence.
#[derive(Debug, Clone, Copy)]
pub struct BatchSampler {
    batch_size: i64,
    block_size: i64,
    device: Device,
}

impl BatchSampler {
    pub fn new(batch_size: i64, block_size: i64, device: Device) -> Self {
        BatchSampler {
            batch_size,
            block_size,
            device,
        }
    }

    pub fn sample<R: Rng>(&self, data: &[i64], rng: &mut R) -> Result<Batch> {
        let block_size = self.block_size as usize;
        if data.len() <= block_size {
            bail!(
                "split of {} tokens is too short for block size {}",
                data.len(),
                block_size
            );
        }
        let capacity = (self.batch_size * self.block_size) as usize;
        let mut inputs = Vec::with_capacity(capacity);
        let mut targets = Vec::with_capacity(capacity);
        for _ in 0..self.batch_size {
            let start = rng.random_range(0..data.len() - block_size);
            inputs.extend_from_slice(&data[start..start + block_size]);
            targets.extend_from_slice(&data[start + 1..start + block_size + 1]);
        }
        let shape = [self.batch_size, self.block_size];
        Ok(Batch {
            inputs: Tensor::from_slice(&inputs).view(shape).to_device(self.device),
            targets: Tensor::from_slice(&targets).view(shape).to_device(self.device),
        })
    }
}
