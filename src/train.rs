use anyhow::{Context, Result, bail};
use log::{debug, info};
use rand::{SeedableRng, rngs::StdRng};
use tch::{
    Device,
    nn::{AdamW, Optimizer, OptimizerConfig, VarStore},
};

use crate::{
    config::{ModelConfig, TrainConfig},
    dataset::{Batch, BatchSampler, DataSet, Split},
    model::GptLanguageModel,
};

/// Mean loss per split, measured in evaluation mode.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LossReport {
    pub train: f64,
    pub validation: f64,
}

pub struct Trainer {
    var_store: VarStore,
    model: GptLanguageModel,
    optimizer: Optimizer,
    dataset: DataSet,
    sampler: BatchSampler,
    config: TrainConfig,
    rng: StdRng,
}

impl Trainer {
    /// Builds a model sized to the dataset's vocabulary and an AdamW optimizer over its
    /// parameters. Parameter initialization and batch sampling are seeded from `config.seed`.
    pub fn new(
        device: Device,
        model_config: ModelConfig,
        config: TrainConfig,
        dataset: DataSet,
    ) -> Result<Trainer> {
        config.validate()?;
        let model_config = model_config.with_vocab_size(dataset.tokenizer().vocab_size());
        model_config.validate()?;
        for split in [Split::Train, Split::Validation] {
            let len = dataset.split(split).len();
            if len as i64 <= model_config.block_size {
                bail!(
                    "{:?} split has {} tokens, needs more than block size {}",
                    split,
                    len,
                    model_config.block_size
                );
            }
        }

        tch::manual_seed(config.seed as i64);
        let var_store = VarStore::new(device);
        let model = GptLanguageModel::new(&var_store.root(), model_config)?;
        let optimizer = AdamW::default()
            .build(&var_store, config.learning_rate)
            .context("failed to create AdamW optimizer")?;
        let sampler = BatchSampler::new(config.batch_size, model.block_size(), device);
        let rng = StdRng::seed_from_u64(config.seed);
        let trainer = Trainer {
            var_store,
            model,
            optimizer,
            dataset,
            sampler,
            config,
            rng,
        };
        info!(
            "{:.3}M parameters on {:?}",
            trainer.num_parameters() as f64 / 1e6,
            device
        );
        Ok(trainer)
    }

    pub fn model(&self) -> &GptLanguageModel {
        &self.model
    }

    pub fn dataset(&self) -> &DataSet {
        &self.dataset
    }

    pub fn num_parameters(&self) -> usize {
        self.var_store
            .trainable_variables()
            .iter()
            .map(|t| t.numel())
            .sum()
    }

    /// Runs `max_iters` optimizer steps, estimating loss every `eval_interval` steps and on
    /// the last one. Returns the most recent estimate.
    pub fn train(&mut self) -> Result<LossReport> {
        let max_iters = self.config.max_iters;
        let mut report = None;
        for iter in 0..max_iters {
            if iter % self.config.eval_interval == 0 || iter == max_iters - 1 {
                let losses = self.estimate_loss()?;
                info!(
                    "step {}: train loss {:.4}, val loss {:.4}",
                    iter, losses.train, losses.validation
                );
                report = Some(losses);
            }
            let batch = self
                .sampler
                .sample(self.dataset.split(Split::Train), &mut self.rng)?;
            let loss = self.train_step(&batch)?;
            debug!("step {}: batch loss {:.4}", iter, loss);
        }
        match report {
            Some(report) => Ok(report),
            None => self.estimate_loss(),
        }
    }

    /// Forward in training mode, backprop, one AdamW update. Returns the batch loss.
    pub fn train_step(&mut self, batch: &Batch) -> Result<f64> {
        let (_, loss) = self
            .model
            .forward(&batch.inputs, Some(&batch.targets), true)?;
        let loss = loss.context("forward returned no loss for a targeted batch")?;
        self.optimizer.backward_step(&loss);
        Ok(f64::try_from(&loss)?)
    }

    /// Averages the loss over `eval_iters` fresh batches of each split, with dropout off and
    /// no gradient tracking.
    pub fn estimate_loss(&mut self) -> Result<LossReport> {
        let _no_grad_guard = tch::no_grad_guard();
        Ok(LossReport {
            train: self.split_loss(Split::Train)?,
            validation: self.split_loss(Split::Validation)?,
        })
    }

    fn split_loss(&mut self, split: Split) -> Result<f64> {
        let mut total_loss = 0.0;
        for _ in 0..self.config.eval_iters {
            let batch = self
                .sampler
                .sample(self.dataset.split(split), &mut self.rng)?;
            let (_, loss) = self
                .model
                .forward(&batch.inputs, Some(&batch.targets), false)?;
            let loss = loss.context("forward returned no loss for a targeted batch")?;
            total_loss += f64::try_from(&loss)?;
        }
        Ok(total_loss / self.config.eval_iters as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CORPUS: &str = "First Citizen:\nBefore we proceed any further, hear me speak.\n\n\
                          All:\nSpeak, speak.\n\n\
                          First Citizen:\nYou are all resolved rather to die than to famish?\n";

    fn model_config() -> ModelConfig {
        ModelConfig {
            vocab_size: 0,
            block_size: 8,
            n_embd: 32,
            n_head: 4,
            n_layer: 1,
            dropout: 0.0,
        }
    }

    fn train_config() -> TrainConfig {
        TrainConfig {
            batch_size: 4,
            max_iters: 12,
            eval_interval: 5,
            eval_iters: 2,
            learning_rate: 1e-3,
            seed: 0,
            train_split: 0.8,
        }
    }

    fn setup_trainer() -> Trainer {
        let dataset = DataSet::from_text(CORPUS, train_config().train_split).unwrap();
        Trainer::new(Device::Cpu, model_config(), train_config(), dataset).unwrap()
    }

    fn sample_batch(trainer: &mut Trainer) -> Batch {
        trainer
            .sampler
            .sample(trainer.dataset.split(Split::Train), &mut trainer.rng)
            .unwrap()
    }

    #[test]
    fn test_vocab_size_comes_from_dataset() {
        let trainer = setup_trainer();
        assert_eq!(
            trainer.model().config().vocab_size,
            trainer.dataset().tokenizer().vocab_size()
        );
        assert!(trainer.num_parameters() > 0);
    }

    #[test]
    fn test_train_step_loss_is_finite() {
        let mut trainer = setup_trainer();
        let batch = sample_batch(&mut trainer);
        let loss = trainer.train_step(&batch).unwrap();
        assert!(loss.is_finite(), "Loss should be a finite number, got {}", loss);
        assert!(loss > 0.0, "Cross-entropy loss should be positive, got {}", loss);
    }

    #[test]
    fn test_every_step_updates_parameters() {
        let mut trainer = setup_trainer();
        let weight = |t: &Trainer| t.var_store.variables()["lm_head.weight"].copy();
        for _ in 0..3 {
            let before = weight(&trainer);
            let batch = sample_batch(&mut trainer);
            trainer.train_step(&batch).unwrap();
            assert!(!before.equal(&weight(&trainer)), "parameters unchanged after a step");
        }
    }

    #[test]
    fn test_train_step_loss_decreases() {
        let mut trainer = setup_trainer();
        // Train on the same batch repeatedly — loss should decrease
        let batch = sample_batch(&mut trainer);
        let first_loss = trainer.train_step(&batch).unwrap();
        let mut last_loss = first_loss;
        for _ in 0..50 {
            last_loss = trainer.train_step(&batch).unwrap();
        }
        assert!(
            last_loss < first_loss,
            "Loss should decrease after repeated training on same input: first={}, last={}",
            first_loss,
            last_loss
        );
    }

    #[test]
    fn test_estimate_loss_does_not_track_gradients() {
        let mut trainer = setup_trainer();
        let report = trainer.estimate_loss().unwrap();
        assert!(report.train.is_finite() && report.train > 0.0);
        assert!(report.validation.is_finite() && report.validation > 0.0);
        for var in trainer.var_store.trainable_variables() {
            assert!(!var.grad().defined(), "evaluation produced gradients");
        }
    }

    #[test]
    fn test_train_returns_final_report() {
        let mut trainer = setup_trainer();
        let report = trainer.train().unwrap();
        assert!(report.train.is_finite());
        assert!(report.validation.is_finite());
    }

    #[test]
    fn test_zero_iterations_still_reports() {
        let dataset = DataSet::from_text(CORPUS, 0.8).unwrap();
        let config = TrainConfig {
            max_iters: 0,
            ..train_config()
        };
        let mut trainer = Trainer::new(Device::Cpu, model_config(), config, dataset).unwrap();
        assert!(trainer.train().unwrap().train.is_finite());
    }

    #[test]
    fn test_corpus_shorter_than_block_rejected() {
        let dataset = DataSet::from_text("abcdefghij", 0.5).unwrap();
        assert!(Trainer::new(Device::Cpu, model_config(), train_config(), dataset).is_err());
    }

    #[test]
    fn test_indivisible_heads_rejected() {
        let dataset = DataSet::from_text(CORPUS, 0.8).unwrap();
        let config = ModelConfig {
            n_head: 3,
            ..model_config()
        };
        let err = Trainer::new(Device::Cpu, config, train_config(), dataset)
            .err()
            .unwrap();
        assert!(err.downcast_ref::<crate::error::ModelError>().is_some());
    }
}
