use rand::Rng;
use rand_distr::{Distribution, weighted::WeightedIndex};
use tch::{Device, IndexOp, Kind::Float, Tensor};

use crate::{error::ModelError, model::GptLanguageModel};

/// Autoregressive sampler over a trained model. The random source is owned by the
/// generator so a seeded RNG gives reproducible continuations.
pub struct Generator<'a, R: Rng> {
    model: &'a GptLanguageModel,
    rng: R,
    temperature: f64,
}

impl<'a, R: Rng> Generator<'a, R> {
    pub fn new(model: &'a GptLanguageModel, rng: R) -> Self {
        Generator {
            model,
            rng,
            temperature: 1.0,
        }
    }

    /// Divides the final logits by `temperature` before the softmax.
    pub fn with_temperature(mut self, temperature: f64) -> Result<Self, ModelError> {
        if !(temperature > 0.0 && temperature.is_finite()) {
            return Err(ModelError::Configuration(format!(
                "temperature must be positive, got {}",
                temperature
            )));
        }
        self.temperature = temperature;
        Ok(self)
    }

    /// Lazily extends `context` (`[batch, seq_len]` token ids) by `max_new_tokens` steps,
    /// yielding the `[batch, 1]` tokens sampled at each step.
    pub fn continuation(
        &mut self,
        context: &Tensor,
        max_new_tokens: usize,
    ) -> Result<Continuation<'_, R>, ModelError> {
        let size = context.size();
        if size.len() != 2 || size[0] == 0 || size[1] == 0 {
            return Err(ModelError::ShapeMismatch(format!(
                "context must be a non-empty [batch, seq_len] tensor, got {:?}",
                size
            )));
        }
        Ok(Continuation {
            // Disable gradient tracking since we're not training now.
            _no_grad_guard: tch::no_grad_guard(),
            model: self.model,
            rng: &mut self.rng,
            temperature: self.temperature,
            sequence: context.to_kind(tch::Kind::Int64),
            remaining: max_new_tokens,
        })
    }

    /// Returns `context` with exactly `max_new_tokens` sampled tokens appended to every row.
    pub fn generate(
        &mut self,
        context: &Tensor,
        max_new_tokens: usize,
    ) -> Result<Tensor, ModelError> {
        let mut continuation = self.continuation(context, max_new_tokens)?;
        for step in continuation.by_ref() {
            step?;
        }
        Ok(continuation.into_sequence())
    }
}

pub struct Continuation<'g, R: Rng> {
    _no_grad_guard: tch::NoGradGuard,
    model: &'g GptLanguageModel,
    rng: &'g mut R,
    temperature: f64,
    sequence: Tensor,
    remaining: usize,
}

impl<R: Rng> Continuation<'_, R> {
    /// The context plus every token sampled so far, `[batch, seq_len + steps]`.
    pub fn sequence(&self) -> &Tensor {
        &self.sequence
    }

    pub fn into_sequence(self) -> Tensor {
        self.sequence
    }

    fn step(&mut self) -> Result<Tensor, ModelError> {
        // Trim the window to the context the position table covers
        let block_size = self.model.block_size();
        let seq_len = self.sequence.size()[1];
        let window = if seq_len > block_size {
            self.sequence.narrow(1, seq_len - block_size, block_size)
        } else {
            self.sequence.shallow_clone()
        };
        // [batch, seq_len, vocab_size], evaluation mode
        let (logits, _) = self.model.forward(&window, None, false)?;
        // Only the final position predicts the next token: [batch, vocab_size]
        let last_logits = logits.i((.., -1, ..)) / self.temperature;
        let probs = last_logits.softmax(-1, Float);
        let next = sample_rows(&probs, &mut *self.rng)?.to_device(self.sequence.device());
        self.sequence = Tensor::cat(&[&self.sequence, &next], 1);
        Ok(next)
    }
}

impl<R: Rng> Iterator for Continuation<'_, R> {
    type Item = Result<Tensor, ModelError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        Some(self.step())
    }
}

/// Draws one index per row of a `[batch, vocab_size]` probability matrix. Returns `[batch, 1]`.
fn sample_rows<R: Rng + ?Sized>(probs: &Tensor, rng: &mut R) -> Result<Tensor, ModelError> {
    let vocab_size = probs.size()[1] as usize;
    let flat = Vec::<f32>::try_from(&probs.to_device(Device::Cpu).contiguous().view([-1]))?;
    let sampled = flat
        .chunks(vocab_size)
        .map(|row| {
            WeightedIndex::new(row)
                .map(|dist| dist.sample(rng) as i64)
                .map_err(|e| ModelError::Sampling(e.to_string()))
        })
        .collect::<Result<Vec<i64>, _>>()?;
    Ok(Tensor::from_slice(&sampled).view([-1, 1]))
}
