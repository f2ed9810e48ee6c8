use tch::{
    Tensor,
    nn::{self, Linear, ModuleT},
};

use crate::{constants::FFN_MULTIPLIER, layers::linear};

/// Position-wise MLP: expand to `4 * n_embd`, ReLU, contract back to `n_embd`, dropout.
/// Every position is transformed independently with the same weights.
#[derive(Debug)]
pub struct FeedForward {
    expand: Linear,
    contract: Linear,
    dropout: f64,
}

impl FeedForward {
    pub fn new(vs: &nn::Path, n_embd: i64, dropout: f64) -> Self {
        let hidden = n_embd * FFN_MULTIPLIER;
        FeedForward {
            expand: linear(vs / "expand", n_embd, hidden),
            contract: linear(vs / "contract", hidden, n_embd),
            dropout,
        }
    }
}

impl ModuleT for FeedForward {
    fn forward_t(&self, xs: &Tensor, train: bool) -> Tensor {
        xs.apply(&self.expand)
            .relu()
            .apply(&self.contract)
            .dropout(self.dropout, train)
    }
}
