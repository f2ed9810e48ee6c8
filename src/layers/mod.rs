//! Transformer building blocks.
//!
//! Every layer owns its weights under its own `nn::Path` and implements
//! [`tch::nn::ModuleT`], so training versus evaluation mode is an explicit argument of
//! each forward call rather than state held by the layer.

pub mod attention;
pub mod block;
pub mod feed_forward;

use std::borrow::Borrow;

use tch::nn::{self, EmbeddingConfig, Init, LinearConfig};

use crate::constants::INIT_STD;

const NORMAL_INIT: Init = Init::Randn {
    mean: 0.0,
    stdev: INIT_STD,
};

/// Linear layer with N(0, 0.02) weights and a zero bias.
pub(crate) fn linear<'a, P: Borrow<nn::Path<'a>>>(
    vs: P,
    in_dim: i64,
    out_dim: i64,
) -> nn::Linear {
    let config = LinearConfig {
        ws_init: NORMAL_INIT,
        bs_init: Some(Init::Const(0.0)),
        bias: true,
    };
    nn::linear(vs, in_dim, out_dim, config)
}

/// Linear layer with N(0, 0.02) weights and no bias.
pub(crate) fn linear_no_bias<'a, P: Borrow<nn::Path<'a>>>(
    vs: P,
    in_dim: i64,
    out_dim: i64,
) -> nn::Linear {
    let config = LinearConfig {
        ws_init: NORMAL_INIT,
        bs_init: None,
        bias: false,
    };
    nn::linear(vs, in_dim, out_dim, config)
}

pub(crate) fn embedding<'a, P: Borrow<nn::Path<'a>>>(
    vs: P,
    num_embeddings: i64,
    dim: i64,
) -> nn::Embedding {
    let config = EmbeddingConfig {
        ws_init: NORMAL_INIT,
        ..Default::default()
    };
    nn::embedding(vs, num_embeddings, dim, config)
}


#[cfg(test)]
mod tests {
    use super::test_util::{mean, std};
    use super::*;
    use tch::{Device, Tensor, nn::Module};

    #[test]
    fn test_linear_init() {
        let vs = nn::VarStore::new(Device::Cpu);
        let layer = linear(&vs.root() / "fc", 256, 256);
        assert!(mean(&layer.ws).abs() < 0.005);
        assert!((std(&layer.ws) - INIT_STD).abs() < 0.002);
        let bias = layer.bs.as_ref().unwrap();
        assert_eq!(f64::try_from(&bias.abs().max()).unwrap(), 0.0);
    }

    #[test]
    fn test_linear_no_bias() {
        let vs = nn::VarStore::new(Device::Cpu);
        let layer = linear_no_bias(&vs.root() / "fc", 8, 4);
        assert!(layer.bs.is_none());
        let out = layer.forward(&Tensor::zeros([2, 8], (tch::Kind::Float, Device::Cpu)));
        assert_eq!(f64::try_from(&out.abs().max()).unwrap(), 0.0);
    }

    #[test]
    fn test_embedding_init() {
        let vs = nn::VarStore::new(Device::Cpu);
        let table = embedding(&vs.root() / "emb", 512, 128);
        assert_eq!(table.ws.size(), &[512, 128]);
        assert!((std(&table.ws) - INIT_STD).abs() < 0.002);
    }
}
