use std::path::PathBuf;

use anyhow::Result;
use chargpt::{Config, Generator, Trainer, dataset::DataSet};
use clap::Parser;
use log::info;
use rand::{SeedableRng, rngs::StdRng};
use tch::{Device, Kind, Tensor};

#[derive(Parser)]
#[command(
    name = "chargpt",
    about = "Train a character-level GPT on a text corpus and sample from it"
)]
struct Args {
    /// Training text: a file, or a directory whose files are concatenated
    #[arg(long, default_value = "input.txt")]
    data: PathBuf,

    /// JSON file with `model`, `train` and `sample` sections; missing fields use defaults
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of optimizer steps
    #[arg(long)]
    max_iters: Option<usize>,

    /// Seed for parameter initialization, batch sampling and generation
    #[arg(long)]
    seed: Option<u64>,

    /// Characters to sample after training
    #[arg(long)]
    max_new_tokens: Option<usize>,

    /// Sampling temperature
    #[arg(long)]
    temperature: Option<f64>,

    /// Stay on the CPU even when CUDA is available
    #[arg(long)]
    cpu: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::from_json_file(path)?,
        None => Config::default(),
    };
    if let Some(max_iters) = args.max_iters {
        config.train.max_iters = max_iters;
    }
    if let Some(seed) = args.seed {
        config.train.seed = seed;
    }
    if let Some(max_new_tokens) = args.max_new_tokens {
        config.sample.max_new_tokens = max_new_tokens;
    }
    if let Some(temperature) = args.temperature {
        config.sample.temperature = temperature;
    }

    let device = if args.cpu {
        Device::Cpu
    } else {
        Device::cuda_if_available()
    };
    info!("using device {:?}", device);

    let dataset = DataSet::load(&args.data, config.train.train_split)?;
    let mut trainer = Trainer::new(device, config.model, config.train.clone(), dataset)?;
    let report = trainer.train()?;
    info!(
        "finished: train loss {:.4}, val loss {:.4}",
        report.train, report.validation
    );

    let rng = StdRng::seed_from_u64(config.train.seed);
    let mut generator =
        Generator::new(trainer.model(), rng).with_temperature(config.sample.temperature)?;
    let context = Tensor::zeros([1, 1], (Kind::Int64, device));
    let sequence = generator.generate(&context, config.sample.max_new_tokens)?;
    let tokens = Vec::<i64>::try_from(&sequence.to_device(Device::Cpu).flatten(0, -1))?;
    println!("{}", trainer.dataset().tokenizer().decode(&tokens)?);
    Ok(())
}
