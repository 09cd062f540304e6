//! Builds a network from experiment parameters and runs one forward pass on
//! random input, reporting the output shapes.
//!
//! ```bash
//! cargo run --bin geomtl -- --params params.json --batch-size 2
//! RUST_LOG=debug cargo run --bin geomtl -- --params params.json --geo-info geo.json
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use burn::{prelude::*, tensor::Distribution};
use clap::Parser;
use geomtl::{
    backend::{create_device, SelectedBackend, BACKEND_NAME},
    choose_model, GeoFeatures, GeoInfoConfig, ModelParams, NetworkInput, NetworkOutput,
    ASSUMED_INPUT_SIZE,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Model parameters (JSON); defaults are used when omitted
    #[arg(short, long)]
    params: Option<PathBuf>,

    /// Geo side-input description (JSON)
    #[arg(short, long)]
    geo_info: Option<PathBuf>,

    /// Number of random samples in the batch
    #[arg(short, long, default_value = "1")]
    batch_size: usize,

    /// Input side length; the head dimensions are tabulated for 256
    #[arg(short, long, default_value_t = ASSUMED_INPUT_SIZE[0])]
    size: usize,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let device = create_device();
    tracing::info!(backend = BACKEND_NAME, "using backend");

    let params = match &args.params {
        Some(path) => ModelParams::load(path)
            .with_context(|| format!("failed to load model parameters from {}", path.display()))?,
        None => ModelParams::new(),
    };
    let geo_info = match &args.geo_info {
        Some(path) => GeoInfoConfig::load(path)
            .with_context(|| format!("failed to load geo info from {}", path.display()))?,
        None => GeoInfoConfig::new(),
    };

    let network = choose_model::<SelectedBackend>(&params, &geo_info, &device)
        .context("failed to build the network")?;

    let images = Tensor::random(
        [args.batch_size, params.num_channels, args.size, args.size],
        Distribution::Normal(0.0, 1.0),
        &device,
    );
    let mut input = NetworkInput::new(images);
    if network.architecture().is_geo_aware() {
        input = input.with_geo(random_geo_features(
            args.batch_size,
            geo_info.num_domains,
            params.num_classes,
            &device,
        ));
    }

    let output = network
        .forward(input)
        .with_context(|| format!("forward pass of {} failed", network.name()))?;

    match output {
        NetworkOutput::Base(output) => {
            tracing::info!(
                early = ?[output.early[0].dims(), output.early[1].dims()],
                bottleneck = ?output.bottleneck.dims(),
                pre_head = ?output.pre_head.dims(),
                segmentation = ?output.segmentation.dims(),
                "base network output",
            );
        }
        NetworkOutput::MultiTask(output) => {
            tracing::info!(
                outputs = output.len(),
                segmentation = ?output.segmentation().dims(),
                coords = ?output.coords().dims(),
                time = ?output.time().map(Tensor::dims),
                "multi-task output",
            );
        }
    }

    Ok(())
}

fn random_geo_features<B: Backend>(
    batch_size: usize,
    num_domains: usize,
    num_classes: usize,
    device: &B::Device,
) -> GeoFeatures<B> {
    let uniform = |width| Tensor::random([batch_size, width], Distribution::Default, device);
    let label_distr: Tensor<B, 2> = uniform(num_classes);
    let total = label_distr.clone().sum_dim(1);

    GeoFeatures {
        coords: uniform(2).mul_scalar(2.0).sub_scalar(1.0),
        time: uniform(2),
        domain: uniform(num_domains.max(1)),
        label_distr: label_distr / total,
    }
}
