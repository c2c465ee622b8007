mod cli;
mod config;
mod error;
mod feedback;
mod gestures;
mod inference;
mod input;
mod logging;
mod pipeline;
mod raster;
mod recognition;
mod replay;
mod rng;
mod session;
mod stroke;
mod tensor;
mod tracker;
mod transform;

fn main() -> anyhow::Result<()> {
    logging::init();
    cli::run()
}
