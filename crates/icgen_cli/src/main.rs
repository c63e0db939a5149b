use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use icgen_core::field::{gaussian_random_field, FieldConfig};
use icgen_core::pipeline::{generate, write_realization, ClusterConfig};
use icgen_core::storage::{JsonSink, OutputSink, VtuSink};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Format {
    Vtu,
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "icgen", about = "Initial condition generator for n-body simulations")]
enum Command {
    /// Sample a King model star cluster.
    King(KingArgs),
    /// Generate a Gaussian random field with a power law spectrum.
    Field(FieldArgs),
}

#[derive(clap::Args, Debug)]
struct KingArgs {
    /// Density scale k.
    #[arg(long, default_value_t = 0.1)]
    k: f64,
    /// Inverse velocity dispersion scale j.
    #[arg(long, default_value_t = 1.0)]
    j: f64,
    /// Central potential V0 (negative).
    #[arg(long, default_value_t = -1.0, allow_negative_numbers = true)]
    v0: f64,
    /// Gravitational constant G.
    #[arg(long, default_value_t = 1.0)]
    g: f64,
    /// Outer bound of the integration domain. Increase when the run fails
    /// with a boundary-not-found error.
    #[arg(long, default_value_t = 10.0)]
    r_max: f64,
    /// Number of potential tabulation points.
    #[arg(long, default_value_t = 512)]
    n_points: usize,
    /// Number of stars to sample.
    #[arg(short, long, default_value_t = 16)]
    n_particles: usize,
    /// Random generator seed.
    #[arg(long, default_value_t = 0)]
    seed: u64,
    /// Minimum tabulation steps to the boundary before warning.
    #[arg(long, default_value_t = 128)]
    threshold_steps: usize,
    /// Upper bound on rejection sampling proposals.
    #[arg(long, default_value_t = 100_000_000)]
    max_attempts: u64,
    /// Boundary condition V'(0).
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    initial_slope: f64,
    /// Output path without extension.
    #[arg(short, long, default_value = "king")]
    output: PathBuf,
    /// Output container format.
    #[arg(short, long, value_enum, default_value = "vtu")]
    format: Format,
}

#[derive(clap::Args, Debug)]
struct FieldArgs {
    /// Grid points per axis.
    #[arg(long, default_value_t = 512)]
    size: usize,
    /// 2 or 3.
    #[arg(short, long, default_value_t = 2)]
    dimensions: usize,
    /// Spectral index (negative).
    #[arg(short, long, default_value_t = -2.0, allow_negative_numbers = true)]
    power: f64,
    /// Random generator seed.
    #[arg(long, default_value_t = 0)]
    seed: u64,
    /// Output path for the JSON container.
    #[arg(short, long, default_value = "field.json")]
    output: PathBuf,
}

fn run_king(args: KingArgs) -> Result<()> {
    let config = ClusterConfig {
        k: args.k,
        j: args.j,
        v0: args.v0,
        g: args.g,
        r_max: args.r_max,
        n_points: args.n_points,
        n_particles: args.n_particles,
        seed: args.seed,
        threshold_steps: args.threshold_steps,
        max_attempts: args.max_attempts,
        initial_slope: args.initial_slope,
    };

    let realization = generate(&config).context("failed to generate the cluster")?;
    log::info!(
        "sampled {} stars (boundary {:.3}, efficiency {:.2}%)",
        realization.particles.len(),
        realization.boundary.r0,
        realization.efficiency * 100.0
    );

    let mut sink: Box<dyn OutputSink> = match args.format {
        Format::Vtu => Box::new(VtuSink::create(&args.output, 1)),
        Format::Json => Box::new(JsonSink::create(args.output.with_extension("json"), 1)),
    };
    write_realization(&realization, sink.as_mut(), 0.0)
        .context("failed to write the output container")?;
    Ok(())
}

fn run_field(args: FieldArgs) -> Result<()> {
    let field = gaussian_random_field(&FieldConfig {
        size: args.size,
        dimensions: args.dimensions,
        power: args.power,
        seed: args.seed,
    })
    .context("failed to generate the field")?;

    let out = std::io::BufWriter::new(
        std::fs::File::create(&args.output).context("failed to create the field container")?,
    );
    serde_json::to_writer(out, &field).context("failed to write the field container")?;
    log::info!(
        "wrote {}^{} field to {}",
        field.size,
        field.dimensions,
        args.output.display()
    );
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();
    match Command::parse() {
        Command::King(args) => run_king(args),
        Command::Field(args) => run_field(args),
    }
}
