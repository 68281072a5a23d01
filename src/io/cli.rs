//! Command-line interface driving the clipping and aggregation stages

use crate::aggregation::latent_class::EmConfig;
use crate::aggregation::result::{AggregationMethod, AggregationOptions, aggregate};
use crate::alignment::aligner::{NegativePolicy, ResponseAligner};
use crate::analysis::information_loss::{Distance, align_rows, information_loss, label_distributions};
use crate::io::configuration::{
    AGGREGATION_FILE, CONVERTED_FILE, DEFAULT_CLICKABLE_SIZE, DEFAULT_EM_TOLERANCE,
    DEFAULT_LABEL_THRESHOLD, DEFAULT_MAX_EM_ITERATIONS, DEFAULT_NUM_TO_COMBINE, DEFAULT_SEED,
    DEFAULT_SMOOTHING, DEFAULT_SUBINSTANCE_SIZE, MAPPING_FILE, MASKED_DIR, MOSAIC_DIR,
};
use crate::io::error::{Result, consistency_error};
use crate::io::image::{
    collect_image_paths, load_images, render_masked_image, save_mosaics, save_png,
};
use crate::io::persistence::{
    AggregationOutput, load_converted, load_labels, load_mapping, load_responses, write_json,
};
use crate::io::progress::StageProgress;
use crate::spatial::geometry::TilingParams;
use crate::spatial::mosaic::MappingTable;
use clap::{ArgAction, Args, Parser, Subcommand};
use log::{LevelFilter, info};
use std::path::PathBuf;
use std::time::Instant;

#[derive(Parser)]
#[command(name = "crowdmosaic")]
#[command(
    author,
    version,
    about = "Clip images into shuffled mosaics and aggregate crowd judgments back onto them"
)]
/// Command-line arguments shared by every stage
pub struct Cli {
    /// Only report errors and hide progress bars
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Increase log detail (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Stage to run
    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Whether the user chose a log level on the command line
    pub const fn verbosity_given(&self) -> bool {
        self.quiet || self.verbose > 0
    }

    /// Log level selected by `-q` / `-v`
    pub const fn log_level(&self) -> LevelFilter {
        if self.quiet {
            return LevelFilter::Error;
        }
        match self.verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    }
}

/// Pipeline stages
#[derive(Subcommand)]
pub enum Command {
    /// Tile source images, shuffle them into mosaics and save the mapping
    Clip(ClipArgs),
    /// Align a worker response export into a response matrix
    Convert(ConvertArgs),
    /// Estimate per-cell labels from a converted response matrix
    Aggregate(AggregateArgs),
    /// Paint positive cells onto copies of the source images
    Render(RenderArgs),
    /// Measure the information loss of a run against a ground-truth run
    Evaluate(EvaluateArgs),
}

/// Arguments of the `clip` stage
#[derive(Args)]
pub struct ClipArgs {
    /// Directory of source images (png, jpg, jpeg)
    #[arg(value_name = "IMAGES")]
    pub images: PathBuf,

    /// Directory receiving the run directory
    #[arg(short, long, default_value = ".")]
    pub output: PathBuf,

    /// Side length of a clipping window in pixels
    #[arg(short = 's', long, default_value_t = DEFAULT_SUBINSTANCE_SIZE)]
    pub subinstance_size: usize,

    /// Side length of a clickable cell in pixels
    #[arg(short, long, default_value_t = DEFAULT_CLICKABLE_SIZE)]
    pub clickable_size: usize,

    /// Subinstances along one side of a mosaic
    #[arg(short = 'k', long, default_value_t = DEFAULT_NUM_TO_COMBINE)]
    pub num_to_combine: usize,

    /// Seed of the mosaic permutation
    #[arg(long, default_value_t = DEFAULT_SEED)]
    pub seed: u64,
}

impl ClipArgs {
    /// Run directory named after the geometry, `<size>_<clickable>_<combine>`
    pub fn run_dir(&self) -> PathBuf {
        self.output.join(format!(
            "{}_{}_{}",
            self.subinstance_size, self.clickable_size, self.num_to_combine
        ))
    }
}

/// Arguments of the `convert` stage
#[derive(Args)]
pub struct ConvertArgs {
    /// Run directory produced by `clip`
    #[arg(value_name = "RUN_DIR")]
    pub run: PathBuf,

    /// JSON export of worker responses
    #[arg(short, long)]
    pub responses: PathBuf,

    /// Interpretation of cells a worker did not mark
    #[arg(long, value_enum, default_value = "closed-world")]
    pub policy: NegativePolicy,
}

/// Arguments of the `aggregate` stage
#[derive(Args)]
pub struct AggregateArgs {
    /// Run directory holding the converted responses
    #[arg(value_name = "RUN_DIR")]
    pub run: PathBuf,

    /// Aggregation method
    #[arg(short, long, value_enum, default_value_t = AggregationMethod::LatentClass)]
    pub method: AggregationMethod,

    /// Relative Q change at which EM stops
    #[arg(long, default_value_t = DEFAULT_EM_TOLERANCE)]
    pub tolerance: f64,

    /// Posterior threshold for a positive label
    #[arg(long, default_value_t = DEFAULT_LABEL_THRESHOLD)]
    pub threshold: f64,

    /// EM iteration cap
    #[arg(long, default_value_t = DEFAULT_MAX_EM_ITERATIONS)]
    pub max_iterations: usize,

    /// Fail on NaN parameters or cells no true label can explain
    #[arg(long)]
    pub strict: bool,

    /// Seed of the majority vote tie-break
    #[arg(long, default_value_t = DEFAULT_SEED)]
    pub seed: u64,
}

impl AggregateArgs {
    /// Aggregation settings described by these arguments
    pub const fn options(&self) -> AggregationOptions {
        AggregationOptions {
            method: self.method,
            seed: self.seed,
            tolerance: self.tolerance,
            threshold: self.threshold,
            em: EmConfig {
                max_iterations: self.max_iterations,
                strict_validation: self.strict,
            },
        }
    }
}

/// Arguments of the `render` stage
#[derive(Args)]
pub struct RenderArgs {
    /// Run directory holding the mapping and aggregation output
    #[arg(value_name = "RUN_DIR")]
    pub run: PathBuf,

    /// Directory of the source images used by `clip`
    #[arg(short, long)]
    pub images: PathBuf,
}

/// Arguments of the `evaluate` stage
#[derive(Args)]
pub struct EvaluateArgs {
    /// Converted responses of the evaluated run
    #[arg(value_name = "TARGET")]
    pub target: PathBuf,

    /// Converted responses of the ground-truth run
    #[arg(value_name = "REFERENCE")]
    pub reference: PathBuf,

    /// Pseudo-count added to both labels of every cell
    #[arg(long, default_value_t = DEFAULT_SMOOTHING)]
    pub smoothing: f64,

    /// Distance between per-cell label distributions
    #[arg(short, long, value_enum, default_value_t = Distance::Kl)]
    pub distance: Distance,
}

/// Executes the stage selected on the command line
pub struct PipelineRunner {
    cli: Cli,
}

impl PipelineRunner {
    /// Create a runner for parsed arguments
    pub const fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Run the selected stage
    ///
    /// # Errors
    ///
    /// Returns the first error of the stage; nothing is retried
    pub fn run(&self) -> Result<()> {
        let start = Instant::now();
        match &self.cli.command {
            Command::Clip(args) => self.clip(args)?,
            Command::Convert(args) => Self::convert(args)?,
            Command::Aggregate(args) => Self::aggregate(args)?,
            Command::Render(args) => self.render(args)?,
            Command::Evaluate(args) => Self::evaluate(args)?,
        }
        info!("done in {:.2?}", start.elapsed());
        Ok(())
    }

    fn clip(&self, args: &ClipArgs) -> Result<()> {
        let params = TilingParams::new(
            args.subinstance_size,
            args.clickable_size,
            args.num_to_combine,
            args.seed,
        )?;

        let paths = collect_image_paths(&args.images)?;
        let progress = StageProgress::for_stage("loading", paths.len(), self.cli.quiet);
        let images = load_images(&paths, &params, &progress)?;
        progress.finish();

        let table = MappingTable::build(
            params,
            images.iter().map(|image| image.source.clone()).collect(),
        )?;

        let run_dir = args.run_dir();
        let progress = StageProgress::for_stage("mosaics", table.num_mosaics, self.cli.quiet);
        save_mosaics(&table, &images, &run_dir.join(MOSAIC_DIR), &progress)?;
        progress.finish();

        write_json(&table, &run_dir.join(MAPPING_FILE))?;
        info!(
            "clipped {} images into {} subinstances, {} cells and {} mosaics under {}",
            table.images.len(),
            table.num_subinstances,
            table.len(),
            table.num_mosaics,
            run_dir.display()
        );
        Ok(())
    }

    fn convert(args: &ConvertArgs) -> Result<()> {
        let table = load_mapping(&args.run.join(MAPPING_FILE))?;
        let responses = load_responses(&args.responses)?;
        let aligned = ResponseAligner::new(&table, args.policy)?.align(&responses);
        write_json(&aligned, &args.run.join(CONVERTED_FILE))
    }

    fn aggregate(args: &AggregateArgs) -> Result<()> {
        let aligned = load_converted(&args.run.join(CONVERTED_FILE))?;
        let result = aggregate(&aligned.matrix, &args.options())?;
        let output = AggregationOutput {
            cells: aligned.cells,
            workers: aligned.workers,
            result,
        };
        write_json(&output, &args.run.join(AGGREGATION_FILE))
    }

    fn render(&self, args: &RenderArgs) -> Result<()> {
        let table = load_mapping(&args.run.join(MAPPING_FILE))?;
        let (cells, labels) = load_labels(&args.run.join(AGGREGATION_FILE))?;

        let paths = collect_image_paths(&args.images)?;
        let progress = StageProgress::for_stage("loading", paths.len(), self.cli.quiet);
        let images = load_images(&paths, &table.params, &progress)?;
        progress.finish();

        let names: Vec<&str> = images
            .iter()
            .map(|image| image.source.name.as_str())
            .collect();
        check_images_match(&table, &names)?;

        let positives: Vec<_> = cells
            .locations()
            .iter()
            .zip(&labels)
            .filter(|(_, label)| label.is_positive())
            .map(|(location, _)| *location)
            .collect();

        let masked_dir = args.run.join(MASKED_DIR);
        let progress = StageProgress::for_stage("masks", images.len(), self.cli.quiet);
        for image in &images {
            let masked = render_masked_image(image, &positives);
            save_png(&masked, &masked_dir.join(format!("{}.png", image.source.id)))?;
            progress.inc();
        }
        progress.finish();

        info!(
            "painted {} positive cells onto {} images in {}",
            positives.len(),
            images.len(),
            masked_dir.display()
        );
        Ok(())
    }

    // Allow print for the evaluation result, the only output of the stage
    #[allow(clippy::print_stdout)]
    fn evaluate(args: &EvaluateArgs) -> Result<()> {
        let target = load_converted(&args.target)?;
        let reference = load_converted(&args.reference)?;

        let target_rows = label_distributions(&target.matrix, args.smoothing)?;
        let reference_rows = label_distributions(&reference.matrix, args.smoothing)?;
        let aligned = align_rows(&target.cells, &reference.cells, &reference_rows)?;
        let loss = information_loss(&target_rows, &aligned, args.distance)?;

        info!(
            "{} information loss over {} cells: {loss}",
            args.distance,
            target.cells.len()
        );
        println!("information_loss ({}) = {loss}", args.distance);
        Ok(())
    }
}

/// Check that the images found for rendering are the ones the run was clipped from
///
/// # Errors
///
/// Returns a `Consistency` error if the names differ in count or order
pub fn check_images_match(table: &MappingTable, names: &[&str]) -> Result<()> {
    let expected: Vec<&str> = table.images.iter().map(|image| image.name.as_str()).collect();
    if expected != names {
        return Err(consistency_error(
            "rendering",
            &format!(
                "run was clipped from {} images {:?} but {} images {:?} were found",
                expected.len(),
                expected,
                names.len(),
                names
            ),
        ));
    }
    Ok(())
}

