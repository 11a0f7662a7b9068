use clap::{Args, Parser, Subcommand, ValueHint};
use std::path::PathBuf;
use std::process;

use gap::data::{rename, resize, subsets};
use gap::dream;
use gap::errors::Error;
use gap::models::Network;
use gap::params::{DreamParams, ParamsLayout};
use gap::training::{self, OptimizerKind, TrainingConfig};
use gap::visualize::{self, Direction, VisualizeConfig};

#[derive(Parser)]
#[command(author, version, about = "Generative Art Producer: DeepDream synthesis and classifier tooling")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a dream described by a parameter file
    Dream(DreamArgs),
    /// Train the binary image classifier
    Train(TrainArgs),
    /// Evaluate a saved classifier on the test subset of a data set
    Evaluate(EvaluateArgs),
    /// Move random noise along the gradient of a classifier's output
    Visualize(VisualizeArgs),
    /// Classify an image with a saved classifier
    Predict(PredictArgs),
    /// Print the layers of a saved model
    Summary(SummaryArgs),
    /// Copy numbered samples into train, validation and test subsets
    Subsets(SubsetsArgs),
    /// Rename the files of a directory to class.{i}.{extension}
    Rename(RenameArgs),
    /// Resize every image of a directory tree
    Resize(ResizeArgs),
}

#[derive(Args)]
struct DreamArgs {
    /// Parameter file
    #[arg(value_hint = ValueHint::FilePath)]
    params: PathBuf,

    /// Model whose layers are targeted
    #[arg(long, value_hint = ValueHint::FilePath)]
    model: PathBuf,

    /// Layout of the parameter file (full or compact)
    #[arg(long, default_value = "full")]
    layout: ParamsLayout,
}

#[derive(Args)]
struct TrainArgs {
    /// Directory containing the train, validation and test subsets
    #[arg(value_hint = ValueHint::DirPath)]
    data_dir: PathBuf,

    /// Where the best model is saved
    #[arg(long, value_hint = ValueHint::FilePath)]
    model: PathBuf,

    /// CSV file receiving the training history
    #[arg(long, value_hint = ValueHint::FilePath)]
    history: Option<PathBuf>,

    #[arg(long, default_value_t = 3)]
    epochs: u64,

    #[arg(long, default_value_t = 32)]
    batch_size: u64,

    /// Height and width of the images
    #[arg(long, default_value_t = training::IMAGE_SIZE)]
    size: u32,

    /// sgd, adam or rmsprop
    #[arg(long, default_value = "rmsprop")]
    optimizer: String,

    #[arg(long, default_value_t = 0.001)]
    learning_rate: f32,

    /// Completion file created at the end of the run
    #[arg(long, value_hint = ValueHint::FilePath)]
    done: Option<PathBuf>,

    #[arg(long)]
    quiet: bool,
}

#[derive(Args)]
struct EvaluateArgs {
    #[arg(value_hint = ValueHint::FilePath)]
    model: PathBuf,

    #[arg(value_hint = ValueHint::DirPath)]
    data_dir: PathBuf,

    #[arg(long, default_value_t = 32)]
    batch_size: u64,
}

#[derive(Args)]
struct VisualizeArgs {
    #[arg(value_hint = ValueHint::FilePath)]
    model: PathBuf,

    #[arg(long, value_hint = ValueHint::FilePath)]
    output: PathBuf,

    #[arg(long, default_value_t = 100)]
    iterations: usize,

    #[arg(long, default_value_t = 15.)]
    rate: f32,

    /// Increase the output of the model instead of decreasing it
    #[arg(long)]
    ascent: bool,

    #[arg(long, value_hint = ValueHint::FilePath)]
    done: Option<PathBuf>,

    #[arg(long)]
    quiet: bool,
}

#[derive(Args)]
struct PredictArgs {
    #[arg(value_hint = ValueHint::FilePath)]
    model: PathBuf,

    #[arg(value_hint = ValueHint::FilePath)]
    image: PathBuf,
}

#[derive(Args)]
struct SummaryArgs {
    #[arg(value_hint = ValueHint::FilePath)]
    model: PathBuf,
}

#[derive(Args)]
struct SubsetsArgs {
    /// Directory containing the numbered samples
    #[arg(value_hint = ValueHint::DirPath)]
    source: PathBuf,

    /// Directory receiving the subsets
    #[arg(value_hint = ValueHint::DirPath)]
    target: PathBuf,

    #[arg(long, num_args = 1.., default_values_t = subsets::DEFAULT_CLASSES.iter().map(|class| class.to_string()).collect::<Vec<String>>())]
    classes: Vec<String>,

    #[arg(long, default_value = subsets::DEFAULT_EXTENSION)]
    extension: String,
}

#[derive(Args)]
struct RenameArgs {
    #[arg(value_hint = ValueHint::DirPath)]
    dir: PathBuf,

    class: String,

    #[arg(long, default_value = subsets::DEFAULT_EXTENSION)]
    extension: String,
}

#[derive(Args)]
struct ResizeArgs {
    #[arg(value_hint = ValueHint::DirPath)]
    source: PathBuf,

    #[arg(value_hint = ValueHint::DirPath)]
    output: PathBuf,

    #[arg(long, default_value_t = resize::DEFAULT_SIZE.0)]
    width: u32,

    #[arg(long, default_value_t = resize::DEFAULT_SIZE.1)]
    height: u32,
}


fn run(command: Command) -> Result<(), Error> {
    match command {
        Command::Dream(args) => {
            let params = DreamParams::load(&args.params, args.layout)?;
            let mut network = Network::load(&args.model)?;
            dream::run(&mut network, &params)?;
        },
        Command::Train(args) => {
            let mut config = TrainingConfig::new(&args.data_dir, &args.model);
            config.history_path = args.history;
            config.image_size = (args.size, args.size);
            config.batch_size = args.batch_size;
            config.epochs = args.epochs;
            config.optimizer = args.optimizer.parse::<OptimizerKind>()?;
            config.learning_rate = args.learning_rate;
            config.done_path = args.done;
            config.verbose = !args.quiet;
            training::train(&config)?;
        },
        Command::Evaluate(args) => {
            let (loss, accuracy) = training::evaluate_model(&args.model, &args.data_dir, args.batch_size)?;
            println!("Testing loss: {:.3}", loss);
            println!("Testing accuracy: {:.3}", accuracy);
        },
        Command::Visualize(args) => {
            let mut network = Network::load(&args.model)?;
            let mut config = VisualizeConfig::new(args.output);
            config.iterations = args.iterations;
            config.distortion_rate = args.rate;
            config.direction = if args.ascent { Direction::Ascent } else { Direction::Descent };
            config.done_path = args.done;
            config.verbose = !args.quiet;
            visualize::run(&mut network, &config)?;
        },
        Command::Predict(args) => {
            let network = Network::load(&args.model)?;
            let (class, probability) = training::classify_image(&network, &args.image)?;
            println!("{}: {} ({:.2}%)", args.image.display(), class, probability * 100.);
        },
        Command::Summary(args) => {
            let network = Network::load(&args.model)?;
            println!("{}", network);
        },
        Command::Subsets(args) => {
            let classes: Vec<&str> = args.classes.iter().map(|class| class.as_str()).collect();
            let count = subsets::create_subsets(&args.source, &args.target, &classes, &args.extension, &subsets::default_subsets(), true)?;
            println!("{} files copied to {}", count, args.target.display());
        },
        Command::Rename(args) => {
            let count = rename::rename_sequential(&args.dir, &args.class, &args.extension)?;
            println!("{} files renamed", count);
        },
        Command::Resize(args) => {
            let count = resize::resize_tree(&args.source, &args.output, (args.width, args.height))?;
            println!("{} images resized to {}", count, args.output.display());
        },
    }
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    if let Err(err) = run(cli.command) {
        eprintln!("Error: {}", err);
        process::exit(1);
    }
}
