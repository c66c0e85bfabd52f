use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "fluxbridge",
    version,
    about = "Prediction wrapper around a Stable Diffusion engine with live-preview streaming"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one prediction; streams preview frames to stdout while it runs
    Predict(PredictArgs),
    /// Extract preview frames from a captured log feed
    Frames(FramesArgs),
    /// Manage the weights cache
    Weights(WeightsArgs),
}

#[derive(ClapArgs, Debug)]
pub struct PredictArgs {
    /// Request JSON file; '-' reads stdin
    #[arg(long, default_value = "-")]
    pub request: String,

    /// Directory for result images
    #[arg(long, default_value = "outputs")]
    pub output_dir: PathBuf,

    /// Disable live-preview streaming for this run
    #[arg(long)]
    pub no_preview: bool,

    /// Run id override; defaults to a generated one
    #[arg(long)]
    pub run_id: Option<String>,
}

#[derive(ClapArgs, Debug)]
pub struct FramesArgs {
    /// Log feed to parse; '-' reads stdin
    #[arg(long, default_value = "-")]
    pub input: String,

    /// Directory for extracted PNGs
    #[arg(long, default_value = "frames")]
    pub output_dir: PathBuf,

    /// Print step/total headers instead of writing files
    #[arg(long)]
    pub list: bool,
}

#[derive(ClapArgs, Debug)]
pub struct WeightsArgs {
    #[command(subcommand)]
    pub command: WeightsCommands,
}

#[derive(Subcommand, Debug)]
pub enum WeightsCommands {
    /// Download a weights url into the cache
    Prefetch { url: String },
    /// List cached files
    List,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_predict_with_defaults() {
        let args = Args::try_parse_from(["fluxbridge", "predict"]).unwrap();
        match args.command {
            Some(Commands::Predict(p)) => {
                assert_eq!(p.request, "-");
                assert_eq!(p.output_dir, PathBuf::from("outputs"));
                assert!(!p.no_preview);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn parses_frames_list_flag() {
        let args = Args::try_parse_from(["fluxbridge", "frames", "--input", "run.log", "--list"])
            .unwrap();
        match args.command {
            Some(Commands::Frames(f)) => {
                assert_eq!(f.input, "run.log");
                assert!(f.list);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn parses_weights_prefetch() {
        let args = Args::try_parse_from([
            "fluxbridge",
            "weights",
            "prefetch",
            "https://example.com/a.safetensors",
        ])
        .unwrap();
        assert!(matches!(
            args.command,
            Some(Commands::Weights(WeightsArgs {
                command: WeightsCommands::Prefetch { .. }
            }))
        ));
    }
}
