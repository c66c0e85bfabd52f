use std::io::Read;
use std::path::Path;

use fluxbridge_core::api::{extract_frames, AppContext, CliError, PredictRequest};
use fluxbridge_core::engine;

use crate::commands::cli;

/// Read a file, or stdin when the argument is `-`.
fn read_input(source: &str) -> Result<String, CliError> {
    if source == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        Ok(buf)
    } else {
        Ok(std::fs::read_to_string(source)?)
    }
}

pub async fn run_predict(args: cli::PredictArgs, ctx: &AppContext) -> Result<i32, CliError> {
    let raw = read_input(&args.request)?;
    let mut request: PredictRequest = serde_json::from_str(&raw)
        .map_err(|e| CliError::Command(format!("invalid request json: {e}")))?;
    if args.no_preview {
        request.enable_live_preview = false;
    }
    tracing::info!(
        output_dir = %args.output_dir.display(),
        live_preview = request.enable_live_preview,
        "prediction request accepted"
    );

    let services = ctx.build_services().await?;

    let output = engine::predict(engine::PredictArgs {
        cfg: ctx.cfg().clone(),
        services,
        router: ctx.router(),
        state: ctx.state(),
        request,
        output_dir: args.output_dir,
        run_id: args.run_id,
    })
    .await?;

    // The result manifest goes to stdout where the platform reads it; the
    // frame records that streamed earlier are framed and do not collide.
    let manifest = serde_json::to_string(&output)
        .map_err(|e| CliError::Command(format!("manifest encode failed: {e}")))?;
    println!("{manifest}");
    Ok(0)
}

pub async fn run_frames(args: cli::FramesArgs) -> Result<i32, CliError> {
    let feed = read_input(&args.input)?;
    let frames = extract_frames(&feed);

    if args.list {
        for frame in &frames {
            println!("{}/{}", frame.step, frame.total);
        }
        return Ok(0);
    }

    std::fs::create_dir_all(&args.output_dir)?;
    let mut written = 0usize;
    for frame in &frames {
        let png = frame.decode_png()?;
        let name = format!("step-{:04}-of-{}.png", frame.step, frame.total);
        std::fs::write(Path::new(&args.output_dir).join(name), png)?;
        written += 1;
    }

    eprintln!("extracted {written} frame(s) to {}", args.output_dir.display());
    Ok(0)
}

pub async fn run_weights(args: cli::WeightsArgs, ctx: &AppContext) -> Result<i32, CliError> {
    let services = ctx.build_services().await?;
    let Some(weights) = services.weights else {
        return Err(CliError::Command("no weights provider configured".into()));
    };

    match args.command {
        cli::WeightsCommands::Prefetch { url } => {
            let path = weights.ensure(&url).await?;
            println!("{}", path.display());
        }
        cli::WeightsCommands::List => {
            for file in weights.cached_files()? {
                println!("{}", file.display());
            }
        }
    }
    Ok(0)
}
