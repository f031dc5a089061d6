use clarity_upscale::{
    logger::{self, LogLevel, LoggerConfig},
    ClarityClient, ClarityConfig, ImageTensor, ScaleFactor, UpscaleOptions, UpscaleStyle,
};
use std::env;
use std::fs;

const USAGE: &str = "usage: clarity-upscale <input> <output.png> [scale_factor] [prompt]";

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let dotenv_loaded = dotenv::dotenv().is_ok();

    let level = env::var("RUST_LOG")
        .ok()
        .and_then(|name| LogLevel::parse(&name))
        .unwrap_or(LogLevel::Info);
    logger::init_with_config(LoggerConfig::new().with_level(level))?;

    if dotenv_loaded {
        log::info!(".env file loaded");
    } else {
        log::debug!("No .env file found, using process environment");
    }

    let args: Vec<String> = env::args().skip(1).collect();
    let (input, output) = match (args.first(), args.get(1)) {
        (Some(input), Some(output)) => (input, output),
        _ => {
            eprintln!("{}", USAGE);
            std::process::exit(2);
        }
    };

    let scale_factor = match args.get(2) {
        Some(raw) => raw
            .parse::<u8>()
            .ok()
            .and_then(ScaleFactor::new)
            .ok_or_else(|| format!("scale factor must be one of {:?}", ScaleFactor::ALLOWED))?,
        None => ScaleFactor::default(),
    };

    let config = ClarityConfig::from_env()?;
    logger::log_config_info(&config);
    let client = ClarityClient::new(config)?;

    let image = ImageTensor::decode(&fs::read(input)?)?;
    log::info!(
        "Upscaling {} ({}x{}) by {}x",
        input,
        image.width(),
        image.height(),
        scale_factor.get()
    );

    let mut options = UpscaleOptions::new()
        .with_style(UpscaleStyle::Default)
        .with_scale_factor(scale_factor);
    if let Some(prompt) = args.get(3) {
        options = options.with_prompt(prompt.clone());
    }

    let upscaled = match client.upscale(image, options).await {
        Ok(image) => image,
        Err(e) => {
            log::error!("Upscale failed ({}): {}", e.kind().as_str(), e);
            std::process::exit(1);
        }
    };

    fs::write(output, upscaled.encode_png()?)?;
    log::info!(
        "Wrote {} ({}x{})",
        output,
        upscaled.width(),
        upscaled.height()
    );

    Ok(())
}
