use anyhow::Result;
use clap::{CommandFactory, Parser};
use console::Term;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mediakit::cli::{Cli, Commands};
use mediakit::config::Config;
use mediakit::convert::batch::BatchOrchestrator;
use mediakit::convert::{ConversionRequest, ConversionRunner};
use mediakit::download::{self, ytdlp::YtDlp, DownloadFormat, DownloadRequest};
use mediakit::preflight;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let default_filter = if cli.verbose { "mediakit=debug" } else { "mediakit=warn" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = match cli.command {
        Commands::Config { init: true, .. } => Config::default(),
        _ => Config::load(cli.config.as_deref())?,
    };

    match cli.command {
        Commands::Convert {
            input_file,
            output_file,
            quality,
            preset,
            audio_codec,
            batch,
        } => {
            if !preflight::check_required_tools(&preflight::conversion_tools(&config.tools)) {
                std::process::exit(1);
            }

            let quality = quality.unwrap_or(config.convert.quality);
            let preset = preset.unwrap_or(config.convert.preset);
            let audio_codec = audio_codec.unwrap_or_else(|| config.convert.audio_codec.clone());
            let cancel = cancel_on_ctrl_c();
            let runner = ConversionRunner::new(&config.tools, &config.convert, cli.quiet)
                .with_cancellation(cancel.clone());

            if batch {
                let cwd = std::env::current_dir()?;
                let orchestrator = BatchOrchestrator::new(runner, config.convert.source_extension.clone())
                    .with_cancellation(cancel);
                orchestrator.batch_convert(&cwd, quality, preset, &audio_codec).await?;
            } else if let Some(input) = input_file {
                tracing::info!("Starting conversion for: {}", input.display());
                let request = ConversionRequest::new(input, output_file, quality, preset, audio_codec);
                if !runner.convert(&request).await {
                    std::process::exit(1);
                }
            } else {
                let mut command = Cli::command();
                if let Some(convert) = command.find_subcommand_mut("convert") {
                    convert.print_help()?;
                }
                std::process::exit(1);
            }
        }
        Commands::Download { url, format } => {
            if !preflight::check_required_tools(&preflight::download_tools(&config.tools)) {
                std::process::exit(1);
            }

            let term = Term::stdout();
            let url = match url {
                Some(url) => url,
                None => {
                    term.write_str("Enter the video or playlist URL: ")?;
                    term.read_line()?
                }
            };
            let format = match format {
                Some(format) => format,
                None => {
                    term.write_line("")?;
                    term.write_line("Choose the download format:")?;
                    term.write_line("  1 - MP4 (video)")?;
                    term.write_line("  2 - MP3 (audio)")?;
                    term.write_str("Enter 1 for MP4 or 2 for MP3: ")?;
                    DownloadFormat::from_choice(&term.read_line()?)?
                }
            };

            let request = DownloadRequest::new(&url, format)?;
            let ytdlp = YtDlp::new(config.tools.yt_dlp.clone());
            download::run(&request, &ytdlp, &config.download).await?;
        }
        Commands::Config { show, init } => {
            if init {
                let path = match cli.config.as_deref() {
                    Some(path) => path.to_path_buf(),
                    None => Config::config_path()?,
                };
                if path.exists() {
                    anyhow::bail!("Config file already exists: {}", path.display());
                }
                Config::default().save(&path)?;
                println!("Configuration written to: {}", path.display());
            } else if show {
                config.display();
            } else {
                println!("Configuration file: {}", Config::config_path()?.display());
                println!("Use --show to print the active settings or --init to create the file.");
            }
        }
    }

    Ok(())
}

/// Install the process-wide Ctrl-C listener once and expose it as a token
///
/// Once installed, SIGINT no longer terminates the process, so every stage of
/// a conversion (probe, transcode, the gap between batch files) watches the
/// token instead. A second Ctrl-C exits immediately.
fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to listen for Ctrl-C: {}", e);
            return;
        }
        tracing::info!("Interrupt received, stopping");
        token.cancel();

        if tokio::signal::ctrl_c().await.is_ok() {
            std::process::exit(130);
        }
    });
    cancel
}
