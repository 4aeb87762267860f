mod cli;
mod logging;

use crate::cli::{Cli, Command, PipeArgs};
use clap::Parser;
use lyricpipe_core::{
    CoreError, LyricpipeConfig, Orchestrator, PipelineOptions, Result, TransformPipeline,
    Translator, WriterSink,
};
use lyricpipe_language::{romanizer_for, GoogleTranslateClient};
use lyricpipe_lyrics_spotify::SpotifyLyricsProvider;
use lyricpipe_spotify_api::{
    SpotifyOAuth, SpotifyPoller, SpotifyProviderConfig, SPOTIFY_CONFIG_TEMPLATE,
};
use std::process::ExitCode;
use std::sync::Arc;
use tokio::io::AsyncBufReadExt;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logging();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(CoreError::ConfigNotFound { path }) => {
            eprintln!(
                "Created a new config file at {}. Fill in [providers.spotify], then run `lyricpipe login`.",
                path.display()
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging() {
    logging::init_tracing(logging::check_file_logging_enabled());
}

async fn run(cli: Cli) -> Result<()> {
    // Load config or create template on first run
    let provider_templates: &[&str] = &[SPOTIFY_CONFIG_TEMPLATE];
    let config = LyricpipeConfig::load_or_create(Some(provider_templates))?;

    let spotify_config = SpotifyProviderConfig::from_providers(&config.providers)?
        .ok_or_else(|| CoreError::ConfigMissingField {
            field: "providers.spotify".into(),
        })?;
    spotify_config.validate()?;

    let oauth = Arc::new(SpotifyOAuth::new(&spotify_config));

    match cli.command {
        Command::Login => login(&oauth).await,
        Command::Pipe(args) => pipe(&config, &spotify_config, &args, oauth).await,
    }
}

/// Authorization-code flow: the user opens the URL and pastes back the redirect.
async fn login(oauth: &SpotifyOAuth) -> Result<()> {
    let auth_url = oauth.get_authorize_url()?;

    eprintln!("Open this URL in your browser and authorize lyricpipe:\n\n{auth_url}\n");
    eprintln!("Then paste the URL you were redirected to:");

    let mut redirected = String::new();
    tokio::io::BufReader::new(tokio::io::stdin())
        .read_line(&mut redirected)
        .await?;

    oauth.complete_authorization(&redirected).await?;
    eprintln!("Logged in. Token saved to {}", oauth.token_path().display());
    Ok(())
}

async fn pipe(
    config: &LyricpipeConfig,
    spotify_config: &SpotifyProviderConfig,
    args: &PipeArgs,
    oauth: Arc<SpotifyOAuth>,
) -> Result<()> {
    let pipe_config = args.apply(&config.pipe);
    let options = PipelineOptions::from_config(&pipe_config, &config.sync, &config.timeouts)?;
    let sp_dc = spotify_config.sp_dc()?;

    if !oauth.load_cached_token().await? {
        return Err(CoreError::FatalAuthExpired {
            reason: "not logged in, run `lyricpipe login`".into(),
        });
    }

    let romanizer = if options.romanize {
        Some(romanizer_for(options.romanization_provider)?)
    } else {
        None
    };
    let translator: Option<Box<dyn Translator>> = match &options.translate_to {
        Some(_) => Some(Box::new(GoogleTranslateClient::new()?)),
        None => None,
    };
    let pipeline = TransformPipeline::new(&options, romanizer, translator);
    info!("Transform pipeline: {:?}", pipeline);

    let playback = Box::new(SpotifyPoller::new(oauth));
    let lyrics = Box::new(SpotifyLyricsProvider::with_web_session(
        sp_dc,
        spotify_config.secret_key_url(),
    )?);

    // Create shared cancellation token for graceful shutdown
    let cancel_token = CancellationToken::new();

    // Set up Ctrl+C handler to trigger graceful shutdown
    let ctrlc_token = cancel_token.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        info!("Received Ctrl+C, shutting down gracefully...");
        ctrlc_token.cancel();
    }) {
        error!("Failed to set Ctrl+C handler: {}", e);
    }

    let mut orchestrator = Orchestrator::new(
        &options,
        playback,
        lyrics,
        pipeline,
        Box::new(WriterSink::stdout()),
        Some(cancel_token),
    );

    orchestrator.run().await
}
