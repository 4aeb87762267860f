//! Command-line interface.

use clap::{Args, Parser, Subcommand};
use lyricpipe_core::{HorizontalAlign, PipeConfig, RomanizationProvider, SyncStrategy};

#[derive(Debug, Parser)]
#[command(
    name = "lyricpipe",
    version,
    about = "Pipe the lyrics of the track playing on Spotify to stdout"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Send the currently active lyrics to stdout
    Pipe(PipeArgs),
    /// Authorize lyricpipe to read your Spotify playback state
    Login,
}

/// Overrides for the `[pipe]` config section
#[derive(Debug, Default, Args)]
pub struct PipeArgs {
    /// Add romanized sentences below lines that contain characters that can be romanized
    #[arg(long)]
    pub romanize: bool,

    /// Romanization backend: "kuroshiro" (local, Japanese only) or "gcloud" (Google, many scripts)
    #[arg(long, value_name = "PROVIDER")]
    pub romanization_provider: Option<RomanizationProvider>,

    /// Delay (in ms) between requests to the Spotify API
    #[arg(long, value_name = "MS")]
    pub delay: Option<u64>,

    /// Add a translation into this ISO-639 language code
    #[arg(long, value_name = "CODE")]
    pub translate_to: Option<String>,

    /// Synchronization type: "none", "autoplay" or "balance"
    #[arg(long, value_name = "TYPE")]
    pub sync_type: Option<SyncStrategy>,

    /// Horizontal alignment of output lines: "left", "center" or "right"
    #[arg(long, value_name = "ALIGN")]
    pub horizontal_align: Option<HorizontalAlign>,

    /// Blank lines printed after each line
    #[arg(long, value_name = "N")]
    pub vertical_spacing: Option<usize>,
}

impl PipeArgs {
    /// Layer the flags that were given on top of the configured defaults.
    #[must_use]
    pub fn apply(&self, config: &PipeConfig) -> PipeConfig {
        let mut pipe = config.clone();

        if self.romanize {
            pipe.romanize = true;
        }
        if let Some(provider) = self.romanization_provider {
            pipe.romanization_provider = provider;
        }
        if let Some(delay) = self.delay {
            pipe.delay_ms = delay;
        }
        if let Some(translate_to) = &self.translate_to {
            pipe.translate_to = Some(translate_to.clone());
        }
        if let Some(sync_type) = self.sync_type {
            pipe.sync_type = sync_type;
        }
        if let Some(align) = self.horizontal_align {
            pipe.horizontal_align = align;
        }
        if let Some(spacing) = self.vertical_spacing {
            pipe.vertical_spacing = spacing;
        }

        pipe
    }
}
