//! Poll, synchronize, transform and emit loop.

use crate::error::{CoreError, Result};
use crate::options::{PipelineOptions, Timeouts};
use crate::schedule::{Scheduler, TickKind};
use crate::sink::OutputSink;
use crate::source::{LyricsSource, PlaybackSource};
use crate::sync::{Emission, Synchronizer, TrackTransition};
use crate::time::DurationExt;
use crate::transform::TransformPipeline;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Lifecycle of the pipeline loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrchestratorState {
    /// Not started
    Idle,
    /// Waiting on the playback source
    Polling,
    /// A track is playing and its lyrics are loaded
    TrackActive,
    /// Nothing to emit: no track, no lyrics, or the last poll failed
    TrackIdle,
    /// Cancelled or stopped by a fatal error
    Stopped,
}

/// Drives the pipeline: polls playback, fetches lyrics on track change,
/// selects the current line and writes transformed output to the sink.
///
/// Runs on a single task. The synchronizer state and transformation caches
/// are owned here and never shared.
pub struct Orchestrator {
    playback: Box<dyn PlaybackSource>,
    lyrics: Box<dyn LyricsSource>,
    pipeline: TransformPipeline,
    sink: Box<dyn OutputSink>,
    synchronizer: Synchronizer,
    scheduler: Scheduler,
    timeouts: Timeouts,
    delay: Duration,
    state: OrchestratorState,
    origin: Instant,
    cancel_token: CancellationToken,
}

impl Orchestrator {
    /// Create a new orchestrator
    ///
    /// # Arguments
    /// * `options` - Validated pipeline options
    /// * `playback` - Source polled for the current track and offset
    /// * `lyrics` - Source queried once per track
    /// * `pipeline` - Transformations applied before emission
    /// * `sink` - Destination for rendered lines
    /// * `cancel_token` - Optional external cancellation token for graceful shutdown
    pub fn new(
        options: &PipelineOptions,
        playback: Box<dyn PlaybackSource>,
        lyrics: Box<dyn LyricsSource>,
        pipeline: TransformPipeline,
        sink: Box<dyn OutputSink>,
        cancel_token: Option<CancellationToken>,
    ) -> Self {
        let synchronizer = Synchronizer::new(options.sync_type, &options.drift);
        let scheduler = Scheduler::new(options.delay, synchronizer.policy().map(|p| p.tick));

        Self {
            playback,
            lyrics,
            pipeline,
            sink,
            synchronizer,
            scheduler,
            timeouts: options.timeouts,
            delay: options.delay,
            state: OrchestratorState::Idle,
            origin: Instant::now(),
            cancel_token: cancel_token.unwrap_or_default(),
        }
    }

    /// Get a clone of the cancellation token
    #[must_use]
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    #[must_use]
    pub const fn state(&self) -> OrchestratorState {
        self.state
    }

    /// Run until cancelled or a fatal error occurs.
    ///
    /// # Errors
    ///
    /// Returns the fatal error that stopped the loop: [`CoreError::FatalAuthExpired`]
    /// or [`CoreError::SinkClosed`]. Everything else is logged and recovered from.
    pub async fn run(&mut self) -> Result<()> {
        info!(
            "Starting lyric pipe (playback: {}, lyrics: {}, sync: {}, delay: {}ms)",
            self.playback.name(),
            self.lyrics.name(),
            self.synchronizer.strategy(),
            self.delay.as_millis_u64()
        );

        self.origin = Instant::now();
        self.scheduler = Scheduler::new(self.delay, self.synchronizer.policy().map(|p| p.tick));

        loop {
            let (at, kind) = self.scheduler.next();

            tokio::select! {
                biased;
                () = self.cancel_token.cancelled() => {
                    info!("Lyric pipe shutting down gracefully");
                    self.state = OrchestratorState::Stopped;
                    return Ok(());
                }
                () = tokio::time::sleep_until(self.origin + at) => {}
            }

            let started_at = self.now();
            self.scheduler.complete(kind, started_at);

            if let Err(e) = self.step(kind).await {
                error!("Lyric pipe stopped: {}", e);
                self.state = OrchestratorState::Stopped;
                return Err(e);
            }
        }
    }

    /// Logical time since the loop started
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    async fn step(&mut self, kind: TickKind) -> Result<()> {
        if kind == TickKind::Poll {
            self.poll().await?;
        }

        if self.state == OrchestratorState::TrackActive {
            self.emit(self.now()).await?;
        }

        Ok(())
    }

    async fn poll(&mut self) -> Result<()> {
        self.state = OrchestratorState::Polling;

        let result = with_timeout(
            "playback poll",
            self.timeouts.playback,
            self.playback.current_playback(),
        )
        .await;
        let observed_at = self.now();

        let playback = match result {
            Ok(playback) => playback,
            Err(e) if e.is_fatal() => return Err(e),
            Err(CoreError::NoActiveTrack) => {
                if let Some(track) = self.synchronizer.active_track() {
                    info!("Playback stopped: {}", track);
                }
                self.synchronizer.clear();
                self.state = OrchestratorState::TrackIdle;
                return Ok(());
            }
            Err(e) => {
                warn!("Playback poll failed: {}", e);
                self.state = OrchestratorState::TrackIdle;
                return Ok(());
            }
        };

        debug!(
            "Polled {}: playing={}, position={}ms",
            playback.track,
            playback.is_playing,
            playback.position.as_millis_u64()
        );

        if self.synchronizer.observe(&playback, observed_at) == TrackTransition::Changed {
            info!("Now playing: {}", playback.track);
        }

        if self.synchronizer.needs_document() {
            self.fetch_lyrics(&playback.track.id).await?;
        }

        let loaded = self
            .synchronizer
            .active()
            .is_some_and(|context| context.document().is_some());
        self.state = if loaded {
            OrchestratorState::TrackActive
        } else {
            OrchestratorState::TrackIdle
        };

        Ok(())
    }

    async fn fetch_lyrics(&mut self, track_id: &str) -> Result<()> {
        info!("Fetching lyrics from {} for track {}", self.lyrics.name(), track_id);

        let result = match with_timeout(
            "lyrics fetch",
            self.timeouts.lyrics,
            self.lyrics.fetch_lyrics(track_id),
        )
        .await
        {
            Err(e) if e.is_fatal() => return Err(e),
            other => other,
        };

        match &result {
            Ok(document) => info!(
                "Found {:?} lyrics ({} lines, provider: {})",
                document.sync_type(),
                document.lines().len(),
                document.metadata().provider_display_name
            ),
            Err(CoreError::LyricsNotFound { .. }) => {
                info!("No lyrics available for track {}", track_id);
            }
            Err(e) => warn!("Lyrics fetch failed, retrying on next poll: {}", e),
        }

        self.synchronizer.load_document(track_id, result);
        Ok(())
    }

    async fn emit(&mut self, now: Duration) -> Result<()> {
        let Some(emission) = self.synchronizer.next_emission(now) else {
            return Ok(());
        };
        let Some(document) = self.synchronizer.document_mut() else {
            return Ok(());
        };

        let block = match emission {
            Emission::Line(index) => self.pipeline.render_line(document, index).await,
            Emission::Document => Some(self.pipeline.render_document(document).await),
        };

        if let Some(block) = block {
            debug!("Emitting {:?} at {}ms", emission, now.as_millis_u64());
            self.sink.emit(&block)?;
        }

        Ok(())
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("playback", &self.playback.name())
            .field("lyrics", &self.lyrics.name())
            .field("pipeline", &self.pipeline)
            .field("synchronizer", &self.synchronizer)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

/// Bound an external call, turning an elapsed deadline into [`CoreError::Timeout`].
async fn with_timeout<T, F>(operation: &'static str, timeout: Duration, future: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::time::timeout(timeout, future)
        .await
        .unwrap_or(Err(CoreError::Timeout { operation, timeout }))
}
