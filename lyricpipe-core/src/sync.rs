//! Reconciles polled playback offsets with lyric timestamps.
//!
//! All time inputs are logical: `now` is the pipeline clock (time since the loop
//! started) and never read from the system here, so the same sequence of polls
//! and ticks always selects the same sequence of lines.

use crate::config::DriftTuning;
use crate::document::{LyricDocument, SyncType};
use crate::error::CoreError;
use crate::options::SyncStrategy;
use crate::playback::{PlaybackState, TrackInfo};
use crate::time::DurationExt;
use std::time::Duration;
use tracing::debug;

/// Extrapolation parameters for strategies that advance the offset between polls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriftPolicy {
    /// Polls further than this from the extrapolated offset reset the baseline
    pub resync_threshold: Duration,
    /// Interval at which the current line is re-evaluated between polls
    pub tick: Duration,
}

impl DriftPolicy {
    /// Policy for `strategy`, or `None` when the strategy does not extrapolate.
    #[must_use]
    pub const fn for_strategy(strategy: SyncStrategy, tuning: &DriftTuning) -> Option<Self> {
        match strategy {
            SyncStrategy::None => None,
            SyncStrategy::Autoplay => Some(Self {
                resync_threshold: Duration::from_millis(tuning.autoplay_resync_threshold_ms),
                tick: Duration::from_millis(tuning.autoplay_tick_ms),
            }),
            SyncStrategy::Balance => Some(Self {
                resync_threshold: Duration::from_millis(tuning.balance_resync_threshold_ms),
                tick: Duration::from_millis(tuning.balance_tick_ms),
            }),
        }
    }
}

/// Last trusted offset and the logical time it was observed at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Baseline {
    pub offset: Duration,
    pub observed_at: Duration,
    pub is_playing: bool,
}

impl Baseline {
    #[must_use]
    pub const fn new(offset: Duration, observed_at: Duration, is_playing: bool) -> Self {
        Self {
            offset,
            observed_at,
            is_playing,
        }
    }

    /// Offset at `now`, assuming uninterrupted playback since the observation.
    #[must_use]
    pub fn extrapolate(&self, now: Duration) -> Duration {
        if self.is_playing {
            extrapolate(self.offset, now.saturating_sub(self.observed_at))
        } else {
            self.offset
        }
    }
}

/// Pure extrapolation: last known offset advanced by the elapsed wall-clock time.
#[must_use]
pub fn extrapolate(last_offset: Duration, elapsed: Duration) -> Duration {
    last_offset.saturating_add(elapsed)
}

/// Lyrics state of the active track
#[derive(Debug, Clone, PartialEq, Eq)]
enum DocumentSlot {
    /// Not fetched yet
    Pending,
    Loaded(LyricDocument),
    /// Fetch failed; `retry` is false when the provider has no lyrics at all
    Unavailable { retry: bool },
}

/// Everything tied to the currently playing track.
///
/// Re-created wholesale on every track change so nothing from the previous
/// track (document, baseline, emission history) can leak into the new one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveTrackContext {
    track: TrackInfo,
    document: DocumentSlot,
    baseline: Baseline,
    last_line: Option<usize>,
    unsynced_emitted: bool,
}

impl ActiveTrackContext {
    fn new(track: TrackInfo, baseline: Baseline) -> Self {
        Self {
            track,
            document: DocumentSlot::Pending,
            baseline,
            last_line: None,
            unsynced_emitted: false,
        }
    }

    #[must_use]
    pub const fn track(&self) -> &TrackInfo {
        &self.track
    }

    #[must_use]
    pub const fn baseline(&self) -> &Baseline {
        &self.baseline
    }

    #[must_use]
    pub const fn document(&self) -> Option<&LyricDocument> {
        match &self.document {
            DocumentSlot::Loaded(document) => Some(document),
            _ => None,
        }
    }
}

/// Outcome of feeding a poll result to the synchronizer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackTransition {
    /// Same track as before; the baseline may have been adjusted
    Unchanged,
    /// A different track (or the first one) became active
    Changed,
}

/// What should be on screen right now
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    /// No track is active
    Idle,
    /// Track is active but its lyrics are not loaded yet
    Pending,
    /// Track has no usable lyrics
    NoLyrics,
    /// Synced lyrics, but playback has not reached the first line
    NotStarted,
    /// Index of the current synced line
    Line(usize),
    /// Unsynced lyrics: the whole document
    Document,
}

/// A change that must be rendered and written to the output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Emission {
    Line(usize),
    Document,
}

/// Selects current lyric lines for the active track
#[derive(Debug)]
pub struct Synchronizer {
    strategy: SyncStrategy,
    policy: Option<DriftPolicy>,
    active: Option<ActiveTrackContext>,
}

impl Synchronizer {
    #[must_use]
    pub const fn new(strategy: SyncStrategy, tuning: &DriftTuning) -> Self {
        Self {
            strategy,
            policy: DriftPolicy::for_strategy(strategy, tuning),
            active: None,
        }
    }

    #[must_use]
    pub const fn strategy(&self) -> SyncStrategy {
        self.strategy
    }

    /// Extrapolation policy, `None` for the `none` strategy
    #[must_use]
    pub const fn policy(&self) -> Option<DriftPolicy> {
        self.policy
    }

    #[must_use]
    pub const fn active(&self) -> Option<&ActiveTrackContext> {
        self.active.as_ref()
    }

    #[must_use]
    pub fn active_track(&self) -> Option<&TrackInfo> {
        self.active.as_ref().map(ActiveTrackContext::track)
    }

    /// Feed a poll result observed at logical time `now`.
    pub fn observe(&mut self, state: &PlaybackState, now: Duration) -> TrackTransition {
        let polled = Baseline::new(state.position, now, state.is_playing);

        match self.active.as_mut() {
            Some(context) if state.same_track(&context.track) => {
                context.baseline = reconcile(self.policy, &context.baseline, polled, now);
                TrackTransition::Unchanged
            }
            _ => {
                self.active = Some(ActiveTrackContext::new(state.track.clone(), polled));
                TrackTransition::Changed
            }
        }
    }

    /// Drop the active track, e.g. when nothing is playing anymore.
    pub fn clear(&mut self) {
        self.active = None;
    }

    /// Whether the active track still needs a lyric fetch
    #[must_use]
    pub fn needs_document(&self) -> bool {
        self.active.as_ref().is_some_and(|context| {
            matches!(
                context.document,
                DocumentSlot::Pending | DocumentSlot::Unavailable { retry: true }
            )
        })
    }

    /// Store the fetch result for `track_id`.
    ///
    /// Results for a track that is no longer active are discarded and `false`
    /// is returned.
    pub fn load_document(
        &mut self,
        track_id: &str,
        result: Result<LyricDocument, CoreError>,
    ) -> bool {
        let Some(context) = self.active.as_mut().filter(|c| c.track.id == track_id) else {
            debug!("Discarding lyrics for inactive track {}", track_id);
            return false;
        };

        context.document = match result {
            Ok(document) if document.lines().is_empty() => {
                DocumentSlot::Unavailable { retry: false }
            }
            Ok(document) => DocumentSlot::Loaded(document),
            Err(CoreError::LyricsNotFound { .. }) => DocumentSlot::Unavailable { retry: false },
            Err(_) => DocumentSlot::Unavailable { retry: true },
        };
        true
    }

    /// Mutable access to the active document, for caching transformation output
    pub fn document_mut(&mut self) -> Option<&mut LyricDocument> {
        match self.active.as_mut().map(|context| &mut context.document) {
            Some(DocumentSlot::Loaded(document)) => Some(document),
            _ => None,
        }
    }

    /// Effective elapsed offset of the active track at `now`.
    #[must_use]
    pub fn position(&self, now: Duration) -> Option<Duration> {
        let baseline = &self.active.as_ref()?.baseline;
        Some(match self.policy {
            None => baseline.offset,
            Some(_) => baseline.extrapolate(now),
        })
    }

    /// Current selection at `now`, without recording anything.
    #[must_use]
    pub fn selection(&self, now: Duration) -> Selection {
        let Some(context) = self.active.as_ref() else {
            return Selection::Idle;
        };

        match &context.document {
            DocumentSlot::Pending => Selection::Pending,
            DocumentSlot::Unavailable { .. } => Selection::NoLyrics,
            DocumentSlot::Loaded(document) => match document.sync_type() {
                SyncType::Unsynced => Selection::Document,
                SyncType::LineSynced => {
                    let position = self.position(now).unwrap_or(Duration::ZERO);
                    document
                        .current_line_index(position)
                        .map_or(Selection::NotStarted, Selection::Line)
                }
            },
        }
    }

    /// Selection at `now` if it differs from what was last emitted for this track.
    pub fn next_emission(&mut self, now: Duration) -> Option<Emission> {
        let selection = self.selection(now);
        let context = self.active.as_mut()?;

        match selection {
            Selection::Line(index) if context.last_line != Some(index) => {
                context.last_line = Some(index);
                Some(Emission::Line(index))
            }
            Selection::NotStarted => {
                // Re-entering the first line after seeking back emits it again
                context.last_line = None;
                None
            }
            Selection::Document if !context.unsynced_emitted => {
                context.unsynced_emitted = true;
                Some(Emission::Document)
            }
            _ => None,
        }
    }
}

/// Merge a fresh poll into the baseline according to the drift policy.
fn reconcile(
    policy: Option<DriftPolicy>,
    current: &Baseline,
    polled: Baseline,
    now: Duration,
) -> Baseline {
    let Some(policy) = policy else {
        return polled;
    };

    if current.is_playing != polled.is_playing {
        debug!(
            "Play state changed (playing={}), resyncing at {}ms",
            polled.is_playing,
            polled.offset.as_millis_u64()
        );
        return polled;
    }

    let expected = current.extrapolate(now);
    let drift = expected.distance(polled.offset);

    if drift > policy.resync_threshold {
        debug!(
            "Poll contradicts extrapolation by {}ms (threshold {}ms), resyncing",
            drift.as_millis_u64(),
            policy.resync_threshold.as_millis_u64()
        );
        return polled;
    }

    if polled.offset > expected {
        // Only ever move forward within the threshold so output stays monotonic
        polled
    } else {
        *current
    }
}
