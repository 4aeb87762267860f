pub mod config;
pub mod document;
pub mod error;
pub mod options;
pub mod orchestrator;
pub mod paths;
pub mod playback;
pub mod schedule;
pub mod sink;
pub mod source;
pub mod sync;
pub mod time;
pub mod transform;

pub use config::{
    build_config_template, DriftTuning, LoggingConfig, LyricpipeConfig, PipeConfig,
    ProvidersConfig, TimeoutConfig,
};

pub use document::{DocumentMetadata, LyricDocument, LyricLine, SyncType};
pub use error::{CoreError, Result};
pub use options::{HorizontalAlign, PipelineOptions, RomanizationProvider, SyncStrategy, Timeouts};
pub use orchestrator::{Orchestrator, OrchestratorState};
pub use paths::{config_dir, log_file_path, CONFIG_DIR_NAME, CONFIG_FILE_NAME, LOG_FILE_NAME};
pub use playback::{PlaybackState, TrackInfo};
pub use schedule::{Scheduler, TickKind};
pub use sink::{OutputSink, WriterSink};
pub use source::{AccessTokenProvider, LyricsSource, PlaybackSource};
pub use sync::{ActiveTrackContext, Baseline, DriftPolicy, Emission, Selection, Synchronizer};
pub use time::DurationExt;
pub use transform::{Romanizer, TransformPipeline, Translator};
