/*!
    One conversion from start to finish.
*/

use std::path::{Path, PathBuf};

use tracing::{info, instrument};

use crate::audio::{self, AudioJob, AudioReport};
use crate::merge::{self, MergeReport};
use crate::video::{self, VideoJob, VideoReport};
use crate::{
    Branch, CancelFlag, Error, Result, ReverseConfig, SourceProfile, TempWorkspace, publish,
};

/**
    What a finished conversion produced.
*/
#[derive(Clone, Debug)]
pub struct ReverseOutcome {
    /// The published file.
    pub output: PathBuf,
    pub profile: SourceProfile,
    pub audio: AudioReport,
    pub video: VideoReport,
    pub merge: MergeReport,
}

/**
    Runs conversions with one configuration.

    The audio and video branches run concurrently on the blocking pool and
    are joined before their outputs are merged and published. A failing
    branch cancels its sibling, and nothing is published unless both
    succeed. The run's workspace is removed however the run ends.
*/
#[derive(Clone, Debug)]
pub struct Reverser {
    config: ReverseConfig,
}

impl Reverser {
    pub fn new(config: ReverseConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ReverseConfig {
        &self.config
    }

    #[instrument(skip_all, fields(input = %input.display()))]
    pub async fn reverse(&self, input: &Path, cancel: CancelFlag) -> Result<ReverseOutcome> {
        let profile = SourceProfile::read(input, &self.config)?;
        info!(
            duration_ms = profile.duration.as_millis() as u64,
            width = profile.width,
            height = profile.height,
            "source probed"
        );

        let workspace = TempWorkspace::create_in(&self.config.work_dir)?;
        let result = self.run(input, &profile, &workspace, cancel).await;
        // a leftover workspace is logged by close and does not fail the run
        let _ = workspace.close();

        let (audio, video, merge, output) = result?;
        Ok(ReverseOutcome {
            output,
            profile,
            audio,
            video,
            merge,
        })
    }

    async fn run(
        &self,
        input: &Path,
        profile: &SourceProfile,
        workspace: &TempWorkspace,
        cancel: CancelFlag,
    ) -> Result<(AudioReport, VideoReport, MergeReport, PathBuf)> {
        let (siblings, branch_cancel) = cancel.child();
        let timeout = self.config.encoder_timeout();

        let audio_task = {
            let input = input.to_path_buf();
            let raw_pcm = workspace.raw_pcm();
            let reversed_pcm = workspace.reversed_pcm();
            let output = workspace.audio_track();
            let duration = profile.audio_duration;
            let bit_rate = self.config.audio_bit_rate;
            let cancel = branch_cancel.clone();
            let siblings = siblings.clone();
            tokio::task::spawn_blocking(move || {
                let job = AudioJob {
                    input: &input,
                    raw_pcm: &raw_pcm,
                    reversed_pcm: &reversed_pcm,
                    output: &output,
                    duration,
                    bit_rate,
                    timeout,
                };
                let result = audio::reverse_audio(&job, &cancel);
                if result.is_err() {
                    siblings.cancel();
                }
                result
            })
        };

        let video_task = {
            let input = input.to_path_buf();
            let output = workspace.video_track();
            let profile = profile.clone();
            let pacing = self.config.pacing;
            let frame_cache = self.config.frame_cache;
            let progress_bar = self.config.progress_bar;
            let cancel = branch_cancel.clone();
            let siblings = siblings.clone();
            tokio::task::spawn_blocking(move || {
                let job = VideoJob {
                    input: &input,
                    output: &output,
                    profile: &profile,
                    pacing,
                    frame_cache,
                    progress_bar,
                    timeout,
                };
                let result = video::reverse_video(&job, &cancel);
                if result.is_err() {
                    siblings.cancel();
                }
                result
            })
        };

        let (audio, video) = tokio::join!(audio_task, video_task);
        let (audio, video) = join_branches(audio, video)?;

        let merge = {
            let audio_path = workspace.audio_track();
            let video_path = workspace.video_track();
            let merged = workspace.merged();
            let cancel = cancel.clone();
            tokio::task::spawn_blocking(move || {
                merge::merge_tracks(&audio_path, &video_path, &merged, &cancel)
            })
            .await?
            .map_err(|e| Error::branch(Branch::Merge, e))?
        };

        cancel.check()?;
        let output = {
            let merged = workspace.merged();
            let output_dir = self.config.output_dir.clone();
            let prefix = self.config.file_prefix.clone();
            tokio::task::spawn_blocking(move || publish::publish(&merged, &output_dir, &prefix))
                .await??
        };

        Ok((audio, video, merge, output))
    }
}

type Joined<T> = std::result::Result<Result<T>, tokio::task::JoinError>;

/**
    Combine the two branch results. When one branch failed and the other
    was only cancelled as a consequence, the real failure is reported.
*/
fn join_branches(
    audio: Joined<AudioReport>,
    video: Joined<VideoReport>,
) -> Result<(AudioReport, VideoReport)> {
    let audio = audio
        .map_err(Error::from)
        .and_then(|r| r.map_err(|e| Error::branch(Branch::Audio, e)));
    let video = video
        .map_err(Error::from)
        .and_then(|r| r.map_err(|e| Error::branch(Branch::Video, e)));

    match (audio, video) {
        (Ok(audio), Ok(video)) => Ok((audio, video)),
        (Err(a), Err(v)) if a.is_cancelled() && !v.is_cancelled() => Err(v),
        (Err(e), _) | (_, Err(e)) => Err(e),
    }
}
