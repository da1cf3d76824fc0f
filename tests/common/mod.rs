//! Shared test harness for integration tests.
//!
//! Provides [`Harness`], which owns a scratch directory holding scene inputs,
//! a dedicated working directory and an output directory, plus recording
//! fakes for every collaborator so runs need no ffmpeg.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tempfile::TempDir;

use ef_av::{
    AudioStream, CardSpec, EncodeTarget, Encoder, ImageRenderer, MediaInfo, Prober, VideoStream,
};
use ef_core::config::Config;
use ef_core::{AudioCodec, ColorGrade, Container, TransitionSpec, VideoCodec};
use ef_pipeline::{Collaborators, EpisodeProducer, EpisodeRequest, SceneDescriptor};

// ---------------------------------------------------------------------------
// Call log
// ---------------------------------------------------------------------------

/// One collaborator invocation, in the order it happened.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    RenderCard { first_line: String },
    ComposeScene { animation: PathBuf, audio: PathBuf },
    Concat { inputs: usize },
    Transition { kind: String },
    Grade,
    Export,
    Probe,
}

#[derive(Debug, Default)]
pub struct CallLog {
    calls: Mutex<Vec<Call>>,
}

impl CallLog {
    pub fn record(&self, call: Call) {
        self.calls.lock().push(call);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn compositions(&self) -> Vec<PathBuf> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::ComposeScene { animation, .. } => Some(animation),
                _ => None,
            })
            .collect()
    }

    pub fn transitions(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Transition { kind } => Some(kind),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.lock().iter().filter(|c| pred(c)).count()
    }
}

// ---------------------------------------------------------------------------
// Fake collaborators
// ---------------------------------------------------------------------------

/// Encoder that writes small text files instead of video.
///
/// Concatenation and transitions write their inputs back to back, so the
/// published file shows the order in which clips were assembled.
#[derive(Debug, Default)]
pub struct RecordingEncoder {
    pub log: Arc<CallLog>,
    fail_on: Mutex<Option<&'static str>>,
    stall_on: Mutex<Option<(&'static str, Duration)>>,
    jam_input_of: Mutex<Option<&'static str>>,
}

impl RecordingEncoder {
    pub fn new(log: Arc<CallLog>) -> Self {
        Self {
            log,
            ..Default::default()
        }
    }

    /// Make the named operation fail with a tool error.
    pub fn fail_on(&self, op: &'static str) {
        *self.fail_on.lock() = Some(op);
    }

    /// Make the named operation sleep before doing anything.
    pub fn stall_on(&self, op: &'static str, delay: Duration) {
        *self.stall_on.lock() = Some((op, delay));
    }

    /// After the named single-input operation succeeds, swap its input for a
    /// non-empty directory that `remove_file` cannot delete.
    pub fn jam_input_of(&self, op: &'static str) {
        *self.jam_input_of.lock() = Some(op);
    }

    fn finish(&self, op: &'static str, input: &Path) -> ef_core::Result<()> {
        if *self.jam_input_of.lock() == Some(op) {
            std::fs::remove_file(input)?;
            std::fs::create_dir(input)?;
            std::fs::write(input.join("stuck"), b"x")?;
        }
        Ok(())
    }

    async fn begin(&self, op: &'static str) -> ef_core::Result<()> {
        let stall = *self.stall_on.lock();
        if let Some((name, delay)) = stall {
            if name == op {
                tokio::time::sleep(delay).await;
            }
        }
        if *self.fail_on.lock() == Some(op) {
            return Err(ef_core::Error::tool("fake-encoder", format!("{op} failed")));
        }
        Ok(())
    }
}

fn join_files(inputs: &[&Path], output: &Path) -> ef_core::Result<()> {
    let mut content = Vec::new();
    for input in inputs {
        content.extend(std::fs::read(input)?);
    }
    std::fs::write(output, content)?;
    Ok(())
}

#[async_trait]
impl Encoder for RecordingEncoder {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn compose_scene(
        &self,
        animation: &Path,
        audio: &Path,
        output: &Path,
        _target: &EncodeTarget,
    ) -> ef_core::Result<()> {
        self.log.record(Call::ComposeScene {
            animation: animation.to_path_buf(),
            audio: audio.to_path_buf(),
        });
        self.begin("compose_scene").await?;
        let name = animation.file_name().unwrap_or_default().to_string_lossy();
        std::fs::write(output, format!("scene:{name}\n"))?;
        Ok(())
    }

    async fn concat(
        &self,
        inputs: &[PathBuf],
        output: &Path,
        _target: &EncodeTarget,
    ) -> ef_core::Result<()> {
        self.log.record(Call::Concat {
            inputs: inputs.len(),
        });
        self.begin("concat").await?;
        let inputs: Vec<&Path> = inputs.iter().map(PathBuf::as_path).collect();
        join_files(&inputs, output)
    }

    async fn transition(
        &self,
        first: &Path,
        second: &Path,
        spec: &TransitionSpec,
        output: &Path,
        _target: &EncodeTarget,
    ) -> ef_core::Result<()> {
        self.log.record(Call::Transition {
            kind: spec.kind.to_string(),
        });
        self.begin("transition").await?;
        join_files(&[first, second], output)
    }

    async fn grade(
        &self,
        input: &Path,
        _grade: &ColorGrade,
        output: &Path,
        _target: &EncodeTarget,
    ) -> ef_core::Result<()> {
        self.log.record(Call::Grade);
        self.begin("grade").await?;
        join_files(&[input], output)?;
        self.finish("grade", input)
    }

    async fn export(
        &self,
        input: &Path,
        output: &Path,
        _target: &EncodeTarget,
    ) -> ef_core::Result<()> {
        self.log.record(Call::Export);
        self.begin("export").await?;
        join_files(&[input], output)?;
        self.finish("export", input)
    }
}

/// Renderer that writes the card's text lines.
#[derive(Debug)]
pub struct RecordingRenderer {
    pub log: Arc<CallLog>,
}

#[async_trait]
impl ImageRenderer for RecordingRenderer {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn render_card(
        &self,
        card: &CardSpec,
        output: &Path,
        _target: &EncodeTarget,
    ) -> ef_core::Result<()> {
        let first_line = card.lines.first().map(|l| l.text.clone()).unwrap_or_default();
        self.log.record(Call::RenderCard {
            first_line: first_line.clone(),
        });
        std::fs::write(output, format!("card:{first_line}\n"))?;
        Ok(())
    }
}

/// Prober that reports whatever [`MediaInfo`] the test configured.
#[derive(Debug)]
pub struct FakeProber {
    pub log: Arc<CallLog>,
    info: Mutex<MediaInfo>,
}

impl FakeProber {
    pub fn new(log: Arc<CallLog>) -> Self {
        Self {
            log,
            info: Mutex::new(compliant_media()),
        }
    }

    /// Change the reported media properties.
    pub fn set(&self, f: impl FnOnce(&mut MediaInfo)) {
        f(&mut self.info.lock());
    }
}

#[async_trait]
impl Prober for FakeProber {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn probe(&self, path: &Path) -> ef_core::Result<MediaInfo> {
        self.log.record(Call::Probe);
        let mut info = self.info.lock().clone();
        info.path = path.to_path_buf();
        Ok(info)
    }
}

/// A 1080p30 H.264/AAC MP4 of one minute, acceptable to the `youtube` profile.
pub fn compliant_media() -> MediaInfo {
    MediaInfo {
        path: PathBuf::new(),
        container: Some(Container::Mp4),
        format_name: "mov,mp4,m4a,3gp,3g2,mj2".into(),
        duration: Some(Duration::from_secs(60)),
        file_size: 0,
        video: Some(VideoStream {
            codec: Some(VideoCodec::H264),
            codec_name: "h264".into(),
            width: 1920,
            height: 1080,
            frame_rate: Some(30.0),
        }),
        audio: Some(AudioStream {
            codec: Some(AudioCodec::Aac),
            codec_name: "aac".into(),
            channels: 2,
            sample_rate: Some(48_000),
        }),
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

/// Scratch space and fakes for one simulated production.
pub struct Harness {
    pub root: TempDir,
    pub working_dir: PathBuf,
    pub log: Arc<CallLog>,
    pub encoder: Arc<RecordingEncoder>,
    pub renderer: Arc<RecordingRenderer>,
    pub prober: Arc<FakeProber>,
    pub config: Config,
}

impl Harness {
    pub fn new() -> Self {
        let root = tempfile::tempdir().expect("failed to create scratch dir");
        let working_dir = root.path().join("work");
        std::fs::create_dir_all(&working_dir).expect("failed to create working dir");
        Self::with_working_dir(root, working_dir)
    }

    /// Use a working directory outside the harness, e.g. one shared with
    /// another harness.
    pub fn with_working_dir(root: TempDir, working_dir: PathBuf) -> Self {
        let log = Arc::new(CallLog::default());
        let mut config = Config::default();
        config.pipeline.working_dir = Some(working_dir.clone());

        Self {
            root,
            working_dir,
            encoder: Arc::new(RecordingEncoder::new(log.clone())),
            renderer: Arc::new(RecordingRenderer { log: log.clone() }),
            prober: Arc::new(FakeProber::new(log.clone())),
            log,
            config,
        }
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            encoder: self.encoder.clone(),
            renderer: self.renderer.clone(),
            prober: self.prober.clone(),
        }
    }

    pub fn producer(&self) -> EpisodeProducer {
        EpisodeProducer::new(self.config.clone(), self.collaborators())
    }

    /// Write the animation and audio inputs for scene `n` and describe them.
    pub fn scene(&self, n: usize) -> SceneDescriptor {
        let dir = self.root.path().join("scenes");
        std::fs::create_dir_all(&dir).expect("failed to create scenes dir");
        let animation = dir.join(format!("scene-{n}.mp4"));
        let audio = dir.join(format!("scene-{n}.wav"));
        std::fs::write(&animation, b"animation").expect("failed to write animation");
        std::fs::write(&audio, b"audio").expect("failed to write audio");
        SceneDescriptor::new(animation, audio)
    }

    /// A request for `scenes` scenes with every input in place.
    pub fn request(&self, scenes: usize) -> EpisodeRequest {
        EpisodeRequest {
            show_title: "Harbor Lights".into(),
            episode_title: "The Long Tide".into(),
            episode_number: 2,
            season_number: 1,
            scenes: (1..=scenes).map(|n| self.scene(n)).collect(),
            title_card: Default::default(),
            credits: Default::default(),
            output: self.output_path(),
            quality: None,
            profile: None,
            transition: None,
            grade: None,
        }
    }

    pub fn output_path(&self) -> PathBuf {
        self.root.path().join("out").join("episode.mp4")
    }

    /// Everything left in the working directory.
    pub fn working_dir_entries(&self) -> Vec<PathBuf> {
        list_dir(&self.working_dir)
    }
}

pub fn list_dir(dir: &Path) -> Vec<PathBuf> {
    match std::fs::read_dir(dir) {
        Ok(entries) => entries.filter_map(|e| e.ok()).map(|e| e.path()).collect(),
        Err(_) => Vec::new(),
    }
}
