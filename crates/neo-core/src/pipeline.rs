//! Conversion pipeline - coordinates model acquisition and the engines
//!
//! The `Pipeline` is the main entry point. It handles:
//! - Bundle download, extraction and registration
//! - Model resolution and request building
//! - Separation of the input and conversion of its vocal stem
//!
//! Nothing is cleaned up afterwards: archives, extracted bundles and stems
//! stay in the working directory.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::NeoConfig;
use crate::configure::{build_request, resolve, PitchParams};
use crate::engine::{ConversionEngine, SeparationEngine};
use crate::error::{NeoError, Result};
use crate::fetch::{ArchiveFetcher, FetchProgress, RemoteBundleRequest};
use crate::probe::probe_duration;
use crate::registry::{ModelCatalogEntry, ModelRegistry};
use crate::tag::next_run_tag;
use crate::unpack::unpack;

/// Placeholder shown in place of paths when a download fails
pub const FAILED: &str = "Failed";

/// Stage of a conversion run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStage {
    Validating,
    ProbingDuration,
    Tagging,
    Resolving,
    Separating,
    Converting,
    Complete,
}

impl fmt::Display for RunStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Validating => "validating input",
            Self::ProbingDuration => "probing duration",
            Self::Tagging => "generating run tag",
            Self::Resolving => "resolving model",
            Self::Separating => "separating stems",
            Self::Converting => "converting vocals",
            Self::Complete => "complete",
        };
        f.write_str(name)
    }
}

/// User-facing result of a download: message plus weight and index paths
///
/// On failure both paths read "Failed".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadOutcome {
    pub message: String,
    pub weight: String,
    pub index: String,
}

impl DownloadOutcome {
    fn downloaded(entry: &ModelCatalogEntry) -> Self {
        Self {
            message: format!("Downloaded as {}", entry.model_name),
            weight: entry.weight_file_path.display().to_string(),
            index: entry
                .index_file_path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "None".to_string()),
        }
    }

    fn failed(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            weight: FAILED.to_string(),
            index: FAILED.to_string(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.weight != FAILED
    }

    /// The three status strings, in display order
    pub fn into_triple(self) -> [String; 3] {
        [self.message, self.weight, self.index]
    }
}

/// Orchestrates downloads, separation and conversion
pub struct Pipeline {
    registry: Arc<ModelRegistry>,
    fetcher: ArchiveFetcher,
    work_dir: PathBuf,
    separator: Arc<dyn SeparationEngine>,
    converter: Arc<dyn ConversionEngine>,
    parallel_workers: u32,
    lossy_resample_rate: u32,
}

impl Pipeline {
    /// Create a pipeline, making sure the working directory exists
    pub fn new(
        mut config: NeoConfig,
        registry: Arc<ModelRegistry>,
        separator: Arc<dyn SeparationEngine>,
        converter: Arc<dyn ConversionEngine>,
    ) -> Result<Self> {
        config.validate();
        fs::create_dir_all(&config.work_dir)?;

        Ok(Self {
            registry,
            fetcher: ArchiveFetcher::new(config.fetch, config.work_dir.clone()),
            work_dir: config.work_dir,
            separator,
            converter,
            parallel_workers: config.engine.parallel_workers,
            lossy_resample_rate: config.engine.lossy_resample_rate,
        })
    }

    pub fn registry(&self) -> &Arc<ModelRegistry> {
        &self.registry
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// Download, extract and register a remote bundle
    pub fn acquire_model(
        &self,
        request: &RemoteBundleRequest,
        progress: Option<FetchProgress>,
    ) -> Result<ModelCatalogEntry> {
        let archive = self.fetcher.fetch(&request.url, progress)?;
        let bundle = unpack(&archive.local_path, &self.work_dir)?;
        self.registry
            .scan_and_register(&bundle.directory_path, &request.desired_name)
    }

    /// [`Self::acquire_model`] with failures folded into a status triple
    pub fn download_model(
        &self,
        request: &RemoteBundleRequest,
        progress: Option<FetchProgress>,
    ) -> DownloadOutcome {
        match self.acquire_model(request, progress) {
            Ok(entry) => DownloadOutcome::downloaded(&entry),
            Err(e) => {
                log::warn!("Model download from {} failed: {}", request.url, e);
                DownloadOutcome::failed(download_failure_message(&e))
            }
        }
    }

    /// Convert the vocals of `audio_files[0]` with the named model
    ///
    /// Further files are passed to the conversion engine unseparated, after
    /// the vocal stem. Returns the first output path the engine reports.
    pub fn run(
        &self,
        model_name: &str,
        audio_files: &[PathBuf],
        params: &PitchParams,
    ) -> Result<PathBuf> {
        log_stage(RunStage::Validating);
        let primary = audio_files.first().ok_or(NeoError::NoAudioProvided)?;

        log_stage(RunStage::ProbingDuration);
        match probe_duration(primary) {
            Ok(secs) => log::info!("Duration: {:.2}s", secs),
            Err(e) => log::warn!("{}", e),
        }

        log_stage(RunStage::Tagging);
        let tag = next_run_tag();
        log::info!("Run tag: {}", tag);

        log_stage(RunStage::Resolving);
        let (weight, index) = resolve(&self.registry, model_name)?;
        let request = build_request(
            &tag,
            weight,
            index,
            params,
            primary,
            self.lossy_resample_rate,
        )?;
        log::info!(
            "Model '{}': weights {:?}, index {:?}",
            model_name,
            request.weight_file_path,
            request.index_file_path
        );
        log::info!(
            "Pitch algorithm: {}, pitch level: {}, index influence: {}, \
             median filter: {}, envelope ratio: {}, consonant protection: {}, resample: {}",
            request.pitch_algorithm,
            request.pitch_level,
            request.index_influence,
            request.respiration_median_filter_width,
            request.envelope_ratio,
            request.consonant_breath_protection,
            request.resample_rate
        );

        log_stage(RunStage::Separating);
        let stems = self.separator.separate(primary)?;
        log::info!(
            "{}: vocals {:?}, instrumental {:?}",
            self.separator.name(),
            stems.vocals,
            stems.instrumental
        );

        log_stage(RunStage::Converting);
        // Only the first input is separated; the rest go to the converter as given
        let mut inputs = Vec::with_capacity(audio_files.len());
        inputs.push(stems.vocals);
        inputs.extend(audio_files[1..].iter().cloned());
        if inputs.len() > 1 {
            log::info!(
                "Converting {} further input(s) without separation",
                inputs.len() - 1
            );
        }

        self.converter.apply_config(&request)?;
        let outputs = self
            .converter
            .convert(&inputs, &tag, false, self.parallel_workers)?;
        log::info!("{}: {} output(s)", self.converter.name(), outputs.len());

        let result = outputs.into_iter().next().ok_or_else(|| NeoError::Engine {
            engine: "conversion",
            reason: "engine returned no output files".to_string(),
        })?;

        log_stage(RunStage::Complete);
        log::info!("Result: {:?}", result);
        Ok(result)
    }
}

fn log_stage(stage: RunStage) {
    log::info!("Run stage: {}", stage);
}

/// Message shown to users for a failed download
fn download_failure_message(error: &NeoError) -> String {
    match error {
        NeoError::InvalidSource { .. } => "The URL must be from a trusted model host".to_string(),
        NeoError::TooLarge { limit, .. } => format!(
            "The file is too large. You can only download files up to {} MB in size.",
            limit / 1_000_000
        ),
        NeoError::CorruptArchive { .. } => "Failed to unzip the file".to_string(),
        NeoError::NoModelFound(_) => "No .pth model file found in the archive".to_string(),
        other => format!("Download failed: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::configure::{ConversionRequest, PitchAlgorithm};
    use crate::engine::StemPaths;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeSeparator {
        calls: Mutex<Vec<PathBuf>>,
    }

    impl SeparationEngine for FakeSeparator {
        fn separate(&self, audio: &Path) -> Result<StemPaths> {
            self.calls.lock().unwrap().push(audio.to_path_buf());
            Ok(StemPaths {
                vocals: PathBuf::from("stems/in_(Vocals).wav"),
                instrumental: PathBuf::from("stems/in_(Instrumental).wav"),
            })
        }

        fn name(&self) -> &'static str {
            "fake-separator"
        }
    }

    #[derive(Default)]
    struct FakeConverter {
        applied: Mutex<Vec<ConversionRequest>>,
        converted: Mutex<Vec<(Vec<PathBuf>, String, bool, u32)>>,
        outputs: Vec<PathBuf>,
    }

    impl ConversionEngine for FakeConverter {
        fn apply_config(&self, request: &ConversionRequest) -> Result<()> {
            self.applied.lock().unwrap().push(request.clone());
            Ok(())
        }

        fn convert(
            &self,
            audio_files: &[PathBuf],
            tag: &str,
            overwrite: bool,
            parallel_workers: u32,
        ) -> Result<Vec<PathBuf>> {
            self.converted.lock().unwrap().push((
                audio_files.to_vec(),
                tag.to_string(),
                overwrite,
                parallel_workers,
            ));
            Ok(self.outputs.clone())
        }

        fn name(&self) -> &'static str {
            "fake-converter"
        }
    }

    struct Fixture {
        _dir: tempfile::TempDir,
        pipeline: Pipeline,
        separator: Arc<FakeSeparator>,
        converter: Arc<FakeConverter>,
    }

    fn fixture(outputs: Vec<PathBuf>) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let mut config = NeoConfig::default();
        config.work_dir = dir.path().join("temp");

        let registry = Arc::new(ModelRegistry::new());
        registry.register(ModelCatalogEntry {
            model_name: "Test".to_string(),
            weight_file_path: PathBuf::from("temp/model1/Test.pth"),
            index_file_path: Some(PathBuf::from("temp/model1/Test.index")),
        });

        let separator = Arc::new(FakeSeparator::default());
        let converter = Arc::new(FakeConverter {
            outputs,
            ..Default::default()
        });
        let pipeline =
            Pipeline::new(config, registry, separator.clone(), converter.clone()).unwrap();

        Fixture {
            _dir: dir,
            pipeline,
            separator,
            converter,
        }
    }

    fn params() -> PitchParams {
        PitchParams {
            pitch_algorithm: PitchAlgorithm::Rmvpe,
            pitch_level: 0,
            index_influence: 0.5,
            respiration_median_filter_width: 3,
            envelope_ratio: 0.5,
            consonant_breath_protection: 0.5,
        }
    }

    #[test]
    fn test_end_to_end_run_with_mp3_input() {
        let fx = fixture(vec![PathBuf::from("USER_x/in_(Vocals).wav")]);

        let result = fx
            .pipeline
            .run("Test", &[PathBuf::from("in.mp3")], &params())
            .unwrap();
        assert_eq!(result, PathBuf::from("USER_x/in_(Vocals).wav"));

        assert_eq!(*fx.separator.calls.lock().unwrap(), vec![PathBuf::from("in.mp3")]);

        let applied = fx.converter.applied.lock().unwrap();
        assert_eq!(applied.len(), 1);
        let request = &applied[0];
        assert_eq!(request.resample_rate, 44100);
        assert_eq!(request.weight_file_path, PathBuf::from("temp/model1/Test.pth"));
        assert_eq!(request.pitch_algorithm, PitchAlgorithm::Rmvpe);
        assert_eq!(request.index_influence, 0.5);
        assert_eq!(request.respiration_median_filter_width, 3);

        let converted = fx.converter.converted.lock().unwrap();
        let (files, tag, overwrite, workers) = &converted[0];
        assert_eq!(files, &vec![PathBuf::from("stems/in_(Vocals).wav")]);
        assert_eq!(tag, &request.run_tag);
        assert!(!overwrite);
        assert_eq!(*workers, 8);
    }

    #[test]
    fn test_extra_inputs_follow_the_vocal_stem() {
        let fx = fixture(vec![PathBuf::from("out_a.wav"), PathBuf::from("out_b.wav")]);
        let inputs = [
            PathBuf::from("a.wav"),
            PathBuf::from("b.wav"),
            PathBuf::from("c.wav"),
        ];

        let result = fx.pipeline.run("Test", &inputs, &params()).unwrap();
        assert_eq!(result, PathBuf::from("out_a.wav"));

        assert_eq!(*fx.separator.calls.lock().unwrap(), vec![PathBuf::from("a.wav")]);
        let converted = fx.converter.converted.lock().unwrap();
        assert_eq!(converted.len(), 1);
        assert_eq!(
            converted[0].0,
            vec![
                PathBuf::from("stems/in_(Vocals).wav"),
                PathBuf::from("b.wav"),
                PathBuf::from("c.wav"),
            ]
        );
    }

    #[test]
    fn test_nan_params_fail_before_engines() {
        let fx = fixture(vec![PathBuf::from("out.wav")]);
        let params = PitchParams {
            index_influence: f32::NAN,
            ..params()
        };
        let err = fx
            .pipeline
            .run("Test", &[PathBuf::from("in.wav")], &params)
            .unwrap_err();
        assert!(matches!(err, NeoError::InvalidConfig(_)));
        assert!(fx.separator.calls.lock().unwrap().is_empty());
        assert!(fx.converter.applied.lock().unwrap().is_empty());
    }

    #[test]
    fn test_wav_input_is_not_resampled() {
        let fx = fixture(vec![PathBuf::from("out.wav")]);
        fx.pipeline
            .run("Test", &[PathBuf::from("in.wav")], &params())
            .unwrap();
        assert_eq!(fx.converter.applied.lock().unwrap()[0].resample_rate, 0);
    }

    #[test]
    fn test_empty_audio_fails_before_engines() {
        let fx = fixture(vec![PathBuf::from("out.wav")]);
        let err = fx.pipeline.run("Test", &[], &params()).unwrap_err();
        assert!(matches!(err, NeoError::NoAudioProvided));
        assert!(fx.separator.calls.lock().unwrap().is_empty());
        assert!(fx.converter.applied.lock().unwrap().is_empty());
    }

    #[test]
    fn test_unknown_model_fails_before_separation() {
        let fx = fixture(vec![PathBuf::from("out.wav")]);
        let err = fx
            .pipeline
            .run("Alice", &[PathBuf::from("in.mp3")], &params())
            .unwrap_err();
        assert!(matches!(err, NeoError::ModelNotFound(_)));
        assert!(fx.separator.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_no_outputs_is_engine_error() {
        let fx = fixture(Vec::new());
        let err = fx
            .pipeline
            .run("Test", &[PathBuf::from("in.mp3")], &params())
            .unwrap_err();
        assert!(matches!(err, NeoError::Engine { .. }));
    }

    #[test]
    fn test_run_tags_differ_between_runs() {
        let fx = fixture(vec![PathBuf::from("out.wav")]);
        for _ in 0..2 {
            fx.pipeline
                .run("Test", &[PathBuf::from("in.wav")], &params())
                .unwrap();
        }
        let applied = fx.converter.applied.lock().unwrap();
        assert_ne!(applied[0].run_tag, applied[1].run_tag);
    }

    #[test]
    fn test_untrusted_download_is_failure_triple() {
        let fx = fixture(Vec::new());
        let outcome = fx.pipeline.download_model(
            &RemoteBundleRequest::new("https://example.com/voice.zip", "Voice"),
            None,
        );
        assert!(!outcome.is_success());
        let [message, weight, index] = outcome.into_triple();
        assert!(message.contains("trusted"));
        assert_eq!(weight, FAILED);
        assert_eq!(index, FAILED);
    }

    #[test]
    fn test_acquire_model_registers_downloaded_bundle() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("fixture.zip");
        crate::unpack::tests::write_zip(
            &archive,
            &[("Eve/Eve.pth", "weights"), ("Eve/added_Eve.index", "index")],
        );
        let body = fs::read(&archive).unwrap();
        let head = format!(
            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            body.len()
        );
        let (base, _) = crate::fetch::tests::serve_once(head, body);

        let mut config = NeoConfig::default();
        config.work_dir = dir.path().join("temp");
        config.fetch.trusted_hosts = vec!["127.0.0.1".to_string()];
        let registry = Arc::new(ModelRegistry::new());
        let pipeline = Pipeline::new(
            config,
            registry.clone(),
            Arc::new(FakeSeparator::default()),
            Arc::new(FakeConverter::default()),
        )
        .unwrap();
        assert!(pipeline.work_dir().is_dir());

        let outcome = pipeline.download_model(
            &RemoteBundleRequest::new(format!("{}/eve/blob/main/Eve.zip", base), ""),
            None,
        );
        assert!(outcome.is_success(), "{:?}", outcome);
        assert_eq!(outcome.message, "Downloaded as Eve");

        let entry = registry.get("Eve").unwrap();
        assert!(entry.weight_file_path.starts_with(dir.path().join("temp")));
        assert!(entry.weight_file_path.ends_with("Eve/Eve.pth"));
        assert!(entry.index_file_path.unwrap().ends_with("Eve/added_Eve.index"));
    }

    #[test]
    fn test_download_outcome_formats_entry() {
        let outcome = DownloadOutcome::downloaded(&ModelCatalogEntry {
            model_name: "Alice".to_string(),
            weight_file_path: PathBuf::from("temp/model3/Alice.pth"),
            index_file_path: None,
        });
        assert!(outcome.is_success());
        assert_eq!(outcome.message, "Downloaded as Alice");
        assert_eq!(outcome.weight, "temp/model3/Alice.pth");
        assert_eq!(outcome.index, "None");
    }

    #[test]
    fn test_failure_messages() {
        let too_large = NeoError::TooLarge {
            size: 600_000_000,
            limit: 500_000_000,
        };
        assert!(download_failure_message(&too_large).contains("500 MB"));

        let corrupt = NeoError::CorruptArchive {
            path: PathBuf::from("model1.zip"),
            reason: "bad".to_string(),
        };
        assert_eq!(download_failure_message(&corrupt), "Failed to unzip the file");
    }
}
