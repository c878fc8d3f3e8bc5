/*!
 * End-to-end tests for processing a single episode
 */

use indicatif::ProgressBar;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dualsub::alignment::{PassthroughSynchronizer, SubtitleSynchronizer};
use dualsub::episode::{EpisodeState, EpisodeTask};
use dualsub::pipeline::{EpisodePipeline, PipelineSettings};
use dualsub::providers::mock::{MockBehavior, MockOracle};
use dualsub::subtitle_processor::{SubtitleTrack, TextEncoding};
use dualsub::translation::{BatchPolicy, BatchTranslator, LanguagePair, TranslationCache};

use crate::common::{self, CountingSynchronizer, MissingToolSynchronizer};

const SOURCE_CUES: &[(u64, u64, &str)] = &[
    (1_000, 3_000, "Hi."),
    (10_000, 12_000, "Where are you going?"),
    (20_000, 22_000, "To the store."),
];

struct Fixture {
    _temp_dir: tempfile::TempDir,
    root: PathBuf,
    oracle: Arc<MockOracle>,
    cache: Arc<TranslationCache>,
}

impl Fixture {
    fn new(oracle: MockOracle) -> Self {
        common::init_test_logging();
        let temp_dir = common::create_temp_dir().unwrap();
        let root = temp_dir.path().to_path_buf();
        Self {
            cache: Arc::new(TranslationCache::new(root.join("cache.json"))),
            _temp_dir: temp_dir,
            root,
            oracle: Arc::new(oracle),
        }
    }

    fn pipeline(&self, synchronizer: Arc<dyn SubtitleSynchronizer>) -> EpisodePipeline {
        let config = common::test_config(&self.root);
        let translator = BatchTranslator::new(
            self.oracle.clone(),
            self.cache.clone(),
            BatchPolicy::from_config(&config.translation.common),
            LanguagePair::new("English", "Spanish"),
        );
        EpisodePipeline::new(Arc::new(translator), synchronizer, PipelineSettings::from_config(&config))
    }

    fn task(&self, source: PathBuf, foreign: Option<PathBuf>) -> EpisodeTask {
        EpisodeTask::new(source, foreign, self.root.join("out"), "Friends")
    }

    fn write(&self, dir: &str, name: &str, cues: &[(u64, u64, &str)]) -> PathBuf {
        common::create_test_file(&self.root.join(dir), name, &common::srt_document(cues)).unwrap()
    }
}

fn read_output(path: &Path) -> SubtitleTrack {
    SubtitleTrack::load(path, &[TextEncoding::Utf8], 23.976).unwrap()
}

#[tokio::test]
async fn test_process_withoutForeign_shouldTranslateEveryLine() {
    let fixture = Fixture::new(MockOracle::working());
    let source = fixture.write("en", "Friends.S01E01.srt", SOURCE_CUES);
    let task = fixture.task(source, None);

    let report = fixture
        .pipeline(Arc::new(PassthroughSynchronizer))
        .process(&task, &ProgressBar::hidden())
        .await;

    assert_eq!(report.state, EpisodeState::Saved);
    assert_eq!((report.lines, report.from_foreign, report.translated), (3, 0, 3));
    let output = report.output.unwrap();
    assert_eq!(output, fixture.root.join("out").join("Friends_S01E01_Dual.srt"));

    let track = read_output(&output);
    assert_eq!(track.len(), 3);
    assert_eq!(track.lines[0].text, "<font color=\"#ffff00\">Hi.</font>\nUv.");
    assert_eq!(track.lines[1].start_time_ms, 10_000);
    assert_eq!(track.lines[1].end_time_ms, 12_000);
    assert_eq!(fixture.oracle.batch_calls(), 1);
}

#[tokio::test]
async fn test_process_withFullyOverlappingForeign_shouldNotCallOracle() {
    let fixture = Fixture::new(MockOracle::working());
    let source = fixture.write("en", "Friends.S01E01.srt", SOURCE_CUES);
    let foreign = fixture.write(
        "es",
        "Friends 1x01.srt",
        &[(900, 2_900, "Hola."), (9_000, 11_000, "¿Adónde"), (11_500, 13_000, "vas?"), (20_100, 22_000, "A la tienda.")],
    );
    let synchronizer = Arc::new(CountingSynchronizer::default());
    let task = fixture.task(source, Some(foreign));

    let report = fixture
        .pipeline(synchronizer.clone())
        .process(&task, &ProgressBar::hidden())
        .await;

    assert_eq!(report.state, EpisodeState::Saved);
    assert_eq!(report.from_foreign, 3);
    assert_eq!(fixture.oracle.batch_calls(), 0);
    assert_eq!(synchronizer.calls(), 1);

    let track = read_output(&report.output.unwrap());
    assert_eq!(track.lines[1].text, "<font color=\"#ffff00\">Where are you going?</font>\n¿Adónde vas?");
}

#[tokio::test]
async fn test_process_withPartialForeign_shouldOnlyTranslateUncoveredLines() {
    let fixture = Fixture::new(MockOracle::working());
    let source = fixture.write("en", "Friends.S01E01.srt", SOURCE_CUES);
    let foreign = fixture.write("es", "Friends.S01E01.srt", &[(9_500, 12_500, "¿Adónde vas?")]);
    let task = fixture.task(source, Some(foreign));

    let report = fixture
        .pipeline(Arc::new(PassthroughSynchronizer))
        .process(&task, &ProgressBar::hidden())
        .await;

    assert_eq!(report.state, EpisodeState::Saved);
    assert_eq!((report.from_foreign, report.translated), (1, 2));
    let requests = fixture.oracle.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].items, vec!["Hi.".to_string(), "To the store.".to_string()]);
}

#[tokio::test]
async fn test_process_withMissingAlignmentTool_shouldTranslateEverything() {
    let fixture = Fixture::new(MockOracle::working());
    let source = fixture.write("en", "Friends.S01E01.srt", SOURCE_CUES);
    let foreign = fixture.write("es", "Friends.S01E01.srt", &[(1_000, 22_000, "Todo")]);
    let task = fixture.task(source, Some(foreign));

    let report = fixture
        .pipeline(Arc::new(MissingToolSynchronizer))
        .process(&task, &ProgressBar::hidden())
        .await;

    assert_eq!(report.state, EpisodeState::Saved);
    assert_eq!((report.from_foreign, report.translated), (0, 3));
    // The original foreign file is never modified
    assert!(fs::read_to_string(task.foreign_file.unwrap()).unwrap().contains("Todo"));
}

#[tokio::test]
async fn test_process_withUnparseableForeign_shouldIgnoreIt() {
    let fixture = Fixture::new(MockOracle::working());
    let source = fixture.write("en", "Friends.S01E01.srt", SOURCE_CUES);
    let foreign = common::create_test_file(&fixture.root.join("es"), "Friends.S01E01.srt", "garbage without cues").unwrap();
    let task = fixture.task(source, Some(foreign));

    let report = fixture
        .pipeline(Arc::new(PassthroughSynchronizer))
        .process(&task, &ProgressBar::hidden())
        .await;

    assert_eq!(report.state, EpisodeState::Saved);
    assert_eq!(report.translated, 3);
}

#[tokio::test]
async fn test_process_withUnreadableSource_shouldFailWithoutOutput() {
    let fixture = Fixture::new(MockOracle::working());
    let source = common::create_test_file(&fixture.root.join("en"), "Friends.S01E02.srt", "not a subtitle").unwrap();
    let task = fixture.task(source, None);

    let report = fixture
        .pipeline(Arc::new(PassthroughSynchronizer))
        .process(&task, &ProgressBar::hidden())
        .await;

    assert_eq!(report.state, EpisodeState::Failed);
    assert!(report.error.is_some());
    assert!(report.output.is_none());
    assert!(!task.output_path("srt").exists());
}

#[tokio::test]
async fn test_process_withRepeatedTranslation_shouldSuppressSecondCopy() {
    let oracle = MockOracle::working()
        .with_translation("I have to go.", "Me tengo que ir.")
        .with_translation("I must leave.", "Me tengo que ir.");
    let fixture = Fixture::new(oracle);
    let source = fixture.write(
        "en",
        "Friends.S01E03.srt",
        &[(1_000, 2_000, "I have to go."), (2_000, 3_000, "I must leave.")],
    );
    let task = fixture.task(source, None);

    let report = fixture
        .pipeline(Arc::new(PassthroughSynchronizer))
        .process(&task, &ProgressBar::hidden())
        .await;

    let track = read_output(&report.output.unwrap());
    assert_eq!(track.lines[0].text, "<font color=\"#ffff00\">I have to go.</font>\nMe tengo que ir.");
    assert_eq!(track.lines[1].text, "<font color=\"#ffff00\">I must leave.</font>");
}

#[tokio::test]
async fn test_process_withMicroDvdSource_shouldWriteSubFile() {
    let fixture = Fixture::new(MockOracle::working());
    let source = common::create_test_file(
        &fixture.root.join("en"),
        "Friends.S01E04.sub",
        "{1}{1}25\n{25}{50}Hello|there\n",
    )
    .unwrap();
    let task = fixture.task(source, None);

    let report = fixture
        .pipeline(Arc::new(PassthroughSynchronizer))
        .process(&task, &ProgressBar::hidden())
        .await;

    let output = report.output.unwrap();
    assert_eq!(output.extension().unwrap(), "sub");
    let content = fs::read_to_string(&output).unwrap();
    assert!(content.contains("{25}{50}{c:$00FFFF}Hello there|Uryyb gurer"));
}

#[tokio::test]
async fn test_process_withFailingOracle_shouldStillSaveSourceText() {
    let fixture = Fixture::new(MockOracle::new(MockBehavior::Failing));
    let source = fixture.write("en", "Friends.S01E05.srt", &[(1_000, 2_000, "Hello")]);
    let task = fixture.task(source, None);

    let report = fixture
        .pipeline(Arc::new(PassthroughSynchronizer))
        .process(&task, &ProgressBar::hidden())
        .await;

    assert_eq!(report.state, EpisodeState::Saved);
    let track = read_output(&report.output.unwrap());
    assert_eq!(track.lines[0].text, "<font color=\"#ffff00\">Hello</font>\nHello");
}

#[tokio::test]
async fn test_process_withBlankSourceCue_shouldLeaveItUntouchedAndKeepAntiEcho() {
    let fixture = Fixture::new(MockOracle::working());
    let source = fixture.write(
        "en",
        "Friends.S01E06.srt",
        &[(1_000, 2_000, "Hi there friend."), (3_000, 4_000, " "), (5_000, 6_000, "Okay then.")],
    );
    let foreign = fixture.write(
        "es",
        "Friends.S01E06.srt",
        &[(1_000, 2_000, "Hola amigo mío."), (3_000, 4_000, "Algo largo aquí."), (5_000, 6_000, "Hola amigo mío.")],
    );
    let task = fixture.task(source, Some(foreign));

    let report = fixture
        .pipeline(Arc::new(PassthroughSynchronizer))
        .process(&task, &ProgressBar::hidden())
        .await;

    assert_eq!(report.state, EpisodeState::Saved);
    assert_eq!((report.from_foreign, report.translated), (2, 0));
    assert_eq!(fixture.oracle.batch_calls(), 0);

    let output = report.output.unwrap();
    assert!(!fs::read_to_string(&output).unwrap().contains("Algo largo aquí."));
    let track = read_output(&output);
    assert_eq!(track.len(), 3);
    assert_eq!(track.lines[0].text, "<font color=\"#ffff00\">Hi there friend.</font>\nHola amigo mío.");
    assert_eq!(track.lines[1].text, "");
    assert_eq!(track.lines[2].text, "<font color=\"#ffff00\">Okay then.</font>");
}
