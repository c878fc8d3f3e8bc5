/*!
 * Tests for ordered batch translation, retries and fallbacks
 */

use std::sync::Arc;
use std::time::Duration;

use dualsub::providers::mock::{MockBehavior, MockOracle};
use dualsub::translation::{BatchPolicy, BatchTranslator, LanguagePair, TranslationCache, ERROR_SENTINEL};

use crate::common;

fn policy() -> BatchPolicy {
    BatchPolicy {
        rate_limit_wait: Duration::from_millis(1),
        ..BatchPolicy::default()
    }
}

fn translator(oracle: &Arc<MockOracle>, cache: &Arc<TranslationCache>) -> BatchTranslator {
    BatchTranslator::new(
        oracle.clone(),
        cache.clone(),
        policy(),
        LanguagePair::new("English", "Spanish"),
    )
}

fn memory_cache() -> Arc<TranslationCache> {
    Arc::new(TranslationCache::new("unused_cache.json"))
}

fn lines(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn test_translate_batch_withSingleLine_shouldReturnOneTranslation() {
    let oracle = Arc::new(MockOracle::working());
    let cache = memory_cache();
    let output = translator(&oracle, &cache).translate_batch(&lines(&["Good morning"])).await;

    assert_eq!(output, vec![MockOracle::fake_translate("Good morning")]);
    assert_eq!(oracle.batch_calls(), 1);
}

#[tokio::test]
async fn test_translate_batch_withManyLines_shouldPreserveOrder() {
    let oracle = Arc::new(MockOracle::working());
    let cache = memory_cache();
    let input: Vec<String> = (0..12).map(|i| format!("Line number {}", i)).collect();

    let output = translator(&oracle, &cache).translate_batch(&input).await;

    let expected: Vec<String> = input.iter().map(|s| MockOracle::fake_translate(s)).collect();
    assert_eq!(output, expected);
    assert_eq!(oracle.requests()[0].items, input);
}

#[tokio::test]
async fn test_translate_batch_twice_shouldCallOracleOnce() {
    let oracle = Arc::new(MockOracle::working());
    let cache = memory_cache();
    let translator = translator(&oracle, &cache);
    let input = lines(&["How are you", "Fine thanks"]);

    let first = translator.translate_batch(&input).await;
    let second = translator.translate_batch(&input).await;

    assert_eq!(first, second);
    assert_eq!(oracle.batch_calls(), 1);
    assert_eq!(cache.len(), 2);
}

#[tokio::test]
async fn test_translate_batch_withCachedLine_shouldSkipOracle() {
    let oracle = Arc::new(MockOracle::working());
    let cache = memory_cache();
    cache.put("Yeah.", "Sí.");

    let output = translator(&oracle, &cache).translate_batch(&lines(&["Yeah."])).await;

    assert_eq!(output, vec!["Sí.".to_string()]);
    assert_eq!(oracle.batch_calls(), 0);
}

#[tokio::test]
async fn test_translate_batch_withMixedCacheHits_shouldOnlySendMisses() {
    let oracle = Arc::new(MockOracle::working());
    let cache = memory_cache();
    cache.put("Hello", "Hola");

    let output = translator(&oracle, &cache)
        .translate_batch(&lines(&["Hello", "", "Goodbye"]))
        .await;

    assert_eq!(output[0], "Hola");
    assert_eq!(output[1], "");
    assert_eq!(output[2], MockOracle::fake_translate("Goodbye"));
    assert_eq!(oracle.requests()[0].items, lines(&["Goodbye"]));
}

#[tokio::test]
async fn test_translate_batch_withOnlyBlanks_shouldNotCallOracle() {
    let oracle = Arc::new(MockOracle::working());
    let cache = memory_cache();
    let input = lines(&["", "   "]);

    let output = translator(&oracle, &cache).translate_batch(&input).await;

    assert_eq!(output, input);
    assert_eq!(oracle.batch_calls(), 0);
}

#[tokio::test]
async fn test_translate_batch_withShortResponseAndFewItems_shouldRetryThenTranslateLineByLine() {
    let oracle = Arc::new(MockOracle::new(MockBehavior::ShortResponse));
    let cache = memory_cache();
    let input = lines(&["One line", "Two lines"]);

    let output = translator(&oracle, &cache).translate_batch(&input).await;

    assert_eq!(oracle.batch_calls(), 3);
    assert_eq!(oracle.line_calls(), 2);
    assert_eq!(output[0], MockOracle::fake_translate("One line"));
    assert_eq!(output[1], MockOracle::fake_translate("Two lines"));
}

#[tokio::test]
async fn test_translate_batch_withShortResponseAndManyItems_shouldFillSentinels() {
    let oracle = Arc::new(MockOracle::new(MockBehavior::ShortResponse));
    let cache = memory_cache();
    let input: Vec<String> = (0..6).map(|i| format!("Sentence {}", i)).collect();

    let output = translator(&oracle, &cache).translate_batch(&input).await;

    assert_eq!(oracle.batch_calls(), 3);
    assert_eq!(oracle.line_calls(), 0);
    assert!(output.iter().all(|t| t == ERROR_SENTINEL));
    assert!(cache.is_empty());
}

#[tokio::test]
async fn test_translate_batch_withShortFirstResponse_shouldAcceptSecondAttempt() {
    let oracle = Arc::new(MockOracle::new(MockBehavior::ShortFirst(1)));
    let cache = memory_cache();

    let output = translator(&oracle, &cache)
        .translate_batch(&lines(&["Where is the car", "In the garage"]))
        .await;

    assert_eq!(oracle.batch_calls(), 2);
    assert_eq!(output[1], MockOracle::fake_translate("In the garage"));
}

#[tokio::test]
async fn test_translate_batch_withEchoFirst_shouldRetryWithCorrection() {
    let oracle = Arc::new(MockOracle::new(MockBehavior::EchoFirst(1)));
    let cache = memory_cache();
    let input = lines(&["Where are you going", "I am going home", "See you later"]);

    let output = translator(&oracle, &cache).translate_batch(&input).await;

    let requests = oracle.requests();
    assert_eq!(requests.len(), 2);
    assert!(requests[0].corrections.is_empty());
    assert_eq!(requests[1].corrections.len(), 1);
    assert!(requests[1].corrections[0].starts_with("CRITICAL ERROR"));
    assert!(requests[1].corrections[0].contains("SPANISH"));
    assert_eq!(output[0], MockOracle::fake_translate("Where are you going"));
}

#[tokio::test]
async fn test_translate_batch_withPersistentEcho_shouldAskLineByLine() {
    let oracle = Arc::new(MockOracle::new(MockBehavior::Echo));
    let cache = memory_cache();
    let input = lines(&["Nice to meet you"]);

    let output = translator(&oracle, &cache).translate_batch(&input).await;

    assert_eq!(oracle.batch_calls(), 3);
    // Emergency call answers with the fake translation
    assert_eq!(oracle.line_calls(), 1);
    assert_eq!(output[0], MockOracle::fake_translate("Nice to meet you"));
}

#[tokio::test]
async fn test_translate_batch_withRateLimitedFirst_shouldWaitAndSucceed() {
    let oracle = Arc::new(MockOracle::new(MockBehavior::RateLimitedFirst(2)));
    let cache = memory_cache();

    let output = translator(&oracle, &cache).translate_batch(&lines(&["Thank you"])).await;

    assert_eq!(oracle.batch_calls(), 3);
    assert_eq!(output, vec![MockOracle::fake_translate("Thank you")]);
    assert_eq!(cache.get("Thank you"), Some(MockOracle::fake_translate("Thank you")));
}

#[tokio::test]
async fn test_translate_batch_withFailingOracle_shouldFallBackToSourceUncached() {
    let oracle = Arc::new(MockOracle::new(MockBehavior::Failing));
    let cache = memory_cache();
    let input = lines(&["Help me", "Please"]);

    let output = translator(&oracle, &cache).translate_batch(&input).await;

    assert_eq!(output, input);
    assert!(cache.is_empty());
}

#[tokio::test]
async fn test_translate_all_withChunks_shouldKeepGlobalOrder() {
    let oracle = Arc::new(MockOracle::working());
    let cache = memory_cache();
    let translator = BatchTranslator::new(
        oracle.clone(),
        cache,
        BatchPolicy {
            batch_size: 3,
            ..policy()
        },
        LanguagePair::new("English", "Spanish"),
    );
    let input: Vec<String> = (0..7).map(|i| format!("Caption {}", i)).collect();
    let mut progress = Vec::new();

    let output = translator.translate_all(&input, |done, total| progress.push((done, total))).await;

    let expected: Vec<String> = input.iter().map(|s| MockOracle::fake_translate(s)).collect();
    assert_eq!(output, expected);
    assert_eq!(progress, vec![(1, 3), (2, 3), (3, 3)]);
    assert_eq!(oracle.batch_calls(), 3);
}

#[tokio::test]
async fn test_translate_batch_withPersistedCache_shouldServeAfterReload() {
    let temp_dir = common::create_temp_dir().unwrap();
    let cache_path = temp_dir.path().join("cache.json");

    {
        let oracle = Arc::new(MockOracle::working());
        let cache = Arc::new(TranslationCache::open(&cache_path));
        translator(&oracle, &cache).translate_batch(&lines(&["Good night"])).await;
        cache.flush_to_disk().unwrap();
    }

    let oracle = Arc::new(MockOracle::working());
    let cache = Arc::new(TranslationCache::open(&cache_path));
    let output = translator(&oracle, &cache).translate_batch(&lines(&["Good night"])).await;

    assert_eq!(output, vec![MockOracle::fake_translate("Good night")]);
    assert_eq!(oracle.batch_calls(), 0);
}
