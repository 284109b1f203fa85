//! End-to-end runs of the language profiles over tiny corpora

use phrase_mill::{config::JobConfig, lang::Language, source::PhraseSource};
use std::{collections::HashMap, num::NonZeroUsize, path::Path};

fn nz(value: usize) -> NonZeroUsize {
    NonZeroUsize::new(value).unwrap()
}

fn job(root: &Path, input: &Path) -> JobConfig {
    JobConfig {
        source: PhraseSource::directory(input),
        output: root.join("output"),
        temp: Some(root.join("temp")),
        parallel_degree: nz(2),
        max_n_gram: Some(nz(5)),
        lowercase: false,
        merge_duplicates: true,
        bucket_count: nz(8),
        verbose: false,
    }
}

fn read_output(dir: &Path) -> HashMap<String, u64> {
    let mut map = HashMap::new();
    for entry in std::fs::read_dir(dir).unwrap() {
        let path = entry.unwrap().path();
        for line in std::fs::read_to_string(&path).unwrap().lines() {
            let (phrase, frequency) = line.split_once('\t').unwrap();
            let previous = map.insert(phrase.to_owned(), frequency.parse().unwrap());
            assert_eq!(previous, None, "duplicate phrase {phrase:?} in output");
        }
    }
    map
}

#[tokio::test(flavor = "multi_thread")]
async fn english_profile_end_to_end() {
    let root = tempfile::tempdir().unwrap();
    let input = root.path().join("input");
    std::fs::create_dir_all(&input).unwrap();
    std::fs::create_dir_all(root.path().join("temp")).unwrap();
    std::fs::write(
        input.join("corpus.csv"),
        "don 't worry\t10\n\
         don't worry\t5\n\
         foo - bar\t3\n\
         <s> hello\t2\n\
         visit www.example.com\t4\n\
         pre- and post-war\t6\n\
         won '\t9\n\
         one two three four five six\t8\n",
    )
    .unwrap();

    let job = job(root.path(), &input);
    Language::English.process(&job).await.unwrap();

    let output = read_output(&job.output);
    let expected: HashMap<String, u64> = [
        // The two spellings of "don't worry" merged
        ("don't worry".to_owned(), 15),
        // Isolated hyphen joined
        ("foo-bar".to_owned(), 3),
        // The "and" guard kept the compound list split
        ("pre- and post-war".to_owned(), 6),
    ]
    .into_iter()
    .collect();
    // Removed: the <s> marker phrase, the URL phrase, the cut-off
    // contraction "won '", and the 6-gram
    assert_eq!(output, expected);
}

#[tokio::test(flavor = "multi_thread")]
async fn german_profile_end_to_end() {
    let root = tempfile::tempdir().unwrap();
    let input = root.path().join("input");
    std::fs::create_dir_all(&input).unwrap();
    std::fs::create_dir_all(root.path().join("temp")).unwrap();
    std::fs::write(
        input.join("corpus.csv"),
        "cooperation\t50\n\
         co- operation\t7\n\
         co- und\t3\n\
         Zeitung lesen\t20\n",
    )
    .unwrap();

    // The top vocabulary words become stop words, so a corpus needs some
    // bulk before rare words like "operation" escape the top 100
    let mut corpus = std::fs::read_to_string(input.join("corpus.csv")).unwrap();
    let mut expected: HashMap<String, u64> = [
        // "co- operation" fully joined via the vocabulary, then merged with
        // the plain spelling
        ("cooperation".to_owned(), 57),
        // "und" is a stop word, so the pair keeps its hyphen
        ("co-und".to_owned(), 3),
        ("Zeitung lesen".to_owned(), 20),
    ]
    .into_iter()
    .collect();
    for i in 0..120 {
        let word = format!("filler{i:03}");
        corpus.push_str(&format!("{word}\t1000\n"));
        expected.insert(word, 1000);
    }
    std::fs::write(input.join("corpus.csv"), corpus).unwrap();

    let job = job(root.path(), &input);
    Language::German.process(&job).await.unwrap();

    assert_eq!(read_output(&job.output), expected);
}

#[tokio::test(flavor = "multi_thread")]
async fn agnostic_profile_lowercases_and_merges() {
    let root = tempfile::tempdir().unwrap();
    let input = root.path().join("input");
    std::fs::create_dir_all(&input).unwrap();
    std::fs::create_dir_all(root.path().join("temp")).unwrap();
    std::fs::write(
        input.join("corpus.csv"),
        "Hello World\t10\nhello world\t20\ntoo many words in this phrase here\t5\n",
    )
    .unwrap();

    let mut job = job(root.path(), &input);
    job.lowercase = true;
    Language::Agnostic.process(&job).await.unwrap();

    let output = read_output(&job.output);
    assert_eq!(
        output,
        [("hello world".to_owned(), 30)].into_iter().collect()
    );
}

#[test]
fn english_chain_is_idempotent() {
    use phrase_mill::hyphen::english_join_mapper;
    use phrase_mill::lang::{english_contractions, standard_mappers};
    use phrase_mill::mapper::apply_chain;

    let job = JobConfig {
        source: PhraseSource::empty(),
        output: "unused".into(),
        temp: None,
        parallel_degree: nz(1),
        max_n_gram: Some(nz(5)),
        lowercase: false,
        merge_duplicates: true,
        bucket_count: nz(8),
        verbose: false,
    };
    let mut chain = standard_mappers(&job);
    chain.push(english_join_mapper());
    chain.push(english_contractions().unwrap());

    let frequency = std::num::NonZeroU64::new(100).unwrap();
    for raw in [
        "don 't worry",
        "dont worry",
        "foo - bar",
        "hello, world",
        "Tom 's bar",
        "already clean phrase",
    ] {
        let Some(normalized) = apply_chain(&chain, None, raw, frequency) else {
            panic!("{raw:?} should survive the chain");
        };
        let normalized = normalized.into_owned();
        // Re-applying the full chain to a normalized phrase is a no-op
        let again = apply_chain(&chain, None, &normalized, frequency)
            .unwrap_or_else(|| panic!("{normalized:?} should survive a second pass"));
        assert_eq!(*again, *normalized);
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn profiles_leave_no_temporary_trees_behind() {
    let root = tempfile::tempdir().unwrap();
    let input = root.path().join("input");
    std::fs::create_dir_all(&input).unwrap();
    std::fs::create_dir_all(root.path().join("temp")).unwrap();
    std::fs::write(input.join("corpus.csv"), "hello world\t1\n").unwrap();

    let job = job(root.path(), &input);
    Language::English.process(&job).await.unwrap();

    assert_eq!(
        std::fs::read_dir(root.path().join("temp")).unwrap().count(),
        0,
        "temporary trees must be cleaned up"
    );
}

#[tokio::test]
async fn english_hyphenation_stage_logs_decisions() {
    use phrase_mill::config::EngineOptions;
    use phrase_mill::hyphen::{HyphenationJoiner, Joiner};

    let root = tempfile::tempdir().unwrap();
    let staging = root.path().join("staging");
    let output = root.path().join("output");
    let log_file = root.path().join("join.log");
    std::fs::create_dir_all(&staging).unwrap();
    std::fs::write(
        staging.join("corpus.csv"),
        "foo - bar\t3\nfoo-bar\t2\nfoo -\t1\n",
    )
    .unwrap();

    let options = EngineOptions {
        bucket_count: nz(4),
        ..EngineOptions::default()
    };
    let joiner = HyphenationJoiner::new(Joiner::English, &output, options)
        .with_log_file(&log_file);
    joiner
        .apply(&PhraseSource::directory(&staging))
        .await
        .unwrap();

    // Joined spellings merged, the bare-hyphen fragment is gone
    assert_eq!(
        read_output(&output),
        [("foo-bar".to_owned(), 5)].into_iter().collect()
    );

    // One log line per join decision
    let log = std::fs::read_to_string(&log_file).unwrap();
    assert!(log.contains("Join: foo-bar: foo - bar"));

    // The join pass always consumes its intermediate inputs
    assert!(!staging.join("corpus.csv").exists());
}
