use ferret::cli::{SearchArgs, service_request};
use ferret::config::{ResultsFormat, SearchConfig};
use ferret::error::FerretError;
use ferret::index::{IndexFile, IndexWriter, Posting, WordEntry};
use ferret::query::search;

use tempfile::tempdir;

/// cat in files {1,2}, dog in files {2,3}, plus a few others.
fn build_index(writer_path: &std::path::Path) -> IndexFile {
    let mut writer = IndexWriter::new();
    let docs = writer.add_directory("/srv/docs");
    let mail = writer.add_directory("/srv/mail");
    writer.add_file(docs, "zero.html", 100, "Nothing Here");
    writer.add_file(docs, "one.html", 200, "About Cats");
    writer.add_file(mail, "two.txt", 300, "Cats & Dogs");
    writer.add_file(mail, "three.txt", 400, "About Dogs");
    let title = writer.add_meta_name("title");
    writer.add_meta_name("author");

    writer
        .add_word(
            "cat",
            vec![
                Posting::new(1, 4, 120).with_meta_ids(vec![title]),
                Posting::new(2, 1, 40),
            ],
        )
        .add_word(
            "dog",
            vec![
                Posting::new(2, 3, 90).with_meta_ids(vec![title]),
                Posting::new(3, 2, 60),
            ],
        )
        .add_word("catalog", vec![Posting::new(0, 1, 10)])
        .add_word("unique", vec![Posting::new(3, 1, 5)])
        .add_word(
            "walk",
            vec![Posting::new(3, 2, 30).with_positions(vec![3, 17])],
        )
        .add_stop_word("the")
        .add_stop_word("a");

    writer.write_to_path(writer_path).unwrap();
    IndexFile::open(writer_path).unwrap()
}

fn files_of(index: &IndexFile, query: &str) -> Vec<u32> {
    let report = search(index, query, &SearchConfig::default()).unwrap();
    let mut files: Vec<u32> = report.ranked.results.iter().map(|r| r.file_index).collect();
    files.sort_unstable();
    files
}

#[test]
fn test_cat_dog_scenario() {
    let dir = tempdir().unwrap();
    let index = build_index(&dir.path().join("ferret.index"));

    assert_eq!(files_of(&index, "cat and dog"), vec![2]);
    assert_eq!(files_of(&index, "cat or dog"), vec![1, 2, 3]);
    assert_eq!(files_of(&index, "cat and not dog"), vec![1]);

    let report = search(&index, "cat or dog", &SearchConfig::default()).unwrap();
    assert_eq!(report.ranked.results[0].file_index, 2);
    assert_eq!(report.ranked.total, 3);
}

#[test]
fn test_normalization_bounds() {
    let dir = tempdir().unwrap();
    let index = build_index(&dir.path().join("ferret.index"));

    for query in ["cat", "dog or unique", "cat or dog or walk", "cat* or not dog"] {
        let report = search(&index, query, &SearchConfig::default()).unwrap();
        let results = &report.ranked.results;
        assert!(!results.is_empty(), "{query}");
        assert_eq!(results[0].display_rank, 100, "{query}");
        assert!(
            results.iter().all(|r| (1..=100).contains(&r.display_rank)),
            "{query}"
        );
    }
}

#[test]
fn test_and_never_lowers_rank() {
    let dir = tempdir().unwrap();
    let index = build_index(&dir.path().join("ferret.index"));
    let config = SearchConfig::default();

    let both = search(&index, "cat and dog", &config).unwrap();
    let cat = search(&index, "cat", &config).unwrap();
    let dog = search(&index, "dog", &config).unwrap();
    for result in &both.ranked.results {
        for single in [&cat, &dog] {
            let alone = single
                .ranked
                .results
                .iter()
                .find(|r| r.file_index == result.file_index)
                .unwrap();
            assert!(result.rank >= alone.rank);
        }
    }
}

#[test]
fn test_prefix_of_single_word_equals_word() {
    let dir = tempdir().unwrap();
    let index = build_index(&dir.path().join("ferret.index"));
    let config = SearchConfig::default();

    assert_eq!(
        search(&index, "uniq*", &config).unwrap(),
        search(&index, "unique", &config).unwrap()
    );
    assert_eq!(files_of(&index, "cat*"), vec![0, 1, 2]);
}

#[test]
fn test_stop_words_and_unknown_words() {
    let dir = tempdir().unwrap();
    let index = build_index(&dir.path().join("ferret.index"));

    let report = search(&index, "the cat", &SearchConfig::default()).unwrap();
    assert_eq!(report.ignored, vec!["the".to_string()]);
    // An ignored operand contributes nothing, so the intersection is empty.
    assert!(report.ranked.results.is_empty());

    let report = search(&index, "zebra or dog", &SearchConfig::default()).unwrap();
    assert!(report.ignored.is_empty());
    assert_eq!(report.ranked.total, 2);
}

#[test]
fn test_meta_restricted_query() {
    let dir = tempdir().unwrap();
    let index = build_index(&dir.path().join("ferret.index"));

    assert_eq!(files_of(&index, "title = cat"), vec![1]);
    assert_eq!(files_of(&index, "title = (cat or dog)"), vec![1, 2]);
    assert!(files_of(&index, "author = cat").is_empty());
}

#[test]
fn test_malformed_queries() {
    let dir = tempdir().unwrap();
    let index = build_index(&dir.path().join("ferret.index"));

    for query in ["", "(cat", "cat and", "or dog", "cat )"] {
        let result = search(&index, query, &SearchConfig::default());
        assert!(
            matches!(result, Err(FerretError::MalformedQuery(_))),
            "{query:?}"
        );
    }
}

#[test]
fn test_positions_survive_the_file() {
    let dir = tempdir().unwrap();
    let index = build_index(&dir.path().join("ferret.index"));

    let words = index.words();
    let i = words.find(b"walk").unwrap().unwrap();
    let entry = WordEntry::parse(words.entry_bytes(i).unwrap()).unwrap();
    let postings: Vec<Posting> = entry.postings().collect::<Result<_, _>>().unwrap();
    assert_eq!(postings[0].positions, vec![3, 17]);
}

#[test]
fn test_truncated_index_is_corrupt() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("ferret.index");
    build_index(&path);

    let bytes = std::fs::read(&path).unwrap();
    let truncated = dir.path().join("truncated.index");
    std::fs::write(&truncated, &bytes[..bytes.len() / 4]).unwrap();

    let result = IndexFile::open(&truncated);
    assert!(matches!(result, Err(FerretError::IndexCorrupt(_))));
    assert_eq!(result.unwrap_err().exit_code(), 3);
}

#[test]
fn test_service_request_formats() {
    let dir = tempdir().unwrap();
    let index = build_index(&dir.path().join("ferret.index"));

    let run = |args: &[&str]| {
        let args = SearchArgs::from_request(args.iter().copied()).unwrap();
        let mut out = Vec::new();
        service_request(&index, &args, &SearchConfig::default(), &mut out).unwrap();
        String::from_utf8(out).unwrap()
    };

    let classic = run(&["cat", "and", "dog"]);
    assert_eq!(
        classic,
        "# results: 1\n100 /srv/mail/two.txt 300 Cats & Dogs\n"
    );

    let xml = run(&["-F", "xml", "cat", "and", "dog"]);
    assert!(xml.contains("<Title>Cats &amp; Dogs</Title>"));

    let json = run(&["-F", "json", "the", "or", "dog"]);
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["ignored"][0], "the");
    assert_eq!(value["results"], 2);
    assert_eq!(value["files"][0]["path"], "/srv/mail/two.txt");

    let config = SearchConfig::default().with_format(ResultsFormat::Json);
    let args = SearchArgs::from_request(["-F", "classic", "dog"]).unwrap();
    let mut out = Vec::new();
    service_request(&index, &args, &config, &mut out).unwrap();
    assert!(String::from_utf8(out).unwrap().starts_with("# results: 2"));
}
