// Integration tests for dictionary building, lookup and persistence

use std::collections::BTreeSet;
use std::fs;

use termaton::automaton::{is_empty, minus, run, Automaton};
use termaton::dictionary::StopTerms;
use termaton::{
    BoundaryPolicy, Dictionary, DictionaryBuilder, DictionaryConfig, EntityMatch, Entry, Record,
    RecordFormat, TermatonError,
};

fn entries(pairs: &[(&str, &str)]) -> Vec<Entry> {
    pairs.iter().map(|(ids, p)| Entry::new(*ids, *p)).collect()
}

fn build(pairs: &[(&str, &str)]) -> Dictionary {
    Dictionary::from_entries(entries(pairs), &DictionaryConfig::default()).unwrap()
}

fn spans(found: &BTreeSet<EntityMatch>) -> Vec<(usize, usize, String)> {
    found.iter().map(|m| (m.start, m.end, m.joined_ids())).collect()
}

const LEXICON: &[(&str, &str)] = &[
    ("7157", "p53|TP53"),
    ("672", "BRCA1"),
    ("3569", "IL-?6"),
    ("84676", "MURF1"),
    ("84677", "MURF"),
    ("D001943", "breast cancer"),
    ("D009369", "cancer"),
    ("D002945", "cisplatin"),
    ("1026", "p21(/WAF1)?"),
    ("1027", "p21"),
    ("C1", "[Cc]yclin [A-E][0-9]?"),
    ("K1", "kinase"),
];

const TEXTS: &[&str] = &[
    "p53 is linked to cancer",
    "Mutations in TP53 and BRCA1 are associated with breast cancer.",
    "MURF1 protein and MURF, IL6 or IL-6 (IL-6) in p21/WAF1 cells",
    "cyclin D1 kinase; Cyclin E and cisplatin-treated breast cancer lines",
    "no entities at all here",
    "",
];

// ============ Query Semantics ============

#[test]
fn test_end_to_end_two_entities() {
    let dict = build(&[("G1", "p53"), ("D1", "cancer")]);
    let found = dict.find_entries("p53 is linked to cancer");
    assert_eq!(
        spans(&found),
        vec![(0, 3, "G1".to_string()), (17, 23, "D1".to_string())]
    );
    let texts: Vec<&str> = found.iter().map(|m| m.text.as_str()).collect();
    assert_eq!(texts, vec!["p53", "cancer"]);
}

#[test]
fn test_union_of_entries() {
    let dict = build(&[("G1", "p53"), ("G2", "TP53")]);
    assert_eq!(dict.find_entries("p53").len(), 1);
    assert_eq!(dict.find_entries("TP53").len(), 1);
    assert!(dict.find_entries("p54").is_empty());
}

#[test]
fn test_longest_match_wins() {
    let dict = build(&[("M1", "MURF1"), ("M2", "MURF")]);
    let found: Vec<_> = dict.find_entries("MURF1 protein").into_iter().collect();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].text, "MURF1");
    assert_eq!(found[0].ids, vec!["M1".to_string()]);

    let found: Vec<_> = dict.find_entries("MURF protein").into_iter().collect();
    assert_eq!(found[0].ids, vec!["M2".to_string()]);
}

#[test]
fn test_token_alignment() {
    let dict = build(&[("C", "cat")]);
    assert!(dict.find_entries("concatenate").is_empty());
    assert_eq!(spans(&dict.find_entries("the cat sat")), vec![(4, 7, "C".to_string())]);
}

#[test]
fn test_actor_merge_on_shared_surface() {
    let dict = build(&[("3569", "IL6|IL-6"), ("3569;16193", "IL6"), ("999", "interleukin 6")]);
    let found: Vec<_> = dict.find_entries("serum IL6 levels").into_iter().collect();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].ids, vec!["16193".to_string(), "3569".to_string()]);
    assert!(found[0].record().contains(r#"ids="16193;3569""#));

    let found: Vec<_> = dict.find_entries("serum IL-6 levels").into_iter().collect();
    assert_eq!(found[0].ids, vec!["3569".to_string()]);
}

#[test]
fn test_end_of_text_resumes_scanning() {
    let dict = build(&[("D1", "cancer"), ("D2", "lung cancers")]);
    assert_eq!(
        spans(&dict.find_entries("lung cancer")),
        vec![(5, 11, "D1".to_string())]
    );

    let dict = build(&[("G1", "p53"), ("G2", "p53 mutant form"), ("D1", "cancer")]);
    let found = dict.find_entries("p53 mutant cancer");
    assert_eq!(
        spans(&found),
        vec![(0, 3, "G1".to_string()), (11, 17, "D1".to_string())]
    );
    let texts: Vec<&str> = found.iter().map(|m| m.text.as_str()).collect();
    assert_eq!(texts, vec!["p53", "cancer"]);
}

#[test]
fn test_record_uses_character_indices() {
    let dict = build(&[("7124", "TNFα")]);
    let found: Vec<_> = dict.find_entries("anti-TNFα therapy").into_iter().collect();
    assert_eq!(found.len(), 1);
    assert_eq!(
        found[0].record(),
        r#"<entity ids="7124" startIndex="5" endIndex="8">TNFα</entity>"#
    );
}

#[test]
fn test_word_policy_from_config() {
    let config = DictionaryConfig::from_json_str(r#"{"boundary": "word"}"#).unwrap();
    let dict = Dictionary::from_entries(entries(&[("G", "p53")]), &config).unwrap();
    assert_eq!(dict.boundary(), BoundaryPolicy::Word);
    // gene tokenization rejects a match directly followed by '!'
    assert_eq!(dict.find_entries("p53!").len(), 1);
    assert!(build(&[("G", "p53")]).find_entries("p53!").is_empty());
}

// ============ Pruning ============

#[test]
fn test_pruned_entry_is_dropped() {
    let excluded = minus(&Automaton::from_string("the"), &Automaton::from_string("the"));
    assert!(is_empty(&excluded));

    let stop = StopTerms::from_terms(["the"], false);
    let mut builder = DictionaryBuilder::new(DictionaryConfig::default())
        .unwrap()
        .with_stop_terms(stop);
    builder.add_entry(Entry::new("X", "the")).unwrap();
    builder.add_entry(Entry::new("Y", "th[a-z]+")).unwrap();
    let (dict, stats) = builder.build_with_stats().unwrap();

    assert_eq!(stats.skipped_empty, 1);
    assert_eq!(stats.compiled, 1);
    assert!(dict.find_entries("the").is_empty());
    assert_eq!(spans(&dict.find_entries("thymus")), vec![(0, 6, "Y".to_string())]);
}

#[test]
fn test_stop_terms_file_lowercased() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stop.txt");
    fs::write(&path, "# stop terms\nAND\nThe\n").unwrap();

    let config = DictionaryConfig {
        lowercase_stop_terms: true,
        ..DictionaryConfig::default()
    };
    let mut builder = DictionaryBuilder::new(config)
        .unwrap()
        .load_stop_terms(&path)
        .unwrap();
    builder.add_entry(Entry::new("A", "and|andes")).unwrap();
    let dict = builder.build().unwrap();
    assert!(dict.find_entries("and").is_empty());
    assert_eq!(dict.find_entries("andes").len(), 1);
}

// ============ Failure Isolation ============

#[test]
fn test_malformed_patterns_are_skipped() {
    let mut builder = DictionaryBuilder::new(DictionaryConfig::default()).unwrap();
    for (ids, p) in [("A", "alpha"), ("B", "(beta"), ("C", "x{5,2}"), ("D", "delta")] {
        builder.add_entry(Entry::new(ids, p)).unwrap();
    }
    let (dict, stats) = builder.build_with_stats().unwrap();
    assert_eq!(stats.skipped_invalid, 2);
    assert_eq!(dict.find_entries("alpha beta delta").len(), 2);
}

// ============ Sharding ============

#[test]
fn test_shard_independence() {
    let whole = build(LEXICON);
    assert_eq!(whole.shard_count(), 1);

    for k in [1, 2, 3, 5] {
        let config = DictionaryConfig {
            max_patterns_per_shard: k,
            ..DictionaryConfig::default()
        };
        let sharded = Dictionary::from_entries(entries(LEXICON), &config).unwrap();
        assert_eq!(sharded.shard_count(), LEXICON.len().div_ceil(k));
        for text in TEXTS {
            assert_eq!(
                sharded.find_entries(text),
                whole.find_entries(text),
                "shard size {k}, text {text:?}"
            );
        }
    }
}

#[test]
fn test_overlapping_entries_across_shards() {
    let config = DictionaryConfig {
        max_patterns_per_shard: 1,
        ..DictionaryConfig::default()
    };
    let dict = Dictionary::from_entries(
        entries(&[("D1", "breast cancer"), ("D2", "cancer")]),
        &config,
    )
    .unwrap();
    let found = dict.find_entries("breast cancer");
    assert_eq!(spans(&found), vec![(0, 13, "D1".to_string())]);
}

#[test]
fn test_records_with_shard_breaks() {
    let input = "<mwt>\n\
        <r p1=\"G1\">p53</r>\n\
        #shard\n\
        <r p1=\"D1\">cancer</r>\n\
        <r p1=\"G2\">BRCA&lt;1&gt;</r>\n\
        </mwt>\n";
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("lexicon.mwt");
    fs::write(&path, input).unwrap();

    let mut builder = DictionaryBuilder::new(DictionaryConfig::default()).unwrap();
    builder.add_file(&path, RecordFormat::Mwt).unwrap();
    let (dict, stats) = builder.build_with_stats().unwrap();
    assert_eq!(stats.shards, 2);
    assert_eq!(stats.entries, 3);
    assert_eq!(dict.find_entries("p53 and BRCA<1> in cancer").len(), 3);
}

#[test]
fn test_add_records_tsv() {
    let records = termaton::dictionary::read_records(
        "G1\tp53\n#shard\nD1;D2\tcancer\n".as_bytes(),
        RecordFormat::Tsv,
    )
    .collect::<std::io::Result<Vec<Record>>>()
    .unwrap();
    let mut builder = DictionaryBuilder::new(DictionaryConfig::default()).unwrap();
    builder.add_records(records).unwrap();
    let dict = builder.build().unwrap();
    assert_eq!(dict.shard_count(), 2);
    assert_eq!(
        spans(&dict.find_entries("p53 cancer")),
        vec![(0, 3, "G1".to_string()), (4, 10, "D1;D2".to_string())]
    );
}

// ============ Persistence ============

#[test]
fn test_persistence_round_trip() {
    let config = DictionaryConfig {
        max_patterns_per_shard: 4,
        ..DictionaryConfig::default()
    };
    let dict = Dictionary::from_entries(entries(LEXICON), &config).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let written = dict.store_dir(dir.path(), "dictionary").unwrap();
    assert_eq!(written.len(), 3);
    assert!(dir.path().join("dictionary0").is_file());

    let loaded = Dictionary::load_dir(dir.path(), &config).unwrap();
    assert_eq!(loaded.shard_count(), 3);
    for text in TEXTS {
        assert_eq!(loaded.find_entries(text), dict.find_entries(text));
    }
    for (shard, reloaded) in dict.shards().iter().zip(loaded.shards()) {
        for probe in ["p53", "TP53", "IL-6", "cyclin B", "p21/WAF1", "p54", "cance"] {
            assert_eq!(shard.run(probe), reloaded.run(probe), "probe {probe:?}");
        }
    }
}

#[test]
fn test_builder_stores_shards_as_built() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("shards");
    let config = DictionaryConfig {
        max_patterns_per_shard: 2,
        shard_prefix: "genes".into(),
        ..DictionaryConfig::default()
    };
    let mut builder = DictionaryBuilder::new(config.clone()).unwrap().store_to(&out);
    for entry in entries(&[("A", "alpha"), ("B", "beta"), ("C", "gamma")]) {
        builder.add_entry(entry).unwrap();
    }
    builder.build().unwrap();

    let names: BTreeSet<String> = fs::read_dir(&out)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(
        names,
        BTreeSet::from(["genes0".to_string(), "genes1".to_string()])
    );

    let loaded = Dictionary::load_dir(&out, &config).unwrap();
    assert_eq!(loaded.find_entries("alpha beta gamma").len(), 3);
    assert!(run(&loaded.shards()[1].to_automaton(), "gamma"));
}

#[test]
fn test_load_errors() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("missing");
    assert!(matches!(
        Dictionary::load_dir(&missing, &DictionaryConfig::default()),
        Err(TermatonError::Persistence { .. })
    ));

    fs::write(dir.path().join("dictionary0"), b"not an automaton").unwrap();
    assert!(matches!(
        Dictionary::load_dir(dir.path(), &DictionaryConfig::default()),
        Err(TermatonError::InvalidAutomaton(_))
    ));
}

#[test]
fn test_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("termaton.json");
    fs::write(&path, r#"{"max_patterns_per_shard": 500, "minimize": false, "boundary": "any"}"#)
        .unwrap();
    let config = DictionaryConfig::from_json_file(&path).unwrap();
    assert_eq!(config.max_patterns_per_shard, 500);
    assert!(!config.minimize);
    assert_eq!(config.boundary, BoundaryPolicy::Any);

    let dict = Dictionary::from_entries(entries(&[("C", "cat")]), &config).unwrap();
    assert_eq!(dict.find_entries("concatenate").len(), 1);
}
