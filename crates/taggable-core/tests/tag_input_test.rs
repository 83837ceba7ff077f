//! Input parsing, validation, and normalization through the public API.

use taggable_core::{
    tag_list, Normalizer, Tag, TagField, TagInput, TagName, TaggingConfig, TypeRegistry,
    Taggable,
};

fn tag(id: i64, name: &str, config: &TaggingConfig) -> Tag {
    let now = chrono::Utc::now();
    Tag {
        id,
        name: name.to_string(),
        normalized: config.normalize(name),
        created_at: now,
        updated_at: now,
    }
}

#[test]
fn test_builtin_normalizers_are_idempotent() {
    let samples = [
        "Apple",
        "  Mixed Case  ",
        "ÉCOLE",
        "straße",
        "Web   Dev\tTools",
        "İstanbul",
        "ΣΊΣΥΦΟΣ",
    ];
    for normalizer in [
        Normalizer::Lowercase,
        Normalizer::Trim,
        Normalizer::CollapseWhitespace,
    ] {
        for raw in samples {
            let once = normalizer.normalize(raw);
            assert_eq!(
                normalizer.normalize(&once),
                once,
                "{} is not idempotent on {:?}",
                normalizer,
                raw
            );
        }
    }
}

#[test]
fn test_custom_normalizer_is_used_everywhere() {
    let config = TaggingConfig::default()
        .with_normalizer(Normalizer::custom("slug", |raw| {
            raw.trim().to_lowercase().replace(' ', "-")
        }));

    let name = TagName::new(" Web Dev ", &config).unwrap();
    assert_eq!(name.name(), "Web Dev");
    assert_eq!(name.normalized(), "web-dev");

    let input = TagInput::from("Web Dev,web dev,Rust");
    assert_eq!(input.normalized(&config), vec!["web-dev", "rust"]);
}

#[test]
fn test_lookup_keys_match_stored_keys_for_untrimmed_entries() {
    let config = TaggingConfig::default()
        .with_normalizer(Normalizer::custom("upper", |raw| raw.to_uppercase()));

    let stored = TagName::new(" x", &config).unwrap();
    assert_eq!(stored.normalized(), "X");
    assert_eq!(config.normalize(" x "), "X");
    assert_eq!(
        TagInput::from(vec![" x", "x "]).normalized(&config),
        vec![stored.normalized()]
    );
}

#[test]
fn test_first_spelling_wins_within_one_input() {
    let config = TaggingConfig::default();
    let names = TagInput::from("Apple,APPLE,apple,Banana")
        .tag_names(&config)
        .unwrap();

    let shown: Vec<&str> = names.iter().map(|n| n.name()).collect();
    assert_eq!(shown, vec!["Apple", "Banana"]);
}

#[test]
fn test_list_entries_must_not_contain_delimiters() {
    let config = TaggingConfig::default();
    let err = TagInput::from(vec!["Apple,Banana"])
        .tag_names(&config)
        .unwrap_err();
    assert!(err.is_validation());
}

#[test]
fn test_list_round_trip() {
    let config = TaggingConfig::default().with_delimiters(";,").unwrap();
    let names = TagInput::from(vec!["Apple Pie", " Banana", "cherry "])
        .tag_names(&config)
        .unwrap();
    let tags: Vec<Tag> = names
        .iter()
        .enumerate()
        .map(|(i, n)| tag(i as i64 + 1, n.name(), &config))
        .collect();

    let list = tag_list(&tags, TagField::Name, &config);
    assert_eq!(list, "Apple Pie;Banana;cherry");

    let reparsed: Vec<String> = TagInput::from(list.as_str())
        .tag_names(&config)
        .unwrap()
        .iter()
        .map(|n| n.normalized().to_string())
        .collect();
    let original: Vec<String> = tags.iter().map(|t| t.normalized.clone()).collect();
    assert_eq!(reparsed, original);
}

#[test]
fn test_empty_inputs() {
    let config = TaggingConfig::default();
    for input in [TagInput::from(""), TagInput::from(" , ,"), TagInput::default()] {
        assert!(input.is_empty(&config));
        assert!(input.tag_names(&config).unwrap().is_empty());
        assert!(input.normalized(&config).is_empty());
    }
}

struct Article;

impl Taggable for Article {
    fn taggable_type() -> &'static str {
        "article"
    }

    fn taggable_id(&self) -> i64 {
        0
    }
}

struct LegacyArticle;

impl Taggable for LegacyArticle {
    fn taggable_type() -> &'static str {
        "article"
    }

    fn taggable_id(&self) -> i64 {
        0
    }
}

#[test]
fn test_registry_rejects_discriminator_clash() {
    let registry = TypeRegistry::new().with::<Article>().unwrap();
    assert!(registry.clone().with::<Article>().is_ok());
    assert!(registry.with::<LegacyArticle>().is_err());
}
