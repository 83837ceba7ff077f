//! Tag rows: find-or-create, lookup, listing, and administrative deletion.
//!
//! Requires a PostgreSQL server at DATABASE_URL (see test_fixtures).

use futures::future::join_all;

use taggable_db::test_fixtures::TestDatabase;
use taggable_db::{Error, TagRepository, TaggableExt, TaggableRef, TaggableRepository};

/// "CATS", "cats" and "Cats" must resolve to one row.
#[tokio::test]
#[ignore] // Requires DATABASE_URL
async fn test_find_or_create_is_case_insensitive() {
    let test_db = TestDatabase::new().await;
    let tags = &test_db.db.tags;

    let first = tags.find_or_create("CATS").await.unwrap();
    let second = tags.find_or_create("cats").await.unwrap();
    let third = tags.find_or_create("  Cats ").await.unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(first.id, third.id);
    assert_eq!(first.name, "CATS");
    assert_eq!(third.name, "CATS");
    assert_eq!(first.normalized, "cats");
    assert_eq!(test_db.row_counts().await, (1, 0));
    test_db.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL
async fn test_find_or_create_rejects_blank() {
    let test_db = TestDatabase::new().await;

    let err = test_db.db.tags.find_or_create("   ").await.unwrap_err();

    assert!(matches!(err, Error::InvalidInput(_)));
    assert_eq!(test_db.row_counts().await, (0, 0));
    test_db.cleanup().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore] // Requires DATABASE_URL
async fn test_concurrent_find_or_create_yields_one_row() {
    let test_db = TestDatabase::new().await;

    let handles: Vec<_> = (0..16)
        .map(|i| {
            let tags = test_db.db.tags.clone();
            let raw = if i % 2 == 0 { "Kiwi" } else { "KIWI" };
            tokio::spawn(async move { tags.find_or_create(raw).await })
        })
        .collect();

    let ids: Vec<i64> = join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.unwrap().unwrap().id)
        .collect();

    assert!(ids.windows(2).all(|w| w[0] == w[1]), "ids differ: {:?}", ids);
    assert_eq!(test_db.row_counts().await, (1, 0));
    test_db.cleanup().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore] // Requires DATABASE_URL
async fn test_concurrent_tagging_shares_new_tag() {
    let test_db = TestDatabase::new().await;
    let mut posts = Vec::new();
    for i in 0..8 {
        posts.push(test_db.create_post(&format!("post {}", i)).await);
    }

    let handles: Vec<_> = posts
        .iter()
        .map(|post| {
            let repo = test_db.db.taggables.clone();
            let target = post.taggable_ref();
            tokio::spawn(async move { repo.tag(&target, "Mango,Papaya".into()).await })
        })
        .collect();

    for joined in join_all(handles).await {
        joined.unwrap().unwrap();
    }

    assert_eq!(test_db.row_counts().await, (2, 16));
    test_db.cleanup().await;
}

/// Writers creating the same new tags in opposite order must not deadlock.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore] // Requires DATABASE_URL
async fn test_concurrent_tagging_in_opposite_order() {
    let test_db = TestDatabase::new().await;
    let first = test_db.create_post("first").await;
    let second = test_db.create_post("second").await;

    let mut handles = Vec::new();
    for round in 0..40 {
        let forward = format!("Alpha{0},Beta{0},Gamma{0}", round);
        let backward = format!("Gamma{0},Beta{0},Alpha{0}", round);
        for (post, input) in [(&first, forward), (&second, backward)] {
            let repo = test_db.db.taggables.clone();
            let target = post.taggable_ref();
            handles.push(tokio::spawn(async move { repo.tag(&target, input.into()).await }));
        }
    }

    for joined in join_all(handles).await {
        joined.unwrap().unwrap();
    }

    assert_eq!(test_db.row_counts().await, (120, 240));
    // Creation order does not leak into the entity's tag order
    let round_zero: Vec<String> = second
        .tag_array(&test_db.db.taggables)
        .await
        .unwrap()
        .to_vec()
        .into_iter()
        .filter(|name| ["Alpha0", "Beta0", "Gamma0"].contains(&name.as_str()))
        .collect();
    assert_eq!(round_zero, vec!["Gamma0", "Beta0", "Alpha0"]);
    test_db.cleanup().await;
}

/// Two writers attaching the same existing tags to one entity in opposite
/// order; a deadlock victim is retried.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore] // Requires DATABASE_URL
async fn test_concurrent_tagging_same_entity_opposite_order() {
    let test_db = TestDatabase::new().await;
    let post = test_db.create_post("shared").await;
    for round in 0..20 {
        for name in [format!("Left{}", round), format!("Right{}", round)] {
            test_db.db.tags.find_or_create(&name).await.unwrap();
        }
    }

    let mut handles = Vec::new();
    for round in 0..20 {
        for input in [
            format!("Left{0},Right{0}", round),
            format!("Right{0},Left{0}", round),
        ] {
            let repo = test_db.db.taggables.clone();
            let target = post.taggable_ref();
            handles.push(tokio::spawn(async move { repo.tag(&target, input.into()).await }));
        }
    }

    for joined in join_all(handles).await {
        joined.unwrap().unwrap();
    }

    assert_eq!(test_db.row_counts().await, (40, 40));
    test_db.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL
async fn test_find_by_normalized_name() {
    let test_db = TestDatabase::new().await;
    let tags = &test_db.db.tags;

    let created = tags.find_or_create("Apple").await.unwrap();

    let found = tags.find_by_normalized_name("APPLE").await.unwrap();
    assert_eq!(found.map(|t| t.id), Some(created.id));
    assert!(tags.find_by_normalized_name("Banana").await.unwrap().is_none());
    assert!(tags.find_by_normalized_name("  ").await.unwrap().is_none());
    test_db.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL
async fn test_get_by_id() {
    let test_db = TestDatabase::new().await;
    let tags = &test_db.db.tags;

    let created = tags.find_or_create("Apple").await.unwrap();

    assert_eq!(tags.get(created.id).await.unwrap(), Some(created.clone()));
    assert!(tags.get(created.id + 1000).await.unwrap().is_none());
    test_db.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL
async fn test_list_reports_usage_counts() {
    let test_db = TestDatabase::new().await;
    let repo = &test_db.db.taggables;

    let post = test_db.create_post("one").await;
    let other = test_db.create_post("two").await;
    let video = test_db.create_video("three").await;
    post.tag(repo, "Banana,Apple").await.unwrap();
    other.tag(repo, "apple").await.unwrap();
    video.tag(repo, "Apple").await.unwrap();
    test_db.db.tags.find_or_create("Zucchini").await.unwrap();

    let listed: Vec<(String, i64)> = test_db
        .db
        .tags
        .list()
        .await
        .unwrap()
        .into_iter()
        .map(|u| (u.tag.name, u.usage_count))
        .collect();

    assert_eq!(
        listed,
        vec![
            ("Apple".to_string(), 3),
            ("Banana".to_string(), 1),
            ("Zucchini".to_string(), 0),
        ]
    );
    test_db.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL
async fn test_delete_cascades_to_associations() {
    let test_db = TestDatabase::new().await;
    let repo = &test_db.db.taggables;
    let post = test_db.create_post("cascade").await;

    let tags = post.tag(repo, "Apple,Banana").await.unwrap();
    test_db.db.tags.delete(tags[0].id).await.unwrap();

    assert_eq!(post.tag_list(repo).await.unwrap(), "Banana");
    assert_eq!(test_db.row_counts().await, (1, 1));

    let err = test_db.db.tags.delete(tags[0].id).await.unwrap_err();
    assert!(matches!(err, Error::TagNotFound(id) if id == tags[0].id));
    test_db.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL
async fn test_taggables_for_tag_spans_types() {
    let test_db = TestDatabase::new().await;
    let repo = &test_db.db.taggables;

    let post = test_db.create_post("post").await;
    let video = test_db.create_video("video").await;
    post.tag(repo, "Apple").await.unwrap();
    let tags = video.tag(repo, "apple,Banana").await.unwrap();

    let targets = repo.taggables_for_tag(tags[0].id).await.unwrap();
    assert_eq!(
        targets,
        vec![
            TaggableRef::new("post", post.id),
            TaggableRef::new("video", video.id),
        ]
    );
    test_db.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL
async fn test_tags_outlive_their_associations() {
    let test_db = TestDatabase::new().await;
    let repo = &test_db.db.taggables;
    let post = test_db.create_post("orphan").await;

    post.tag(repo, "Apple").await.unwrap();
    post.detag(repo).await.unwrap();

    let listed = test_db.db.tags.list().await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].usage_count, 0);
    test_db.cleanup().await;
}
