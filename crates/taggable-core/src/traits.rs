//! Core traits for taggable.
//!
//! [`Taggable`] is the contract a host entity implements to acquire tags.
//! [`TagRepository`] and [`TaggableRepository`] abstract the store, and
//! [`TaggableExt`] gives every taggable entity mixin-style methods on top of
//! any repository.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::TaggingConfig;
use crate::tags::{tag_list, Tag, TagArray, TagField, TagInput, TagUsage};
use crate::Result;

// =============================================================================
// HOST CONTRACT
// =============================================================================

/// An entity that can carry tags.
///
/// # Examples
///
/// ```
/// use taggable_core::Taggable;
///
/// struct Post {
///     id: i64,
/// }
///
/// impl Taggable for Post {
///     fn taggable_type() -> &'static str {
///         "post"
///     }
///
///     fn taggable_id(&self) -> i64 {
///         self.id
///     }
/// }
/// ```
pub trait Taggable {
    /// Stable discriminator stored alongside the id in every association.
    fn taggable_type() -> &'static str
    where
        Self: Sized;

    /// Primary key of this instance.
    fn taggable_id(&self) -> i64;
}

/// Reference to one taggable instance: discriminator plus id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaggableRef {
    pub taggable_type: String,
    pub taggable_id: i64,
}

impl TaggableRef {
    pub fn new(taggable_type: impl Into<String>, taggable_id: i64) -> Self {
        Self {
            taggable_type: taggable_type.into(),
            taggable_id,
        }
    }

    /// Reference the given entity.
    pub fn of<T: Taggable>(entity: &T) -> Self {
        Self::new(T::taggable_type(), entity.taggable_id())
    }
}

impl fmt::Display for TaggableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.taggable_type, self.taggable_id)
    }
}

// =============================================================================
// TAG REPOSITORY
// =============================================================================

/// Repository for tag rows.
#[async_trait]
pub trait TagRepository: Send + Sync {
    /// Normalize `raw` and fetch the matching tag, if any.
    async fn find_by_normalized_name(&self, raw: &str) -> Result<Option<Tag>>;

    /// Fetch the tag `raw` normalizes to, creating it if needed.
    ///
    /// Safe under concurrent calls: at most one row per normalized key is ever
    /// created and every caller receives that row.
    async fn find_or_create(&self, raw: &str) -> Result<Tag>;

    /// Get a tag by id.
    async fn get(&self, id: i64) -> Result<Option<Tag>>;

    /// List all tags with their usage counts, ordered by normalized key.
    async fn list(&self) -> Result<Vec<TagUsage>>;

    /// Administratively delete a tag and every association pointing at it.
    async fn delete(&self, id: i64) -> Result<()>;
}

// =============================================================================
// TAGGABLE REPOSITORY
// =============================================================================

/// Repository managing associations between taggable entities and tags.
#[async_trait]
pub trait TaggableRepository: Send + Sync {
    /// Configuration used to split, normalize, and join tags.
    fn config(&self) -> &TaggingConfig;

    /// Attach every tag in `input`, creating tags as needed. Already-attached
    /// tags are left alone. Returns the resolved tags in input order.
    async fn tag(&self, target: &TaggableRef, input: TagInput) -> Result<Vec<Tag>>;

    /// Detach every tag in `input`. Unknown tags and missing associations are
    /// ignored. Returns the number of associations removed.
    async fn untag(&self, target: &TaggableRef, input: TagInput) -> Result<u64>;

    /// Atomically replace the target's tags with `input`.
    async fn retag(&self, target: &TaggableRef, input: TagInput) -> Result<Vec<Tag>>;

    /// Remove all of the target's associations. Returns how many were removed.
    async fn detag(&self, target: &TaggableRef) -> Result<u64>;

    /// The target's tags in association order.
    async fn tags(&self, target: &TaggableRef) -> Result<Vec<Tag>>;

    /// Ids of entities of `taggable_type` carrying every tag in `input`.
    async fn with_all_tags(&self, taggable_type: &str, input: TagInput) -> Result<Vec<i64>>;

    /// Ids of entities of `taggable_type` carrying any tag in `input`, or any
    /// tag at all when `input` is empty.
    async fn with_any_tags(&self, taggable_type: &str, input: TagInput) -> Result<Vec<i64>>;

    /// Distinct tags attached to any entity of `taggable_type`, by tag id.
    async fn type_tags(&self, taggable_type: &str) -> Result<Vec<Tag>>;

    /// Every entity currently carrying the tag.
    async fn taggables_for_tag(&self, tag_id: i64) -> Result<Vec<TaggableRef>>;

    async fn tag_list(&self, target: &TaggableRef) -> Result<String> {
        let tags = self.tags(target).await?;
        Ok(tag_list(&tags, TagField::Name, self.config()))
    }

    async fn tag_list_normalized(&self, target: &TaggableRef) -> Result<String> {
        let tags = self.tags(target).await?;
        Ok(tag_list(&tags, TagField::Normalized, self.config()))
    }

    async fn tag_array(&self, target: &TaggableRef) -> Result<TagArray> {
        let tags = self.tags(target).await?;
        Ok(TagArray::from_tags(&tags, TagField::Name))
    }

    async fn tag_array_normalized(&self, target: &TaggableRef) -> Result<TagArray> {
        let tags = self.tags(target).await?;
        Ok(TagArray::from_tags(&tags, TagField::Normalized))
    }

    async fn type_tag_list(&self, taggable_type: &str) -> Result<String> {
        let tags = self.type_tags(taggable_type).await?;
        Ok(tag_list(&tags, TagField::Name, self.config()))
    }

    async fn type_tag_list_normalized(&self, taggable_type: &str) -> Result<String> {
        let tags = self.type_tags(taggable_type).await?;
        Ok(tag_list(&tags, TagField::Normalized, self.config()))
    }

    async fn type_tag_array(&self, taggable_type: &str) -> Result<TagArray> {
        let tags = self.type_tags(taggable_type).await?;
        Ok(TagArray::from_tags(&tags, TagField::Name))
    }

    async fn type_tag_array_normalized(&self, taggable_type: &str) -> Result<TagArray> {
        let tags = self.type_tags(taggable_type).await?;
        Ok(TagArray::from_tags(&tags, TagField::Normalized))
    }
}

// =============================================================================
// EXTENSION TRAIT
// =============================================================================

/// Tagging methods available on every [`Taggable`] entity.
///
/// ```rust,ignore
/// post.tag(&db.taggables, "Apple,Banana").await?;
/// assert_eq!(post.tag_list(&db.taggables).await?, "Apple,Banana");
/// let ids = Post::with_any_tags(&db.taggables, "banana").await?;
/// ```
#[async_trait]
pub trait TaggableExt: Taggable + Sized + Sync {
    fn taggable_ref(&self) -> TaggableRef {
        TaggableRef::of(self)
    }

    async fn tag<R, I>(&self, repo: &R, input: I) -> Result<Vec<Tag>>
    where
        R: TaggableRepository + ?Sized,
        I: Into<TagInput> + Send,
    {
        repo.tag(&self.taggable_ref(), input.into()).await
    }

    async fn untag<R, I>(&self, repo: &R, input: I) -> Result<u64>
    where
        R: TaggableRepository + ?Sized,
        I: Into<TagInput> + Send,
    {
        repo.untag(&self.taggable_ref(), input.into()).await
    }

    async fn retag<R, I>(&self, repo: &R, input: I) -> Result<Vec<Tag>>
    where
        R: TaggableRepository + ?Sized,
        I: Into<TagInput> + Send,
    {
        repo.retag(&self.taggable_ref(), input.into()).await
    }

    async fn detag<R>(&self, repo: &R) -> Result<u64>
    where
        R: TaggableRepository + ?Sized,
    {
        repo.detag(&self.taggable_ref()).await
    }

    async fn tags<R>(&self, repo: &R) -> Result<Vec<Tag>>
    where
        R: TaggableRepository + ?Sized,
    {
        repo.tags(&self.taggable_ref()).await
    }

    async fn tag_list<R>(&self, repo: &R) -> Result<String>
    where
        R: TaggableRepository + ?Sized,
    {
        repo.tag_list(&self.taggable_ref()).await
    }

    async fn tag_list_normalized<R>(&self, repo: &R) -> Result<String>
    where
        R: TaggableRepository + ?Sized,
    {
        repo.tag_list_normalized(&self.taggable_ref()).await
    }

    async fn tag_array<R>(&self, repo: &R) -> Result<TagArray>
    where
        R: TaggableRepository + ?Sized,
    {
        repo.tag_array(&self.taggable_ref()).await
    }

    async fn tag_array_normalized<R>(&self, repo: &R) -> Result<TagArray>
    where
        R: TaggableRepository + ?Sized,
    {
        repo.tag_array_normalized(&self.taggable_ref()).await
    }

    async fn with_all_tags<R, I>(repo: &R, input: I) -> Result<Vec<i64>>
    where
        R: TaggableRepository + ?Sized,
        I: Into<TagInput> + Send,
    {
        repo.with_all_tags(Self::taggable_type(), input.into()).await
    }

    async fn with_any_tags<R, I>(repo: &R, input: I) -> Result<Vec<i64>>
    where
        R: TaggableRepository + ?Sized,
        I: Into<TagInput> + Send,
    {
        repo.with_any_tags(Self::taggable_type(), input.into()).await
    }

    async fn type_tag_list<R>(repo: &R) -> Result<String>
    where
        R: TaggableRepository + ?Sized,
    {
        repo.type_tag_list(Self::taggable_type()).await
    }

    async fn type_tag_list_normalized<R>(repo: &R) -> Result<String>
    where
        R: TaggableRepository + ?Sized,
    {
        repo.type_tag_list_normalized(Self::taggable_type()).await
    }

    async fn type_tag_array<R>(repo: &R) -> Result<TagArray>
    where
        R: TaggableRepository + ?Sized,
    {
        repo.type_tag_array(Self::taggable_type()).await
    }

    async fn type_tag_array_normalized<R>(repo: &R) -> Result<TagArray>
    where
        R: TaggableRepository + ?Sized,
    {
        repo.type_tag_array_normalized(Self::taggable_type()).await
    }
}

impl<T: Taggable + Sync> TaggableExt for T {}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::sync::Mutex;

    /// In-memory repository used to exercise the provided methods.
    struct MemoryRepository {
        config: TaggingConfig,
        tags: Mutex<Vec<Tag>>,
        links: Mutex<Vec<(TaggableRef, i64)>>,
    }

    impl MemoryRepository {
        fn new(config: TaggingConfig) -> Self {
            Self {
                config,
                tags: Mutex::new(Vec::new()),
                links: Mutex::new(Vec::new()),
            }
        }

        fn find_or_create(&self, name: &crate::TagName) -> Tag {
            let mut tags = self.tags.lock().unwrap();
            if let Some(t) = tags.iter().find(|t| t.normalized == name.normalized()) {
                return t.clone();
            }
            let now = Utc::now();
            let tag = Tag {
                id: tags.len() as i64 + 1,
                name: name.name().to_string(),
                normalized: name.normalized().to_string(),
                created_at: now,
                updated_at: now,
            };
            tags.push(tag.clone());
            tag
        }

        fn tag_by_id(&self, id: i64) -> Tag {
            self.tags
                .lock()
                .unwrap()
                .iter()
                .find(|t| t.id == id)
                .cloned()
                .unwrap()
        }
    }

    #[async_trait]
    impl TaggableRepository for MemoryRepository {
        fn config(&self) -> &TaggingConfig {
            &self.config
        }

        async fn tag(&self, target: &TaggableRef, input: TagInput) -> Result<Vec<Tag>> {
            let mut out = Vec::new();
            for name in input.tag_names(&self.config)? {
                let tag = self.find_or_create(&name);
                let mut links = self.links.lock().unwrap();
                if !links.iter().any(|(r, id)| r == target && *id == tag.id) {
                    links.push((target.clone(), tag.id));
                }
                out.push(tag);
            }
            Ok(out)
        }

        async fn untag(&self, target: &TaggableRef, input: TagInput) -> Result<u64> {
            let keys = input.normalized(&self.config);
            let ids: Vec<i64> = self
                .tags
                .lock()
                .unwrap()
                .iter()
                .filter(|t| keys.contains(&t.normalized))
                .map(|t| t.id)
                .collect();
            let mut links = self.links.lock().unwrap();
            let before = links.len();
            links.retain(|(r, id)| !(r == target && ids.contains(id)));
            Ok((before - links.len()) as u64)
        }

        async fn retag(&self, target: &TaggableRef, input: TagInput) -> Result<Vec<Tag>> {
            self.detag(target).await?;
            self.tag(target, input).await
        }

        async fn detag(&self, target: &TaggableRef) -> Result<u64> {
            let mut links = self.links.lock().unwrap();
            let before = links.len();
            links.retain(|(r, _)| r != target);
            Ok((before - links.len()) as u64)
        }

        async fn tags(&self, target: &TaggableRef) -> Result<Vec<Tag>> {
            let ids: Vec<i64> = self
                .links
                .lock()
                .unwrap()
                .iter()
                .filter(|(r, _)| r == target)
                .map(|(_, id)| *id)
                .collect();
            Ok(ids.into_iter().map(|id| self.tag_by_id(id)).collect())
        }

        async fn with_all_tags(&self, _taggable_type: &str, _input: TagInput) -> Result<Vec<i64>> {
            Ok(Vec::new())
        }

        async fn with_any_tags(&self, taggable_type: &str, _input: TagInput) -> Result<Vec<i64>> {
            let mut ids: Vec<i64> = self
                .links
                .lock()
                .unwrap()
                .iter()
                .filter(|(r, _)| r.taggable_type == taggable_type)
                .map(|(r, _)| r.taggable_id)
                .collect();
            ids.sort_unstable();
            ids.dedup();
            Ok(ids)
        }

        async fn type_tags(&self, taggable_type: &str) -> Result<Vec<Tag>> {
            let mut ids: Vec<i64> = self
                .links
                .lock()
                .unwrap()
                .iter()
                .filter(|(r, _)| r.taggable_type == taggable_type)
                .map(|(_, id)| *id)
                .collect();
            ids.sort_unstable();
            ids.dedup();
            Ok(ids.into_iter().map(|id| self.tag_by_id(id)).collect())
        }

        async fn taggables_for_tag(&self, tag_id: i64) -> Result<Vec<TaggableRef>> {
            Ok(self
                .links
                .lock()
                .unwrap()
                .iter()
                .filter(|(_, id)| *id == tag_id)
                .map(|(r, _)| r.clone())
                .collect())
        }
    }

    struct Post {
        id: i64,
    }

    impl Taggable for Post {
        fn taggable_type() -> &'static str {
            "post"
        }

        fn taggable_id(&self) -> i64 {
            self.id
        }
    }

    #[test]
    fn test_taggable_ref_display() {
        let post = Post { id: 7 };
        assert_eq!(post.taggable_ref().to_string(), "post#7");
        assert_eq!(TaggableRef::of(&post), TaggableRef::new("post", 7));
    }

    #[tokio::test]
    async fn test_ext_methods_route_through_repository() {
        let repo = MemoryRepository::new(TaggingConfig::default());
        let post = Post { id: 1 };

        post.tag(&repo, "Apple,Banana").await.unwrap();
        post.tag(&repo, vec!["apple", "Cherry"]).await.unwrap();

        assert_eq!(post.tag_list(&repo).await.unwrap(), "Apple,Banana,Cherry");
        assert_eq!(
            post.tag_list_normalized(&repo).await.unwrap(),
            "apple,banana,cherry"
        );
        assert_eq!(
            post.tag_array(&repo).await.unwrap().to_vec(),
            vec!["Apple", "Banana", "Cherry"]
        );

        assert_eq!(post.untag(&repo, "BANANA").await.unwrap(), 1);
        assert_eq!(post.untag(&repo, "Durian").await.unwrap(), 0);
        assert_eq!(post.tag_list(&repo).await.unwrap(), "Apple,Cherry");

        post.retag(&repo, "Fig").await.unwrap();
        assert_eq!(post.tag_list(&repo).await.unwrap(), "Fig");

        assert_eq!(post.detag(&repo).await.unwrap(), 1);
        assert_eq!(post.detag(&repo).await.unwrap(), 0);
        assert!(post.tags(&repo).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_type_level_methods_use_discriminator() {
        let repo = MemoryRepository::new(TaggingConfig::default());
        Post { id: 1 }.tag(&repo, "Apple,Banana").await.unwrap();
        Post { id: 2 }.tag(&repo, "banana,Cherry").await.unwrap();

        assert_eq!(Post::type_tag_list(&repo).await.unwrap(), "Apple,Banana,Cherry");
        assert_eq!(
            Post::type_tag_array_normalized(&repo).await.unwrap().to_vec(),
            vec!["apple", "banana", "cherry"]
        );
        assert_eq!(Post::with_any_tags(&repo, "").await.unwrap(), vec![1, 2]);
    }

    #[tokio::test]
    async fn test_blank_list_entry_is_rejected() {
        let repo = MemoryRepository::new(TaggingConfig::default());
        let err = Post { id: 1 }.tag(&repo, vec!["Apple", "  "]).await.unwrap_err();
        assert!(err.is_validation());
    }

    #[tokio::test]
    async fn test_works_through_trait_object() {
        let repo: Box<dyn TaggableRepository> =
            Box::new(MemoryRepository::new(TaggingConfig::default()));
        let post = Post { id: 3 };
        post.tag(repo.as_ref(), "Apple").await.unwrap();
        assert_eq!(post.tag_list(repo.as_ref()).await.unwrap(), "Apple");
    }
}
