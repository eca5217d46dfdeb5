//! Canonical catalog items and their closed subtype table.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use uuid::Uuid;

use super::id_type::IdType;

/// Stable internal item identifier, assigned monotonically by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub i64);

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Fixed category of an item subtype.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemCategory {
    Book,
    Movie,
    Tv,
    Music,
    Game,
    Podcast,
    Performance,
}

/// Concrete item subtype.
///
/// The engine only needs to know which subtype an item is and which
/// metadata keys that subtype copies from its resources, so the hierarchy is
/// a closed enum with a static table behind it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemModel {
    Edition,
    Work,
    Movie,
    TvShow,
    TvSeason,
    TvEpisode,
    Album,
    Game,
    Podcast,
    PodcastEpisode,
    Performance,
    PerformanceProduction,
}

const BOOK_KEYS: &[&str] = &[
    "title",
    "subtitle",
    "author",
    "pub_house",
    "pub_year",
    "pub_month",
    "language",
    "orig_title",
    "translator",
    "series",
    "imprint",
    "binding",
    "pages",
    "price",
    "brief",
    "contents",
];
const WORK_KEYS: &[&str] = &["title", "brief", "author", "other_title"];
const MOVIE_KEYS: &[&str] = &[
    "title",
    "brief",
    "orig_title",
    "other_title",
    "director",
    "playwright",
    "actor",
    "genre",
    "showtime",
    "site",
    "area",
    "language",
    "year",
    "duration",
];
const TV_SHOW_KEYS: &[&str] = &[
    "title",
    "brief",
    "season_count",
    "orig_title",
    "director",
    "playwright",
    "actor",
    "genre",
    "showtime",
    "site",
    "area",
    "language",
    "year",
    "duration",
    "episode_count",
    "single_episode_length",
];
const TV_SEASON_KEYS: &[&str] = &[
    "title",
    "brief",
    "season_number",
    "episode_count",
    "orig_title",
    "director",
    "playwright",
    "actor",
    "genre",
    "showtime",
    "site",
    "area",
    "language",
    "year",
    "duration",
    "single_episode_length",
];
const TV_EPISODE_KEYS: &[&str] = &["title", "brief", "season_number", "episode_number"];
const ALBUM_KEYS: &[&str] = &[
    "title",
    "other_title",
    "artist",
    "company",
    "track_list",
    "brief",
    "album_type",
    "media",
    "disc_count",
    "genre",
    "release_date",
    "duration",
    "bandcamp_album_id",
];
const GAME_KEYS: &[&str] = &[
    "title",
    "brief",
    "other_title",
    "designer",
    "artist",
    "developer",
    "publisher",
    "release_year",
    "release_date",
    "genre",
    "platform",
    "official_site",
];
const PODCAST_KEYS: &[&str] = &[
    "title",
    "brief",
    "language",
    "host",
    "genre",
    "official_site",
];
const PODCAST_EPISODE_KEYS: &[&str] = &["title", "brief", "pub_date"];
const PERFORMANCE_KEYS: &[&str] = &[
    "title",
    "brief",
    "other_title",
    "genre",
    "version",
    "director",
    "playwright",
    "actor",
    "composer",
    "choreographer",
    "troupe",
    "theatre",
    "opening_date",
    "official_site",
];

impl ItemModel {
    pub const ALL: [ItemModel; 12] = [
        ItemModel::Edition,
        ItemModel::Work,
        ItemModel::Movie,
        ItemModel::TvShow,
        ItemModel::TvSeason,
        ItemModel::TvEpisode,
        ItemModel::Album,
        ItemModel::Game,
        ItemModel::Podcast,
        ItemModel::PodcastEpisode,
        ItemModel::Performance,
        ItemModel::PerformanceProduction,
    ];

    /// Stable persisted key, also the polymorphic discriminator.
    pub fn as_str(self) -> &'static str {
        match self {
            ItemModel::Edition => "edition",
            ItemModel::Work => "work",
            ItemModel::Movie => "movie",
            ItemModel::TvShow => "tvshow",
            ItemModel::TvSeason => "tvseason",
            ItemModel::TvEpisode => "tvepisode",
            ItemModel::Album => "album",
            ItemModel::Game => "game",
            ItemModel::Podcast => "podcast",
            ItemModel::PodcastEpisode => "podcastepisode",
            ItemModel::Performance => "performance",
            ItemModel::PerformanceProduction => "performanceproduction",
        }
    }

    /// Look up a model by name, ignoring case (`"TVSeason"`, `"tvseason"`).
    pub fn from_name(name: &str) -> Option<ItemModel> {
        let name = name.trim();
        ItemModel::ALL
            .iter()
            .copied()
            .find(|m| m.as_str().eq_ignore_ascii_case(name))
    }

    pub fn category(self) -> ItemCategory {
        match self {
            ItemModel::Edition | ItemModel::Work => ItemCategory::Book,
            ItemModel::Movie => ItemCategory::Movie,
            ItemModel::TvShow | ItemModel::TvSeason | ItemModel::TvEpisode => ItemCategory::Tv,
            ItemModel::Album => ItemCategory::Music,
            ItemModel::Game => ItemCategory::Game,
            ItemModel::Podcast | ItemModel::PodcastEpisode => ItemCategory::Podcast,
            ItemModel::Performance | ItemModel::PerformanceProduction => {
                ItemCategory::Performance
            }
        }
    }

    pub fn url_path(self) -> &'static str {
        match self {
            ItemModel::Edition => "book",
            ItemModel::Work => "book/work",
            ItemModel::Movie => "movie",
            ItemModel::TvShow => "tv",
            ItemModel::TvSeason => "tv/season",
            ItemModel::TvEpisode => "tv/episode",
            ItemModel::Album => "album",
            ItemModel::Game => "game",
            ItemModel::Podcast => "podcast",
            ItemModel::PodcastEpisode => "podcast/episode",
            ItemModel::Performance => "performance",
            ItemModel::PerformanceProduction => "performance/production",
        }
    }

    /// Metadata keys copied from resources into items of this model.
    pub fn metadata_copy_keys(self) -> &'static [&'static str] {
        match self {
            ItemModel::Edition => BOOK_KEYS,
            ItemModel::Work => WORK_KEYS,
            ItemModel::Movie => MOVIE_KEYS,
            ItemModel::TvShow => TV_SHOW_KEYS,
            ItemModel::TvSeason => TV_SEASON_KEYS,
            ItemModel::TvEpisode => TV_EPISODE_KEYS,
            ItemModel::Album => ALBUM_KEYS,
            ItemModel::Game => GAME_KEYS,
            ItemModel::Podcast => PODCAST_KEYS,
            ItemModel::PodcastEpisode => PODCAST_EPISODE_KEYS,
            ItemModel::Performance | ItemModel::PerformanceProduction => PERFORMANCE_KEYS,
        }
    }

    /// Model of the parent item, for subtypes that have one.
    pub fn parent_model(self) -> Option<ItemModel> {
        match self {
            ItemModel::TvSeason => Some(ItemModel::TvShow),
            ItemModel::TvEpisode => Some(ItemModel::TvSeason),
            ItemModel::PodcastEpisode => Some(ItemModel::Podcast),
            ItemModel::PerformanceProduction => Some(ItemModel::Performance),
            _ => None,
        }
    }

    /// Model of child items, for subtypes that have them.
    pub fn child_model(self) -> Option<ItemModel> {
        ItemModel::ALL
            .iter()
            .copied()
            .find(|m| m.parent_model() == Some(self))
    }

    /// Whether an item of this model may be merged into an item of `target`.
    ///
    /// Same model always; across models only season and show.
    pub fn can_merge_into(self, target: ItemModel) -> bool {
        self == target
            || matches!(
                (self, target),
                (ItemModel::TvSeason, ItemModel::TvShow) | (ItemModel::TvShow, ItemModel::TvSeason)
            )
    }

    /// Copy the subset of `metadata` this model declares, skipping nulls.
    pub fn copy_metadata(self, metadata: &Map<String, Value>) -> Map<String, Value> {
        self.metadata_copy_keys()
            .iter()
            .filter_map(|k| match metadata.get(*k) {
                Some(Value::Null) | None => None,
                Some(v) => Some((k.to_string(), v.clone())),
            })
            .collect()
    }
}

impl fmt::Display for ItemModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A canonical catalog item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,

    /// Random public identity, preserved across recast
    pub uid: Uuid,

    pub model: ItemModel,

    pub primary_lookup_id_type: Option<IdType>,
    pub primary_lookup_id_value: Option<String>,

    /// Copyable metadata fields (title, brief, ...)
    #[serde(default)]
    pub metadata: Map<String, Value>,

    /// Locally cached cover path
    pub cover: Option<String>,

    pub parent_item: Option<ItemId>,
    pub merged_to_item: Option<ItemId>,
    pub is_deleted: bool,

    pub created_time: DateTime<Utc>,
    pub edited_time: DateTime<Utc>,
}

impl Item {
    pub fn category(&self) -> ItemCategory {
        self.model.category()
    }

    pub fn title(&self) -> &str {
        self.metadata
            .get("title")
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    /// Primary lookup id as a pair, when both halves are set.
    pub fn primary_lookup_id(&self) -> Option<(IdType, &str)> {
        match (self.primary_lookup_id_type, &self.primary_lookup_id_value) {
            (Some(t), Some(v)) if !v.is_empty() => Some((t, v.as_str())),
            _ => None,
        }
    }

    pub fn set_primary_lookup_id(&mut self, id_type: IdType, value: impl Into<String>) {
        self.primary_lookup_id_type = Some(id_type);
        self.primary_lookup_id_value = Some(value.into());
    }

    pub fn clear_primary_lookup_id(&mut self) {
        self.primary_lookup_id_type = None;
        self.primary_lookup_id_value = None;
    }

    /// Fold candidate lookup ids into the primary id. Returns true if it
    /// changed.
    ///
    /// The first ideal kind replaces a non-ideal (or missing) primary id;
    /// a candidate of the primary's own kind refreshes its value.
    pub fn update_lookup_ids(&mut self, lookup_ids: &[(IdType, String)]) -> bool {
        let before = (self.primary_lookup_id_type, self.primary_lookup_id_value.clone());
        for (t, v) in lookup_ids {
            if v.is_empty() {
                continue;
            }
            let primary_is_ideal = self.primary_lookup_id_type.is_some_and(IdType::is_ideal);
            if t.is_ideal() && !primary_is_ideal {
                self.set_primary_lookup_id(*t, v.clone());
                break;
            }
            if Some(*t) == self.primary_lookup_id_type {
                self.primary_lookup_id_value = Some(v.clone());
            }
        }
        before != (self.primary_lookup_id_type, self.primary_lookup_id_value.clone())
    }

    pub fn is_instance_of(&self, model: ItemModel) -> bool {
        self.model == model
    }

    /// 22 character base62 rendering of `uid`.
    pub fn uuid(&self) -> String {
        base62_encode(self.uid.as_u128())
    }

    pub fn url(&self) -> String {
        format!("/{}/{}", self.model.url_path(), self.uuid())
    }
}

/// Fields needed to create an item; the store assigns id, uid and times.
#[derive(Debug, Clone, PartialEq)]
pub struct NewItem {
    pub model: ItemModel,
    pub primary_lookup_id_type: Option<IdType>,
    pub primary_lookup_id_value: Option<String>,
    pub metadata: Map<String, Value>,
    pub parent_item: Option<ItemId>,
}

impl NewItem {
    pub fn new(model: ItemModel) -> Self {
        Self {
            model,
            primary_lookup_id_type: None,
            primary_lookup_id_value: None,
            metadata: Map::new(),
            parent_item: None,
        }
    }

    pub fn with_lookup_id(mut self, id_type: IdType, value: impl Into<String>) -> Self {
        self.primary_lookup_id_type = Some(id_type);
        self.primary_lookup_id_value = Some(value.into());
        self
    }

    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.metadata
            .insert("title".to_string(), Value::String(title.into()));
        self
    }

    pub fn with_parent(mut self, parent: ItemId) -> Self {
        self.parent_item = Some(parent);
        self
    }

    /// Materialize into an item with the given id.
    pub fn into_item(self, id: ItemId) -> Item {
        let now = Utc::now();
        Item {
            id,
            uid: Uuid::new_v4(),
            model: self.model,
            primary_lookup_id_type: self.primary_lookup_id_type,
            primary_lookup_id_value: self.primary_lookup_id_value,
            metadata: self.metadata,
            cover: None,
            parent_item: self.parent_item,
            merged_to_item: None,
            is_deleted: false,
            created_time: now,
            edited_time: now,
        }
    }
}

const BASE62: &[u8; 62] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

fn base62_encode(mut n: u128) -> String {
    let mut buf = Vec::with_capacity(22);
    while n > 0 {
        buf.push(BASE62[(n % 62) as usize]);
        n /= 62;
    }
    while buf.len() < 22 {
        buf.push(b'0');
    }
    buf.reverse();
    String::from_utf8_lossy(&buf).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_model_names_are_case_insensitive() {
        assert_eq!(ItemModel::from_name("TVSeason"), Some(ItemModel::TvSeason));
        assert_eq!(ItemModel::from_name("edition"), Some(ItemModel::Edition));
        assert_eq!(ItemModel::from_name("Book"), None);
        for m in ItemModel::ALL {
            assert_eq!(ItemModel::from_name(m.as_str()), Some(m));
            assert_eq!(serde_json::to_value(m).unwrap(), json!(m.as_str()));
        }
    }

    #[test]
    fn test_merge_pairing() {
        assert!(ItemModel::Movie.can_merge_into(ItemModel::Movie));
        assert!(ItemModel::TvSeason.can_merge_into(ItemModel::TvShow));
        assert!(ItemModel::TvShow.can_merge_into(ItemModel::TvSeason));
        assert!(!ItemModel::Movie.can_merge_into(ItemModel::TvSeason));
        assert!(!ItemModel::Edition.can_merge_into(ItemModel::Work));
    }

    #[test]
    fn test_parent_and_child_models() {
        assert_eq!(ItemModel::TvSeason.parent_model(), Some(ItemModel::TvShow));
        assert_eq!(ItemModel::TvShow.child_model(), Some(ItemModel::TvSeason));
        assert_eq!(ItemModel::Movie.child_model(), None);
    }

    #[test]
    fn test_copy_metadata_filters_keys_and_nulls() {
        let md = json!({"title": "Dune", "author": ["Frank Herbert"], "pages": null, "rating": 9});
        let copied = ItemModel::Edition.copy_metadata(md.as_object().unwrap());
        assert_eq!(copied.len(), 2);
        assert_eq!(copied["title"], json!("Dune"));
        assert!(!copied.contains_key("rating"));
    }

    #[test]
    fn test_update_lookup_ids_promotes_ideal() {
        let mut item = NewItem::new(ItemModel::Edition)
            .with_lookup_id(IdType::Goodreads, "1")
            .into_item(ItemId(1));
        let changed = item.update_lookup_ids(&[
            (IdType::Goodreads, "2".to_string()),
            (IdType::Isbn, "9780553283686".to_string()),
            (IdType::Asin, "B004G60EHS".to_string()),
        ]);
        assert!(changed);
        assert_eq!(item.primary_lookup_id(), Some((IdType::Isbn, "9780553283686")));

        // Ideal primary is kept, same-kind value refreshed
        let changed = item.update_lookup_ids(&[
            (IdType::Asin, "B004G60EHS".to_string()),
            (IdType::Isbn, "9780553283686".to_string()),
        ]);
        assert!(!changed);
        assert_eq!(item.primary_lookup_id_type, Some(IdType::Isbn));
    }

    #[test]
    fn test_uuid_is_22_chars() {
        let mut item = NewItem::new(ItemModel::Movie).into_item(ItemId(1));
        assert_eq!(item.uuid().len(), 22);
        assert!(item.url().starts_with("/movie/"));

        item.uid = Uuid::from_u128(61);
        assert_eq!(item.uuid(), "000000000000000000000z");
        item.uid = Uuid::from_u128(0);
        assert_eq!(item.uuid(), "0000000000000000000000");
    }
}
