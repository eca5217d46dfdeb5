//! Identifier kinds shared between the engine and provider adapters.
//!
//! Persisted data references kinds by their stable string key, so new kinds
//! are appended and existing keys never change.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CatalogError;

/// Closed enumeration of provider and identifier kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IdType {
    #[serde(rename = "wikidata")]
    WikiData,
    #[serde(rename = "isbn10")]
    Isbn10,
    /// ISBN-13
    #[serde(rename = "isbn")]
    Isbn,
    #[serde(rename = "asin")]
    Asin,
    #[serde(rename = "issn")]
    Issn,
    #[serde(rename = "cubn")]
    Cubn,
    /// Songs only
    #[serde(rename = "isrc")]
    Isrc,
    /// GTIN-13 / UPC / EAN; ISBN is separate
    #[serde(rename = "gtin")]
    Gtin,
    /// Feed URL
    #[serde(rename = "rss")]
    Rss,
    #[serde(rename = "imdb")]
    Imdb,
    #[serde(rename = "tmdb_tv")]
    TmdbTv,
    #[serde(rename = "tmdb_tvseason")]
    TmdbTvSeason,
    #[serde(rename = "tmdb_tvepisode")]
    TmdbTvEpisode,
    #[serde(rename = "tmdb_movie")]
    TmdbMovie,
    #[serde(rename = "goodreads")]
    Goodreads,
    #[serde(rename = "goodreads_work")]
    GoodreadsWork,
    #[serde(rename = "googlebooks")]
    GoogleBooks,
    #[serde(rename = "doubanbook")]
    DoubanBook,
    #[serde(rename = "doubanbook_work")]
    DoubanBookWork,
    #[serde(rename = "doubanmovie")]
    DoubanMovie,
    #[serde(rename = "doubanmusic")]
    DoubanMusic,
    #[serde(rename = "doubangame")]
    DoubanGame,
    #[serde(rename = "doubandrama")]
    DoubanDrama,
    #[serde(rename = "doubandrama_version")]
    DoubanDramaVersion,
    #[serde(rename = "bookstw")]
    BooksTw,
    #[serde(rename = "bandcamp")]
    Bandcamp,
    #[serde(rename = "spotify_album")]
    SpotifyAlbum,
    #[serde(rename = "spotify_show")]
    SpotifyShow,
    #[serde(rename = "discogs_release")]
    DiscogsRelease,
    #[serde(rename = "discogs_master")]
    DiscogsMaster,
    #[serde(rename = "musicbrainz")]
    MusicBrainz,
    #[serde(rename = "igdb")]
    Igdb,
    #[serde(rename = "bgg")]
    Bgg,
    #[serde(rename = "steam")]
    Steam,
    #[serde(rename = "bangumi")]
    Bangumi,
    #[serde(rename = "apple_podcast")]
    ApplePodcast,
    #[serde(rename = "apple_music")]
    AppleMusic,
    #[serde(rename = "fedi")]
    Fediverse,
}

/// Globally unique, reliable identifier kinds in promotion order.
pub const IDEAL_ID_TYPES: [IdType; 8] = [
    IdType::Isbn,
    IdType::Cubn,
    IdType::Asin,
    IdType::Gtin,
    IdType::Isrc,
    IdType::MusicBrainz,
    IdType::Rss,
    IdType::Imdb,
];

impl IdType {
    pub const ALL: [IdType; 38] = [
        IdType::WikiData,
        IdType::Isbn10,
        IdType::Isbn,
        IdType::Asin,
        IdType::Issn,
        IdType::Cubn,
        IdType::Isrc,
        IdType::Gtin,
        IdType::Rss,
        IdType::Imdb,
        IdType::TmdbTv,
        IdType::TmdbTvSeason,
        IdType::TmdbTvEpisode,
        IdType::TmdbMovie,
        IdType::Goodreads,
        IdType::GoodreadsWork,
        IdType::GoogleBooks,
        IdType::DoubanBook,
        IdType::DoubanBookWork,
        IdType::DoubanMovie,
        IdType::DoubanMusic,
        IdType::DoubanGame,
        IdType::DoubanDrama,
        IdType::DoubanDramaVersion,
        IdType::BooksTw,
        IdType::Bandcamp,
        IdType::SpotifyAlbum,
        IdType::SpotifyShow,
        IdType::DiscogsRelease,
        IdType::DiscogsMaster,
        IdType::MusicBrainz,
        IdType::Igdb,
        IdType::Bgg,
        IdType::Steam,
        IdType::Bangumi,
        IdType::ApplePodcast,
        IdType::AppleMusic,
        IdType::Fediverse,
    ];

    /// Stable persisted key.
    pub fn as_str(self) -> &'static str {
        match self {
            IdType::WikiData => "wikidata",
            IdType::Isbn10 => "isbn10",
            IdType::Isbn => "isbn",
            IdType::Asin => "asin",
            IdType::Issn => "issn",
            IdType::Cubn => "cubn",
            IdType::Isrc => "isrc",
            IdType::Gtin => "gtin",
            IdType::Rss => "rss",
            IdType::Imdb => "imdb",
            IdType::TmdbTv => "tmdb_tv",
            IdType::TmdbTvSeason => "tmdb_tvseason",
            IdType::TmdbTvEpisode => "tmdb_tvepisode",
            IdType::TmdbMovie => "tmdb_movie",
            IdType::Goodreads => "goodreads",
            IdType::GoodreadsWork => "goodreads_work",
            IdType::GoogleBooks => "googlebooks",
            IdType::DoubanBook => "doubanbook",
            IdType::DoubanBookWork => "doubanbook_work",
            IdType::DoubanMovie => "doubanmovie",
            IdType::DoubanMusic => "doubanmusic",
            IdType::DoubanGame => "doubangame",
            IdType::DoubanDrama => "doubandrama",
            IdType::DoubanDramaVersion => "doubandrama_version",
            IdType::BooksTw => "bookstw",
            IdType::Bandcamp => "bandcamp",
            IdType::SpotifyAlbum => "spotify_album",
            IdType::SpotifyShow => "spotify_show",
            IdType::DiscogsRelease => "discogs_release",
            IdType::DiscogsMaster => "discogs_master",
            IdType::MusicBrainz => "musicbrainz",
            IdType::Igdb => "igdb",
            IdType::Bgg => "bgg",
            IdType::Steam => "steam",
            IdType::Bangumi => "bangumi",
            IdType::ApplePodcast => "apple_podcast",
            IdType::AppleMusic => "apple_music",
            IdType::Fediverse => "fedi",
        }
    }

    /// Whether this kind is in the ideal priority list.
    pub fn is_ideal(self) -> bool {
        IDEAL_ID_TYPES.contains(&self)
    }

    /// Position in the ideal priority list, if ideal.
    pub fn priority(self) -> Option<usize> {
        IDEAL_ID_TYPES.iter().position(|t| *t == self)
    }
}

impl fmt::Display for IdType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IdType {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        IdType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| CatalogError::UnknownIdType {
                value: s.to_string(),
            })
    }
}

/// Ordered mapping of identifier kind to value.
pub type LookupIds = IndexMap<IdType, String>;

/// Pick the best available lookup id.
///
/// The first kind of [`IDEAL_ID_TYPES`] present with a non-empty value wins;
/// otherwise the first non-empty entry in insertion order.
pub fn get_best_lookup_id(lookup_ids: &LookupIds) -> Option<(IdType, String)> {
    for t in IDEAL_ID_TYPES {
        if let Some(v) = lookup_ids.get(&t) {
            if !v.is_empty() {
                return Some((t, v.clone()));
            }
        }
    }
    lookup_ids
        .iter()
        .find(|(_, v)| !v.is_empty())
        .map(|(t, v)| (*t, v.clone()))
}

/// Normalize one lookup id, returning `None` when it is unusable.
///
/// Values are trimmed. ISBN-10 becomes ISBN-13, an ASIN that is really an
/// ISBN is reclassified, and GTIN/UPC values are padded to 13 digits.
pub fn lookup_id_cleanup(id_type: IdType, value: &str) -> Option<(IdType, String)> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    match id_type {
        IdType::Isbn | IdType::Isbn10 | IdType::Asin => detect_isbn_asin(value),
        IdType::Gtin => upc_to_gtin_13(value).map(|v| (IdType::Gtin, v)),
        _ => Some((id_type, value.to_string())),
    }
}

/// Normalize a whole lookup id map, keeping first-seen order.
pub fn normalize_lookup_ids(lookup_ids: &LookupIds) -> LookupIds {
    let mut out = LookupIds::new();
    for (t, v) in lookup_ids {
        if let Some((t, v)) = lookup_id_cleanup(*t, v) {
            out.entry(t).or_insert(v);
        }
    }
    out
}

/// Classify a book identifier as ISBN-13 or ASIN.
pub fn detect_isbn_asin(s: &str) -> Option<(IdType, String)> {
    let n: String = s
        .trim()
        .chars()
        .filter(|c| !matches!(c, '-' | ' '))
        .collect::<String>()
        .to_uppercase();
    if n.len() == 13 && n.chars().all(|c| c.is_ascii_digit()) && (n.starts_with("978") || n.starts_with("979")) {
        return Some((IdType::Isbn, n));
    }
    if n.len() == 10 {
        if let Some(isbn) = isbn_10_to_13(&n) {
            return Some((IdType::Isbn, isbn));
        }
        if n.starts_with('B') && n.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Some((IdType::Asin, n));
        }
    }
    None
}

/// Convert a valid ISBN-10 to ISBN-13.
pub fn isbn_10_to_13(isbn: &str) -> Option<String> {
    let s: String = isbn.chars().filter(|c| *c != '-').collect();
    let bytes = s.as_bytes();
    if bytes.len() != 10 || !bytes[..9].iter().all(u8::is_ascii_digit) {
        return None;
    }
    let check = match bytes[9] {
        b'X' | b'x' => 10,
        b if b.is_ascii_digit() => (b - b'0') as u32,
        _ => return None,
    };
    let sum: u32 = bytes[..9]
        .iter()
        .enumerate()
        .map(|(i, b)| (10 - i as u32) * (b - b'0') as u32)
        .sum();
    if (sum + check) % 11 != 0 {
        return None;
    }
    let body = format!("978{}", &s[..9]);
    Some(format!("{}{}", body, ean13_check_digit(&body)))
}

/// Convert an ISBN-13 in the 978 range back to ISBN-10.
pub fn isbn_13_to_10(isbn: &str) -> Option<String> {
    let bytes = isbn.as_bytes();
    if bytes.len() != 13 || !isbn.starts_with("978") || !bytes.iter().all(u8::is_ascii_digit) {
        return None;
    }
    let body = &isbn[3..12];
    let sum: u32 = body
        .bytes()
        .enumerate()
        .map(|(i, b)| (10 - i as u32) * (b - b'0') as u32)
        .sum();
    let check = (11 - sum % 11) % 11;
    let check = if check == 10 {
        "X".to_string()
    } else {
        check.to_string()
    };
    Some(format!("{}{}", body, check))
}

/// Convert UPC-A to GTIN-13, or `None` if it does not validate.
///
/// Sources disagree on zero padding, so shorter values are left-padded and
/// longer values may only shed leading zeros.
pub fn upc_to_gtin_13(upc: &str) -> Option<String> {
    let s = upc.trim();
    if s.is_empty() || !s.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    if s.len() <= 13 {
        return Some(format!("{:0>13}", s));
    }
    let (prefix, rest) = s.split_at(s.len() - 13);
    if prefix.chars().all(|c| c == '0') {
        Some(rest.to_string())
    } else {
        None
    }
}

fn ean13_check_digit(body: &str) -> u32 {
    let sum: u32 = body
        .bytes()
        .enumerate()
        .map(|(i, b)| {
            let d = (b - b'0') as u32;
            if i % 2 == 0 {
                d
            } else {
                d * 3
            }
        })
        .sum();
    (10 - sum % 10) % 10
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_keys_round_trip_through_from_str() {
        for t in IdType::ALL {
            assert_eq!(t.as_str().parse::<IdType>().unwrap(), t);
        }
        assert!("nope".parse::<IdType>().is_err());
    }

    #[test]
    fn test_serde_uses_stable_keys() {
        let json = serde_json::to_string(&IdType::TmdbTvSeason).unwrap();
        assert_eq!(json, "\"tmdb_tvseason\"");

        let mut ids = LookupIds::new();
        ids.insert(IdType::Isbn, "9780553283686".into());
        let json = serde_json::to_string(&ids).unwrap();
        assert_eq!(json, r#"{"isbn":"9780553283686"}"#);
        let back: LookupIds = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ids);
    }

    #[test]
    fn test_best_lookup_id_prefers_ideal_order() {
        let mut ids = LookupIds::new();
        ids.insert(IdType::Goodreads, "77566".into());
        ids.insert(IdType::Asin, "B004G60EHS".into());
        ids.insert(IdType::Isbn, "9780553283686".into());
        assert_eq!(
            get_best_lookup_id(&ids),
            Some((IdType::Isbn, "9780553283686".to_string()))
        );
    }

    #[test]
    fn test_best_lookup_id_falls_back_to_first() {
        let mut ids = LookupIds::new();
        ids.insert(IdType::DoubanBook, "1".into());
        ids.insert(IdType::Goodreads, "2".into());
        assert_eq!(
            get_best_lookup_id(&ids),
            Some((IdType::DoubanBook, "1".to_string()))
        );
        assert_eq!(get_best_lookup_id(&LookupIds::new()), None);
    }

    #[test]
    fn test_isbn_conversions() {
        assert_eq!(isbn_10_to_13("0553283685").as_deref(), Some("9780553283686"));
        assert_eq!(isbn_13_to_10("9780553283686").as_deref(), Some("0553283685"));
        assert_eq!(isbn_10_to_13("0553283684"), None);
        assert_eq!(isbn_10_to_13("080442957X").as_deref(), Some("9780804429573"));
    }

    #[test]
    fn test_cleanup_reclassifies_book_ids() {
        assert_eq!(
            lookup_id_cleanup(IdType::Asin, " 0553283685 "),
            Some((IdType::Isbn, "9780553283686".to_string()))
        );
        assert_eq!(
            lookup_id_cleanup(IdType::Asin, "B004G60EHS"),
            Some((IdType::Asin, "B004G60EHS".to_string()))
        );
        assert_eq!(lookup_id_cleanup(IdType::Imdb, "   "), None);
    }

    #[test]
    fn test_upc_to_gtin() {
        assert_eq!(upc_to_gtin_13("602445804689").as_deref(), Some("0602445804689"));
        assert_eq!(upc_to_gtin_13("000602445804689").as_deref(), Some("0602445804689"));
        assert_eq!(upc_to_gtin_13("190602445804689"), None);
        assert_eq!(upc_to_gtin_13("12ab"), None);
    }

    fn any_id_type() -> impl Strategy<Value = IdType> {
        (0..IdType::ALL.len()).prop_map(|i| IdType::ALL[i])
    }

    proptest! {
        #[test]
        fn prop_best_lookup_id_is_earliest_ideal(
            kinds in proptest::collection::vec(any_id_type(), 1..12)
        ) {
            let mut ids = LookupIds::new();
            for (i, k) in kinds.iter().enumerate() {
                ids.insert(*k, format!("v{}", i));
            }
            let best = get_best_lookup_id(&ids).map(|(t, _)| t);
            let expected_ideal = IDEAL_ID_TYPES.iter().copied().find(|t| ids.contains_key(t));
            match expected_ideal {
                Some(t) => prop_assert_eq!(best, Some(t)),
                None => prop_assert_eq!(best, ids.keys().next().copied()),
            }
            // Deterministic for the same input
            prop_assert_eq!(get_best_lookup_id(&ids), get_best_lookup_id(&ids.clone()));
        }
    }
}
