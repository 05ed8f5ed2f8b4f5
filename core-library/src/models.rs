//! Domain models for the game library
//!
//! Records are read with `sqlx::FromRow`; the resolver only ever touches the
//! metadata columns listed in [`MetadataField`].

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;

// =============================================================================
// Metadata fields
// =============================================================================

/// A column the resolver knows how to fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetadataField {
    CoverImage,
    ReleaseDate,
    Genre,
    Description,
    CriticRating,
    MarketPrice,
}

impl MetadataField {
    pub const ALL: [MetadataField; 6] = [
        MetadataField::CoverImage,
        MetadataField::ReleaseDate,
        MetadataField::Genre,
        MetadataField::Description,
        MetadataField::CriticRating,
        MetadataField::MarketPrice,
    ];

    /// Stable identifier used on the command line and in JSON.
    pub fn as_str(&self) -> &'static str {
        match self {
            MetadataField::CoverImage => "cover_image",
            MetadataField::ReleaseDate => "release_date",
            MetadataField::Genre => "genre",
            MetadataField::Description => "description",
            MetadataField::CriticRating => "critic_rating",
            MetadataField::MarketPrice => "market_price",
        }
    }

    /// Column in the `games` table.
    pub fn column_name(&self) -> &'static str {
        match self {
            MetadataField::CoverImage => "cover_image_url",
            MetadataField::ReleaseDate => "release_date",
            MetadataField::Genre => "genre",
            MetadataField::Description => "description",
            MetadataField::CriticRating => "critic_rating",
            MetadataField::MarketPrice => "market_price",
        }
    }

    /// Human-readable name for user-facing messages.
    pub fn label(&self) -> &'static str {
        match self {
            MetadataField::CoverImage => "cover image",
            MetadataField::ReleaseDate => "release date",
            MetadataField::Genre => "genre",
            MetadataField::Description => "description",
            MetadataField::CriticRating => "critic rating",
            MetadataField::MarketPrice => "market price",
        }
    }
}

impl fmt::Display for MetadataField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetadataField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        match wanted.as_str() {
            "cover" | "cover_image" | "cover_image_url" => Ok(MetadataField::CoverImage),
            "release_date" => Ok(MetadataField::ReleaseDate),
            "genre" => Ok(MetadataField::Genre),
            "description" => Ok(MetadataField::Description),
            "critic_rating" | "rating" | "metascore" => Ok(MetadataField::CriticRating),
            "market_price" | "price" => Ok(MetadataField::MarketPrice),
            _ => Err(format!(
                "unknown field '{}', expected one of: {}",
                s,
                MetadataField::ALL.map(|f| f.as_str()).join(", ")
            )),
        }
    }
}

/// A typed value ready to be written to a metadata column.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Integer(i64),
    Real(f64),
}

impl FieldValue {
    /// Convert a resolved string into the column's storage type.
    pub fn parse(field: MetadataField, raw: &str) -> Result<Self, String> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(format!("empty {}", field.label()));
        }

        match field {
            MetadataField::CriticRating => raw
                .parse::<f64>()
                .ok()
                .filter(|v| (0.0..=100.0).contains(v))
                .map(|v| FieldValue::Integer(v.round() as i64))
                .ok_or_else(|| format!("'{}' is not a rating between 0 and 100", raw)),
            MetadataField::MarketPrice => raw
                .trim_start_matches('$')
                .replace(',', "")
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite() && *v >= 0.0)
                .map(FieldValue::Real)
                .ok_or_else(|| format!("'{}' is not a price", raw)),
            _ => Ok(FieldValue::Text(raw.to_string())),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(s) => f.write_str(s),
            FieldValue::Integer(i) => write!(f, "{}", i),
            FieldValue::Real(r) => write!(f, "{:.2}", r),
        }
    }
}

// =============================================================================
// Game records
// =============================================================================

/// A game in the collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct GameRecord {
    pub id: i64,
    pub title: String,
    /// Free-text platform name as entered by the user
    pub platform: String,
    pub cover_image_url: Option<String>,
    /// ISO date (YYYY-MM-DD)
    pub release_date: Option<String>,
    pub genre: Option<String>,
    pub description: Option<String>,
    /// 0..=100
    pub critic_rating: Option<i64>,
    pub market_price: Option<f64>,
}

impl GameRecord {
    /// Current value of a metadata column, rendered as text.
    pub fn value_of(&self, field: MetadataField) -> Option<String> {
        match field {
            MetadataField::CoverImage => self.cover_image_url.clone(),
            MetadataField::ReleaseDate => self.release_date.clone(),
            MetadataField::Genre => self.genre.clone(),
            MetadataField::Description => self.description.clone(),
            MetadataField::CriticRating => self.critic_rating.map(|v| v.to_string()),
            MetadataField::MarketPrice => self.market_price.map(|v| format!("{:.2}", v)),
        }
        .filter(|v| !v.trim().is_empty())
    }

    /// Whether the resolver should try to fill `field` for this record.
    pub fn is_missing(&self, field: MetadataField) -> bool {
        self.value_of(field).is_none()
    }
}

/// Insert payload for a new game.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewGame {
    pub title: String,
    pub platform: String,
    pub cover_image_url: Option<String>,
    pub release_date: Option<String>,
    pub genre: Option<String>,
    pub description: Option<String>,
    pub critic_rating: Option<i64>,
    pub market_price: Option<f64>,
}

impl NewGame {
    pub fn new(title: impl Into<String>, platform: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            platform: platform.into(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.title.trim().is_empty() {
            return Err("Game title cannot be empty".to_string());
        }

        if let Some(rating) = self.critic_rating {
            if !(0..=100).contains(&rating) {
                return Err(format!("Critic rating {} is out of valid range", rating));
            }
        }

        if self.market_price.is_some_and(|p| p < 0.0) {
            return Err("Market price cannot be negative".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> GameRecord {
        GameRecord {
            id: 1,
            title: "Halo 2".to_string(),
            platform: "Xbox".to_string(),
            cover_image_url: None,
            release_date: Some("2004-11-09".to_string()),
            genre: Some("  ".to_string()),
            description: None,
            critic_rating: Some(95),
            market_price: None,
        }
    }

    #[test]
    fn test_field_parsing() {
        assert_eq!("cover_image".parse::<MetadataField>(), Ok(MetadataField::CoverImage));
        assert_eq!("Release Date".parse::<MetadataField>(), Ok(MetadataField::ReleaseDate));
        assert_eq!("price".parse::<MetadataField>(), Ok(MetadataField::MarketPrice));
        assert!("boxart".parse::<MetadataField>().is_err());
    }

    #[test]
    fn test_field_roundtrips_through_display() {
        for field in MetadataField::ALL {
            assert_eq!(field.to_string().parse::<MetadataField>(), Ok(field));
        }
    }

    #[test]
    fn test_missing_fields() {
        let game = record();
        assert!(game.is_missing(MetadataField::CoverImage));
        assert!(game.is_missing(MetadataField::Genre), "blank counts as missing");
        assert!(!game.is_missing(MetadataField::ReleaseDate));
        assert_eq!(game.value_of(MetadataField::CriticRating), Some("95".to_string()));
    }

    #[test]
    fn test_field_value_parse() {
        assert_eq!(
            FieldValue::parse(MetadataField::CriticRating, "87"),
            Ok(FieldValue::Integer(87))
        );
        assert!(FieldValue::parse(MetadataField::CriticRating, "187").is_err());
        assert_eq!(
            FieldValue::parse(MetadataField::MarketPrice, "$1,024.50"),
            Ok(FieldValue::Real(1024.5))
        );
        assert_eq!(
            FieldValue::parse(MetadataField::Genre, " Shooter "),
            Ok(FieldValue::Text("Shooter".to_string()))
        );
        assert!(FieldValue::parse(MetadataField::Description, "   ").is_err());
    }

    #[test]
    fn test_new_game_validation() {
        assert!(NewGame::new("Halo", "Xbox").validate().is_ok());
        assert!(NewGame::new(" ", "Xbox").validate().is_err());

        let mut bad_rating = NewGame::new("Halo", "Xbox");
        bad_rating.critic_rating = Some(120);
        assert!(bad_rating.validate().is_err());
    }
}
