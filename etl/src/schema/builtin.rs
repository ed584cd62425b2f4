//! Built-in declarations of the tables produced by the match data collector.

use crate::types::{ColumnSchema, SemanticType, TableSchema};

pub const LEADERBOARDS_TABLE: &str = "tb_leaderboards";
pub const MAPS_TABLE: &str = "tb_maps";

/// Default entity key and recency column of a built-in table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuiltinDefaults {
    pub key_columns: &'static [&'static str],
    pub recency_column: Option<&'static str>,
}

const LEADERBOARDS_REQUIRED: [(&str, SemanticType); 9] = [
    ("PlayerId", SemanticType::Integer),
    ("TeamId", SemanticType::Integer),
    ("Name", SemanticType::String),
    ("MatchName", SemanticType::String),
    ("Team", SemanticType::String),
    ("IsClosed", SemanticType::Boolean),
    ("GameId", SemanticType::Integer),
    ("OpponentId", SemanticType::Integer),
    ("Opponent", SemanticType::String),
];

const LEADERBOARDS_TEXT: [&str; 5] = ["Day", "DateTime", "Updated", "UpdatedUtc", "Games"];

const LEADERBOARDS_STATS: [&str; 16] = [
    "Maps",
    "FantasyPoints",
    "Kills",
    "Assists",
    "Deaths",
    "Headshots",
    "AverageDamagePerRound",
    "Kast",
    "Rating",
    "EntryKills",
    "QuadKills",
    "Aces",
    "Clutch1v2s",
    "Clutch1v3s",
    "Clutch1v4s",
    "Clutch1v5s",
];

/// Per-player match statistics. 30 columns.
pub fn leaderboards() -> TableSchema {
    let required = LEADERBOARDS_REQUIRED
        .iter()
        .map(|(name, typ)| ColumnSchema::new(*name, *typ, false));
    let text = LEADERBOARDS_TEXT
        .iter()
        .map(|name| ColumnSchema::new(*name, SemanticType::String, true));
    let stats = LEADERBOARDS_STATS
        .iter()
        .map(|name| ColumnSchema::new(*name, SemanticType::Float, true));

    TableSchema::new(LEADERBOARDS_TABLE, required.chain(text).chain(stats).collect())
}

/// Per-map match state. Every column is nullable.
pub fn maps() -> TableSchema {
    TableSchema::new(
        MAPS_TABLE,
        vec![
            ColumnSchema::new("Number", SemanticType::Integer, true),
            ColumnSchema::new("Name", SemanticType::String, true),
            ColumnSchema::new("Status", SemanticType::String, true),
            ColumnSchema::new("CurrentRound", SemanticType::Integer, true),
            ColumnSchema::new("TeamAScore", SemanticType::Integer, true),
            ColumnSchema::new("TeamBScore", SemanticType::Integer, true),
        ],
    )
}

/// Returns the built-in schema named `name`, if any.
pub fn lookup(name: &str) -> Option<TableSchema> {
    match name {
        LEADERBOARDS_TABLE => Some(leaderboards()),
        MAPS_TABLE => Some(maps()),
        _ => None,
    }
}

/// Returns the default key and recency column of the built-in table named `name`.
pub fn defaults(name: &str) -> Option<BuiltinDefaults> {
    match name {
        LEADERBOARDS_TABLE => Some(BuiltinDefaults {
            key_columns: &["GameId"],
            recency_column: Some("UpdatedUtc"),
        }),
        MAPS_TABLE => Some(BuiltinDefaults {
            key_columns: &["Number"],
            recency_column: None,
        }),
        _ => None,
    }
}
