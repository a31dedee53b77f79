//! Catalog payloads carried by the cache
//!
//! These mirror the JSON shapes returned by the TOU.TV catalog service. The
//! cache treats them as opaque serializable values; the only field it ever
//! looks at is [`Show::id`].

use serde::{Deserialize, Serialize};

/// A show ("emission") in the catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Show {
    /// Unique catalog identifier
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub network: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub genre: Option<Genre>,
}

impl Show {
    /// Creates a show with only an id and title set
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: None,
            network: None,
            country: None,
            genre: None,
        }
    }

    /// Identifier used to key this show's episodes in the cache
    pub fn id(&self) -> &str {
        &self.id
    }
}

/// A single episode of a show
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Episode {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub season_number: Option<u32>,
    #[serde(default)]
    pub episode_number: Option<u32>,
    #[serde(default)]
    pub url: Option<String>,
    /// Media player id used to resolve stream URLs
    #[serde(rename = "PID", default)]
    pub pid: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl Episode {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            season_number: None,
            episode_number: None,
            url: None,
            pid: None,
            description: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Genre {
    pub id: String,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Country {
    pub id: String,
    pub name: String,
}

/// Snapshot of the catalog "repertoire" listing page
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RepertoirePage {
    #[serde(default)]
    pub emissions: Vec<Show>,
    #[serde(default)]
    pub genres: Vec<Genre>,
    #[serde(default)]
    pub countries: Vec<Country>,
}
