use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::SyncError;

/// One subscription sport. Declaration order is the processing order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ValueEnum,
)]
#[serde(rename_all = "UPPERCASE")]
#[value(rename_all = "UPPERCASE")]
pub enum Category {
    Cbk,
    Cfb,
    Mlb,
    Nba,
    Nfl,
    Nhl,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::Cbk,
        Category::Cfb,
        Category::Mlb,
        Category::Nba,
        Category::Nfl,
        Category::Nhl,
    ];

    pub fn code(self) -> &'static str {
        match self {
            Category::Cbk => "CBK",
            Category::Cfb => "CFB",
            Category::Mlb => "MLB",
            Category::Nba => "NBA",
            Category::Nfl => "NFL",
            Category::Nhl => "NHL",
        }
    }

    /// Subscription page on the public site for this sport.
    pub fn default_page(self) -> String {
        let code = self.code();
        format!("http://www.kostats.com/{code}_Subscription/{code}.HTM")
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Category {
    type Err = SyncError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_uppercase();
        Category::ALL
            .into_iter()
            .find(|category| category.code() == normalized)
            .ok_or_else(|| SyncError::InvalidCategory(value.to_string()))
    }
}

/// A downloadable file as listed on a category page right now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogItem {
    pub name: String,
    pub url: Url,
}

impl CatalogItem {
    /// Builds an item from an absolute URL, naming it after the last path segment.
    pub fn from_url(url: Url) -> Option<Self> {
        let name = url
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .filter(|segment| is_safe_file_name(segment))?
            .to_string();
        Some(Self { name, url })
    }
}

fn is_safe_file_name(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains(['/', '\\'])
}
