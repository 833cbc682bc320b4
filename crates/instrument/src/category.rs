use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Groups of method replacements that can be switched on and off together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ReplacementCategory {
    #[serde(rename = "BASE")]
    Base,
    #[serde(rename = "SQL")]
    Sql,
    #[serde(rename = "NET")]
    Net,
    #[serde(rename = "EXT_0")]
    Ext0,
    #[serde(rename = "MONGO")]
    Mongo,
    #[serde(rename = "REDIS")]
    Redis,
}

impl ReplacementCategory {
    pub const ALL: [ReplacementCategory; 6] = [
        ReplacementCategory::Base,
        ReplacementCategory::Sql,
        ReplacementCategory::Net,
        ReplacementCategory::Ext0,
        ReplacementCategory::Mongo,
        ReplacementCategory::Redis,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ReplacementCategory::Base => "BASE",
            ReplacementCategory::Sql => "SQL",
            ReplacementCategory::Net => "NET",
            ReplacementCategory::Ext0 => "EXT_0",
            ReplacementCategory::Mongo => "MONGO",
            ReplacementCategory::Redis => "REDIS",
        }
    }
}

impl fmt::Display for ReplacementCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ReplacementCategory {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        ReplacementCategory::ALL
            .into_iter()
            .find(|c| c.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| ConfigError::UnknownCategory(s.to_string()))
    }
}

/// What kind of signal a replacement reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReplacementType {
    /// The original returns a boolean; both outcomes are objectives.
    Boolean,
    /// The original may throw; "returns normally" and "throws" are objectives.
    Exception,
    Object,
    /// Emptiness of a collection.
    Collection,
    /// Only records runtime information, never creates objectives.
    Tracker,
}

impl ReplacementType {
    pub fn name(&self) -> &'static str {
        match self {
            ReplacementType::Boolean => "BOOLEAN",
            ReplacementType::Exception => "EXCEPTION",
            ReplacementType::Object => "OBJECT",
            ReplacementType::Collection => "COLLECTION",
            ReplacementType::Tracker => "TRACKER",
        }
    }
}

impl fmt::Display for ReplacementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
