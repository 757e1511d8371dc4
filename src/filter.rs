// Which discovered containers get reported. One policy is picked at startup.

use serde::Deserialize;
use std::str::FromStr;
use uuid::Uuid;

/// Selector as written in config (`match_policy`) or `MATCH_TYPE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    #[default]
    All,
    AllButSelf,
    Uuid,
}

impl FromStr for MatchKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "ALL" => Ok(MatchKind::All),
            "ALL_BUT_SELF" | "NO_SENDER" | "NO_CADVISOR" => Ok(MatchKind::AllButSelf),
            "UUID" => Ok(MatchKind::Uuid),
            other => anyhow::bail!("unknown match type {:?}", other),
        }
    }
}

/// Container-name predicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchPolicy {
    All,
    /// Everything except a container that carries `self_alias`.
    AllButSelf { self_alias: String },
    /// Names that parse as version-1 UUIDs; the sender itself is never matched.
    Uuid { self_alias: String },
}

impl MatchPolicy {
    pub fn new(kind: MatchKind, self_alias: &str) -> Self {
        match kind {
            MatchKind::All => MatchPolicy::All,
            MatchKind::AllButSelf => MatchPolicy::AllButSelf {
                self_alias: self_alias.to_string(),
            },
            MatchKind::Uuid => MatchPolicy::Uuid {
                self_alias: self_alias.to_string(),
            },
        }
    }

    /// `name` is the candidate alias, `aliases` every alias of the same container.
    pub fn matches(&self, name: &str, aliases: &[String]) -> bool {
        match self {
            MatchPolicy::All => true,
            MatchPolicy::AllButSelf { self_alias } => !has_alias(aliases, self_alias),
            MatchPolicy::Uuid { self_alias } => {
                !has_alias(aliases, self_alias) && is_uuid_v1(name)
            }
        }
    }

    /// First alias the policy accepts; it becomes the payload key.
    pub fn select_name(&self, aliases: &[String]) -> Option<String> {
        aliases
            .iter()
            .map(|a| a.trim_start_matches('/'))
            .find(|a| self.matches(a, aliases))
            .map(str::to_string)
    }
}

fn has_alias(aliases: &[String], wanted: &str) -> bool {
    aliases
        .iter()
        .any(|a| a.trim_start_matches('/') == wanted)
}

fn is_uuid_v1(name: &str) -> bool {
    Uuid::parse_str(name).is_ok_and(|u| u.get_version_num() == 1)
}
