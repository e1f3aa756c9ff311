//! Status enums and small value types shared between the database layer, the
//! HTTP API and the background workers.
//!
//! Every enum round-trips through the lowercase string stored in Postgres via
//! [`as_str`](Plan::as_str) and [`FromStr`].

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::UnknownVariant;

macro_rules! string_enum {
    ($name:ident, $kind:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            #[must_use]
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text,)+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    other => Err(UnknownVariant {
                        kind: $kind,
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Subscription plans
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    Free,
    Pro,
    Business,
}

string_enum!(Plan, "plan", {
    Free => "free",
    Pro => "pro",
    Business => "business",
});

impl Plan {
    /// Maximum number of trackers (active or paused) an owner may hold.
    #[must_use]
    pub fn tracker_limit(self) -> i64 {
        match self {
            Plan::Free => 3,
            Plan::Pro => 25,
            Plan::Business => 100,
        }
    }

    /// Maximum number of mention checks per calendar month.
    #[must_use]
    pub fn monthly_check_limit(self) -> i64 {
        match self {
            Plan::Free => 100,
            Plan::Pro => 2_000,
            Plan::Business => 10_000,
        }
    }
}

// ---------------------------------------------------------------------------
// Integrations
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntegrationStatus {
    Active,
    Paused,
    Error,
}

string_enum!(IntegrationStatus, "integration status", {
    Active => "active",
    Paused => "paused",
    Error => "error",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntegrationLogStatus {
    Success,
    Error,
    Pending,
}

string_enum!(IntegrationLogStatus, "integration log status", {
    Success => "success",
    Error => "error",
    Pending => "pending",
});

/// Events an integration can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MentionEvent {
    /// Fired after every completed check, mentioned or not.
    #[serde(rename = "mention.checked")]
    Checked,
    /// Fired when a check finds the brand.
    #[serde(rename = "mention.found")]
    Found,
    /// Fired when a tracker that was mentioned last time is no longer mentioned.
    #[serde(rename = "mention.lost")]
    Lost,
    /// Synthetic event sent from the "test integration" endpoint.
    #[serde(rename = "test")]
    Test,
}

string_enum!(MentionEvent, "event", {
    Checked => "mention.checked",
    Found => "mention.found",
    Lost => "mention.lost",
    Test => "test",
});

/// Optional per-integration delivery filters, stored as JSONB.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventFilters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub events: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_position: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mentioned_only: Option<bool>,
}

impl EventFilters {
    /// Decode filters from a stored JSON value, treating anything malformed as "no filters".
    #[must_use]
    pub fn from_json(value: &serde_json::Value) -> Self {
        serde_json::from_value(value.clone()).unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// Contacts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethod {
    Direct,
    ContactPage,
    AuthorPage,
}

string_enum!(ExtractionMethod, "extraction method", {
    Direct => "direct",
    ContactPage => "contact_page",
    AuthorPage => "author_page",
});

// ---------------------------------------------------------------------------
// Teams
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TeamRole {
    Owner,
    Admin,
    Member,
}

string_enum!(TeamRole, "team role", {
    Owner => "owner",
    Admin => "admin",
    Member => "member",
});

impl TeamRole {
    /// Owners and admins may manage members, invites and team settings.
    #[must_use]
    pub fn can_manage(self) -> bool {
        matches!(self, TeamRole::Owner | TeamRole::Admin)
    }
}
