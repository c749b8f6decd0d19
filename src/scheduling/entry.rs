// src/scheduling/entry.rs

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer, de};
use uuid::Uuid;

/// Client-side id of a package that has not been persisted yet.
/// Format: `temp-{service_id}-{counter}`, counter owned by the draft.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TempPackageId(String);

impl TempPackageId {
    pub const PREFIX: &'static str = "temp-";

    pub fn new(service_id: Uuid, counter: u32) -> Self {
        Self(format!("{}{service_id}-{counter}", Self::PREFIX))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TempPackageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Package a not-yet-persisted session is attached to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum NewPackage {
    Order(Uuid),
    Temp(TempPackageId),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SessionState {
    /// Mirrors a persisted appointment_service row. Never removed from the
    /// draft, only flagged.
    Existing {
        appointment_service_id: Uuid,
        order_id: Option<Uuid>,
        #[serde(default)]
        marked_for_deletion: bool,
    },
    New {
        package: NewPackage,
    },
}

/// One planned session inside an appointment draft.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionEntry {
    pub service_id: Uuid,
    pub session_number: i32,
    #[serde(flatten)]
    pub state: SessionState,
}

impl SessionEntry {
    pub fn existing(
        appointment_service_id: Uuid,
        order_id: Option<Uuid>,
        service_id: Uuid,
        session_number: i32,
    ) -> Self {
        Self {
            service_id,
            session_number,
            state: SessionState::Existing {
                appointment_service_id,
                order_id,
                marked_for_deletion: false,
            },
        }
    }

    pub fn new_session(service_id: Uuid, package: NewPackage, session_number: i32) -> Self {
        Self {
            service_id,
            session_number,
            state: SessionState::New { package },
        }
    }

    pub fn is_existing(&self) -> bool {
        matches!(self.state, SessionState::Existing { .. })
    }

    pub fn is_new(&self) -> bool {
        matches!(self.state, SessionState::New { .. })
    }

    pub fn is_marked_for_deletion(&self) -> bool {
        matches!(
            self.state,
            SessionState::Existing {
                marked_for_deletion: true,
                ..
            }
        )
    }

    /// Kept sessions: new ones and existing ones not marked for deletion.
    pub fn is_active(&self) -> bool {
        !self.is_marked_for_deletion()
    }

    pub fn appointment_service_id(&self) -> Option<Uuid> {
        match &self.state {
            SessionState::Existing {
                appointment_service_id,
                ..
            } => Some(*appointment_service_id),
            SessionState::New { .. } => None,
        }
    }

    pub fn order_id(&self) -> Option<Uuid> {
        match &self.state {
            SessionState::Existing { order_id, .. } => *order_id,
            SessionState::New {
                package: NewPackage::Order(id),
            } => Some(*id),
            SessionState::New { .. } => None,
        }
    }

    pub fn temp_package_id(&self) -> Option<&TempPackageId> {
        match &self.state {
            SessionState::New {
                package: NewPackage::Temp(id),
            } => Some(id),
            _ => None,
        }
    }

    pub fn group_key(&self) -> GroupKey {
        if let Some(order_id) = self.order_id() {
            return GroupKey::Order(order_id);
        }
        match self.temp_package_id() {
            Some(temp) => GroupKey::Temp(temp.clone()),
            None => GroupKey::Standalone(self.service_id),
        }
    }

    pub(crate) fn set_marked_for_deletion(&mut self, marked: bool) {
        if let SessionState::Existing {
            marked_for_deletion,
            ..
        } = &mut self.state
        {
            *marked_for_deletion = marked;
        }
    }
}

/// Key a session is grouped under.
///
/// String forms: `existing-{order_id}`, the temp package id itself, or
/// `new-{service_id}` for sessions booked without any package.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GroupKey {
    Order(Uuid),
    Temp(TempPackageId),
    Standalone(Uuid),
}

impl GroupKey {
    pub fn order_id(&self) -> Option<Uuid> {
        match self {
            GroupKey::Order(id) => Some(*id),
            _ => None,
        }
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupKey::Order(id) => write!(f, "existing-{id}"),
            GroupKey::Temp(temp) => f.write_str(temp.as_str()),
            GroupKey::Standalone(service_id) => write!(f, "new-{service_id}"),
        }
    }
}

impl FromStr for GroupKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(rest) = s.strip_prefix("existing-") {
            let id = Uuid::parse_str(rest).map_err(|e| format!("bad order id in {s:?}: {e}"))?;
            return Ok(GroupKey::Order(id));
        }
        if let Some(rest) = s.strip_prefix("new-") {
            let id = Uuid::parse_str(rest).map_err(|e| format!("bad service id in {s:?}: {e}"))?;
            return Ok(GroupKey::Standalone(id));
        }
        if s.starts_with(TempPackageId::PREFIX) {
            return Ok(GroupKey::Temp(TempPackageId(s.to_string())));
        }
        Err(format!("unrecognized package key {s:?}"))
    }
}

impl Serialize for GroupKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for GroupKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}
