use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize)]
pub struct JwtHeader {
    pub alg: String,
    pub typ: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    pub sub: String,
    pub exp: Option<u64>,
    pub email: Option<String>,
    pub role: Option<String>,
    pub app_metadata: Option<Value>,
    pub user_metadata: Option<Value>,
    pub aud: Option<String>,
    pub iat: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: Option<String>,
    pub role: Option<String>,
    pub app_metadata: Option<Value>,
    pub metadata: Option<Value>,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub valid: bool,
    pub user_id: String,
    pub email: Option<String>,
    pub role: Option<String>,
}

// ==============================================================================
// ROLES AND CAPABILITIES
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Therapist,
    Patient,
}

impl Role {
    /// Maps the role names issued by the identity provider onto clinic roles.
    /// Unknown or generic names ("authenticated") are treated as patients.
    pub fn from_claim(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "admin" | "super_admin" | "superadmin" => Role::Admin,
            "therapist" | "specialist" | "doctor" => Role::Therapist,
            _ => Role::Patient,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Admin => write!(f, "admin"),
            Role::Therapist => write!(f, "therapist"),
            Role::Patient => write!(f, "patient"),
        }
    }
}

/// Administrative areas an admin account may be granted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    News,
    Marks,
    Assessments,
    Appointments,
}

impl Capability {
    pub const ALL: [Capability; 4] = [
        Capability::News,
        Capability::Marks,
        Capability::Assessments,
        Capability::Appointments,
    ];

    /// Bit used by the legacy `permissions` integer.
    fn legacy_bit(self) -> u64 {
        match self {
            Capability::News => 8,
            Capability::Marks => 4,
            Capability::Assessments => 2,
            Capability::Appointments => 1,
        }
    }

    pub fn from_name(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "news" => Some(Capability::News),
            "mark" | "marks" => Some(Capability::Marks),
            "assessment" | "assessments" => Some(Capability::Assessments),
            "appointment" | "appointments" => Some(Capability::Appointments),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CapabilitySet(BTreeSet<Capability>);

impl CapabilitySet {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn all() -> Self {
        Capability::ALL.into_iter().collect()
    }

    /// Decodes the legacy bitmask once, at the edge.
    pub fn from_legacy_bits(bits: u64) -> Self {
        Capability::ALL
            .into_iter()
            .filter(|cap| bits & cap.legacy_bit() != 0)
            .collect()
    }

    /// Reads `capabilities` (names) or, failing that, `permissions` (bitmask)
    /// from the token's app metadata. `None` when the token carries neither.
    pub fn from_app_metadata(app_metadata: &Value) -> Option<Self> {
        if let Some(names) = app_metadata.get("capabilities").and_then(Value::as_array) {
            return Some(
                names
                    .iter()
                    .filter_map(Value::as_str)
                    .filter_map(Capability::from_name)
                    .collect(),
            );
        }

        app_metadata
            .get("permissions")
            .and_then(Value::as_u64)
            .map(Self::from_legacy_bits)
    }

    pub fn contains(&self, capability: Capability) -> bool {
        self.0.contains(&capability)
    }

    pub fn insert(&mut self, capability: Capability) {
        self.0.insert(capability);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Capability> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<Capability> for CapabilitySet {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

// ==============================================================================
// ACTOR
// ==============================================================================

/// The authenticated caller of a request. Built once by the auth middleware
/// and handed to every service that makes an access decision.
#[derive(Debug, Clone, Serialize)]
pub struct Actor {
    pub user_id: Uuid,
    pub role: Role,
    pub capabilities: CapabilitySet,
    #[serde(skip_serializing)]
    pub token: String,
}

impl Actor {
    pub fn from_user(user: &User, token: &str) -> Result<Self, String> {
        let user_id = Uuid::parse_str(&user.id)
            .map_err(|_| format!("Token subject is not a valid user id: {}", user.id))?;

        let metadata_role = user
            .app_metadata
            .as_ref()
            .and_then(|meta| meta.get("role"))
            .and_then(Value::as_str);

        let role = metadata_role
            .or(user.role.as_deref())
            .map(Role::from_claim)
            .unwrap_or(Role::Patient);

        let declared = user
            .app_metadata
            .as_ref()
            .and_then(CapabilitySet::from_app_metadata);

        // Admin accounts without an explicit grant are full administrators.
        let capabilities = match (role, declared) {
            (Role::Admin, None) => CapabilitySet::all(),
            (Role::Admin, Some(set)) => set,
            _ => CapabilitySet::empty(),
        };

        Ok(Self {
            user_id,
            role,
            capabilities,
            token: token.to_string(),
        })
    }

    /// System actor used by background jobs.
    pub fn system(token: &str) -> Self {
        Self {
            user_id: Uuid::nil(),
            role: Role::Admin,
            capabilities: CapabilitySet::all(),
            token: token.to_string(),
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn is_therapist(&self) -> bool {
        self.role == Role::Therapist
    }

    pub fn can(&self, capability: Capability) -> bool {
        self.is_admin() && self.capabilities.contains(capability)
    }

    pub fn is(&self, id: Uuid) -> bool {
        self.user_id == id
    }
}
