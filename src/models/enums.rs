use crate::db::DatabaseError;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = DatabaseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(DatabaseError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

str_enum!(VisitKind {
    Initial => "initial",
    Repeat => "repeat",
});

impl Default for VisitKind {
    fn default() -> Self {
        Self::Repeat
    }
}

str_enum!(EntityKind {
    Patient => "patient",
    Doctor => "doctor",
    Specialization => "specialization",
    Visit => "visit",
});

impl EntityKind {
    /// Human-readable name used in error messages.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Patient => "Patient",
            Self::Doctor => "Doctor",
            Self::Specialization => "Specialization",
            Self::Visit => "Visit",
        }
    }

    /// Parses the plural path segment used by the admin routes.
    pub fn from_plural(segment: &str) -> Option<Self> {
        match segment {
            "patients" => Some(Self::Patient),
            "doctors" => Some(Self::Doctor),
            "specializations" => Some(Self::Specialization),
            "visits" => Some(Self::Visit),
            _ => None,
        }
    }
}

str_enum!(AuditAction {
    SoftDelete => "soft_delete",
    Restore => "restore",
    HardDelete => "hard_delete",
});
