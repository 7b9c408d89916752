use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Closed set of user roles.
///
/// Persisted in `usuario.rol` under their Spanish labels. Labels are matched
/// exactly; anything else is rejected rather than guessed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "Administrador")]
    Administrator,
    #[serde(rename = "Supervisor")]
    Supervisor,
    #[serde(rename = "Técnico")]
    Technician,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown role label '{0}'")]
pub struct UnknownRole(pub String);

impl Role {
    pub const ALL: [Role; 3] = [Role::Administrator, Role::Supervisor, Role::Technician];

    /// Label stored in the `usuario.rol` column.
    pub fn label(self) -> &'static str {
        match self {
            Role::Administrator => "Administrador",
            Role::Supervisor => "Supervisor",
            Role::Technician => "Técnico",
        }
    }
}

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(label: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|role| role.label() == label)
            .ok_or_else(|| UnknownRole(label.to_string()))
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_round_trip() {
        for role in Role::ALL {
            assert_eq!(role.label().parse::<Role>(), Ok(role));
            assert_eq!(serde_json::to_value(role).unwrap(), role.label());
        }
    }

    #[test]
    fn labels_are_case_sensitive() {
        assert!("administrador".parse::<Role>().is_err());
        assert!("Tecnico".parse::<Role>().is_err());
        assert!("TÉCNICO".parse::<Role>().is_err());
        assert_eq!("".parse::<Role>(), Err(UnknownRole(String::new())));
    }
}
