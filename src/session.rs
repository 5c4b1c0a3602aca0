use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Target role for the interview.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Frontend,
    Backend,
    Fullstack,
}

/// Candidate experience level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    #[default]
    Junior,
    Mid,
    Senior,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} '{value}'")]
pub struct ParseParamError {
    kind: &'static str,
    value: String,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Frontend, Role::Backend, Role::Fullstack];

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Frontend => "frontend",
            Role::Backend => "backend",
            Role::Fullstack => "fullstack",
        }
    }

    /// Technologies the questions should draw from.
    pub fn focus_areas(self) -> &'static str {
        match self {
            Role::Frontend => "React, Vue, Angular, JavaScript, CSS, HTML",
            Role::Backend => "Node.js, Python, Java, APIs, databases",
            Role::Fullstack => "frontend and backend together, system design",
        }
    }

    /// Lenient parse for session entry parameters: anything missing or
    /// unrecognised falls back to `frontend`.
    pub fn from_param(value: Option<&str>) -> Self {
        parse_or_default(value, "role")
    }
}

impl Level {
    pub const ALL: [Level; 3] = [Level::Junior, Level::Mid, Level::Senior];

    pub fn as_str(self) -> &'static str {
        match self {
            Level::Junior => "junior",
            Level::Mid => "mid",
            Level::Senior => "senior",
        }
    }

    pub fn experience(self) -> &'static str {
        match self {
            Level::Junior => "0-2 years of experience",
            Level::Mid => "2-5 years of experience",
            Level::Senior => "5+ years of experience",
        }
    }

    /// Lenient parse; falls back to `junior`.
    pub fn from_param(value: Option<&str>) -> Self {
        parse_or_default(value, "level")
    }
}

fn parse_or_default<T>(value: Option<&str>, kind: &str) -> T
where
    T: FromStr<Err = ParseParamError> + Default + fmt::Display,
{
    match value.map(str::parse::<T>) {
        Some(Ok(parsed)) => parsed,
        Some(Err(e)) => {
            let fallback = T::default();
            log::warn!("{e}, using default {kind} '{fallback}'");
            fallback
        }
        None => T::default(),
    }
}

impl FromStr for Role {
    type Err = ParseParamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "frontend" => Ok(Role::Frontend),
            "backend" => Ok(Role::Backend),
            "fullstack" => Ok(Role::Fullstack),
            _ => Err(ParseParamError {
                kind: "role",
                value: s.to_string(),
            }),
        }
    }
}

impl FromStr for Level {
    type Err = ParseParamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "junior" => Ok(Level::Junior),
            "mid" => Ok(Level::Mid),
            "senior" => Ok(Level::Senior),
            _ => Err(ParseParamError {
                kind: "level",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fixed for the lifetime of one session. A reset keeps it; a new session
/// replaces it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SessionConfig {
    pub role: Role,
    pub level: Level,
}

impl SessionConfig {
    pub fn new(role: Role, level: Level) -> Self {
        Self { role, level }
    }

    /// Build from raw entry parameters, falling back to `frontend`/`junior`.
    pub fn from_params(role: Option<&str>, level: Option<&str>) -> Self {
        Self {
            role: Role::from_param(role),
            level: Level::from_param(level),
        }
    }
}
