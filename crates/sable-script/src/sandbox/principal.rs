// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Privilege levels for execution contexts.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// The privilege level a context runs with. Fixed when the context is made.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Principal {
    /// Ordinary module code; privileged capabilities are guarded
    #[default]
    #[serde(alias = "content")]
    Restricted,
    /// Maximally privileged; every capability is installed as a global
    #[serde(alias = "system", alias = "chrome")]
    Elevated,
}

impl Principal {
    /// Lower-case name, as accepted by [`FromStr`].
    pub fn as_str(self) -> &'static str {
        match self {
            Principal::Restricted => "restricted",
            Principal::Elevated => "elevated",
        }
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a principal name is not recognised.
#[derive(Debug, Clone, Error)]
#[error("unknown principal '{0}' (expected restricted or elevated)")]
pub struct ParsePrincipalError(String);

impl FromStr for Principal {
    type Err = ParsePrincipalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "restricted" | "content" => Ok(Principal::Restricted),
            "elevated" | "system" | "chrome" => Ok(Principal::Elevated),
            _ => Err(ParsePrincipalError(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_aliases() {
        assert_eq!("system".parse::<Principal>().unwrap(), Principal::Elevated);
        assert_eq!("Content".parse::<Principal>().unwrap(), Principal::Restricted);
        assert!("root".parse::<Principal>().is_err());
    }

    #[test]
    fn test_default_is_restricted() {
        assert_eq!(Principal::default(), Principal::Restricted);
        assert_eq!(Principal::Elevated.to_string(), "elevated");
    }

    #[test]
    fn test_serde_names() {
        let p: Principal = serde_json::from_str("\"chrome\"").unwrap();
        assert_eq!(p, Principal::Elevated);
        assert_eq!(serde_json::to_string(&Principal::Restricted).unwrap(), "\"restricted\"");
    }
}
