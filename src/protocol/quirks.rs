//! Upstream device compatibility quirks
//!
//! Some network cameras announce a multipart boundary that does not match
//! what they actually write between parts. This module collects the
//! transforms applied to the announced boundary before framing starts.
//!
//! # Known Quirks
//!
//! ## Doubled dashes
//! - Announces `boundary=----XYZ123` (the delimiter dashes folded into the
//!   parameter value). Stripping the two leading dashes recovers the
//!   boundary the device frames its parts with.
//!
//! ## Conformant devices
//! - Announce the bare boundary; use [`BoundaryQuirk::Verbatim`].

use crate::error::ProtocolError;

/// Transform applied to the announced multipart boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BoundaryQuirk {
    /// Strip two leading `-` characters when present
    ///
    /// A value without the prefix is used verbatim.
    #[default]
    StripLeadingDashes,

    /// Use the announced value as-is
    Verbatim,
}

impl BoundaryQuirk {
    /// Apply the transform to an announced boundary value
    pub fn apply(&self, announced: &str) -> Result<String, ProtocolError> {
        let boundary = match self {
            BoundaryQuirk::StripLeadingDashes => match announced.strip_prefix("--") {
                Some(stripped) => stripped,
                None => {
                    tracing::warn!(
                        boundary = announced,
                        "Announced boundary lacks the expected '--' prefix, using it verbatim"
                    );
                    announced
                }
            },
            BoundaryQuirk::Verbatim => announced,
        };

        if boundary.is_empty() {
            return Err(ProtocolError::EmptyBoundary);
        }
        Ok(boundary.to_string())
    }
}

impl std::str::FromStr for BoundaryQuirk {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "strip" | "strip-leading-dashes" => Ok(BoundaryQuirk::StripLeadingDashes),
            "verbatim" | "none" => Ok(BoundaryQuirk::Verbatim),
            other => Err(format!("unknown boundary quirk: {other}")),
        }
    }
}
