//! Graphics API versions and context-format negotiation.
//!
//! Drivers are free to hand out a different context version than the one requested (some
//! silently downgrade). The version actually obtained is therefore parsed back from the driver's
//! version string with [`GlVersion::parse`] and that version, not the requested one, selects the
//! [`BackendProfile`].

use std::fmt;

/// Flavour of the OpenGL API.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Api {
  /// Desktop OpenGL.
  OpenGl,
  /// OpenGL ES.
  OpenGlEs,
}

/// A parsed OpenGL / OpenGL ES version.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct GlVersion {
  /// API flavour.
  pub api: Api,
  /// Major version.
  pub major: u32,
  /// Minor version.
  pub minor: u32,
}

impl GlVersion {
  /// Create a new version.
  pub const fn new(api: Api, major: u32, minor: u32) -> Self {
    GlVersion { api, major, minor }
  }

  /// Parse the string returned by the driver for the version query.
  ///
  /// Accepted shapes include `"4.6.0 NVIDIA 535.54"`, `"3.3 (Core Profile) Mesa 23.1"` and
  /// `"OpenGL ES 3.2 Mesa 23.1"`.
  pub fn parse(version: &str) -> Option<Self> {
    let trimmed = version.trim();
    let (api, rest) = match trimmed.strip_prefix("OpenGL ES") {
      Some(rest) => {
        // "OpenGL ES-CM 1.1" and friends carry a profile suffix before the number
        let rest = rest.trim_start_matches(|c: char| c != ' ' && !c.is_ascii_digit());
        (Api::OpenGlEs, rest.trim_start())
      }
      None => (Api::OpenGl, trimmed),
    };

    let number = rest.split_whitespace().next()?;
    let mut parts = number.split('.');
    let major = parts.next()?.parse().ok()?;
    let minor = parts
      .next()
      .and_then(|m| {
        let digits: String = m.chars().take_while(char::is_ascii_digit).collect();
        digits.parse().ok()
      })
      .unwrap_or(0);

    Some(GlVersion { api, major, minor })
  }

  /// Is this version at least `major.minor` (same API)?
  pub fn is_at_least(&self, major: u32, minor: u32) -> bool {
    (self.major, self.minor) >= (major, minor)
  }

  /// Is this an OpenGL ES version?
  pub fn is_es(&self) -> bool {
    self.api == Api::OpenGlEs
  }
}

impl fmt::Display for GlVersion {
  fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
    match self.api {
      Api::OpenGl => write!(f, "OpenGL {}.{}", self.major, self.minor),
      Api::OpenGlEs => write!(f, "OpenGL ES {}.{}", self.major, self.minor),
    }
  }
}

/// Backend profile variant.
///
/// One backend type covers every OpenGL version; the profile selects which code paths it takes.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum BackendProfile {
  /// OpenGL ES 2.0 level feature set.
  Es2,
  /// OpenGL 3.x / OpenGL ES 3.0 level feature set.
  Gl3,
  /// OpenGL 4.x / OpenGL ES 3.1+ level feature set.
  Gl4,
  /// No GPU at all.
  Null,
}

impl BackendProfile {
  /// Pick the profile matching an obtained driver version.
  pub fn from_version(version: GlVersion) -> Self {
    match version.api {
      Api::OpenGl if version.major >= 4 => BackendProfile::Gl4,
      Api::OpenGl if version.major == 3 => BackendProfile::Gl3,
      Api::OpenGl => BackendProfile::Es2,
      Api::OpenGlEs if version.is_at_least(3, 1) => BackendProfile::Gl4,
      Api::OpenGlEs if version.major == 3 => BackendProfile::Gl3,
      Api::OpenGlEs => BackendProfile::Es2,
    }
  }
}

/// A context format to request from the windowing layer.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct ContextFormat {
  /// Requested version.
  pub version: GlVersion,
  /// Request a core profile (desktop only).
  pub core_profile: bool,
}

impl ContextFormat {
  const fn gl(major: u32, minor: u32) -> Self {
    ContextFormat {
      version: GlVersion::new(Api::OpenGl, major, minor),
      core_profile: true,
    }
  }

  const fn es(major: u32, minor: u32) -> Self {
    ContextFormat {
      version: GlVersion::new(Api::OpenGlEs, major, minor),
      core_profile: false,
    }
  }
}

/// Formats tried at startup, from the most capable to the least.
pub const CONTEXT_LADDER: [ContextFormat; 5] = [
  ContextFormat::gl(4, 3),
  ContextFormat::gl(3, 3),
  ContextFormat::es(3, 1),
  ContextFormat::es(3, 0),
  ContextFormat::es(2, 0),
];

/// Outcome of [`negotiate_context_format`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct NegotiatedFormat {
  /// Format that was requested last (the successful one, or the lowest rung).
  pub requested: ContextFormat,
  /// Version the driver actually reported, if any rung succeeded.
  pub obtained: Option<GlVersion>,
}

impl NegotiatedFormat {
  /// Did any rung of the ladder succeed?
  pub fn succeeded(&self) -> bool {
    self.obtained.is_some()
  }
}

/// Walk `ladder` from top to bottom until `try_create` succeeds.
///
/// `try_create` attempts to create a context with the given format and returns the version the
/// driver reports on success. If every rung fails, the lowest rung is returned as a best effort
/// (with no obtained version) and the failure is logged; creating the context with it is then
/// expected to fail in the caller.
pub fn negotiate_context_format<F>(ladder: &[ContextFormat], mut try_create: F) -> NegotiatedFormat
where
  F: FnMut(&ContextFormat) -> Option<GlVersion>,
{
  for format in ladder {
    if let Some(obtained) = try_create(format) {
      if obtained != format.version {
        log::info!(
          "requested {} but the driver handed out {}",
          format.version,
          obtained
        );
      } else {
        log::debug!("obtained {}", obtained);
      }

      return NegotiatedFormat {
        requested: *format,
        obtained: Some(obtained),
      };
    }

    log::debug!("cannot create a {} context, degrading", format.version);
  }

  log::error!("no context format of the ladder could be created; impending doom");

  NegotiatedFormat {
    requested: ladder.last().copied().unwrap_or(CONTEXT_LADDER[4]),
    obtained: None,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parse_desktop_versions() {
    assert_eq!(
      GlVersion::parse("4.6.0 NVIDIA 535.54.03"),
      Some(GlVersion::new(Api::OpenGl, 4, 6))
    );
    assert_eq!(
      GlVersion::parse("3.3 (Core Profile) Mesa 23.1.4"),
      Some(GlVersion::new(Api::OpenGl, 3, 3))
    );
  }

  #[test]
  fn parse_es_versions() {
    assert_eq!(
      GlVersion::parse("OpenGL ES 3.2 Mesa 23.1.4"),
      Some(GlVersion::new(Api::OpenGlEs, 3, 2))
    );
    assert_eq!(
      GlVersion::parse("OpenGL ES 2.0"),
      Some(GlVersion::new(Api::OpenGlEs, 2, 0))
    );
  }

  #[test]
  fn parse_garbage() {
    assert_eq!(GlVersion::parse("nope"), None);
    assert_eq!(GlVersion::parse(""), None);
  }

  #[test]
  fn profiles() {
    let p = |api, major, minor| BackendProfile::from_version(GlVersion::new(api, major, minor));

    assert_eq!(p(Api::OpenGl, 4, 3), BackendProfile::Gl4);
    assert_eq!(p(Api::OpenGl, 3, 3), BackendProfile::Gl3);
    assert_eq!(p(Api::OpenGlEs, 3, 1), BackendProfile::Gl4);
    assert_eq!(p(Api::OpenGlEs, 3, 0), BackendProfile::Gl3);
    assert_eq!(p(Api::OpenGlEs, 2, 0), BackendProfile::Es2);
  }

  #[test]
  fn ladder_degrades_until_success() {
    let mut tried = Vec::new();
    let negotiated = negotiate_context_format(&CONTEXT_LADDER, |format| {
      tried.push(format.version);

      if format.version.is_es() && format.version.major == 3 {
        // driver silently downgrades
        Some(GlVersion::new(Api::OpenGlEs, 3, 0))
      } else {
        None
      }
    });

    assert_eq!(tried.len(), 3);
    assert_eq!(negotiated.requested, CONTEXT_LADDER[2]);
    assert_eq!(
      negotiated.obtained,
      Some(GlVersion::new(Api::OpenGlEs, 3, 0))
    );
  }

  #[test]
  fn ladder_exhausted_returns_lowest_rung() {
    let negotiated = negotiate_context_format(&CONTEXT_LADDER, |_| None);

    assert!(!negotiated.succeeded());
    assert_eq!(negotiated.requested, CONTEXT_LADDER[4]);
  }
}
