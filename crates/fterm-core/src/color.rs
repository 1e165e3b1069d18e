#![forbid(unsafe_code)]

//! Coarse color capability classification.
//!
//! Not a terminfo reader. Terminals advertise color depth
//! through two loosely specified environment variables, and four tiers are all
//! a renderer needs to pick an SGR encoding:
//!
//! | Evidence | Result |
//! |----------|--------|
//! | `wasm32` target | `TrueColor` |
//! | `COLORTERM` contains `24bit` or `truecolor` | `TrueColor` |
//! | `COLORTERM` or `TERM` contains `256` | `Palette256` |
//! | both unset (`ms-terminal-fallback` only) | `TrueColor` |
//! | anything else | `Palette16` |

use core::fmt;

const ENV_COLORTERM: &str = "COLORTERM";
const ENV_TERM: &str = "TERM";

/// Color depth supported by the terminal, ordered by richness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ColorSupport {
    /// Monochrome or the basic 8 colors.
    Palette1,
    /// 16 ANSI colors (SGR 30–37, 90–97).
    Palette16,
    /// xterm 256-color palette (SGR 38;5).
    Palette256,
    /// 24-bit RGB (SGR 38;2).
    TrueColor,
}

impl ColorSupport {
    /// Classify the current process environment.
    #[must_use]
    pub fn detect() -> Self {
        Self::from_env_with(|key| std::env::var(key).ok())
    }

    /// Classify using a custom environment lookup (for tests).
    #[must_use]
    pub fn from_env_with<F>(get_env: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        classify(&get_env, cfg!(feature = "ms-terminal-fallback"))
    }

    /// Whether this level can render everything `other` can.
    #[must_use]
    pub fn supports(self, other: Self) -> bool {
        self >= other
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Palette1 => "palette1",
            Self::Palette16 => "palette16",
            Self::Palette256 => "palette256",
            Self::TrueColor => "truecolor",
        }
    }
}

impl fmt::Display for ColorSupport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn classify<F>(get_env: &F, ms_terminal_fallback: bool) -> ColorSupport
where
    F: Fn(&str) -> Option<String>,
{
    if cfg!(target_arch = "wasm32") {
        return ColorSupport::TrueColor;
    }

    let colorterm = get_env(ENV_COLORTERM).unwrap_or_default();
    if colorterm.contains("24bit") || colorterm.contains("truecolor") {
        return ColorSupport::TrueColor;
    }

    let term = get_env(ENV_TERM).unwrap_or_default();
    if colorterm.contains("256") || term.contains("256") {
        return ColorSupport::Palette256;
    }

    // Windows Terminal renders 24-bit color but declares neither variable.
    if ms_terminal_fallback && term.is_empty() && colorterm.is_empty() {
        return ColorSupport::TrueColor;
    }

    ColorSupport::Palette16
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn map_env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    fn get_env<'a>(map: &'a HashMap<String, String>) -> impl Fn(&str) -> Option<String> + 'a {
        move |key| map.get(key).cloned()
    }

    #[test]
    fn colorterm_truecolor() {
        let env = map_env(&[(ENV_COLORTERM, "truecolor")]);
        assert_eq!(classify(&get_env(&env), false), ColorSupport::TrueColor);
    }

    #[test]
    fn colorterm_24bit() {
        let env = map_env(&[(ENV_COLORTERM, "24bit"), (ENV_TERM, "xterm")]);
        assert_eq!(classify(&get_env(&env), false), ColorSupport::TrueColor);
    }

    #[test]
    fn truecolor_beats_256_term() {
        let env = map_env(&[(ENV_COLORTERM, "truecolor"), (ENV_TERM, "xterm-256color")]);
        assert_eq!(classify(&get_env(&env), false), ColorSupport::TrueColor);
    }

    #[test]
    fn term_256color() {
        let env = map_env(&[(ENV_TERM, "xterm-256color")]);
        assert_eq!(classify(&get_env(&env), false), ColorSupport::Palette256);
    }

    #[test]
    fn colorterm_256() {
        let env = map_env(&[(ENV_COLORTERM, "rxvt-256"), (ENV_TERM, "rxvt")]);
        assert_eq!(classify(&get_env(&env), false), ColorSupport::Palette256);
    }

    #[test]
    fn nothing_declared_is_palette16() {
        let env = map_env(&[]);
        assert_eq!(classify(&get_env(&env), false), ColorSupport::Palette16);
    }

    #[test]
    fn plain_term_is_palette16() {
        let env = map_env(&[(ENV_TERM, "xterm")]);
        assert_eq!(classify(&get_env(&env), false), ColorSupport::Palette16);
    }

    #[test]
    fn matching_is_case_sensitive() {
        let env = map_env(&[(ENV_COLORTERM, "TrueColor")]);
        assert_eq!(classify(&get_env(&env), false), ColorSupport::Palette16);
    }

    #[test]
    fn ms_fallback_only_when_both_unset() {
        let empty = map_env(&[]);
        assert_eq!(classify(&get_env(&empty), true), ColorSupport::TrueColor);

        let term = map_env(&[(ENV_TERM, "xterm")]);
        assert_eq!(classify(&get_env(&term), true), ColorSupport::Palette16);

        let blank = map_env(&[(ENV_TERM, ""), (ENV_COLORTERM, "")]);
        assert_eq!(classify(&get_env(&blank), true), ColorSupport::TrueColor);
    }

    #[test]
    fn ordering_follows_richness() {
        assert!(ColorSupport::Palette1 < ColorSupport::Palette16);
        assert!(ColorSupport::Palette16 < ColorSupport::Palette256);
        assert!(ColorSupport::Palette256 < ColorSupport::TrueColor);
        assert!(ColorSupport::TrueColor.supports(ColorSupport::Palette256));
        assert!(!ColorSupport::Palette16.supports(ColorSupport::Palette256));
    }

    #[test]
    fn display_names() {
        assert_eq!(ColorSupport::TrueColor.to_string(), "truecolor");
        assert_eq!(ColorSupport::Palette1.as_str(), "palette1");
    }
}
