#![forbid(unsafe_code)]

//! Terminal dimensions, fallback constants, and the size cache.

use core::fmt;

use web_time::Instant;

/// Terminal size in character cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Dimensions {
    /// Columns.
    pub width: u16,
    /// Rows.
    pub height: u16,
}

impl Dimensions {
    /// The VT100 screen. Still the default of most terminal emulators.
    pub const VT100: Self = Self::new(80, 24);

    /// Size assumed when nothing better is known.
    ///
    /// Browser targets have no terminal to ask and get a wider canvas.
    #[cfg(target_arch = "wasm32")]
    pub const FALLBACK: Self = Self::new(140, 43);
    /// Size assumed when nothing better is known.
    #[cfg(not(target_arch = "wasm32"))]
    pub const FALLBACK: Self = Self::VT100;

    #[must_use]
    pub const fn new(width: u16, height: u16) -> Self {
        Self { width, height }
    }

    /// Whether both axes are non-zero.
    ///
    /// Platforms report `0x0` for terminals that never had a size set.
    #[must_use]
    pub const fn is_usable(self) -> bool {
        self.width > 0 && self.height > 0
    }

    /// Raise each axis to at least `min`'s.
    #[must_use]
    pub fn at_least(self, min: Self) -> Self {
        Self::new(self.width.max(min.width), self.height.max(min.height))
    }
}

impl Default for Dimensions {
    fn default() -> Self {
        Self::FALLBACK
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl From<(u16, u16)> for Dimensions {
    /// Converts from `(columns, rows)`.
    fn from((width, height): (u16, u16)) -> Self {
        Self::new(width, height)
    }
}

/// A size together with the moment it was captured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachedDimensions {
    pub dimensions: Dimensions,
    /// Capture time, for diagnostics.
    pub captured_at: Instant,
}

/// Last known terminal size.
///
/// An entry stays valid until [`invalidate`](Self::invalidate) is called.
/// Only sizes that were expensive to obtain belong here; fallback values
/// never do, since the condition that caused the fallback may go away.
#[derive(Debug, Clone, Default)]
pub struct DimensionCache {
    entry: Option<CachedDimensions>,
}

impl DimensionCache {
    #[must_use]
    pub const fn new() -> Self {
        Self { entry: None }
    }

    /// The cached size, if valid.
    #[must_use]
    pub fn get(&self) -> Option<Dimensions> {
        self.entry.map(|e| e.dimensions)
    }

    /// The full cached entry, if valid.
    #[must_use]
    pub fn entry(&self) -> Option<CachedDimensions> {
        self.entry
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.entry.is_some()
    }

    pub fn store(&mut self, dimensions: Dimensions) {
        self.entry = Some(CachedDimensions {
            dimensions,
            captured_at: Instant::now(),
        });
    }

    /// Drop the entry so the next lookup misses.
    pub fn invalidate(&mut self) {
        self.entry = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_is_vt100_natively() {
        assert_eq!(Dimensions::FALLBACK, Dimensions::new(80, 24));
        assert_eq!(Dimensions::default(), Dimensions::FALLBACK);
    }

    #[test]
    fn usable_requires_both_axes() {
        assert!(Dimensions::new(80, 24).is_usable());
        assert!(!Dimensions::new(0, 24).is_usable());
        assert!(!Dimensions::new(80, 0).is_usable());
        assert!(!Dimensions::new(0, 0).is_usable());
    }

    #[test]
    fn at_least_clamps_per_axis() {
        let d = Dimensions::new(40, 50).at_least(Dimensions::VT100);
        assert_eq!(d, Dimensions::new(80, 50));
    }

    #[test]
    fn display_is_cols_x_rows() {
        assert_eq!(Dimensions::new(132, 43).to_string(), "132x43");
    }

    #[test]
    fn from_tuple_is_cols_rows() {
        assert_eq!(Dimensions::from((120, 40)), Dimensions::new(120, 40));
    }

    #[test]
    fn cache_starts_empty() {
        let cache = DimensionCache::new();
        assert!(!cache.is_valid());
        assert_eq!(cache.get(), None);
    }

    #[test]
    fn cache_store_then_invalidate() {
        let mut cache = DimensionCache::new();
        cache.store(Dimensions::new(100, 30));
        assert!(cache.is_valid());
        assert_eq!(cache.get(), Some(Dimensions::new(100, 30)));

        cache.invalidate();
        assert_eq!(cache.get(), None);
    }

    #[test]
    fn cache_store_overwrites_and_restamps() {
        let mut cache = DimensionCache::new();
        cache.store(Dimensions::new(100, 30));
        let first = cache.entry().unwrap().captured_at;
        cache.store(Dimensions::new(90, 20));
        let entry = cache.entry().unwrap();
        assert_eq!(entry.dimensions, Dimensions::new(90, 20));
        assert!(entry.captured_at >= first);
    }
}
