//! Discovery catalog
//!
//! Maps (vendor, product) pairs to the deck family that should drive them.
//! The table is immutable once built; lookups scan it in declaration order
//! and the first matching row wins.

use std::fmt;
use std::str::FromStr;

/// Hardware family of a deck
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceFamily {
    /// 15-key 293
    Sd293,
    /// 293s
    Sd293s,
    /// 293 V3 (including EN and V2.5 revisions)
    Sd293V3,
    /// N1
    N1,
    /// N3 with touch display
    N3,
    /// N4
    N4,
}

impl DeviceFamily {
    /// Every family, in catalog order
    pub const ALL: [DeviceFamily; 6] = [
        DeviceFamily::Sd293,
        DeviceFamily::Sd293s,
        DeviceFamily::Sd293V3,
        DeviceFamily::N3,
        DeviceFamily::N4,
        DeviceFamily::N1,
    ];

    /// Configuration name of the family
    pub fn name(self) -> &'static str {
        match self {
            DeviceFamily::Sd293 => "293",
            DeviceFamily::Sd293s => "293s",
            DeviceFamily::Sd293V3 => "293v3",
            DeviceFamily::N1 => "n1",
            DeviceFamily::N3 => "n3",
            DeviceFamily::N4 => "n4",
        }
    }

    /// Whether the family accepts touchscreen and per-key image uploads
    pub fn has_dual_display(self) -> bool {
        matches!(self, DeviceFamily::N3)
    }
}

impl fmt::Display for DeviceFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error for an unrecognised family name
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown device family: {0}")]
pub struct UnknownFamily(pub String);

impl FromStr for DeviceFamily {
    type Err = UnknownFamily;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        DeviceFamily::ALL
            .into_iter()
            .find(|family| family.name() == lower)
            .ok_or_else(|| UnknownFamily(s.to_string()))
    }
}

/// One catalog row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogEntry {
    pub vendor_id: u16,
    pub product_id: u16,
    pub family: DeviceFamily,
}

impl CatalogEntry {
    pub const fn new(vendor_id: u16, product_id: u16, family: DeviceFamily) -> Self {
        Self {
            vendor_id,
            product_id,
            family,
        }
    }
}

/// Built-in product table
pub const BUILTIN_PRODUCTS: &[CatalogEntry] = &[
    // 293 series
    CatalogEntry::new(0x5500, 0x1001, DeviceFamily::Sd293),
    CatalogEntry::new(0x5548, 0x6670, DeviceFamily::Sd293s),
    CatalogEntry::new(0x6603, 0x1005, DeviceFamily::Sd293V3),
    CatalogEntry::new(0x6603, 0x1006, DeviceFamily::Sd293V3),
    CatalogEntry::new(0x6603, 0x1010, DeviceFamily::Sd293V3),
    // N3
    CatalogEntry::new(0x6603, 0x1002, DeviceFamily::N3),
    CatalogEntry::new(0x6603, 0x1003, DeviceFamily::N3),
    CatalogEntry::new(0x6602, 0x1002, DeviceFamily::N3),
    CatalogEntry::new(0x6602, 0x1003, DeviceFamily::N3),
    CatalogEntry::new(0x6602, 0x2929, DeviceFamily::N3),
    CatalogEntry::new(0x1500, 0x3001, DeviceFamily::N3),
    // N4
    CatalogEntry::new(0x6602, 0x1001, DeviceFamily::N4),
    CatalogEntry::new(0x6603, 0x1007, DeviceFamily::N4),
    // N1
    CatalogEntry::new(0x6603, 0x1011, DeviceFamily::N1),
    CatalogEntry::new(0x6603, 0x1000, DeviceFamily::N1),
];

/// Immutable (vendor, product) -> family lookup table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryCatalog {
    entries: Vec<CatalogEntry>,
}

impl DiscoveryCatalog {
    /// Build a catalog from an explicit table
    pub fn new(entries: Vec<CatalogEntry>) -> Self {
        Self { entries }
    }

    /// The built-in product table
    pub fn builtin() -> Self {
        Self::new(BUILTIN_PRODUCTS.to_vec())
    }

    /// The built-in table followed by `extra` rows
    ///
    /// Extra rows never shadow a built-in row for the same pair.
    pub fn builtin_with(extra: impl IntoIterator<Item = CatalogEntry>) -> Self {
        let mut entries = BUILTIN_PRODUCTS.to_vec();
        entries.extend(extra);
        Self::new(entries)
    }

    /// Family for a (vendor, product) pair; the first declared row wins
    pub fn lookup(&self, vendor_id: u16, product_id: u16) -> Option<DeviceFamily> {
        self.entries
            .iter()
            .find(|e| e.vendor_id == vendor_id && e.product_id == product_id)
            .map(|e| e.family)
    }

    /// Whether any row matches the pair
    pub fn contains(&self, vendor_id: u16, product_id: u16) -> bool {
        self.lookup(vendor_id, product_id).is_some()
    }

    /// Rows in declaration order
    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    /// Distinct (vendor, product) pairs in declaration order
    pub fn families(&self) -> Vec<(u16, u16)> {
        let mut pairs: Vec<(u16, u16)> = Vec::with_capacity(self.entries.len());
        for entry in &self.entries {
            let pair = (entry.vendor_id, entry.product_id);
            if !pairs.contains(&pair) {
                pairs.push(pair);
            }
        }
        pairs
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for DiscoveryCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_lookup() {
        let catalog = DiscoveryCatalog::builtin();
        assert_eq!(catalog.lookup(0x5500, 0x1001), Some(DeviceFamily::Sd293));
        assert_eq!(catalog.lookup(0x6602, 0x1001), Some(DeviceFamily::N4));
        assert_eq!(catalog.lookup(0x1500, 0x3001), Some(DeviceFamily::N3));
        assert_eq!(catalog.lookup(0x6603, 0x1000), Some(DeviceFamily::N1));
        assert_eq!(catalog.lookup(0x1234, 0x5678), None);
    }

    #[test]
    fn test_first_declared_row_wins() {
        let catalog = DiscoveryCatalog::new(vec![
            CatalogEntry::new(0x1111, 0x2222, DeviceFamily::N4),
            CatalogEntry::new(0x1111, 0x2222, DeviceFamily::N3),
        ]);
        assert_eq!(catalog.lookup(0x1111, 0x2222), Some(DeviceFamily::N4));

        let reversed = DiscoveryCatalog::new(catalog.entries().iter().rev().copied().collect());
        assert_eq!(reversed.lookup(0x1111, 0x2222), Some(DeviceFamily::N3));
    }

    #[test]
    fn test_extra_rows_do_not_shadow_builtin() {
        let catalog =
            DiscoveryCatalog::builtin_with([CatalogEntry::new(0x5500, 0x1001, DeviceFamily::N3)]);
        assert_eq!(catalog.lookup(0x5500, 0x1001), Some(DeviceFamily::Sd293));

        let catalog =
            DiscoveryCatalog::builtin_with([CatalogEntry::new(0xABCD, 0x0001, DeviceFamily::N3)]);
        assert_eq!(catalog.lookup(0xABCD, 0x0001), Some(DeviceFamily::N3));
        assert_eq!(catalog.len(), BUILTIN_PRODUCTS.len() + 1);
    }

    #[test]
    fn test_families_are_distinct() {
        let catalog = DiscoveryCatalog::new(vec![
            CatalogEntry::new(1, 1, DeviceFamily::N1),
            CatalogEntry::new(1, 1, DeviceFamily::N3),
            CatalogEntry::new(2, 2, DeviceFamily::N4),
        ]);
        assert_eq!(catalog.families(), vec![(1, 1), (2, 2)]);
    }

    #[test]
    fn test_family_names_round_trip() {
        for family in DeviceFamily::ALL {
            assert_eq!(family.name().parse::<DeviceFamily>(), Ok(family));
        }
        assert_eq!("N3".parse::<DeviceFamily>(), Ok(DeviceFamily::N3));
        assert!("n9".parse::<DeviceFamily>().is_err());
    }

    #[test]
    fn test_only_n3_has_dual_display() {
        let dual: Vec<_> = DeviceFamily::ALL
            .into_iter()
            .filter(|f| f.has_dual_display())
            .collect();
        assert_eq!(dual, vec![DeviceFamily::N3]);
    }
}
