/// Item targets and name-family matching.
///
/// Item names are plain strings supplied by the world facade. Family matching
/// ("any `_log`", "any `_bed`") is substring containment, applied consistently
/// everywhere item names are compared.
use serde::{Deserialize, Serialize};
use std::fmt;

/// True when `item_name` counts as `wanted`: exact equality or substring
/// containment (so `_planks` matches `oak_planks`).
#[inline]
pub fn item_matches(item_name: &str, wanted: &str) -> bool {
    item_name == wanted || item_name.contains(wanted)
}

/// A (name-set, count) matching rule owned by resource tasks: "collect
/// `count` items matching any of `names`".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemTarget {
    pub names: Vec<String>,
    pub count: u32,
}

impl ItemTarget {
    pub fn new(name: &str, count: u32) -> Self {
        Self {
            names: vec![name.to_string()],
            count,
        }
    }

    /// Target matching any of a family of names.
    pub fn any_of(names: &[&str], count: u32) -> Self {
        Self {
            names: names.iter().map(|n| n.to_string()).collect(),
            count,
        }
    }

    pub fn matches(&self, item_name: &str) -> bool {
        self.names.iter().any(|n| item_matches(item_name, n))
    }

    /// Same names, different count. Used when a parent rescales a target.
    pub fn with_count(&self, count: u32) -> Self {
        Self {
            names: self.names.clone(),
            count,
        }
    }
}

impl fmt::Display for ItemTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} x{}", self.names.join("|"), self.count)
    }
}

/// A stack of identical items in an inventory slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemStack {
    pub name: String,
    pub count: u32,
}

impl ItemStack {
    pub fn new(name: &str, count: u32) -> Self {
        Self {
            name: name.to_string(),
            count,
        }
    }
}

/// Game versions differ in entity metadata layout; accessors that read raw
/// metadata indices route through this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum GameVersion {
    /// 1.17+ layout.
    #[default]
    Modern,
    /// Pre-1.17 layout with shifted mob metadata indices.
    Legacy,
}

impl GameVersion {
    /// Metadata index of the sheep sheared/color byte.
    pub fn sheep_state_index(&self) -> usize {
        match self {
            GameVersion::Modern => 17,
            GameVersion::Legacy => 16,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_match() {
        let target = ItemTarget::new("coal", 10);
        assert!(target.matches("coal"));
        assert!(!target.matches("iron_ingot"));
    }

    #[test]
    fn test_family_substring_match() {
        let logs = ItemTarget::new("_log", 4);
        assert!(logs.matches("oak_log"));
        assert!(logs.matches("dark_oak_log"));
        assert!(!logs.matches("oak_planks"));

        let beds = ItemTarget::new("_bed", 10);
        assert!(beds.matches("red_bed"));
        assert!(beds.matches("white_bed"));
    }

    #[test]
    fn test_any_of_family() {
        let meat = ItemTarget::any_of(&["beef", "porkchop", "mutton"], 5);
        assert!(meat.matches("beef"));
        assert!(meat.matches("cooked_beef"));
        assert!(meat.matches("porkchop"));
        assert!(!meat.matches("rotten_flesh"));
    }

    #[test]
    fn test_sheep_metadata_index_by_version() {
        assert_eq!(GameVersion::Modern.sheep_state_index(), 17);
        assert_eq!(GameVersion::Legacy.sheep_state_index(), 16);
    }
}
