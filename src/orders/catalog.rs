//! Item Catalog
//!
//! The fixed set of items an order can reference.

/// A catalog entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Item {
    pub id: i64,
    pub name: &'static str,
    pub icon: &'static str,
}

const fn item(id: i64, name: &'static str, icon: &'static str) -> Item {
    Item { id, name, icon }
}

/// Every known item, indexed by id. Entry 0 is the placeholder for unknown ids.
pub static ITEMS: [Item; 16] = [
    item(0, "Unknown", "Unknown.png"),
    item(1, "Mammon", "HEGrenadeItemIcon.png"),
    item(2, "Loughcaster", "RifleW.png"),
    item(3, "Harpa", "GrenadeItemIcon.png"),
    item(4, "Sticky Grenade", "StickyBombIcon.png"),
    item(5, "Basic Materials", "BasicMaterialsIcon.png"),
    item(6, "Explosive Powder", "ExplosiveMaterialIcon.png"),
    item(7, "Heavy Explosive Powder", "HeavyExplosiveMaterialsIcon.png"),
    item(8, "Refined Materials", "RefinedMaterialsIcon.png"),
    item(9, "Bandages", "BandagesItemIcon.png"),
    item(10, "Blood Plasma", "BloodPlasmaItemIcon.png"),
    item(11, "First Aid Kit", "FirstAidKitItem.png"),
    item(12, "Trauma Kit", "TraumaKitItemIcon.png"),
    item(13, "7.62mm", "RifleAmmoItemIcon.png"),
    item(14, "40mm", "LightTankAmmoItemIcon.png"),
    item(15, "120mm", "LightArtilleryAmmoItemIcon.png"),
];

/// Resolve an item id, falling back to the "Unknown" entry
pub fn lookup(id: i64) -> &'static Item {
    usize::try_from(id)
        .ok()
        .filter(|&idx| idx > 0)
        .and_then(|idx| ITEMS.get(idx))
        .unwrap_or(&ITEMS[0])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_match_positions() {
        for (idx, item) in ITEMS.iter().enumerate() {
            assert_eq!(item.id as usize, idx);
        }
    }

    #[test]
    fn test_lookup() {
        assert_eq!(lookup(4).name, "Sticky Grenade");
        assert_eq!(lookup(15).icon, "LightArtilleryAmmoItemIcon.png");
    }

    #[test]
    fn test_unknown_ids_fall_back() {
        assert_eq!(lookup(0).name, "Unknown");
        assert_eq!(lookup(-3).name, "Unknown");
        assert_eq!(lookup(16).name, "Unknown");
        assert_eq!(lookup(4_294_967_296).id, 0);
        assert_eq!(lookup(i64::MIN).id, 0);
    }
}
