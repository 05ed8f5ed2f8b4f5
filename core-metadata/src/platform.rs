//! Free-text platform names to per-source identifiers.
//!
//! Users type "PS2", "Sony PlayStation 2" or "playstation2"; every source
//! wants its own id or slug. Unknown names resolve to `None`, which adapters
//! treat as "search without a platform filter".

use serde::{Deserialize, Serialize};

/// Identifier namespaces used by the registered sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlatformNamespace {
    /// Numeric platform ids of the structured catalog API
    TheGamesDb,
    /// Platform slugs of the cover-scan search site
    MobyGames,
    /// System directory names on the libretro thumbnail CDN
    Libretro,
    /// Platform slugs of the critic-rating site
    Metacritic,
    /// Console slugs of the price guide
    PriceCharting,
}

/// One row of the static mapping table.
#[derive(Debug, Clone, Copy)]
pub struct PlatformEntry {
    pub canonical: &'static str,
    /// Compared after folding to lowercase alphanumerics
    pub aliases: &'static [&'static str],
    pub thegamesdb: Option<u32>,
    pub mobygames: Option<&'static str>,
    pub libretro: Option<&'static str>,
    pub metacritic: Option<&'static str>,
    pub pricecharting: Option<&'static str>,
}

impl PlatformEntry {
    fn id_for(&self, namespace: PlatformNamespace) -> Option<String> {
        match namespace {
            PlatformNamespace::TheGamesDb => self.thegamesdb.map(|id| id.to_string()),
            PlatformNamespace::MobyGames => self.mobygames.map(str::to_string),
            PlatformNamespace::Libretro => self.libretro.map(str::to_string),
            PlatformNamespace::Metacritic => self.metacritic.map(str::to_string),
            PlatformNamespace::PriceCharting => self.pricecharting.map(str::to_string),
        }
    }
}

macro_rules! platform {
    ($canonical:expr, [$($alias:expr),* $(,)?], $tgdb:expr, $moby:expr, $libretro:expr, $mc:expr, $pc:expr) => {
        PlatformEntry {
            canonical: $canonical,
            aliases: &[$($alias),*],
            thegamesdb: $tgdb,
            mobygames: $moby,
            libretro: $libretro,
            metacritic: $mc,
            pricecharting: $pc,
        }
    };
}

/// Canonical platforms known to the resolver.
pub static PLATFORMS: &[PlatformEntry] = &[
    platform!("PC", ["pc", "windows", "microsoft windows", "pc windows", "steam"],
        Some(1), Some("windows"), None, Some("pc"), Some("pc-games")),
    platform!("GameCube", ["gamecube", "nintendo gamecube", "gc", "ngc", "gcn"],
        Some(2), Some("gamecube"), Some("Nintendo - GameCube"), Some("gamecube"), Some("gamecube")),
    platform!("Nintendo 64", ["nintendo 64", "n64"],
        Some(3), Some("n64"), Some("Nintendo - Nintendo 64"), Some("nintendo-64"), Some("nintendo-64")),
    platform!("Game Boy", ["game boy", "gameboy", "gb"],
        Some(4), Some("gameboy"), Some("Nintendo - Game Boy"), None, Some("gameboy")),
    platform!("Game Boy Advance", ["game boy advance", "gameboy advance", "gba"],
        Some(5), Some("gameboy-advance"), Some("Nintendo - Game Boy Advance"), Some("game-boy-advance"), Some("gameboy-advance")),
    platform!("Super Nintendo", ["super nintendo", "super nintendo entertainment system", "snes", "super famicom", "sfc"],
        Some(6), Some("snes"), Some("Nintendo - Super Nintendo Entertainment System"), None, Some("super-nintendo")),
    platform!("NES", ["nes", "nintendo entertainment system", "famicom"],
        Some(7), Some("nes"), Some("Nintendo - Nintendo Entertainment System"), None, Some("nes")),
    platform!("Nintendo DS", ["nintendo ds", "ds", "nds"],
        Some(8), Some("nintendo-ds"), Some("Nintendo - Nintendo DS"), Some("ds"), Some("nintendo-ds")),
    platform!("Wii", ["wii", "nintendo wii"],
        Some(9), Some("wii"), Some("Nintendo - Wii"), Some("wii"), Some("wii")),
    platform!("PlayStation", ["playstation", "playstation 1", "ps1", "psx", "psone", "ps one"],
        Some(10), Some("playstation"), Some("Sony - PlayStation"), Some("playstation"), Some("playstation")),
    platform!("PlayStation 2", ["playstation 2", "ps2"],
        Some(11), Some("ps2"), Some("Sony - PlayStation 2"), Some("playstation-2"), Some("playstation-2")),
    platform!("PlayStation 3", ["playstation 3", "ps3"],
        Some(12), Some("ps3"), Some("Sony - PlayStation 3"), Some("playstation-3"), Some("playstation-3")),
    platform!("PSP", ["psp", "playstation portable"],
        Some(13), Some("psp"), Some("Sony - PlayStation Portable"), Some("psp"), Some("psp")),
    platform!("Xbox", ["xbox", "original xbox"],
        Some(14), Some("xbox"), Some("Microsoft - Xbox"), Some("xbox"), Some("xbox")),
    platform!("Xbox 360", ["xbox 360", "x360", "360"],
        Some(15), Some("xbox360"), Some("Microsoft - Xbox 360"), Some("xbox-360"), Some("xbox-360")),
    platform!("Dreamcast", ["dreamcast", "dc"],
        Some(16), Some("dreamcast"), Some("Sega - Dreamcast"), Some("dreamcast"), Some("sega-dreamcast")),
    platform!("Saturn", ["saturn", "sega saturn"],
        Some(17), Some("sega-saturn"), Some("Sega - Saturn"), None, Some("sega-saturn")),
    platform!("Genesis", ["genesis", "mega drive", "megadrive", "sega genesis", "sega mega drive", "md"],
        Some(18), Some("genesis"), Some("Sega - Mega Drive - Genesis"), None, Some("sega-genesis")),
    platform!("Wii U", ["wii u", "wiiu"],
        Some(38), Some("wii-u"), Some("Nintendo - Wii U"), Some("wii-u"), Some("wii-u")),
    platform!("PlayStation Vita", ["playstation vita", "ps vita", "psvita", "vita"],
        Some(39), Some("ps-vita"), Some("Sony - PlayStation Vita"), Some("playstation-vita"), Some("playstation-vita")),
    platform!("Game Boy Color", ["game boy color", "gameboy color", "gbc"],
        Some(41), Some("gameboy-color"), Some("Nintendo - Game Boy Color"), None, Some("gameboy-color")),
    platform!("Nintendo 3DS", ["nintendo 3ds", "3ds"],
        Some(4912), Some("3ds"), Some("Nintendo - Nintendo 3DS"), Some("3ds"), Some("nintendo-3ds")),
    platform!("PlayStation 4", ["playstation 4", "ps4"],
        Some(4919), Some("playstation-4"), None, Some("playstation-4"), Some("playstation-4")),
    platform!("Xbox One", ["xbox one", "xb1", "xone"],
        Some(4920), Some("xbox-one"), None, Some("xbox-one"), Some("xbox-one")),
    platform!("Nintendo Switch", ["nintendo switch", "switch", "ns"],
        Some(4971), Some("switch"), None, Some("nintendo-switch"), Some("nintendo-switch")),
    platform!("PlayStation 5", ["playstation 5", "ps5"],
        Some(4980), Some("playstation-5"), None, Some("playstation-5"), Some("playstation-5")),
    platform!("Xbox Series X", ["xbox series x", "xbox series s", "xbox series x s", "xbox series", "xsx"],
        Some(4981), Some("xbox-series"), None, Some("xbox-series-x"), Some("xbox-series-x")),
];

/// Manufacturer words users commonly prefix platform names with.
const MANUFACTURER_PREFIXES: &[&str] = &["sony", "nintendo", "microsoft", "sega"];

/// Resolves free-text platform names against a mapping table.
#[derive(Debug, Clone)]
pub struct PlatformResolver {
    entries: &'static [PlatformEntry],
}

impl Default for PlatformResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl PlatformResolver {
    pub fn new() -> Self {
        Self { entries: PLATFORMS }
    }

    /// Resolver over a custom table.
    pub fn with_entries(entries: &'static [PlatformEntry]) -> Self {
        Self { entries }
    }

    /// Mapping row for a free-text name.
    pub fn lookup(&self, platform_name: &str) -> Option<&'static PlatformEntry> {
        let folded = fold(platform_name);
        if folded.is_empty() {
            return None;
        }

        self.find(&folded).or_else(|| {
            let lowered = platform_name.trim().to_lowercase();
            MANUFACTURER_PREFIXES.iter().find_map(|prefix| {
                lowered
                    .strip_prefix(prefix)
                    .map(fold)
                    .filter(|rest| !rest.is_empty())
                    .and_then(|rest| self.find(&rest))
            })
        })
    }

    /// Canonical display name, e.g. "PlayStation 2" for "Sony PS2".
    pub fn canonical(&self, platform_name: &str) -> Option<&'static str> {
        self.lookup(platform_name).map(|entry| entry.canonical)
    }

    /// Source-specific id or slug for a free-text name.
    pub fn resolve(&self, platform_name: &str, namespace: PlatformNamespace) -> Option<String> {
        self.lookup(platform_name)
            .and_then(|entry| entry.id_for(namespace))
    }

    fn find(&self, folded: &str) -> Option<&'static PlatformEntry> {
        let entries: &'static [PlatformEntry] = self.entries;
        entries.iter().find(|entry| {
            fold(entry.canonical) == folded || entry.aliases.iter().any(|a| fold(a) == folded)
        })
    }
}

fn fold(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alias_spellings_resolve() {
        let resolver = PlatformResolver::new();
        for name in ["PlayStation 2", "PS2", "ps-2", "Sony PlayStation 2", "playstation2"] {
            assert_eq!(
                resolver.resolve(name, PlatformNamespace::TheGamesDb),
                Some("11".to_string()),
                "{}",
                name
            );
        }
    }

    #[test]
    fn test_namespaces() {
        let resolver = PlatformResolver::new();
        assert_eq!(
            resolver.resolve("Nintendo GameCube", PlatformNamespace::Libretro),
            Some("Nintendo - GameCube".to_string())
        );
        assert_eq!(
            resolver.resolve("Xbox 360", PlatformNamespace::PriceCharting),
            Some("xbox-360".to_string())
        );
        assert_eq!(
            resolver.resolve("Switch", PlatformNamespace::TheGamesDb),
            Some("4971".to_string())
        );
    }

    #[test]
    fn test_unknown_platform_is_none() {
        let resolver = PlatformResolver::new();
        assert_eq!(resolver.resolve("Virtual Boy", PlatformNamespace::TheGamesDb), None);
        assert_eq!(resolver.resolve("", PlatformNamespace::TheGamesDb), None);
        assert_eq!(resolver.canonical("  "), None);
    }

    #[test]
    fn test_missing_namespace_entry_is_none() {
        let resolver = PlatformResolver::new();
        assert_eq!(resolver.canonical("PS4"), Some("PlayStation 4"));
        assert_eq!(resolver.resolve("PS4", PlatformNamespace::Libretro), None);
    }

    #[test]
    fn test_manufacturer_prefix_is_optional() {
        let resolver = PlatformResolver::new();
        assert_eq!(resolver.canonical("Sega Dreamcast"), Some("Dreamcast"));
        assert_eq!(resolver.canonical("Microsoft Xbox One"), Some("Xbox One"));
    }
}
