//! Single entry point for obtaining a ready-to-use `MagicTables`.
//!
//! Magic number search takes a noticeable fraction of a second, so by default
//! we run it once at startup with OS entropy. Under `load_magic` we instead
//! deserialize a pre-generated table from disk, falling back to a fresh
//! search if the file isn't there. `deterministic_magic` pins the runtime
//! search to a fixed seed so perft/test runs are reproducible across hosts.

use super::precompute::{MagicTableSeed, generate_magic_tables};
use super::structs::MagicTables;

const DETERMINISTIC_SEED: u64 = 0xC0FF_EE15_B16B_00B5;
#[cfg(feature = "load_magic")]
const MAGIC_TABLE_PATH: &str = "magic_tables.bin";

pub fn load_magic_tables() -> MagicTables {
    #[cfg(feature = "load_magic")]
    {
        if let Ok(bytes) = std::fs::read(MAGIC_TABLE_PATH) {
            if let Ok(tables) = bincode::deserialize::<MagicTables>(&bytes) {
                return tables;
            }
            tracing::warn!(path = MAGIC_TABLE_PATH, "failed to deserialize magic table file, regenerating");
        }
    }

    let seed = if cfg!(feature = "deterministic_magic") {
        MagicTableSeed::Fixed(DETERMINISTIC_SEED)
    } else {
        MagicTableSeed::Random
    };

    generate_magic_tables(seed).expect("magic number search failed")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_usable_tables() {
        let tables = load_magic_tables();
        // d4 rook attacks with no blockers should reach all the way to the edges.
        let attacks = tables.rook.get_attacks(27, 0);
        assert_eq!(attacks.count_ones(), 14);
    }
}
