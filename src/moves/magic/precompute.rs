//! Magic number search and attack-table construction, run once at startup
//! unless a pre-generated table is baked in via the `load_magic` feature.

use super::attacks::{bishop_attacks_per_square, rook_attacks_per_square};
use super::search::find_magic_number_for_square;
use super::structs::{BishopMagicTables, MagicEntry, MagicTables, RookMagicTables};
use rand::{RngCore, SeedableRng, rngs::StdRng};

/// Controls where the randomness driving magic-number search comes from.
pub enum MagicTableSeed {
    /// Deterministic search, used by tests and the `deterministic_magic` feature.
    Fixed(u64),
    /// OS-entropy seeded search, used for normal runtime startup.
    Random,
}

fn make_rng(seed: &MagicTableSeed) -> StdRng {
    match seed {
        MagicTableSeed::Fixed(s) => StdRng::seed_from_u64(*s),
        MagicTableSeed::Random => {
            let mut seed_bytes = [0u8; 32];
            rand::rng().fill_bytes(&mut seed_bytes);
            StdRng::from_seed(seed_bytes)
        }
    }
}

/// Relevant occupancy mask for a rook on `square`: the squares along its rank
/// and file excluding the board edge, since edge occupancy never changes the
/// attack set.
fn rook_relevant_mask(square: usize) -> u64 {
    let rank = (square / 8) as i32;
    let file = (square % 8) as i32;
    let mut mask = 0u64;

    for r in (rank + 1)..7 {
        mask |= 1u64 << (r * 8 + file);
    }
    for r in 1..rank {
        mask |= 1u64 << (r * 8 + file);
    }
    for f in (file + 1)..7 {
        mask |= 1u64 << (rank * 8 + f);
    }
    for f in 1..file {
        mask |= 1u64 << (rank * 8 + f);
    }

    mask
}

/// Relevant occupancy mask for a bishop on `square`: the four diagonals
/// excluding the outermost ring of the board.
fn bishop_relevant_mask(square: usize) -> u64 {
    let rank = (square / 8) as i32;
    let file = (square % 8) as i32;
    let mut mask = 0u64;

    let mut r = rank + 1;
    let mut f = file + 1;
    while r < 7 && f < 7 {
        mask |= 1u64 << (r * 8 + f);
        r += 1;
        f += 1;
    }
    let mut r = rank - 1;
    let mut f = file - 1;
    while r > 0 && f > 0 {
        mask |= 1u64 << (r * 8 + f);
        r -= 1;
        f -= 1;
    }
    let mut r = rank + 1;
    let mut f = file - 1;
    while r < 7 && f > 0 {
        mask |= 1u64 << (r * 8 + f);
        r += 1;
        f -= 1;
    }
    let mut r = rank - 1;
    let mut f = file + 1;
    while r > 0 && f < 7 {
        mask |= 1u64 << (r * 8 + f);
        r -= 1;
        f += 1;
    }

    mask
}

/// Enumerates every blocker subset of `mask` via the carry-rippler trick.
fn subsets_of(mask: u64) -> Vec<u64> {
    let mut subsets = Vec::with_capacity(1 << mask.count_ones());
    let mut subset = 0u64;
    loop {
        subsets.push(subset);
        subset = subset.wrapping_sub(mask) & mask;
        if subset == 0 {
            break;
        }
    }
    subsets
}

fn build_entry(
    square: usize,
    mask: u64,
    attacks_fn: fn(usize, u64) -> u64,
    rng: &mut StdRng,
) -> Result<MagicEntry, String> {
    let shift = 64 - mask.count_ones();
    let blockers = subsets_of(mask);
    let attacks: Vec<u64> = blockers
        .iter()
        .map(|&b| attacks_fn(square, b))
        .collect();

    let magic = find_magic_number_for_square(&blockers, &attacks, shift, rng)?;

    let table_size = 1usize << mask.count_ones();
    let mut table = vec![0u64; table_size];
    for (&b, &a) in blockers.iter().zip(attacks.iter()) {
        let index = ((b.wrapping_mul(magic)) >> shift) as usize;
        table[index] = a;
    }

    Ok(MagicEntry {
        magic,
        shift,
        mask,
        table: table.into_boxed_slice(),
    })
}

pub fn generate_magic_tables(seed: MagicTableSeed) -> Result<MagicTables, String> {
    let mut rng = make_rng(&seed);

    let mut rook_entries = Vec::with_capacity(64);
    for square in 0..64 {
        let mask = rook_relevant_mask(square);
        rook_entries.push(build_entry(square, mask, rook_attacks_per_square, &mut rng)?);
    }

    let mut bishop_entries = Vec::with_capacity(64);
    for square in 0..64 {
        let mask = bishop_relevant_mask(square);
        bishop_entries.push(build_entry(
            square,
            mask,
            bishop_attacks_per_square,
            &mut rng,
        )?);
    }

    Ok(MagicTables {
        rook: RookMagicTables {
            entries: rook_entries,
        },
        bishop: BishopMagicTables {
            entries: bishop_entries,
        },
    })
}
