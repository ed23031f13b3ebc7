//! Native opening book: hash -> (move -> weight), loaded from the engine's own
//! line-per-position text format rather than the Polyglot `.bin` layout.
//!
//! Format: `<u64 decimal>#<u16 decimal move>:<u32 decimal count>#...\n`
//! repeated once per position. A move code of 0 (from=0, to=0, flag=None) is
//! the null-move sentinel; both a missing key and an explicit null entry mean
//! "stop following this book".

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::Path;

use crate::board::{Board, Piece};
use crate::moves::types::{
    CAPTURE, DOUBLE_PAWN_PUSH, EN_PASSANT, KINGSIDE_CASTLE, Move, PROMOTION, PROMOTION_CAPTURE,
    QUEENSIDE_CASTLE, QUIET_MOVE,
};
use crate::square::Square;
use rand::Rng;

/// The book's own 4-bit flag space, distinct from the engine's internal
/// move-flag encoding: wire moves carry the promotion piece directly instead
/// of a separate `Option<Piece>` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BookFlag {
    None,
    PromotionRook,
    PromotionKnight,
    PromotionBishop,
    PromotionQueen,
    CastlingKingside,
    CastlingQueenside,
    EnPassant,
    DoublePush,
}

impl BookFlag {
    fn from_nibble(n: u16) -> Option<Self> {
        Some(match n {
            0 => BookFlag::None,
            1 => BookFlag::PromotionRook,
            2 => BookFlag::PromotionKnight,
            3 => BookFlag::PromotionBishop,
            4 => BookFlag::PromotionQueen,
            5 => BookFlag::CastlingKingside,
            6 => BookFlag::CastlingQueenside,
            7 => BookFlag::EnPassant,
            8 => BookFlag::DoublePush,
            _ => return None,
        })
    }

    fn to_nibble(self) -> u16 {
        match self {
            BookFlag::None => 0,
            BookFlag::PromotionRook => 1,
            BookFlag::PromotionKnight => 2,
            BookFlag::PromotionBishop => 3,
            BookFlag::PromotionQueen => 4,
            BookFlag::CastlingKingside => 5,
            BookFlag::CastlingQueenside => 6,
            BookFlag::EnPassant => 7,
            BookFlag::DoublePush => 8,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct BookEntry {
    from: u8,
    to: u8,
    flag: BookFlag,
    weight: u32,
}

impl BookEntry {
    fn is_null(&self) -> bool {
        self.from == 0 && self.to == 0 && self.flag == BookFlag::None
    }

    /// Resolves the wire move against a board to fill in piece identity and
    /// capture status, mirroring how `PolyglotEntry::decode_move` works.
    fn decode_move(&self, board: &Board) -> Option<Move> {
        if self.is_null() {
            return None;
        }

        let from = Square::from_index(self.from);
        let to = Square::from_index(self.to);
        let (_color, piece) = board.piece_at(from)?;

        let promotion = match self.flag {
            BookFlag::PromotionRook => Some(Piece::Rook),
            BookFlag::PromotionKnight => Some(Piece::Knight),
            BookFlag::PromotionBishop => Some(Piece::Bishop),
            BookFlag::PromotionQueen => Some(Piece::Queen),
            _ => None,
        };

        let is_capture = board.piece_at(to).is_some();

        let flags = match self.flag {
            BookFlag::CastlingKingside => KINGSIDE_CASTLE,
            BookFlag::CastlingQueenside => QUEENSIDE_CASTLE,
            BookFlag::EnPassant => EN_PASSANT,
            BookFlag::DoublePush => DOUBLE_PAWN_PUSH,
            _ if promotion.is_some() && is_capture => PROMOTION_CAPTURE,
            _ if promotion.is_some() => PROMOTION,
            _ if is_capture => CAPTURE,
            _ => QUIET_MOVE,
        };

        Some(Move {
            from,
            to,
            piece,
            promotion,
            flags,
        })
    }
}

/// Encodes an engine move into the book's 16-bit wire format:
/// `from | (to << 6) | (flag << 12)`.
fn encode_move(mv: &Move) -> u16 {
    let flag = if mv.is_kingside_castle() {
        BookFlag::CastlingKingside
    } else if mv.is_queenside_castle() {
        BookFlag::CastlingQueenside
    } else if mv.is_en_passant() {
        BookFlag::EnPassant
    } else if mv.is_double_pawn_push() {
        BookFlag::DoublePush
    } else {
        match mv.promotion {
            Some(Piece::Rook) => BookFlag::PromotionRook,
            Some(Piece::Knight) => BookFlag::PromotionKnight,
            Some(Piece::Bishop) => BookFlag::PromotionBishop,
            Some(Piece::Queen) => BookFlag::PromotionQueen,
            _ => BookFlag::None,
        }
    };

    mv.from.index() as u16 | ((mv.to.index() as u16) << 6) | (flag.to_nibble() << 12)
}

fn decode_wire(code: u16) -> Option<(u8, u8, BookFlag)> {
    let from = (code & 0x3F) as u8;
    let to = ((code >> 6) & 0x3F) as u8;
    let flag = BookFlag::from_nibble((code >> 12) & 0xF)?;
    Some((from, to, flag))
}

pub struct OpeningBook {
    positions: HashMap<u64, Vec<BookEntry>>,
}

impl OpeningBook {
    pub fn empty() -> Self {
        Self {
            positions: HashMap::new(),
        }
    }

    pub fn load_file<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let text = fs::read_to_string(path)?;
        Ok(Self::load_str(&text))
    }

    /// Parses the text format, skipping corrupt lines silently (book data is
    /// best-effort).
    pub fn load_str(text: &str) -> Self {
        let mut positions = HashMap::new();

        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            if let Some((key, entries)) = parse_line(line) {
                positions.insert(key, entries);
            }
        }

        Self { positions }
    }

    /// Returns the first listed move for this position, or `None` if the
    /// book has no entry (or an explicit null-move entry) for this key.
    pub fn first(&self, key: u64, board: &Board) -> Option<Move> {
        self.positions.get(&key)?.first()?.decode_move(board)
    }

    /// Returns a uniformly random move among the listed candidates.
    pub fn random(&self, key: u64, board: &Board) -> Option<Move> {
        let entries = self.positions.get(&key)?;
        if entries.is_empty() {
            return None;
        }
        let idx = rand::rng().random_range(0..entries.len());
        entries[idx].decode_move(board)
    }

    /// Cumulative-probability selection weighted by each move's stored count.
    pub fn weighted(&self, key: u64, board: &Board) -> Option<Move> {
        let entries = self.positions.get(&key)?;
        let total: u32 = entries.iter().map(|e| e.weight).sum();
        if total == 0 {
            return entries.first()?.decode_move(board);
        }

        let mut pick = rand::rng().random_range(0..total);
        for entry in entries {
            if pick < entry.weight {
                return entry.decode_move(board);
            }
            pick -= entry.weight;
        }
        None
    }

    /// Returns every candidate move for this position, in file order.
    pub fn all(&self, key: u64, board: &Board) -> Vec<Move> {
        match self.positions.get(&key) {
            Some(entries) => entries.iter().filter_map(|e| e.decode_move(board)).collect(),
            None => Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

fn parse_line(line: &str) -> Option<(u64, Vec<BookEntry>)> {
    let mut parts = line.split('#');
    let key: u64 = parts.next()?.parse().ok()?;

    let mut entries = Vec::new();
    for field in parts {
        if field.is_empty() {
            continue;
        }
        let (code_str, count_str) = field.split_once(':')?;
        let code: u16 = code_str.parse().ok()?;
        let weight: u32 = count_str.parse().ok()?;
        let (from, to, flag) = decode_wire(code)?;
        entries.push(BookEntry {
            from,
            to,
            flag,
            weight,
        });
    }

    Some((key, entries))
}
