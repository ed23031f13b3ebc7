use super::fen_tables::{CHAR_TO_PC, PC_TO_CHAR};
use super::{Board, CASTLE_BK, CASTLE_BQ, CASTLE_WK, CASTLE_WQ, Color, Piece};
use crate::square::Square;

impl Board {
    /// Loads a FEN string into this board, replacing all prior state.
    /// Corrupt input leaves `self` untouched and returns a descriptive error.
    pub fn set_fen(&mut self, fen: &str) -> Result<(), String> {
        let fields: Vec<&str> = fen.split_whitespace().collect();
        if fields.len() < 4 {
            return Err(format!(
                "FEN must have at least 4 fields (placement, side, castling, en passant), got {}",
                fields.len()
            ));
        }

        let mut board = Board::new_empty();
        parse_placement(&mut board, fields[0])?;

        board.side_to_move = match fields[1] {
            "w" => Color::White,
            "b" => Color::Black,
            other => return Err(format!("invalid side to move: `{}`", other)),
        };

        board.castling_rights = parse_castling(fields[2])?;

        board.en_passant = match fields[3] {
            "-" => None,
            sq => Some(Square::from_algebraic(sq).ok_or_else(|| format!("invalid en passant square: `{}`", sq))?),
        };

        board.halfmove_clock = fields
            .get(4)
            .map(|s| s.parse::<u32>().map_err(|_| format!("invalid halfmove clock: `{}`", s)))
            .transpose()?
            .unwrap_or(0);

        board.fullmove_number = fields
            .get(5)
            .map(|s| s.parse::<u32>().map_err(|_| format!("invalid fullmove number: `{}`", s)))
            .transpose()?
            .unwrap_or(1);

        board.validate()?;
        board.refresh_zobrist();
        board.history.clear();

        *self = board;
        Ok(())
    }

    /// Serializes the current position to FEN.
    pub fn to_fen(&self) -> String {
        let mut placement = String::with_capacity(64);
        for rank in (0..8).rev() {
            let mut empty_run = 0u32;
            for file in 0..8 {
                let idx = (rank * 8 + file) as u8;
                let sq = Square::from_index(idx);
                match self.piece_at(sq) {
                    Some((color, piece)) => {
                        if empty_run > 0 {
                            placement.push_str(&empty_run.to_string());
                            empty_run = 0;
                        }
                        let ci = color as usize;
                        let pi = piece as usize;
                        placement.push(PC_TO_CHAR[ci * 6 + pi]);
                    }
                    None => empty_run += 1,
                }
            }
            if empty_run > 0 {
                placement.push_str(&empty_run.to_string());
            }
            if rank > 0 {
                placement.push('/');
            }
        }

        let side = match self.side_to_move {
            Color::White => "w",
            Color::Black => "b",
        };

        let mut castling = String::new();
        if self.has_castling(CASTLE_WK) {
            castling.push('K');
        }
        if self.has_castling(CASTLE_WQ) {
            castling.push('Q');
        }
        if self.has_castling(CASTLE_BK) {
            castling.push('k');
        }
        if self.has_castling(CASTLE_BQ) {
            castling.push('q');
        }
        if castling.is_empty() {
            castling.push('-');
        }

        let ep = self
            .en_passant
            .map(|sq| sq.to_string())
            .unwrap_or_else(|| "-".to_string());

        format!(
            "{} {} {} {} {} {}",
            placement, side, castling, ep, self.halfmove_clock, self.fullmove_number
        )
    }
}

fn parse_placement(board: &mut Board, placement: &str) -> Result<(), String> {
    let ranks: Vec<&str> = placement.split('/').collect();
    if ranks.len() != 8 {
        return Err(format!(
            "FEN placement must have 8 ranks, got {}",
            ranks.len()
        ));
    }

    // FEN ranks run 8 -> 1, top to bottom.
    for (rank_from_top, rank_str) in ranks.iter().enumerate() {
        let rank = 7 - rank_from_top;
        let mut file = 0usize;
        for c in rank_str.chars() {
            if let Some(skip) = c.to_digit(10) {
                file += skip as usize;
                if file > 8 {
                    return Err(format!("rank `{}` overflows the board", rank_str));
                }
                continue;
            }

            if file >= 8 {
                return Err(format!("rank `{}` overflows the board", rank_str));
            }

            let (piece, color) = CHAR_TO_PC[c as usize]
                .ok_or_else(|| format!("invalid piece glyph `{}` in FEN", c))?;
            let sq = Square::from_index((rank * 8 + file) as u8);
            let bb = board.bb(color, piece) | (1u64 << sq.index());
            board.set_bb(color, piece, bb);
            file += 1;
        }

        if file != 8 {
            return Err(format!("rank `{}` does not fill all 8 files", rank_str));
        }
    }

    Ok(())
}

fn parse_castling(field: &str) -> Result<u8, String> {
    if field == "-" {
        return Ok(0);
    }

    let mut rights = 0u8;
    for c in field.chars() {
        rights |= match c {
            'K' => CASTLE_WK,
            'Q' => CASTLE_WQ,
            'k' => CASTLE_BK,
            'q' => CASTLE_BQ,
            other => return Err(format!("invalid castling right `{}`", other)),
        };
    }
    Ok(rights)
}
