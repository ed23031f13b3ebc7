use corechess::board::{Board, Piece};
use corechess::book::PolyglotBook;
use corechess::moves::execute::{generate_legal, make_move_basic};
use corechess::moves::magic::MagicTables;
use corechess::moves::magic::loader::load_magic_tables;
use corechess::moves::types::Move;
use corechess::search::search::search;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::str::FromStr;
use std::time::Duration;

/// A small line-oriented debug console, not a protocol implementation.
/// Commands: startpos | fen <fen...> | moves <m1> <m2> ... |
/// go depth <n> | go movetime <ms> | perft <n> | display | bench | quit
fn main() {
    let magic_tables = load_magic_tables();
    let mut board = Board::new();

    let book = PolyglotBook::load("book.bin").ok();
    match &book {
        Some(_) => println!("opening book loaded"),
        None => println!("no opening book found (book.bin), running engine only"),
    }

    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = match line {
            Ok(l) => l.trim().to_string(),
            Err(_) => break,
        };

        if line.is_empty() {
            continue;
        }

        let parts: Vec<&str> = line.split_whitespace().collect();
        match parts[0] {
            "startpos" => board = Board::new(),
            "fen" => match Board::from_str(&parts[1..].join(" ")) {
                Ok(b) => board = b,
                Err(e) => eprintln!("invalid fen: {}", e),
            },
            "moves" => {
                for move_str in &parts[1..] {
                    match parse_move(&board, move_str, &magic_tables) {
                        Some(mv) => {
                            make_move_basic(&mut board, mv);
                        }
                        None => {
                            eprintln!("illegal move: {}", move_str);
                            break;
                        }
                    }
                }
            }
            "go" => handle_go(&parts, &mut board, &magic_tables, &book),
            "perft" => handle_perft(&parts, &mut board, &magic_tables),
            "display" | "d" => println!("{}", board),
            "bench" => run_epd_tests("bench_arena/bk.epd", &magic_tables),
            "quit" | "exit" => break,
            _ => eprintln!("unknown command: {}", parts[0]),
        }
    }
}

fn parse_move(board: &Board, move_str: &str, tables: &MagicTables) -> Option<Move> {
    if move_str.len() < 4 {
        return None;
    }

    let chars: Vec<char> = move_str.chars().collect();

    let from_file = (chars[0] as u8).wrapping_sub(b'a');
    let from_rank = (chars[1] as u8).wrapping_sub(b'1');
    let to_file = (chars[2] as u8).wrapping_sub(b'a');
    let to_rank = (chars[3] as u8).wrapping_sub(b'1');

    if from_file > 7 || from_rank > 7 || to_file > 7 || to_rank > 7 {
        return None;
    }

    let from_square = (from_rank * 8 + from_file) as usize;
    let to_square = (to_rank * 8 + to_file) as usize;

    let promo_piece = if move_str.len() >= 5 {
        match chars[4] {
            'q' => Some(Piece::Queen),
            'r' => Some(Piece::Rook),
            'b' => Some(Piece::Bishop),
            'n' => Some(Piece::Knight),
            _ => None,
        }
    } else {
        None
    };

    let mut moves = Vec::with_capacity(256);
    let mut scratch = Vec::with_capacity(256);
    let mut board_copy = board.clone();
    generate_legal(&mut board_copy, tables, &mut moves, &mut scratch);

    for mv in moves {
        if (mv.from.index() as usize) == from_square && (mv.to.index() as usize) == to_square {
            if promo_piece.is_some() {
                if mv.promotion == promo_piece {
                    return Some(mv);
                }
            } else if mv.promotion.is_none() {
                return Some(mv);
            }
        }
    }
    None
}

fn handle_go(parts: &[&str], board: &mut Board, tables: &MagicTables, book: &Option<PolyglotBook>) {
    if let Some(b) = book
        && let Some(book_move) = b.probe(board)
    {
        println!("book move: {}", book_move.to_uci());
        return;
    }

    let mut depth = 64;
    let mut time_limit = None;

    let mut i = 1;
    while i < parts.len() {
        match parts[i] {
            "depth" => {
                if i + 1 < parts.len() {
                    depth = parts[i + 1].parse().unwrap_or(64);
                }
                i += 2;
            }
            "movetime" => {
                if i + 1 < parts.len() {
                    if let Ok(ms) = parts[i + 1].parse::<u64>() {
                        time_limit = Some(Duration::from_millis(ms));
                    }
                }
                i += 2;
            }
            _ => i += 1,
        }
    }

    let (score, best_move) = search(board, tables, depth, time_limit);

    match best_move {
        Some(m) => println!("best move: {} (score {})", m.to_uci(), score),
        None => println!("best move: none (score {})", score),
    }
}

fn handle_perft(parts: &[&str], board: &mut Board, tables: &MagicTables) {
    let depth: u32 = match parts.get(1).and_then(|s| s.parse().ok()) {
        Some(d) => d,
        None => {
            eprintln!("usage: perft <depth>");
            return;
        }
    };

    let nodes = corechess::moves::perft::perft(board, tables, depth);
    println!("perft({}) = {}", depth, nodes);
}

// --- EPD tactical test runner ---
fn run_epd_tests(path: &str, tables: &MagicTables) {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(_) => {
            println!("could not find EPD file at '{}'", path);
            return;
        }
    };

    println!("running tactical tests from {} (1s per position)...", path);
    println!("----------------------------------------------------");

    let reader = BufReader::new(file);
    let mut solved = 0;
    let mut total = 0;

    for (line_idx, line_res) in reader.lines().enumerate() {
        let line = line_res.unwrap_or_default();
        if line.trim().is_empty() {
            continue;
        }

        if let Some(bm_idx) = line.find(" bm ") {
            let fen = &line[..bm_idx].trim();
            let rest = &line[bm_idx + 4..];
            let move_end = rest.find(';').unwrap_or(rest.len());
            let san_move = rest[..move_end].trim();

            let mut board = match Board::from_str(fen) {
                Ok(b) => b,
                Err(_) => {
                    println!("error parsing FEN on line {}", line_idx + 1);
                    continue;
                }
            };

            let expected_uci = san_to_uci(&mut board, san_move, tables);

            let time_limit = Some(Duration::from_millis(1000));
            let depth = 64;

            let (_score, best_move) = search(&mut board, tables, depth, time_limit);

            let result_str = match best_move {
                Some(m) => m.to_uci(),
                None => "none".to_string(),
            };

            let passed = expected_uci.as_deref() == Some(result_str.as_str());

            if passed {
                solved += 1;
            }
            total += 1;

            println!("test #{}: {}", total, if passed { "pass" } else { "fail" });
            if !passed {
                println!(
                    "   expected: {} | got: {}",
                    expected_uci.unwrap_or(san_move.to_string()),
                    result_str
                );
            }
        }
    }

    println!("----------------------------------------------------");
    println!("result: {}/{} solved", solved, total);
}

// --- Helper: convert SAN to our move notation ---
fn san_to_uci(board: &mut Board, san: &str, tables: &MagicTables) -> Option<String> {
    let mut moves = Vec::with_capacity(256);
    let mut scratch = Vec::with_capacity(256);
    generate_legal(board, tables, &mut moves, &mut scratch);

    let clean_san = san.replace("+", "").replace("#", "").replace("x", "");

    if clean_san == "O-O" {
        return moves
            .iter()
            .find(|m| {
                let from = m.from.index() as i8;
                let to = m.to.index() as i8;
                (to - from).abs() == 2 && to > from
            })
            .map(|m| m.to_uci());
    }
    if clean_san == "O-O-O" {
        return moves
            .iter()
            .find(|m| {
                let from = m.from.index() as i8;
                let to = m.to.index() as i8;
                (to - from).abs() == 2 && to < from
            })
            .map(|m| m.to_uci());
    }

    if clean_san.len() < 2 {
        return None;
    }
    let target_str = &clean_san[clean_san.len() - 2..];

    let file = (target_str.chars().nth(0)? as u8).wrapping_sub(b'a');
    let rank = (target_str.chars().nth(1)? as u8).wrapping_sub(b'1');
    if file > 7 || rank > 7 {
        return None;
    }
    let target_sq = (rank * 8 + file) as usize;

    let first_char = clean_san.chars().next()?;
    let piece_type = match first_char {
        'N' => Piece::Knight,
        'B' => Piece::Bishop,
        'R' => Piece::Rook,
        'Q' => Piece::Queen,
        'K' => Piece::King,
        _ => Piece::Pawn,
    };

    let disambig_char = if piece_type == Piece::Pawn {
        if clean_san.len() > 2 && first_char.is_lowercase() {
            Some(first_char)
        } else {
            None
        }
    } else {
        let content = &clean_san[1..clean_san.len() - 2];
        if !content.is_empty() {
            content.chars().next()
        } else {
            None
        }
    };

    let candidates: Vec<&Move> = moves
        .iter()
        .filter(|m| {
            if (m.to.index() as usize) != target_sq {
                return false;
            }

            if let Some((_, p)) = board.piece_at(m.from) {
                if p != piece_type {
                    return false;
                }
            } else {
                return false;
            }

            if let Some(d) = disambig_char {
                let from_sq = m.from.index();
                let from_file = from_sq % 8;
                let from_rank = from_sq / 8;

                if d >= 'a' && d <= 'h' {
                    if from_file != (d as u8 - b'a') {
                        return false;
                    }
                } else if d >= '1' && d <= '8' && from_rank != (d as u8 - b'1') {
                    return false;
                }
            }
            true
        })
        .collect();

    candidates.first().map(|m| m.to_uci())
}
