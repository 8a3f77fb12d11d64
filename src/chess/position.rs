use super::moves::Square;
use super::piece;
use crate::Arbitrary;
use std::cmp::Ordering;
use std::fmt::Display;
use std::fmt::Formatter;
use std::fmt::Result;

/// Side to move. White plays first, so white is the zero variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Side {
    White = 0,
    Black = 1,
}

impl Side {
    pub fn flip(self) -> Side {
        match self {
            Side::White => Side::Black,
            Side::Black => Side::White,
        }
    }
}

impl From<Side> for u8 {
    fn from(side: Side) -> u8 {
        side as u8
    }
}

impl Display for Side {
    fn fmt(&self, f: &mut Formatter) -> Result {
        match self {
            Side::White => write!(f, "w"),
            Side::Black => write!(f, "b"),
        }
    }
}

/// The four independent castling rights.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Castling {
    pub white_king: bool,
    pub white_queen: bool,
    pub black_king: bool,
    pub black_queen: bool,
}

impl Castling {
    pub fn revoke(&mut self, side: Side) {
        match side {
            Side::White => {
                self.white_king = false;
                self.white_queen = false;
            }
            Side::Black => {
                self.black_king = false;
                self.black_queen = false;
            }
        }
    }
}

/// A chess position: 64 board squares plus side to move, castling rights,
/// and a potential en-passant target.
///
/// Squares are indexed by 1-based (file, rank); a1 is (1, 1) and h8 is (8, 8).
/// The en-passant field is two bytes, `b"--"` when there is no target.
/// Equality is structural over all four components; the cached piece counts
/// of [`PositionInfo`] are carried beside a position, never inside it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Position {
    pub squares: [u8; 64],
    pub side: Side,
    pub castling: Castling,
    pub en_passant: [u8; 2],
}

impl Position {
    pub fn empty() -> Self {
        Self {
            squares: [piece::EMPTY; 64],
            side: Side::White,
            castling: Castling::default(),
            en_passant: [b'-', b'-'],
        }
    }

    pub fn at(&self, file: usize, rank: usize) -> u8 {
        self.squares[(rank - 1) * 8 + (file - 1)]
    }

    pub fn at_mut(&mut self, file: usize, rank: usize) -> &mut u8 {
        &mut self.squares[(rank - 1) * 8 + (file - 1)]
    }

    /// The 64 squares as one string, ranks 8 down to 1, row major.
    /// This is the order leaves of the index are sorted by.
    pub fn natural(&self) -> String {
        let mut s = String::with_capacity(64);
        for rank in (1..=8).rev() {
            for file in 1..=8 {
                s.push(self.at(file, rank) as char);
            }
        }
        s
    }

    /// Eight ranks separated by newlines, with the side to move appended.
    pub fn pretty(&self) -> String {
        let mut s = String::with_capacity(64 + 8 + 1);
        for rank in (1..=8).rev() {
            for file in 1..=8 {
                s.push(self.at(file, rank) as char);
            }
            s.push('\n');
        }
        s.push_str(&self.side.to_string());
        s
    }
}

impl std::ops::Index<Square> for Position {
    type Output = u8;
    fn index(&self, sq: Square) -> &u8 {
        &self.squares[(sq.rank - 1) * 8 + (sq.file - 1)]
    }
}

impl std::ops::IndexMut<Square> for Position {
    fn index_mut(&mut self, sq: Square) -> &mut u8 {
        &mut self.squares[(sq.rank - 1) * 8 + (sq.file - 1)]
    }
}

/// Natural-string order, tie broken by the remaining state so that the
/// order is total and agrees with equality.
impl Ord for Position {
    fn cmp(&self, other: &Self) -> Ordering {
        for rank in (1..=8).rev() {
            for file in 1..=8 {
                match self.at(file, rank).cmp(&other.at(file, rank)) {
                    Ordering::Equal => continue,
                    unequal => return unequal,
                }
            }
        }
        self.en_passant
            .cmp(&other.en_passant)
            .then(self.side.cmp(&other.side))
            .then(self.castling.cmp(&other.castling))
    }
}

impl PartialOrd for Position {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Display for Position {
    fn fmt(&self, f: &mut Formatter) -> Result {
        write!(f, "{}", self.natural())
    }
}

impl Arbitrary for Position {
    fn random() -> Self {
        use rand::Rng;
        use rand::SeedableRng;
        use rand::rngs::SmallRng;
        use std::sync::atomic::AtomicU64;
        // counter-seeded so generated boards vary per call but the sequence
        // is reproducible across runs
        static SALT: AtomicU64 = AtomicU64::new(0);
        let seed = SALT.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        let mut rng = SmallRng::seed_from_u64(seed);
        let mut p = Position::empty();
        for _ in 0..rng.random_range(2..24) {
            let square = rng.random_range(0..64);
            let symbol = b"PRNBQKprnbqk"[rng.random_range(0..12)];
            p.squares[square] = symbol;
        }
        p.side = match rng.random_range(0..2) {
            0 => Side::White,
            _ => Side::Black,
        };
        p.castling = Castling {
            white_king: rng.random_range(0..2) == 0,
            white_queen: rng.random_range(0..2) == 0,
            black_king: rng.random_range(0..2) == 0,
            black_queen: rng.random_range(0..2) == 0,
        };
        if rng.random_range(0..4) == 0 {
            p.en_passant = [
                b'a' + rng.random_range(0..8) as u8,
                b'1' + rng.random_range(0..8) as u8,
            ];
        }
        p
    }
}

/// Piece counts of a position, maintained while parsing and while applying
/// moves. Kings are never counted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PositionInfo {
    pub white_pawns: u8,
    pub white_rooks: u8,
    pub white_knights: u8,
    pub white_bishops: u8,
    pub white_queens: u8,
    pub black_pawns: u8,
    pub black_rooks: u8,
    pub black_knights: u8,
    pub black_bishops: u8,
    pub black_queens: u8,
}

impl PositionInfo {
    pub fn count(&mut self, c: u8) {
        match c {
            piece::WHITE_PAWN => self.white_pawns += 1,
            piece::WHITE_ROOK => self.white_rooks += 1,
            piece::WHITE_KNIGHT => self.white_knights += 1,
            piece::WHITE_BISHOP => self.white_bishops += 1,
            piece::WHITE_QUEEN => self.white_queens += 1,
            piece::BLACK_PAWN => self.black_pawns += 1,
            piece::BLACK_ROOK => self.black_rooks += 1,
            piece::BLACK_KNIGHT => self.black_knights += 1,
            piece::BLACK_BISHOP => self.black_bishops += 1,
            piece::BLACK_QUEEN => self.black_queens += 1,
            _ => {}
        }
    }

    pub fn uncount(&mut self, c: u8) {
        match c {
            piece::WHITE_PAWN => self.white_pawns -= 1,
            piece::WHITE_ROOK => self.white_rooks -= 1,
            piece::WHITE_KNIGHT => self.white_knights -= 1,
            piece::WHITE_BISHOP => self.white_bishops -= 1,
            piece::WHITE_QUEEN => self.white_queens -= 1,
            piece::BLACK_PAWN => self.black_pawns -= 1,
            piece::BLACK_ROOK => self.black_rooks -= 1,
            piece::BLACK_KNIGHT => self.black_knights -= 1,
            piece::BLACK_BISHOP => self.black_bishops -= 1,
            piece::BLACK_QUEEN => self.black_queens -= 1,
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn board(natural: &str) -> Position {
        assert_eq!(natural.len(), 64);
        let mut p = Position::empty();
        for (i, c) in natural.bytes().enumerate() {
            let rank = 8 - i / 8;
            let file = i % 8 + 1;
            *p.at_mut(file, rank) = c;
        }
        p
    }

    #[test]
    fn indexing() {
        let mut p = Position::empty();
        *p.at_mut(1, 1) = piece::WHITE_ROOK;
        *p.at_mut(8, 8) = piece::BLACK_ROOK;
        assert_eq!(p.squares[0], piece::WHITE_ROOK);
        assert_eq!(p.squares[63], piece::BLACK_ROOK);
        assert_eq!(p[Square { file: 1, rank: 1 }], piece::WHITE_ROOK);
        assert_eq!(p[Square { file: 8, rank: 8 }], piece::BLACK_ROOK);
    }

    #[test]
    fn natural_reads_top_down() {
        let mut p = Position::empty();
        *p.at_mut(1, 8) = piece::BLACK_ROOK;
        *p.at_mut(8, 1) = piece::WHITE_ROOK;
        let s = p.natural();
        assert_eq!(s.as_bytes()[0], piece::BLACK_ROOK);
        assert_eq!(s.as_bytes()[63], piece::WHITE_ROOK);
    }

    #[test]
    fn equality_sees_every_component() {
        let p = Position::empty();
        let mut q = p.clone();
        assert_eq!(p, q);
        q.side = Side::Black;
        assert_ne!(p, q);
        let mut q = p.clone();
        q.en_passant = [b'e', b'3'];
        assert_ne!(p, q);
        let mut q = p.clone();
        q.castling.white_king = true;
        assert_ne!(p, q);
    }

    #[test]
    fn order_follows_natural_string() {
        let a = board(
            "........\
             ........\
             ........\
             ........\
             ........\
             ........\
             ........\
             R.......",
        );
        let b = board(
            "r.......\
             ........\
             ........\
             ........\
             ........\
             ........\
             ........\
             ........",
        );
        // rank 8 compares first, so the board with a piece up top sorts after
        assert!(a.natural() < b.natural());
        assert!(a < b);
    }

    #[test]
    fn order_agrees_with_equality() {
        let p = Position::empty();
        let mut q = p.clone();
        assert_eq!(p.cmp(&q), std::cmp::Ordering::Equal);
        q.side = Side::Black;
        assert_ne!(p.cmp(&q), std::cmp::Ordering::Equal);
    }

    #[test]
    fn pretty_appends_turn() {
        let p = Position::empty();
        let s = p.pretty();
        assert_eq!(s.lines().count(), 9);
        assert!(s.ends_with('w'));
    }

    #[test]
    fn counters() {
        let mut info = PositionInfo::default();
        info.count(piece::WHITE_QUEEN);
        info.count(piece::BLACK_PAWN);
        info.count(piece::WHITE_KING);
        assert_eq!(info.white_queens, 1);
        assert_eq!(info.black_pawns, 1);
        info.uncount(piece::BLACK_PAWN);
        assert_eq!(info.black_pawns, 0);
        assert_eq!(info, {
            let mut only_queen = PositionInfo::default();
            only_queen.white_queens = 1;
            only_queen
        });
    }
}
