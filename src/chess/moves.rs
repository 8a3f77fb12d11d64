use super::piece;
use super::position::Position;
use super::position::PositionInfo;
use super::position::Side;

/// A board square by 1-based file and rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Square {
    pub file: usize,
    pub rank: usize,
}

impl TryFrom<&[u8]> for Square {
    type Error = &'static str;
    fn try_from(s: &[u8]) -> Result<Self, Self::Error> {
        match s {
            [f @ b'a'..=b'h', r @ b'1'..=b'8', ..] => Ok(Square {
                file: (f - b'a' + 1) as usize,
                rank: (r - b'1' + 1) as usize,
            }),
            _ => Err("expected a file letter and a rank digit"),
        }
    }
}

impl std::fmt::Display for Square {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "{}{}",
            (b'a' + self.file as u8 - 1) as char,
            (b'1' + self.rank as u8 - 1) as char
        )
    }
}

/// A half-move as the puzzle files encode it: origin, destination, and an
/// optional promotion letter (space when absent).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Move {
    pub from: Square,
    pub to: Square,
    pub promotion: u8,
}

/// Reads the leading move of a move list, e.g. `e2e4`, `b7b8q`, or
/// `e2e4 e7e5`. Any non-letter fifth character means no promotion.
impl TryFrom<&str> for Move {
    type Error = &'static str;
    fn try_from(s: &str) -> Result<Self, Self::Error> {
        let s = s.as_bytes();
        if s.len() < 4 {
            return Err("move token shorter than four characters");
        }
        let from = Square::try_from(&s[0..2])?;
        let to = Square::try_from(&s[2..4])?;
        let promotion = match s.get(4) {
            Some(c @ (b'q' | b'r' | b'b' | b'n')) => *c,
            _ => b' ',
        };
        Ok(Move {
            from,
            to,
            promotion,
        })
    }
}

impl Position {
    /// Apply a half-move in place, keeping the counts coherent.
    ///
    /// The move is assumed to be legal for this position; nothing is
    /// validated. Handles en-passant captures (a pawn changing file onto an
    /// empty square), promotions, castling (a king moving two files), and
    /// plain moves with or without capture. Any standing en-passant target
    /// is dropped, and a fresh one is recorded when a pawn double-advances
    /// past an adjacent enemy pawn.
    pub fn apply(&mut self, m: Move, info: &mut PositionInfo) {
        let Move {
            from,
            to,
            promotion,
        } = m;

        self.side = self.side.flip();
        self.en_passant = [b'-', b'-'];

        let mover = self[from];
        let target = self[to];

        let mut simple = true;
        if piece::is_pawn(mover) {
            let en_passant = from.file != to.file
                && (from.rank == 4 || from.rank == 5)
                && target == piece::EMPTY;
            if en_passant {
                // the captured pawn sits beside the origin, on the origin rank
                match self.side {
                    Side::White => info.white_pawns -= 1,
                    Side::Black => info.black_pawns -= 1,
                }
                let beside = Square {
                    file: if to.file < from.file {
                        from.file - 1
                    } else {
                        from.file + 1
                    },
                    rank: from.rank,
                };
                self[beside] = piece::EMPTY;
                self[to] = mover;
                self[from] = piece::EMPTY;
                simple = false;
            } else if promotion != b' ' {
                self[from] = piece::EMPTY;
                let promoted = if piece::is_white(mover) {
                    info.white_pawns -= 1;
                    promotion.to_ascii_uppercase()
                } else {
                    info.black_pawns -= 1;
                    promotion
                };
                self[to] = promoted;
                info.count(promoted);
                simple = false;
            }
        } else if piece::is_king(mover) {
            let castling = from.rank == to.rank && from.file.abs_diff(to.file) > 1;
            if castling {
                self[to] = mover;
                if to.file < from.file {
                    // queen side: the rook hops from file 1 to beside the king
                    let corner = Square { file: 1, rank: to.rank };
                    let rook = self[corner];
                    self[Square { file: to.file + 1, rank: to.rank }] = rook;
                    self[corner] = piece::EMPTY;
                } else {
                    // king side: the rook hops from file 8
                    let corner = Square { file: 8, rank: to.rank };
                    let rook = self[corner];
                    self[Square { file: to.file - 1, rank: to.rank }] = rook;
                    self[corner] = piece::EMPTY;
                }
                self[from] = piece::EMPTY;
                self.castling.revoke(match piece::is_white(mover) {
                    true => Side::White,
                    false => Side::Black,
                });
                simple = false;
            }
        }

        if simple {
            if target != piece::EMPTY {
                info.uncount(target);
            }
            self[to] = mover;
            self[from] = piece::EMPTY;

            if piece::is_king(mover) || piece::is_rook(mover) {
                self.castling.revoke(match piece::is_white(mover) {
                    true => Side::White,
                    false => Side::Black,
                });
            } else if piece::is_pawn(mover) && from.rank.abs_diff(to.rank) == 2 {
                let enemy = |c: u8| {
                    piece::is_pawn(c)
                        && piece::is_white(c) != piece::is_white(mover)
                };
                let beside_low = to.file > 1 && enemy(self.at(to.file - 1, to.rank));
                let beside_high = to.file < 8 && enemy(self.at(to.file + 1, to.rank));
                if beside_low || beside_high {
                    let skipped = if to.rank > from.rank {
                        to.rank - 1
                    } else {
                        to.rank + 1
                    };
                    self.en_passant = [
                        b'a' + to.file as u8 - 1,
                        b'1' + skipped as u8 - 1,
                    ];
                }
            }
        }
    }
}
