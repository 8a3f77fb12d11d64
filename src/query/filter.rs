use super::Counts;
use super::Query;
use crate::classtree::Predicate;

/// The compiled form of a [`Query`]: one admission check per index level,
/// sharing a running tally of pieces seen along the current path.
///
/// Each piece kind occupies two consecutive levels, white count then black.
/// At the white level only the upper bounds of the combined and total ranges
/// can be checked (black might still supply the rest); at the black level
/// the combined range closes, and once the black-queen level has been
/// tallied the total range closes too. Rejecting at the shallowest possible
/// level is what lets the iterator skip whole subtrees.
#[derive(Debug, Clone)]
pub struct Filter {
    query: Query,
    white: [i32; 5],
    black: [i32; 5],
}

impl From<Query> for Filter {
    fn from(query: Query) -> Self {
        Self {
            query,
            white: [0; 5],
            black: [0; 5],
        }
    }
}

impl Filter {
    pub fn query(&self) -> &Query {
        &self.query
    }

    fn counts(&self, piece: usize) -> Counts {
        match piece {
            0 => self.query.pawns,
            1 => self.query.rooks,
            2 => self.query.knights,
            3 => self.query.bishops,
            4 => self.query.queens,
            _ => unreachable!("five piece kinds"),
        }
    }

    fn admit_white(&mut self, piece: usize, value: i32) -> bool {
        self.white[piece] = value;
        let q = self.counts(piece);
        if let Some(white) = q.white {
            if !white.holds(value) {
                return false;
            }
        }
        if let Some(both) = q.both {
            if value > both.ub {
                return false;
            }
        }
        if let Some(total) = self.query.pieces {
            let seen: i32 = (0..piece).map(|p| self.white[p] + self.black[p]).sum::<i32>() + value;
            if seen > total.ub {
                return false;
            }
        }
        true
    }

    fn admit_black(&mut self, piece: usize, value: i32) -> bool {
        self.black[piece] = value;
        let q = self.counts(piece);
        let seen: i32 = (0..=piece).map(|p| self.white[p] + self.black[p]).sum();
        if let Some(black) = q.black {
            if !black.holds(value) {
                return false;
            }
        }
        if let Some(both) = q.both {
            if !both.holds(self.white[piece] + value) {
                return false;
            }
        }
        if let Some(total) = self.query.pieces {
            // all five kinds are tallied at the black-queen level, so the
            // lower bound finally becomes checkable there
            let closed = piece == 4;
            if seen > total.ub || (closed && !total.holds(seen)) {
                return false;
            }
        }
        true
    }
}

impl Predicate for Filter {
    fn admit(&mut self, level: usize, value: u8) -> bool {
        match level {
            10 => match self.query.side {
                None => true,
                Some(side) => value == u8::from(side),
            },
            _ => {
                let piece = level / 2;
                match level % 2 {
                    0 => self.admit_white(piece, value as i32),
                    _ => self.admit_black(piece, value as i32),
                }
            }
        }
    }
}
