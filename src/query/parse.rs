use super::Counts;
use super::Query;
use super::Span;
use crate::chess::Side;

/// Parse the flat query-description format the boundary layers speak:
/// bracketed fields like `p[w:1,2;b:0,3;t:1,4;]r[...]k[...]b[...]q[...]`
/// for pawns, rooks, knights, bishops, and queens, `T[T:lb,ub]` for the
/// total piece budget, and `M[w]` or `M[b]` to pin the side to move.
/// Unrecognized pieces of the description are logged and skipped, matching
/// the tolerant behaviour of the interactive editor.
impl From<&str> for Query {
    fn from(s: &str) -> Self {
        let mut q = Query::default();
        let mut rest = s;
        while let Some(open) = rest.find('[') {
            let Some(close) = rest.find(']') else {
                log::warn!("unbalanced '[' in query description");
                break;
            };
            if close < open {
                log::warn!("unbalanced ']' in query description");
                break;
            }
            let name = &rest[..open];
            let content = &rest[open + 1..close];
            match name {
                "p" => piece_field(content, &mut q.pawns),
                "r" => piece_field(content, &mut q.rooks),
                "k" => piece_field(content, &mut q.knights),
                "b" => piece_field(content, &mut q.bishops),
                "q" => piece_field(content, &mut q.queens),
                "T" => match subfield(content) {
                    Some(('T', lb, ub)) => q.pieces = Some(Span { lb, ub }),
                    _ => log::warn!("bad total-pieces field '{}'", content),
                },
                "M" => match content {
                    "w" => q.side = Some(Side::White),
                    "b" => q.side = Some(Side::Black),
                    _ => log::warn!("bad side-to-move field '{}'", content),
                },
                _ => log::warn!("unknown query field '{}'", name),
            }
            rest = &rest[close + 1..];
        }
        q
    }
}

/// One `name:lb,ub` subfield.
fn subfield(sub: &str) -> Option<(char, i32, i32)> {
    let (name, bounds) = sub.split_once(':')?;
    let (lb, ub) = bounds.split_once(',')?;
    Some((
        name.chars().next()?,
        lb.trim().parse().ok()?,
        ub.trim().parse().ok()?,
    ))
}

/// A piece field: `;`-separated `w:`, `b:`, and `t:` subfields, any subset.
fn piece_field(content: &str, counts: &mut Counts) {
    for sub in content.split_terminator(';') {
        match subfield(sub) {
            Some(('w', lb, ub)) => counts.white = Some(Span { lb, ub }),
            Some(('b', lb, ub)) => counts.black = Some(Span { lb, ub }),
            Some(('t', lb, ub)) => counts.both = Some(Span { lb, ub }),
            _ => log::warn!("bad piece subfield '{}'", sub),
        }
    }
}
