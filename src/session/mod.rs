use crate::chess::fen;
use crate::classtree::Range;
use crate::classtree::Tree;
use crate::query::Filter;
use crate::query::Query;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;
use std::time::Instant;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

/// What one cursor step hands back to the boundary layer: a rendered
/// position, or the sentinel for either end of the result set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Position(String),
    End,
    Begin,
}

/// A live query: its iterator over the shared store, the 1-based cursor of
/// the shown result, and the match count. The iterator owns its predicate
/// state but only an `Arc` of the store, so sessions never alias each other.
pub struct Session {
    iter: Range<Arc<Tree>, Filter>,
    current: usize,
    total: usize,
}

/// The answer to a query request.
#[derive(Debug)]
pub struct Ran {
    /// present only when this request minted the session
    pub id: Option<String>,
    /// the first matching position, or the end sentinel
    pub first: Step,
    pub time: Duration,
    pub count: usize,
}

/// Maps opaque session ids to live queries over one shared store.
pub struct Sessions {
    tree: Arc<Tree>,
    live: Mutex<HashMap<String, Session>>,
}

impl Sessions {
    pub fn new(tree: Arc<Tree>) -> Self {
        Self {
            tree,
            live: Mutex::new(HashMap::new()),
        }
    }

    /// A fresh opaque id. Nanosecond timestamps are unique enough here;
    /// sessions are not a security boundary.
    fn mint() -> String {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock after epoch")
            .as_nanos()
            .to_string()
    }

    /// Create or reuse the session behind `id`, bind `query` to its
    /// iterator, count the matches, and rewind onto the first one.
    pub fn run(&self, id: Option<&str>, query: Query) -> Ran {
        let mut live = self.live.lock().expect("session map");
        let (id, minted) = match id {
            Some(id) if live.contains_key(id) => (id.to_string(), false),
            _ => (Self::mint(), true),
        };
        let session = live.entry(id.clone()).or_insert_with(|| Session {
            iter: Range::new(self.tree.clone(), Filter::from(Query::default())),
            current: 0,
            total: 0,
        });

        let begin = Instant::now();
        session.iter.refilter(Filter::from(query));
        let count = session.iter.count();
        let time = begin.elapsed();

        session.iter.rewind();
        let first = match session.iter.next() {
            Some(entry) => Step::Position(fen::render(&entry.position)),
            None => Step::End,
        };
        session.total = count;
        session.current = match first {
            Step::Position(_) => 1,
            _ => 0,
        };
        Ran {
            id: minted.then_some(id),
            first,
            time,
            count,
        }
    }

    /// Advance the cursor. At the last result the iterator stays put and
    /// the end sentinel is reported. Unknown ids return None.
    pub fn next(&self, id: &str) -> Option<(Step, usize, usize)> {
        let mut live = self.live.lock().expect("session map");
        let session = live.get_mut(id)?;
        let step = if session.total == 0 {
            Step::End
        } else if session.current == 0 {
            // coming back up from before the beginning: the iterator never
            // moved below the first result
            session.current = 1;
            show(session)
        } else if session.current >= session.total {
            Step::End
        } else {
            session.iter.next();
            session.current += 1;
            show(session)
        };
        Some((step, session.current, session.total))
    }

    /// Retreat the cursor. Below the first result the session parks before
    /// the beginning and reports the begin sentinel.
    pub fn previous(&self, id: &str) -> Option<(Step, usize, usize)> {
        let mut live = self.live.lock().expect("session map");
        let session = live.get_mut(id)?;
        let step = if session.total == 0 {
            Step::Begin
        } else if session.current <= 1 {
            session.current = 0;
            Step::Begin
        } else {
            session.iter.prev();
            session.current -= 1;
            show(session)
        };
        Some((step, session.current, session.total))
    }
}

fn show(session: &Session) -> Step {
    match session.iter.get() {
        Some(entry) => Step::Position(fen::render(&entry.position)),
        None => Step::End,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chess::fen as fen_codec;
    use crate::classtree::Attributes;
    use crate::classtree::Entry;
    use crate::classtree::Metadata;
    use crate::query::Span;

    fn store() -> Arc<Tree> {
        let mut tree = Tree::new();
        for f in [
            "4k3/8/8/8/8/8/8/4K3 w - - 0 1",
            "4k3/8/8/8/8/8/3Q4/4K3 w - - 0 1",
            "4k3/1ppp4/8/8/8/8/4P3/4K3 w - - 0 1",
        ] {
            let (position, info) = fen_codec::parse(f).expect("test fen");
            let attrs = Attributes::from((&position, &info));
            tree.add(
                Entry {
                    position,
                    meta: Metadata { occurrences: 1 },
                },
                attrs,
            );
        }
        Arc::new(tree)
    }

    #[test]
    fn first_contact_mints_an_id() {
        let sessions = Sessions::new(store());
        let ran = sessions.run(None, Query::default());
        assert!(ran.id.is_some());
        assert_eq!(ran.count, 3);
        assert!(matches!(ran.first, Step::Position(_)));
    }

    #[test]
    fn a_known_id_is_reused() {
        let sessions = Sessions::new(store());
        let first = sessions.run(None, Query::default());
        let id = first.id.expect("minted");
        let second = sessions.run(Some(&id), Query::default());
        assert!(second.id.is_none());
        assert_eq!(second.count, 3);
    }

    #[test]
    fn an_unknown_id_mints_a_fresh_one() {
        let sessions = Sessions::new(store());
        let ran = sessions.run(Some("stale"), Query::default());
        assert!(ran.id.is_some());
        assert_ne!(ran.id.as_deref(), Some("stale"));
    }

    #[test]
    fn stepping_walks_the_state_machine() {
        let sessions = Sessions::new(store());
        let ran = sessions.run(None, Query::default());
        let id = ran.id.expect("minted");

        // 1 -> 2 -> 3, then pinned at the end
        let (step, current, total) = sessions.next(&id).expect("session");
        assert!(matches!(step, Step::Position(_)));
        assert_eq!((current, total), (2, 3));
        let (step, current, _) = sessions.next(&id).expect("session");
        assert!(matches!(step, Step::Position(_)));
        assert_eq!(current, 3);
        let (step, current, _) = sessions.next(&id).expect("session");
        assert_eq!(step, Step::End);
        assert_eq!(current, 3);

        // 3 -> 2 -> 1, then before the beginning
        let (step, current, _) = sessions.previous(&id).expect("session");
        assert!(matches!(step, Step::Position(_)));
        assert_eq!(current, 2);
        let (step, current, _) = sessions.previous(&id).expect("session");
        assert!(matches!(step, Step::Position(_)));
        assert_eq!(current, 1);
        let (step, current, _) = sessions.previous(&id).expect("session");
        assert_eq!(step, Step::Begin);
        assert_eq!(current, 0);
        let (step, current, _) = sessions.previous(&id).expect("session");
        assert_eq!(step, Step::Begin);
        assert_eq!(current, 0);

        // and back up onto the first result without losing it
        let (step, current, _) = sessions.next(&id).expect("session");
        assert!(matches!(step, Step::Position(_)));
        assert_eq!(current, 1);
    }

    #[test]
    fn rebinding_replaces_the_predicates_in_place() {
        let sessions = Sessions::new(store());
        let ran = sessions.run(None, Query::default());
        let id = ran.id.expect("minted");
        assert_eq!(ran.count, 3);

        let mut narrow = Query::default();
        narrow.pawns.white = Some(Span { lb: 1, ub: 1 });
        let reran = sessions.run(Some(&id), narrow);
        assert!(reran.id.is_none());
        assert_eq!(reran.count, 1);
        match reran.first {
            Step::Position(f) => assert!(f.contains("1ppp4")),
            other => panic!("expected a position, got {:?}", other),
        }
    }

    #[test]
    fn an_empty_result_reports_end() {
        let sessions = Sessions::new(store());
        let mut impossible = Query::default();
        impossible.pawns.white = Some(Span { lb: 7, ub: 7 });
        let ran = sessions.run(None, impossible);
        assert_eq!(ran.count, 0);
        assert_eq!(ran.first, Step::End);
        let id = ran.id.expect("minted");
        let (step, current, total) = sessions.next(&id).expect("session");
        assert_eq!(step, Step::End);
        assert_eq!((current, total), (0, 0));
    }

    #[test]
    fn sessions_do_not_alias_each_other() {
        let sessions = Sessions::new(store());
        let one = sessions.run(None, Query::default()).id.expect("minted");
        let mut narrow = Query::default();
        narrow.queens.white = Some(Span { lb: 1, ub: 1 });
        let two = sessions.run(None, narrow).id.expect("minted");
        assert_ne!(one, two);

        // stepping the first session leaves the second's cursor alone
        sessions.next(&one).expect("session");
        sessions.next(&one).expect("session");
        let (_, current, total) = sessions.next(&two).expect("session");
        assert_eq!(total, 1);
        assert_eq!(current, 1);
        let (_, current, _) = sessions.next(&one).expect("session");
        assert_eq!(current, 3);
    }

    #[test]
    fn unknown_ids_surface_nothing() {
        let sessions = Sessions::new(store());
        assert!(sessions.next("missing").is_none());
        assert!(sessions.previous("missing").is_none());
    }
}
