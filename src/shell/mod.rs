use crate::chess::fen;
use crate::classtree::Range;
use crate::classtree::Tree;
use crate::query::Counts;
use crate::query::Filter;
use crate::query::Query;
use crate::query::Span;
use std::io::Write;
use std::time::Instant;

/// The interactive shell over a loaded store: edit predicates, inspect the
/// store, and enumerate matches.
pub struct Shell {
    tree: Tree,
    query: Query,
}

impl Shell {
    pub fn new(tree: Tree) -> Self {
        Self {
            tree,
            query: Query::default(),
        }
    }

    pub fn run(&mut self) {
        loop {
            match ask("> ").as_str() {
                "exit" | "quit" => break,
                "query" => self.edit(),
                "info" => self.info(),
                "show" => self.show(),
                "run" => self.enumerate(),
                "help" => help(),
                "" => continue,
                other => println!("unknown command '{}'. type 'help' for usage.", other),
            }
        }
    }

    /// The guided predicate editor: pick a scope, then set or unset one
    /// range at a time.
    fn edit(&mut self) {
        match ask("what (piece/global/turn/reset)> ").as_str() {
            "piece" => {
                let piece = ask("piece type (pawns/rooks/knights/bishops/queens)> ");
                let counts = match piece.as_str() {
                    "pawns" => &mut self.query.pawns,
                    "rooks" => &mut self.query.rooks,
                    "knights" => &mut self.query.knights,
                    "bishops" => &mut self.query.bishops,
                    "queens" => &mut self.query.queens,
                    other => {
                        println!("unknown piece type '{}'", other);
                        return;
                    }
                };
                let field = ask("query type (white/black/both)> ");
                match ask("action (set/unset)> ").as_str() {
                    "set" => match (number("lb> "), number("ub> ")) {
                        (Some(lb), Some(ub)) => set(counts, &field, Some(Span { lb, ub })),
                        _ => println!("bounds must be integers"),
                    },
                    "unset" => set(counts, &field, None),
                    other => println!("unknown action '{}'", other),
                }
            }
            "global" => match ask("action (set/unset)> ").as_str() {
                "set" => match (number("lb> "), number("ub> ")) {
                    (Some(lb), Some(ub)) => self.query.pieces = Some(Span { lb, ub }),
                    _ => println!("bounds must be integers"),
                },
                "unset" => self.query.pieces = None,
                other => println!("unknown action '{}'", other),
            },
            "turn" => {
                let player = ask("player (white/black)> ");
                match ask("action (set/unset)> ").as_str() {
                    "set" => {
                        self.query.side = match player.as_str() {
                            "white" => Some(crate::chess::Side::White),
                            "black" => Some(crate::chess::Side::Black),
                            other => {
                                println!("unknown player '{}'", other);
                                return;
                            }
                        }
                    }
                    "unset" => self.query.side = None,
                    other => println!("unknown action '{}'", other),
                }
            }
            "reset" => self.query.reset(),
            other => println!("unknown scope '{}'", other),
        }
    }

    fn info(&self) {
        println!("{} positions indexed", self.tree.size());
    }

    fn show(&self) {
        for (name, counts) in [
            ("pawns", self.query.pawns),
            ("rooks", self.query.rooks),
            ("knights", self.query.knights),
            ("bishops", self.query.bishops),
            ("queens", self.query.queens),
        ] {
            println!("{}:", name);
            println!("    white: {}", span(counts.white));
            println!("    black: {}", span(counts.black));
            println!("    both:  {}", span(counts.both));
        }
        println!("total pieces: {}", span(self.query.pieces));
        println!(
            "side to move: {}",
            match self.query.side {
                None => "no".to_string(),
                Some(side) => side.to_string(),
            }
        );
    }

    /// Count and print every match of the current query.
    fn enumerate(&self) {
        let begin = Instant::now();
        let mut it: Range<&Tree, Filter> = self.tree.range(Filter::from(self.query));
        let count = it.count();
        let elapsed = begin.elapsed();
        it.rewind();
        while let Some(entry) = it.next() {
            println!("{}", fen::render(&entry.position));
        }
        println!("{} matches in {:?}", count, elapsed);
    }
}

fn help() {
    println!("available commands:");
    println!("  query   - edit the match predicates");
    println!("  show    - print the current predicates");
    println!("  info    - print the store size");
    println!("  run     - enumerate matching positions");
    println!("  exit    - leave the shell");
}

fn ask(prompt: &str) -> String {
    print!("{}", prompt);
    std::io::stdout().flush().expect("stdout");
    let mut line = String::new();
    if std::io::stdin().read_line(&mut line).unwrap_or(0) == 0 {
        return "exit".to_string();
    }
    line.trim().to_string()
}

fn number(prompt: &str) -> Option<i32> {
    ask(prompt).parse().ok()
}

fn set(counts: &mut Counts, field: &str, value: Option<Span>) {
    match field {
        "white" => counts.white = value,
        "black" => counts.black = value,
        "both" => counts.both = value,
        other => println!("unknown query type '{}'", other),
    }
}

fn span(s: Option<Span>) -> String {
    match s {
        None => "no".to_string(),
        Some(Span { lb, ub }) => format!("{}, {}", lb, ub),
    }
}
