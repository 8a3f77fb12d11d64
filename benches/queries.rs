use criterion::Criterion;
use criterion::black_box;
use criterion::criterion_group;
use criterion::criterion_main;
use puzzlebase::chess::Position;
use puzzlebase::chess::PositionInfo;
use puzzlebase::classtree::Attributes;
use puzzlebase::classtree::Entry;
use puzzlebase::classtree::Lambda;
use puzzlebase::classtree::Metadata;
use puzzlebase::classtree::Tree;

/// A store of a few thousand synthetic positions: kings on their home
/// squares plus one white and one black piece swept over the middle of the
/// board, which spreads entries across many attribute paths.
fn build() -> Tree {
    let mut tree = Tree::new();
    for white in [b'P', b'R', b'N', b'B', b'Q'] {
        for black in [b'p', b'r', b'n', b'b', b'q'] {
            for file in 1..=8 {
                for rank in 3..=6 {
                    let mut p = Position::empty();
                    *p.at_mut(5, 1) = b'K';
                    *p.at_mut(5, 8) = b'k';
                    *p.at_mut(file, rank) = white;
                    *p.at_mut(9 - file, 9 - rank) = black;
                    let mut info = PositionInfo::default();
                    info.count(white);
                    info.count(black);
                    let attrs = Attributes::from((&p, &info));
                    tree.add(
                        Entry {
                            position: p,
                            meta: Metadata { occurrences: 1 },
                        },
                        attrs,
                    );
                }
            }
        }
    }
    tree
}

fn counting(c: &mut Criterion) {
    let tree = build();
    c.bench_function("count everything", |b| {
        b.iter(|| black_box(tree.range(Lambda(|_, _| true)).count()))
    });
    c.bench_function("count one white queen", |b| {
        b.iter(|| {
            black_box(
                tree.range(Lambda(|level, value| level != 8 || value == 1))
                    .count(),
            )
        })
    });
    c.bench_function("count pawnless black-to-move", |b| {
        b.iter(|| {
            black_box(
                tree.range(Lambda(|level, value| match level {
                    0 | 1 => value == 0,
                    10 => value == 1,
                    _ => true,
                }))
                .count(),
            )
        })
    });
}

criterion_group!(benches, counting);
criterion_main!(benches);
