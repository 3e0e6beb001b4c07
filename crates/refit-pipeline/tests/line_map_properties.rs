use proptest::prelude::*;
use refit_pipeline::LineMap;
use refit_surgeon::{EditSet, TextEdit};
use std::path::Path;

fn line_start(lines: &[String], index: usize) -> usize {
    lines[..index].iter().map(|l| l.len() + 1).sum()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Property: after any sequence of whole-line insertions and deletions,
    /// every surviving original line is found at its remapped number.
    #[test]
    fn prop_remap_follows_surviving_lines(
        initial in 3usize..30,
        ops in prop::collection::vec((any::<bool>(), 0usize..100, 1usize..4), 1..6),
    ) {
        let file = Path::new("/virtual/Subject.java");
        let mut lines: Vec<String> = (1..=initial).map(|i| format!("L{i}")).collect();
        let mut map = LineMap::new();

        for (insert, at, count) in ops {
            let text: String = lines.iter().map(|l| format!("{l}\n")).collect();
            let edit = if insert || lines.len() <= count {
                let after = at % (lines.len() + 1);
                let offset = line_start(&lines, after);
                for k in 0..count {
                    lines.insert(after + k, "new".to_string());
                }
                TextEdit::insert(offset, "new\n".repeat(count), "insert")
            } else {
                let first = at % (lines.len() - count + 1);
                let start = line_start(&lines, first);
                let end = line_start(&lines, first + count);
                lines.drain(first..first + count);
                TextEdit::delete(start, end, "delete")
            };
            let set = EditSet::new(vec![edit], text.len()).unwrap();
            map.record(file, &set.line_shifts(&text));
        }

        for original in 1..=initial {
            let token = format!("L{original}");
            if lines.contains(&token) {
                let now = map.remap(file, original);
                prop_assert_eq!(&lines[now - 1], &token);
            }
        }
    }
}
