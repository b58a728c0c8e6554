// Property-based tests for the binary storage format.
// Soak: PROPTEST_CASES=10000 cargo test --release --test persistence

use proptest::prelude::*;

use cellgrid::{Position, SheetError, Spreadsheet};

fn config() -> ProptestConfig {
    ProptestConfig {
        cases: std::env::var("PROPTEST_CASES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(128),
        failure_persistence: None,
        ..ProptestConfig::default()
    }
}

/// A reference inside A1:F6, with random absolute markers.
fn arb_ref() -> impl Strategy<Value = String> {
    (0u8..6, 1i32..=6, any::<bool>(), any::<bool>()).prop_map(|(col, row, col_abs, row_abs)| {
        format!(
            "{}{}{}{}",
            if col_abs { "$" } else { "" },
            char::from(b'A' + col),
            if row_abs { "$" } else { "" },
            row
        )
    })
}

fn arb_input() -> impl Strategy<Value = String> {
    prop_oneof![
        3 => r"-?[0-9]{1,4}(\.[0-9]{1,2})?",
        1 => r"[a-z ]{0,10}",
        2 => (arb_ref(), arb_ref(), prop::sample::select(vec!["+", "-", "*", "/", "^", "<", "<>"]))
            .prop_map(|(a, b, op)| format!("={a}{op}{b}")),
        1 => (arb_ref(), arb_ref(), prop::sample::select(vec!["sum", "count", "min", "max"]))
            .prop_map(|(a, b, f)| format!("={f}({a}:{b})")),
        1 => (arb_ref(), arb_ref(), arb_ref())
            .prop_map(|(a, b, c)| format!("=if({a} >= 0, \"t \"\"{b}\"\"\" + {b}, countval({a}, {b}:{c}))")),
    ]
}

fn arb_sheet() -> impl Strategy<Value = Vec<(Position, String)>> {
    prop::collection::vec(((1i32..=6, 1i32..=6), arb_input()), 0..24).prop_map(|cells| {
        cells
            .into_iter()
            .map(|((col, row), input)| (Position::new(col, row), input))
            .collect()
    })
}

fn build(cells: &[(Position, String)]) -> Spreadsheet {
    let mut sheet = Spreadsheet::new();
    for (pos, input) in cells {
        sheet.set_cell(*pos, input).unwrap();
    }
    sheet
}

proptest! {
    #![proptest_config(config())]

    #[test]
    fn prop_round_trip_reproduces_values(cells in arb_sheet()) {
        let mut original = build(&cells);
        let mut data = Vec::new();
        original.save(&mut data).unwrap();

        let mut loaded = Spreadsheet::new();
        loaded.load(&mut data.as_slice()).unwrap();

        prop_assert_eq!(loaded.len(), original.len());
        for col in 1..=6 {
            for row in 1..=6 {
                let pos = Position::new(col, row);
                prop_assert_eq!(loaded.get_value(pos), original.get_value(pos));
                prop_assert_eq!(loaded.contents(pos), original.contents(pos));
            }
        }
        prop_assert_eq!(loaded.to_bytes().unwrap(), data);
    }

    #[test]
    fn prop_any_flipped_byte_is_rejected(
        cells in arb_sheet(),
        index in any::<prop::sample::Index>(),
        mask in 1u8..=255,
    ) {
        let mut original = build(&cells);
        let mut data = original.to_bytes().unwrap();
        let at = index.index(data.len());
        data[at] ^= mask;

        let mut target = build(&cells);
        let result = target.load_bytes(&data);
        prop_assert!(
            matches!(result, Err(SheetError::ChecksumMismatch { .. })),
            "byte {} accepted",
            at
        );
        prop_assert_eq!(target.to_bytes().unwrap(), original.to_bytes().unwrap());
        for (pos, _) in &cells {
            prop_assert_eq!(target.get_value(*pos), original.get_value(*pos));
        }
    }
}
