//! Keyboard grid builder.

use std::collections::BTreeMap;

/// A button tagged with its position in the grid. Rows and columns are
/// 1-based; the column is informational, order within a row follows
/// insertion order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridButton<B> {
    pub row: u32,
    pub col: u32,
    pub button: B,
}

impl<B> GridButton<B> {
    pub fn new(row: u32, col: u32, button: B) -> Self {
        Self { row, col, button }
    }
}

/// Group buttons into rows, ascending by row number. Gaps in the row
/// numbering collapse; no empty rows are emitted.
pub fn build_grid<B>(buttons: Vec<GridButton<B>>) -> Vec<Vec<B>> {
    let mut rows: BTreeMap<u32, Vec<B>> = BTreeMap::new();
    for b in buttons {
        rows.entry(b.row).or_default().push(b.button);
    }
    rows.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::telegram::InlineKeyboardButton;

    fn btn(text: &str) -> InlineKeyboardButton {
        InlineKeyboardButton::callback(text, "/setting")
    }

    #[test]
    fn test_rows_grouped_and_sorted() {
        let buttons = vec![
            GridButton::new(1, 1, btn("1:1")),
            GridButton::new(1, 2, btn("1:2")),
            GridButton::new(1, 3, btn("1:3")),
            GridButton::new(1, 4, btn("1:4")),
            GridButton::new(1, 5, btn("1:5")),
            GridButton::new(2, 1, btn("2:1")),
            GridButton::new(2, 2, btn("2:2")),
            GridButton::new(5, 2, btn("5:2")),
            GridButton::new(3, 2, btn("3:2")),
        ];
        let expected = vec![
            vec![btn("1:1"), btn("1:2"), btn("1:3"), btn("1:4"), btn("1:5")],
            vec![btn("2:1"), btn("2:2")],
            vec![btn("3:2")],
            vec![btn("5:2")],
        ];
        assert_eq!(build_grid(buttons), expected);
    }

    #[test]
    fn test_insertion_order_within_row() {
        let grid = build_grid(vec![
            GridButton::new(2, 2, "b"),
            GridButton::new(1, 1, "top"),
            GridButton::new(2, 1, "a"),
        ]);
        assert_eq!(grid, vec![vec!["top"], vec!["b", "a"]]);
    }

    #[test]
    fn test_empty() {
        let grid: Vec<Vec<&str>> = build_grid(Vec::new());
        assert!(grid.is_empty());
    }
}
