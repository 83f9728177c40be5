use serde::Serialize;

/// A pipe table collected from consecutive `|` lines.
///
/// Rows keep whatever cells they had; they are aligned to headers by index
/// and never validated against the header count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// One label/value pair of a transposed table row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardField<'a> {
    pub label: &'a str,
    pub value: &'a str,
    /// The first field of every card is drawn emphasized.
    pub lead: bool,
}

impl Table {
    /// View each body row as a card with one field per header label.
    /// Missing cells read as empty strings; surplus cells are not shown.
    pub fn cards(&self) -> Vec<Vec<CardField<'_>>> {
        self.rows
            .iter()
            .map(|row| {
                self.headers
                    .iter()
                    .enumerate()
                    .map(|(index, label)| CardField {
                        label,
                        value: row.get(index).map(String::as_str).unwrap_or(""),
                        lead: index == 0,
                    })
                    .collect()
            })
            .collect()
    }
}

/// Raw table lines buffered while scanning a message.
#[derive(Debug, Default)]
pub(crate) struct TableBuffer {
    lines: Vec<String>,
}

impl TableBuffer {
    pub(crate) fn push(&mut self, line: &str) {
        self.lines.push(line.to_string());
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Drain the buffer into a [`Table`].
    ///
    /// Blank lines are ignored. Fewer than two remaining lines produce no
    /// table. The second line is taken to be the `|---|` separator and is
    /// skipped without looking at it.
    pub(crate) fn flush(&mut self) -> Option<Table> {
        let lines = std::mem::take(&mut self.lines);
        let lines: Vec<&str> = lines
            .iter()
            .map(String::as_str)
            .filter(|line| !line.trim().is_empty())
            .collect();

        if lines.len() < 2 {
            return None;
        }

        Some(Table {
            headers: split_cells(lines[0]),
            rows: lines[2..].iter().map(|line| split_cells(line)).collect(),
        })
    }
}

fn split_cells(line: &str) -> Vec<String> {
    line.split('|')
        .map(str::trim)
        .filter(|cell| !cell.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer(lines: &[&str]) -> TableBuffer {
        let mut buffer = TableBuffer::default();
        for line in lines {
            buffer.push(line);
        }
        buffer
    }

    #[test]
    fn flush_empties_the_buffer() {
        let mut table = buffer(&["|A|", "|-|"]);
        assert!(table.flush().is_some());
        assert!(table.is_empty());
        assert_eq!(table.flush(), None);
    }

    #[test]
    fn single_line_is_discarded() {
        assert_eq!(buffer(&["| lonely |"]).flush(), None);
        assert_eq!(buffer(&["| lonely |", "   "]).flush(), None);
    }

    #[test]
    fn empty_cells_are_dropped_after_trimming() {
        let table = buffer(&["| A |  | B |", "|---|---|---|", "| 1 |   | 2 |"])
            .flush()
            .expect("table");
        assert_eq!(table.headers, vec!["A", "B"]);
        assert_eq!(table.rows, vec![vec!["1".to_string(), "2".to_string()]]);
    }

    #[test]
    fn cards_pair_labels_with_cells_by_index() {
        let table = Table {
            headers: vec!["SOURCE".into(), "TITLE".into(), "LEDE".into()],
            rows: vec![vec!["Daily".into(), "Headline".into()]],
        };
        let cards = table.cards();
        assert_eq!(cards.len(), 1);
        assert_eq!(
            cards[0],
            vec![
                CardField { label: "SOURCE", value: "Daily", lead: true },
                CardField { label: "TITLE", value: "Headline", lead: false },
                CardField { label: "LEDE", value: "", lead: false },
            ]
        );
    }
}
