//! Screen buffer
//!
//! Fixed-size character grid with cursor, per-row dirty tracking, and the
//! scroll/clear/resize operations the escape parser drives.

use super::rendition::Rendition;
use super::TermEvents;

/// One character cell: the glyph plus the rendition captured when it was written.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Cell {
    pub ch: char,
    pub rendition: Rendition,
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            ch: ' ',
            rendition: Rendition::default(),
        }
    }
}

/// The terminal screen: `rows` x `cols` cells, a cursor, and dirty flags.
pub struct ScreenBuffer {
    rows: usize,
    cols: usize,
    cells: Vec<Vec<Cell>>,
    dirty: Vec<bool>,
    cursor_row: usize,
    cursor_col: usize,
}

impl ScreenBuffer {
    /// Create a cleared screen with the cursor at the top-left corner.
    pub fn new(rows: usize, cols: usize) -> Self {
        assert!(rows > 0 && cols > 0, "screen dimensions must be non-zero");
        Self {
            rows,
            cols,
            cells: (0..rows).map(|_| vec![Cell::default(); cols]).collect(),
            dirty: vec![false; rows],
            cursor_row: 0,
            cursor_col: 0,
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn size(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Cursor position as (row, col).
    pub fn cursor(&self) -> (usize, usize) {
        (self.cursor_row, self.cursor_col)
    }

    /// Move the cursor to an absolute position, clamped into bounds.
    pub fn set_cursor(&mut self, row: usize, col: usize) {
        self.cursor_row = row.min(self.rows - 1);
        self.cursor_col = col.min(self.cols - 1);
    }

    pub fn cursor_up(&mut self, n: usize) {
        self.cursor_row = self.cursor_row.saturating_sub(n);
    }

    pub fn cursor_down(&mut self, n: usize) {
        self.cursor_row = (self.cursor_row + n).min(self.rows - 1);
    }

    pub fn cursor_forward(&mut self, n: usize) {
        self.cursor_col = (self.cursor_col + n).min(self.cols - 1);
    }

    pub fn cursor_back(&mut self, n: usize) {
        self.cursor_col = self.cursor_col.saturating_sub(n);
    }

    pub fn carriage_return(&mut self) {
        self.cursor_col = 0;
    }

    pub fn backspace(&mut self) {
        self.cursor_col = self.cursor_col.saturating_sub(1);
    }

    /// Advance the cursor to the next multiple-of-8 column.
    ///
    /// The column is deliberately not clamped here; like printing in the last
    /// column, it may transiently sit past the edge until the next write
    /// wraps it.
    pub fn tab(&mut self) {
        loop {
            self.cursor_col += 1;
            if self.cursor_col % 8 == 0 {
                break;
            }
        }
    }

    /// Move to the next line, scrolling if the cursor is on the bottom row.
    pub fn newline(&mut self, events: &mut dyn TermEvents) {
        self.cursor_col = 0;
        if self.cursor_row + 1 < self.rows {
            self.cursor_row += 1;
        } else {
            self.scroll_up(events);
        }
    }

    /// Write a character at the cursor and advance, wrapping and scrolling
    /// past the last column.
    pub fn write_at_cursor(
        &mut self,
        ch: char,
        rendition: Rendition,
        events: &mut dyn TermEvents,
    ) {
        if self.cursor_col >= self.cols {
            self.newline(events);
        }
        // A shrinking resize may have left the cursor below the grid; writing
        // is a cursor-affecting operation, so clamp it back in.
        if self.cursor_row >= self.rows {
            self.cursor_row = self.rows - 1;
        }

        self.cells[self.cursor_row][self.cursor_col] = Cell { ch, rendition };
        self.dirty[self.cursor_row] = true;
        self.cursor_col += 1;
    }

    /// Drop the top row and append a blank row at the bottom.
    ///
    /// Fires the pre-scroll notification before the rows shift, so a consumer
    /// can flush dirty state while row indices still mean the old rows, and
    /// lines-updated afterwards. Dirty flags themselves are left untouched.
    pub fn scroll_up(&mut self, events: &mut dyn TermEvents) {
        events.pre_scroll();
        self.cells.remove(0);
        self.cells.push(vec![Cell::default(); self.cols]);
        events.lines_updated();
    }

    /// Clear a span of the screen.
    ///
    /// Corners are clamped into bounds and swapped if reversed. The first row
    /// of the span clears from `start_col` to the end of the row, the last
    /// row from the start of the row to `end_col`, and interior rows fully.
    /// When the span is a single row the first-row rule wins. This is the
    /// contiguous-run shape erase-display/erase-line produce, not a general
    /// rectangular clear.
    pub fn clear_rect(
        &mut self,
        start_row: usize,
        start_col: usize,
        end_row: usize,
        end_col: usize,
    ) {
        let mut start_row = start_row.min(self.rows - 1);
        let mut end_row = end_row.min(self.rows - 1);
        let mut start_col = start_col.min(self.cols - 1);
        let mut end_col = end_col.min(self.cols - 1);

        if start_row > end_row {
            std::mem::swap(&mut start_row, &mut end_row);
        }
        if start_col > end_col {
            std::mem::swap(&mut start_col, &mut end_col);
        }

        for row in start_row..=end_row {
            let start = if row == start_row { start_col } else { 0 };
            let end = if row == start_row {
                self.cols - 1
            } else if row == end_row {
                end_col
            } else {
                self.cols - 1
            };

            for cell in &mut self.cells[row][start..=end] {
                *cell = Cell::default();
            }
            self.dirty[row] = true;
        }
    }

    /// Resize the grid.
    ///
    /// Shrinking drops rows from the top and columns from the right; growing
    /// appends blank rows at the bottom and blank columns at the right. The
    /// cursor is intentionally not re-clamped; see `write_at_cursor`.
    pub fn resize(&mut self, rows: usize, cols: usize) {
        assert!(rows > 0 && cols > 0, "screen dimensions must be non-zero");

        while self.cells.len() > rows {
            self.cells.remove(0);
            self.dirty.remove(0);
        }
        while self.cells.len() < rows {
            self.cells.push(vec![Cell::default(); self.cols]);
            self.dirty.push(false);
        }
        self.rows = rows;

        for row in &mut self.cells {
            row.resize(cols, Cell::default());
        }
        self.cols = cols;
    }

    /// Return the dirty row indices in ascending order, clearing their flags.
    ///
    /// With `all` set every row is returned (and every flag cleared).
    pub fn take_dirty_rows(&mut self, all: bool) -> Vec<usize> {
        let mut rows = Vec::new();
        for (i, flag) in self.dirty.iter_mut().enumerate() {
            if *flag || all {
                rows.push(i);
                *flag = false;
            }
        }
        rows
    }

    pub fn cell(&self, row: usize, col: usize) -> Option<Cell> {
        self.cells.get(row).and_then(|r| r.get(col)).copied()
    }

    pub fn rendition_at(&self, row: usize, col: usize) -> Option<Rendition> {
        self.cell(row, col).map(|c| c.rendition)
    }

    /// One row as text; blank cells read as spaces.
    pub fn line_text(&self, row: usize) -> Option<String> {
        self.cells
            .get(row)
            .map(|r| r.iter().map(|c| c.ch).collect())
    }

    /// The whole screen as newline-joined text, trailing blank lines trimmed.
    pub fn screen_text(&self) -> String {
        let mut lines: Vec<String> = self
            .cells
            .iter()
            .map(|row| row.iter().map(|c| c.ch).collect())
            .collect();
        while lines.last().is_some_and(|l| l.trim().is_empty()) {
            lines.pop();
        }
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::super::NullEvents;
    use super::*;

    fn write_str(screen: &mut ScreenBuffer, s: &str) {
        for ch in s.chars() {
            screen.write_at_cursor(ch, Rendition::default(), &mut NullEvents);
        }
    }

    #[test]
    fn write_advances_and_marks_dirty() {
        let mut screen = ScreenBuffer::new(4, 10);
        write_str(&mut screen, "hi");
        assert_eq!(screen.cursor(), (0, 2));
        assert_eq!(screen.line_text(0).unwrap(), "hi        ");
        assert_eq!(screen.take_dirty_rows(false), vec![0]);
        assert!(screen.take_dirty_rows(false).is_empty());
    }

    #[test]
    fn take_all_clears_flags() {
        let mut screen = ScreenBuffer::new(3, 4);
        write_str(&mut screen, "x");
        assert_eq!(screen.take_dirty_rows(true), vec![0, 1, 2]);
        assert!(screen.take_dirty_rows(false).is_empty());
    }

    #[test]
    fn wrap_past_last_column() {
        let mut screen = ScreenBuffer::new(3, 4);
        write_str(&mut screen, "abcd");
        // Lazy wrap: the cursor parks past the edge until the next write.
        assert_eq!(screen.cursor(), (0, 4));
        write_str(&mut screen, "e");
        assert_eq!(screen.cursor(), (1, 1));
        assert_eq!(screen.line_text(1).unwrap(), "e   ");
    }

    #[test]
    fn write_on_last_row_scrolls_once() {
        let mut screen = ScreenBuffer::new(2, 3);
        write_str(&mut screen, "abc");
        screen.newline(&mut NullEvents);
        write_str(&mut screen, "def");
        write_str(&mut screen, "g");
        assert_eq!(screen.line_text(0).unwrap(), "def");
        assert_eq!(screen.line_text(1).unwrap(), "g  ");
    }

    #[test]
    fn clear_rect_span_bounds() {
        let mut screen = ScreenBuffer::new(4, 6);
        for row in 0..4 {
            screen.set_cursor(row, 0);
            write_str(&mut screen, "xxxxxx");
        }
        screen.take_dirty_rows(true);

        // first row clears from the start column to end-of-row, last row from
        // the start of the row to the end column
        screen.clear_rect(1, 3, 2, 2);
        assert_eq!(screen.line_text(1).unwrap(), "xxx   ");
        assert_eq!(screen.line_text(2).unwrap(), "   xxx");
        assert_eq!(screen.take_dirty_rows(false), vec![1, 2]);
    }

    #[test]
    fn clear_rect_swaps_reversed_corners() {
        let mut screen = ScreenBuffer::new(4, 4);
        for row in 0..4 {
            screen.set_cursor(row, 0);
            write_str(&mut screen, "yyyy");
        }
        screen.clear_rect(3, 0, 0, 3);
        for row in 0..4 {
            assert_eq!(screen.line_text(row).unwrap(), "    ");
        }
    }

    #[test]
    fn clear_rect_clamps_out_of_range() {
        let mut screen = ScreenBuffer::new(2, 4);
        write_str(&mut screen, "abcd");
        screen.clear_rect(0, 0, 99, 99);
        assert_eq!(screen.line_text(0).unwrap(), "    ");
    }

    #[test]
    fn resize_drops_top_rows_and_forgets_content() {
        let mut screen = ScreenBuffer::new(24, 80);
        for row in 0..24 {
            screen.set_cursor(row, 0);
            write_str(&mut screen, &format!("row{row}"));
        }
        screen.resize(10, 80);
        assert_eq!(screen.size(), (10, 80));
        assert!(screen.line_text(0).unwrap().starts_with("row14"));

        screen.resize(24, 80);
        assert!(screen.line_text(0).unwrap().starts_with("row14"));
        // re-grown rows are blank, not restored
        assert_eq!(screen.line_text(10).unwrap().trim(), "");
    }

    #[test]
    fn resize_cols_truncates_right() {
        let mut screen = ScreenBuffer::new(2, 6);
        write_str(&mut screen, "abcdef");
        screen.resize(2, 4);
        assert_eq!(screen.line_text(0).unwrap(), "abcd");
        screen.resize(2, 6);
        assert_eq!(screen.line_text(0).unwrap(), "abcd  ");
    }

    #[test]
    fn resize_does_not_reclamp_cursor() {
        let mut screen = ScreenBuffer::new(10, 10);
        screen.set_cursor(9, 9);
        screen.resize(5, 5);
        assert_eq!(screen.cursor(), (9, 9));
        // the next write pulls it back into bounds
        write_str(&mut screen, "z");
        let (row, col) = screen.cursor();
        assert!(row < 5 && col <= 5);
    }

    #[test]
    fn screen_text_trims_trailing_blank_lines() {
        let mut screen = ScreenBuffer::new(3, 3);
        write_str(&mut screen, "ab");
        assert_eq!(screen.screen_text(), "ab ");
    }

    #[test]
    fn cursor_moves_clamp() {
        let mut screen = ScreenBuffer::new(5, 5);
        screen.cursor_up(10);
        screen.cursor_back(10);
        assert_eq!(screen.cursor(), (0, 0));
        screen.cursor_down(10);
        screen.cursor_forward(10);
        assert_eq!(screen.cursor(), (4, 4));
    }
}
