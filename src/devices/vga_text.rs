//! # VGA Text Display
//!
//! 80x25 text mode at `0xB8000`. Everything writes into a shadow buffer;
//! [`Display::refresh`] copies only the cells that differ from device
//! memory, once per main-loop iteration.
//!
//! ```text
//!  cell = attribute << 8 | ascii       0x0F20 = white on black, space
//!
//!  row 0..24   scrolling text area (write_byte / write_str / fmt::Write)
//!  row 24      status line (write_line_at)
//! ```

use core::fmt;

use crate::platform::ports::{CRTC_DATA, CRTC_INDEX};
use crate::platform::Platform;

pub const BUFFER_HEIGHT: usize = 25;
pub const BUFFER_WIDTH: usize = 80;
pub const CELL_COUNT: usize = BUFFER_WIDTH * BUFFER_HEIGHT;

/// Rows that scroll; the last row is left to the status line.
pub const TEXT_ROWS: usize = BUFFER_HEIGHT - 1;
pub const STATUS_ROW: usize = BUFFER_HEIGHT - 1;

/// CRTC registers holding the cursor location.
const CURSOR_LOCATION_HIGH: u8 = 0x0E;
const CURSOR_LOCATION_LOW: u8 = 0x0F;

#[allow(dead_code)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Color {
    Black = 0,
    Blue = 1,
    Green = 2,
    Cyan = 3,
    Red = 4,
    Magenta = 5,
    Brown = 6,
    LightGray = 7,
    DarkGray = 8,
    LightBlue = 9,
    LightGreen = 10,
    LightCyan = 11,
    LightRed = 12,
    Pink = 13,
    Yellow = 14,
    White = 15,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
pub struct ColorCode(u8);

impl ColorCode {
    pub const fn new(fg: Color, bg: Color) -> Self {
        Self((bg as u8) << 4 | (fg as u8))
    }

    pub const fn cell(self, ascii: u8) -> u16 {
        (self.0 as u16) << 8 | ascii as u16
    }
}

pub const DEFAULT_COLOR: ColorCode = ColorCode::new(Color::White, Color::Black);
pub const BLANK: u16 = DEFAULT_COLOR.cell(b' ');

pub struct Display {
    cells: [u16; CELL_COUNT],
    row: usize,
    col: usize,
    color: ColorCode,
}

impl Display {
    pub const fn new() -> Self {
        Self {
            cells: [BLANK; CELL_COUNT],
            row: 0,
            col: 0,
            color: DEFAULT_COLOR,
        }
    }

    /// Fill the shadow buffer with blank cells and home the cursor.
    pub fn blank(&mut self) {
        self.cells = [BLANK; CELL_COUNT];
        self.row = 0;
        self.col = 0;
    }

    pub fn cursor(&self) -> (usize, usize) {
        (self.row, self.col)
    }

    /// Move the cursor; coordinates outside the screen are clamped.
    pub fn set_cursor(&mut self, row: usize, col: usize) {
        self.row = row.min(BUFFER_HEIGHT - 1);
        self.col = col.min(BUFFER_WIDTH - 1);
    }

    pub fn set_color(&mut self, fg: Color, bg: Color) {
        self.color = ColorCode::new(fg, bg);
    }

    pub fn cell(&self, row: usize, col: usize) -> u16 {
        self.cells[row * BUFFER_WIDTH + col]
    }

    pub fn cells(&self) -> &[u16; CELL_COUNT] {
        &self.cells
    }

    pub fn write_byte(&mut self, byte: u8) {
        match byte {
            b'\n' => self.new_line(),
            byte => {
                if self.col >= BUFFER_WIDTH {
                    self.new_line();
                }
                self.cells[self.row * BUFFER_WIDTH + self.col] = self.color.cell(byte);
                self.col += 1;
                if self.col >= BUFFER_WIDTH {
                    self.new_line();
                }
            }
        }
    }

    /// Non-ASCII bytes are shown as `0xFE` (■).
    pub fn write_str(&mut self, text: &str) {
        for byte in text.bytes() {
            match byte {
                b'\n' => self.write_byte(byte),
                _ => self.write_byte(printable(byte)),
            }
        }
    }

    /// Put `text` at a fixed position without moving the cursor. Text past
    /// the end of the row is dropped.
    pub fn write_at(&mut self, row: usize, col: usize, text: &str) {
        if row >= BUFFER_HEIGHT {
            return;
        }
        for (offset, byte) in text.bytes().enumerate() {
            let col = col + offset;
            if col >= BUFFER_WIDTH {
                break;
            }
            self.cells[row * BUFFER_WIDTH + col] = self.color.cell(printable(byte));
        }
    }

    /// Replace `row` with formatted text, blank-padded to the full width.
    pub fn write_line_at(&mut self, row: usize, args: fmt::Arguments) {
        if row >= BUFFER_HEIGHT {
            return;
        }
        self.clear_row(row);
        let mut line = LineWriter {
            display: self,
            row,
            col: 0,
        };
        let _ = fmt::write(&mut line, args);
    }

    /// Copy every shadow cell that differs from device memory. Returns the
    /// number of cells written.
    pub fn refresh<P: Platform>(&self, platform: &mut P) -> usize {
        let mut written = 0;
        for (index, &cell) in self.cells.iter().enumerate() {
            if platform.read_cell(index) != cell {
                platform.write_cell(index, cell);
                written += 1;
            }
        }
        written
    }

    /// Program the CRTC cursor location: low byte first, then high.
    pub fn update_cursor<P: Platform>(&self, platform: &mut P) {
        let position = (self.row * BUFFER_WIDTH + self.col) as u16;
        platform.write_port8(CRTC_INDEX, CURSOR_LOCATION_LOW);
        platform.write_port8(CRTC_DATA, (position & 0xFF) as u8);
        platform.write_port8(CRTC_INDEX, CURSOR_LOCATION_HIGH);
        platform.write_port8(CRTC_DATA, (position >> 8) as u8);
    }

    fn new_line(&mut self) {
        self.col = 0;
        if self.row + 1 < TEXT_ROWS {
            self.row += 1;
        } else {
            self.scroll_up();
        }
    }

    fn scroll_up(&mut self) {
        self.cells
            .copy_within(BUFFER_WIDTH..TEXT_ROWS * BUFFER_WIDTH, 0);
        self.clear_row(TEXT_ROWS - 1);
        self.row = TEXT_ROWS - 1;
    }

    fn clear_row(&mut self, row: usize) {
        let start = row * BUFFER_WIDTH;
        self.cells[start..start + BUFFER_WIDTH].fill(BLANK);
    }
}

impl Default for Display {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Write for Display {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        Display::write_str(self, s);
        Ok(())
    }
}

fn printable(byte: u8) -> u8 {
    match byte {
        0x20..=0x7e => byte,
        _ => 0xfe,
    }
}

struct LineWriter<'a> {
    display: &'a mut Display,
    row: usize,
    col: usize,
}

impl fmt::Write for LineWriter<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let start = self.col;
        self.display.write_at(self.row, start, s);
        self.col = (start + s.len()).min(BUFFER_WIDTH);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::{Op, RecordingPlatform};
    use core::fmt::Write;

    fn text(display: &Display, row: usize, len: usize) -> String {
        (0..len)
            .map(|col| (display.cell(row, col) & 0xFF) as u8 as char)
            .collect()
    }

    #[test]
    fn test_blank_cell_value() {
        assert_eq!(BLANK, 0x0F20);
        let display = Display::new();
        assert!(display.cells().iter().all(|&cell| cell == 0x0F20));
    }

    #[test]
    fn test_refresh_writes_only_differing_cells() {
        let mut display = Display::new();
        let mut platform = RecordingPlatform::new();

        assert_eq!(display.refresh(&mut platform), CELL_COUNT);
        assert_eq!(display.refresh(&mut platform), 0);

        display.write_at(3, 10, "ok");
        platform.cell_writes = 0;
        assert_eq!(display.refresh(&mut platform), 2);
        assert_eq!(platform.cell_writes, 2);
        assert_eq!(platform.cells[3 * 80 + 10], DEFAULT_COLOR.cell(b'o'));
        assert_eq!(&platform.cells[..], &display.cells()[..]);
    }

    #[test]
    fn test_refresh_repairs_foreign_writes() {
        let display = Display::new();
        let mut platform = RecordingPlatform::new();
        display.refresh(&mut platform);

        platform.cells[100] = 0x4141;
        assert_eq!(display.refresh(&mut platform), 1);
        assert_eq!(platform.cells[100], BLANK);
    }

    #[test]
    fn test_cursor_registers_low_then_high() {
        let mut display = Display::new();
        display.set_cursor(12, 40);
        let mut platform = RecordingPlatform::new();
        display.update_cursor(&mut platform);

        let position: u16 = 12 * 80 + 40;
        assert_eq!(
            platform.ops,
            vec![
                Op::Out(0x3D4, 0x0F),
                Op::Out(0x3D5, (position & 0xFF) as u8),
                Op::Out(0x3D4, 0x0E),
                Op::Out(0x3D5, (position >> 8) as u8),
            ]
        );
    }

    #[test]
    fn test_set_cursor_clamps_to_screen() {
        let mut display = Display::new();
        display.set_cursor(99, 200);
        assert_eq!(display.cursor(), (24, 79));
    }

    #[test]
    fn test_write_str_wraps_and_breaks_lines() {
        let mut display = Display::new();
        display.write_str("hello\nworld");
        assert_eq!(text(&display, 0, 5), "hello");
        assert_eq!(text(&display, 1, 5), "world");
        assert_eq!(display.cursor(), (1, 5));

        let long = "x".repeat(BUFFER_WIDTH + 3);
        display.write_str(&long);
        assert_eq!(display.cursor(), (2, 8));
    }

    #[test]
    fn test_scroll_keeps_status_row() {
        let mut display = Display::new();
        display.write_line_at(STATUS_ROW, format_args!("status"));
        for line in 0..30 {
            writeln!(display, "line {}", line).unwrap();
        }

        assert_eq!(text(&display, TEXT_ROWS - 2, 7), "line 29");
        assert_eq!(display.cursor(), (TEXT_ROWS - 1, 0));
        assert_eq!(text(&display, STATUS_ROW, 6), "status");
        let (row, col) = display.cursor();
        assert!(row < BUFFER_HEIGHT && col < BUFFER_WIDTH);
    }

    #[test]
    fn test_line_writer_truncates_and_pads() {
        let mut display = Display::new();
        display.write_at(STATUS_ROW, 70, "leftover");
        display.write_line_at(STATUS_ROW, format_args!("ticks={} {}", 42, "y".repeat(90)));

        assert_eq!(text(&display, STATUS_ROW, 8), "ticks=42");
        assert_eq!(display.cell(STATUS_ROW, 79) & 0xFF, b'y' as u16);
        assert_eq!(display.cursor(), (0, 0));

        display.write_line_at(STATUS_ROW, format_args!("short"));
        assert_eq!(display.cell(STATUS_ROW, 70), BLANK);
    }

    #[test]
    fn test_positioned_text_masks_non_ascii() {
        let mut display = Display::new();
        display.write_at(3, 0, "a\u{e9}\tb");
        let bytes: Vec<u8> = (0..5).map(|col| (display.cell(3, col) & 0xFF) as u8).collect();
        assert_eq!(bytes, vec![b'a', 0xfe, 0xfe, 0xfe, b'b']);

        display.write_line_at(STATUS_ROW, format_args!("{}", '\u{2192}'));
        assert!((0..3).all(|col| display.cell(STATUS_ROW, col) & 0xFF == 0xfe));
        assert_eq!(display.cell(STATUS_ROW, 3), BLANK);
    }
}
