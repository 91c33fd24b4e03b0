//! Delimiter-separated row formatting into caller-provided buffers.

use core::fmt::{self, Write};

/// Separator placed between columns of headers and rows
pub const DELIMITER: &str = ",";

/// Writes whole columns into a byte buffer.
///
/// A column that does not fit is rolled back completely and every later
/// column is refused, so the output always ends on a column boundary and
/// never runs past the buffer.
pub struct ColumnWriter<'a> {
    buf: &'a mut [u8],
    len: usize,
    columns: usize,
    truncated: bool,
}

impl<'a> ColumnWriter<'a> {
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self {
            buf,
            len: 0,
            columns: 0,
            truncated: false,
        }
    }

    /// Append one column. Returns `false` once the buffer has run out.
    pub fn push_column(&mut self, column: fmt::Arguments<'_>) -> bool {
        if self.truncated {
            return false;
        }

        let start = self.len;
        let delimited = if self.columns > 0 {
            self.write_str(DELIMITER)
        } else {
            Ok(())
        };

        if delimited.and_then(|_| self.write_fmt(column)).is_err() {
            self.len = start;
            self.truncated = true;
            return false;
        }

        self.columns += 1;
        true
    }

    /// Bytes written so far
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of complete columns written
    pub fn columns(&self) -> usize {
        self.columns
    }

    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    pub fn as_str(&self) -> &str {
        // Only whole `&str` writes are ever committed, so this is always UTF-8
        core::str::from_utf8(&self.buf[..self.len]).unwrap_or_default()
    }
}

impl Write for ColumnWriter<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let end = self.len + s.len();
        if end > self.buf.len() {
            return Err(fmt::Error);
        }
        self.buf[self.len..end].copy_from_slice(s.as_bytes());
        self.len = end;
        Ok(())
    }
}
