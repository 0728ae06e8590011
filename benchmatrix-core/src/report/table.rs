//! Box-drawn text tables that can be read back

use std::io::Write;

const VERTICAL: char = '│';

pub struct TableBuilder {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
    column_widths: Vec<usize>,
    use_color: bool,
}

impl TableBuilder {
    #[must_use]
    pub fn new(headers: Vec<String>) -> Self {
        let column_widths = headers.iter().map(|h| h.chars().count()).collect();

        Self {
            headers,
            rows: Vec::new(),
            column_widths,
            use_color: false,
        }
    }

    /// Bold cyan headers; never used for files
    #[must_use]
    pub const fn with_color(mut self, use_color: bool) -> Self {
        self.use_color = use_color;
        self
    }

    pub fn add_row(&mut self, row: Vec<String>) {
        for (i, cell) in row.iter().enumerate() {
            if let Some(width) = self.column_widths.get_mut(i) {
                *width = (*width).max(cell.chars().count());
            }
        }
        self.rows.push(row);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn render<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        self.write_border(writer, '┌', '┬', '┐')?;
        self.write_row(writer, &self.headers, true)?;
        self.write_border(writer, '├', '┼', '┤')?;
        for row in &self.rows {
            self.write_row(writer, row, false)?;
        }
        self.write_border(writer, '└', '┴', '┘')?;
        Ok(())
    }

    fn write_border<W: Write>(
        &self,
        writer: &mut W,
        left: char,
        mid: char,
        right: char,
    ) -> std::io::Result<()> {
        write!(writer, "{left}")?;
        for (i, &width) in self.column_widths.iter().enumerate() {
            write!(writer, "{}", "─".repeat(width + 2))?;
            if i + 1 < self.column_widths.len() {
                write!(writer, "{mid}")?;
            }
        }
        writeln!(writer, "{right}")
    }

    fn write_row<W: Write>(
        &self,
        writer: &mut W,
        cells: &[String],
        is_header: bool,
    ) -> std::io::Result<()> {
        write!(writer, "{VERTICAL}")?;
        for (i, &width) in self.column_widths.iter().enumerate() {
            let cell = cells.get(i).map_or("", String::as_str);
            if is_header && self.use_color {
                write!(writer, " \x1b[1;36m{cell:<width$}\x1b[0m {VERTICAL}")?;
            } else {
                write!(writer, " {cell:<width$} {VERTICAL}")?;
            }
        }
        writeln!(writer)
    }
}

/// Header and data rows of the first box-drawn table in `text`
#[must_use]
pub fn parse_first_table(text: &str) -> Option<(Vec<String>, Vec<Vec<String>>)> {
    let mut lines = text
        .lines()
        .skip_while(|line| !line.starts_with('┌'))
        .skip(1);

    let headers = split_cells(lines.next()?)?;
    let mut rows = Vec::new();
    for line in lines {
        if line.starts_with('├') {
            continue;
        }
        if line.starts_with('└') {
            return Some((headers, rows));
        }
        rows.push(split_cells(line)?);
    }
    None
}

fn split_cells(line: &str) -> Option<Vec<String>> {
    let inner = line.strip_prefix(VERTICAL)?.strip_suffix(VERTICAL)?;
    Some(
        inner
            .split(VERTICAL)
            .map(|cell| strip_ansi(cell).trim().to_string())
            .collect(),
    )
}

fn strip_ansi(cell: &str) -> String {
    cell.replace("\x1b[1;36m", "").replace("\x1b[0m", "")
}
