//! Horizontal alignment and vertical spacing of rendered rows.

use crate::options::HorizontalAlign;
use unicode_width::UnicodeWidthStr;

/// Pad `row` on the left so it sits at `align` within `width` display columns.
///
/// Rows wider than `width` are returned unchanged. No trailing padding is added.
#[must_use]
pub fn align_row(row: &str, align: HorizontalAlign, width: usize) -> String {
    let free = width.saturating_sub(row.width());
    let padding = match align {
        HorizontalAlign::Left => 0,
        HorizontalAlign::Center => free / 2,
        HorizontalAlign::Right => free,
    };

    let mut aligned = String::with_capacity(padding + row.len());
    aligned.extend(std::iter::repeat(' ').take(padding));
    aligned.push_str(row);
    aligned
}

/// Join aligned rows and append `vertical_spacing` blank rows.
#[must_use]
pub fn compose_block<S: AsRef<str>>(
    rows: &[S],
    align: HorizontalAlign,
    width: usize,
    vertical_spacing: usize,
) -> String {
    let mut block = rows
        .iter()
        .map(|row| align_row(row.as_ref(), align, width))
        .collect::<Vec<_>>()
        .join("\n");
    block.extend(std::iter::repeat('\n').take(vertical_spacing));
    block
}
