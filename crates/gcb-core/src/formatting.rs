//! Formatting utilities (Telegram HTML escaping, star ratings).

pub const STAR_FULL: char = '🌑';
pub const STAR_HALF: char = '🌓';
pub const STAR_FILL: char = '🌕';

const STAR_WIDTH: usize = 5;

/// Escape HTML special characters for Telegram HTML parse mode.
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Render a 0–5 difficulty/terrain value as a fixed-width row of moon symbols.
///
/// Example: 3.5 -> 🌑🌑🌑🌓🌕
pub fn star_rating(value: f32) -> String {
    let halves = (value.clamp(0.0, STAR_WIDTH as f32) * 2.0).round() as usize;
    let full = halves / 2;
    let half = halves % 2;

    let mut out = String::with_capacity(STAR_WIDTH * 4);
    out.extend(std::iter::repeat(STAR_FULL).take(full));
    out.extend(std::iter::repeat(STAR_HALF).take(half));
    out.extend(std::iter::repeat(STAR_FILL).take(STAR_WIDTH - full - half));
    out
}
