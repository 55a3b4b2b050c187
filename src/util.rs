//! Small utility helpers used across modules.

/// Leaderboard masking: first character followed by four asterisks.
/// A one-character name keeps that character; an empty name is all mask.
pub fn mask_display_name(name: &str) -> String {
  match name.trim().chars().next() {
    Some(first) => format!("{first}****"),
    None => "****".to_string(),
  }
}

/// Log-safe truncation for large strings.
/// Avoids spamming logs with huge response bodies.
pub fn trunc_for_log(s: &str, max: usize) -> String {
  if s.chars().count() <= max {
    s.to_string()
  } else {
    format!("{}… ({} bytes total)", s.chars().take(max).collect::<String>(), s.len())
  }
}
