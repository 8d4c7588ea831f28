use chrono::Duration;
use ratatui::prelude::*;

/// Truncate to at most `max_len` chars, ending in "..." when cut
pub fn truncate(s: &str, max_len: usize) -> String {
  if s.chars().count() <= max_len {
    s.to_string()
  } else {
    let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
    format!("{}...", kept)
  }
}

/// Short relative age: "just now", "5m ago", "2h ago", "3d ago"
pub fn format_age(age: Duration) -> String {
  let seconds = age.num_seconds().max(0);
  match seconds {
    0..=59 => "just now".to_string(),
    60..=3599 => format!("{}m ago", seconds / 60),
    3600..=86399 => format!("{}h ago", seconds / 3600),
    _ => format!("{}d ago", seconds / 86400),
  }
}

/// Compact number for chart labels
pub fn format_value(value: f64) -> String {
  if value.abs() >= 1000.0 {
    format!("{:.0}", value)
  } else if value.abs() >= 10.0 {
    format!("{:.1}", value)
  } else {
    format!("{:.2}", value)
  }
}

/// A rect of the given size centered in `area`, clipped to it
pub fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
  let width = width.min(area.width);
  let height = height.min(area.height);
  Rect::new(
    area.x + (area.width - width) / 2,
    area.y + (area.height - height) / 2,
    width,
    height,
  )
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_truncate_short_string() {
    assert_eq!(truncate("BEA001", 10), "BEA001");
  }

  #[test]
  fn test_truncate_exact_length() {
    assert_eq!(truncate("hello", 5), "hello");
  }

  #[test]
  fn test_truncate_long_string() {
    assert_eq!(truncate("Spruce sawdust 500C", 8), "Spruc...");
    assert_eq!(truncate("Érable rouge", 6), "Éra...");
  }

  #[test]
  fn test_format_age() {
    assert_eq!(format_age(Duration::seconds(12)), "just now");
    assert_eq!(format_age(Duration::seconds(-3)), "just now");
    assert_eq!(format_age(Duration::minutes(5)), "5m ago");
    assert_eq!(format_age(Duration::hours(2)), "2h ago");
    assert_eq!(format_age(Duration::days(3)), "3d ago");
  }

  #[test]
  fn test_format_value() {
    assert_eq!(format_value(1234.4), "1234");
    assert_eq!(format_value(455.0), "455.0");
    assert_eq!(format_value(0.4123), "0.41");
  }

  #[test]
  fn test_centered_rect() {
    let area = Rect::new(0, 0, 100, 40);
    assert_eq!(centered_rect(50, 10, area), Rect::new(25, 15, 50, 10));
    assert_eq!(centered_rect(200, 10, area).width, 100);
  }
}
