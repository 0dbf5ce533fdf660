//! Progress parsing for removal backends.

use serde::{Deserialize, Serialize};

/// Parse a percentage from a line of remover output.
///
/// Accepts `progress=42`, `progress: 42`, `progress=42%`, `42%` and `42.5%` (case-insensitive
/// key, surrounding whitespace ignored). Values above 100 are clamped.
pub fn parse_percent(line: &str) -> Option<u8> {
    let line = line.trim();

    let number = match line.split_once(['=', ':']) {
        Some((key, value)) => {
            if !key.trim().eq_ignore_ascii_case("progress") {
                return None;
            }
            value.trim().trim_end_matches('%').trim()
        }
        None => line.strip_suffix('%')?.trim(),
    };

    let value: f64 = number.parse().ok()?;
    if !value.is_finite() || value < 0.0 {
        return None;
    }
    Some(value.min(100.0) as u8)
}

/// Progress information from FFmpeg's `-progress` output.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FfmpegProgress {
    /// Current frame number
    pub frame: u64,
    /// Output time in milliseconds
    pub out_time_ms: i64,
    /// Encoding speed (e.g., 1.5 = 1.5x realtime)
    pub speed: f64,
    /// Whether encoding is complete
    pub is_complete: bool,
}

impl FfmpegProgress {
    /// Calculate progress percentage given total duration in milliseconds.
    pub fn percentage(&self, total_duration_ms: i64) -> f64 {
        if total_duration_ms <= 0 {
            return 0.0;
        }
        ((self.out_time_ms as f64 / total_duration_ms as f64) * 100.0).clamp(0.0, 100.0)
    }

    /// Feed one `key=value` line. Returns true when a progress block ends.
    pub fn apply_line(&mut self, line: &str) -> bool {
        let Some((key, value)) = line.trim().split_once('=') else {
            return false;
        };
        match key {
            "out_time_us" => {
                if let Ok(us) = value.parse::<i64>() {
                    self.out_time_ms = us / 1000;
                }
            }
            // FFmpeg reports microseconds under this key too.
            "out_time_ms" => {
                if let Ok(us) = value.parse::<i64>() {
                    self.out_time_ms = us / 1000;
                }
            }
            "frame" => {
                if let Ok(frame) = value.parse() {
                    self.frame = frame;
                }
            }
            "speed" => {
                if let Some(speed) = value.strip_suffix('x').and_then(|s| s.trim().parse().ok()) {
                    self.speed = speed;
                }
            }
            "progress" => {
                if value == "end" {
                    self.is_complete = true;
                }
                return true;
            }
            _ => {}
        }
        false
    }

    /// Whether a line belongs to FFmpeg's `-progress` key/value stream.
    pub fn is_progress_line(line: &str) -> bool {
        line.trim()
            .split_once('=')
            .map(|(key, _)| !key.is_empty() && key.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_'))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_percent_formats() {
        assert_eq!(parse_percent("progress=42"), Some(42));
        assert_eq!(parse_percent("  PROGRESS: 7 "), Some(7));
        assert_eq!(parse_percent("progress=55%"), Some(55));
        assert_eq!(parse_percent("63%"), Some(63));
        assert_eq!(parse_percent("12.9%"), Some(12));
        assert_eq!(parse_percent("progress=250"), Some(100));
    }

    #[test]
    fn test_parse_percent_keyed_value_with_percent_sign() {
        assert_eq!(parse_percent("progress=55%"), Some(55));
        assert_eq!(parse_percent("Progress: 80 %"), Some(80));
        assert_eq!(parse_percent("progress=100%"), Some(100));
        assert_eq!(parse_percent("eta: 40%"), None);
    }

    #[test]
    fn test_parse_percent_ignores_noise() {
        assert_eq!(parse_percent("Loading model weights..."), None);
        assert_eq!(parse_percent("frame=120"), None);
        assert_eq!(parse_percent("progress=abc"), None);
        assert_eq!(parse_percent("-5%"), None);
        assert_eq!(parse_percent(""), None);
    }

    #[test]
    fn test_ffmpeg_progress_block() {
        let mut progress = FfmpegProgress::default();

        assert!(!progress.apply_line("frame=240"));
        assert!(!progress.apply_line("out_time_us=5000000"));
        assert!(!progress.apply_line("speed=1.5x"));
        assert!(progress.apply_line("progress=continue"));

        assert_eq!(progress.frame, 240);
        assert_eq!(progress.out_time_ms, 5000);
        assert!((progress.speed - 1.5).abs() < 0.01);
        assert!(!progress.is_complete);

        assert!(progress.apply_line("progress=end"));
        assert!(progress.is_complete);
    }

    #[test]
    fn test_progress_percentage() {
        let progress = FfmpegProgress {
            out_time_ms: 5000,
            ..Default::default()
        };

        assert!((progress.percentage(10000) - 50.0).abs() < 0.01);
        assert!((progress.percentage(2500) - 100.0).abs() < 0.01);
        assert_eq!(progress.percentage(0), 0.0);
    }

    #[test]
    fn test_is_progress_line() {
        assert!(FfmpegProgress::is_progress_line("out_time_us=100"));
        assert!(FfmpegProgress::is_progress_line("progress=end"));
        assert!(!FfmpegProgress::is_progress_line("Error opening input file"));
        assert!(!FfmpegProgress::is_progress_line("[h264 @ 0x55] error=bad"));
    }
}
