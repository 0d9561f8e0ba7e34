//! Mapping between the model's coordinate space and the screen

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A screen or image size in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenSize {
    pub width: u32,
    pub height: u32,
}

impl ScreenSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn ratio(&self) -> f64 {
        self.width as f64 / self.height as f64
    }
}

impl fmt::Display for ScreenSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl FromStr for ScreenSize {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (w, h) = s
            .split_once(['x', 'X'])
            .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{}'", s))?;
        let width = w.trim().parse().map_err(|_| format!("bad width in '{}'", s))?;
        let height = h.trim().parse().map_err(|_| format!("bad height in '{}'", s))?;
        if width == 0 || height == 0 {
            return Err(format!("screen size must be non-zero, got '{}'", s));
        }
        Ok(Self { width, height })
    }
}

/// A resolution screenshots are shrunk to before they reach the model
///
/// Shrinking locally keeps the mapping between the model's coordinates and
/// the screen exact; the provider would otherwise resize large images on
/// its own.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScalingTarget {
    pub name: &'static str,
    pub size: ScreenSize,
    pub description: &'static str,
}

impl ScalingTarget {
    const fn new(name: &'static str, width: u32, height: u32, description: &'static str) -> Self {
        Self {
            name,
            size: ScreenSize::new(width, height),
            description,
        }
    }
}

pub const SCALING_TARGETS: &[ScalingTarget] = &[
    ScalingTarget::new("1:1", 1024, 1024, "Square displays"),
    ScalingTarget::new("XGA", 1024, 768, "4:3 displays"),
    ScalingTarget::new("3:2", 1024, 682, "3:2 displays"),
    ScalingTarget::new("MBA13", 1024, 666, "13\" MacBook Air (1470x956)"),
    ScalingTarget::new("WXGA", 1280, 800, "16:10 displays"),
    ScalingTarget::new("FWXGA", 1366, 768, "~16:9 displays"),
    ScalingTarget::new("2:1", 1280, 640, "2:1 ultrawide displays"),
];

const RATIO_TOLERANCE: f64 = 0.02;

/// Pick the first target whose aspect ratio matches the screen
///
/// A matching target that is not smaller than the screen means no scaling.
pub fn select_target(screen: ScreenSize) -> Option<ScalingTarget> {
    let ratio = screen.ratio();
    SCALING_TARGETS
        .iter()
        .find(|t| (t.size.ratio() - ratio).abs() < RATIO_TOLERANCE)
        .filter(|t| t.size.width < screen.width)
        .copied()
}

/// Converts coordinates between the model's view and the screen
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scaler {
    screen: ScreenSize,
    target: Option<ScalingTarget>,
}

impl Scaler {
    pub fn new(screen: ScreenSize) -> Self {
        let target = select_target(screen);
        if target.is_none() {
            tracing::warn!(
                "No scaling target for display {} (ratio {:.3}); screenshots go out at full resolution and the provider may resize them",
                screen,
                screen.ratio()
            );
        }
        Self { screen, target }
    }

    pub fn screen(&self) -> ScreenSize {
        self.screen
    }

    pub fn target(&self) -> Option<ScalingTarget> {
        self.target
    }

    /// Size of the images the model sees, and of its coordinate space
    pub fn api_size(&self) -> ScreenSize {
        self.target.map(|t| t.size).unwrap_or(self.screen)
    }

    /// Map a model coordinate onto the screen, rejecting points outside its view
    pub fn to_screen(&self, x: i64, y: i64) -> Result<(i64, i64), String> {
        let max = self.api_size();
        if x < 0 || y < 0 || x > max.width as i64 || y > max.height as i64 {
            return Err(format!(
                "Coordinates ({}, {}) are out of bounds (max {})",
                x, y, max
            ));
        }
        Ok(match self.target {
            None => (x, y),
            Some(t) => (
                scale(x, self.screen.width, t.size.width),
                scale(y, self.screen.height, t.size.height),
            ),
        })
    }

    /// Map a screen coordinate into the model's view
    pub fn to_api(&self, x: i64, y: i64) -> (i64, i64) {
        match self.target {
            None => (x, y),
            Some(t) => (
                scale(x, t.size.width, self.screen.width),
                scale(y, t.size.height, self.screen.height),
            ),
        }
    }
}

/// `value * to / from`, rounded to the nearest pixel
fn scale(value: i64, to: u32, from: u32) -> i64 {
    (value as f64 * to as f64 / from as f64).round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_target() {
        let air = select_target(ScreenSize::new(1470, 956)).unwrap();
        assert_eq!(air.name, "MBA13");

        let wide = select_target(ScreenSize::new(1440, 900)).unwrap();
        assert_eq!(wide.name, "WXGA");

        // Already at or below the target width
        assert!(select_target(ScreenSize::new(1024, 768)).is_none());
        // No matching aspect ratio
        assert!(select_target(ScreenSize::new(1000, 300)).is_none());
    }

    #[test]
    fn test_no_target_passes_through() {
        let scaler = Scaler::new(ScreenSize::new(1024, 768));
        assert_eq!(scaler.api_size(), ScreenSize::new(1024, 768));
        assert_eq!(scaler.to_screen(500, 300).unwrap(), (500, 300));
        assert_eq!(scaler.to_api(500, 300), (500, 300));
    }

    #[test]
    fn test_scales_up_and_down() {
        let scaler = Scaler::new(ScreenSize::new(1470, 956));
        assert_eq!(scaler.api_size(), ScreenSize::new(1024, 666));

        let (sx, sy) = scaler.to_screen(512, 333).unwrap();
        assert!((sx - 735).abs() <= 1);
        assert!((sy - 478).abs() <= 1);

        let (ax, ay) = scaler.to_api(735, 478);
        assert!((ax - 512).abs() <= 1);
        assert!((ay - 333).abs() <= 1);
    }

    #[test]
    fn test_round_trip_within_a_pixel() {
        let scaler = Scaler::new(ScreenSize::new(2560, 1600));
        for (x, y) in [(0, 0), (100, 250), (1279, 799), (640, 400)] {
            let (sx, sy) = scaler.to_screen(x, y).unwrap();
            let (bx, by) = scaler.to_api(sx, sy);
            assert!((bx - x).abs() <= 1 && (by - y).abs() <= 1, "{:?}", (x, y));
        }
    }

    #[test]
    fn test_out_of_bounds() {
        let scaler = Scaler::new(ScreenSize::new(1470, 956));
        let err = scaler.to_screen(2000, 10).unwrap_err();
        assert_eq!(err, "Coordinates (2000, 10) are out of bounds (max 1024x666)");
        assert!(scaler.to_screen(-1, 10).is_err());
    }

    #[test]
    fn test_parse_screen_size() {
        assert_eq!("1470x956".parse::<ScreenSize>().unwrap(), ScreenSize::new(1470, 956));
        assert!("1470".parse::<ScreenSize>().is_err());
        assert!("0x956".parse::<ScreenSize>().is_err());
    }
}
