//! Pure dimension math for thumbnails

use crate::config::ImageBounds;

/// Largest size with the source aspect ratio that fits inside `bounds`.
///
/// Images already inside the box keep their size. Each side is at least 1.
pub fn fit_within(source: (u32, u32), bounds: ImageBounds) -> (u32, u32) {
    let (width, height) = source;
    if width == 0 || height == 0 {
        return (width.max(1), height.max(1));
    }
    if width <= bounds.width && height <= bounds.height {
        return source;
    }

    let scale = f64::min(
        bounds.width as f64 / width as f64,
        bounds.height as f64 / height as f64,
    );
    let scaled = |side: u32| ((side as f64 * scale).round() as u32).max(1);
    (
        scaled(width).min(bounds.width),
        scaled(height).min(bounds.height),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOX: ImageBounds = ImageBounds {
        width: 200,
        height: 300,
    };

    #[test]
    fn test_landscape_limited_by_width() {
        assert_eq!(fit_within((800, 600), BOX), (200, 150));
    }

    #[test]
    fn test_portrait_limited_by_height() {
        assert_eq!(fit_within((300, 900), BOX), (100, 300));
    }

    #[test]
    fn test_exact_ratio() {
        assert_eq!(fit_within((400, 600), BOX), (200, 300));
    }

    #[test]
    fn test_never_upscales() {
        assert_eq!(fit_within((50, 40), BOX), (50, 40));
        assert_eq!(fit_within((200, 300), BOX), (200, 300));
    }

    #[test]
    fn test_extreme_ratio_keeps_one_pixel() {
        assert_eq!(fit_within((10_000, 1), BOX), (200, 1));
    }
}
