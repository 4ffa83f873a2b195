//! Web Mercator lon/lat to pixel mapping for the global rasters.
//!
//! The images span the full ±180° longitude range horizontally. Their
//! latitude extent is not published; it follows from the pixel aspect ratio
//! (height/width × the full horizontal extent in Mercator units), which for
//! the source rasters cuts off near ±70°.

use image::RgbaImage;
use std::f64::consts::{FRAC_PI_4, PI};

/// Latitudes are clamped to this before projecting
pub const MAX_PROJECTED_LAT: f64 = 85.0;

/// Pixels with alpha below this carry no data
pub const ALPHA_THRESHOLD: u8 = 16;

/// Mercator northing in radians-equivalent units
#[must_use]
pub fn mercator_y(latitude_deg: f64) -> f64 {
    let lat = latitude_deg.clamp(-MAX_PROJECTED_LAT, MAX_PROJECTED_LAT).to_radians();
    (FRAC_PI_4 + lat / 2.0).tan().ln()
}

/// Apparent latitude cutoff in degrees for an image of the given size
#[must_use]
pub fn latitude_extent(width: u32, height: u32) -> f64 {
    if width == 0 {
        return 0.0;
    }
    let half_extent = PI * f64::from(height) / f64::from(width);
    half_extent.sinh().atan().to_degrees()
}

/// Pixel holding the given position, `None` when it falls outside the image
#[must_use]
pub fn lonlat_to_pixel(longitude: f64, latitude: f64, width: u32, height: u32) -> Option<(u32, u32)> {
    if width == 0 || height == 0 || !longitude.is_finite() || !latitude.is_finite() {
        return None;
    }

    let w = f64::from(width);
    let h = f64::from(height);

    let x = ((longitude + 180.0) / 360.0 * w).floor();
    if !(0.0..=w).contains(&x) {
        return None;
    }
    // lon = 180 lands exactly on the right edge
    let x = x.min(w - 1.0);

    let y = (h / 2.0 - mercator_y(latitude) * w / (2.0 * PI)).floor();
    if !(0.0..h).contains(&y) {
        return None;
    }

    Some((x as u32, y as u32))
}

/// Opaque RGB color at a position, `None` for out-of-bounds or transparent pixels
#[must_use]
pub fn read_pixel(image: &RgbaImage, longitude: f64, latitude: f64) -> Option<[u8; 3]> {
    let (x, y) = lonlat_to_pixel(longitude, latitude, image.width(), image.height())?;
    let [r, g, b, a] = image.get_pixel(x, y).0;
    if a < ALPHA_THRESHOLD {
        return None;
    }
    Some([r, g, b])
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    const WIDTH: u32 = 1024;
    const HEIGHT: u32 = 566;

    #[test]
    fn test_aspect_ratio_gives_seventy_degree_cutoff() {
        let extent = latitude_extent(WIDTH, HEIGHT);
        assert!((69.5..70.5).contains(&extent), "extent {extent}");
    }

    #[test]
    fn test_equator_and_prime_meridian_at_center() {
        let (x, y) = lonlat_to_pixel(0.0, 0.0, WIDTH, HEIGHT).unwrap();
        assert_eq!(x, 512);
        assert!((282..=283).contains(&y));
    }

    #[test]
    fn test_longitude_edges() {
        assert_eq!(lonlat_to_pixel(-180.0, 0.0, WIDTH, HEIGHT).map(|p| p.0), Some(0));
        assert_eq!(lonlat_to_pixel(180.0, 0.0, WIDTH, HEIGHT).map(|p| p.0), Some(WIDTH - 1));
    }

    #[test]
    fn test_north_is_up() {
        let (_, y_north) = lonlat_to_pixel(0.0, 50.0, WIDTH, HEIGHT).unwrap();
        let (_, y_south) = lonlat_to_pixel(0.0, -50.0, WIDTH, HEIGHT).unwrap();
        assert!(y_north < 283);
        assert!(y_south > 283);
    }

    #[test]
    fn test_beyond_apparent_cutoff_is_out_of_bounds() {
        assert!(lonlat_to_pixel(0.0, 69.0, WIDTH, HEIGHT).is_some());
        assert!(lonlat_to_pixel(0.0, 75.0, WIDTH, HEIGHT).is_none());
        assert!(lonlat_to_pixel(0.0, -89.0, WIDTH, HEIGHT).is_none());
    }

    #[test]
    fn test_latitude_clamped_before_projecting() {
        assert_eq!(mercator_y(90.0), mercator_y(85.0));
        assert!(mercator_y(90.0).is_finite());
    }

    #[test]
    fn test_read_pixel_respects_alpha() {
        let mut image = RgbaImage::from_pixel(WIDTH, HEIGHT, Rgba([255, 0, 0, 255]));
        assert_eq!(read_pixel(&image, 0.0, 0.0), Some([255, 0, 0]));

        let (x, y) = lonlat_to_pixel(10.0, 20.0, WIDTH, HEIGHT).unwrap();
        image.put_pixel(x, y, Rgba([255, 0, 0, 10]));
        assert_eq!(read_pixel(&image, 10.0, 20.0), None);
        assert_eq!(read_pixel(&image, 0.0, 80.0), None);
    }
}
