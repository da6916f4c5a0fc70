use imageproc::geometry::min_area_rect;
use imageproc::point::Point;
use imageproc::rect::Rect;

use crate::config::GeometryBounds;

/// Minimum-area rectangle around a contour, possibly rotated.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RotatedRect {
    pub center: (f32, f32),
    pub size: (f32, f32),
    /// Angle of the first edge against the x axis, in degrees.
    pub angle: f32,
}

impl RotatedRect {
    /// Builds the rotated rectangle from corners given in order around the
    /// perimeter.
    pub fn from_corners(corners: &[Point<i32>; 4]) -> Self {
        let (sx, sy) = corners
            .iter()
            .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x as f32, sy + p.y as f32));
        let edge = |a: &Point<i32>, b: &Point<i32>| ((b.x - a.x) as f32, (b.y - a.y) as f32);
        let (wx, wy) = edge(&corners[0], &corners[1]);
        let (hx, hy) = edge(&corners[1], &corners[2]);
        RotatedRect {
            center: (sx / 4.0, sy / 4.0),
            size: (wx.hypot(wy), hx.hypot(hy)),
            angle: wy.atan2(wx).to_degrees(),
        }
    }

    pub fn of_contour(points: &[Point<i32>]) -> Self {
        Self::from_corners(&min_area_rect(points))
    }
}

/// Whether a `width` x `height` rectangle looks like a plate.
///
/// All bounds are exclusive and the aspect is height over width.
pub fn is_plausible_plate_shape(width: u32, height: u32, bounds: &GeometryBounds) -> bool {
    if width == 0 || height == 0 {
        return false;
    }
    let aspect = height as f32 / width as f32;
    (width > bounds.min_width && width < bounds.max_width)
        && (height > bounds.min_height && height < bounds.max_height)
        && (aspect > bounds.min_aspect && aspect < bounds.max_aspect)
}

/// Smallest axis-aligned rectangle holding every point.
pub fn bounding_rect(points: &[Point<i32>]) -> Option<Rect> {
    let first = points.first()?;
    let (mut x0, mut y0, mut x1, mut y1) = (first.x, first.y, first.x, first.y);
    for p in &points[1..] {
        x0 = x0.min(p.x);
        y0 = y0.min(p.y);
        x1 = x1.max(p.x);
        y1 = y1.max(p.y);
    }
    Some(Rect::at(x0, y0).of_size((x1 - x0 + 1) as u32, (y1 - y0 + 1) as u32))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn accepts_inside_bounds() {
        let bounds = GeometryBounds::default();
        assert!(is_plausible_plate_shape(100, 30, &bounds));
        assert!(is_plausible_plate_shape(61, 19, &bounds));
        assert!(is_plausible_plate_shape(179, 79, &bounds));
    }

    #[test]
    fn boundaries_are_excluded() {
        let bounds = GeometryBounds::default();
        assert!(!is_plausible_plate_shape(60, 30, &bounds));
        assert!(!is_plausible_plate_shape(180, 30, &bounds));
        assert!(!is_plausible_plate_shape(100, 18, &bounds));
        assert!(!is_plausible_plate_shape(150, 80, &bounds));
        assert!(!is_plausible_plate_shape(0, 30, &bounds));
        assert!(!is_plausible_plate_shape(100, 0, &bounds));
    }

    #[test]
    fn aspect_is_height_over_width() {
        let bounds = GeometryBounds {
            min_aspect: 0.25,
            max_aspect: 0.5,
            ..Default::default()
        };
        // 30 / 100 = 0.3
        assert!(is_plausible_plate_shape(100, 30, &bounds));
        // exactly 0.25 and 0.5
        assert!(!is_plausible_plate_shape(100, 25, &bounds));
        assert!(!is_plausible_plate_shape(100, 50, &bounds));
        // wide plates are not accepted through the inverse ratio
        assert!(!is_plausible_plate_shape(70, 60, &bounds));
    }

    #[test]
    fn bounding_rect_covers_points() {
        let points = [Point::new(5, 7), Point::new(20, 3), Point::new(9, 12)];
        let rect = bounding_rect(&points).unwrap();
        assert_eq!((rect.left(), rect.top()), (5, 3));
        assert_eq!((rect.width(), rect.height()), (16, 10));
        assert!(bounding_rect(&[]).is_none());
    }

    #[test]
    fn rotated_rect_from_axis_aligned_corners() {
        let corners = [Point::new(0, 0), Point::new(10, 0), Point::new(10, 4), Point::new(0, 4)];
        let rect = RotatedRect::from_corners(&corners);
        assert_eq!(rect.center, (5.0, 2.0));
        assert_eq!(rect.size, (10.0, 4.0));
        assert_eq!(rect.angle, 0.0);
    }
}
