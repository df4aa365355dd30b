use geo::{Area, ConvexHull};
use geo_types::{Coord, LineString, MultiPoint, Point as GeoPoint, Polygon};
use image::{imageops, GrayImage, Luma};
use imageproc::{
    contours::{find_contours, BorderType},
    drawing::draw_polygon_mut,
    point::Point,
};

use crate::types::{Mask, Rect, FOREGROUND};

/// Closed boundary of one foreground region
#[derive(Debug, Clone, PartialEq)]
pub struct Contour {
    points: Vec<Point<i32>>,
}

impl Contour {
    pub fn new(points: Vec<Point<i32>>) -> Self {
        Self { points }
    }

    pub fn to_geo_polygon(&self) -> Polygon<f64> {
        let coords: Vec<Coord<f64>> = self
            .points
            .iter()
            .map(|p| Coord { x: p.x as f64, y: p.y as f64 })
            .collect();
        Polygon::new(LineString::new(coords), vec![])
    }

    /// Enclosed polygon area of the boundary points (shoelace, pixel centers)
    pub fn area(&self) -> f64 {
        if self.points.len() < 3 {
            return 0.0;
        }
        self.to_geo_polygon().unsigned_area()
    }

    /// Smallest axis-aligned rectangle covering every boundary pixel
    pub fn bounding_rect(&self) -> Rect {
        let (mut min_x, mut min_y) = (i32::MAX, i32::MAX);
        let (mut max_x, mut max_y) = (i32::MIN, i32::MIN);
        for p in &self.points {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }
        if self.points.is_empty() {
            return Rect { x: 0, y: 0, width: 0, height: 0 };
        }
        Rect {
            x: min_x.max(0) as u32,
            y: min_y.max(0) as u32,
            width: (max_x - min_x + 1) as u32,
            height: (max_y - min_y + 1) as u32,
        }
    }

    /// Convex hull of the boundary points
    pub fn convex_hull(&self) -> Contour {
        let points: MultiPoint<f64> = self
            .points
            .iter()
            .map(|p| GeoPoint::new(p.x as f64, p.y as f64))
            .collect();
        let hull = points.convex_hull();
        let mut hull_points: Vec<Point<i32>> = hull
            .exterior()
            .coords()
            .map(|c| Point::new(c.x.round() as i32, c.y.round() as i32))
            .collect();
        // geo closes the ring explicitly
        if hull_points.len() > 1 && hull_points.first() == hull_points.last() {
            hull_points.pop();
        }
        Contour::new(hull_points)
    }

    /// Filled raster of the region, boundary included
    pub fn rasterize(&self, width: u32, height: u32) -> Mask {
        rasterize_polygon(&self.points, width, height)
    }
}

/// Outermost boundaries of the foreground regions; holes and nested regions are skipped.
///
/// The tracer is run on a copy with a one-pixel background frame, otherwise a
/// region covering pixel (0, 0) is reported as a hole of the image border.
pub fn external_contours(mask: &Mask) -> Vec<Contour> {
    let (width, height) = mask.dimensions();
    let mut framed = GrayImage::new(width + 2, height + 2);
    imageops::replace(&mut framed, mask.as_gray(), 1, 1);

    find_contours::<i32>(&framed)
        .into_iter()
        .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
        .map(|c| {
            Contour::new(c.points.into_iter().map(|p| Point::new(p.x - 1, p.y - 1)).collect())
        })
        .collect()
}

/// Contour with the largest area; the earliest one wins a tie
pub fn largest(contours: &[Contour]) -> Option<(&Contour, f64)> {
    contours
        .iter()
        .map(|c| (c, c.area()))
        .reduce(|best, next| if next.1 > best.1 { next } else { best })
}

/// Fill a closed polygon onto an empty mask, boundary included
pub fn rasterize_polygon(points: &[Point<i32>], width: u32, height: u32) -> Mask {
    let mut canvas = Mask::new(width, height).into_gray();

    let mut poly: Vec<Point<i32>> = Vec::with_capacity(points.len());
    for &p in points {
        if poly.last() != Some(&p) {
            poly.push(p);
        }
    }
    while poly.len() > 1 && poly.first() == poly.last() {
        poly.pop();
    }

    if poly.len() >= 3 {
        draw_polygon_mut(&mut canvas, &poly, Luma([FOREGROUND]));
    } else {
        for p in &poly {
            if p.x >= 0 && p.y >= 0 && (p.x as u32) < width && (p.y as u32) < height {
                canvas.put_pixel(p.x as u32, p.y as u32, Luma([FOREGROUND]));
            }
        }
        if let [a, b] = poly[..] {
            imageproc::drawing::draw_line_segment_mut(
                &mut canvas,
                (a.x as f32, a.y as f32),
                (b.x as f32, b.y as f32),
                Luma([FOREGROUND]),
            );
        }
    }

    Mask::from_gray(canvas)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect_mask(size: u32, x0: u32, y0: u32, x1: u32, y1: u32) -> Mask {
        Mask::from_fn(size, size, |x, y| x >= x0 && x < x1 && y >= y0 && y < y1)
    }

    #[test]
    fn test_external_contours_skip_holes() {
        let mut mask = rect_mask(50, 10, 10, 40, 40);
        let hole = rect_mask(50, 20, 20, 30, 30);
        for p in hole.foreground_points() {
            mask.as_raw_mut()[(p.y * 50 + p.x) as usize] = 0;
        }
        let contours = external_contours(&mask);
        assert_eq!(contours.len(), 1);
    }

    #[test]
    fn test_area_and_bounds_of_rectangle() {
        let mask = rect_mask(50, 10, 5, 30, 25);
        let contours = external_contours(&mask);
        let (largest, area) = largest(&contours).expect("one contour");
        assert_eq!(area, 19.0 * 19.0);
        assert_eq!(largest.bounding_rect(), Rect { x: 10, y: 5, width: 20, height: 20 });
    }

    #[test]
    fn test_largest_picks_bigger_region() {
        let mut mask = rect_mask(60, 2, 2, 10, 10);
        mask.union_with(&rect_mask(60, 20, 20, 50, 50)).expect("same size");
        let contours = external_contours(&mask);
        assert_eq!(contours.len(), 2);
        let (big, _) = largest(&contours).expect("non-empty");
        assert_eq!(big.bounding_rect().x, 20);
    }

    #[test]
    fn test_rasterize_round_trips_region_and_fills_holes() {
        let mut mask = rect_mask(40, 5, 5, 35, 30);
        mask.as_raw_mut()[(15 * 40 + 15) as usize] = 0;
        let contours = external_contours(&mask);
        let (contour, _) = largest(&contours).expect("non-empty");

        let filled = contour.rasterize(40, 40);
        assert_eq!(filled.foreground_count(), 30 * 25);
        assert!(filled.is_set(15, 15));
    }

    #[test]
    fn test_convex_hull_covers_concave_region() {
        // L-shape
        let mut mask = rect_mask(40, 5, 5, 15, 35);
        mask.union_with(&rect_mask(40, 5, 25, 35, 35)).expect("same size");
        let contours = external_contours(&mask);
        let (contour, area) = largest(&contours).expect("non-empty");

        let hull = contour.convex_hull();
        assert!(hull.area() > area);
        let hull_mask = hull.rasterize(40, 40);
        assert!(hull_mask.is_set(20, 20));
        assert!(!contour.rasterize(40, 40).is_set(20, 20));
    }

    #[test]
    fn test_regions_on_the_image_border_are_found() {
        let corner = Mask::from_fn(10, 10, |x, y| x < 4 && y < 4);
        let contours = external_contours(&corner);
        assert_eq!(contours.len(), 1);
        let (contour, area) = largest(&contours).expect("origin region");
        assert_eq!(area, 9.0);
        assert_eq!(contour.bounding_rect(), Rect { x: 0, y: 0, width: 4, height: 4 });
        assert_eq!(contour.rasterize(10, 10), corner);

        let strip = Mask::from_fn(20, 20, |x, _| x < 5);
        let contours = external_contours(&strip);
        assert_eq!(contours.len(), 1);
        assert_eq!(contours[0].bounding_rect(), Rect { x: 0, y: 0, width: 5, height: 20 });

        let full = Mask::from_fn(6, 6, |_, _| true);
        let contours = external_contours(&full);
        assert_eq!(contours.len(), 1);
        assert_eq!(contours[0].area(), 25.0);
    }

    #[test]
    fn test_degenerate_contours() {
        let mut mask = Mask::new(10, 10);
        mask.set(3, 3);
        let contours = external_contours(&mask);
        assert_eq!(contours.len(), 1);
        assert_eq!(contours[0].area(), 0.0);
        assert_eq!(contours[0].rasterize(10, 10).foreground_count(), 1);
        assert!(external_contours(&Mask::new(10, 10)).is_empty());
    }
}
