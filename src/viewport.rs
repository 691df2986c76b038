//! Projection between map coordinates and terminal cells.
//!
//! The renderer and the mouse handler both go through [`Viewport`], so a
//! marker is hit-tested in exactly the cell it was drawn in.

use crate::models::{Coordinates, Place};
use ratatui::layout::Rect;

// Smallest span shown, in degrees (~1 km of latitude).
const MIN_SPAN_DEG: f64 = 0.01;
// Span around a lone point (~5 km each way).
const SINGLE_POINT_SPAN_DEG: f64 = 0.09;
const PADDING_RATIO: f64 = 0.1;

pub const TOOLTIP_HEIGHT: u16 = 4;
const TOOLTIP_MIN_WIDTH: u16 = 22;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    /// Canvas cells, borders excluded.
    pub area: Rect,
    pub min_lon: f64,
    pub max_lon: f64,
    pub min_lat: f64,
    pub max_lat: f64,
}

impl Viewport {
    /// Fits all `points`, or centers on `fallback` when there are none.
    pub fn fit(
        area: Rect,
        points: impl IntoIterator<Item = Coordinates>,
        fallback: Coordinates,
    ) -> Self {
        let mut bounds: Option<(f64, f64, f64, f64)> = None;
        for p in points {
            if !p.latitude.is_finite() || !p.longitude.is_finite() {
                continue;
            }
            bounds = Some(match bounds {
                None => (p.longitude, p.longitude, p.latitude, p.latitude),
                Some((x0, x1, y0, y1)) => (
                    x0.min(p.longitude),
                    x1.max(p.longitude),
                    y0.min(p.latitude),
                    y1.max(p.latitude),
                ),
            });
        }

        let (min_lon, max_lon, min_lat, max_lat) = match bounds {
            Some((x0, x1, y0, y1)) if x1 - x0 > 0.0 || y1 - y0 > 0.0 => {
                let pad_x = ((x1 - x0) * PADDING_RATIO).max(MIN_SPAN_DEG / 2.0);
                let pad_y = ((y1 - y0) * PADDING_RATIO).max(MIN_SPAN_DEG / 2.0);
                (x0 - pad_x, x1 + pad_x, y0 - pad_y, y1 + pad_y)
            }
            Some((x, _, y, _)) => centered(Coordinates::new(y, x)),
            None => centered(fallback),
        };

        Self {
            area,
            min_lon,
            max_lon,
            min_lat,
            max_lat,
        }
    }

    pub fn x_bounds(&self) -> [f64; 2] {
        [self.min_lon, self.max_lon]
    }

    pub fn y_bounds(&self) -> [f64; 2] {
        [self.min_lat, self.max_lat]
    }

    /// Terminal cell a coordinate is drawn in, if it lies inside the view.
    pub fn cell_of(&self, c: Coordinates) -> Option<(u16, u16)> {
        if self.area.width == 0 || self.area.height == 0 {
            return None;
        }
        if c.longitude < self.min_lon
            || c.longitude > self.max_lon
            || c.latitude < self.min_lat
            || c.latitude > self.max_lat
        {
            return None;
        }
        let fx = (c.longitude - self.min_lon) / (self.max_lon - self.min_lon);
        let fy = (self.max_lat - c.latitude) / (self.max_lat - self.min_lat);
        let col = (fx * f64::from(self.area.width - 1)) as u16;
        let row = (fy * f64::from(self.area.height - 1)) as u16;
        Some((self.area.x + col, self.area.y + row))
    }

    /// Topmost marker under the pointer, allowing one cell of slack sideways.
    pub fn marker_at<'a>(&self, col: u16, row: u16, places: &'a [Place]) -> Option<&'a Place> {
        places.iter().rev().find(|p| {
            self.cell_of(p.coordinates())
                .is_some_and(|(x, y)| y == row && x.abs_diff(col) <= 1)
        })
    }

    /// Where the tooltip for a marker at `cell` goes: above it when there is
    /// room, below otherwise, and always inside the canvas.
    pub fn tooltip_rect(&self, cell: (u16, u16), place: &Place) -> Rect {
        let wanted = (place.name.chars().count() as u16).saturating_add(4);
        let width = wanted.max(TOOLTIP_MIN_WIDTH).min(self.area.width);
        let height = TOOLTIP_HEIGHT.min(self.area.height);

        let (col, row) = cell;
        let y = if row >= self.area.y + height {
            row - height
        } else {
            (row + 1).min(self.area.bottom().saturating_sub(height))
        };
        let x = col
            .saturating_sub(width / 2)
            .max(self.area.x)
            .min(self.area.right().saturating_sub(width));

        Rect::new(x, y, width, height)
    }
}

fn centered(c: Coordinates) -> (f64, f64, f64, f64) {
    let half = SINGLE_POINT_SPAN_DEG / 2.0;
    (c.longitude - half, c.longitude + half, c.latitude - half, c.latitude + half)
}

pub fn contains(rect: Rect, col: u16, row: u16) -> bool {
    col >= rect.x && col < rect.right() && row >= rect.y && row < rect.bottom()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::OpenStatus;

    fn place(id: &str, lat: f64, lon: f64) -> Place {
        Place {
            place_id: id.to_string(),
            name: format!("Tabacaria {id}"),
            address: String::new(),
            google_rating: 4.0,
            cig_rating: 4.0,
            latitude: lat,
            longitude: lon,
            open_status: OpenStatus::Open,
            available_brands: Default::default(),
            available_accessories: Default::default(),
            reviews: Vec::new(),
        }
    }

    const AREA: Rect = Rect {
        x: 10,
        y: 2,
        width: 60,
        height: 20,
    };

    const ORIGIN: Coordinates = Coordinates::new(0.0, 0.0);

    #[test]
    fn fit_contains_every_point() {
        let places = [place("a", -22.90, -43.20), place("b", -22.95, -43.10)];
        let view = Viewport::fit(AREA, places.iter().map(Place::coordinates), ORIGIN);
        for p in &places {
            let (x, y) = view.cell_of(p.coordinates()).unwrap();
            assert!(contains(AREA, x, y));
        }
    }

    #[test]
    fn empty_fit_centers_on_fallback() {
        let center = Coordinates::new(-22.9068, -43.1729);
        let view = Viewport::fit(AREA, std::iter::empty(), center);
        let (x, y) = view.cell_of(center).unwrap();
        assert!(x.abs_diff(AREA.x + AREA.width / 2) <= 1);
        assert!(y.abs_diff(AREA.y + AREA.height / 2) <= 1);
    }

    #[test]
    fn marker_hit_uses_drawn_cell() {
        let places = vec![place("a", -22.90, -43.20), place("b", -22.95, -43.10)];
        let view = Viewport::fit(AREA, places.iter().map(Place::coordinates), ORIGIN);
        let (x, y) = view.cell_of(places[1].coordinates()).unwrap();

        assert_eq!(view.marker_at(x, y, &places).map(|p| p.place_id.as_str()), Some("b"));
        assert_eq!(view.marker_at(x + 1, y, &places).map(|p| p.place_id.as_str()), Some("b"));
        assert!(view.marker_at(x, y.wrapping_sub(1), &places).is_none());
    }

    #[test]
    fn tooltip_stays_inside_canvas() {
        let view = Viewport::fit(AREA, std::iter::empty(), ORIGIN);
        let p = place("corner", 0.0, 0.0);

        let top_left = view.tooltip_rect((AREA.x, AREA.y), &p);
        assert_eq!(top_left.y, AREA.y + 1);
        assert_eq!(top_left.x, AREA.x);

        let bottom_right = view.tooltip_rect((AREA.right() - 1, AREA.bottom() - 1), &p);
        assert!(bottom_right.right() <= AREA.right());
        assert!(bottom_right.bottom() <= AREA.bottom());
        assert_eq!(bottom_right.bottom(), AREA.bottom() - 1);
    }
}
