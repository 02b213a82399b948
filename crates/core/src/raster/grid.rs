//! Regular grids: cell geometry (`GridSpec`) and cell values (`Raster`)

use geo::{Coord, LineString, MultiPolygon, Point, Polygon, Rect};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::raster::GeoTransform;

/// Geometry of a regular grid, without values.
///
/// Cells are addressed by a row-major flat index `row * cols + col`, the
/// same order in which [`Raster::values`] lays out its data.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridSpec {
    pub rows: usize,
    pub cols: usize,
    pub transform: GeoTransform,
}

impl GridSpec {
    pub fn new(rows: usize, cols: usize, transform: GeoTransform) -> Self {
        Self {
            rows,
            cols,
            transform,
        }
    }

    /// Number of cells
    pub fn len(&self) -> usize {
        self.rows * self.cols
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn index(&self, row: usize, col: usize) -> usize {
        row * self.cols + col
    }

    pub fn row_col(&self, index: usize) -> (usize, usize) {
        (index / self.cols, index % self.cols)
    }

    /// Centre of the cell at `index`
    pub fn cell_center(&self, index: usize) -> Point<f64> {
        let (row, col) = self.row_col(index);
        let (x, y) = self.transform.pixel_to_geo(col, row);
        Point::new(x, y)
    }

    /// Closed outline of the cell at `index`
    pub fn cell_polygon(&self, index: usize) -> Polygon<f64> {
        let (row, col) = self.row_col(index);
        let corner = |c: usize, r: usize| {
            let (x, y) = self.transform.pixel_to_geo_corner(c, r);
            Coord { x, y }
        };
        let mut ring = vec![
            corner(col, row),
            corner(col + 1, row),
            corner(col + 1, row + 1),
            corner(col, row + 1),
        ];
        ring.push(ring[0]);
        Polygon::new(LineString::new(ring), vec![])
    }

    /// Flat index of the cell holding (x, y).
    ///
    /// Cells are half-open except along the far grid edges, which belong
    /// to the last row/column so that the whole grid envelope is covered.
    pub fn cell_at(&self, x: f64, y: f64) -> Option<usize> {
        if self.is_empty() {
            return None;
        }
        let (col, row) = self.transform.geo_to_pixel(x, y);
        if !col.is_finite() || !row.is_finite() {
            return None;
        }
        if col < 0.0 || row < 0.0 || col > self.cols as f64 || row > self.rows as f64 {
            return None;
        }
        let col = (col.floor() as usize).min(self.cols - 1);
        let row = (row.floor() as usize).min(self.rows - 1);
        Some(self.index(row, col))
    }

    /// Envelope of all cells
    pub fn bounds(&self) -> Rect<f64> {
        let (min_x, min_y, max_x, max_y) = self.transform.bounds(self.cols, self.rows);
        Rect::new(Coord { x: min_x, y: min_y }, Coord { x: max_x, y: max_y })
    }

    /// Grid-to-polygon conversion, one polygon per cell in index order
    pub fn to_polygons(&self) -> MultiPolygon<f64> {
        MultiPolygon::new((0..self.len()).map(|i| self.cell_polygon(i)).collect())
    }
}

/// Values on a regular grid.
///
/// NaN marks cells without a value.
#[derive(Debug, Clone)]
pub struct Raster {
    data: Array2<f64>,
    transform: GeoTransform,
}

impl Raster {
    /// Zero-filled raster
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            data: Array2::zeros((rows, cols)),
            transform: GeoTransform::default(),
        }
    }

    pub fn filled(rows: usize, cols: usize, value: f64) -> Self {
        Self {
            data: Array2::from_elem((rows, cols), value),
            transform: GeoTransform::default(),
        }
    }

    /// Raster from row-major values
    pub fn from_vec(data: Vec<f64>, rows: usize, cols: usize) -> Result<Self> {
        if data.len() != rows * cols {
            return Err(Error::SizeMismatch {
                what: "raster cells",
                expected: rows * cols,
                actual: data.len(),
            });
        }

        let data = Array2::from_shape_vec((rows, cols), data)
            .map_err(|e| Error::Algorithm(e.to_string()))?;

        Ok(Self {
            data,
            transform: GeoTransform::default(),
        })
    }

    pub fn with_transform(mut self, transform: GeoTransform) -> Self {
        self.transform = transform;
        self
    }

    pub fn transform(&self) -> &GeoTransform {
        &self.transform
    }

    pub fn rows(&self) -> usize {
        self.data.nrows()
    }

    pub fn cols(&self) -> usize {
        self.data.ncols()
    }

    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    pub fn get(&self, row: usize, col: usize) -> Result<f64> {
        self.data
            .get((row, col))
            .copied()
            .ok_or(Error::IndexOutOfBounds {
                row,
                col,
                rows: self.rows(),
                cols: self.cols(),
            })
    }

    pub fn set(&mut self, row: usize, col: usize, value: f64) -> Result<()> {
        let (rows, cols) = self.shape();
        match self.data.get_mut((row, col)) {
            Some(cell) => {
                *cell = value;
                Ok(())
            }
            None => Err(Error::IndexOutOfBounds {
                row,
                col,
                rows,
                cols,
            }),
        }
    }

    /// Cell geometry of this raster
    pub fn grid(&self) -> GridSpec {
        GridSpec::new(self.rows(), self.cols(), self.transform)
    }

    /// Values in row-major order
    pub fn values(&self) -> Vec<f64> {
        self.data.iter().copied().collect()
    }

    /// Value of the cell holding (x, y)
    pub fn value_at(&self, x: f64, y: f64) -> Option<f64> {
        let grid = self.grid();
        let (row, col) = grid.row_col(grid.cell_at(x, y)?);
        self.get(row, col).ok()
    }
}
