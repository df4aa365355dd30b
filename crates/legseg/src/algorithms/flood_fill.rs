use image::{Rgb, RgbImage};

use crate::types::{Mask, SeedPoint, FOREGROUND};

/// 4-connected, fixed-range flood fill with reusable buffers.
///
/// A neighbor joins the region when each of its channels differs from the
/// seed's color by at most `tolerance` (inclusive). The tolerance is always
/// measured against the seed, never against the neighbor it was reached from.
///
/// The scratch layer, the list of touched cells and the work stack are kept
/// across fills and only the touched cells are reset, so a run of fills costs
/// the area they cover rather than the image area per fill.
#[derive(Debug)]
pub struct FloodFiller {
    width: u32,
    height: u32,
    scratch: Vec<bool>,
    touched: Vec<usize>,
    stack: Vec<usize>,
}

impl FloodFiller {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            scratch: vec![false; width as usize * height as usize],
            touched: Vec::new(),
            stack: Vec::new(),
        }
    }

    /// Cells written by the most recent fill
    pub fn filled_count(&self) -> usize {
        self.touched.len()
    }

    pub fn is_filled(&self, x: u32, y: u32) -> bool {
        self.scratch[self.index(x, y)]
    }

    fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    fn within(reference: Rgb<u8>, pixel: Rgb<u8>, tolerance: u8) -> bool {
        reference
            .0
            .iter()
            .zip(pixel.0.iter())
            .all(|(&a, &b)| a.abs_diff(b) <= tolerance)
    }

    /// Fill from `seed` onto the scratch layer, replacing the previous fill.
    ///
    /// Cells already set in `blocked` are never entered; a seed on a blocked
    /// cell fills nothing. Returns the number of filled cells.
    pub fn fill(
        &mut self,
        image: &RgbImage,
        seed: SeedPoint,
        tolerance: u8,
        blocked: Option<&Mask>,
    ) -> usize {
        self.reset();
        debug_assert_eq!(image.dimensions(), (self.width, self.height));

        let is_blocked = |idx: usize| blocked.is_some_and(|m| m.as_raw()[idx] == FOREGROUND);
        let seed_idx = self.index(seed.x, seed.y);
        if is_blocked(seed_idx) {
            return 0;
        }

        let reference = *image.get_pixel(seed.x, seed.y);
        let (width, height) = (self.width as usize, self.height as usize);
        let raw = image.as_raw();
        let color_at = |idx: usize| Rgb([raw[idx * 3], raw[idx * 3 + 1], raw[idx * 3 + 2]]);

        self.scratch[seed_idx] = true;
        self.touched.push(seed_idx);
        self.stack.push(seed_idx);

        while let Some(idx) = self.stack.pop() {
            let (x, y) = (idx % width, idx / width);
            let neighbors = [
                (x > 0).then(|| idx - 1),
                (x + 1 < width).then(|| idx + 1),
                (y > 0).then(|| idx - width),
                (y + 1 < height).then(|| idx + width),
            ];
            for next in neighbors.into_iter().flatten() {
                if self.scratch[next] || is_blocked(next) {
                    continue;
                }
                if Self::within(reference, color_at(next), tolerance) {
                    self.scratch[next] = true;
                    self.touched.push(next);
                    self.stack.push(next);
                }
            }
        }

        self.touched.len()
    }

    /// OR the current fill into `target`
    pub fn merge_into(&self, target: &mut Mask) {
        debug_assert_eq!(target.dimensions(), (self.width, self.height));
        let cells = target.as_raw_mut();
        for &idx in &self.touched {
            cells[idx] = FOREGROUND;
        }
    }

    /// The current fill as a standalone mask
    pub fn to_mask(&self) -> Mask {
        let mut mask = Mask::new(self.width, self.height);
        self.merge_into(&mut mask);
        mask
    }

    /// Clear only the cells the last fill wrote
    pub fn reset(&mut self) {
        for idx in self.touched.drain(..) {
            self.scratch[idx] = false;
        }
        self.stack.clear();
    }
}
