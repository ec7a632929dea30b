use image::{Rgb, RgbImage};

/// Half-size of the comparison patch (7x7)
const PATCH_RADIUS: i64 = 3;
/// Half-size of the search window (21x21)
const SEARCH_RADIUS: i64 = 10;

/// Non-local means colour denoising
///
/// Every pixel becomes a weighted average of the pixels in its search window,
/// weighted by how similar the 7x7 neighbourhoods are:
/// `w = exp(-d² / h²)` with `d²` the mean squared patch difference over all
/// channels and `h = strength`. Strength 0 returns an exact copy.
pub fn apply(image: &RgbImage, strength: f32) -> RgbImage {
    let (width, height) = image.dimensions();
    if strength <= 0.0 || width == 0 || height == 0 {
        return image.clone();
    }

    let pixels = FloatPixels::new(image);
    let h2 = f64::from(strength) * f64::from(strength);
    let patch_len = ((2 * PATCH_RADIUS + 1) * (2 * PATCH_RADIUS + 1) * 3) as f64;

    let len = pixels.width as usize * pixels.height as usize;
    let mut sums = vec![[0.0f32; 3]; len];
    let mut weights = vec![0.0f32; len];
    let mut table = SummedArea::new(pixels.width, pixels.height);

    for dy in -SEARCH_RADIUS..=SEARCH_RADIUS {
        for dx in -SEARCH_RADIUS..=SEARCH_RADIUS {
            table.fill(&pixels, dx, dy);

            for y in 0..pixels.height {
                for x in 0..pixels.width {
                    let dist = table.patch_sum(x, y) / patch_len;
                    let weight = (-dist / h2).exp() as f32;
                    if weight == 0.0 {
                        continue;
                    }

                    let idx = (y * pixels.width + x) as usize;
                    let neighbour = pixels.get(x + dx, y + dy);
                    for c in 0..3 {
                        sums[idx][c] += weight * neighbour[c];
                    }
                    weights[idx] += weight;
                }
            }
        }
    }

    RgbImage::from_fn(width, height, |x, y| {
        let idx = (y * width + x) as usize;
        // The zero offset always contributes weight 1
        let total = weights[idx];
        let channel = |c: usize| (sums[idx][c] / total).round().clamp(0.0, 255.0) as u8;
        Rgb([channel(0), channel(1), channel(2)])
    })
}

/// Image copy in f32 with clamped (replicated) border reads
struct FloatPixels {
    width: i64,
    height: i64,
    data: Vec<[f32; 3]>,
}

impl FloatPixels {
    fn new(image: &RgbImage) -> Self {
        let data = image
            .pixels()
            .map(|p| [f32::from(p[0]), f32::from(p[1]), f32::from(p[2])])
            .collect();
        Self {
            width: i64::from(image.width()),
            height: i64::from(image.height()),
            data,
        }
    }

    fn get(&self, x: i64, y: i64) -> [f32; 3] {
        let x = x.clamp(0, self.width - 1);
        let y = y.clamp(0, self.height - 1);
        self.data[(y * self.width + x) as usize]
    }
}

/// Summed-area table of squared differences between the image and its copy
/// shifted by one search offset, over the image grown by the patch radius
///
/// f64: running sums reach the millions and are differenced in `patch_sum`.
struct SummedArea {
    stride: usize,
    rows: usize,
    data: Vec<f64>,
}

impl SummedArea {
    fn new(width: i64, height: i64) -> Self {
        let stride = (width + 2 * PATCH_RADIUS) as usize + 1;
        let rows = (height + 2 * PATCH_RADIUS) as usize + 1;
        Self {
            stride,
            rows,
            data: vec![0.0; stride * rows],
        }
    }

    fn fill(&mut self, pixels: &FloatPixels, dx: i64, dy: i64) {
        for j in 1..self.rows {
            let v = j as i64 - 1 - PATCH_RADIUS;
            let mut row_sum = 0.0;
            for i in 1..self.stride {
                let u = i as i64 - 1 - PATCH_RADIUS;
                let a = pixels.get(u, v);
                let b = pixels.get(u + dx, v + dy);
                row_sum += (0..3).map(|c| f64::from(a[c] - b[c]).powi(2)).sum::<f64>();
                self.data[j * self.stride + i] = self.data[(j - 1) * self.stride + i] + row_sum;
            }
        }
    }

    /// Sum over the patch centred on image pixel (x, y)
    fn patch_sum(&self, x: i64, y: i64) -> f64 {
        let side = (2 * PATCH_RADIUS + 1) as usize;
        let (x0, y0) = (x as usize, y as usize);
        let (x1, y1) = (x0 + side, y0 + side);
        self.data[y1 * self.stride + x1] - self.data[y0 * self.stride + x1]
            - self.data[y1 * self.stride + x0]
            + self.data[y0 * self.stride + x0]
    }
}
