use image::RgbImage;

/// Borrowed row-major 8-bit grayscale buffer.
#[derive(Clone, Copy, Debug)]
pub struct GrayImageView<'a> {
    pub width: usize,
    pub height: usize,
    pub data: &'a [u8], // row-major, len = w*h
}

impl<'a> GrayImageView<'a> {
    pub fn from_luma(img: &'a image::GrayImage) -> Self {
        Self {
            width: img.width() as usize,
            height: img.height() as usize,
            data: img.as_raw(),
        }
    }

    /// Pixel value, or 0 outside the image.
    #[inline]
    pub fn get(&self, x: i32, y: i32) -> u8 {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            return 0;
        }
        self.data[y as usize * self.width + x as usize]
    }
}

/// Bilinear RGB sample at pixel-index coordinates `(x, y)`, clamping to the
/// outermost row/column so samples near the border do not darken.
///
/// `img` must be non-empty.
#[inline]
pub fn sample_bilinear_rgb(img: &RgbImage, x: f64, y: f64) -> [u8; 3] {
    let max_x = (img.width() - 1) as f64;
    let max_y = (img.height() - 1) as f64;
    let x = x.clamp(0.0, max_x);
    let y = y.clamp(0.0, max_y);

    let x0 = x.floor();
    let y0 = y.floor();
    let fx = x - x0;
    let fy = y - y0;
    let x0 = x0 as u32;
    let y0 = y0 as u32;
    let x1 = (x0 + 1).min(img.width() - 1);
    let y1 = (y0 + 1).min(img.height() - 1);

    let p00 = img.get_pixel(x0, y0).0;
    let p10 = img.get_pixel(x1, y0).0;
    let p01 = img.get_pixel(x0, y1).0;
    let p11 = img.get_pixel(x1, y1).0;

    let mut out = [0u8; 3];
    for c in 0..3 {
        let a = p00[c] as f64 + fx * (p10[c] as f64 - p00[c] as f64);
        let b = p01[c] as f64 + fx * (p11[c] as f64 - p01[c] as f64);
        out[c] = (a + fy * (b - a)).round().clamp(0.0, 255.0) as u8;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn gray_view_reads_zero_outside() {
        let img = image::GrayImage::from_pixel(3, 2, image::Luma([9]));
        let view = GrayImageView::from_luma(&img);
        assert_eq!(view.get(2, 1), 9);
        assert_eq!(view.get(-1, 0), 0);
        assert_eq!(view.get(3, 0), 0);
    }

    #[test]
    fn uniform_image_samples_exactly() {
        let img = RgbImage::from_pixel(4, 4, Rgb([255, 0, 17]));
        for (x, y) in [(0.0, 0.0), (1.3, 2.7), (-3.0, 9.0), (3.0, 3.0)] {
            assert_eq!(sample_bilinear_rgb(&img, x, y), [255, 0, 17]);
        }
    }

    #[test]
    fn midpoint_interpolates_between_columns() {
        let mut img = RgbImage::new(2, 1);
        img.put_pixel(0, 0, Rgb([0, 100, 200]));
        img.put_pixel(1, 0, Rgb([100, 200, 0]));
        assert_eq!(sample_bilinear_rgb(&img, 0.5, 0.0), [50, 150, 100]);
    }
}
