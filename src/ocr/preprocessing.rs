use image::{DynamicImage, Rgb, RgbImage, imageops::FilterType};
use ndarray::Array3;

pub const TARGET_WIDTH: u32 = 320;
pub const TARGET_HEIGHT: u32 = 32;

const MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Normalize a plate crop into a recognizer-style `(3, 32, 320)` tensor.
///
/// The width is scaled to 320 keeping the aspect ratio; the height is then
/// padded with black rows (split around the image) or cut down to its top 32
/// rows. Channels are scaled to `[0, 1]` and standardized with ImageNet
/// statistics. Not used by [`OcrStage`](super::OcrStage), which hands the
/// decoded crop straight to the engine.
pub fn preprocess_image(image: &DynamicImage) -> Array3<f32> {
    let (width, height) = (image.width().max(1), image.height());
    let scaled_height = ((height as f32 * TARGET_WIDTH as f32 / width as f32) as u32).max(1);
    let resized = image
        .resize_exact(TARGET_WIDTH, scaled_height, FilterType::Triangle)
        .to_rgb8();

    let fitted = if scaled_height < TARGET_HEIGHT {
        let top = (TARGET_HEIGHT - scaled_height) / 2;
        let mut canvas = RgbImage::from_pixel(TARGET_WIDTH, TARGET_HEIGHT, Rgb([0, 0, 0]));
        image::imageops::overlay(&mut canvas, &resized, 0, top.into());
        canvas
    } else {
        image::imageops::crop_imm(&resized, 0, 0, TARGET_WIDTH, TARGET_HEIGHT).to_image()
    };

    Array3::from_shape_fn(
        (3, TARGET_HEIGHT as usize, TARGET_WIDTH as usize),
        |(c, y, x)| {
            let value = fitted.get_pixel(x as u32, y as u32)[c] as f32 / 255.0;
            (value - MEAN[c]) / STD[c]
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(width: u32, height: u32, value: u8) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([value, value, value])))
    }

    #[test]
    fn output_is_channel_first() {
        let out = preprocess_image(&solid(100, 50, 255));
        assert_eq!(out.shape(), &[3, 32, 320]);
    }

    #[test]
    fn short_images_are_padded_black_around_center() {
        // 320x16 stays 16 rows high: 8 black rows above, 8 below.
        let out = preprocess_image(&solid(320, 16, 255));
        let black_r = (0.0 - MEAN[0]) / STD[0];
        let white_r = (1.0 - MEAN[0]) / STD[0];
        assert!((out[[0, 0, 0]] - black_r).abs() < 0.05);
        assert!((out[[0, 7, 10]] - black_r).abs() < 0.05);
        assert!((out[[0, 8, 10]] - white_r).abs() < 0.05);
        assert!((out[[0, 23, 10]] - white_r).abs() < 0.05);
        assert!((out[[0, 24, 10]] - black_r).abs() < 0.05);
    }

    #[test]
    fn tall_images_keep_top_rows() {
        // White band on top of a black image; a centered crop would be all black.
        let img = RgbImage::from_fn(160, 160, |_, y| if y < 40 { Rgb([255; 3]) } else { Rgb([0; 3]) });
        let out = preprocess_image(&DynamicImage::ImageRgb8(img));
        let white_g = (1.0 - MEAN[1]) / STD[1];
        assert!((out[[1, 0, 0]] - white_g).abs() < 0.05);
        assert!((out[[1, 31, 319]] - white_g).abs() < 0.05);
    }

    #[test]
    fn very_wide_images_keep_one_row() {
        let out = preprocess_image(&solid(4000, 2, 255));
        assert_eq!(out.shape(), &[3, 32, 320]);
    }
}
