//! Raster image transcoding with the `image` crate.

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat, ImageReader};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufWriter;
use tracing::debug;

use crate::converter::{ConversionJob, Converter, Details, ParamSpec, ParameterSchema};
use crate::error::ConversionError;
use crate::format::FormatId;

const FORMATS: &[&str] = &["png", "jpeg", "gif", "bmp", "tiff", "webp"];
const DEFAULT_JPEG_QUALITY: u8 = 85;

fn image_format(format: &FormatId) -> Option<ImageFormat> {
    match format.as_str() {
        "png" => Some(ImageFormat::Png),
        "jpeg" => Some(ImageFormat::Jpeg),
        "gif" => Some(ImageFormat::Gif),
        "bmp" => Some(ImageFormat::Bmp),
        "tiff" => Some(ImageFormat::Tiff),
        "webp" => Some(ImageFormat::WebP),
        _ => None,
    }
}

/// Decodes an image and re-encodes it in another raster format.
#[derive(Debug, Clone, Default)]
pub struct ImageConverter;

impl Converter for ImageConverter {
    fn name(&self) -> &str {
        "ImageConverter"
    }

    fn description(&self) -> &str {
        "Converts between PNG, JPEG, GIF, BMP, TIFF and WebP"
    }

    fn input_formats(&self) -> Vec<FormatId> {
        FORMATS.iter().map(FormatId::new).collect()
    }

    fn output_formats(&self) -> Vec<FormatId> {
        FORMATS.iter().map(FormatId::new).collect()
    }

    fn parameters(&self) -> ParameterSchema {
        ParameterSchema::from([(
            FormatId::new("jpeg"),
            BTreeMap::from([(
                "quality".to_string(),
                ParamSpec::integer("JPEG quality")
                    .default_value(DEFAULT_JPEG_QUALITY)
                    .range(1.0, 100.0),
            )]),
        )])
    }

    fn convert(&self, job: &ConversionJob<'_>) -> Result<Details, ConversionError> {
        job.ensure_supported(self)?;
        let (Some(input), Some(output)) = (
            image_format(job.input_format),
            image_format(job.output_format),
        ) else {
            return Err(ConversionError::UnsupportedPair {
                converter: self.name().to_string(),
                input_format: job.input_format.clone(),
                output_format: job.output_format.clone(),
            });
        };

        let mut reader = ImageReader::open(job.input_path)?;
        reader.set_format(input);
        let img = reader
            .decode()
            .map_err(|e| ConversionError::parse(job.input_format, e))?;
        debug!(
            "Decoded {}x{} {:?} image from {:?}",
            img.width(),
            img.height(),
            img.color(),
            job.input_path.file_name()
        );

        let encode_err = |e: image::ImageError| ConversionError::unsupported(job.output_format, e.to_string());
        let mut details = job.base_details();
        details.insert("width".into(), img.width().into());
        details.insert("height".into(), img.height().into());

        match output {
            ImageFormat::Jpeg => {
                let quality = job
                    .param_u64("quality")
                    .map(|q| q.clamp(1, 100) as u8)
                    .unwrap_or(DEFAULT_JPEG_QUALITY);
                let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
                let writer = BufWriter::new(File::create(job.output_path)?);
                rgb.write_with_encoder(JpegEncoder::new_with_quality(writer, quality))
                    .map_err(encode_err)?;
                details.insert("quality".into(), quality.into());
            }
            ImageFormat::WebP => {
                DynamicImage::ImageRgba8(img.to_rgba8())
                    .save_with_format(job.output_path, output)
                    .map_err(encode_err)?;
            }
            _ => {
                img.save_with_format(job.output_path, output)
                    .map_err(encode_err)?;
            }
        }

        Ok(details)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::converter::Parameters;
    use image::{Rgba, RgbaImage};
    use serde_json::json;
    use std::path::Path;
    use tempfile::TempDir;

    fn sample_png(dir: &Path) -> std::path::PathBuf {
        let path = dir.join("sample.png");
        let img = RgbaImage::from_fn(4, 3, |x, y| Rgba([(x * 60) as u8, (y * 80) as u8, 128, 255]));
        img.save(&path).unwrap();
        path
    }

    fn run(input: &Path, output: &Path, from: &str, to: &str, params: Parameters) -> Result<Details, ConversionError> {
        let input_format = FormatId::new(from);
        let output_format = FormatId::new(to);
        let job = ConversionJob {
            input_path: input,
            output_path: output,
            temp_dir: input.parent().unwrap(),
            input_format: &input_format,
            output_format: &output_format,
            parameters: &params,
        };
        ImageConverter.convert(&job)
    }

    #[test]
    fn test_png_to_jpeg_with_quality() {
        let dir = TempDir::new().unwrap();
        let input = sample_png(dir.path());
        let output = dir.path().join("out.jpg");
        let mut params = Parameters::new();
        params.insert("quality".into(), json!(50));

        let details = run(&input, &output, "png", "jpeg", params).unwrap();
        assert_eq!(details["quality"], json!(50));
        assert_eq!(details["width"], json!(4));

        let decoded = image::open(&output).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (4, 3));
    }

    #[test]
    fn test_png_to_bmp_and_back() {
        let dir = TempDir::new().unwrap();
        let input = sample_png(dir.path());
        let bmp = dir.path().join("out.bmp");
        run(&input, &bmp, "png", "bmp", Parameters::new()).unwrap();

        let png = dir.path().join("back.png");
        let details = run(&bmp, &png, "bmp", "png", Parameters::new()).unwrap();
        assert_eq!(details["height"], json!(3));
        assert!(png.exists());
    }

    #[test]
    fn test_corrupt_input_is_parse_error() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("broken.png");
        std::fs::write(&input, b"definitely not a png").unwrap();

        let err = run(&input, &dir.path().join("out.gif"), "png", "gif", Parameters::new()).unwrap_err();
        assert!(matches!(err, ConversionError::Parse { .. }));
    }

    #[test]
    fn test_declares_jpeg_quality() {
        let schema = ImageConverter.parameters();
        let quality = &schema[&FormatId::new("jpeg")]["quality"];
        assert_eq!(quality.default, Some(json!(85)));
        assert_eq!(quality.max, Some(100.0));
    }
}
