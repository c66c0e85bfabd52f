use std::io::Cursor;
use std::path::{Path, PathBuf};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::ImageFormat;

use crate::error::PredictError;
use crate::hook::GenerationOutput;
use crate::preview::strip_data_url_prefix;

/// Post-run: decode the engine's base64 result images and write them out as
/// `{seed}-{uuid}.png`. A result image that fails to decode is a real output
/// error — unlike preview frames, final results are never silently dropped.
pub async fn post_run(
    output: &GenerationOutput,
    output_dir: &Path,
) -> Result<Vec<PathBuf>, PredictError> {
    tokio::fs::create_dir_all(output_dir).await?;

    let mut paths = Vec::with_capacity(output.images.len());
    for (i, encoded) in output.images.iter().enumerate() {
        let bytes = STANDARD
            .decode(strip_data_url_prefix(encoded.trim()))
            .map_err(|e| PredictError::Output(format!("result image {i} is not base64: {e}")))?;

        // Round-trip through the decoder to normalize whatever the engine
        // produced into PNG.
        let img = image::load_from_memory(&bytes)
            .map_err(|e| PredictError::Output(format!("result image {i} is not an image: {e}")))?;
        let mut png = Vec::new();
        img.write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .map_err(|e| PredictError::Output(format!("png encode of image {i} failed: {e}")))?;

        let seed = output.info.all_seeds.get(i).copied().unwrap_or(-1);
        let file_name = format!("{seed}-{}.png", uuid::Uuid::new_v4());
        let path = output_dir.join(file_name);
        tokio::fs::write(&path, &png).await?;

        tracing::debug!(path = %path.display(), seed, "wrote output image");
        paths.push(path);
    }

    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hook::GenerationInfo;
    use crate::preview::encode_data_url;
    use image::RgbImage;

    fn output_with_one_image() -> GenerationOutput {
        let img = RgbImage::from_pixel(2, 2, image::Rgb([10, 20, 30]));
        let data_url = encode_data_url(&img).unwrap();
        GenerationOutput {
            // Engines return bare base64; the data-URL form is accepted too.
            images: vec![strip_data_url_prefix(&data_url).to_string()],
            info: GenerationInfo {
                all_seeds: vec![42],
            },
        }
    }

    #[tokio::test]
    async fn writes_named_png_per_image() {
        let dir = tempfile::tempdir().unwrap();
        let paths = post_run(&output_with_one_image(), dir.path()).await.unwrap();

        assert_eq!(paths.len(), 1);
        let name = paths[0].file_name().unwrap().to_string_lossy();
        assert!(name.starts_with("42-"));
        assert!(name.ends_with(".png"));

        let bytes = std::fs::read(&paths[0]).unwrap();
        let img = image::load_from_memory(&bytes).unwrap().to_rgb8();
        assert_eq!(img.get_pixel(0, 0).0, [10, 20, 30]);
    }

    #[tokio::test]
    async fn missing_seed_falls_back_to_minus_one() {
        let mut out = output_with_one_image();
        out.info.all_seeds.clear();
        let dir = tempfile::tempdir().unwrap();
        let paths = post_run(&out, dir.path()).await.unwrap();
        assert!(paths[0]
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("-1-"));
    }

    #[tokio::test]
    async fn garbage_image_is_an_output_error() {
        let out = GenerationOutput {
            images: vec!["AAAA".to_string()],
            info: GenerationInfo::default(),
        };
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            post_run(&out, dir.path()).await,
            Err(PredictError::Output(_))
        ));
    }
}
