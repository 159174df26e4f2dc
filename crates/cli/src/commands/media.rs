//! `spindle speak` and `spindle image`: speech and image generation.

use std::path::Path;

use spindle_core::media::{Media, MediaData, SpeechOptions};

use crate::pipeline;

pub async fn speak(text: &str, out: &Path, voice: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let config = pipeline::load_config()?;
    let pipeline = pipeline::build(&config).await?;

    let options = SpeechOptions {
        voice,
        ..SpeechOptions::default()
    };
    let audio = pipeline.client.speak_with(text, &options).await?;
    save(&audio, out)?;
    println!("Wrote {} ({})", out.display(), audio.mime_type);
    Ok(())
}

pub async fn image(prompt: &str, out: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config = pipeline::load_config()?;
    let pipeline = pipeline::build(&config).await?;

    let image = pipeline.client.generate_image(prompt).await?;
    match (&image.data, out) {
        (MediaData::Url(url), _) => println!("{url}"),
        (MediaData::Bytes(_), Some(out)) => {
            save(&image, out)?;
            println!("Wrote {} ({})", out.display(), image.mime_type);
        }
        (MediaData::Bytes(bytes), None) => {
            return Err(format!("endpoint returned {} bytes of {}; pass --out to save them", bytes.len(), image.mime_type).into());
        }
    }
    Ok(())
}

fn save(media: &Media, out: &Path) -> Result<(), Box<dyn std::error::Error>> {
    match &media.data {
        MediaData::Bytes(bytes) => Ok(std::fs::write(out, bytes)?),
        MediaData::Url(url) => Err(format!("endpoint returned a URL instead of data: {url}").into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_are_written_and_urls_refused() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.mp3");

        save(&Media::bytes("audio/mpeg", vec![1, 2, 3]), &path).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), [1, 2, 3]);

        assert!(save(&Media::url("audio/mpeg", "https://cdn.test/a.mp3"), &path).is_err());
    }
}
