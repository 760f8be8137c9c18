//! XMLTV export writer
//!
//! Streams the published guide to disk element by element with proper XML
//! escaping. Export failures are the caller's to log; they never reach the
//! guide cache.

use anyhow::Result;
use std::path::Path;
use tokio::io::AsyncWriteExt;
use tracing::info;

use crate::models::ChannelGuide;

const XMLTV_TIME_FORMAT: &str = "%Y%m%d%H%M%S +0000";

pub struct XmltvWriter {
    generator_name: String,
}

impl Default for XmltvWriter {
    fn default() -> Self {
        Self {
            generator_name: "retrotv".to_string(),
        }
    }
}

impl XmltvWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_generator(generator_name: impl Into<String>) -> Self {
        Self {
            generator_name: generator_name.into(),
        }
    }

    /// Write the guide as an XMLTV document, returning bytes written
    pub async fn write_file(&self, path: &Path, guides: &[ChannelGuide]) -> Result<u64> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }

        let file = tokio::fs::File::create(path).await?;
        let mut writer = tokio::io::BufWriter::new(file);
        let mut bytes_written = 0u64;

        let header = format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<!DOCTYPE tv SYSTEM \"xmltv.dtd\">\n<tv generator-info-name=\"{}\">\n",
            quick_xml::escape::escape(&self.generator_name)
        );
        writer.write_all(header.as_bytes()).await?;
        bytes_written += header.len() as u64;

        for guide in guides {
            let channel_element = format!(
                "  <channel id=\"{}\">\n    <display-name>{}</display-name>\n  </channel>\n",
                guide.channel_number,
                quick_xml::escape::escape(&guide.channel_name)
            );
            writer.write_all(channel_element.as_bytes()).await?;
            bytes_written += channel_element.len() as u64;
        }

        let mut programs_written = 0usize;
        for guide in guides {
            for entry in &guide.entries {
                let program_element = format!(
                    "  <programme start=\"{}\" stop=\"{}\" channel=\"{}\">\n    <title>{}</title>\n  </programme>\n",
                    entry.start.format(XMLTV_TIME_FORMAT),
                    entry.stop.format(XMLTV_TIME_FORMAT),
                    guide.channel_number,
                    quick_xml::escape::escape(&entry.title)
                );
                writer.write_all(program_element.as_bytes()).await?;
                bytes_written += program_element.len() as u64;
                programs_written += 1;
            }
        }

        let footer = "</tv>\n";
        writer.write_all(footer.as_bytes()).await?;
        bytes_written += footer.len() as u64;
        writer.flush().await?;

        info!(
            "XMLTV export written: channels={} programmes={} bytes={} path={}",
            guides.len(),
            programs_written,
            bytes_written,
            path.display()
        );
        Ok(bytes_written)
    }
}
