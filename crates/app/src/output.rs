//! Destinations for rendered frames.

use std::{
    fs::File,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use beats_visualiser_core::{to_svg, Result, VisualizationFrame};
use clap::ValueEnum;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FrameFormat {
    /// One SVG document per frame inside the output directory.
    Svg,
    /// All frames as JSON lines in a single file.
    Jsonl,
    /// Render without writing anything.
    None,
}

pub trait FrameSink {
    fn write_frame(&mut self, index: u64, frame: &VisualizationFrame) -> Result<()>;

    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

pub fn open_sink(format: FrameFormat, out: &Path) -> Result<Box<dyn FrameSink>> {
    Ok(match format {
        FrameFormat::Svg => {
            std::fs::create_dir_all(out)?;
            Box::new(SvgDirSink {
                dir: out.to_path_buf(),
            })
        }
        FrameFormat::Jsonl => {
            if let Some(parent) = out.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            Box::new(JsonLinesSink {
                writer: BufWriter::new(File::create(out)?),
            })
        }
        FrameFormat::None => Box::new(NullSink),
    })
}

struct SvgDirSink {
    dir: PathBuf,
}

impl FrameSink for SvgDirSink {
    fn write_frame(&mut self, index: u64, frame: &VisualizationFrame) -> Result<()> {
        let path = self.dir.join(format!("frame_{index:05}.svg"));
        std::fs::write(path, to_svg(frame))?;
        Ok(())
    }
}

struct JsonLinesSink {
    writer: BufWriter<File>,
}

impl FrameSink for JsonLinesSink {
    fn write_frame(&mut self, _index: u64, frame: &VisualizationFrame) -> Result<()> {
        serde_json::to_writer(&mut self.writer, frame)?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

struct NullSink;

impl FrameSink for NullSink {
    fn write_frame(&mut self, _index: u64, _frame: &VisualizationFrame) -> Result<()> {
        Ok(())
    }
}
