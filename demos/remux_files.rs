use async_trait::async_trait;
use bytes::Bytes;
use std::error::Error;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tsremux::config::RemuxConfig;
use tsremux::format::ts::types::pts_to_time;
use tsremux::remux::{AudioPipeline, MediaSink, Segment};

/// Writes every buffer straight to disk.
struct FileSink {
    file: File,
    written: usize,
}

#[async_trait]
impl MediaSink for FileSink {
    async fn is_ready(&mut self) -> bool {
        true
    }

    async fn append(&mut self, data: Bytes) -> tsremux::Result<()> {
        self.file.write_all(&data).await?;
        self.written += data.len();
        Ok(())
    }
}

// Usage: remux_files [-o out.mp4] seg000.ts seg001.ts ...
#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let mut output = String::from("out.mp4");
    let mut inputs = Vec::new();
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "-o" {
            output = args.next().ok_or("-o needs a path")?;
        } else {
            inputs.push(arg);
        }
    }
    if inputs.is_empty() {
        return Err("no input segments given".into());
    }

    let mut items: Vec<tsremux::Result<(Segment, Bytes)>> = Vec::with_capacity(inputs.len());
    for path in &inputs {
        let absolute = tokio::fs::canonicalize(path).await?;
        let segment = Segment::new(&format!("file://{}", absolute.display()), 0.0)?;
        let data = tokio::fs::read(&absolute).await?;
        println!("Loaded {} ({} bytes)", segment.url, data.len());
        items.push(Ok((segment, Bytes::from(data))));
    }
    let mut source = futures::stream::iter(items);

    let mut sink = FileSink {
        file: File::create(&output).await?,
        written: 0,
    };

    let mut pipeline = AudioPipeline::new(RemuxConfig::from_env());
    let fragments = pipeline.run(&mut source, &mut sink).await?;
    sink.file.flush().await?;

    let track = pipeline.track();
    let length = track
        .next_audio_pts
        .map(|pts| pts_to_time(pts.max(0.0) as u64))
        .unwrap_or_default();
    println!(
        "Wrote {}: {} fragments, {} bytes, {:?} of {}",
        output,
        fragments,
        sink.written,
        length,
        pipeline.mime_type().unwrap_or_default()
    );

    Ok(())
}
