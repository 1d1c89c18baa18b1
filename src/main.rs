use std::fs::{self, File};
use std::io::BufReader;
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use log::info;

mod pam_writer;

use gifseq::Decoder;

fn main() -> Result<()> {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let input = args
        .next()
        .ok_or_else(|| anyhow!("usage: gifseq <input.gif> [output-dir]"))?;
    let output_dir = PathBuf::from(args.next().unwrap_or_else(|| ".".into()));
    fs::create_dir_all(&output_dir)
        .with_context(|| format!("creating output directory {}", output_dir.display()))?;

    let file = File::open(&input).with_context(|| format!("opening {}", input))?;
    let mut decoder = Decoder::new(BufReader::new(file));

    let screen = decoder.read_info()?;
    info!("{}: {}x{} logical screen", input, screen.width, screen.height);

    while let Some(frame) = decoder.next_frame()? {
        let path = output_dir.join(format!("frame_{:04}.pam", frame.number()));
        pam_writer::write_pam(&path, frame.width(), frame.height(), frame.pixels())?;
        info!(
            "frame {} at {}cs, shown for {}cs -> {}",
            frame.number(),
            frame.timepoint(),
            frame.delay(),
            path.display()
        );
    }

    if let Some(loop_count) = decoder.loop_count() {
        info!("loop count: {:?}", loop_count);
    }
    Ok(())
}
