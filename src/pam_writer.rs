use std::fs::File;
use std::io::{prelude::*, BufWriter};
use std::path::Path;

use anyhow::{ensure, Result};

const MAGIC_NUMBER: &[u8] = b"P7";

pub fn write_pam(path: &Path, width: u16, height: u16, rgba: &[u8]) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    write_pam_to(&mut writer, width, height, rgba)?;
    writer.flush()?;
    Ok(())
}

/// Writes an RGBA canvas as a binary PAM image, which keeps the alpha channel.
pub fn write_pam_to<W: Write>(writer: &mut W, width: u16, height: u16, rgba: &[u8]) -> Result<()> {
    ensure!(
        rgba.len() == width as usize * height as usize * 4,
        "expected {}x{} rgba pixels, got {} bytes",
        width,
        height,
        rgba.len()
    );

    writer.write_all(MAGIC_NUMBER)?;
    writer.write_all(b"\n")?;
    writer.write_all(format!("WIDTH {}\nHEIGHT {}\n", width, height).as_bytes())?;
    writer.write_all(b"DEPTH 4\nMAXVAL 255\nTUPLTYPE RGB_ALPHA\nENDHDR\n")?;

    for row in rgba.chunks(width as usize * 4) {
        writer.write_all(row)?;
    }

    Ok(())
}
