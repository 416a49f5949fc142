use std::{
    env,
    fs::{self, File},
    io::BufWriter,
    path::{Path, PathBuf},
    process,
};

use anyhow::{bail, Context};
use jpeg2bmp::ImageData;

const USAGE: &str = "usage: jpeg2bmp [--info] <file.jpg>...";

fn main() -> anyhow::Result<()> {
    env_logger::builder()
        .filter_module(env!("CARGO_PKG_NAME"), log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let mut info = false;
    let mut paths = Vec::new();
    for arg in env::args_os().skip(1) {
        match arg.to_str() {
            Some("--info") => info = true,
            Some(flag) if flag.starts_with('-') => {
                eprintln!("unknown option '{flag}'");
                eprintln!("{USAGE}");
                process::exit(2);
            }
            _ => paths.push(PathBuf::from(arg)),
        }
    }
    if paths.is_empty() {
        eprintln!("{USAGE}");
        process::exit(2);
    }

    let mut failed = 0;
    for path in &paths {
        if let Err(e) = convert(path, info) {
            log::error!("{:?}", e);
            failed += 1;
        }
    }

    if failed != 0 {
        bail!("{failed} of {} files could not be converted", paths.len());
    }
    Ok(())
}

fn convert(path: &Path, info: bool) -> anyhow::Result<()> {
    let jpeg = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let data = ImageData::new(&jpeg).with_context(|| format!("failed to parse {}", path.display()))?;
    if info {
        println!("{}:", path.display());
        print!("{data}");
    }

    let image = data
        .decode()
        .with_context(|| format!("failed to decode {}", path.display()))?;

    let out = path.with_extension("bmp");
    let file = File::create(&out).with_context(|| format!("failed to create {}", out.display()))?;
    image
        .write_bmp(BufWriter::new(file))
        .with_context(|| format!("failed to write {}", out.display()))?;

    log::info!(
        "{} -> {} ({}x{})",
        path.display(),
        out.display(),
        image.width(),
        image.height(),
    );
    Ok(())
}
