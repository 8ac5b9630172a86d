extern crate log;
pub mod crs;
pub mod download;
pub mod geofile;
pub mod icons;
pub mod webmap;
use crate::webmap::generate::{generate_webmap, WebmapParams};
use anyhow::anyhow;
use clap::Parser;
use std::{fs::read_to_string, path::Path};

/// Generate a satellite-backed webmap for a site from a boundary file and
/// a set of point-of-interest records.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the input config file.
    #[arg(short, long)]
    config_filepath: String,
}

fn try_main() -> anyhow::Result<()> {
    let args = Args::try_parse()?;
    if !Path::new(&args.config_filepath).exists() {
        return Err(anyhow!("Config file {} not found", &args.config_filepath));
    }
    let config_contents = read_to_string(args.config_filepath)?;
    let params: WebmapParams = serde_yaml::from_str(&config_contents)?;

    let output_path = generate_webmap(&params)?;
    log::info!("Webmap written to {:?}", output_path);
    Ok(())
}

fn main() {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info")
    }
    env_logger::init();
    if let Err(e) = try_main() {
        eprintln!("Error: {:?}", e);
        std::process::exit(1)
    }
}
