//! The `newfs-mkfs` tool formats a device or regular file with the newfs
//! filesystem.

use clap::Parser;
use newfs_core::{Filesystem, MAGIC};
use newfs_utils::FileDriver;
use std::fs;
use std::io::Read;
use std::path::PathBuf;
use std::process::exit;
use utils::prompt::prompt;

/// Command line arguments.
#[derive(Parser)]
#[command(name = "newfs-mkfs", about = "Format a device with the newfs filesystem")]
struct Args {
    /// Path to the device, or to a regular file to create and format.
    device: PathBuf,

    /// Enable verbose (debug-level) logging.
    #[arg(short, long)]
    verbose: bool,
}

/// Returns `true` if `device` already begins with the newfs magic number.
fn already_formatted(device: &PathBuf) -> bool {
    let Ok(mut file) = fs::File::open(device) else {
        return false;
    };
    let mut buf = [0u8; 4];
    file.read_exact(&mut buf).is_ok() && u32::from_le_bytes(buf) == MAGIC
}

fn main() {
    let args = Args::parse();
    let level = if args.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::new().filter_level(level).parse_default_env().init();

    let bin = "newfs-mkfs";
    let exists = args.device.exists();

    if exists && already_formatted(&args.device) {
        println!("{} already contains a newfs filesystem", args.device.display());
        let confirm = prompt(Some("Proceed and reformat? (y/N) "), false)
            .map(|s| s.to_lowercase() == "y")
            .unwrap_or(false);
        if !confirm {
            eprintln!("Abort.");
            exit(1);
        }
    }

    let mut driver = FileDriver::open(&args.device, !exists).unwrap_or_else(|e| {
        eprintln!("{bin}: {}: {}", args.device.display(), e);
        exit(1);
    });

    let required = newfs_core::device_capacity(driver.io_unit());
    driver.ensure_size(required).unwrap_or_else(|e| {
        eprintln!("{bin}: {}: {}", args.device.display(), e);
        exit(1);
    });

    // Formatting is just a mount (which lays out a fresh superblock and
    // root inode whenever the magic number does not match) immediately
    // followed by an unmount to flush it back out.
    let mut fs = Filesystem::mount(driver).unwrap_or_else(|e| {
        newfs_utils::print_error(bin, &e);
        exit(1);
    });
    fs.unmount().unwrap_or_else(|e| {
        newfs_utils::print_error(bin, &e);
        exit(1);
    });

    log::info!("formatted {} with newfs", args.device.display());
}
