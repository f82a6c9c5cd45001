//! `newfs-umount`: unmounts a `newfs` FUSE session by unmounting its
//! mountpoint, the same way any other filesystem is torn down.

use clap::Parser;
use std::ffi::c_int;
use std::ffi::CString;
use std::io;
use std::io::Error;
use std::path::PathBuf;
use std::process::exit;

/// Command line arguments.
#[derive(Parser)]
#[command(name = "newfs-umount", about = "Unmount a newfs FUSE session")]
struct Args {
    /// The directory the filesystem is mounted on.
    mountpoint: PathBuf,
    /// Enable verbose (debug-level) logging.
    #[arg(short, long)]
    verbose: bool,
}

extern "C" {
    fn umount(target: *const i8) -> c_int;
}

/// Unmounts the filesystem mounted at `target`.
pub fn unmount_fs(target: &str) -> io::Result<()> {
    let target_c = CString::new(target).unwrap();

    let ret = unsafe { umount(target_c.as_ptr()) };
    if ret < 0 {
        return Err(Error::last_os_error());
    }

    Ok(())
}

fn main() {
    let args = Args::parse();
    let level = if args.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::new().filter_level(level).parse_default_env().init();

    let bin = "newfs-umount";
    let mountpoint = args.mountpoint.display().to_string();
    unmount_fs(&mountpoint).unwrap_or_else(|e| {
        eprintln!("{bin}: cannot unmount `{mountpoint}`: {e}");
        exit(1);
    });
    log::info!("unmounted {mountpoint}");
}
