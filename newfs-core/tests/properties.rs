//! Integration tests exercising `Filesystem` end to end against an
//! in-memory backing store.

use newfs_core::{device_capacity, Error, Filesystem, MemDriver};

const IO_UNIT: u64 = 512;

fn fresh_driver() -> MemDriver {
    MemDriver::new(device_capacity(IO_UNIT) as usize, IO_UNIT)
}

#[test]
fn round_trip_through_unmount_remount() {
    let mut fs = Filesystem::mount(fresh_driver()).unwrap();
    fs.mkdir("/a").unwrap();
    fs.mkdir("/a/b").unwrap();
    fs.mknod("/a/b/c.txt").unwrap();
    fs.write("/a/b/c.txt", 0, b"hello").unwrap();
    let driver = {
        fs.unmount().unwrap();
        fs.into_driver()
    };

    let mut fs = Filesystem::mount(driver).unwrap();
    let bytes = fs.read("/a/b/c.txt", 0, 5).unwrap();
    assert_eq!(bytes, b"hello");
}

#[test]
fn bitmap_accounting_after_create_unlink_cycles() {
    let mut fs = Filesystem::mount(fresh_driver()).unwrap();
    for i in 0..10 {
        let name = format!("/f{i}");
        fs.mknod(&name).unwrap();
        fs.unlink(&name).unwrap();
    }
    // Only root's inode bit remains set.
    assert_eq!(fs.inode_bitmap_allocated(), 1);
    // Root's first dentry block was allocated on the very first mknod and
    // is never freed again, even once every entry using it is gone.
    assert_eq!(fs.data_bitmap_allocated(), 1);
}

#[test]
fn capacity_bound_rejects_the_nth_plus_one_inode() {
    // A directory's entries live in the same six block pointers a file's
    // data does, so no single directory can hold all of these — spread
    // them over enough subdirectories of root to exhaust the inode bitmap
    // without ever exhausting one directory's own dentry blocks first.
    let mut fs = Filesystem::mount(fresh_driver()).unwrap();
    let max_non_root = fs.max_ino() - 1;
    let files_per_dir = 30;
    let mut created = 0u32;
    let mut dir_idx = 0u32;
    while created < max_non_root {
        fs.mkdir(&format!("/d{dir_idx}")).unwrap();
        created += 1;
        let remaining = (max_non_root - created).min(files_per_dir);
        for f in 0..remaining {
            fs.mknod(&format!("/d{dir_idx}/f{f}")).unwrap();
            created += 1;
        }
        dir_idx += 1;
    }
    assert_eq!(created, max_non_root);
    match fs.mkdir(&format!("/d{dir_idx}")) {
        Err(Error::NoSpace) => {}
        other => panic!("expected NoSpace, got {other:?}"),
    }
}

#[test]
fn resolver_stops_at_last_valid_ancestor() {
    let mut fs = Filesystem::mount(fresh_driver()).unwrap();
    fs.mkdir("/x").unwrap();
    // "/x/y/z" resolves only as far as "/x"; mkdir surfaces this as
    // NotFound against the missing intermediate "/x/y".
    match fs.mkdir("/x/y/z") {
        Err(Error::NotFound(path)) => assert_eq!(path, "/x/y"),
        other => panic!("expected NotFound(\"/x/y\"), got {other:?}"),
    }
}

#[test]
fn alignment_write_does_not_disturb_neighbors() {
    let mut fs = Filesystem::mount(fresh_driver()).unwrap();
    fs.mknod("/f").unwrap();
    fs.write("/f", 0, &[0xAAu8; 6]).unwrap();
    fs.write("/f", 1, b"xyz").unwrap();
    assert_eq!(fs.read("/f", 1, 3).unwrap(), b"xyz");
    assert_eq!(fs.read("/f", 0, 1).unwrap(), vec![0xAA]);
    assert_eq!(fs.read("/f", 4, 1).unwrap(), vec![0xAA]);
}

#[test]
fn idempotent_remount_produces_identical_bytes() {
    let driver = fresh_driver();
    let mut fs = Filesystem::mount(driver).unwrap();
    fs.mkdir("/stable").unwrap();
    fs.unmount().unwrap();
    let driver = fs.into_driver();
    let after_first = driver.bytes().to_vec();

    let mut fs = Filesystem::mount(driver).unwrap();
    fs.unmount().unwrap();
    let driver = fs.into_driver();
    let after_second = driver.bytes().to_vec();

    assert_eq!(after_first, after_second);
}

#[test]
fn end_to_end_scenario() {
    let mut fs = Filesystem::mount(fresh_driver()).unwrap();
    fs.mkdir("/d").unwrap();
    fs.mknod("/d/f").unwrap();
    fs.write("/d/f", 0, b"xyz").unwrap();
    fs.unmount().unwrap();
    let driver = fs.into_driver();

    let mut fs = Filesystem::mount(driver).unwrap();
    let (name, _ftype) = fs.readdir("/d", 0).unwrap().unwrap();
    assert_eq!(name, "f");
    let bytes = fs.read("/d/f", 0, 3).unwrap();
    assert_eq!(bytes, b"xyz");
}
