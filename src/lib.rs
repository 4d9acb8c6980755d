//! A FAT-style filesystem over a single regular host file.
//!
//! [`FileSystem`] is the library's one entry point: mount a virtual disk,
//! create/delete flat files inside it, and read/write byte ranges through
//! handles. There is no directory nesting, no permissions, no timestamps,
//! just a superblock, a file allocation table and 128 root-directory slots,
//! exactly as laid out on disk.
//!
//! ```no_run
//! use chainfs::{FileBlockDevice, FileSystem};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let device = FileBlockDevice::open("disk.img")?;
//! let mut fs = FileSystem::new();
//! fs.mount(device)?;
//! fs.create(b"hello")?;
//! let fd = fs.open(b"hello")?;
//! fs.write(fd, b"world")?;
//! fs.close(fd)?;
//! fs.unmount()?;
//! # Ok(())
//! # }
//! ```

mod block;
mod dir;
mod error;
mod fat;
mod handle;
mod io;
mod layout;
mod volume;

pub use block::{BlockDevice, FileBlockDevice, BlockBuf, BLOCK_SIZE};
pub use dir::Listing;
pub use error::Error;
pub use layout::{FAT_EOC, FS_FILENAME_LEN, FS_FILE_MAX_COUNT, FS_OPEN_MAX_COUNT};
pub use volume::Stats;

use volume::Volume;

/// The library's sole public entry point. Wraps an `Option<Volume<D>>`
/// (mounted is the `Some` arm, unmounted is `None`) rather than a sentinel
/// flag alongside separately-initialised state.
pub struct FileSystem<D: BlockDevice> {
    volume: Option<Volume<D>>,
}

impl<D: BlockDevice> Default for FileSystem<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: BlockDevice> FileSystem<D> {
    /// An unmounted filesystem. Call [`mount`](Self::mount) before doing
    /// anything else.
    pub fn new() -> Self {
        FileSystem { volume: None }
    }

    fn mounted(&self) -> Result<&Volume<D>, Error<D::Error>> {
        self.volume.as_ref().ok_or(Error::NotMounted)
    }

    fn mounted_mut(&mut self) -> Result<&mut Volume<D>, Error<D::Error>> {
        self.volume.as_mut().ok_or(Error::NotMounted)
    }

    /// Mounts `device` as this filesystem's backing disk. Fails
    /// [`Error::AlreadyMounted`] if a volume is already mounted,
    /// [`Error::BadFormat`] if the signature is wrong,
    /// [`Error::BadSize`] if the superblock's block count disagrees with
    /// the device's own.
    pub fn mount(&mut self, device: D) -> Result<(), Error<D::Error>> {
        if self.volume.is_some() {
            error::diagnose("mount", &Error::<D::Error>::AlreadyMounted);
            return Err(Error::AlreadyMounted);
        }
        self.volume = Some(Volume::mount(device)?);
        Ok(())
    }

    /// Flushes metadata and unmounts. Fails [`Error::NotMounted`] if
    /// nothing is mounted, [`Error::Busy`] if any handle is still open;
    /// in both failure cases the volume stays mounted.
    pub fn unmount(&mut self) -> Result<(), Error<D::Error>> {
        self.mounted_mut()?.unmount()?;
        self.volume = None;
        Ok(())
    }

    /// Mounted-state stats: block counts and free ratios.
    pub fn info(&self) -> Result<Stats, Error<D::Error>> {
        self.mounted().map(Volume::info)
    }

    /// Every non-empty directory slot, as `(name, size, first_data)`.
    pub fn ls(&self) -> Result<Vec<Listing>, Error<D::Error>> {
        self.mounted().map(Volume::ls)
    }

    /// Creates a zero-length file named `name`.
    pub fn create(&mut self, name: &[u8]) -> Result<(), Error<D::Error>> {
        self.mounted_mut()?.create(name)
    }

    /// Deletes `name` and frees its FAT chain. Fails [`Error::Busy`] if any
    /// handle still has it open.
    pub fn delete(&mut self, name: &[u8]) -> Result<(), Error<D::Error>> {
        self.mounted_mut()?.delete(name)
    }

    /// Opens `name`, returning a handle with offset 0. Opening the same
    /// file twice yields two independent handles.
    pub fn open(&mut self, name: &[u8]) -> Result<usize, Error<D::Error>> {
        self.mounted_mut()?.open(name)
    }

    /// Releases a handle previously returned by [`open`](Self::open).
    pub fn close(&mut self, fd: usize) -> Result<(), Error<D::Error>> {
        self.mounted_mut()?.close(fd)
    }

    /// The current size, in bytes, of the file behind `fd`.
    pub fn stat(&self, fd: usize) -> Result<u32, Error<D::Error>> {
        self.mounted()?.stat(fd)
    }

    /// Repositions `fd`'s offset. Fails [`Error::BadOffset`] if `offset`
    /// exceeds the file's current size.
    pub fn lseek(&mut self, fd: usize, offset: u32) -> Result<(), Error<D::Error>> {
        self.mounted_mut()?.lseek(fd, offset)
    }

    /// Reads into `buf` from `fd`'s current offset, advancing it. Returns
    /// fewer bytes than `buf.len()` only at end-of-file.
    pub fn read(&mut self, fd: usize, buf: &mut [u8]) -> Result<usize, Error<D::Error>> {
        self.mounted_mut()?.read(fd, buf)
    }

    /// Writes `buf` at `fd`'s current offset, advancing it and growing the
    /// file's size if needed. Returns fewer bytes than `buf.len()` only
    /// when the volume fills mid-write.
    pub fn write(&mut self, fd: usize, buf: &[u8]) -> Result<usize, Error<D::Error>> {
        self.mounted_mut()?.write(fd, buf)
    }
}

impl FileSystem<FileBlockDevice> {
    /// Opens `path` as a host-file-backed virtual disk and mounts it in one
    /// step, the literal `mount(path)` entry point from the library
    /// surface. [`Error::BadDisk`] covers the case the distilled surface
    /// names but the generic [`mount`](Self::mount) can't: the path doesn't
    /// exist, isn't a regular file, or its length isn't a whole number of
    /// blocks.
    pub fn mount_path(&mut self, path: impl AsRef<std::path::Path>) -> Result<(), Error<std::io::Error>> {
        let device = FileBlockDevice::open(path).map_err(Error::BadDisk)?;
        self.mount(device)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::BLOCK_SIZE;
    use crate::layout::{serialize_root_dir, DirSlot, Superblock, FS_FILE_MAX_COUNT};
    use std::io::Write as _;
    use tempfile::NamedTempFile;

    const TOTAL_BLK_COUNT: u16 = 8198;
    const FAT_BLK_COUNT: u8 = 4;
    const RDIR_BLK: u16 = 5;
    const DATA_BLK: u16 = 6;
    const DATA_BLK_COUNT: u16 = 8192;

    fn blank_disk() -> NamedTempFile {
        let sb = Superblock {
            total_blk_count: TOTAL_BLK_COUNT,
            rdir_blk: RDIR_BLK,
            data_blk: DATA_BLK,
            data_blk_count: DATA_BLK_COUNT,
            fat_blk_count: FAT_BLK_COUNT,
        };
        let mut bytes = Vec::with_capacity(TOTAL_BLK_COUNT as usize * BLOCK_SIZE);
        bytes.extend_from_slice(&sb.serialize());
        let empty_fat_blocks = vec![[0u8; BLOCK_SIZE]; FAT_BLK_COUNT as usize];
        let fat = crate::fat::Fat::parse(&empty_fat_blocks, DATA_BLK_COUNT);
        for block in fat.serialize() {
            bytes.extend_from_slice(&block);
        }
        bytes.extend_from_slice(&serialize_root_dir(&[DirSlot::EMPTY; FS_FILE_MAX_COUNT]));
        bytes.resize(TOTAL_BLK_COUNT as usize * BLOCK_SIZE, 0);

        let mut file = NamedTempFile::new().expect("create temp disk image");
        file.write_all(&bytes).expect("write temp disk image");
        file
    }

    fn mounted_fs() -> (FileSystem<FileBlockDevice>, NamedTempFile) {
        let _ = env_logger::builder().is_test(true).try_init();
        let disk = blank_disk();
        let device = FileBlockDevice::open(disk.path()).expect("open disk image");
        let mut fs = FileSystem::new();
        fs.mount(device).expect("mount");
        (fs, disk)
    }

    #[test]
    fn scenario_fresh_mount_reports_full_free_ratios() {
        let (fs, _disk) = mounted_fs();
        let stats = fs.info().unwrap();
        assert_eq!(stats.rdir_free, 128);
        assert_eq!(stats.fat_free, 8191);
    }

    #[test]
    fn scenario_duplicate_create_fails_exists() {
        let (mut fs, _disk) = mounted_fs();
        fs.create(b"a").unwrap();
        assert!(matches!(fs.create(b"a"), Err(Error::Exists)));
    }

    #[test]
    fn scenario_write_then_seek_then_read_round_trips_and_stats() {
        let (mut fs, _disk) = mounted_fs();
        fs.create(b"x").unwrap();
        let fd = fs.open(b"x").unwrap();
        assert_eq!(fd, 0);
        assert_eq!(fs.write(fd, b"hello").unwrap(), 5);
        fs.lseek(fd, 0).unwrap();
        let mut buf = [0u8; 5];
        assert_eq!(fs.read(fd, &mut buf).unwrap(), 5);
        assert_eq!(&buf, b"hello");
        assert_eq!(fs.stat(fd).unwrap(), 5);
    }

    #[test]
    fn scenario_write_spanning_two_blocks_grows_chain() {
        let (mut fs, _disk) = mounted_fs();
        fs.create(b"x").unwrap();
        let fd = fs.open(b"x").unwrap();
        let mut payload = vec![b'A'; BLOCK_SIZE];
        payload.push(b'B');
        assert_eq!(fs.write(fd, &payload).unwrap(), BLOCK_SIZE + 1);
        assert_eq!(fs.stat(fd).unwrap() as usize, BLOCK_SIZE + 1);
    }

    #[test]
    fn scenario_delete_busy_then_restores_free_ratios() {
        let (mut fs, _disk) = mounted_fs();
        fs.create(b"x").unwrap();
        let fd = fs.open(b"x").unwrap();
        fs.write(fd, b"hello").unwrap();
        assert!(matches!(fs.delete(b"x"), Err(Error::Busy)));
        fs.close(fd).unwrap();
        fs.delete(b"x").unwrap();
        let stats = fs.info().unwrap();
        assert_eq!(stats.rdir_free, 128);
        assert_eq!(stats.fat_free, 8191);
    }

    #[test]
    fn scenario_write_beyond_volume_capacity_short_writes_at_usable_limit() {
        let (mut fs, _disk) = mounted_fs();
        fs.create(b"big").unwrap();
        let fd = fs.open(b"big").unwrap();
        let payload = vec![b'z'; DATA_BLK_COUNT as usize * BLOCK_SIZE];
        let written = fs.write(fd, &payload).unwrap();
        let usable_blocks = DATA_BLK_COUNT as usize - 1; // entry 0 is reserved
        assert_eq!(written, usable_blocks * BLOCK_SIZE);
        assert_eq!(fs.stat(fd).unwrap() as usize, usable_blocks * BLOCK_SIZE);
    }

    #[test]
    fn unmount_then_remount_persists_writes() {
        let (mut fs, disk) = mounted_fs();
        fs.create(b"x").unwrap();
        let fd = fs.open(b"x").unwrap();
        fs.write(fd, b"hello").unwrap();
        fs.close(fd).unwrap();
        fs.unmount().unwrap();

        let device = FileBlockDevice::open(disk.path()).unwrap();
        fs.mount(device).unwrap();
        let fd = fs.open(b"x").unwrap();
        let mut buf = [0u8; 5];
        assert_eq!(fs.read(fd, &mut buf).unwrap(), 5);
        assert_eq!(&buf, b"hello");
    }

    #[test]
    fn unmount_with_open_handle_fails_busy_and_stays_mounted() {
        let (mut fs, _disk) = mounted_fs();
        fs.create(b"x").unwrap();
        let fd = fs.open(b"x").unwrap();
        assert!(matches!(fs.unmount(), Err(Error::Busy)));
        fs.close(fd).unwrap();
        fs.unmount().unwrap();
    }

    #[test]
    fn operations_before_mount_fail_not_mounted() {
        let mut fs: FileSystem<crate::block::mem::MemoryBlockDevice> = FileSystem::new();
        assert!(matches!(fs.create(b"x"), Err(Error::NotMounted)));
        assert!(matches!(fs.info(), Err(Error::NotMounted)));
    }

    #[test]
    fn mount_path_opens_and_mounts_in_one_step() {
        let _ = env_logger::builder().is_test(true).try_init();
        let disk = blank_disk();
        let mut fs: FileSystem<FileBlockDevice> = FileSystem::new();
        fs.mount_path(disk.path()).unwrap();
        fs.create(b"x").unwrap();
    }

    #[test]
    fn mount_path_on_missing_file_fails_bad_disk() {
        let _ = env_logger::builder().is_test(true).try_init();
        let mut fs: FileSystem<FileBlockDevice> = FileSystem::new();
        assert!(matches!(
            fs.mount_path("/nonexistent/chainfs-disk.img"),
            Err(Error::BadDisk(_))
        ));
    }
}
