//! Open File Table: a fixed-size table of small-integer handles, each
//! pointing at a root-directory slot with its own byte offset.
//!
//! This module only tracks fd → (slot, offset); it knows nothing about file
//! sizes or the FAT, so offset bounds are enforced by `crate::volume::Volume`
//! which has the slot's `file_size` to check against.

use crate::layout::FS_OPEN_MAX_COUNT;

/// One open handle: which directory slot it refers to, and where in that
/// file the next read/write will start.
#[derive(Debug, Clone, Copy)]
pub struct Handle {
    pub slot: usize,
    pub offset: u32,
}

/// The table of up to 32 simultaneously open handles.
pub struct OpenFileTable {
    handles: [Option<Handle>; FS_OPEN_MAX_COUNT],
}

impl OpenFileTable {
    pub fn new() -> Self {
        OpenFileTable {
            handles: [None; FS_OPEN_MAX_COUNT],
        }
    }

    /// Claims the lowest-indexed free handle for `slot`, offset 0. `None` if
    /// every handle is in use.
    pub fn open(&mut self, slot: usize) -> Option<usize> {
        let fd = self.handles.iter().position(Option::is_none)?;
        self.handles[fd] = Some(Handle { slot, offset: 0 });
        Some(fd)
    }

    /// Releases `fd`. `false` if `fd` is out of range or not open.
    pub fn close(&mut self, fd: usize) -> bool {
        match self.handles.get_mut(fd) {
            Some(slot @ Some(_)) => {
                *slot = None;
                true
            }
            _ => false,
        }
    }

    pub fn get(&self, fd: usize) -> Option<&Handle> {
        self.handles.get(fd)?.as_ref()
    }

    pub fn get_mut(&mut self, fd: usize) -> Option<&mut Handle> {
        self.handles.get_mut(fd)?.as_mut()
    }

    /// Whether any open handle currently references `slot`, the `Busy`
    /// check `delete` and `unmount` both need.
    pub fn slot_is_open(&self, slot: usize) -> bool {
        self.handles
            .iter()
            .any(|h| matches!(h, Some(handle) if handle.slot == slot))
    }

    /// Whether any handle at all is open. `unmount`'s `Busy` check.
    pub fn any_open(&self) -> bool {
        self.handles.iter().any(Option::is_some)
    }
}
