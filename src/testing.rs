//! Test doubles for the hardware seams
//!
//! `MockHost` plays the simulator's semihosting side against in-memory files.
//! `FakeBus` is a sparse word-addressed memory with scripted reads and an
//! access log, standing in for MMIO.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Mutex;

use crate::error::Errno;
use crate::mmio::Bus;
use crate::semihosting::{ExitBlock, Gateway, Op, OpenBlock, OpenMode, RwBlock, SeekBlock};

const ENOENT: i32 = 2;

struct OpenFile {
    name: String,
    pos: usize,
}

/// Semihosting host that honours every request exactly.
#[derive(Default)]
pub struct MockHost {
    files: HashMap<String, Vec<u8>>,
    handles: HashMap<i32, OpenFile>,
    next_fd: i32,
    errno: i32,
    console: Vec<u8>,
    opened: Vec<(String, u32)>,
    exits: Vec<(Op, u32, i32)>,
    ops: Vec<Op>,
}

impl MockHost {
    pub fn new() -> Self {
        Self {
            next_fd: 3,
            ..Default::default()
        }
    }

    pub fn console(&self) -> &[u8] {
        &self.console
    }

    pub fn opened(&self) -> Vec<(String, u32)> {
        self.opened.clone()
    }

    pub fn exits(&self) -> Vec<(Op, u32, i32)> {
        self.exits.clone()
    }

    pub fn count(&self, op: Op) -> usize {
        self.ops.iter().filter(|&&o| o == op).count()
    }

    pub fn file(&self, name: &str) -> Option<&[u8]> {
        self.files.get(name).map(Vec::as_slice)
    }

    fn fail(&mut self, errno: i32) -> i32 {
        self.errno = errno;
        -1
    }

    fn open(&mut self, block: &OpenBlock) -> i32 {
        // SAFETY: the block points at a live CStr of `len` bytes
        let name = unsafe { std::slice::from_raw_parts(block.name as *const u8, block.len) };
        let name = String::from_utf8_lossy(name).into_owned();
        let mode = OpenMode::from_bits_retain(block.mode as u32);
        self.opened.push((name.clone(), mode.bits()));

        let pos = if mode.contains(OpenMode::APPEND) {
            self.files.entry(name.clone()).or_default().len()
        } else if mode.contains(OpenMode::WRITE) {
            self.files.insert(name.clone(), Vec::new());
            0
        } else if self.files.contains_key(&name) {
            0
        } else {
            return self.fail(ENOENT);
        };

        let fd = self.next_fd;
        self.next_fd += 1;
        self.handles.insert(fd, OpenFile { name, pos });
        fd
    }

    fn write(&mut self, block: &RwBlock) -> i32 {
        let Some(handle) = self.handles.get_mut(&block.fd) else {
            return self.fail(Errno::EBADF.raw());
        };
        // SAFETY: the block describes a live caller buffer
        let data = unsafe { std::slice::from_raw_parts(block.buf as *const u8, block.len) };
        let file = self.files.entry(handle.name.clone()).or_default();
        let end = handle.pos + data.len();
        if file.len() < end {
            file.resize(end, 0);
        }
        file[handle.pos..end].copy_from_slice(data);
        handle.pos = end;
        0
    }

    fn read(&mut self, block: &RwBlock) -> i32 {
        let Some(handle) = self.handles.get_mut(&block.fd) else {
            return self.fail(Errno::EBADF.raw());
        };
        let file = self.files.get(&handle.name).map(Vec::as_slice).unwrap_or(&[]);
        let available = file.len().saturating_sub(handle.pos);
        let n = available.min(block.len);
        // SAFETY: the block describes a live, writable caller buffer
        let out = unsafe { std::slice::from_raw_parts_mut(block.buf, block.len) };
        out[..n].copy_from_slice(&file[handle.pos..handle.pos + n]);
        handle.pos += n;
        (block.len - n) as i32
    }
}

impl Gateway for MockHost {
    fn trap(&mut self, op: Op, arg: usize) -> i32 {
        self.ops.push(op);
        match op {
            // SAFETY (all block casts below): the syscall layer passes the
            // address of a live block of the type matching `op`.
            Op::Open => {
                let block = unsafe { &*(arg as *const OpenBlock) };
                self.open(block)
            }
            Op::Close => {
                let fd = arg as i32;
                if self.handles.remove(&fd).is_some() {
                    0
                } else {
                    self.fail(Errno::EBADF.raw())
                }
            }
            Op::WriteC => {
                let byte = unsafe { *(arg as *const u8) };
                self.console.push(byte);
                0
            }
            Op::Write => {
                let block = unsafe { &*(arg as *const RwBlock) };
                self.write(block)
            }
            Op::Read => {
                let block = unsafe { &*(arg as *const RwBlock) };
                self.read(block)
            }
            Op::Seek => {
                let block = unsafe { &*(arg as *const SeekBlock) };
                match self.handles.get_mut(&block.fd) {
                    Some(handle) => {
                        handle.pos = block.pos as usize;
                        0
                    }
                    None => self.fail(Errno::EBADF.raw()),
                }
            }
            Op::IsTty => match arg as i32 {
                0..=2 => 1,
                fd if self.handles.contains_key(&fd) => 0,
                _ => self.fail(Errno::EBADF.raw()),
            },
            Op::Flen => {
                let fd = arg as i32;
                match self.handles.get(&fd) {
                    Some(handle) => self.files.get(&handle.name).map_or(0, |f| f.len() as i32),
                    None => self.fail(Errno::EBADF.raw()),
                }
            }
            Op::Errno => self.errno,
            Op::ExitExtended => {
                let block = unsafe { &*(arg as *const ExitBlock) };
                self.exits.push((op, block.reason as u32, block.subcode));
                0
            }
            Op::Exit => {
                self.exits.push((op, arg as u32, 0));
                0
            }
            _ => self.fail(Errno::EINVAL.raw()),
        }
    }
}

/// One recorded bus access
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read(usize, u32),
    Write(usize, u32),
    Barrier,
}

#[derive(Default)]
struct BusState {
    mem: BTreeMap<usize, u32>,
    scripted: BTreeMap<usize, VecDeque<u32>>,
    log: Vec<Access>,
}

/// Word-addressed fake MMIO
#[derive(Default)]
pub struct FakeBus {
    state: Mutex<BusState>,
}

impl FakeBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a word without logging it.
    pub fn poke(&self, addr: usize, value: u32) {
        self.state.lock().unwrap().mem.insert(addr, value);
    }

    /// Load a word without logging it.
    pub fn peek(&self, addr: usize) -> u32 {
        self.state.lock().unwrap().mem.get(&addr).copied().unwrap_or(0)
    }

    /// Queue values returned by successive reads of `addr`.
    ///
    /// Once the queue drains, reads fall back to memory.
    pub fn script(&self, addr: usize, values: &[u32]) {
        self.state
            .lock()
            .unwrap()
            .scripted
            .entry(addr)
            .or_default()
            .extend(values.iter().copied());
    }

    pub fn log(&self) -> Vec<Access> {
        self.state.lock().unwrap().log.clone()
    }

    pub fn writes(&self) -> Vec<(usize, u32)> {
        self.log()
            .into_iter()
            .filter_map(|a| match a {
                Access::Write(addr, value) => Some((addr, value)),
                _ => None,
            })
            .collect()
    }

    pub fn clear_log(&self) {
        self.state.lock().unwrap().log.clear();
    }
}

impl Bus for FakeBus {
    fn read32(&self, addr: usize) -> u32 {
        let mut state = self.state.lock().unwrap();
        let value = match state.scripted.get_mut(&addr).and_then(VecDeque::pop_front) {
            Some(value) => value,
            None => state.mem.get(&addr).copied().unwrap_or(0),
        };
        state.log.push(Access::Read(addr, value));
        value
    }

    fn write32(&self, addr: usize, value: u32) {
        let mut state = self.state.lock().unwrap();
        state.mem.insert(addr, value);
        state.log.push(Access::Write(addr, value));
    }

    fn barrier(&self) {
        self.state.lock().unwrap().log.push(Access::Barrier);
    }
}
