//! Test double for [`Platform`]: nothing privileged runs, every call is
//! appended to `ops` and the CPU's stack pointer / CR3 are plain fields.

use std::collections::{BTreeMap, VecDeque};
use std::vec::Vec;

use super::{Platform, SavedContext};
use crate::devices::vga_text::{BUFFER_HEIGHT, BUFFER_WIDTH};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    In(u16),
    Out(u16, u8),
    LoadPageTable(u64),
    LoadDescriptorTable { base: u64, limit: u16 },
    InterruptFlag(bool),
    Switch { saved: SavedContext, loaded: SavedContext },
}

pub struct RecordingPlatform {
    pub ops: Vec<Op>,
    /// Live CPU registers as the switch routine would see them.
    pub cpu: SavedContext,
    pub cells: Vec<u16>,
    pub cell_writes: usize,
    pub probes: Vec<u64>,
    inputs: BTreeMap<u16, VecDeque<u8>>,
}

impl RecordingPlatform {
    pub fn new() -> Self {
        Self {
            ops: Vec::new(),
            cpu: SavedContext::EMPTY,
            cells: vec![0; BUFFER_WIDTH * BUFFER_HEIGHT],
            cell_writes: 0,
            probes: Vec::new(),
            inputs: BTreeMap::new(),
        }
    }

    /// Queue bytes returned by successive reads of `port`; reads past the
    /// queue return 0.
    pub fn feed(&mut self, port: u16, bytes: &[u8]) {
        self.inputs.entry(port).or_default().extend(bytes.iter().copied());
    }

    pub fn writes_to(&self, port: u16) -> Vec<u8> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                Op::Out(p, v) if *p == port => Some(*v),
                _ => None,
            })
            .collect()
    }

    pub fn position(&self, wanted: Op) -> Option<usize> {
        self.ops.iter().position(|op| *op == wanted)
    }

    pub fn switches(&self) -> Vec<(SavedContext, SavedContext)> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                Op::Switch { saved, loaded } => Some((*saved, *loaded)),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&mut self) {
        self.ops.clear();
        self.probes.clear();
        self.cell_writes = 0;
    }
}

impl Platform for RecordingPlatform {
    fn read_port8(&mut self, port: u16) -> u8 {
        self.ops.push(Op::In(port));
        self.inputs
            .get_mut(&port)
            .and_then(|queue| queue.pop_front())
            .unwrap_or(0)
    }

    fn write_port8(&mut self, port: u16, value: u8) {
        self.ops.push(Op::Out(port, value));
    }

    unsafe fn load_page_table(&mut self, root: u64) {
        self.cpu.address_space = root;
        self.ops.push(Op::LoadPageTable(root));
    }

    unsafe fn load_descriptor_table(&mut self, base: u64, limit: u16) {
        self.ops.push(Op::LoadDescriptorTable { base, limit });
    }

    fn set_interrupt_flag(&mut self, enabled: bool) {
        self.ops.push(Op::InterruptFlag(enabled));
    }

    fn table_address(&self, virt: u64) -> u64 {
        virt
    }

    unsafe fn switch_context(&mut self, save: &mut SavedContext, load: &SavedContext) {
        *save = self.cpu;
        self.cpu = *load;
        self.ops.push(Op::Switch {
            saved: *save,
            loaded: *load,
        });
    }

    fn probe_byte(&mut self, addr: u64) -> u8 {
        self.probes.push(addr);
        0
    }

    fn read_cell(&mut self, index: usize) -> u16 {
        self.cells[index]
    }

    fn write_cell(&mut self, index: usize, value: u16) {
        self.cell_writes += 1;
        self.cells[index] = value;
    }
}
