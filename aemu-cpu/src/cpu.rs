// SPDX-FileCopyrightText: 2026 aemu contributors
// SPDX-License-Identifier: GPL-3.0-or-later

//! The machine: register state, memory window, and the
//! fetch-decode-execute loop.

use crate::decoder::decode;
use crate::host::{Host, SvcOutcome};
use crate::interpreter::{execute, StepResult};
use crate::memory::MemoryWindow;
use crate::state::CpuState;
use crate::trace;

/// A single-threaded AArch64 user-mode machine.
pub struct Cpu {
    pub state: CpuState,
    pub mem: MemoryWindow,
    stack_size: u64,
    trace: bool,
    stop_requested: bool,
    cycles_so_far: u64,
}

impl Cpu {
    /// Build a machine over a host-allocated memory image. `base` is the
    /// guest address of the first byte of `memory`; the top `stack_size`
    /// bytes are the stack. SP starts at `stack_top`, PC at `entry_pc`,
    /// everything else at zero.
    ///
    /// A `stack_size` of zero disables the SP placement checks, for
    /// harnesses that lay memory out their own way.
    pub fn new(memory: Vec<u8>, base: u64, entry_pc: u64, stack_size: u64, stack_top: u64) -> Self {
        let mut state = CpuState::new();
        state.pc = entry_pc;
        state.sp = stack_top;
        Self {
            state,
            mem: MemoryWindow::new(memory, base),
            stack_size,
            trace: false,
            stop_requested: false,
            cycles_so_far: 0,
        }
    }

    /// Enable or disable per-instruction tracing; returns the previous
    /// setting.
    pub fn trace_instructions(&mut self, enable: bool) -> bool {
        std::mem::replace(&mut self.trace, enable)
    }

    /// Ask the run loop to exit before executing another instruction.
    pub fn end_emulation(&mut self) {
        self.stop_requested = true;
    }

    /// Total instructions executed over the lifetime of the machine.
    pub fn cycles(&self) -> u64 {
        self.cycles_so_far
    }

    /// Run up to `max_cycles` instructions. Returns the number actually
    /// executed; on return PC points at the next instruction.
    pub fn run(&mut self, max_cycles: u64, host: &mut dyn Host) -> u64 {
        let mut executed = 0u64;

        while executed < max_cycles {
            if self.stop_requested {
                self.stop_requested = false;
                break;
            }

            #[cfg(debug_assertions)]
            self.check_invariants(host);

            let raw = match self.mem.read_u32(self.state.pc) {
                Ok(v) => v,
                Err(_) => host.hard_termination(
                    &self.state,
                    "instruction fetch outside address space",
                    self.state.pc,
                ),
            };
            let inst = decode(raw);

            if self.trace {
                log::trace!("{}", trace::render(&self.state, raw, &inst, host));
            }

            executed += 1;
            self.cycles_so_far += 1;

            match execute(&mut self.state, &mut self.mem, &inst) {
                StepResult::Continue => {
                    self.state.pc = self.state.pc.wrapping_add(4);
                }
                StepResult::BranchTaken => {}
                StepResult::Svc(_) => {
                    self.state.pc = self.state.pc.wrapping_add(4);
                    if host.supervisor_call(&mut self.state, &mut self.mem) == SvcOutcome::Stop {
                        break;
                    }
                }
                StepResult::MemoryFault(addr) => host.hard_termination(
                    &self.state,
                    "memory reference outside address space",
                    addr,
                ),
                StepResult::Fatal { msg, value } => {
                    host.hard_termination(&self.state, msg, value)
                }
            }
        }

        executed
    }

    /// Machine invariants, checked between instructions in debug builds.
    #[cfg(debug_assertions)]
    fn check_invariants(&mut self, host: &mut dyn Host) {
        let state = &self.state;
        if state.pc & 3 != 0 {
            host.hard_termination(state, "pc is misaligned", state.pc);
        }
        let code_end = self.mem.end() - self.stack_size;
        if state.pc < self.mem.base() || state.pc >= code_end {
            host.hard_termination(state, "pc outside the code range", state.pc);
        }
        if self.stack_size != 0 {
            if state.sp & 0xF != 0 {
                host.hard_termination(state, "sp is misaligned", state.sp);
            }
            if state.sp < code_end || state.sp > self.mem.end() {
                host.hard_termination(state, "sp outside the stack range", state.sp);
            }
        }
    }
}
