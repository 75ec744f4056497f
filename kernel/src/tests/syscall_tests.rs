//! Syscall Unit Tests
//!
//! Tests for the trap path and the print / exit / backtrace handlers.

#[cfg(test)]
mod tests {
    use crate::machine::{Fault, Machine, PowerState, ScheduleOutcome};
    use crate::memory::GuestMemory;
    use crate::process::{Pid, ProcessState};
    use crate::syscall::{do_syscall, SyscallArgs, SyscallError, SyscallNumber};
    use crate::testing::RecordingHost;

    const ENTRY: u64 = 0x8100_0000;

    /// Machine with one process running at `ENTRY`.
    fn running_machine() -> (Machine<RecordingHost>, Pid) {
        let mut machine = Machine::new(RecordingHost::default());
        let pid = machine.scheduler_mut().procs_mut().alloc(None).unwrap();
        machine.scheduler_mut().procs_mut().get_mut(pid).unwrap().trapframe.epc = ENTRY;
        machine.scheduler_mut().insert_ready(pid);
        assert_eq!(machine.schedule(), Ok(ScheduleOutcome::Switched(pid)));
        (machine, pid)
    }

    fn trap(machine: &mut Machine<RecordingHost>, pid: Pid, num: u64, args: &[u64]) -> Result<i64, Fault> {
        let frame = &mut machine.scheduler_mut().procs_mut().get_mut(pid).unwrap().trapframe;
        let regs = SyscallArgs::new(num, args);
        frame.a0 = regs.a0;
        frame.a1 = regs.a1;
        frame.a2 = regs.a2;
        machine.handle_syscall_trap()
    }

    // ========================================
    // Dispatch Tests
    // ========================================

    #[test]
    fn test_syscall_numbers() {
        assert_eq!(SyscallNumber::try_from(64u64), Ok(SyscallNumber::UserPrint));
        assert_eq!(SyscallNumber::try_from(65u64), Ok(SyscallNumber::UserExit));
        assert_eq!(SyscallNumber::try_from(66u64), Ok(SyscallNumber::UserPrintBacktrace));
        assert_eq!(SyscallNumber::try_from(63u64), Err(63));
    }

    #[test]
    fn test_error_codes_are_negative() {
        for err in [SyscallError::NoCurrentProcess, SyscallError::BadAddress] {
            assert!(err.code() < 0);
        }
    }

    #[test]
    fn test_trap_advances_epc_and_sets_a0() {
        let (mut machine, pid) = running_machine();
        machine.memory_mut().write(0x8100_1000, b"ok").unwrap();

        assert_eq!(trap(&mut machine, pid, 64, &[0x8100_1000, 2]), Ok(0));
        let frame = machine.scheduler().process(pid).unwrap().trapframe;
        assert_eq!(frame.epc, ENTRY + 4);
        assert_eq!(frame.a0, 0);
    }

    #[test]
    fn test_unknown_syscall_halts() {
        let (mut machine, pid) = running_machine();

        assert_eq!(trap(&mut machine, pid, 99, &[]), Err(Fault::UnknownSyscall(99)));
        assert_eq!(machine.power_state(), PowerState::Halted(Fault::UnknownSyscall(99)));
        assert_eq!(machine.host().shutdowns, vec![crate::config::FAULT_EXIT_CODE]);
        assert!(machine.host().console_str().contains("KERNEL PANIC"));
        assert!(machine.host().console_str().contains("Unknown syscall 99"));

        // A halted machine takes no more traps
        assert_eq!(machine.handle_syscall_trap(), Err(Fault::Halted));
    }

    #[test]
    fn test_trap_without_current_process() {
        let mut machine = Machine::new(RecordingHost::default());
        assert_eq!(
            machine.handle_syscall_trap(),
            Ok(SyscallError::NoCurrentProcess.code())
        );
    }

    // ========================================
    // Print Tests
    // ========================================

    #[test]
    fn test_print_writes_exact_bytes() {
        let (mut machine, pid) = running_machine();
        machine.memory_mut().write(0x8100_1000, b"Hello world!\nTRAILING").unwrap();

        assert_eq!(trap(&mut machine, pid, 64, &[0x8100_1000, 13]), Ok(0));
        assert_eq!(machine.host().console, b"Hello world!\n");
    }

    #[test]
    fn test_print_large_buffer_across_pages() {
        let (mut machine, pid) = running_machine();
        let payload: Vec<u8> = (0..10_000u32).map(|i| b'a' + (i % 26) as u8).collect();
        machine.memory_mut().write(0x8100_0F00, &payload).unwrap();

        assert_eq!(trap(&mut machine, pid, 64, &[0x8100_0F00, payload.len() as u64]), Ok(0));
        assert_eq!(machine.host().console, payload);
    }

    #[test]
    fn test_print_bad_address() {
        let (mut machine, pid) = running_machine();
        assert_eq!(
            trap(&mut machine, pid, 64, &[0x9000_0000, 4]),
            Ok(SyscallError::BadAddress.code())
        );
        assert!(machine.host().console.is_empty());
        assert!(machine.is_running());
    }

    #[test]
    fn test_print_empty_buffer() {
        let (mut machine, pid) = running_machine();
        assert_eq!(trap(&mut machine, pid, 64, &[0, 0]), Ok(0));
        assert!(machine.host().console.is_empty());
    }

    // ========================================
    // Exit Tests
    // ========================================

    #[test]
    fn test_exit_shuts_down_with_code() {
        let (mut machine, pid) = running_machine();

        assert_eq!(trap(&mut machine, pid, 65, &[7]), Ok(0));
        assert_eq!(machine.power_state(), PowerState::Off(7));
        assert_eq!(machine.host().shutdowns, vec![7]);
        assert_eq!(machine.current(), None);
        assert_eq!(machine.scheduler().process(pid).unwrap().state(), ProcessState::Zombie);
    }

    #[test]
    fn test_exit_negative_code() {
        let (mut machine, pid) = running_machine();
        assert_eq!(trap(&mut machine, pid, 65, &[(-3i64) as u64]), Ok(0));
        assert_eq!(machine.power_state(), PowerState::Off(-3));
    }

    // ========================================
    // Backtrace Tests
    // ========================================

    #[test]
    fn test_backtrace_requires_current_process() {
        let mut machine = Machine::new(RecordingHost::default());
        let args = SyscallArgs::new(66, &[4]);
        assert_eq!(
            do_syscall(&mut machine, args),
            Ok(SyscallError::NoCurrentProcess.code())
        );
    }

    #[test]
    fn test_backtrace_without_symbols_counts_frames() {
        let (mut machine, pid) = running_machine();
        let fp = 0x8110_0000 - 0x40;
        for i in 0..4u64 {
            machine.memory_mut().write_u64(fp + i * 0x10 + 8, 0x8100_0100).unwrap();
        }
        machine.scheduler_mut().procs_mut().get_mut(pid).unwrap().trapframe.s0 = fp;

        assert_eq!(trap(&mut machine, pid, 66, &[3]), Ok(3));
        assert!(machine.host().console.is_empty());
    }

    #[test]
    fn test_backtrace_zero_frame_pointer() {
        let (mut machine, pid) = running_machine();
        assert_eq!(trap(&mut machine, pid, 66, &[8]), Ok(0));
    }
}
