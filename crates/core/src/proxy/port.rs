/// Lowest port handed out; everything below is the privileged range.
pub const MIN_UNPRIVILEGED_PORT: u64 = 1024;

/// Highest valid TCP port.
pub const MAX_PORT: u64 = 65535;

/// Maps a process id to the port its proxy listens on.
///
/// Ids below 1024 are shifted up by 1024, ids above 65535 are folded back
/// with `mod 65535` and re-evaluated. There is no collision detection: two
/// pids mapping to the same port conflict at bind time, and the transport
/// reports that as a bind error.
pub fn port_for_pid(pid: u64) -> u16 {
    let mut value = pid;
    loop {
        if value < MIN_UNPRIVILEGED_PORT {
            value += MIN_UNPRIVILEGED_PORT;
            break;
        }
        if value <= MAX_PORT {
            break;
        }
        value %= MAX_PORT;
    }
    // value is within [1024, 65535] here
    value as u16
}
