use crate::peer::ice::candidate_type;
use crate::peer::types::IceCandidate;

fn enabled() -> bool {
    // In debug builds dev::ENABLE_LOGGING can still switch it off
    crate::config::LOGGING_ENABLED && crate::config::dev::ENABLE_LOGGING
}

fn emit(level: &str, msg: &str) {
    if !enabled() {
        return;
    }
    let now = chrono::Local::now();
    println!(
        "peercall: [{}] {}{}",
        now.format("%Y-%m-%d %H:%M:%S%.3f"),
        level,
        msg
    );
}

/// Timestamped log line
pub fn log(msg: &str) {
    emit("", msg);
}

/// Dropped traffic and protocol-state violations
pub fn warn(msg: &str) {
    emit("WARN ", msg);
}

/// Prints a trickled ICE candidate (verbose builds only)
pub fn dump_candidate(label: &str, cand: &IceCandidate) {
    if !crate::config::dev::VERBOSE_LOGGING {
        return;
    }
    log(&format!(
        "Trickle {label}: type={} candidate={} sdp_mid={:?} sdp_mline_index={:?}",
        candidate_type(cand),
        cand.candidate,
        cand.sdp_mid,
        cand.sdp_mline_index
    ));
}
