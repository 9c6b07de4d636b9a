//! Drain-Path Unit Tests.
//!
//! Verifies flush triggering and opportunistic drains, adaptive write-group
//! locking, modulo scheduling, and write cancellation.

use crate::common::{small_config, TestContext, MISS_LATENCY};

// ══════════════════════════════════════════════════════════
// 1. Flush triggering
// ══════════════════════════════════════════════════════════

/// An idle queue drains the buffer opportunistically, below any threshold.
#[test]
fn idle_queue_drains_opportunistically() {
    let mut ctx = TestContext::small();
    let _ = ctx.push_write(0);
    ctx.run_until_idle(100);
    assert_eq!(ctx.ctrl.stats().writes_drained, 1);
}

/// Crossing the high threshold forces the drain path even with reads queued;
/// writes own the device until the rank frees up for reads again.
#[test]
fn latched_flush_preempts_queued_reads() {
    let mut ctx = TestContext::small();
    for bank in 0..3 {
        let _ = ctx.push_write(bank * 256); // latches flush at 3 of 4
    }
    ctx.tick_n(3);
    assert_eq!(ctx.ctrl.stats().writes_buffered, 3);

    let read = ctx.push_read(768); // bank 3, untouched by the writes
    let done = ctx.cycle_of_completion(read, 400);

    // Cycle 4 drains (flush latched); the read cannot be admitted before the
    // drain's rank window closes at cycle 4 + 13.
    assert!(
        done > 17,
        "read must wait out the drain's rank window, completed at {done}"
    );
    assert!(ctx.ctrl.stats().writes_drained >= 1);
    ctx.run_until_idle(400);
    assert_eq!(ctx.ctrl.stats().writes_drained, 3);
}

// ══════════════════════════════════════════════════════════
// 2. Adaptive write-group locking
// ══════════════════════════════════════════════════════════

/// Only the locked group may drain; rotation picks the group with the most
/// buffered writes, after which the deferred drains proceed.
#[test]
fn adaptive_lock_confines_drains_to_one_group() {
    let mut config = small_config();
    config.scheduler.adaptive_writes = true;
    config.scheduler.group_size = 2; // groups: banks {0,1} and {2,3}
    config.scheduler.lock_period = 5;
    let mut ctx = TestContext::new(config);

    let _ = ctx.push_write(512); // bank 2, group 1
    let _ = ctx.push_write(768); // bank 3, group 1
    let _ = ctx.push_write(0); // bank 0, group 0
    ctx.run_until_idle(400);

    assert_eq!(ctx.ctrl.stats().writes_drained, 3);
    assert!(
        ctx.ctrl.stats().drains_deferred_group >= 2,
        "group-1 writes must wait while group 0 holds the lock"
    );
}

/// Reads into the locked group are blocked for the whole period.
#[test]
fn adaptive_lock_blocks_reads_into_locked_group() {
    let mut config = small_config();
    config.scheduler.adaptive_writes = true;
    config.scheduler.group_size = 2;
    config.scheduler.lock_period = 30;
    let mut ctx = TestContext::new(config);

    // Group 0 (banks 0-1) is locked from the start.
    let blocked = ctx.push_read(0); // bank 0 — inside the locked group
    let free = ctx.push_read(512); // bank 2 — outside

    let free_done = ctx.cycle_of_completion(free, 400);
    assert_eq!(free_done, 1 + MISS_LATENCY);

    // The blocked read is admitted by the rotation at cycle 30, which moves
    // the lock off its group, and pays its miss latency from there.
    let blocked_done = ctx.cycle_of_completion(blocked, 400);
    assert_eq!(blocked_done, 30 + MISS_LATENCY);
}

// ══════════════════════════════════════════════════════════
// 3. Modulo scheduling
// ══════════════════════════════════════════════════════════

/// Modulo scheduling guarantees write service under a read-heavy queue even
/// though the buffer never reaches its flush threshold.
#[test]
fn modulo_slot_drains_below_threshold() {
    let mut config = small_config();
    config.scheduler.modulo_scheduling = true;
    config.scheduler.modulo_unit = 4;
    let mut ctx = TestContext::new(config);

    let _ = ctx.push_write(768); // single write, occupancy 1 of 4
    for row in 0..6 {
        let _ = ctx.push_read(row * 1024); // a steady diet of bank-0 reads
    }
    ctx.tick_n(40);
    assert_eq!(
        ctx.ctrl.stats().writes_drained,
        1,
        "the forced slot must drain the write despite queued reads"
    );
    ctx.run_until_idle(800);
    assert_eq!(ctx.ctrl.stats().device_reads_completed, 6);
}

// ══════════════════════════════════════════════════════════
// 4. Write cancellation
// ══════════════════════════════════════════════════════════

fn cancel_config(enabled: bool) -> nvmsim_core::Config {
    let mut config = small_config();
    config.scheduler.write_cancellation = enabled;
    config.scheduler.write_cancel_threshold = 100;
    config
}

/// A read reclaims a bank from an in-flight write inside the cancellation
/// window; the write re-enters the buffer as a stub and drains again later.
#[test]
fn read_reclaims_bank_from_inflight_write() {
    let mut ctx = TestContext::new(cancel_config(true));
    let _ = ctx.push_write(0);
    ctx.tick_n(2); // buffered at cycle 1, drained at cycle 2 (until 15)

    let read = ctx.push_read(1024); // bank 0, different row
    let done = ctx.cycle_of_completion(read, 400);

    assert_eq!(ctx.ctrl.stats().writes_canceled, 1);
    // Admitted at cycle 3 right after the cancel: 3 + activation + transfer.
    assert_eq!(done, 3 + MISS_LATENCY);

    ctx.run_until_idle(400);
    assert_eq!(
        ctx.ctrl.stats().writes_drained,
        2,
        "the canceled write must drain a second time"
    );
}

/// The same read without cancellation waits for the write to finish.
#[test]
fn without_cancellation_the_read_waits() {
    let mut ctx = TestContext::new(cancel_config(false));
    let _ = ctx.push_write(0);
    ctx.tick_n(2);

    let read = ctx.push_read(1024);
    let done = ctx.cycle_of_completion(read, 400);

    assert_eq!(ctx.ctrl.stats().writes_canceled, 0);
    // The write holds the bank until cycle 15.
    assert_eq!(done, 15 + MISS_LATENCY);
}

/// A tight threshold keeps the write running: 5% of a 13-cycle service is a
/// window under one cycle, so no remaining time ever falls inside it.
#[test]
fn tight_threshold_never_cancels() {
    let mut config = cancel_config(true);
    config.scheduler.write_cancel_threshold = 5;
    let mut ctx = TestContext::new(config);
    let _ = ctx.push_write(0);
    ctx.tick_n(2);

    let read = ctx.push_read(1024);
    let done = ctx.cycle_of_completion(read, 400);
    assert_eq!(ctx.ctrl.stats().writes_canceled, 0);
    assert_eq!(done, 15 + MISS_LATENCY);
}

/// A read covered by the canceled write itself is served from the stub in
/// the buffer, not from the device.
#[test]
fn canceled_write_serves_its_own_reader() {
    let mut ctx = TestContext::new(cancel_config(true));
    let _ = ctx.push_write(0);
    ctx.tick_n(2);

    let read = ctx.push_read(0); // same line as the in-flight write
    ctx.run_until_idle(400);

    assert_eq!(ctx.ctrl.stats().writes_canceled, 1);
    let _ = ctx.single_completion(read, nvmsim_core::request::CompletionKind::WriteBuffer);
    assert_eq!(ctx.ctrl.stats().device_reads_completed, 0);
}
