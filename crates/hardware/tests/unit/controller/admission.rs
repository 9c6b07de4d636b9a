//! Admission Unit Tests.
//!
//! Verifies row-buffer-hit vs miss admission latency, the row-hit fast path,
//! the outstanding bound, and bank mutual exclusion. Cycle numbers below
//! follow `small_config`: activation 7, read transfer 6, so a miss completes
//! 13 cycles after admission and a hit 7 cycles after admission.

use crate::common::{small_config, TestContext, HIT_LATENCY, MISS_LATENCY};
use nvmsim_core::request::CompletionKind;

// ══════════════════════════════════════════════════════════
// 1. Row-buffer hit vs miss latency
// ══════════════════════════════════════════════════════════

#[test]
fn cold_read_pays_the_activation_penalty() {
    let mut ctx = TestContext::small();
    let read = ctx.push_read(0);
    // Admitted at cycle 1; completes at 1 + activation + transfer.
    let done = ctx.cycle_of_completion(read, 100);
    assert_eq!(done, 1 + MISS_LATENCY);
    assert_eq!(ctx.ctrl.stats().row_misses, 1);
    assert_eq!(ctx.ctrl.stats().row_hits, 0);
}

#[test]
fn open_row_read_is_admitted_in_one_cycle() {
    let mut ctx = TestContext::small();
    let first = ctx.push_read(0);
    let _ = ctx.cycle_of_completion(first, 100);
    ctx.run_until_idle(100);
    let idle_at = ctx.ctrl.cycle();

    // Row 0 is still open in bank 0: the second read is a hit, device-ready
    // after a single cycle instead of the activation window.
    let second = ctx.push_read(8);
    let done = ctx.cycle_of_completion(second, 100);
    assert_eq!(done, idle_at + 1 + HIT_LATENCY);
    assert_eq!(ctx.ctrl.stats().row_hits, 1);
}

#[test]
fn closed_row_on_same_bank_misses_again() {
    let mut ctx = TestContext::small();
    let first = ctx.push_read(0);
    let _ = ctx.cycle_of_completion(first, 100);
    ctx.run_until_idle(100);
    let idle_at = ctx.ctrl.cycle();

    // 1024 maps to bank 0 as well, but row 4: activation again.
    let second = ctx.push_read(1024);
    let done = ctx.cycle_of_completion(second, 100);
    assert_eq!(done, idle_at + 1 + MISS_LATENCY);
    assert_eq!(ctx.ctrl.stats().row_misses, 2);
}

// ══════════════════════════════════════════════════════════
// 2. Row-hit fast path
// ══════════════════════════════════════════════════════════

/// A younger row-hit read overtakes an older unrelated miss: hits must never
/// wait behind an earlier miss to a different bank.
#[test]
fn row_hit_overtakes_older_miss() {
    let mut ctx = TestContext::small();
    let warm = ctx.push_read(256); // opens row 1 in bank 1
    let _ = ctx.cycle_of_completion(warm, 100);
    ctx.run_until_idle(100);

    let miss = ctx.push_read(512); // bank 2, closed row — older
    let hit = ctx.push_read(272); // bank 1, open row 1 — younger
    ctx.run_until_idle(200);

    let hit_pos = ctx.log.iter().position(|c| c.id == hit).unwrap();
    let miss_pos = ctx.log.iter().position(|c| c.id == miss).unwrap();
    assert!(
        hit_pos < miss_pos,
        "row-buffer hit must complete before the older miss"
    );
    assert_eq!(ctx.ctrl.stats().row_hits, 1);
    assert_eq!(ctx.ctrl.stats().row_misses, 2);
}

// ══════════════════════════════════════════════════════════
// 3. Outstanding bound
// ══════════════════════════════════════════════════════════

/// With `max_outstanding = 1`, a second read stays queued until the first
/// bank unlocks, even though it targets a different, idle bank.
#[test]
fn outstanding_bound_holds_second_read_queued() {
    let mut config = small_config();
    config.scheduler.max_outstanding = 1;
    let mut ctx = TestContext::new(config);

    let first = ctx.push_read(256);
    let second = ctx.push_read(0);

    let first_done = ctx.cycle_of_completion(first, 100);
    assert_eq!(first_done, 1 + MISS_LATENCY);

    // The second read is admitted the same cycle the first completes
    // (completions are processed before admissions) and pays its own full
    // miss latency from there.
    let second_done = ctx.cycle_of_completion(second, 100);
    assert_eq!(second_done, first_done + MISS_LATENCY);
    assert_eq!(ctx.ctrl.stats().peak_outstanding, 1);
}

/// Without the bound the same two reads overlap and only serialize on the
/// rank bus.
#[test]
fn unbounded_reads_overlap() {
    let mut ctx = TestContext::small();
    let first = ctx.push_read(256);
    let second = ctx.push_read(0);
    let first_done = ctx.cycle_of_completion(first, 100);
    let second_done = ctx.cycle_of_completion(second, 100);
    assert_eq!(first_done, 1 + MISS_LATENCY);
    assert!(
        second_done < first_done + MISS_LATENCY,
        "overlapped read must finish sooner than serialized ({second_done})"
    );
    assert_eq!(ctx.ctrl.stats().peak_outstanding, 2);
}

// ══════════════════════════════════════════════════════════
// 4. Bank mutual exclusion
// ══════════════════════════════════════════════════════════

/// Two reads to the same bank can never be in flight together: the second is
/// admitted only after the first unlocks the bank.
#[test]
fn same_bank_reads_serialize() {
    let mut ctx = TestContext::small();
    let first = ctx.push_read(0); // bank 0, row 0
    let second = ctx.push_read(1024); // bank 0, row 4

    let first_done = ctx.cycle_of_completion(first, 100);
    let second_done = ctx.cycle_of_completion(second, 100);
    assert_eq!(first_done, 1 + MISS_LATENCY);
    assert_eq!(second_done, first_done + MISS_LATENCY);
    assert_eq!(
        ctx.ctrl.stats().peak_outstanding,
        1,
        "the same bank never carries two in-flight requests"
    );
}

// ══════════════════════════════════════════════════════════
// 5. Write acknowledgement
// ══════════════════════════════════════════════════════════

/// Writes are acknowledged when buffered and occupy no device slot.
#[test]
fn buffered_write_acknowledges_immediately() {
    let mut ctx = TestContext::small();
    let write = ctx.push_write(0x100);
    ctx.tick_n(1);
    let ack = ctx.single_completion(write, CompletionKind::BufferedAck);
    assert_eq!(ack.addr, 0x100);
    assert_eq!(ctx.ctrl.stats().writes_buffered, 1);
    assert_eq!(ctx.ctrl.stats().peak_outstanding, 0);
}
