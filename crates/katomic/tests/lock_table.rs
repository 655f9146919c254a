mod common;

use katomic::{HostedIrq, LockTable, SLOT_COUNT, slot_index};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};

use common::{CountingIrq, irq_depth, reset, slot_traffic};

#[test]
fn random_addresses_spread_evenly() {
    const SAMPLES: usize = 200_000;
    const SLOTS: usize = 1024;

    let mut rng = StdRng::seed_from_u64(0x6b61_746f_6d69_63);
    let mut hits = vec![0usize; SLOTS];
    for _ in 0..SAMPLES {
        let addr = rng.next_u32() as usize;
        hits[slot_index(addr, SLOTS - 1)] += 1;
    }

    let mean = SAMPLES / SLOTS;
    let max = *hits.iter().max().unwrap();
    let min = *hits.iter().min().unwrap();
    assert!(max < mean * 2, "busiest slot took {max} hits, mean {mean}");
    assert!(min > mean / 2, "quietest slot took {min} hits, mean {mean}");
}

#[test]
fn consecutive_granules_of_one_object_use_distinct_slots() {
    let mask = SLOT_COUNT - 1;
    let base = 0x0040_0000usize;
    let mut seen = vec![false; SLOT_COUNT];
    for granule in 0..SLOT_COUNT {
        let index = slot_index(base + granule * 16, mask);
        assert!(!seen[index], "granule {granule} reused slot {index}");
        seen[index] = true;
    }
}

#[test]
fn addresses_in_one_granule_share_a_slot() {
    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..1000 {
        let addr = rng.next_u64() as usize;
        let granule = addr & !0xf;
        for offset in 0..16 {
            assert_eq!(slot_index(granule + offset, SLOT_COUNT - 1), slot_index(addr, SLOT_COUNT - 1));
        }
    }
}

#[test]
fn nested_guards_restore_interrupt_state_in_order() {
    let table: LockTable<32> = LockTable::new();
    let a = 0x1000;
    let b = 0x1010;
    assert_ne!(table.slot_for(a), table.slot_for(b));

    reset();
    {
        let _outer = table.lock::<CountingIrq>(a);
        assert_eq!(irq_depth(), 1);
        {
            let _inner = table.lock::<CountingIrq>(b);
            assert_eq!(irq_depth(), 2);
        }
        assert_eq!(irq_depth(), 1);
        assert!(table.slot(table.slot_for(a)).is_some_and(|slot| slot.is_locked()));
        assert!(!table.slot(table.slot_for(b)).is_some_and(|slot| slot.is_locked()));
    }
    assert_eq!(irq_depth(), 0);
    assert_eq!(slot_traffic(), (2, 2));
}

#[test]
fn default_slot_count_is_a_power_of_two() {
    assert!(SLOT_COUNT.is_power_of_two());
    let table: LockTable = LockTable::new();
    assert_eq!(table.len(), SLOT_COUNT);
}

#[cfg(feature = "stats")]
#[test]
fn stats_count_every_acquisition() {
    use katomic::StatsSnapshot;

    let table: LockTable<8> = LockTable::new();
    for addr in (0..10).map(|i| i * 0x40) {
        drop(table.lock::<HostedIrq>(addr));
    }
    assert_eq!(
        table.stats(),
        StatsSnapshot {
            acquisitions: 10,
            contended: 0
        }
    );
    table.reset_stats();
    assert_eq!(table.stats().acquisitions, 0);
}

#[test]
fn uncontended_lock_round_trip() {
    let table: LockTable<8> = LockTable::new();
    let guard = table.lock::<HostedIrq>(0x80);
    assert!(table.slot(table.slot_for(0x80)).is_some_and(|slot| slot.is_locked()));
    drop(guard);
    assert!(!table.slot(table.slot_for(0x80)).is_some_and(|slot| slot.is_locked()));
}
