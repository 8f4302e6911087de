// libs/booking-cell/tests/slots_test.rs
//
// Slot generation: packing score, buffers, determinism, degenerate windows.

use chrono::{DateTime, Duration, TimeZone, Utc};
use uuid::Uuid;

use booking_cell::models::{BookingError, BusyRange, SlotOption, SlotRequest};
use booking_cell::services::slots::{generate_slots, RECOMMENDED_SLOT_LIMIT};
use schedule_cell::models::WorkWindow;

fn at(h: u32, m: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 9, 7, h, m, 0).unwrap()
}

fn request(
    window: (u32, u32, u32, u32),
    duration: i64,
    buffers: (i64, i64),
    granularity: i64,
    busy: Vec<BusyRange>,
) -> SlotRequest {
    SlotRequest {
        staff_id: Uuid::new_v4(),
        window: WorkWindow {
            staff_id: Uuid::new_v4(),
            starts_at: at(window.0, window.1),
            ends_at: at(window.2, window.3),
        },
        service_duration_min: duration,
        buffer_before_min: buffers.0,
        buffer_after_min: buffers.1,
        granularity_min: granularity,
        busy,
    }
}

fn slot_at(slots: &[SlotOption], h: u32, m: u32) -> Option<&SlotOption> {
    slots.iter().find(|slot| slot.starts_at == at(h, m))
}

#[test]
fn slots_adjacent_to_bookings_rank_ahead_of_isolated_ones() {
    // 09:00-18:00 window, one booking at 12:00-13:00, 60min service.
    let busy = vec![BusyRange { starts_at: at(12, 0), ends_at: at(13, 0) }];
    let slots = generate_slots(&request((9, 0, 18, 0), 60, (0, 0), 15, busy)).unwrap();

    let adjacent_before = slot_at(&slots, 11, 0).expect("11:00 should be offered");
    let adjacent_after = slot_at(&slots, 13, 0).expect("13:00 should be offered");
    let opening = slot_at(&slots, 9, 0).expect("09:00 should be offered");

    assert!(adjacent_before.score < opening.score);
    assert!(adjacent_after.score < opening.score);

    // Ranked output puts the tight slots first.
    assert!(slots[0].score <= slots[slots.len() - 1].score);
}

#[test]
fn candidates_overlapping_a_booking_are_excluded() {
    let busy = vec![BusyRange { starts_at: at(12, 0), ends_at: at(13, 0) }];
    let slots = generate_slots(&request((9, 0, 18, 0), 60, (0, 0), 15, busy)).unwrap();

    // Anything starting in (11:00, 13:00) would collide with the booking.
    assert!(slot_at(&slots, 11, 15).is_none());
    assert!(slot_at(&slots, 11, 30).is_none());
    assert!(slot_at(&slots, 12, 0).is_none());
    assert!(slot_at(&slots, 12, 45).is_none());

    // Touching the booking on either side is fine.
    assert!(slot_at(&slots, 11, 0).is_some());
    assert!(slot_at(&slots, 13, 0).is_some());
}

#[test]
fn buffers_extend_the_conflict_footprint() {
    let busy = vec![BusyRange { starts_at: at(12, 0), ends_at: at(13, 0) }];
    // 10min buffer after: a 60min service started at 11:00 now occupies
    // 11:00-12:10 and collides with the booking.
    let slots = generate_slots(&request((9, 0, 18, 0), 60, (0, 10), 15, busy)).unwrap();

    assert!(slot_at(&slots, 11, 0).is_none());
    assert!(slot_at(&slots, 10, 45).is_some());
}

#[test]
fn generation_is_deterministic() {
    let busy = vec![
        BusyRange { starts_at: at(10, 0), ends_at: at(10, 30) },
        BusyRange { starts_at: at(14, 0), ends_at: at(15, 0) },
    ];
    let req = request((9, 0, 18, 0), 30, (5, 5), 15, busy);

    let first = generate_slots(&req).unwrap();
    let second = generate_slots(&req).unwrap();
    assert_eq!(first, second);
}

#[test]
fn service_longer_than_window_yields_no_slots() {
    // 600min service in a 540min window: no candidate can finish.
    let slots = generate_slots(&request((9, 0, 18, 0), 600, (0, 0), 15, vec![])).unwrap();
    assert!(slots.is_empty());
}

#[test]
fn recommended_is_suppressed_when_buffers_overflow_the_window() {
    // 50min service fits the 60min window, but with 10min buffers on both
    // sides the full span (70min) cannot: candidates remain, none recommended.
    let slots = generate_slots(&request((9, 0, 10, 0), 50, (10, 10), 15, vec![])).unwrap();
    assert!(!slots.is_empty());
    assert!(slots.iter().all(|slot| !slot.recommended));
}

#[test]
fn at_most_the_top_ranked_slots_are_recommended() {
    let slots = generate_slots(&request((9, 0, 18, 0), 30, (0, 0), 15, vec![])).unwrap();

    let recommended: Vec<&SlotOption> = slots.iter().filter(|slot| slot.recommended).collect();
    assert_eq!(recommended.len(), RECOMMENDED_SLOT_LIMIT);
    // The recommended ones are exactly the head of the ranking.
    assert!(slots[..RECOMMENDED_SLOT_LIMIT].iter().all(|slot| slot.recommended));
    assert!(slots[RECOMMENDED_SLOT_LIMIT..].iter().all(|slot| !slot.recommended));
}

#[test]
fn slot_must_finish_inside_the_window() {
    let slots = generate_slots(&request((9, 0, 10, 0), 45, (0, 0), 15, vec![])).unwrap();

    // 09:30 + 45min would end at 10:15, past the window.
    assert!(slot_at(&slots, 9, 0).is_some());
    assert!(slot_at(&slots, 9, 15).is_some());
    assert!(slot_at(&slots, 9, 30).is_none());
}

#[test]
fn fully_booked_day_yields_no_slots() {
    let busy = vec![BusyRange { starts_at: at(9, 0), ends_at: at(18, 0) }];
    let slots = generate_slots(&request((9, 0, 18, 0), 30, (0, 0), 15, busy)).unwrap();
    assert!(slots.is_empty());
}

#[test]
fn invalid_inputs_are_rejected() {
    let zero_duration = generate_slots(&request((9, 0, 18, 0), 0, (0, 0), 15, vec![]));
    assert!(matches!(zero_duration, Err(BookingError::ValidationError(_))));

    let odd_granularity = generate_slots(&request((9, 0, 18, 0), 30, (0, 0), 7, vec![]));
    assert!(matches!(odd_granularity, Err(BookingError::ValidationError(_))));

    let negative_buffer = generate_slots(&request((9, 0, 18, 0), 30, (-5, 0), 15, vec![]));
    assert!(matches!(negative_buffer, Err(BookingError::ValidationError(_))));

    let inverted_window = generate_slots(&request((18, 0, 9, 0), 30, (0, 0), 15, vec![]));
    assert!(matches!(inverted_window, Err(BookingError::ValidationError(_))));

    let inverted_busy = generate_slots(&request(
        (9, 0, 18, 0),
        30,
        (0, 0),
        15,
        vec![BusyRange { starts_at: at(12, 0), ends_at: at(11, 0) }],
    ));
    assert!(matches!(inverted_busy, Err(BookingError::ValidationError(_))));
}

#[test]
fn slot_duration_matches_the_service() {
    let slots = generate_slots(&request((9, 0, 12, 0), 45, (10, 10), 15, vec![])).unwrap();
    for slot in &slots {
        assert_eq!(slot.ends_at - slot.starts_at, Duration::minutes(45));
    }
}
