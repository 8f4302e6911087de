use chrono::Duration;
use tracing::debug;

use crate::models::{BookingError, SlotOption, SlotRequest};
use crate::services::timerange::{overlaps, whole_minutes_between};

/// Slot steps a business may configure, in minutes.
pub const ALLOWED_GRANULARITIES_MIN: [i64; 3] = [5, 10, 15];

/// How many top-ranked slots get the `recommended` flag. Tunable contract
/// value, not a structural invariant.
pub const RECOMMENDED_SLOT_LIMIT: usize = 8;

/// Compute the bookable start times for one staff member over one working
/// window, ranked by packing score (lower = tighter against existing
/// bookings, to reduce fragmentation of the staff's free time).
///
/// Pure and deterministic: identical inputs yield identical, identically
/// ordered output. The caller excludes cancelled appointments from `busy`
/// before calling.
pub fn generate_slots(request: &SlotRequest) -> Result<Vec<SlotOption>, BookingError> {
    validate(request)?;

    let work_start = request.window.starts_at;
    let work_end = request.window.ends_at;
    let step = Duration::minutes(request.granularity_min);
    let total_needed_min =
        request.service_duration_min + request.buffer_before_min + request.buffer_after_min;

    let mut slots = Vec::new();
    let mut cursor = work_start;

    while cursor < work_end {
        let effective_start = cursor - Duration::minutes(request.buffer_before_min);
        let effective_end =
            cursor + Duration::minutes(request.service_duration_min + request.buffer_after_min);

        // Service must be able to finish inside the window.
        if whole_minutes_between(work_end, cursor) < request.service_duration_min {
            cursor += step;
            continue;
        }

        let conflict = request
            .busy
            .iter()
            .any(|range| overlaps(effective_start, effective_end, range.starts_at, range.ends_at));
        if conflict {
            cursor += step;
            continue;
        }

        // Distance to the nearest busy range ending at or before the
        // effective start, and the nearest one starting at or after the
        // effective end. No neighbour on a side counts as zero.
        let gap_before = request
            .busy
            .iter()
            .filter(|range| range.ends_at <= effective_start)
            .map(|range| range.ends_at)
            .max()
            .map(|ends_at| whole_minutes_between(effective_start, ends_at))
            .unwrap_or(0);

        let gap_after = request
            .busy
            .iter()
            .filter(|range| range.starts_at >= effective_end)
            .map(|range| range.starts_at)
            .min()
            .map(|starts_at| whole_minutes_between(starts_at, effective_end))
            .unwrap_or(0);

        slots.push(SlotOption {
            staff_id: request.staff_id,
            starts_at: cursor,
            ends_at: cursor + Duration::minutes(request.service_duration_min),
            score: gap_before + gap_after,
            recommended: false,
        });

        cursor += step;
    }

    // Stable sort keeps generation order between equal scores, which makes
    // the ranking deterministic.
    slots.sort_by_key(|slot| slot.score);

    // A service whose full span (duration + buffers) cannot fit in the window
    // at all must not be recommended even when candidates are still returned.
    let window_span_min = whole_minutes_between(work_end, work_start);
    let can_recommend = total_needed_min <= window_span_min;

    for (index, slot) in slots.iter_mut().enumerate() {
        slot.recommended = can_recommend && index < RECOMMENDED_SLOT_LIMIT;
    }

    debug!(
        "Generated {} slots for staff {} ({} busy ranges)",
        slots.len(),
        request.staff_id,
        request.busy.len()
    );

    Ok(slots)
}

fn validate(request: &SlotRequest) -> Result<(), BookingError> {
    if request.service_duration_min <= 0 {
        return Err(BookingError::ValidationError(
            "Service duration must be positive".to_string(),
        ));
    }
    if request.buffer_before_min < 0 || request.buffer_after_min < 0 {
        return Err(BookingError::ValidationError(
            "Buffers must not be negative".to_string(),
        ));
    }
    if !ALLOWED_GRANULARITIES_MIN.contains(&request.granularity_min) {
        return Err(BookingError::ValidationError(format!(
            "Granularity must be one of {:?} minutes",
            ALLOWED_GRANULARITIES_MIN
        )));
    }
    if request.window.starts_at >= request.window.ends_at {
        return Err(BookingError::ValidationError(
            "Work window must start before it ends".to_string(),
        ));
    }
    for range in &request.busy {
        if range.starts_at >= range.ends_at {
            return Err(BookingError::ValidationError(
                "Busy range must start before it ends".to_string(),
            ));
        }
    }
    Ok(())
}
