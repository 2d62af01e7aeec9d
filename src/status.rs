use crate::models::{DailyRecord, Flag, StatusView};

/// Derives the displayed status from a record's flag set.
///
/// Precedence is FAIL > SKIP > BONUS > MIN. Normal operation guarantees at
/// most one flag is set; the ordering only decides what a corrupted record
/// would display.
pub fn compute_status_view(record: Option<&DailyRecord>) -> StatusView {
    let Some(record) = record else {
        return StatusView::Waiting;
    };
    if record.flag_fail {
        StatusView::Fail
    } else if record.flag_skip {
        StatusView::Skip
    } else if record.flag_bonus {
        StatusView::Bonus
    } else if record.flag_min {
        StatusView::Min
    } else {
        StatusView::Waiting
    }
}

/// Resets all four flags and sets exactly the named one. The caller is
/// responsible for persisting the record.
pub fn apply_single_flag(record: &mut DailyRecord, flag: Flag) {
    record.flag_min = flag == Flag::Min;
    record.flag_bonus = flag == Flag::Bonus;
    record.flag_skip = flag == Flag::Skip;
    record.flag_fail = flag == Flag::Fail;
}

/// True once the day carries a definite outcome.
pub fn is_settled(record: Option<&DailyRecord>) -> bool {
    compute_status_view(record) != StatusView::Waiting
}
