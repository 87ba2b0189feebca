// core/src/orders/number.rs

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

/// Hands out `ORD-<YYYYMMDDHHMMSS>-<seq>` numbers: the creation second plus a
/// counter that restarts every second. If the clock steps backwards, the last
/// second seen keeps being used so numbers stay unique within the process.
#[derive(Debug, Default)]
pub struct OrderNumberAllocator {
  state: Mutex<(i64, u32)>,
}

impl OrderNumberAllocator {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn next(&self, now: DateTime<Utc>) -> String {
    let second = now.timestamp();
    let (stamp_second, seq) = {
      let mut guard = self.state.lock();
      let (last_second, seq) = &mut *guard;
      if second > *last_second {
        *last_second = second;
        *seq = 1;
      } else {
        *seq += 1;
      }
      (*last_second, *seq)
    };
    let stamp = DateTime::<Utc>::from_timestamp(stamp_second, 0).unwrap_or(now);
    format!("ORD-{}-{:04}", stamp.format("%Y%m%d%H%M%S"), seq)
  }
}
