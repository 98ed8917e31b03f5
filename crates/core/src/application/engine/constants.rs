// Engine constants (no magic values inline)
use std::time::Duration;

/// Default page size for source fetches
pub const DEFAULT_PAGE_SIZE: u32 = 50;

/// Default inter-item delay (1.5s)
///
/// Deliberate throttle for external content/data services, not a
/// performance accident.
pub const DEFAULT_ITEM_DELAY: Duration = Duration::from_millis(1500);

/// Default timeout for one `process()` call (30s)
pub const DEFAULT_PROCESS_TIMEOUT: Duration = Duration::from_secs(30);

/// Default timeout for one page fetch (15s)
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(15);
