pub mod clock;
pub mod window;

pub use clock::{Clock, Pause, Shutdown, SystemClock};
pub use window::{active_window, Schedule, TimeWindow, Timestamp};
