pub mod fit;
pub mod render;
pub mod session;

pub use fit::{ResonanceFit, SweepReader, SweepTrace};
pub use render::render_sweep;
pub use session::SweepSession;
