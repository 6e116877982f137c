//! Hardware-free stand-ins for the FPGA, the synthesizer and the sweep
//! reader, so whole schedules can be rehearsed offline.

pub mod fpga;
pub mod resonator;
pub mod sweep_file;
pub mod synthesizer;

pub use fpga::{FpgaOptions, SimulatedFpga};
pub use sweep_file::JsonSweepReader;
pub use synthesizer::SimulatedSynthesizer;
