pub mod bram;
pub mod uart;
