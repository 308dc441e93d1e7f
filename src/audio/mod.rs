pub mod decoder;
pub mod encoder;
pub mod resample;
pub mod slicer;

pub use decoder::{decode_audio, SignalLoader, SymphoniaLoader};
pub use encoder::write_wav;
