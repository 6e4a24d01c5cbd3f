pub mod command;
pub mod error;
pub mod probe;

pub use command::{FfmpegCommand, FfmpegRunner};
pub use error::{MediaError, MediaResult};
pub use probe::Prober;
