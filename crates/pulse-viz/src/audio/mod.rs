mod live_spectrum;
mod source_pipe;

pub use live_spectrum::LiveSpectrum;
pub use source_pipe::SourcePipe;
