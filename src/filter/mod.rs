mod fir;

pub use fir::{convolve, Convolver, FilterKernel};
