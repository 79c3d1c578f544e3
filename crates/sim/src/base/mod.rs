//! Base types: compound state encoding and per-sample parameter values.

mod state;
mod values;

pub use state::{CompoundStateEncoding, MAX_CHARACTERS};
pub use values::{broadcast, to_integers, ValueGenerator, Vectorized};
