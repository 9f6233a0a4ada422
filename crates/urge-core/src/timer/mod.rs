mod countdown;

pub use countdown::{CountdownEngine, Observation};
