mod counted;

pub use counted::*;
