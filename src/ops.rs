pub mod amb;
pub mod range;
pub mod take_last;
pub mod using;

pub use amb::{amb, Amb};
pub use range::{range, Range};
pub use take_last::{take_last, TakeLast};
pub use using::{using, Using};
