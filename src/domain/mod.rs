mod account;
mod card;
mod money;
mod pin;

pub use account::*;
pub use card::*;
pub use money::*;
pub use pin::*;
