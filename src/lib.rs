#![forbid(unsafe_code)]
#![cfg_attr(feature = "strict", deny(warnings))]

pub mod coord;
pub mod coordinator;
pub mod error;
pub mod event;
pub mod messenger;
pub mod piece;
pub mod proposal;
pub mod registry;
pub mod rules;
pub mod server;
pub mod side;
pub mod test_util;
pub mod util;
